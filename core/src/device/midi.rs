//! MIDI output seam for bridged sound chips.
//!
//! Device discovery lives outside this crate. A machine is handed a
//! [`MidiConnector`] and asks it for an output port by index; everything it
//! sends goes through [`MidiPort`], which turns device failures into
//! silence instead of errors.

use log::{info, warn};
use thiserror::Error;

/// Channel-voice messages used by the tone-generator bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    ProgramChange { channel: u8, program: u8 },
}

impl MidiMessage {
    /// Encode as raw MIDI bytes. Returns the buffer and the used length.
    pub fn to_bytes(self) -> ([u8; 3], usize) {
        match self {
            Self::NoteOn {
                channel,
                note,
                velocity,
            } => ([0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F], 3),
            Self::NoteOff { channel, note } => ([0x80 | (channel & 0x0F), note & 0x7F, 0], 3),
            Self::ProgramChange { channel, program } => {
                ([0xC0 | (channel & 0x0F), program & 0x7F, 0], 2)
            }
        }
    }
}

/// An audio or MIDI device is missing or stopped working.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no MIDI output port {0}")]
    NoSuchPort(usize),
    #[error("MIDI output failed: {0}")]
    Send(String),
}

/// An open MIDI output.
pub trait MidiOut {
    fn send(&mut self, message: MidiMessage) -> Result<(), DeviceError>;
}

/// Opens MIDI outputs by port index.
pub trait MidiConnector {
    fn connect(&mut self, port: usize) -> Result<Box<dyn MidiOut>, DeviceError>;
}

/// A connector with no ports; every selection degrades to silence.
#[derive(Debug, Default)]
pub struct NoMidi;

impl MidiConnector for NoMidi {
    fn connect(&mut self, port: usize) -> Result<Box<dyn MidiOut>, DeviceError> {
        Err(DeviceError::NoSuchPort(port))
    }
}

/// The currently selected output, if any.
pub struct MidiPort {
    connector: Box<dyn MidiConnector>,
    output: Option<Box<dyn MidiOut>>,
}

impl MidiPort {
    pub fn new(connector: Box<dyn MidiConnector>) -> Self {
        Self {
            connector,
            output: None,
        }
    }

    /// Release the current output and open `port`. On failure the port
    /// stays closed and later messages are dropped.
    pub fn select(&mut self, port: usize) {
        self.output = None;
        match self.connector.connect(port) {
            Ok(output) => {
                info!("MIDI output port {port} selected");
                self.output = Some(output);
            }
            Err(e) => warn!("{e}; tone generator muted"),
        }
    }

    pub fn send(&mut self, message: MidiMessage) {
        let Some(output) = self.output.as_mut() else {
            return;
        };
        if let Err(e) = output.send(message) {
            warn!("{e}; tone generator muted");
            self.output = None;
        }
    }

    pub fn is_connected(&self) -> bool {
        self.output.is_some()
    }

    /// Drop the open output, if any.
    pub fn release(&mut self) {
        self.output = None;
    }
}
