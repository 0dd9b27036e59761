//! MSM5232 tone generator, bridged to MIDI instead of synthesized.
//!
//! The chip is an 8-voice organ: two groups of four slots, each group with
//! its own footage (octave) mask and attack/decay timing. Key writes become
//! note-on/note-off messages on an external MIDI output. Envelopes are not
//! modelled; a note is released after its group's attack + decay time.
//!
//! Register map (offset from the chip base):
//!   0x00-0x07: slot key (bit 7 key on, bits 0-6 pitch)
//!   0x08/0x09: group 1/2 attack index (3 bits)
//!   0x0A/0x0B: group 1/2 decay index (4 bits)
//!   0x0C/0x0D: group 1/2 control (bits 0-3 footage mask)

use super::midi::{MidiMessage, MidiPort};

/// Attack time per attack index, in milliseconds.
pub const ATTACK_MS: [u32; 8] = [2, 4, 8, 16, 32, 64, 32, 64];

/// Decay time per decay index, in milliseconds.
pub const DECAY_MS: [u32; 16] = [
    40, 80, 110, 180, 330, 640, 1280, 2560, 40, 80, 110, 180, 330, 640, 1280, 2560,
];

/// MIDI note of pitch 0 at the lowest footage.
const NOTE_BASE: i32 = 24;

/// Pitches at or above this are the chip's noise "drum" codes.
const PERCUSSION_PITCH: u8 = 0x60;
const PERCUSSION_NOTES: [u8; 4] = [36, 38, 42, 46];
const PERCUSSION_CHANNEL: u8 = 9;

const VELOCITY: u8 = 100;

pub const SLOTS: usize = 8;

#[derive(Clone, Copy, Debug, Default)]
struct Group {
    /// Trailing-zero count of the footage mask; `None` when the mask is 0.
    octave: Option<u8>,
    attack_index: u8,
    decay_index: u8,
    attack_ms: u32,
    decay_ms: u32,
}

#[derive(Clone, Copy, Debug, Default)]
struct Slot {
    /// (MIDI channel, note) currently sounding.
    sounding: Option<(u8, u8)>,
    release_at_us: u64,
}

/// MIDI note for `pitch` in `octave` (0 = highest footage).
pub fn midi_note(pitch: u8, octave: u8) -> u8 {
    let note = NOTE_BASE + pitch as i32 + 12 * (3 - octave as i32);
    note.clamp(0, 127) as u8
}

pub struct ToneBridge {
    groups: [Group; 2],
    slots: [Slot; SLOTS],
    port: MidiPort,
    now_us: u64,
}

impl ToneBridge {
    pub fn new(port: MidiPort) -> Self {
        Self {
            groups: [Group::default(); 2],
            slots: [Slot::default(); SLOTS],
            port,
            now_us: 0,
        }
    }

    pub fn write(&mut self, offset: u8, data: u8) {
        match offset {
            0x00..=0x07 => self.key(offset as usize, data),
            0x08 | 0x09 => self.groups[(offset & 1) as usize].attack_index = data & 0x07,
            0x0A | 0x0B => self.groups[(offset & 1) as usize].decay_index = data & 0x0F,
            0x0C | 0x0D => {
                let group = &mut self.groups[(offset & 1) as usize];
                let footage = data & 0x0F;
                group.octave = (footage != 0).then(|| footage.trailing_zeros() as u8);
                group.attack_ms = ATTACK_MS[group.attack_index as usize];
                group.decay_ms = DECAY_MS[group.decay_index as usize];
            }
            _ => {}
        }
    }

    fn key(&mut self, slot: usize, data: u8) {
        // A slot never holds two notes: release before anything else
        self.release(slot);
        if data & 0x80 == 0 {
            return;
        }

        let group = self.groups[slot / 4];
        let Some(octave) = group.octave else {
            return;
        };

        let pitch = data & 0x7F;
        let (channel, note) = if pitch >= PERCUSSION_PITCH {
            (PERCUSSION_CHANNEL, PERCUSSION_NOTES[(pitch & 3) as usize])
        } else {
            (slot as u8, midi_note(pitch, octave))
        };

        self.port.send(MidiMessage::NoteOn {
            channel,
            note,
            velocity: VELOCITY,
        });
        let hold_us = (group.attack_ms as u64 + group.decay_ms as u64) * 1000;
        self.slots[slot] = Slot {
            sounding: Some((channel, note)),
            release_at_us: self.now_us + hold_us,
        };
    }

    fn release(&mut self, slot: usize) {
        if let Some((channel, note)) = self.slots[slot].sounding.take() {
            self.port.send(MidiMessage::NoteOff { channel, note });
        }
    }

    /// Advance the bridge clock and release notes whose time is up.
    pub fn advance(&mut self, elapsed_us: u64) {
        self.now_us += elapsed_us;
        for slot in 0..SLOTS {
            if self.slots[slot].sounding.is_some() && self.now_us >= self.slots[slot].release_at_us
            {
                self.release(slot);
            }
        }
    }

    /// Program change on every slot channel.
    pub fn set_program(&mut self, program: u8) {
        for channel in 0..SLOTS as u8 {
            self.port.send(MidiMessage::ProgramChange { channel, program });
        }
    }

    /// Silence everything, then switch to another MIDI output.
    pub fn select_device(&mut self, port: usize) {
        self.silence();
        self.port.select(port);
    }

    /// Note-off for every sounding slot.
    pub fn silence(&mut self) {
        for slot in 0..SLOTS {
            self.release(slot);
        }
    }

    /// Note currently sounding on `slot`.
    pub fn sounding(&self, slot: usize) -> Option<u8> {
        self.slots[slot].sounding.map(|(_, note)| note)
    }

    pub fn reset(&mut self) {
        self.silence();
        self.groups = [Group::default(); 2];
        self.now_us = 0;
    }
}

impl Drop for ToneBridge {
    fn drop(&mut self) {
        self.silence();
        self.port.release();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::device::midi::{DeviceError, MidiConnector, MidiOut};

    type Log = Rc<RefCell<Vec<MidiMessage>>>;

    struct Recorder(Log);

    impl MidiOut for Recorder {
        fn send(&mut self, message: MidiMessage) -> Result<(), DeviceError> {
            self.0.borrow_mut().push(message);
            Ok(())
        }
    }

    struct Loopback(Log);

    impl MidiConnector for Loopback {
        fn connect(&mut self, _port: usize) -> Result<Box<dyn MidiOut>, DeviceError> {
            Ok(Box::new(Recorder(self.0.clone())))
        }
    }

    fn bridge() -> (ToneBridge, Log) {
        let log: Log = Rc::default();
        let mut port = MidiPort::new(Box::new(Loopback(log.clone())));
        port.select(0);
        let mut bridge = ToneBridge::new(port);
        // Group 1: attack 2 ms, decay 40 ms, footage 2' (octave 0)
        bridge.write(0x08, 0);
        bridge.write(0x0A, 0);
        bridge.write(0x0C, 0x01);
        (bridge, log)
    }

    fn offs_and_ons(log: &Log) -> Vec<&'static str> {
        log.borrow()
            .iter()
            .map(|m| match m {
                MidiMessage::NoteOn { .. } => "on",
                MidiMessage::NoteOff { .. } => "off",
                MidiMessage::ProgramChange { .. } => "pc",
            })
            .collect()
    }

    #[test]
    fn note_mapping_follows_octave() {
        assert_eq!(midi_note(0, 3), 24);
        assert_eq!(midi_note(12, 0), 72);
        assert_eq!(midi_note(0x5F, 0), 127);
    }

    #[test]
    fn second_key_on_is_preceded_by_one_note_off() {
        let (mut bridge, log) = bridge();
        bridge.write(0x02, 0x80 | 10);
        bridge.write(0x02, 0x80 | 12);
        assert_eq!(offs_and_ons(&log), ["on", "off", "on"]);
        assert_eq!(
            log.borrow()[1],
            MidiMessage::NoteOff {
                channel: 2,
                note: midi_note(10, 0)
            }
        );
        assert_eq!(bridge.sounding(2), Some(midi_note(12, 0)));
    }

    #[test]
    fn key_off_releases_only_sounding_slots() {
        let (mut bridge, log) = bridge();
        bridge.write(0x01, 0x00);
        assert!(log.borrow().is_empty());
        bridge.write(0x01, 0x80 | 5);
        bridge.write(0x01, 0x05);
        assert_eq!(offs_and_ons(&log), ["on", "off"]);
    }

    #[test]
    fn high_pitches_map_to_percussion() {
        let (mut bridge, log) = bridge();
        bridge.write(0x00, 0x80 | 0x61);
        assert_eq!(
            log.borrow()[0],
            MidiMessage::NoteOn {
                channel: 9,
                note: 38,
                velocity: 100
            }
        );
    }

    #[test]
    fn muted_group_plays_nothing() {
        let (mut bridge, log) = bridge();
        bridge.write(0x0D, 0x00);
        bridge.write(0x05, 0x80 | 20);
        assert!(log.borrow().is_empty());
        assert_eq!(bridge.sounding(5), None);
    }

    #[test]
    fn notes_release_after_attack_plus_decay() {
        let (mut bridge, log) = bridge();
        bridge.write(0x00, 0x80 | 30);
        bridge.advance(41_000);
        assert_eq!(bridge.sounding(0), Some(midi_note(30, 0)));
        bridge.advance(1_000);
        assert_eq!(bridge.sounding(0), None);
        assert_eq!(offs_and_ons(&log), ["on", "off"]);
    }

    #[test]
    fn control_write_latches_timing() {
        let (mut bridge, _log) = bridge();
        // New decay index only takes effect at the next control write
        bridge.write(0x0A, 7);
        bridge.write(0x00, 0x80);
        bridge.advance(42_000);
        assert_eq!(bridge.sounding(0), None);
        bridge.write(0x0C, 0x01);
        bridge.write(0x00, 0x80);
        bridge.advance(42_000);
        assert!(bridge.sounding(0).is_some());
    }

    #[test]
    fn program_change_reaches_all_slot_channels() {
        let (mut bridge, log) = bridge();
        bridge.set_program(0x21);
        let channels: Vec<u8> = log
            .borrow()
            .iter()
            .filter_map(|m| match m {
                MidiMessage::ProgramChange { channel, program: 0x21 } => Some(*channel),
                _ => None,
            })
            .collect();
        assert_eq!(channels, (0..8).collect::<Vec<u8>>());
    }

    #[test]
    fn drop_turns_off_sounding_notes() {
        let (mut bridge, log) = bridge();
        bridge.write(0x00, 0x80 | 1);
        bridge.write(0x03, 0x80 | 2);
        drop(bridge);
        assert_eq!(offs_and_ons(&log), ["on", "on", "off", "off"]);
    }
}
