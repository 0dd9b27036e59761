//! Sound CPU board: PSG, tone-generator bridge, DAC, and the mixer that
//! feeds the host audio sink.

use cathode_core::DecodeWarning;
use cathode_core::core::{AddressSpace, BusMaster, CpuBoard, PortMap, Vector};
use cathode_core::cpu::Executor;
use cathode_core::device::{AudioSink, Ay8910, DacStream, Mc1408Dac, MidiPort, ToneBridge};
use crossbeam_channel::Receiver;
use log::{debug, warn};

pub const ROM_END: u16 = 0xBFFF;
pub const RAM_BASE: u16 = 0xC000;
pub const PSG_ADDRESS: u16 = 0xC800;
pub const PSG_DATA: u16 = 0xC801;
pub const TONE_BASE: u16 = 0xCA00;
pub const TONE_LAST: u16 = 0xCA0D;
pub const LATCH_READ: u16 = 0xD800;
pub const DAC_WRITE: u16 = 0xDE00;

pub const IDLE_ADDRESS: u16 = 0x0107;

/// Host time covered by one tick (one 60 Hz video frame).
pub const FRAME_DURATION_US: u64 = 16_667;

/// DAC streams kept while the sink has no room; older ones are dropped.
const MAX_DAC_STREAMS: usize = 16;

const PROGRAM_CHANGE_BASE: i32 = 0x100;
const DEVICE_SELECT_BASE: i32 = 0x200;

/// Inter-board and driver commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SoundCommand {
    /// Byte written to the sound latch by the main CPU.
    Latch(u8),
    /// Instrument for every tone-generator slot.
    ProgramChange(u8),
    /// Switch MIDI output port.
    SelectDevice(usize),
}

impl SoundCommand {
    pub fn decode(code: i32) -> Result<Self, DecodeWarning> {
        match code {
            0..=0xFF => Ok(Self::Latch(code as u8)),
            0x100..=0x17F => Ok(Self::ProgramChange((code - PROGRAM_CHANGE_BASE) as u8)),
            0x200..=0x27F => Ok(Self::SelectDevice((code - DEVICE_SELECT_BASE) as usize)),
            _ => Err(DecodeWarning::UnknownSoundCommand(code)),
        }
    }

    pub fn encode(self) -> i32 {
        match self {
            Self::Latch(value) => value as i32,
            Self::ProgramChange(program) => PROGRAM_CHANGE_BASE + (program & 0x7F) as i32,
            Self::SelectDevice(port) => DEVICE_SELECT_BASE + (port as i32 & 0x7F),
        }
    }
}

/// Sound-board peripheral overlay.
pub struct SoundPorts {
    psg: Ay8910,
    tones: ToneBridge,
    dac: Mc1408Dac,
    latch: u8,
}

impl SoundPorts {
    pub fn new(midi: MidiPort) -> Self {
        Self {
            psg: Ay8910::new(),
            tones: ToneBridge::new(midi),
            dac: Mc1408Dac::new(),
            latch: 0,
        }
    }

    pub fn psg(&self) -> &Ay8910 {
        &self.psg
    }

    pub fn tones(&self) -> &ToneBridge {
        &self.tones
    }

    pub fn latch(&self) -> u8 {
        self.latch
    }
}

impl PortMap for SoundPorts {
    fn read(&mut self, _memory: &mut AddressSpace, addr: u16) -> Option<u8> {
        match addr {
            PSG_DATA => Some(self.psg.read_data()),
            LATCH_READ => Some(self.latch),
            _ => None,
        }
    }

    fn write(&mut self, _memory: &mut AddressSpace, addr: u16, data: u8) -> bool {
        match addr {
            0x0000..=ROM_END => {}
            PSG_ADDRESS => self.psg.select(data),
            PSG_DATA => self.psg.write_data(data),
            TONE_BASE..=TONE_LAST => self.tones.write((addr - TONE_BASE) as u8, data),
            DAC_WRITE => self.dac.write(data),
            _ => return false,
        }
        true
    }
}

pub struct SoundBoard<E> {
    board: CpuBoard<E, SoundPorts>,
    commands: Receiver<i32>,
    streams: Vec<DacStream>,
    sink: Box<dyn AudioSink>,
    scratch: Vec<i16>,
}

impl<E: Executor> SoundBoard<E> {
    pub fn new(
        cpu: E,
        program_rom: &[u8],
        commands: Receiver<i32>,
        midi: MidiPort,
        sink: Box<dyn AudioSink>,
    ) -> Self {
        let mut board = CpuBoard::new(cpu, SoundPorts::new(midi), BusMaster::Cpu(1), IDLE_ADDRESS);
        board.memory_mut().load(0, program_rom);
        Self {
            board,
            commands,
            streams: Vec::new(),
            sink,
            scratch: Vec::new(),
        }
    }

    /// One frame: drain commands, run to idle, deliver the frame
    /// interrupt, release expired notes, then synthesize.
    pub fn tick(&mut self) {
        self.drain_commands();

        self.board.run_to_idle();
        self.board.deliver_interrupt(Vector::IRQ);

        let ports = self.board.ports_mut();
        ports.tones.advance(FRAME_DURATION_US);
        if let Some(stream) = ports.dac.take_stream() {
            if self.streams.len() == MAX_DAC_STREAMS {
                debug!("audio sink stalled; oldest DAC stream dropped");
                self.streams.remove(0);
            }
            self.streams.push(stream);
        }

        self.synthesize();
    }

    fn drain_commands(&mut self) {
        for code in self.commands.try_iter() {
            match SoundCommand::decode(code) {
                Ok(SoundCommand::Latch(value)) => {
                    self.board.ports_mut().latch = value;
                    self.board.run_nmi_to_idle();
                }
                Ok(SoundCommand::ProgramChange(program)) => {
                    self.board.ports_mut().tones.set_program(program)
                }
                Ok(SoundCommand::SelectDevice(port)) => {
                    self.board.ports_mut().tones.select_device(port)
                }
                Err(w) => warn!("{w}; dropped"),
            }
        }
    }

    /// Fill exactly the space the sink reports free: PSG plus every live
    /// DAC stream, clipped, copied to each output channel.
    fn synthesize(&mut self) {
        let channels = self.sink.channels().max(1);
        let frames = self.sink.available() / channels;
        if frames == 0 {
            return;
        }

        self.scratch.clear();
        self.scratch.reserve(frames * channels);
        let psg = &mut self.board.ports_mut().psg;
        for _ in 0..frames {
            let mut mixed = clamp_i16(psg.next_sample()) as i32;
            for stream in &mut self.streams {
                if let Some(sample) = stream.next_sample() {
                    mixed += sample as i32;
                }
            }
            let sample = clamp_i16(mixed);
            self.scratch.extend(std::iter::repeat_n(sample, channels));
        }
        self.streams.retain(|s| !s.is_finished());
        self.sink.push(&self.scratch);
    }

    pub fn board(&self) -> &CpuBoard<E, SoundPorts> {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut CpuBoard<E, SoundPorts> {
        &mut self.board
    }

    pub fn active_streams(&self) -> usize {
        self.streams.len()
    }

    /// Clear RAM, chips, and pending audio; restart the CPU at 0x0000.
    pub fn reset(&mut self) {
        let rom_len = ROM_END as usize + 1;
        self.board
            .memory_mut()
            .fill(RAM_BASE as u32, AddressSpace::CPU_SIZE - rom_len, 0);
        let ports = self.board.ports_mut();
        ports.psg.reset();
        ports.tones.reset();
        ports.dac.reset();
        ports.latch = 0;
        self.board.cpu_mut().set_pc(0);
        self.commands.try_iter().for_each(drop);
        self.streams.clear();
        debug!("sound board reset");
    }
}

fn clamp_i16(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}
