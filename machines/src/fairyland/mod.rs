//! Fairyland: a 1985 two-Z80 platform board.
//!
//! Hardware: main Z80 with tile/sprite video (32x32 tile plane with
//! per-column scroll, 32 16x16 sprites, two 256-entry 12-bit palettes);
//! sound Z80 with an AY-3-8910 PSG, an MSM5232 tone generator (bridged to
//! MIDI here), and an 8-bit sample DAC. Screen: 256x224.
//!
//! The CPU cores are not part of this crate. [`FairylandSystem::open`] takes
//! any two [`Executor`]s and runs each to its firmware idle loop once per
//! frame instead of counting cycles, so timing is frame-granular only.

pub mod hiscore;
pub mod main_board;
pub mod sound_board;
pub mod video;

use cathode_core::core::machine::{InputButton, Machine};
use cathode_core::cpu::Executor;
use cathode_core::device::{AudioSink, MidiConnector, MidiPort, NoMidi, NullSink};
use crossbeam_channel::{Sender, unbounded};
use log::{info, warn};

use crate::rom_loader::{LoadError, RomEntry, RomRegion, RomSet};
use hiscore::{HiscoreKeeper, MemoryStore, ScoreStore};
use main_board::{Control, MainBoard};
use sound_board::{SoundBoard, SoundCommand};
use video::{SCREEN_HEIGHT, SCREEN_WIDTH, VideoRenderer};

/// Name of the ROM set (zip archive or directory).
pub const ROM_SET_NAME: &str = "fairyland";

// ---------------------------------------------------------------------------
// ROM definitions
// ---------------------------------------------------------------------------

/// Main program ROM: 48KB at 0x0000-0xBFFF (three 16KB chips).
pub static MAIN_PROGRAM_ROM: RomRegion = RomRegion {
    size: 0xC000,
    entries: &[
        RomEntry {
            name: "cpu-a.ic1",
            size: 0x4000,
            offset: 0x0000,
            md5: Some("3f4c9d0a7e1b2c58d6a4e9f0b1c27d35"),
        },
        RomEntry {
            name: "cpu-b.ic2",
            size: 0x4000,
            offset: 0x4000,
            md5: Some("9b1e7a3c5d2f48e06a1b3c9d7e5f2a40"),
        },
        RomEntry {
            name: "cpu-c.ic3",
            size: 0x4000,
            offset: 0x8000,
            md5: Some("c0d8e2f4a6b81357924680ace13579bd"),
        },
    ],
};

/// Sound program ROM: 32KB at 0x0000-0x7FFF.
pub static SOUND_PROGRAM_ROM: RomRegion = RomRegion {
    size: 0x8000,
    entries: &[
        RomEntry {
            name: "snd-a.ic8",
            size: 0x4000,
            offset: 0x0000,
            md5: Some("5e2a7c9b1d3f4e6a8c0b2d4f6e8a0c1b"),
        },
        RomEntry {
            name: "snd-b.ic9",
            size: 0x4000,
            offset: 0x4000,
            md5: Some("a1b2c3d4e5f60718293a4b5c6d7e8f90"),
        },
    ],
};

/// Graphics ROM: 128KB; chips 0-3 hold planes 0/1, chips 4-7 planes 2/3.
pub static GFX_ROM: RomRegion = RomRegion {
    size: 0x2_0000,
    entries: &[
        RomEntry {
            name: "gfx-0.ic20",
            size: 0x4000,
            offset: 0x0_0000,
            md5: Some("0f1e2d3c4b5a69788796a5b4c3d2e1f0"),
        },
        RomEntry {
            name: "gfx-1.ic21",
            size: 0x4000,
            offset: 0x0_4000,
            md5: Some("1a2b3c4d5e6f708192a3b4c5d6e7f809"),
        },
        RomEntry {
            name: "gfx-2.ic22",
            size: 0x4000,
            offset: 0x0_8000,
            md5: Some("2b3c4d5e6f708192a3b4c5d6e7f8091a"),
        },
        RomEntry {
            name: "gfx-3.ic23",
            size: 0x4000,
            offset: 0x0_C000,
            md5: Some("3c4d5e6f708192a3b4c5d6e7f8091a2b"),
        },
        RomEntry {
            name: "gfx-4.ic24",
            size: 0x4000,
            offset: 0x1_0000,
            md5: Some("4d5e6f708192a3b4c5d6e7f8091a2b3c"),
        },
        RomEntry {
            name: "gfx-5.ic25",
            size: 0x4000,
            offset: 0x1_4000,
            md5: Some("5e6f708192a3b4c5d6e7f8091a2b3c4d"),
        },
        RomEntry {
            name: "gfx-6.ic26",
            size: 0x4000,
            offset: 0x1_8000,
            md5: Some("6f708192a3b4c5d6e7f8091a2b3c4d5e"),
        },
        RomEntry {
            name: "gfx-7.ic27",
            size: 0x4000,
            offset: 0x1_C000,
            md5: Some("708192a3b4c5d6e7f8091a2b3c4d5e6f"),
        },
    ],
};

/// Every region, for verification tools.
pub static ROM_REGIONS: [(&str, &RomRegion); 3] = [
    ("main", &MAIN_PROGRAM_ROM),
    ("sound", &SOUND_PROGRAM_ROM),
    ("gfx", &GFX_ROM),
];

// ---------------------------------------------------------------------------
// Input button IDs
// ---------------------------------------------------------------------------
pub const INPUT_UP: u8 = 0;
pub const INPUT_DOWN: u8 = 1;
pub const INPUT_LEFT: u8 = 2;
pub const INPUT_RIGHT: u8 = 3;
pub const INPUT_JUMP: u8 = 4;
pub const INPUT_ATTACK: u8 = 5;
pub const INPUT_START: u8 = 6;
pub const INPUT_CHEAT: u8 = 7;

const FAIRYLAND_INPUT_MAP: &[InputButton] = &[
    InputButton { id: INPUT_UP, name: "Up" },
    InputButton { id: INPUT_DOWN, name: "Down" },
    InputButton { id: INPUT_LEFT, name: "Left" },
    InputButton { id: INPUT_RIGHT, name: "Right" },
    InputButton { id: INPUT_JUMP, name: "Jump" },
    InputButton { id: INPUT_ATTACK, name: "Attack" },
    InputButton { id: INPUT_START, name: "Coin + Start" },
    InputButton { id: INPUT_CHEAT, name: "Cheat Palette" },
];

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// Host-side collaborators handed to a machine at open.
pub struct Peripherals {
    pub midi: Box<dyn MidiConnector>,
    /// MIDI output port to open at start, if any.
    pub midi_port: Option<usize>,
    pub audio: Box<dyn AudioSink>,
    pub scores: Box<dyn ScoreStore>,
    /// Accept ROMs whose digests do not match (sizes are still checked).
    pub skip_checksums: bool,
}

impl Default for Peripherals {
    fn default() -> Self {
        Self {
            midi: Box::new(NoMidi),
            midi_port: None,
            audio: Box::new(NullSink),
            scores: Box::new(MemoryStore::default()),
            skip_checksums: false,
        }
    }
}

pub struct FairylandSystem<M, S> {
    main: MainBoard<M>,
    video: VideoRenderer,
    sound: SoundBoard<S>,
    hiscore: HiscoreKeeper,

    input_tx: Sender<i32>,
    command_tx: Sender<i32>,
}

impl<M: Executor, S: Executor> FairylandSystem<M, S> {
    /// Load and verify all firmware, then build both boards. Any ROM
    /// problem is fatal; audio/MIDI/score-file problems only degrade.
    pub fn open(
        rom_set: &RomSet,
        main_cpu: M,
        sound_cpu: S,
        peripherals: Peripherals,
    ) -> Result<Self, LoadError> {
        let load = |region: &RomRegion| {
            if peripherals.skip_checksums {
                region.load_skip_checksums(rom_set)
            } else {
                region.load(rom_set)
            }
        };
        let main_rom = load(&MAIN_PROGRAM_ROM)?;
        let sound_rom = load(&SOUND_PROGRAM_ROM)?;
        let gfx_rom = load(&GFX_ROM)?;

        let (input_tx, input_rx) = unbounded();
        let (command_tx, command_rx) = unbounded();

        let mut midi = MidiPort::new(peripherals.midi);
        if let Some(port) = peripherals.midi_port {
            midi.select(port);
        }

        let (hiscore, error) = HiscoreKeeper::open(peripherals.scores);
        if let Some(e) = error {
            warn!("{e}; starting with an empty leaderboard");
        }

        info!("{ROM_SET_NAME}: firmware loaded");
        Ok(Self {
            main: MainBoard::new(main_cpu, &main_rom, input_rx, command_tx.clone()),
            video: VideoRenderer::new(&gfx_rom),
            sound: SoundBoard::new(sound_cpu, &sound_rom, command_rx, midi, peripherals.audio),
            hiscore,
            input_tx,
            command_tx,
        })
    }

    /// Queue a raw input code for the next frame.
    pub fn queue_input(&self, code: i32) {
        // Receiver lives in self.main
        let _ = self.input_tx.send(code);
    }

    /// Queue a command for the sound board's next frame.
    pub fn queue_sound_command(&self, command: SoundCommand) {
        let _ = self.command_tx.send(command.encode());
    }

    /// Producer handle for an input source on another thread.
    pub fn input_sender(&self) -> Sender<i32> {
        self.input_tx.clone()
    }

    pub fn command_sender(&self) -> Sender<i32> {
        self.command_tx.clone()
    }

    pub fn main_board(&self) -> &MainBoard<M> {
        &self.main
    }

    pub fn main_board_mut(&mut self) -> &mut MainBoard<M> {
        &mut self.main
    }

    pub fn sound_board(&self) -> &SoundBoard<S> {
        &self.sound
    }

    pub fn sound_board_mut(&mut self) -> &mut SoundBoard<S> {
        &mut self.sound
    }
}

impl<M: Executor, S: Executor> Machine for FairylandSystem<M, S> {
    fn display_size(&self) -> (u32, u32) {
        (SCREEN_WIDTH, SCREEN_HEIGHT)
    }

    /// Main CPU, then video, then sound, then the high-score check.
    fn run_frame(&mut self) {
        self.main.tick();
        self.video
            .render(self.main.memory(), self.main.cheat_enabled());
        self.sound.tick();
        if let Err(e) = self.hiscore.observe(self.main.memory_mut()) {
            warn!("high scores not saved: {e}");
        }
    }

    fn render_frame(&self, buffer: &mut [u8]) {
        let frame = self.video.frame();
        buffer[..frame.len()].copy_from_slice(frame);
    }

    fn set_input(&mut self, button: u8, pressed: bool) {
        let control = match button {
            INPUT_UP => Control::Up,
            INPUT_DOWN => Control::Down,
            INPUT_LEFT => Control::Left,
            INPUT_RIGHT => Control::Right,
            INPUT_JUMP => Control::Jump,
            INPUT_ATTACK => Control::Attack,
            INPUT_START | INPUT_CHEAT => {
                // Momentary: act on press only
                if pressed {
                    self.queue_input(if button == INPUT_START {
                        main_board::CODE_START
                    } else {
                        main_board::CODE_CHEAT
                    });
                }
                return;
            }
            _ => return,
        };
        let code = control.code();
        self.queue_input(if pressed { code } else { -code });
    }

    fn input_map(&self) -> &[InputButton] {
        FAIRYLAND_INPUT_MAP
    }

    fn reset(&mut self) {
        self.main.reset();
        self.sound.reset();
        self.video.clear();
        self.hiscore.reset();
    }
}
