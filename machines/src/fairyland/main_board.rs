//! Main CPU board: memory map, controller latch, palette banking, sound
//! latch, and the coin-pulse sequence.

use cathode_core::DecodeWarning;
use cathode_core::core::{AddressSpace, BusMaster, CpuBoard, PortMap, Vector};
use cathode_core::cpu::Executor;
use crossbeam_channel::{Receiver, Sender};
use log::{debug, warn};

// ---------------------------------------------------------------------------
// Memory map
// ---------------------------------------------------------------------------

pub const ROM_END: u16 = 0xBFFF;
pub const VRAM_BASE: u16 = 0xC000;
pub const SOUND_LATCH: u16 = 0xD400;
pub const IN0: u16 = 0xD800;
pub const DSW0: u16 = 0xD801;
pub const COIN_STATUS: u16 = 0xD803;
pub const SPRITE_RAM: u16 = 0xDC00;
pub const SPRITE_ORDER: u16 = 0xDC80;
pub const COLUMN_SCROLL: u16 = 0xDCA0;
pub const GFX_CTRL: u16 = 0xDCE0;
pub const PALETTE_WINDOW: u16 = 0xDD00;
pub const PALETTE_WINDOW_LEN: u16 = 0x200;
pub const WORK_RAM: u16 = 0xE000;
/// Physical home of palette bank 1; bank 0 lives in the window itself.
pub const PALETTE_BANK1: u16 = 0xFD00;

/// Firmware polling loop the CPU is run to each frame.
pub const IDLE_ADDRESS: u16 = 0x0A2C;

/// gfxctrl bit selecting which palette bank the CPU sees in the window.
const GFX_CTRL_PALETTE_BANK: u8 = 0x20;

/// Coin-status bits pulsed by the coin sequence (coin, service).
pub const COIN_PULSE_MASK: u8 = 0x05;

/// Extra idle-to-idle passes the firmware needs to debounce a coin.
pub const COIN_SEQUENCE_PASSES: u32 = 8;

// ---------------------------------------------------------------------------
// Input vocabulary
// ---------------------------------------------------------------------------

pub const CODE_UP: i32 = 1;
pub const CODE_DOWN: i32 = 2;
pub const CODE_LEFT: i32 = 3;
pub const CODE_RIGHT: i32 = 4;
pub const CODE_JUMP: i32 = 5;
pub const CODE_ATTACK: i32 = 6;
pub const CODE_START: i32 = 7;
pub const CODE_CHEAT: i32 = 8;

/// Held controls, in input-code order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Up,
    Down,
    Left,
    Right,
    Jump,
    Attack,
}

impl Control {
    pub const ALL: [Control; 6] = [
        Control::Up,
        Control::Down,
        Control::Left,
        Control::Right,
        Control::Jump,
        Control::Attack,
    ];

    /// Bit in the IN0 controller byte.
    pub fn hardware_bit(self) -> u8 {
        match self {
            Control::Left => 0,
            Control::Right => 1,
            Control::Up => 2,
            Control::Down => 3,
            Control::Jump => 4,
            Control::Attack => 5,
        }
    }

    /// Positive input code; its negation releases the control.
    pub fn code(self) -> i32 {
        match self {
            Control::Up => CODE_UP,
            Control::Down => CODE_DOWN,
            Control::Left => CODE_LEFT,
            Control::Right => CODE_RIGHT,
            Control::Jump => CODE_JUMP,
            Control::Attack => CODE_ATTACK,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Held { control: Control, pressed: bool },
    Start,
    Cheat,
}

pub fn decode_input(code: i32) -> Result<InputEvent, DecodeWarning> {
    let held = |control| InputEvent::Held {
        control,
        pressed: code > 0,
    };
    Ok(match code.saturating_abs() {
        CODE_UP => held(Control::Up),
        CODE_DOWN => held(Control::Down),
        CODE_LEFT => held(Control::Left),
        CODE_RIGHT => held(Control::Right),
        CODE_JUMP => held(Control::Jump),
        CODE_ATTACK => held(Control::Attack),
        _ if code == CODE_START => InputEvent::Start,
        _ if code == CODE_CHEAT => InputEvent::Cheat,
        _ => return Err(DecodeWarning::UnknownInputCode(code)),
    })
}

/// Which controls are currently held.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControllerState {
    held: u8,
}

impl ControllerState {
    pub fn set(&mut self, control: Control, pressed: bool) {
        let bit = 1 << control.hardware_bit();
        if pressed {
            self.held |= bit;
        } else {
            self.held &= !bit;
        }
    }

    pub fn is_held(&self, control: Control) -> bool {
        self.held & (1 << control.hardware_bit()) != 0
    }

    /// Active-low IN0 value: a held control reads 0, bits 6-7 always read 1.
    pub fn hardware_byte(&self) -> u8 {
        !self.held | 0xC0
    }
}

// ---------------------------------------------------------------------------
// Address decoding
// ---------------------------------------------------------------------------

/// Main-board peripheral overlay.
pub struct MainPorts {
    in0: u8,
    coin: u8,
    sound_tx: Sender<i32>,
}

impl MainPorts {
    pub fn new(sound_tx: Sender<i32>) -> Self {
        Self {
            in0: 0xFF,
            coin: 0xFF,
            sound_tx,
        }
    }

    pub fn in0(&self) -> u8 {
        self.in0
    }

    pub fn coin_status(&self) -> u8 {
        self.coin
    }

    fn reset(&mut self) {
        self.in0 = 0xFF;
        self.coin = 0xFF;
    }

    /// Physical address behind a palette-window address, if bank 1 is
    /// selected; bank 0 is the window's own storage.
    fn palette_target(memory: &AddressSpace, addr: u16) -> Option<u16> {
        let offset = addr.checked_sub(PALETTE_WINDOW)?;
        if offset >= PALETTE_WINDOW_LEN {
            return None;
        }
        let bank1 = memory.read_byte(GFX_CTRL as u32) & GFX_CTRL_PALETTE_BANK != 0;
        bank1.then_some(PALETTE_BANK1 + offset)
    }
}

impl PortMap for MainPorts {
    fn read(&mut self, memory: &mut AddressSpace, addr: u16) -> Option<u8> {
        match addr {
            IN0 => Some(self.in0),
            DSW0 => Some(0xFF),
            COIN_STATUS => Some(self.coin),
            _ => Self::palette_target(memory, addr).map(|phys| memory.read_byte(phys as u32)),
        }
    }

    fn write(&mut self, memory: &mut AddressSpace, addr: u16, data: u8) -> bool {
        match addr {
            0x0000..=ROM_END => true,
            SOUND_LATCH => {
                // Receiver is owned by the sound board of the same machine
                if self.sound_tx.send(data as i32).is_err() {
                    debug!("sound board gone; latch {data:#04X} dropped");
                }
                false
            }
            IN0 | DSW0 | COIN_STATUS => true,
            _ => match Self::palette_target(memory, addr) {
                Some(phys) => {
                    memory.write_byte(phys as u32, data);
                    true
                }
                None => false,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

pub struct MainBoard<E> {
    board: CpuBoard<E, MainPorts>,
    input_rx: Receiver<i32>,
    controller: ControllerState,
    cheat: bool,
}

impl<E: Executor> MainBoard<E> {
    pub fn new(cpu: E, program_rom: &[u8], input_rx: Receiver<i32>, sound_tx: Sender<i32>) -> Self {
        let ports = MainPorts::new(sound_tx);
        let mut board = CpuBoard::new(cpu, ports, BusMaster::Cpu(0), IDLE_ADDRESS);
        board.memory_mut().load(0, program_rom);
        Self {
            board,
            input_rx,
            controller: ControllerState::default(),
            cheat: false,
        }
    }

    /// One frame: fold queued input into IN0, run to idle, deliver the
    /// frame interrupt, then pulse the coin bits if Start was pressed.
    pub fn tick(&mut self) {
        let start = self.drain_input();
        self.board.ports_mut().in0 = self.controller.hardware_byte();

        self.board.run_to_idle();
        self.board.deliver_interrupt(Vector::IRQ);

        if start {
            self.coin_sequence();
        }
    }

    /// Apply every queued input code. Returns whether Start was pressed.
    fn drain_input(&mut self) -> bool {
        let mut start = false;
        for code in self.input_rx.try_iter() {
            match decode_input(code) {
                Ok(InputEvent::Held { control, pressed }) => self.controller.set(control, pressed),
                Ok(InputEvent::Start) => start = true,
                Ok(InputEvent::Cheat) => {
                    self.cheat = !self.cheat;
                    debug!("cheat palette {}", if self.cheat { "on" } else { "off" });
                }
                Err(w) => warn!("{w}; dropped"),
            }
        }
        start
    }

    /// Toggle the coin-pulse bits, give the firmware its debounce passes,
    /// then put the bits back.
    fn coin_sequence(&mut self) {
        let original = self.board.ports().coin;
        self.board.ports_mut().coin ^= COIN_PULSE_MASK;
        for _ in 0..COIN_SEQUENCE_PASSES {
            self.board.idle_pass(Vector::IRQ);
        }
        let ports = self.board.ports_mut();
        ports.coin = (ports.coin & !COIN_PULSE_MASK) | (original & COIN_PULSE_MASK);
    }

    pub fn controller(&self) -> ControllerState {
        self.controller
    }

    pub fn cheat_enabled(&self) -> bool {
        self.cheat
    }

    pub fn board(&self) -> &CpuBoard<E, MainPorts> {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut CpuBoard<E, MainPorts> {
        &mut self.board
    }

    pub fn memory(&self) -> &AddressSpace {
        self.board.memory()
    }

    pub fn memory_mut(&mut self) -> &mut AddressSpace {
        self.board.memory_mut()
    }

    /// Clear RAM and latches and restart the CPU at 0x0000. ROM is kept.
    pub fn reset(&mut self) {
        let rom_len = ROM_END as usize + 1;
        self.board
            .memory_mut()
            .fill(VRAM_BASE as u32, AddressSpace::CPU_SIZE - rom_len, 0);
        self.board.ports_mut().reset();
        self.board.cpu_mut().set_pc(0);
        self.input_rx.try_iter().for_each(drop);
        self.controller = ControllerState::default();
        self.cheat = false;
    }
}
