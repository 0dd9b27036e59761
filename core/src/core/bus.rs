/// Identifies who is accessing the bus.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BusMaster {
    Cpu(usize), // CPU 0 = main board, CPU 1 = sound board
}

/// What an executor sees: reads and writes, already decoded.
pub trait Bus {
    type Address: Copy;
    type Data;

    fn read(&mut self, master: BusMaster, addr: Self::Address) -> Self::Data;
    fn write(&mut self, master: BusMaster, addr: Self::Address, data: Self::Data);
}

/// Interrupt vectors understood by the trap injector.
///
/// `Nmi` is edge-triggered and handed to the executor as a request flag.
/// `Restart(n)` is a maskable interrupt delivered by executing the one-byte
/// `RST n` instruction; `n` must be a multiple of 8 in 0x00..=0x38.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Vector {
    Nmi,
    Restart(u8),
}

impl Vector {
    /// The mode-1 maskable interrupt used by both boards (RST 38h).
    pub const IRQ: Vector = Vector::Restart(0x38);

    /// Opcode of the synthesized restart instruction, or `None` for NMI.
    pub fn restart_opcode(self) -> Option<u8> {
        match self {
            Vector::Nmi => None,
            Vector::Restart(target) => Some(0xC7 | (target & 0x38)),
        }
    }
}
