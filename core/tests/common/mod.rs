#![allow(dead_code)]

use cathode_core::core::{Bus, BusMaster};
use cathode_core::cpu::Executor;

/// Deterministic stand-in executor understanding a handful of Z80 opcodes:
/// NOP, JP nn, LD A,n, LD A,(nn), LD (nn),A, INC A, RST n, RET.
/// Anything else executes as a one-byte NOP. A pending NMI is taken before
/// the next instruction by pushing pc and jumping to 0x0066.
pub struct ToyZ80 {
    pub pc: u16,
    pub sp: u16,
    pub a: u8,
    pub nmi_pending: bool,
    pub steps: u64,
}

impl ToyZ80 {
    pub fn new(sp: u16) -> Self {
        Self {
            pc: 0,
            sp,
            a: 0,
            nmi_pending: false,
            steps: 0,
        }
    }

    fn fetch(&mut self, bus: &mut dyn Bus<Address = u16, Data = u8>, master: BusMaster) -> u8 {
        let byte = bus.read(master, self.pc);
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    fn fetch_word(
        &mut self,
        bus: &mut dyn Bus<Address = u16, Data = u8>,
        master: BusMaster,
    ) -> u16 {
        let lo = self.fetch(bus, master);
        let hi = self.fetch(bus, master);
        u16::from_le_bytes([lo, hi])
    }

    fn push(&mut self, bus: &mut dyn Bus<Address = u16, Data = u8>, master: BusMaster, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.sp = self.sp.wrapping_sub(1);
        bus.write(master, self.sp, hi);
        self.sp = self.sp.wrapping_sub(1);
        bus.write(master, self.sp, lo);
    }

    fn pop(&mut self, bus: &mut dyn Bus<Address = u16, Data = u8>, master: BusMaster) -> u16 {
        let lo = bus.read(master, self.sp);
        self.sp = self.sp.wrapping_add(1);
        let hi = bus.read(master, self.sp);
        self.sp = self.sp.wrapping_add(1);
        u16::from_le_bytes([lo, hi])
    }
}

impl Executor for ToyZ80 {
    fn step(&mut self, bus: &mut dyn Bus<Address = u16, Data = u8>, master: BusMaster) {
        self.steps += 1;
        if self.nmi_pending {
            self.nmi_pending = false;
            self.push(bus, master, self.pc);
            self.pc = 0x0066;
            return;
        }

        let op = self.fetch(bus, master);
        match op {
            0xC3 => self.pc = self.fetch_word(bus, master),
            0x3E => self.a = self.fetch(bus, master),
            0x3A => {
                let addr = self.fetch_word(bus, master);
                self.a = bus.read(master, addr);
            }
            0x32 => {
                let addr = self.fetch_word(bus, master);
                bus.write(master, addr, self.a);
            }
            0x3C => self.a = self.a.wrapping_add(1),
            0xC9 => self.pc = self.pop(bus, master),
            op if op & 0xC7 == 0xC7 => {
                self.push(bus, master, self.pc);
                self.pc = (op & 0x38) as u16;
            }
            _ => {}
        }
    }

    fn pc(&self) -> u16 {
        self.pc
    }

    fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }

    fn request_nmi(&mut self) {
        self.nmi_pending = true;
    }
}

/// Tiny assembler for the opcodes [`ToyZ80`] understands.
#[derive(Default)]
pub struct Asm {
    pub bytes: Vec<u8>,
}

impl Asm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nop(mut self) -> Self {
        self.bytes.push(0x00);
        self
    }

    pub fn jp(mut self, addr: u16) -> Self {
        self.bytes.push(0xC3);
        self.bytes.extend_from_slice(&addr.to_le_bytes());
        self
    }

    pub fn ld_a_n(mut self, n: u8) -> Self {
        self.bytes.extend_from_slice(&[0x3E, n]);
        self
    }

    pub fn ld_a_mem(mut self, addr: u16) -> Self {
        self.bytes.push(0x3A);
        self.bytes.extend_from_slice(&addr.to_le_bytes());
        self
    }

    pub fn ld_mem_a(mut self, addr: u16) -> Self {
        self.bytes.push(0x32);
        self.bytes.extend_from_slice(&addr.to_le_bytes());
        self
    }

    pub fn inc_a(mut self) -> Self {
        self.bytes.push(0x3C);
        self
    }

    pub fn ret(mut self) -> Self {
        self.bytes.push(0xC9);
        self
    }
}
