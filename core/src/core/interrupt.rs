use super::bus::{Bus, BusMaster, Vector};
use super::memory::AddressSpace;
use crate::cpu::Executor;

/// Deliver one edge-triggered interrupt to `cpu`.
///
/// NMI just raises the executor's request flag. A maskable vector is
/// emulated with a restart trap: the byte at `pc - 1` is temporarily
/// replaced with `RST n`, the program counter is moved onto it, exactly one
/// instruction is executed (pushing the original `pc` and jumping to the
/// vector), and the original byte is put back. The firmware image is left
/// untouched.
///
/// The trap byte is patched in the raw address space, bypassing any
/// write-protect overlay of the decoder. Both `cpu` and `bus` are borrowed
/// exclusively for the whole sequence, so nothing else can observe the
/// patched byte.
pub fn inject_interrupt<B>(cpu: &mut dyn Executor, bus: &mut B, master: BusMaster, vector: Vector)
where
    B: Bus<Address = u16, Data = u8> + AsMut<AddressSpace>,
{
    let Some(opcode) = vector.restart_opcode() else {
        cpu.request_nmi();
        return;
    };

    let trap = cpu.pc().wrapping_sub(1);
    let original = bus.as_mut().read_byte(trap as u32);
    bus.as_mut().write_byte(trap as u32, opcode);
    cpu.set_pc(trap);
    cpu.step(bus, master);
    bus.as_mut().write_byte(trap as u32, original);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flat RAM bus with no overlays.
    struct FlatBus(AddressSpace);

    impl Bus for FlatBus {
        type Address = u16;
        type Data = u8;

        fn read(&mut self, _master: BusMaster, addr: u16) -> u8 {
            self.0.read_byte(addr as u32)
        }

        fn write(&mut self, _master: BusMaster, addr: u16, data: u8) {
            self.0.write_byte(addr as u32, data);
        }
    }

    impl AsMut<AddressSpace> for FlatBus {
        fn as_mut(&mut self) -> &mut AddressSpace {
            &mut self.0
        }
    }

    /// Understands only RST n; records what it executed.
    struct RstOnly {
        pc: u16,
        sp: u16,
        nmi: bool,
        executed: Vec<u8>,
    }

    impl Executor for RstOnly {
        fn step(&mut self, bus: &mut dyn Bus<Address = u16, Data = u8>, master: BusMaster) {
            let op = bus.read(master, self.pc);
            self.executed.push(op);
            let ret = self.pc.wrapping_add(1);
            if op & 0xC7 == 0xC7 {
                let [lo, hi] = ret.to_le_bytes();
                self.sp = self.sp.wrapping_sub(1);
                bus.write(master, self.sp, hi);
                self.sp = self.sp.wrapping_sub(1);
                bus.write(master, self.sp, lo);
                self.pc = (op & 0x38) as u16;
            } else {
                self.pc = ret;
            }
        }

        fn pc(&self) -> u16 {
            self.pc
        }

        fn set_pc(&mut self, pc: u16) {
            self.pc = pc;
        }

        fn request_nmi(&mut self) {
            self.nmi = true;
        }
    }

    fn setup(pc: u16) -> (RstOnly, FlatBus) {
        let mut space = AddressSpace::new(AddressSpace::CPU_SIZE);
        space.write_byte(pc.wrapping_sub(1) as u32, 0x3E);
        let cpu = RstOnly {
            pc,
            sp: 0xE800,
            nmi: false,
            executed: Vec::new(),
        };
        (cpu, FlatBus(space))
    }

    #[test]
    fn restart_trap_preserves_firmware_byte() {
        for target in (0x00..=0x38).step_by(8) {
            let (mut cpu, mut bus) = setup(0x0A2C);
            inject_interrupt(&mut cpu, &mut bus, BusMaster::Cpu(0), Vector::Restart(target));
            assert_eq!(bus.0.read_byte(0x0A2B), 0x3E, "vector {target:#04X}");
        }
    }

    #[test]
    fn restart_trap_executes_exactly_one_rst() {
        let (mut cpu, mut bus) = setup(0x0A2C);
        inject_interrupt(&mut cpu, &mut bus, BusMaster::Cpu(0), Vector::IRQ);
        assert_eq!(cpu.executed, vec![0xFF]);
        assert_eq!(cpu.pc(), 0x0038);
        // Return address is the interrupted pc
        assert_eq!(bus.0.read_word(cpu.sp), 0x0A2C);
    }

    #[test]
    fn restart_trap_at_address_zero_wraps() {
        let (mut cpu, mut bus) = setup(0x0000);
        inject_interrupt(&mut cpu, &mut bus, BusMaster::Cpu(0), Vector::IRQ);
        assert_eq!(bus.0.read_byte(0xFFFF), 0x3E);
        assert_eq!(bus.0.read_word(cpu.sp), 0x0000);
    }

    #[test]
    fn nmi_sets_request_flag_without_stepping() {
        let (mut cpu, mut bus) = setup(0x0A2C);
        inject_interrupt(&mut cpu, &mut bus, BusMaster::Cpu(0), Vector::Nmi);
        assert!(cpu.nmi);
        assert!(cpu.executed.is_empty());
        assert_eq!(cpu.pc(), 0x0A2C);
    }
}
