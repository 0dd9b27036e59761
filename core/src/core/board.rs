use log::warn;

use super::bus::{Bus, BusMaster, Vector};
use super::interrupt::inject_interrupt;
use super::memory::AddressSpace;
use crate::cpu::{DEFAULT_STEP_BUDGET, Executor, RunOutcome};

/// Address-decoding overlay on top of a plain [`AddressSpace`].
///
/// Each board supplies one of these for its memory-mapped peripherals.
/// Addresses a port map does not claim fall through to plain memory.
pub trait PortMap {
    /// Return `Some(value)` if this address belongs to a peripheral.
    fn read(&mut self, memory: &mut AddressSpace, addr: u16) -> Option<u8>;

    /// Return `true` if the write was consumed by a peripheral (or
    /// deliberately dropped, e.g. ROM); `false` stores it in memory.
    fn write(&mut self, memory: &mut AddressSpace, addr: u16, data: u8) -> bool;
}

/// A CPU-visible bus: raw memory plus a peripheral overlay.
pub struct Decoder<P> {
    memory: AddressSpace,
    ports: P,
}

impl<P: PortMap> Decoder<P> {
    pub fn new(ports: P) -> Self {
        Self {
            memory: AddressSpace::new(AddressSpace::CPU_SIZE),
            ports,
        }
    }
}

impl<P: PortMap> Bus for Decoder<P> {
    type Address = u16;
    type Data = u8;

    fn read(&mut self, _master: BusMaster, addr: u16) -> u8 {
        match self.ports.read(&mut self.memory, addr) {
            Some(value) => value,
            None => self.memory.read_byte(addr as u32),
        }
    }

    fn write(&mut self, _master: BusMaster, addr: u16, data: u8) {
        if !self.ports.write(&mut self.memory, addr, data) {
            self.memory.write_byte(addr as u32, data);
        }
    }
}

impl<P> AsMut<AddressSpace> for Decoder<P> {
    fn as_mut(&mut self) -> &mut AddressSpace {
        &mut self.memory
    }
}

/// One CPU and its decoded bus, driven to a known quiescent point per tick.
///
/// The idle address is a firmware polling loop; running to it bounds the
/// work done per frame without cycle counting.
pub struct CpuBoard<E, P> {
    cpu: E,
    bus: Decoder<P>,
    master: BusMaster,
    idle_address: u16,
    step_budget: u32,
    passes: u64,
}

impl<E: Executor, P: PortMap> CpuBoard<E, P> {
    pub fn new(cpu: E, ports: P, master: BusMaster, idle_address: u16) -> Self {
        Self {
            cpu,
            bus: Decoder::new(ports),
            master,
            idle_address,
            step_budget: DEFAULT_STEP_BUDGET,
            passes: 0,
        }
    }

    pub fn with_step_budget(mut self, budget: u32) -> Self {
        self.step_budget = budget;
        self
    }

    /// Single-step the executor until it sits on the idle address.
    /// Returns `false` if the step budget ran out first.
    pub fn run_to_idle(&mut self) -> bool {
        let outcome = self.cpu.run_until(
            &mut self.bus,
            self.master,
            self.idle_address,
            self.step_budget,
        );
        match outcome {
            RunOutcome::Reached { .. } => true,
            RunOutcome::BudgetExhausted => {
                warn!(
                    "{:?}: idle address {:#06X} not reached within {} steps (pc={:#06X})",
                    self.master,
                    self.idle_address,
                    self.step_budget,
                    self.cpu.pc()
                );
                false
            }
        }
    }

    pub fn deliver_interrupt(&mut self, vector: Vector) {
        inject_interrupt(&mut self.cpu, &mut self.bus, self.master, vector);
    }

    /// Raise NMI and run its handler back to the idle address. The executor
    /// only takes the request at an instruction boundary, so one step is
    /// forced even when the CPU is already parked on the idle address.
    pub fn run_nmi_to_idle(&mut self) -> bool {
        self.deliver_interrupt(Vector::Nmi);
        self.cpu.step(&mut self.bus, self.master);
        self.run_to_idle()
    }

    /// One idle-to-idle pass: run to the idle address, then deliver `vector`.
    pub fn idle_pass(&mut self, vector: Vector) {
        self.run_to_idle();
        self.deliver_interrupt(vector);
        self.passes += 1;
    }

    /// Number of completed idle-to-idle passes since construction.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn memory(&self) -> &AddressSpace {
        &self.bus.memory
    }

    pub fn memory_mut(&mut self) -> &mut AddressSpace {
        &mut self.bus.memory
    }

    pub fn ports(&self) -> &P {
        &self.bus.ports
    }

    pub fn ports_mut(&mut self) -> &mut P {
        &mut self.bus.ports
    }

    pub fn cpu(&self) -> &E {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut E {
        &mut self.cpu
    }

    /// Read through the decoder, exactly as the CPU would.
    pub fn bus_read(&mut self, addr: u16) -> u8 {
        self.bus.read(self.master, addr)
    }

    /// Write through the decoder, exactly as the CPU would.
    pub fn bus_write(&mut self, addr: u16, data: u8) {
        self.bus.write(self.master, addr, data);
    }
}
