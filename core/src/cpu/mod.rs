//! The instruction executor is an external collaborator: this crate never
//! decodes opcodes itself. Boards drive whatever CPU core is plugged in
//! through the narrow [`Executor`] capability, which also lets tests use a
//! deterministic stand-in.

use crate::core::{Bus, BusMaster};

/// Steps allowed per [`Executor::run_until`] call before the pass is
/// abandoned. Firmware that never reaches its idle loop would otherwise
/// hang the frame.
pub const DEFAULT_STEP_BUDGET: u32 = 1_000_000;

/// Result of a bounded run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The program counter reached the target after this many steps.
    Reached { steps: u32 },
    /// The budget ran out first.
    BudgetExhausted,
}

/// Capability exposed by an instruction-set executor.
pub trait Executor {
    /// Execute exactly one instruction against `bus`.
    fn step(&mut self, bus: &mut dyn Bus<Address = u16, Data = u8>, master: BusMaster);

    fn pc(&self) -> u16;

    fn set_pc(&mut self, pc: u16);

    /// Latch a non-maskable interrupt request; the executor takes it at
    /// its next instruction boundary.
    fn request_nmi(&mut self);

    /// Single-step until the program counter equals `addr`.
    ///
    /// Returns immediately if already there. This is a pragmatic stand-in
    /// for cycle counting, not a frame-accurate timing guarantee.
    fn run_until(
        &mut self,
        bus: &mut dyn Bus<Address = u16, Data = u8>,
        master: BusMaster,
        addr: u16,
        budget: u32,
    ) -> RunOutcome {
        let mut steps = 0;
        while self.pc() != addr {
            if steps == budget {
                return RunOutcome::BudgetExhausted;
            }
            self.step(bus, master);
            steps += 1;
        }
        RunOutcome::Reached { steps }
    }
}
