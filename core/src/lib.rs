pub mod core;
pub mod cpu;
pub mod device;
pub mod error;

pub use error::DecodeWarning;

pub mod prelude {
    pub use crate::core::machine::{InputButton, Machine};
    pub use crate::core::{AddressSpace, Bus, BusMaster, CpuBoard, PortMap, Vector};
    pub use crate::cpu::Executor;
}
