pub mod board;
pub mod bus;
pub mod checksum;
pub mod interrupt;
pub mod machine;
pub mod memory;

pub use board::{CpuBoard, Decoder, PortMap};
pub use bus::{Bus, BusMaster, Vector};
pub use interrupt::inject_interrupt;
pub use machine::{InputButton, Machine};
pub use memory::AddressSpace;
