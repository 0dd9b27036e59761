pub mod fairyland;
pub mod rom_loader;

pub use fairyland::FairylandSystem;
