use thiserror::Error;

/// A malformed queued event. Never fatal: the event is logged and dropped
/// so the emulation loop keeps running.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeWarning {
    #[error("unknown input code {0}")]
    UnknownInputCode(i32),

    #[error("unknown sound command {0:#X}")]
    UnknownSoundCommand(i32),
}
