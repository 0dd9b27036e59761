pub mod audio_sink;
pub mod ay8910;
pub mod dac;
pub mod midi;
pub mod msm5232;

pub use audio_sink::{AudioRing, AudioRingReader, AudioSink, NullSink};
pub use ay8910::Ay8910;
pub use dac::{DacStream, Mc1408Dac};
pub use midi::{DeviceError, MidiConnector, MidiMessage, MidiOut, MidiPort, NoMidi};
pub use msm5232::ToneBridge;
