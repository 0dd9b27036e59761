//! 8-bit sample DAC fed directly by the sound CPU.
//!
//! The firmware streams raw bytes at its own sample clock, which does not
//! divide the host output rate. Bytes written during one tick are collected
//! into a [`DacStream`] that plays back time-stretched by a fixed ratio.

/// Q16 read-position increment per output sample: 65536 / 5.5.
pub const STRETCH_STEP_Q16: u32 = 11_916;

/// Convert an unsigned DAC byte to a signed 16-bit PCM sample.
/// Maps 0x00 → -32768, 0x80 → 0, 0xFF → +32512.
pub fn sample_i16(value: u8) -> i16 {
    ((value as i16) - 128) * 256
}

#[derive(Default)]
pub struct Mc1408Dac {
    /// Bytes written since the last [`take_stream`](Self::take_stream).
    captured: Vec<u8>,
}

impl Mc1408Dac {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called when the sound CPU writes the DAC port.
    pub fn write(&mut self, data: u8) {
        self.captured.push(data);
    }

    /// Hand over this tick's captured bytes as a playable stream.
    pub fn take_stream(&mut self) -> Option<DacStream> {
        if self.captured.is_empty() {
            return None;
        }
        Some(DacStream::new(std::mem::take(&mut self.captured)))
    }

    pub fn reset(&mut self) {
        self.captured.clear();
    }
}

/// One tick's worth of DAC bytes, replayed at 5.5 output samples per byte.
#[derive(Debug)]
pub struct DacStream {
    samples: Vec<i16>,
    /// Read position in 16.16 fixed point.
    position: u32,
}

impl DacStream {
    pub fn new(raw: Vec<u8>) -> Self {
        Self {
            samples: raw.into_iter().map(sample_i16).collect(),
            position: 0,
        }
    }

    /// Next stretched sample, or `None` once the stream has played out.
    pub fn next_sample(&mut self) -> Option<i16> {
        let index = (self.position >> 16) as usize;
        let sample = *self.samples.get(index)?;
        self.position += STRETCH_STEP_Q16;
        Some(sample)
    }

    pub fn is_finished(&self) -> bool {
        (self.position >> 16) as usize >= self.samples.len()
    }
}
