use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Number of samples over which playback fades in (~5.8 ms at 44.1 kHz).
const FADE_SAMPLES: u32 = 256;

/// Destination for interleaved signed 16-bit PCM.
///
/// Producers ask for [`available`](AudioSink::available) space first and
/// never push more than that, so a slow consumer throttles synthesis
/// instead of growing a backlog.
pub trait AudioSink {
    /// Interleaved channels per frame.
    fn channels(&self) -> usize;

    /// Free space, in samples (not frames).
    fn available(&self) -> usize;

    fn push(&mut self, samples: &[i16]);
}

/// Bounded ring shared between the emulation thread (producer) and an
/// audio callback thread (consumer, via [`AudioRingReader`]).
pub struct AudioRing {
    buffer: Arc<Mutex<VecDeque<i16>>>,
    capacity: usize,
    channels: usize,
}

impl AudioRing {
    pub fn new(capacity: usize, channels: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
            channels: channels.max(1),
        }
    }

    pub fn reader(&self) -> AudioRingReader {
        AudioRingReader {
            buffer: Arc::clone(&self.buffer),
            fade_in_pos: 0,
        }
    }

    /// Samples currently queued.
    pub fn len(&self) -> usize {
        lock(&self.buffer).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AudioSink for AudioRing {
    fn channels(&self) -> usize {
        self.channels
    }

    fn available(&self) -> usize {
        self.capacity.saturating_sub(lock(&self.buffer).len())
    }

    fn push(&mut self, samples: &[i16]) {
        let mut buf = lock(&self.buffer);
        let room = self.capacity.saturating_sub(buf.len());
        buf.extend(samples.iter().take(room));
    }
}

/// Consumer half of an [`AudioRing`].
pub struct AudioRingReader {
    buffer: Arc<Mutex<VecDeque<i16>>>,
    fade_in_pos: u32,
}

impl AudioRingReader {
    /// Fill `out` from the ring; underruns play silence. Returns the number
    /// of samples that came from the ring.
    pub fn pop_into(&mut self, out: &mut [i16]) -> usize {
        let mut buf = lock(&self.buffer);
        let mut taken = 0;
        for sample in out.iter_mut() {
            let raw = match buf.pop_front() {
                Some(s) => {
                    taken += 1;
                    s
                }
                None => 0,
            };
            if self.fade_in_pos < FADE_SAMPLES {
                // Ramp up from silence at startup
                let gain = self.fade_in_pos as f32 / FADE_SAMPLES as f32;
                *sample = (raw as f32 * gain) as i16;
                self.fade_in_pos += 1;
            } else {
                *sample = raw;
            }
        }
        taken
    }
}

/// A panicked consumer must not take synthesis down with it.
fn lock(buffer: &Mutex<VecDeque<i16>>) -> MutexGuard<'_, VecDeque<i16>> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sink for running without an audio device: never has room.
#[derive(Debug, Default)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn channels(&self) -> usize {
        1
    }

    fn available(&self) -> usize {
        0
    }

    fn push(&mut self, _samples: &[i16]) {}
}
