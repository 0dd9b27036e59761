//! AY-3-8910 PSG (Programmable Sound Generator).
//!
//! Three square-wave tone channels, one noise generator, and one shared
//! envelope generator, synthesized one output sample at a time.
//!
//! Every generator owns a [`Phase`] accumulator that advances by a fixed
//! number of source-clock ticks per output sample. The ratio between the
//! 2 MHz source clock and the 44.1 kHz output is truncated to an integer,
//! so pitch is close but not exact. The accumulators persist across frames;
//! only an envelope-shape write restarts the envelope's phase, and one-shot
//! envelope shapes stop counting once their first ramp ends.
//!
//! Register map:
//!   R0/R1, R2/R3, R4/R5: tone period A/B/C (12-bit, fine then coarse)
//!   R6:  noise period (5-bit)
//!   R7:  mixer (bits 0-2 tone disable, bits 3-5 noise disable, active-high)
//!   R8-R10: channel level (bits 0-3 fixed level, bit 4 use envelope)
//!   R11/R12: envelope period (16-bit)
//!   R13: envelope shape (CONT, ATT, ALT, HOLD)
//!   R14/R15: I/O ports (unconnected, read 0xFF)

/// PSG input clock.
pub const PSG_CLOCK_HZ: u32 = 2_000_000;

/// Host output sample rate.
pub const OUTPUT_SAMPLE_RATE: u32 = 44_100;

/// Source-clock ticks per output sample (2_000_000 / 44_100 ≈ 45.35, truncated).
pub const CLOCKS_PER_SAMPLE: u32 = PSG_CLOCK_HZ / OUTPUT_SAMPLE_RATE;

/// Period of the 17-bit noise LFSR.
const NOISE_PERIOD: u32 = 131_071;

/// Output voltage per 5-bit level, 1.5 dB per step, full scale 0x7FFF.
const VOLUME_TABLE: [u16; 32] = [
    0, 184, 219, 260, 309, 368, 437, 519, 617, 734, 872, 1036, 1232, 1464, 1740, 2067, 2457,
    2920, 3471, 4125, 4903, 5827, 6925, 8231, 9782, 11626, 13818, 16422, 19518, 23197, 27570,
    32767,
];

/// Right shift applied to table values so three channels plus DAC streams
/// stay inside the i16 range before clipping.
const CHANNEL_SHIFT: u32 = 2;

/// Phase accumulator: `remainder` collects source ticks; every `divisor`
/// ticks the `quotient` advances by one.
///
/// `quotient` is a free-running u32 and wraps at 2^32; apart from that
/// wraparound it never decreases while the divisor is unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Phase {
    pub divisor: u32,
    pub quotient: u32,
    pub remainder: u32,
}

/// Power-on divisors: every period register reads 0, which counts as 1.
const TONE_RESET: Phase = Phase::idle(8);
const NOISE_RESET: Phase = Phase::idle(16);
const ENVELOPE_RESET: Phase = Phase::idle(8);

/// Envelope steps in one ramp.
const ENVELOPE_CYCLE: u32 = 32;

impl Phase {
    const fn idle(divisor: u32) -> Self {
        Self {
            divisor,
            quotient: 0,
            remainder: 0,
        }
    }

    /// Change the period without disturbing the accumulated phase.
    fn set_divisor(&mut self, divisor: u32) {
        self.divisor = divisor.max(1);
        self.remainder %= self.divisor;
    }

    /// Advance by `ticks` source clocks; returns how many periods elapsed.
    fn advance(&mut self, ticks: u32) -> u32 {
        self.remainder += ticks;
        let periods = self.remainder / self.divisor;
        self.remainder %= self.divisor;
        self.quotient = self.quotient.wrapping_add(periods);
        periods
    }

    fn restart(&mut self) {
        self.quotient = 0;
        self.remainder = 0;
    }
}

/// 3-voice AY-3-8910 with envelope and noise.
pub struct Ay8910 {
    regs: [u8; 16],
    selected: u8,

    tone: [Phase; 3],
    noise: Phase,
    envelope: Phase,

    /// One bit per LFSR step, indexed by the noise quotient.
    noise_bits: Box<[u32]>,
}

impl Default for Ay8910 {
    fn default() -> Self {
        Self::new()
    }
}

impl Ay8910 {
    pub fn new() -> Self {
        Self {
            regs: [0; 16],
            selected: 0,
            tone: [TONE_RESET; 3],
            noise: NOISE_RESET,
            envelope: ENVELOPE_RESET,
            noise_bits: build_noise_table(),
        }
    }

    /// Latch the register number for the next data access.
    pub fn select(&mut self, reg: u8) {
        self.selected = reg & 0x0F;
    }

    pub fn write_data(&mut self, data: u8) {
        self.write(self.selected, data);
    }

    pub fn read_data(&self) -> u8 {
        match self.selected {
            14 | 15 => 0xFF,
            reg => self.regs[reg as usize],
        }
    }

    /// Write a register directly. Unused high bits are discarded.
    pub fn write(&mut self, reg: u8, data: u8) {
        let reg = (reg & 0x0F) as usize;
        let data = match reg {
            1 | 3 | 5 | 13 => data & 0x0F,
            6 | 8 | 9 | 10 => data & 0x1F,
            _ => data,
        };
        self.regs[reg] = data;

        match reg {
            0..=5 => {
                let ch = reg / 2;
                self.tone[ch].set_divisor(8 * self.tone_period(ch) as u32);
            }
            6 => self.noise.set_divisor(16 * (self.regs[6] as u32).max(1)),
            11 | 12 => self.envelope.set_divisor(8 * self.envelope_period().max(1) as u32),
            13 => self.envelope.restart(),
            _ => {}
        }
    }

    pub fn register(&self, reg: u8) -> u8 {
        self.regs[(reg & 0x0F) as usize]
    }

    fn tone_period(&self, ch: usize) -> u16 {
        let period = self.regs[ch * 2] as u16 | ((self.regs[ch * 2 + 1] as u16) << 8);
        period.max(1)
    }

    fn envelope_period(&self) -> u16 {
        self.regs[11] as u16 | ((self.regs[12] as u16) << 8)
    }

    pub fn channel_phase(&self, ch: usize) -> Phase {
        self.tone[ch]
    }

    pub fn noise_phase(&self) -> Phase {
        self.noise
    }

    pub fn envelope_phase(&self) -> Phase {
        self.envelope
    }

    /// Current 5-bit envelope output.
    pub fn envelope_level(&self) -> u8 {
        envelope_level(self.regs[13], self.envelope.quotient)
    }

    fn noise_bit(&self) -> u32 {
        let index = self.noise.quotient % NOISE_PERIOD;
        (self.noise_bits[(index / 32) as usize] >> (index % 32)) & 1
    }

    /// Produce one output sample: the signed sum of the three channels.
    pub fn next_sample(&mut self) -> i32 {
        for phase in &mut self.tone {
            phase.advance(CLOCKS_PER_SAMPLE);
        }
        self.noise.advance(CLOCKS_PER_SAMPLE);
        // One-shot shapes park after the first ramp
        let repeats = envelope_repeats(self.regs[13]);
        if repeats || self.envelope.quotient < ENVELOPE_CYCLE {
            self.envelope.advance(CLOCKS_PER_SAMPLE);
        }
        if !repeats {
            self.envelope.quotient = self.envelope.quotient.min(ENVELOPE_CYCLE);
        }

        let noise_bit = self.noise_bit();
        let envelope = self.envelope_level() as usize;
        let mixer = self.regs[7];

        let mut mixed = 0i32;
        for ch in 0..3 {
            let tone_enabled = mixer & (1 << ch) == 0;
            let noise_enabled = mixer & (8 << ch) == 0;

            let square = if tone_enabled {
                self.tone[ch].quotient & 1
            } else {
                1
            };
            let noise = if noise_enabled { noise_bit } else { 0 };

            let level = self.regs[8 + ch];
            let index = if level & 0x10 != 0 {
                envelope
            } else {
                fixed_level_index(level & 0x0F)
            };
            let amplitude = (VOLUME_TABLE[index] >> CHANNEL_SHIFT) as i32;

            mixed += if square ^ noise == 1 { amplitude } else { -amplitude };
        }
        mixed
    }

    /// Reset registers and phases. The noise table is kept.
    pub fn reset(&mut self) {
        self.regs = [0; 16];
        self.selected = 0;
        self.tone = [TONE_RESET; 3];
        self.noise = NOISE_RESET;
        self.envelope = ENVELOPE_RESET;
    }
}

/// A fixed 4-bit level addresses the odd entries of the 32-step table.
fn fixed_level_index(level: u8) -> usize {
    if level == 0 {
        0
    } else {
        (level as usize) * 2 + 1
    }
}

/// Shapes that keep ramping after the first cycle: CONT set, HOLD clear.
fn envelope_repeats(shape: u8) -> bool {
    shape & 0x09 == 0x08
}

/// Envelope output for `shape` after `counter` steps (32 steps per cycle).
///
/// First cycle: ramp up if ATT, down otherwise. Afterwards: silent without
/// CONT; with HOLD, park at the level the first ramp ended on, inverted by
/// ALT; otherwise repeat, reversing direction every cycle when ALT is set.
pub fn envelope_level(shape: u8, counter: u32) -> u8 {
    let step = (counter & 31) as u8;
    let cycle = counter >> 5;
    let attack = shape & 0x04 != 0;
    let cont = shape & 0x08 != 0;
    let alternate = shape & 0x02 != 0;
    let hold = shape & 0x01 != 0;

    if cycle == 0 {
        return if attack { step } else { 31 - step };
    }
    if !cont {
        return 0;
    }
    if hold {
        return if attack ^ alternate { 31 } else { 0 };
    }
    let rising = attack ^ (alternate && cycle & 1 == 1);
    if rising { step } else { 31 - step }
}

/// Unroll the 17-bit LFSR (taps 0 and 3) into a packed bit table.
fn build_noise_table() -> Box<[u32]> {
    let mut bits = vec![0u32; NOISE_PERIOD.div_ceil(32) as usize];
    let mut lfsr: u32 = 1;
    for i in 0..NOISE_PERIOD {
        if lfsr & 1 != 0 {
            bits[(i / 32) as usize] |= 1 << (i % 32);
        }
        let feedback = (lfsr ^ (lfsr >> 3)) & 1;
        lfsr = (lfsr >> 1) | (feedback << 16);
    }
    bits.into_boxed_slice()
}
