//! Audio clock hierarchy for the serial DAC line.
//!
//! Three nested clocks derived from the reference tick:
//!
//! - **mclk**: toggled whenever a Bresenham accumulator reaches `overflow`
//!   (add `inc` every tick, subtract `overflow` on a toggle). With
//!   `inc/overflow = 512·sample_rate / reference_hz` this gives exactly 256
//!   mclk periods per sample with no long-run drift.
//! - **sclk**: bit 1 of a 2-bit counter (inverted), one period per 4 mclk.
//! - **lrck**: bit 7 of an 8-bit counter, one period per 256 mclk.
//!
//! Both counters advance on ticks where mclk is toggled from low to high.
//! The 8-bit counter splits as `A B CCCC DD`: `A` is lrck (channel), `B` the
//! silenced half of each channel slot, `CCCC` the bit position inside the
//! 16-bit data word, `DD` the serial clock phase.
//!
//! The bit strobe is registered: it fires the tick after the serial counter
//! passes phase 2, halfway through sclk low, and on the very first tick
//! after reset. The word strobe is the bit strobe at `B CCCC == 23`, once in
//! the silenced half of every channel slot, so twice per lrck period.

use serde::{Deserialize, Serialize};

use crate::config::AudioConfig;
use crate::register::{Clocked, Reg};

/// `B CCCC` value that raises the word strobe.
pub const WORD_STROBE_SLOT: u8 = 23;
/// Highest data-word position carrying a set preamble bit.
pub const WORD_BIT_LAST_POSITION: u8 = 5;

/// Audio strobes and slot decode for one reference tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioStrobes {
    /// Time to drive the next serial bit.
    pub bit: bool,
    /// Once per channel slot (twice per lrck period), in the silenced half.
    pub word: bool,
    /// Current bit falls in the padding half of the slot.
    pub silenced: bool,
    /// Bit position 0–15 inside the data word (MSB first).
    pub position: u8,
    /// Channel select: false = left, true = right.
    pub channel: bool,
}

impl AudioStrobes {
    /// Fixed word pattern the tone is XORed onto: positions 0–5 set.
    #[inline]
    pub fn word_bit(&self) -> bool {
        self.position <= WORD_BIT_LAST_POSITION
    }

    /// Serial line value for a 1-bit tone level.
    #[inline]
    pub fn dac_bit(&self, tone: bool) -> bool {
        !self.silenced && (self.word_bit() ^ tone)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioClock {
    inc: u64,
    overflow: u64,
    accum: Reg<u64>,
    mclk: Reg<bool>,
    slck_count: Reg<u8>,
    slck_update: Reg<bool>,
    lrck_count: Reg<u8>,
}

impl AudioClock {
    pub fn new(audio: &AudioConfig, reference_hz: u32) -> Self {
        let (inc, overflow) = audio.accumulator_ratio(reference_hz);
        Self::with_ratio(inc, overflow)
    }

    /// Build from an explicit accumulator ratio.
    pub fn with_ratio(inc: u64, overflow: u64) -> Self {
        let overflow = overflow.max(1);
        AudioClock {
            inc,
            overflow,
            // start full so the first tick toggles mclk
            accum: Reg::new(overflow),
            mclk: Reg::new(false),
            slck_count: Reg::new(3),
            slck_update: Reg::new(true),
            lrck_count: Reg::new(0),
        }
    }

    pub fn reset(&mut self) {
        *self = AudioClock::with_ratio(self.inc, self.overflow);
    }

    pub fn ratio(&self) -> (u64, u64) {
        (self.inc, self.overflow)
    }

    #[inline]
    fn mclk_stb(&self) -> bool {
        self.accum.get() >= self.overflow
    }

    pub fn mclk(&self) -> bool {
        self.mclk.get()
    }

    pub fn sclk(&self) -> bool {
        self.slck_count.get() & 0b10 == 0
    }

    pub fn lrck(&self) -> bool {
        self.lrck_count.get() & 0x80 != 0
    }

    pub fn lrck_count(&self) -> u8 {
        self.lrck_count.get()
    }

    pub fn strobes(&self) -> AudioStrobes {
        let lr = self.lrck_count.get();
        let bit = self.slck_update.get();
        AudioStrobes {
            bit,
            word: bit && (lr >> 2) & 0x1F == WORD_STROBE_SLOT,
            silenced: lr & 0x40 != 0,
            position: (lr >> 2) & 0x0F,
            channel: lr & 0x80 != 0,
        }
    }

    #[inline]
    pub fn eval(&mut self) {
        let accum = self.accum.get();
        let stb = self.mclk_stb();
        if stb {
            self.accum.drive(accum - self.overflow + self.inc);
            self.mclk.drive(!self.mclk.get());
        } else {
            self.accum.drive(accum + self.inc);
        }

        self.slck_update.drive(false);
        if stb && !self.mclk.get() {
            let slck = self.slck_count.get();
            self.slck_count.drive((slck + 1) & 0b11);
            if slck == 2 {
                self.slck_update.drive(true);
            }
            self.lrck_count.drive(self.lrck_count.get().wrapping_add(1));
        }
    }
}

impl Clocked for AudioClock {
    #[inline]
    fn commit(&mut self) {
        self.accum.commit();
        self.mclk.commit();
        self.slck_count.commit();
        self.slck_update.commit();
        self.lrck_count.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counts {
        mclk_toggles: u64,
        sclk_rises: u64,
        lrck_toggles: u64,
        bits: u64,
        words: u64,
    }

    fn run(clock: &mut AudioClock, ticks: u64) -> Counts {
        let mut c = Counts::default();
        let (mut mclk, mut sclk, mut lrck) = (clock.mclk(), clock.sclk(), clock.lrck());
        for _ in 0..ticks {
            let s = clock.strobes();
            c.bits += s.bit as u64;
            c.words += s.word as u64;
            clock.eval();
            clock.commit();
            if clock.mclk() != mclk {
                c.mclk_toggles += 1;
            }
            if clock.sclk() && !sclk {
                c.sclk_rises += 1;
            }
            if clock.lrck() != lrck {
                c.lrck_toggles += 1;
            }
            mclk = clock.mclk();
            sclk = clock.sclk();
            lrck = clock.lrck();
        }
        c
    }

    #[test]
    fn test_first_tick_toggles_and_strobes() {
        let mut clock = AudioClock::new(&AudioConfig { sample_rate: 48_000 }, 74_250_000);
        assert!(clock.strobes().bit);
        clock.eval();
        clock.commit();
        assert!(clock.mclk());
        assert!(!clock.strobes().bit);
    }

    #[test]
    fn test_rates_over_ten_million_ticks() {
        let reference = 74_250_000u64;
        let ticks = 10_000_000u64;
        let mut clock = AudioClock::new(&AudioConfig { sample_rate: 48_000 }, reference as u32);
        let c = run(&mut clock, ticks);
        let seconds = ticks as f64 / reference as f64;

        // 48 kHz × 256 periods × 2 toggles
        let mclk_hz = c.mclk_toggles as f64 / seconds / 2.0;
        assert!((mclk_hz - 12_288_000.0).abs() / 12_288_000.0 < 1e-5, "mclk {}", mclk_hz);

        let sclk_hz = c.sclk_rises as f64 / seconds;
        assert!((sclk_hz - 3_072_000.0).abs() / 3_072_000.0 < 1e-4, "sclk {}", sclk_hz);

        let lrck_hz = c.lrck_toggles as f64 / seconds / 2.0;
        assert!((lrck_hz - 48_000.0).abs() / 48_000.0 < 1e-3, "lrck {}", lrck_hz);

        // one bit strobe per serial period, one word strobe per channel slot
        assert!((c.bits as f64 / seconds - 3_072_000.0).abs() / 3_072_000.0 < 1e-4);
        assert!((c.words as f64 / seconds - 96_000.0).abs() / 96_000.0 < 1e-3);
    }

    #[test]
    fn test_exact_hierarchy_ratios() {
        // inc/overflow = 1/2: mclk toggles every other tick
        let mut clock = AudioClock::with_ratio(1, 2);
        let c = run(&mut clock, 2 * 512 * 10);
        assert_eq!(c.mclk_toggles, 5120);
        assert_eq!(c.lrck_toggles, 20);
        assert_eq!(c.sclk_rises, 640);
    }

    #[test]
    fn test_slot_decode() {
        let mut clock = AudioClock::with_ratio(1, 1);
        // 1/1: mclk toggles every tick, counters advance every other tick
        let mut seen_word_slots = Vec::new();
        for _ in 0..1024 {
            let s = clock.strobes();
            if s.word {
                seen_word_slots.push((clock.lrck_count() >> 2) & 0x1F);
                assert!(s.silenced);
                assert_eq!(s.position, 7);
            }
            clock.eval();
            clock.commit();
        }
        assert_eq!(seen_word_slots.len(), 4);
        assert!(seen_word_slots.iter().all(|&v| v == WORD_STROBE_SLOT));
    }

    #[test]
    fn test_dac_bit() {
        let s = AudioStrobes { position: 3, ..Default::default() };
        assert!(s.dac_bit(false));
        assert!(!s.dac_bit(true));
        let s = AudioStrobes { position: 9, ..Default::default() };
        assert!(!s.dac_bit(false));
        assert!(s.dac_bit(true));
        let s = AudioStrobes { position: 3, silenced: true, ..Default::default() };
        assert!(!s.dac_bit(false) && !s.dac_bit(true));
    }
}
