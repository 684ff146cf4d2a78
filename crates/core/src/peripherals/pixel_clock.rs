//! Pixel clock divider.
//!
//! Divides the reference clock by `ratio` (≥ 4, multiple of 4) with a
//! rotating phase ticket. The pixel strobe is raised on phase 0, which is
//! also the reset phase, so the first reference tick is a pixel tick.
//!
//! ```text
//! phase   0 1 2 3 4 5 6 7      (ratio 8)
//! stb     ‾ _ _ _ _ _ _ _
//! clk     _ ‾ ‾ ‾ ‾ _ _ _      rises one tick after the strobe
//! clk90   _ _ _ ‾ ‾ ‾ ‾ _      trails clk by a quarter period
//! ```

use serde::{Deserialize, Serialize};

use crate::register::{Clocked, Reg};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixelClock {
    ratio: u32,
    phase: Reg<u32>,
}

impl PixelClock {
    pub fn new(ratio: u32) -> Self {
        PixelClock { ratio: ratio.max(4), phase: Reg::new(0) }
    }

    pub fn reset(&mut self) {
        *self = PixelClock::new(self.ratio);
    }

    pub fn ratio(&self) -> u32 {
        self.ratio
    }

    pub fn phase(&self) -> u32 {
        self.phase.get()
    }

    /// Pixel strobe for the current tick.
    #[inline]
    pub fn strobe(&self) -> bool {
        self.phase.get() == 0
    }

    /// Pixel clock level.
    #[inline]
    pub fn clk(&self) -> bool {
        let p = self.phase.get();
        p >= 1 && p <= self.ratio / 2
    }

    /// Quarter-period delayed pixel clock level.
    #[inline]
    pub fn clk90(&self) -> bool {
        let p = self.phase.get();
        let q = self.ratio / 4;
        p > q && p <= q + self.ratio / 2
    }

    #[inline]
    pub fn eval(&mut self) {
        let next = self.phase.get() + 1;
        self.phase.drive(if next == self.ratio { 0 } else { next });
    }
}

impl Clocked for PixelClock {
    #[inline]
    fn commit(&mut self) {
        self.phase.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(ratio: u32, ticks: usize) -> Vec<(bool, bool, bool)> {
        let mut pc = PixelClock::new(ratio);
        let mut out = Vec::with_capacity(ticks);
        for _ in 0..ticks {
            out.push((pc.strobe(), pc.clk(), pc.clk90()));
            pc.eval();
            pc.commit();
        }
        out
    }

    #[test]
    fn test_strobe_every_ratio_ticks() {
        for ratio in [4u32, 8, 12, 16] {
            let trace = run(ratio, ratio as usize * 10);
            let strobes: Vec<usize> = trace.iter().enumerate()
                .filter(|(_, s)| s.0)
                .map(|(i, _)| i)
                .collect();
            assert_eq!(strobes.len(), 10);
            assert_eq!(strobes[0], 0);
            for w in strobes.windows(2) {
                assert_eq!(w[1] - w[0], ratio as usize);
            }
        }
    }

    #[test]
    fn test_clock_waveforms_ratio_8() {
        let trace = run(8, 8);
        let clk: Vec<bool> = trace.iter().map(|s| s.1).collect();
        let clk90: Vec<bool> = trace.iter().map(|s| s.2).collect();
        assert_eq!(clk, [false, true, true, true, true, false, false, false]);
        assert_eq!(clk90, [false, false, false, true, true, true, true, false]);
    }

    #[test]
    fn test_half_duty_cycle() {
        for ratio in [4u32, 8, 20] {
            let trace = run(ratio, ratio as usize);
            assert_eq!(trace.iter().filter(|s| s.1).count(), ratio as usize / 2);
            assert_eq!(trace.iter().filter(|s| s.2).count(), ratio as usize / 2);
        }
    }

    #[test]
    fn test_reset_returns_to_strobe_phase() {
        let mut pc = PixelClock::new(8);
        pc.eval();
        pc.commit();
        assert!(!pc.strobe());
        pc.reset();
        assert!(pc.strobe());
    }
}
