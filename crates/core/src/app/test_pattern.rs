//! Border and animated-zone test pattern with a square-wave tone.
//!
//! ## Picture
//!
//! One-pixel borders (top red, bottom pale yellow, left green, right blue)
//! frame two zones split at row `anim · (v_active / 64)`: the "current" zone
//! above the split and the "next" zone below it. The 6-bit `anim` counter
//! advances every frame, so the split sweeps down the screen; each wrap
//! advances `rotate1`, and each `rotate1` wrap advances `rotate2`.
//!
//! Zones are magenta with a fill pattern chosen from `rotate1`:
//!
//! | id | fill       | flash where          |
//! |----|------------|----------------------|
//! | 0  | plain      | never                |
//! | 1  | vertical   | `x` odd              |
//! | 2  | horizontal | `y` odd              |
//! | 3  | checker    | `x ^ y` odd          |
//!
//! The current zone uses fill `rotate1 + 1`, the next zone fill `rotate1`.
//! Flashing pixels are black or white depending on the high bits of both
//! rotate counters; the next zone shows the inverse.
//!
//! ## Tone
//!
//! A square wave at `base_hz << rotate1`, toggled on word strobes, XORed onto
//! the fixed word pattern of the serial line.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::{App, AppBus};
use crate::config::Config;
use crate::palette::Rgb;
use crate::peripherals::VideoStrobes;
use crate::register::{Clocked, Reg};

const ANIM_MASK: u8 = 0x3F;
const ANIM_STEPS: u16 = ANIM_MASK as u16 + 1;
const ROTATE_MASK: u8 = 0b11;

const TOP: Rgb = Rgb::new(0xFF, 0x00, 0x00);
const BOTTOM: Rgb = Rgb::new(0xFF, 0xFF, 0x80);
const LEFT: Rgb = Rgb::new(0x00, 0xFF, 0x00);
const RIGHT: Rgb = Rgb::new(0x00, 0x00, 0xFF);
const MAGENTA: Rgb = Rgb::new(0xA0, 0x00, 0x80);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Zone {
    Top,
    Bottom,
    Left,
    Right,
    Current,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fill {
    Plain,
    Vertical,
    Horizontal,
    Checker,
}

impl Fill {
    fn from_id(id: u8) -> Fill {
        match id & ROTATE_MASK {
            0 => Fill::Plain,
            1 => Fill::Vertical,
            2 => Fill::Horizontal,
            _ => Fill::Checker,
        }
    }

    fn flash(self, x: u16, y: u16) -> bool {
        match self {
            Fill::Plain => false,
            Fill::Vertical => x & 1 != 0,
            Fill::Horizontal => y & 1 != 0,
            Fill::Checker => (x ^ y) & 1 != 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestPattern {
    h_active: u16,
    /// Word strobes per tone half period at octave 0.
    half_period: u32,
    anim: Reg<u8>,
    rotate1: Reg<u8>,
    rotate2: Reg<u8>,
    rgb: Reg<Rgb>,
    dac: Reg<bool>,
    tone_level: Reg<bool>,
    tone_count: Reg<u32>,
}

impl TestPattern {
    pub fn new(config: &Config) -> Self {
        // word strobes arrive twice per sample
        let half_period = (config.audio.sample_rate / config.tone.base_hz.max(1)).max(1);
        TestPattern {
            h_active: config.video.h_active,
            half_period,
            anim: Reg::new(0),
            rotate1: Reg::new(0),
            rotate2: Reg::new(0),
            rgb: Reg::new(Rgb::BLACK),
            dac: Reg::new(false),
            tone_level: Reg::new(false),
            tone_count: Reg::new(0),
        }
    }

    pub fn counters(&self) -> (u8, u8, u8) {
        (self.anim.get(), self.rotate1.get(), self.rotate2.get())
    }

    /// Current tone half period in word strobes.
    pub fn tone_half_period(&self) -> u32 {
        (self.half_period >> self.rotate1.get()).max(1)
    }

    pub fn tone_level(&self) -> bool {
        self.tone_level.get()
    }

    fn zone(&self, col: u16, row: u16, v_active: u16) -> Zone {
        if row == 0 {
            Zone::Top
        } else if row + 1 == v_active {
            Zone::Bottom
        } else if col == 0 {
            Zone::Left
        } else if col + 1 == self.h_active {
            Zone::Right
        } else if row > self.anim.get() as u16 * (v_active / ANIM_STEPS) {
            Zone::Next
        } else {
            Zone::Current
        }
    }

    fn flash_color(&self) -> Rgb {
        let r1_hi = self.rotate1.get() & 0b10 != 0;
        let r2_hi = self.rotate2.get() & 0b10 != 0;
        // (rotate1[1] + 1) ^ rotate2[1] is two bits wide: a carry keeps it nonzero
        if !r1_hi && r2_hi {
            Rgb::WHITE
        } else {
            Rgb::BLACK
        }
    }

    fn shade(&self, v: &VideoStrobes, col: u16, row: u16) -> Rgb {
        let r1 = self.rotate1.get();
        match self.zone(col, row, v.v_active) {
            Zone::Top => TOP,
            Zone::Bottom => BOTTOM,
            Zone::Left => LEFT,
            // blue; the gateware repeats the TOP case and leaves this column black
            Zone::Right => RIGHT,
            Zone::Current => {
                if Fill::from_id(r1.wrapping_add(1)).flash(v.x, v.y) {
                    self.flash_color()
                } else {
                    MAGENTA
                }
            }
            Zone::Next => {
                if Fill::from_id(r1).flash(v.x, v.y) {
                    self.flash_color().inverted()
                } else {
                    MAGENTA
                }
            }
        }
    }

    fn end_frame(&mut self) {
        let anim = self.anim.get();
        self.anim.drive((anim + 1) & ANIM_MASK);
        if anim == ANIM_MASK {
            let r1 = self.rotate1.get();
            self.rotate1.drive((r1 + 1) & ROTATE_MASK);
            if r1 == ROTATE_MASK {
                self.rotate2.drive((self.rotate2.get() + 1) & ROTATE_MASK);
            }
        }
    }
}

impl App for TestPattern {
    fn eval(&mut self, bus: &AppBus) {
        let v = &bus.video;
        if v.pixel {
            self.rgb.drive(Rgb::BLACK);
            if let Some((col, row)) = v.pixel_position() {
                self.rgb.drive(self.shade(v, col, row));
            }
        }
        if v.frame_end {
            self.end_frame();
        }

        let a = &bus.audio;
        if a.word {
            let count = self.tone_count.get() + 1;
            if count >= self.tone_half_period() {
                self.tone_count.drive(0);
                self.tone_level.drive(!self.tone_level.get());
            } else {
                self.tone_count.drive(count);
            }
        }
        if a.bit {
            self.dac.drive(a.dac_bit(self.tone_level.get()));
        }
    }

    fn rgb(&self) -> Rgb {
        self.rgb.get()
    }

    fn dac(&self) -> bool {
        self.dac.get()
    }

    fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "test_pattern anim={} rotate1={} rotate2={} tone_half_period={} tone={}",
            self.anim.get(),
            self.rotate1.get(),
            self.rotate2.get(),
            self.tone_half_period(),
            self.tone_level.get() as u8
        );
        out
    }
}

impl Clocked for TestPattern {
    fn commit(&mut self) {
        self.anim.commit();
        self.rotate1.commit();
        self.rotate2.commit();
        self.rgb.commit();
        self.dac.commit();
        self.tone_level.commit();
        self.tone_count.commit();
    }
}
