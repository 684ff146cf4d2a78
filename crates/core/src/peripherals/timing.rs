//! Video timing generator.
//!
//! Walks the beam `(x, y)` over `h_total × v_total` positions, one step per
//! pixel strobe, and derives the strobes the app logic keys off.
//!
//! ## Strobes (all qualified by the pixel strobe)
//!
//! | Strobe      | Condition                                              |
//! |-------------|--------------------------------------------------------|
//! | `active`    | `x ∈ [hbp, hbp+hact)` and `y ∈ [vbp, vbp+vact)`        |
//! | `hsync`     | `x == hbp + hact` (one step after the last column)     |
//! | `vsync`     | `x == hbp + hact + 1` and `y == vbp + vact − 1`        |
//! | `frame_end` | `x == h_total − 1` and `y == v_total − 1`              |
//!
//! The external `hs`/`vs`/`de` lines are registered on each strobe:
//! `vs` marks position (0, 0), `hs` position (3, y) so it always trails `vs`
//! by three pixels, and `de` follows `active`.
//!
//! The docked input is latched on `frame_end`; the latched value selects the
//! active height for the whole following frame.

use serde::{Deserialize, Serialize};

use crate::config::VideoTiming;
use crate::register::{Clocked, Reg};

/// Column where the registered `hs` pulse is raised.
pub const HS_COLUMN: u16 = 3;

/// Combinational view of the beam for one reference tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoStrobes {
    /// Pixel strobe from the divider.
    pub pixel: bool,
    pub x: u16,
    pub y: u16,
    pub active: bool,
    pub hsync: bool,
    pub vsync: bool,
    pub frame_end: bool,
    /// Row index inside the vertical active window, if the beam is in it.
    pub row: Option<u16>,
    /// Column index inside the horizontal active window, if the beam is in it.
    pub col: Option<u16>,
    /// Active height of the current frame.
    pub v_active: u16,
}

impl VideoStrobes {
    /// Row-finished strobe on a row whose successor is still in the window.
    #[inline]
    pub fn evolve_row(&self) -> bool {
        self.hsync && matches!(self.row, Some(r) if r + 1 < self.v_active)
    }

    /// Pixel position inside the active area, when a pixel is emitted this tick.
    #[inline]
    pub fn pixel_position(&self) -> Option<(u16, u16)> {
        if self.active {
            Some((self.col?, self.row?))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingGenerator {
    timing: VideoTiming,
    x: Reg<u16>,
    y: Reg<u16>,
    hs: Reg<bool>,
    vs: Reg<bool>,
    de: Reg<bool>,
    docked: Reg<bool>,
}

impl TimingGenerator {
    pub fn new(timing: VideoTiming) -> Self {
        TimingGenerator {
            timing,
            x: Reg::new(0),
            y: Reg::new(0),
            hs: Reg::new(false),
            vs: Reg::new(false),
            de: Reg::new(false),
            docked: Reg::new(false),
        }
    }

    pub fn reset(&mut self) {
        *self = TimingGenerator::new(self.timing);
    }

    pub fn timing(&self) -> &VideoTiming {
        &self.timing
    }

    pub fn x(&self) -> u16 {
        self.x.get()
    }

    pub fn y(&self) -> u16 {
        self.y.get()
    }

    pub fn hs(&self) -> bool {
        self.hs.get()
    }

    pub fn vs(&self) -> bool {
        self.vs.get()
    }

    pub fn de(&self) -> bool {
        self.de.get()
    }

    /// Dock state latched for the current frame.
    pub fn docked(&self) -> bool {
        self.docked.get()
    }

    /// Active height of the current frame.
    pub fn v_active(&self) -> u16 {
        self.timing.v_active_for(self.docked.get())
    }

    pub fn strobes(&self, pixel: bool) -> VideoStrobes {
        let t = &self.timing;
        let (x, y) = (self.x.get(), self.y.get());
        let v_active = self.v_active();
        let h_end = t.h_bporch + t.h_active;
        let v_end = t.v_bporch + v_active;

        let col = (x >= t.h_bporch && x < h_end).then(|| x - t.h_bporch);
        let row = (y >= t.v_bporch && y < v_end).then(|| y - t.v_bporch);

        VideoStrobes {
            pixel,
            x,
            y,
            active: pixel && col.is_some() && row.is_some(),
            hsync: pixel && x == h_end,
            vsync: pixel && x == h_end + 1 && y + 1 == v_end,
            frame_end: pixel && x + 1 == t.h_total && y + 1 == t.v_total,
            row,
            col,
            v_active,
        }
    }

    pub fn eval(&mut self, s: &VideoStrobes, docked: bool) {
        if !s.pixel {
            return;
        }
        let (x, y) = (s.x, s.y);
        self.vs.drive(x == 0 && y == 0);
        self.hs.drive(x == HS_COLUMN);
        self.de.drive(s.active);

        if x + 1 == self.timing.h_total {
            self.x.drive(0);
            self.y.drive(if y + 1 == self.timing.v_total { 0 } else { y + 1 });
        } else {
            self.x.drive(x + 1);
        }

        if s.frame_end {
            self.docked.drive(docked);
        }
    }
}

impl Clocked for TimingGenerator {
    fn commit(&mut self) {
        self.x.commit();
        self.y.commit();
        self.hs.commit();
        self.vs.commit();
        self.de.commit();
        self.docked.commit();
    }
}
