//! Row registers shared by the automaton variants.
//!
//! ## Rows
//!
//! - `topline`: seed of the next frame. Backcopied from `active_line` one
//!   tick after the first row's rule pass, unless the frame is frozen.
//! - `active_line`: the row being scanned out. Every emitted pixel takes bit
//!   0 and rotates right; after `h_active` pixels the row is back in place
//!   and the row-finished strobe applies the rule to it.
//! - `audio_line`: a copy of `topline` taken at vsync on evolving frames,
//!   rotated once every four word strobes to drive the tone.

use std::fmt::Write as _;

use heapless::Vec as FixedVec;
use serde::{Deserialize, Serialize};

use super::freeze::FreezeControl;
use super::AppBus;
use crate::ca::{evolve, Row, RuleTable};
use crate::config::{Config, Seed};
use crate::palette::{Palette, Rgb};
use crate::peripherals::VideoStrobes;
use crate::register::{Clocked, Reg};
use crate::schedule::{Deferred, Schedule, SCHEDULE_CAPACITY};

/// Word strobes per audio row rotation, as a 2-bit divider.
const AUDIO_DIVIDER_MASK: u8 = 0b11;

pub(crate) fn seed_row(config: &Config) -> Row {
    let width = config.video.h_active as usize;
    match &config.automaton.seed {
        Seed::Center => Row::centered(width),
        Seed::Columns(cols) => Row::with_cells(width, cols.iter().map(|&c| c as usize)),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomatonCore {
    palette: Palette,
    topline: Reg<Row>,
    active: Reg<Row>,
    audio_line: Reg<Row>,
    audio_divider: Reg<u8>,
    rgb: Reg<Rgb>,
    dac: Reg<bool>,
    freeze: FreezeControl,
    schedule: Schedule,
}

impl AutomatonCore {
    pub fn new(config: &Config) -> Self {
        let seed = seed_row(config);
        AutomatonCore {
            palette: config.automaton.palette,
            topline: Reg::new(seed),
            active: Reg::new(seed),
            audio_line: Reg::new(seed),
            audio_divider: Reg::new(AUDIO_DIVIDER_MASK),
            rgb: Reg::new(Rgb::BLACK),
            dac: Reg::new(false),
            freeze: FreezeControl::new(config.automaton.opening_frames),
            schedule: Schedule::new(),
        }
    }

    pub fn topline(&self) -> Row {
        self.topline.get()
    }

    pub fn active_line(&self) -> Row {
        self.active.get()
    }

    pub fn audio_line(&self) -> Row {
        self.audio_line.get()
    }

    pub fn freeze(&self) -> &FreezeControl {
        &self.freeze
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub(super) fn rgb(&self) -> Rgb {
        self.rgb.get()
    }

    pub(super) fn dac(&self) -> bool {
        self.dac.get()
    }

    // ─── Per-tick pieces, called in order by the variants ──────────────────

    /// Pop the deferred writes firing this tick. They are applied last, via
    /// [`AutomatonCore::apply`], so they override any same-tick drive.
    pub(super) fn take_due(&mut self, tick: u64) -> FixedVec<Deferred, SCHEDULE_CAPACITY> {
        self.schedule.take_due(tick)
    }

    pub(super) fn eval_freeze_keys(&mut self, bus: &AppBus) {
        self.freeze.eval_keys(&bus.keys, &mut self.schedule, bus.tick);
    }

    /// Pixel emission and the per-row rule pass.
    pub(super) fn scan(&mut self, v: &VideoStrobes, rule: RuleTable, tick: u64) {
        if v.pixel {
            self.rgb.drive(Rgb::BLACK);
        }
        if v.active {
            let row = self.active.get();
            self.rgb.drive(self.palette.pick(row.lsb()));
            self.active.drive(row.rotate_right());
        }
        if v.evolve_row() {
            self.active.drive(evolve(&self.active.get(), rule));
            if v.row == Some(0) && !self.freeze.frozen() {
                self.schedule.push(tick + 1, Deferred::BackcopyTopline);
            }
        }
    }

    /// Vsync bookkeeping common to both automaton variants.
    pub(super) fn end_frame(&mut self, hold: bool) {
        self.freeze.eval_vsync(hold);
        if !self.freeze.frozen() {
            self.audio_line.drive(self.topline.get());
        }
    }

    pub(super) fn drive_topline(&mut self, row: Row) {
        self.topline.drive(row);
    }

    pub(super) fn restore_active(&mut self) {
        self.active.drive(self.topline.get());
    }

    pub(super) fn schedule_at(&mut self, tick: u64, action: Deferred) {
        self.schedule.push(tick, action);
    }

    /// Serial DAC bit and the audio row rotation.
    pub(super) fn audio(&mut self, bus: &AppBus) {
        let a = &bus.audio;
        if a.bit {
            self.dac.drive(a.dac_bit(self.audio_line.get().lsb()));
        }
        if a.word && !bus.video.vsync {
            let div = self.audio_divider.get();
            if div == 0 {
                self.audio_line.drive(self.audio_line.get().rotate_right());
            }
            self.audio_divider.drive((div + 1) & AUDIO_DIVIDER_MASK);
        }
    }

    pub(super) fn apply(&mut self, due: &[Deferred]) {
        for action in due {
            match action {
                Deferred::RestoreActive => self.active.drive(self.topline.get()),
                Deferred::BackcopyTopline => self.topline.drive(self.active.get()),
                Deferred::RearmOpening => self.freeze.rearm(),
            }
        }
    }

    pub(super) fn describe(&self, out: &mut String) {
        let f = &self.freeze;
        let _ = writeln!(
            out,
            "frozen={} paused={} step={} opening={} pending={}",
            f.frozen(),
            f.paused(),
            f.step_pending(),
            f.opening(),
            self.schedule.len()
        );
        let _ = writeln!(out, "topline    {}", self.topline.get());
        let _ = writeln!(out, "active     {}", self.active.get());
        let _ = writeln!(out, "audio_line {}", self.audio_line.get());
    }
}

impl Clocked for AutomatonCore {
    fn commit(&mut self) {
        self.topline.commit();
        self.active.commit();
        self.audio_line.commit();
        self.audio_divider.commit();
        self.rgb.commit();
        self.dac.commit();
        self.freeze.commit();
    }
}
