//! Fixed-rule automaton.
//!
//! Each frame scans out `v_active` generations starting from `topline`. On
//! an evolving frame the second generation is copied back into `topline`,
//! so the picture scrolls up by one row per frame. At vsync the scan-out row
//! is reset to `topline` directly.

use serde::{Deserialize, Serialize};

use super::automaton::AutomatonCore;
use super::{App, AppBus};
use crate::ca::RuleTable;
use crate::config::Config;
use crate::palette::Rgb;
use crate::register::Clocked;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plain {
    core: AutomatonCore,
    rule: RuleTable,
}

impl Plain {
    pub fn new(config: &Config) -> Self {
        Plain {
            core: AutomatonCore::new(config),
            rule: RuleTable(config.automaton.rule),
        }
    }

    pub fn core(&self) -> &AutomatonCore {
        &self.core
    }

    pub fn rule(&self) -> RuleTable {
        self.rule
    }
}

impl App for Plain {
    fn eval(&mut self, bus: &AppBus) {
        let due = self.core.take_due(bus.tick);
        self.core.eval_freeze_keys(bus);
        self.core.scan(&bus.video, self.rule, bus.tick);
        if bus.video.vsync {
            self.core.end_frame(false);
            self.core.restore_active();
        }
        self.core.audio(bus);
        self.core.apply(&due);
    }

    fn rgb(&self) -> Rgb {
        self.core.rgb()
    }

    fn dac(&self) -> bool {
        self.core.dac()
    }

    fn describe(&self) -> String {
        let mut out = format!("plain rule={}\n", self.rule.number());
        self.core.describe(&mut out);
        out
    }
}

impl Clocked for Plain {
    fn commit(&mut self) {
        self.core.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testbus;
    use crate::config::Variant;
    use crate::peripherals::{Button, KeyEdges};

    const V_ACTIVE: u16 = 4;

    fn step(app: &mut Plain, bus: AppBus) {
        app.eval(&bus);
        app.commit();
    }

    /// One frame of row strobes: every row's pixels, its hsync, then vsync.
    fn frame(app: &mut Plain, tick: &mut u64) {
        for row in 0..V_ACTIVE {
            for col in 0..8 {
                step(app, testbus::pixel(*tick, col, row, V_ACTIVE));
                *tick += 1;
            }
            step(app, testbus::hsync(*tick, row, V_ACTIVE));
            *tick += 1;
            step(app, testbus::idle(*tick));
            *tick += 1;
        }
        step(app, testbus::vsync(*tick, V_ACTIVE));
        *tick += 1;
        step(app, testbus::idle(*tick));
        *tick += 1;
    }

    fn press(app: &mut Plain, tick: &mut u64, b: Button, held: u32) {
        step(app, testbus::keys(*tick, KeyEdges { held: held | b.mask(), pressed: b.mask(), released: 0 }));
        *tick += 1;
    }

    #[test]
    fn test_topline_advances_one_generation_per_frame() {
        let mut app = Plain::new(&Config::small(Variant::Plain));
        let mut tick = 0;
        frame(&mut app, &mut tick);
        assert_eq!(app.core().topline().to_string(), "00011100");
        assert_eq!(app.core().active_line(), app.core().topline());
        frame(&mut app, &mut tick);
        assert_eq!(app.core().topline().to_string(), "00100110");
    }

    #[test]
    fn test_single_step_round_trip() {
        let mut app = Plain::new(&Config::small(Variant::Plain));
        let mut tick = 0;
        press(&mut app, &mut tick, Button::Start, 0);
        // pause takes effect at the end of this frame
        frame(&mut app, &mut tick);
        assert!(app.core().freeze().frozen());
        assert_eq!(app.core().topline().to_string(), "00011100");
        for _ in 0..3 {
            frame(&mut app, &mut tick);
            assert_eq!(app.core().topline().to_string(), "00011100");
            assert_eq!(app.core().active_line().to_string(), "00011100");
        }

        press(&mut app, &mut tick, Button::Start, Button::Select.mask());
        frame(&mut app, &mut tick);
        assert!(!app.core().freeze().frozen());
        assert_eq!(app.core().topline().to_string(), "00011100");
        frame(&mut app, &mut tick);
        assert_eq!(app.core().topline().to_string(), "00100110");
        assert!(app.core().freeze().frozen());
        frame(&mut app, &mut tick);
        assert_eq!(app.core().topline().to_string(), "00100110");
    }

    #[test]
    fn test_step_while_running_starts_opening_freeze() {
        let mut app = Plain::new(&Config::small(Variant::Plain));
        let mut tick = 0;
        press(&mut app, &mut tick, Button::Start, Button::Select.mask());
        step(&mut app, testbus::idle(tick));
        assert_eq!(app.core().freeze().opening(), 63);
    }

    #[test]
    fn test_opening_freeze_holds_seed() {
        let mut config = Config::small(Variant::Plain);
        config.automaton.opening_frames = 2;
        let mut app = Plain::new(&config);
        let mut tick = 0;
        for _ in 0..3 {
            frame(&mut app, &mut tick);
            assert_eq!(app.core().topline().to_string(), "00001000");
        }
        frame(&mut app, &mut tick);
        assert_eq!(app.core().topline().to_string(), "00011100");
    }

    #[test]
    fn test_audio_line_follows_topline_at_vsync() {
        let mut app = Plain::new(&Config::small(Variant::Plain));
        let mut tick = 0;
        assert_eq!(app.core().audio_line().to_string(), "00001000");
        frame(&mut app, &mut tick);
        // copied at vsync, after the first row's backcopy
        assert_eq!(app.core().audio_line().to_string(), "00011100");
    }
}
