//! Interactive automaton: rule selection, evolution speed and scribbles.
//!
//! ## Controls
//!
//! | Input            | Effect                                                |
//! |------------------|-------------------------------------------------------|
//! | Up/Left/Right/Down | select rule 30 / 110 / 106 / 14 at the next vsync   |
//! | L1 / R1          | slower / faster (speed mask shift, saturating)        |
//! | A / B            | ink / paper dot at the row centre                     |
//! | X / Y            | ink / paper five-point burst at the row centre        |
//! | Select + A/B/X/Y | same mark, injected once                              |
//! | Start, Select+Start | pause and single step, as in the plain variant     |
//!
//! A frame only evolves the seed when `speed_counter & speed_mask == 0`.
//! Scribbles edit `topline` at vsync, so the scan-out row is restored one
//! tick later through the deferred-write queue to pick the edits up.

use std::fmt::Write as _;

use log::debug;
use serde::{Deserialize, Serialize};

use super::automaton::AutomatonCore;
use super::{App, AppBus};
use crate::ca::{Row, RuleTable};
use crate::config::Config;
use crate::palette::Rgb;
use crate::peripherals::{Button, KeyEdges};
use crate::register::{Clocked, Reg};
use crate::schedule::Deferred;

/// Slowest speed: one evolving frame in 256.
pub const SPEED_MASK_MAX: u8 = 0xFF;

const RULE_KEYS: [(Button, RuleTable); 4] = [
    (Button::Up, RuleTable::RULE_30),
    (Button::Left, RuleTable::RULE_110),
    (Button::Right, RuleTable::RULE_106),
    (Button::Down, RuleTable::RULE_14),
];

const INK_DOT: u8 = 1 << 0;
const PAPER_DOT: u8 = 1 << 1;
const INK_BURST: u8 = 1 << 2;
const PAPER_BURST: u8 = 1 << 3;

const SCRIBBLE_KEYS: [(Button, u8); 4] = [
    (Button::A, INK_DOT),
    (Button::B, PAPER_DOT),
    (Button::X, INK_BURST),
    (Button::Y, PAPER_BURST),
];

const BURST_OFFSETS: [isize; 5] = [-6, -3, 0, 3, 6];

fn scribble_bits(word: u32) -> u8 {
    SCRIBBLE_KEYS
        .iter()
        .filter(|(b, _)| word & b.mask() != 0)
        .fold(0, |acc, &(_, bit)| acc | bit)
}

/// Apply scribble marks to `row`. Paper marks go on after ink, so paper
/// wins where both touch.
fn scribble(mut row: Row, marks: u8) -> Row {
    let c = row.width() / 2;
    if marks & INK_DOT != 0 {
        row.set(c, true);
    }
    if marks & INK_BURST != 0 {
        for off in BURST_OFFSETS {
            row.set_wrapped(c, off, true);
        }
    }
    if marks & PAPER_DOT != 0 {
        row.set(c, false);
    }
    if marks & PAPER_BURST != 0 {
        for off in BURST_OFFSETS {
            row.set_wrapped(c, off, false);
        }
    }
    row
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sandbox {
    core: AutomatonCore,
    rule: Reg<RuleTable>,
    rule_pending: Reg<RuleTable>,
    speed_mask: Reg<u8>,
    speed_counter: Reg<u8>,
    scribble_hold: Reg<u8>,
    scribble_single: Reg<u8>,
}

impl Sandbox {
    pub fn new(config: &Config) -> Self {
        let rule = RuleTable(config.automaton.rule);
        Sandbox {
            core: AutomatonCore::new(config),
            rule: Reg::new(rule),
            rule_pending: Reg::new(rule),
            speed_mask: Reg::new(0),
            speed_counter: Reg::new(0),
            scribble_hold: Reg::new(0),
            scribble_single: Reg::new(0),
        }
    }

    pub fn core(&self) -> &AutomatonCore {
        &self.core
    }

    pub fn rule(&self) -> RuleTable {
        self.rule.get()
    }

    pub fn speed_mask(&self) -> u8 {
        self.speed_mask.get()
    }

    fn eval_controls(&mut self, keys: &KeyEdges) {
        for (button, rule) in RULE_KEYS {
            if keys.is_pressed(button) {
                debug!("rule {} selected", rule.number());
                self.rule_pending.drive(rule);
            }
        }

        let mut mask = self.speed_mask.get();
        if keys.is_pressed(Button::L1) {
            mask = (mask << 1) | 1;
        }
        if keys.is_pressed(Button::R1) {
            mask >>= 1;
        }
        if mask != self.speed_mask.get() {
            debug!("speed mask {:#04x}", mask);
            self.speed_mask.drive(mask);
        }

        if keys.is_held(Button::Select) {
            self.scribble_hold.drive(0);
            let presses = scribble_bits(keys.pressed);
            if presses != 0 {
                self.scribble_single.drive(self.scribble_single.get() | presses);
            }
        } else {
            self.scribble_hold.drive(scribble_bits(keys.held));
        }
    }

    fn end_frame(&mut self, bus: &AppBus) {
        let counter = self.speed_counter.get();
        let rollover = counter & self.speed_mask.get() == 0;
        self.core.end_frame(!rollover);
        self.speed_counter.drive(counter.wrapping_add(1));
        self.rule.drive(self.rule_pending.get());

        let marks = self.scribble_hold.get() | self.scribble_single.get();
        if marks != 0 {
            self.core.drive_topline(scribble(self.core.topline(), marks));
        }
        // singles pressed on this very tick wait for the next frame
        let late = if bus.keys.is_held(Button::Select) { scribble_bits(bus.keys.pressed) } else { 0 };
        self.scribble_single.drive(late);

        self.core.schedule_at(bus.tick + 1, Deferred::RestoreActive);
    }
}

impl App for Sandbox {
    fn eval(&mut self, bus: &AppBus) {
        let due = self.core.take_due(bus.tick);
        self.core.eval_freeze_keys(bus);
        self.eval_controls(&bus.keys);
        self.core.scan(&bus.video, self.rule.get(), bus.tick);
        if bus.video.vsync {
            self.end_frame(bus);
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
        let mut out = String::new();
        let _ = writeln!(
            out,
            "sandbox rule={} pending={} speed_mask={:#04x} speed_counter={} hold={:04b} single={:04b}",
            self.rule.get().number(),
            self.rule_pending.get().number(),
            self.speed_mask.get(),
            self.speed_counter.get(),
            self.scribble_hold.get(),
            self.scribble_single.get(),
        );
        self.core.describe(&mut out);
        out
    }
}

impl Clocked for Sandbox {
    fn commit(&mut self) {
        self.core.commit();
        self.rule.commit();
        self.rule_pending.commit();
        self.speed_mask.commit();
        self.speed_counter.commit();
        self.scribble_hold.commit();
        self.scribble_single.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testbus;
    use crate::config::Variant;

    const V_ACTIVE: u16 = 4;

    fn sandbox() -> Sandbox {
        let mut config = Config::small(Variant::Sandbox);
        config.video.h_active = 16;
        config.video.h_total = 20;
        Sandbox::new(&config)
    }

    fn step(app: &mut Sandbox, bus: AppBus) {
        app.eval(&bus);
        app.commit();
    }

    fn held(word: u32) -> KeyEdges {
        KeyEdges { held: word, pressed: 0, released: 0 }
    }

    /// Scan every row with `keys` held throughout.
    fn rows(app: &mut Sandbox, tick: &mut u64, keys: KeyEdges) {
        for row in 0..V_ACTIVE {
            for col in 0..16 {
                let mut bus = testbus::pixel(*tick, col, row, V_ACTIVE);
                bus.keys = keys;
                step(app, bus);
                *tick += 1;
            }
            let mut bus = testbus::hsync(*tick, row, V_ACTIVE);
            bus.keys = keys;
            step(app, bus);
            *tick += 1;
            step(app, testbus::keys(*tick, keys));
            *tick += 1;
        }
    }

    /// One frame holding `hold`; `vsync_press` is pressed on the vsync tick.
    fn frame_with(app: &mut Sandbox, tick: &mut u64, hold: u32, vsync_press: u32) {
        rows(app, tick, held(hold));
        let mut bus = testbus::vsync(*tick, V_ACTIVE);
        bus.keys = KeyEdges { held: hold | vsync_press, pressed: vsync_press, released: 0 };
        step(app, bus);
        *tick += 1;
        step(app, testbus::keys(*tick, held(hold)));
        *tick += 1;
    }

    fn frame(app: &mut Sandbox, tick: &mut u64) {
        frame_with(app, tick, 0, 0);
    }

    fn press(app: &mut Sandbox, tick: &mut u64, b: Button, also_held: u32) {
        step(app, testbus::keys(*tick, KeyEdges { held: also_held | b.mask(), pressed: b.mask(), released: 0 }));
        *tick += 1;
    }

    /// Pause after one evolving frame so the seed only changes by scribbles.
    fn paused_sandbox(tick: &mut u64) -> Sandbox {
        let mut app = sandbox();
        press(&mut app, tick, Button::Start, 0);
        frame(&mut app, tick);
        assert!(app.core().freeze().frozen());
        assert_eq!(app.core().topline().to_string(), "0000000111000000");
        app
    }

    #[test]
    fn test_scribble_marks() {
        let row = Row::new(16);
        assert_eq!(scribble(row, INK_DOT).to_string(), "0000000010000000");
        assert_eq!(scribble(row, INK_BURST).to_string(), "0010010010010010");
        let full: Row = "1111111111111111".parse().unwrap();
        assert_eq!(scribble(full, PAPER_BURST).to_string(), "1101101101101101");
        assert_eq!(scribble(row, INK_BURST | PAPER_DOT).to_string(), "0010010000010010");
    }

    #[test]
    fn test_burst_wraps_on_narrow_rows() {
        let row = Row::new(8);
        // centre 4: offsets land on 6, 1, 4, 7, 2
        assert_eq!(scribble(row, INK_BURST).to_string(), "01101011");
    }

    #[test]
    fn test_speed_mask_saturates() {
        let mut app = sandbox();
        let mut tick = 0;
        for _ in 0..10 {
            press(&mut app, &mut tick, Button::L1, 0);
            step(&mut app, testbus::idle(tick));
            tick += 1;
        }
        assert_eq!(app.speed_mask(), SPEED_MASK_MAX);
        for _ in 0..10 {
            press(&mut app, &mut tick, Button::R1, 0);
            step(&mut app, testbus::idle(tick));
            tick += 1;
        }
        assert_eq!(app.speed_mask(), 0);
    }

    #[test]
    fn test_speed_mask_slows_evolution() {
        let mut app = sandbox();
        let mut tick = 0;
        press(&mut app, &mut tick, Button::L1, 0);
        assert_eq!(app.speed_mask(), 1);
        let mut seeds = Vec::new();
        for _ in 0..5 {
            frame(&mut app, &mut tick);
            seeds.push(app.core().topline());
        }
        // odd counter values hold the following frame
        assert_ne!(seeds[0], seeds[1]);
        assert_eq!(seeds[1], seeds[2]);
        assert_ne!(seeds[2], seeds[3]);
        assert_eq!(seeds[3], seeds[4]);
    }

    #[test]
    fn test_step_ignores_speed_mask() {
        let mut app = sandbox();
        let mut tick = 0;
        for _ in 0..8 {
            press(&mut app, &mut tick, Button::L1, 0);
        }
        frame(&mut app, &mut tick);
        frame(&mut app, &mut tick);
        assert!(app.core().freeze().frozen());
        let before = app.core().topline();
        press(&mut app, &mut tick, Button::Start, Button::Select.mask());
        frame(&mut app, &mut tick);
        assert!(!app.core().freeze().frozen());
        frame(&mut app, &mut tick);
        assert_ne!(app.core().topline(), before);
    }

    #[test]
    fn test_rule_latches_at_vsync() {
        let mut app = sandbox();
        let mut tick = 0;
        press(&mut app, &mut tick, Button::Left, 0);
        assert_eq!(app.rule(), RuleTable::RULE_30);
        frame(&mut app, &mut tick);
        assert_eq!(app.rule(), RuleTable::RULE_110);
        press(&mut app, &mut tick, Button::Down, 0);
        press(&mut app, &mut tick, Button::Right, 0);
        frame(&mut app, &mut tick);
        assert_eq!(app.rule(), RuleTable::RULE_106);
    }

    #[test]
    fn test_held_scribble_applies_every_vsync() {
        let mut tick = 0;
        let mut app = paused_sandbox(&mut tick);
        frame_with(&mut app, &mut tick, Button::B.mask(), 0);
        assert_eq!(app.core().topline().to_string(), "0000000101000000");
        // restored into the scan-out row one tick after vsync
        assert_eq!(app.core().active_line(), app.core().topline());

        frame_with(&mut app, &mut tick, Button::A.mask(), 0);
        assert_eq!(app.core().topline().to_string(), "0000000111000000");
    }

    #[test]
    fn test_single_scribble_applies_once() {
        let mut tick = 0;
        let mut app = paused_sandbox(&mut tick);
        press(&mut app, &mut tick, Button::B, Button::Select.mask());
        frame(&mut app, &mut tick);
        assert_eq!(app.core().topline().to_string(), "0000000101000000");

        // ink it back by holding A, then check the single does not return
        frame_with(&mut app, &mut tick, Button::A.mask(), 0);
        frame(&mut app, &mut tick);
        assert_eq!(app.core().topline().to_string(), "0000000111000000");
    }

    #[test]
    fn test_select_suppresses_hold() {
        let mut tick = 0;
        let mut app = paused_sandbox(&mut tick);
        frame_with(&mut app, &mut tick, Button::Select.mask() | Button::B.mask(), 0);
        assert_eq!(app.core().topline().to_string(), "0000000111000000");
    }

    #[test]
    fn test_single_pressed_on_vsync_tick_is_kept() {
        let mut tick = 0;
        let mut app = paused_sandbox(&mut tick);
        frame_with(&mut app, &mut tick, Button::Select.mask(), Button::X.mask());
        assert_eq!(app.core().topline().to_string(), "0000000111000000");
        frame(&mut app, &mut tick);
        assert_eq!(app.core().topline().to_string(), "0010010111010010");
    }

    #[test]
    fn test_restore_is_deferred_one_tick() {
        let mut app = sandbox();
        let mut tick = 0;
        rows(&mut app, &mut tick, KeyEdges::default());
        step(&mut app, testbus::vsync(tick, V_ACTIVE));
        tick += 1;
        assert!(app.core().schedule().contains(Deferred::RestoreActive));
        assert_ne!(app.core().active_line(), app.core().topline());
        step(&mut app, testbus::idle(tick));
        assert!(app.core().schedule().is_empty());
        assert_eq!(app.core().active_line(), app.core().topline());
    }
}
