//! Pause, single step and the opening freeze.
//!
//! The frozen flag is only ever latched on vsync, so a frame is either
//! evolved completely or not at all. Start toggles pause; Select+Start asks
//! for one evolved frame. Asked while running, the step also re-arms the
//! opening countdown one tick later, which freezes the picture again for
//! the next [`OPENING_FRAMES_MAX`] frames.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::OPENING_FRAMES_MAX;
use crate::peripherals::{Button, KeyEdges};
use crate::register::{Clocked, Reg};
use crate::schedule::{Deferred, Schedule};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreezeControl {
    frame_frozen: Reg<bool>,
    opening: Reg<u8>,
    pause: Reg<bool>,
    step: Reg<bool>,
}

impl FreezeControl {
    pub fn new(opening_frames: u8) -> Self {
        let opening_frames = opening_frames.min(OPENING_FRAMES_MAX);
        FreezeControl {
            frame_frozen: Reg::new(opening_frames != 0),
            opening: Reg::new(opening_frames),
            pause: Reg::new(false),
            step: Reg::new(false),
        }
    }

    /// Whether the current frame leaves the seed row untouched.
    #[inline]
    pub fn frozen(&self) -> bool {
        self.frame_frozen.get()
    }

    pub fn paused(&self) -> bool {
        self.pause.get()
    }

    pub fn step_pending(&self) -> bool {
        self.step.get()
    }

    /// Frames left in the opening freeze.
    pub fn opening(&self) -> u8 {
        self.opening.get()
    }

    pub fn eval_keys(&mut self, keys: &KeyEdges, schedule: &mut Schedule, tick: u64) {
        if !keys.is_pressed(Button::Start) {
            return;
        }
        if keys.is_held(Button::Select) {
            if self.pause.get() {
                debug!("tick {}: single step", tick);
            } else {
                debug!("tick {}: single step, re-arming opening freeze", tick);
                schedule.push(tick + 1, Deferred::RearmOpening);
            }
            self.step.drive(true);
        } else {
            debug!("tick {}: pause {}", tick, if self.pause.get() { "off" } else { "on" });
            self.pause.drive(!self.pause.get());
        }
    }

    /// Latch next frame's frozen state. `hold` adds a variant-specific reason
    /// to stay frozen; a pending step overrides every reason.
    pub fn eval_vsync(&mut self, hold: bool) {
        let opening = self.opening.get();
        if self.step.get() {
            self.frame_frozen.drive(false);
            self.step.drive(false);
        } else {
            self.frame_frozen.drive(opening != 0 || self.pause.get() || hold);
        }
        if opening != 0 {
            self.opening.drive(opening - 1);
        }
    }

    /// Restart the opening countdown.
    pub fn rearm(&mut self) {
        self.opening.drive(OPENING_FRAMES_MAX);
    }
}

impl Clocked for FreezeControl {
    fn commit(&mut self) {
        self.frame_frozen.commit();
        self.opening.commit();
        self.pause.commit();
        self.step.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(b: Button, held: u32) -> KeyEdges {
        KeyEdges { held: held | b.mask(), pressed: b.mask(), released: 0 }
    }

    fn vsync(fc: &mut FreezeControl, hold: bool) {
        fc.eval_vsync(hold);
        fc.commit();
    }

    #[test]
    fn test_opening_countdown() {
        let mut fc = FreezeControl::new(3);
        assert!(fc.frozen());
        let mut frozen = Vec::new();
        for _ in 0..5 {
            vsync(&mut fc, false);
            frozen.push(fc.frozen());
        }
        // the flag samples the countdown before it decrements
        assert_eq!(frozen, [true, true, true, false, false]);
        assert_eq!(fc.opening(), 0);
    }

    #[test]
    fn test_no_opening() {
        let fc = FreezeControl::new(0);
        assert!(!fc.frozen());
    }

    #[test]
    fn test_pause_only_latches_at_vsync() {
        let mut fc = FreezeControl::new(0);
        let mut sched = Schedule::new();
        fc.eval_keys(&press(Button::Start, 0), &mut sched, 10);
        fc.commit();
        assert!(fc.paused());
        assert!(!fc.frozen());
        vsync(&mut fc, false);
        assert!(fc.frozen());
        assert!(sched.is_empty());
    }

    #[test]
    fn test_step_while_paused() {
        let mut fc = FreezeControl::new(0);
        let mut sched = Schedule::new();
        fc.eval_keys(&press(Button::Start, 0), &mut sched, 0);
        fc.commit();
        vsync(&mut fc, false);
        assert!(fc.frozen());

        fc.eval_keys(&press(Button::Start, Button::Select.mask()), &mut sched, 100);
        fc.commit();
        assert!(fc.paused() && fc.step_pending());
        assert!(sched.is_empty());

        vsync(&mut fc, false);
        assert!(!fc.frozen());
        assert!(!fc.step_pending());
        vsync(&mut fc, false);
        assert!(fc.frozen());
    }

    #[test]
    fn test_step_while_running_rearms() {
        let mut fc = FreezeControl::new(0);
        let mut sched = Schedule::new();
        fc.eval_keys(&press(Button::Start, Button::Select.mask()), &mut sched, 50);
        fc.commit();
        assert!(!fc.paused());
        assert_eq!(sched.take_due(51).as_slice(), &[Deferred::RearmOpening]);
        fc.rearm();
        fc.commit();
        assert_eq!(fc.opening(), OPENING_FRAMES_MAX);
        // the step still lets one frame through
        vsync(&mut fc, false);
        assert!(!fc.frozen());
        vsync(&mut fc, false);
        assert!(fc.frozen());
    }

    #[test]
    fn test_hold_reason_and_step_override() {
        let mut fc = FreezeControl::new(0);
        vsync(&mut fc, true);
        assert!(fc.frozen());
        let mut sched = Schedule::new();
        fc.eval_keys(&press(Button::Start, Button::Select.mask()), &mut sched, 7);
        fc.commit();
        vsync(&mut fc, true);
        assert!(!fc.frozen());
    }

    #[test]
    fn test_step_on_vsync_tick_waits_for_next_vsync() {
        let mut fc = FreezeControl::new(0);
        let mut sched = Schedule::new();
        fc.eval_keys(&press(Button::Start, 0), &mut sched, 0);
        fc.commit();
        // press lands on the vsync tick itself: it carries to the next vsync
        fc.eval_keys(&press(Button::Start, Button::Select.mask()), &mut sched, 9);
        fc.eval_vsync(false);
        fc.commit();
        assert!(fc.frozen());
        assert!(fc.step_pending());

        vsync(&mut fc, false);
        assert!(!fc.frozen());
        assert!(!fc.step_pending());
        vsync(&mut fc, false);
        assert!(fc.frozen());
    }
}
