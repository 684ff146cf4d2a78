//! App logic: the part of the core that decides what each pixel and each
//! serial audio bit carries.
//!
//! The fixed-function blocks (pixel divider, timing generator, audio clocks,
//! input latch) are identical for every build. What changes is the app
//! behind the [`App`] trait, chosen once from [`Variant`] when the system is
//! built. [`AppLogic`] is the closed set of variants; it dispatches with a
//! plain `match` so the tick path stays free of dynamic calls.
//!
//! Each tick the app receives an [`AppBus`] describing the strobes computed
//! from the registered state, drives its own registers, and exposes the
//! registered `rgb` / `dac` outputs after commit.

mod automaton;
mod freeze;
mod plain;
mod sandbox;
mod test_pattern;

pub use automaton::AutomatonCore;
pub use freeze::FreezeControl;
pub use plain::Plain;
pub use sandbox::{Sandbox, SPEED_MASK_MAX};
pub use test_pattern::TestPattern;

use serde::{Deserialize, Serialize};

use crate::config::{Config, Variant};
use crate::palette::Rgb;
use crate::peripherals::{AudioStrobes, KeyEdges, VideoStrobes};
use crate::register::Clocked;

/// Everything the app logic sees on one reference tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppBus {
    pub tick: u64,
    pub video: VideoStrobes,
    pub audio: AudioStrobes,
    pub keys: KeyEdges,
}

pub trait App: Clocked {
    fn eval(&mut self, bus: &AppBus);

    /// Registered pixel value.
    fn rgb(&self) -> Rgb;

    /// Registered serial audio line.
    fn dac(&self) -> bool;

    /// Human-readable register summary.
    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AppLogic {
    Plain(Plain),
    Sandbox(Sandbox),
    TestPattern(TestPattern),
}

impl AppLogic {
    pub fn new(config: &Config) -> Self {
        match config.variant {
            Variant::Plain => AppLogic::Plain(Plain::new(config)),
            Variant::Sandbox => AppLogic::Sandbox(Sandbox::new(config)),
            Variant::TestPattern => AppLogic::TestPattern(TestPattern::new(config)),
        }
    }

    pub fn variant(&self) -> Variant {
        match self {
            AppLogic::Plain(_) => Variant::Plain,
            AppLogic::Sandbox(_) => Variant::Sandbox,
            AppLogic::TestPattern(_) => Variant::TestPattern,
        }
    }

    /// Row state shared by the automaton variants.
    pub fn automaton(&self) -> Option<&AutomatonCore> {
        match self {
            AppLogic::Plain(p) => Some(p.core()),
            AppLogic::Sandbox(s) => Some(s.core()),
            AppLogic::TestPattern(_) => None,
        }
    }
}

impl App for AppLogic {
    #[inline]
    fn eval(&mut self, bus: &AppBus) {
        match self {
            AppLogic::Plain(a) => a.eval(bus),
            AppLogic::Sandbox(a) => a.eval(bus),
            AppLogic::TestPattern(a) => a.eval(bus),
        }
    }

    #[inline]
    fn rgb(&self) -> Rgb {
        match self {
            AppLogic::Plain(a) => a.rgb(),
            AppLogic::Sandbox(a) => a.rgb(),
            AppLogic::TestPattern(a) => a.rgb(),
        }
    }

    #[inline]
    fn dac(&self) -> bool {
        match self {
            AppLogic::Plain(a) => a.dac(),
            AppLogic::Sandbox(a) => a.dac(),
            AppLogic::TestPattern(a) => a.dac(),
        }
    }

    fn describe(&self) -> String {
        match self {
            AppLogic::Plain(a) => a.describe(),
            AppLogic::Sandbox(a) => a.describe(),
            AppLogic::TestPattern(a) => a.describe(),
        }
    }
}

impl Clocked for AppLogic {
    #[inline]
    fn commit(&mut self) {
        match self {
            AppLogic::Plain(a) => a.commit(),
            AppLogic::Sandbox(a) => a.commit(),
            AppLogic::TestPattern(a) => a.commit(),
        }
    }
}
