//! Controller input latch.
//!
//! The controller word is sampled every reference tick and a one-tick
//! delayed copy is kept for edge detection. There is no debounce: a bounce
//! on the physical switch shows up as several presses.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::register::{Clocked, Reg};

/// Controller buttons and their bit in the controller word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    X,
    Y,
    L1,
    R1,
    L2,
    R2,
    L3,
    R3,
    Select,
    Start,
}

impl Button {
    pub const ALL: [Button; 16] = [
        Button::Up, Button::Down, Button::Left, Button::Right,
        Button::A, Button::B, Button::X, Button::Y,
        Button::L1, Button::R1, Button::L2, Button::R2,
        Button::L3, Button::R3, Button::Select, Button::Start,
    ];

    #[inline]
    pub fn bit(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn mask(self) -> u32 {
        1 << self.bit()
    }

    pub fn name(self) -> &'static str {
        match self {
            Button::Up => "up",
            Button::Down => "down",
            Button::Left => "left",
            Button::Right => "right",
            Button::A => "a",
            Button::B => "b",
            Button::X => "x",
            Button::Y => "y",
            Button::L1 => "l1",
            Button::R1 => "r1",
            Button::L2 => "l2",
            Button::R2 => "r2",
            Button::L3 => "l3",
            Button::R3 => "r3",
            Button::Select => "select",
            Button::Start => "start",
        }
    }
}

impl FromStr for Button {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Button::ALL
            .into_iter()
            .find(|b| b.name() == lower)
            .ok_or_else(|| format!("unknown button '{}'", s))
    }
}

/// Level and edge view of the controller word for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyEdges {
    pub held: u32,
    pub pressed: u32,
    pub released: u32,
}

impl KeyEdges {
    #[inline]
    pub fn is_held(&self, b: Button) -> bool {
        self.held & b.mask() != 0
    }

    #[inline]
    pub fn is_pressed(&self, b: Button) -> bool {
        self.pressed & b.mask() != 0
    }

    #[inline]
    pub fn is_released(&self, b: Button) -> bool {
        self.released & b.mask() != 0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputLatch {
    last: Reg<u32>,
}

impl InputLatch {
    pub fn new() -> Self {
        InputLatch { last: Reg::new(0) }
    }

    pub fn reset(&mut self) {
        *self = InputLatch::new();
    }

    /// Word sampled on the previous tick.
    pub fn last(&self) -> u32 {
        self.last.get()
    }

    #[inline]
    pub fn edges(&self, keys: u32) -> KeyEdges {
        let last = self.last.get();
        KeyEdges {
            held: keys,
            pressed: keys & !last,
            released: !keys & last,
        }
    }

    #[inline]
    pub fn eval(&mut self, keys: u32) {
        self.last.drive(keys);
    }
}

impl Clocked for InputLatch {
    #[inline]
    fn commit(&mut self) {
        self.last.commit();
    }
}
