//! Pixel colours.

use serde::{Deserialize, Serialize};

/// 24-bit pixel value as driven on the video bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0x00, 0x00, 0x00);
    pub const WHITE: Rgb = Rgb::new(0xFF, 0xFF, 0xFF);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    /// From `0xRRGGBB`; the top byte is ignored.
    pub const fn from_u24(v: u32) -> Self {
        Rgb::new((v >> 16) as u8, (v >> 8) as u8, v as u8)
    }

    /// As `0x00RRGGBB`, the layout minifb and the framebuffer use.
    #[inline]
    pub const fn to_u32(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    /// Bitwise complement of every channel.
    pub const fn inverted(self) -> Self {
        Rgb::new(!self.r, !self.g, !self.b)
    }

    /// Rec. 601 luma, 0–255.
    pub fn luma(self) -> u8 {
        ((self.r as u32 * 299 + self.g as u32 * 587 + self.b as u32 * 114) / 1000) as u8
    }
}

/// Two-colour mapping for automaton rows: set cells are ink, clear cells paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    pub ink: Rgb,
    pub paper: Rgb,
}

impl Palette {
    #[inline]
    pub fn pick(&self, bit: bool) -> Rgb {
        if bit { self.ink } else { self.paper }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Palette { ink: Rgb::BLACK, paper: Rgb::WHITE }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u24_packing() {
        let c = Rgb::from_u24(0xA00080);
        assert_eq!(c, Rgb::new(0xA0, 0x00, 0x80));
        assert_eq!(c.to_u32(), 0xA00080);
        assert_eq!(Rgb::from_u24(0xFF123456).to_u32(), 0x123456);
    }

    #[test]
    fn test_inverted() {
        assert_eq!(Rgb::BLACK.inverted(), Rgb::WHITE);
        assert_eq!(Rgb::new(0xFF, 0xFF, 0x80).inverted(), Rgb::new(0, 0, 0x7F));
    }

    #[test]
    fn test_palette_pick() {
        let p = Palette::default();
        assert_eq!(p.pick(true), Rgb::BLACK);
        assert_eq!(p.pick(false), Rgb::WHITE);
    }
}
