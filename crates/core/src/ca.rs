//! One-dimensional cellular automaton rows.
//!
//! A [`Row`] is a fixed-capacity bit vector of up to [`ROW_MAX_BITS`] cells,
//! of which the first `width` are live. Bit 0 is the leftmost pixel on
//! screen; scan-out emits bit 0 and then rotates right so the next pixel
//! moves into bit 0.
//!
//! ## Rule application
//!
//! [`evolve`] updates every cell from a snapshot of the whole row, with
//! circular neighbours. The neighbourhood index packs the three cells with
//! the lower-index neighbour in bit 0:
//!
//! ```text
//! index = row[i-1] | row[i] << 1 | row[i+1] << 2      (indices mod width)
//! new[i] = (rule >> index) & 1
//! ```
//!
//! The update is done word-parallel: the row is rotated once each way and
//! every set entry of the rule table contributes one AND-term.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 64-bit words backing a row.
pub const ROW_WORDS: usize = 13;
/// Row capacity in cells.
pub const ROW_MAX_BITS: usize = ROW_WORDS * 64;

// ─── Row ────────────────────────────────────────────────────────────────────

/// Bit vector of `width` cells. Bits at and above `width` are always zero.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Row {
    words: [u64; ROW_WORDS],
    width: u16,
}

impl Row {
    /// All-clear row. `width` is clamped to the row capacity.
    pub fn new(width: usize) -> Self {
        let width = width.clamp(1, ROW_MAX_BITS) as u16;
        Row { words: [0; ROW_WORDS], width }
    }

    /// Row with a single set cell at `width / 2`.
    pub fn centered(width: usize) -> Self {
        let mut row = Row::new(width);
        row.set(row.width() / 2, true);
        row
    }

    /// Row with the given cells set. Out-of-range columns are ignored.
    pub fn with_cells<I: IntoIterator<Item = usize>>(width: usize, cells: I) -> Self {
        let mut row = Row::new(width);
        for c in cells {
            if c < row.width() {
                row.set(c, true);
            }
        }
        row
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width as usize
    }

    #[inline]
    pub fn get(&self, i: usize) -> bool {
        i < self.width() && (self.words[i / 64] >> (i % 64)) & 1 != 0
    }

    #[inline]
    pub fn set(&mut self, i: usize, value: bool) {
        if i >= self.width() {
            return;
        }
        let mask = 1u64 << (i % 64);
        if value {
            self.words[i / 64] |= mask;
        } else {
            self.words[i / 64] &= !mask;
        }
    }

    /// Set cell `(center + offset) mod width`.
    pub fn set_wrapped(&mut self, center: usize, offset: isize, value: bool) {
        let w = self.width() as isize;
        let i = (center as isize + offset).rem_euclid(w) as usize;
        self.set(i, value);
    }

    /// Cell 0, the pixel about to be emitted.
    #[inline]
    pub fn lsb(&self) -> bool {
        self.words[0] & 1 != 0
    }

    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    #[inline]
    fn used_words(&self) -> usize {
        (self.width() + 63) / 64
    }

    #[inline]
    fn clear_tail(&mut self) {
        let w = self.width();
        let n = self.used_words();
        let rem = w % 64;
        if rem != 0 {
            self.words[n - 1] &= (1u64 << rem) - 1;
        }
        for word in self.words[n..].iter_mut() {
            *word = 0;
        }
    }

    /// Rotate by one toward bit 0: `out[i] = self[(i + 1) mod width]`.
    pub fn rotate_right(&self) -> Row {
        let n = self.used_words();
        let mut out = Row::new(self.width());
        for k in 0..n {
            let hi = if k + 1 < n { self.words[k + 1] << 63 } else { 0 };
            out.words[k] = (self.words[k] >> 1) | hi;
        }
        out.set(self.width() - 1, self.lsb());
        out
    }

    /// Rotate by one away from bit 0: `out[i] = self[(i - 1) mod width]`.
    pub fn rotate_left(&self) -> Row {
        let n = self.used_words();
        let mut out = Row::new(self.width());
        for k in 0..n {
            let lo = if k > 0 { self.words[k - 1] >> 63 } else { 0 };
            out.words[k] = (self.words[k] << 1) | lo;
        }
        out.clear_tail();
        out.set(0, self.get(self.width() - 1));
        out
    }

    /// Neighbourhood index of cell `i` as used by [`RuleTable::output`].
    pub fn neighborhood(&self, i: usize) -> u8 {
        let w = self.width();
        let left = self.get((i + w - 1) % w) as u8;
        let centre = self.get(i) as u8;
        let right = self.get((i + 1) % w) as u8;
        left | (centre << 1) | (right << 2)
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.width()).map(move |i| self.get(i))
    }
}

impl fmt::Display for Row {
    /// Cells as `0`/`1`, bit 0 first (screen order).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.iter() {
            f.write_str(if b { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row({})", self)
    }
}

impl FromStr for Row {
    type Err = String;

    /// Parse screen-order `0`/`1` cells; `.` and `#` are accepted too.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cells: Vec<bool> = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| match c {
                '1' | '#' => Ok(true),
                '0' | '.' => Ok(false),
                other => Err(format!("invalid cell '{}'", other)),
            })
            .collect::<Result<_, _>>()?;
        if cells.is_empty() || cells.len() > ROW_MAX_BITS {
            return Err(format!("row width {} out of range", cells.len()));
        }
        let mut row = Row::new(cells.len());
        for (i, b) in cells.into_iter().enumerate() {
            row.set(i, b);
        }
        Ok(row)
    }
}

// ─── Rule table ─────────────────────────────────────────────────────────────

/// Eight-entry neighbourhood lookup, stored as its Wolfram rule number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleTable(pub u8);

impl RuleTable {
    pub const RULE_30: RuleTable = RuleTable(30);
    pub const RULE_110: RuleTable = RuleTable(110);
    pub const RULE_106: RuleTable = RuleTable(106);
    pub const RULE_14: RuleTable = RuleTable(14);

    #[inline]
    pub fn output(self, index: u8) -> bool {
        (self.0 >> (index & 7)) & 1 != 0
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        RuleTable::RULE_30
    }
}

/// One synchronous rule pass over `row`.
pub fn evolve(row: &Row, rule: RuleTable) -> Row {
    let left = row.rotate_left();
    let right = row.rotate_right();
    let n = row.used_words();
    let mut out = Row::new(row.width());
    for index in 0..8u8 {
        if !rule.output(index) {
            continue;
        }
        for k in 0..n {
            let l = if index & 1 != 0 { left.words[k] } else { !left.words[k] };
            let c = if index & 2 != 0 { row.words[k] } else { !row.words[k] };
            let r = if index & 4 != 0 { right.words[k] } else { !right.words[k] };
            out.words[k] |= l & c & r;
        }
    }
    out.clear_tail();
    out
}
