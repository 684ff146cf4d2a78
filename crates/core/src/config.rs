//! Core configuration: reference clock, video timing, audio rate and the
//! app variant with its settings.
//!
//! A [`Config`] is plain data. It can be built in code, loaded from JSON, or
//! taken from [`Config::default`], which describes a 400×320 picture at
//! 60.02 Hz from a 74.25 MHz reference with 48 kHz audio.
//!
//! ## Preconditions
//!
//! [`Config::validate`] rejects any combination the hardware would run but
//! render wrongly. The counters never fault at runtime, so this is the only
//! place a bad timing set can be caught.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ca::ROW_MAX_BITS;
use crate::error::ConfigError;
use crate::palette::Palette;

// ─── Limits ─────────────────────────────────────────────────────────────────

/// Widest active area the row registers are sized for.
pub const RES_X_MAX: u16 = 800;
/// Coordinate counters are 10 bits wide.
pub const COUNTER_LIMIT: u16 = 1024;
/// Lowest accepted frame rate (inclusive).
pub const FRAME_RATE_MIN: f64 = 47.0;
/// Highest accepted frame rate (exclusive).
pub const FRAME_RATE_MAX: f64 = 61.0;
/// Master clock toggles per audio sample: 2 toggles × 4 per serial bit × 64 bits.
pub const MCLK_TOGGLES_PER_SAMPLE: u64 = 2 * 256;
/// Largest value the opening countdown register holds.
pub const OPENING_FRAMES_MAX: u8 = 63;

// ─── Variant ────────────────────────────────────────────────────────────────

/// Which app logic renders the picture and drives the tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Rule automaton with pause and single step.
    #[default]
    Plain,
    /// Automaton with speed control, live rule selection and scribbles.
    Sandbox,
    /// Border/zone test pattern with a pitch-stepped square wave.
    TestPattern,
}

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::Plain, Variant::Sandbox, Variant::TestPattern];

    pub fn name(self) -> &'static str {
        match self {
            Variant::Plain => "plain",
            Variant::Sandbox => "sandbox",
            Variant::TestPattern => "test-pattern",
        }
    }

    /// Identifier stored in save state headers.
    pub fn id(self) -> u8 {
        match self {
            Variant::Plain => 0,
            Variant::Sandbox => 1,
            Variant::TestPattern => 2,
        }
    }

    pub fn from_id(id: u8) -> Option<Variant> {
        Variant::ALL.into_iter().find(|v| v.id() == id)
    }

    /// Whether the variant runs the cellular automaton.
    pub fn is_automaton(self) -> bool {
        !matches!(self, Variant::TestPattern)
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "plain" | "rule30" => Ok(Variant::Plain),
            "sandbox" => Ok(Variant::Sandbox),
            "test-pattern" | "pattern" => Ok(Variant::TestPattern),
            other => Err(format!("unknown variant '{}'", other)),
        }
    }
}

// ─── Video ──────────────────────────────────────────────────────────────────

/// Porch/active/total constants and the pixel clock ratio.
///
/// Horizontal values count pixel strobes, vertical values count rows. Both
/// axes start with the back porch: the active window is
/// `[bporch, bporch + active)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoTiming {
    pub div_ratio: u32,
    pub h_bporch: u16,
    pub h_active: u16,
    pub h_total: u16,
    pub v_bporch: u16,
    pub v_active: u16,
    pub v_total: u16,
    /// Active height used while docked; `None` keeps `v_active`.
    pub v_active_docked: Option<u16>,
}

impl Default for VideoTiming {
    fn default() -> Self {
        VideoTiming {
            div_ratio: 8,
            h_bporch: 4,
            h_active: 400,
            h_total: 408,
            v_bporch: 29,
            v_active: 320,
            v_total: 379,
            v_active_docked: None,
        }
    }
}

impl VideoTiming {
    /// Reference ticks in one frame.
    pub fn ticks_per_frame(&self) -> u64 {
        self.div_ratio as u64 * self.h_total as u64 * self.v_total as u64
    }

    pub fn frame_rate(&self, reference_hz: u32) -> f64 {
        reference_hz as f64 / self.ticks_per_frame() as f64
    }

    /// Active height for the given dock state.
    pub fn v_active_for(&self, docked: bool) -> u16 {
        match (docked, self.v_active_docked) {
            (true, Some(h)) => h,
            _ => self.v_active,
        }
    }

    /// Largest active height either dock state can select.
    pub fn v_active_max(&self) -> u16 {
        self.v_active.max(self.v_active_docked.unwrap_or(0))
    }

    fn validate(&self, reference_hz: u32) -> Result<(), ConfigError> {
        let ratio = self.div_ratio;
        if ratio < 4 || ratio % 4 != 0 {
            return Err(ConfigError::DividerRatio { ratio });
        }
        if self.h_active == 0 {
            return Err(ConfigError::EmptyActive { axis: "horizontal" });
        }
        if self.v_active == 0 {
            return Err(ConfigError::EmptyActive { axis: "vertical" });
        }
        if self.h_active > RES_X_MAX || self.h_active as usize > ROW_MAX_BITS {
            return Err(ConfigError::RowTooWide { width: self.h_active, max: RES_X_MAX });
        }
        // vsync is raised two columns past the active window
        let h_needed = self.h_bporch as u32 + self.h_active as u32 + 2;
        if (self.h_total as u32) < h_needed {
            return Err(ConfigError::TotalTooSmall {
                axis: "horizontal",
                total: self.h_total,
                needed: h_needed,
            });
        }
        let v_needed = self.v_bporch as u32 + self.v_active as u32 + 1;
        if (self.v_total as u32) < v_needed {
            return Err(ConfigError::TotalTooSmall {
                axis: "vertical",
                total: self.v_total,
                needed: v_needed,
            });
        }
        if self.h_total > COUNTER_LIMIT {
            return Err(ConfigError::TotalTooLarge {
                axis: "horizontal",
                total: self.h_total,
                max: COUNTER_LIMIT,
            });
        }
        if self.v_total > COUNTER_LIMIT {
            return Err(ConfigError::TotalTooLarge {
                axis: "vertical",
                total: self.v_total,
                max: COUNTER_LIMIT,
            });
        }
        if let Some(docked) = self.v_active_docked {
            if docked == 0 || self.v_bporch as u32 + docked as u32 + 1 > self.v_total as u32 {
                return Err(ConfigError::DockedWindow {
                    v_active: docked,
                    v_bporch: self.v_bporch,
                    v_total: self.v_total,
                });
            }
        }
        let hz = self.frame_rate(reference_hz);
        if !(FRAME_RATE_MIN..FRAME_RATE_MAX).contains(&hz) {
            return Err(ConfigError::FrameRate { hz, min: FRAME_RATE_MIN, max: FRAME_RATE_MAX });
        }
        Ok(())
    }
}

// ─── Audio ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Stereo frames per second on the serial audio line.
    pub sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        AudioConfig { sample_rate: 48_000 }
    }
}

impl AudioConfig {
    /// Accumulator `(increment, overflow)` in lowest terms.
    pub fn accumulator_ratio(&self, reference_hz: u32) -> (u64, u64) {
        let inc = MCLK_TOGGLES_PER_SAMPLE * self.sample_rate as u64;
        let overflow = reference_hz as u64;
        let g = gcd(inc, overflow).max(1);
        (inc / g, overflow / g)
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

// ─── Automaton / tone ───────────────────────────────────────────────────────

/// Initial contents of the seed row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seed {
    /// One set cell at column `h_active / 2`.
    #[default]
    Center,
    /// Set cells at the listed columns.
    Columns(Vec<u16>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomatonConfig {
    /// Wolfram rule number used from reset.
    pub rule: u8,
    pub seed: Seed,
    pub palette: Palette,
    /// Frames held frozen after reset (0 disables the opening pause).
    pub opening_frames: u8,
}

impl Default for AutomatonConfig {
    fn default() -> Self {
        AutomatonConfig {
            rule: 30,
            seed: Seed::Center,
            palette: Palette::default(),
            opening_frames: OPENING_FRAMES_MAX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneConfig {
    /// Pitch at octave 0 of the test-pattern tone.
    pub base_hz: u32,
}

impl Default for ToneConfig {
    fn default() -> Self {
        ToneConfig { base_hz: 220 }
    }
}

// ─── Top level ──────────────────────────────────────────────────────────────

/// Everything needed to build a [`System`](crate::System).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reference clock frequency in Hz; one [`step`](crate::System::step) is one period.
    pub reference_hz: u32,
    pub video: VideoTiming,
    pub audio: AudioConfig,
    pub variant: Variant,
    pub automaton: AutomatonConfig,
    pub tone: ToneConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            reference_hz: 74_250_000,
            video: VideoTiming::default(),
            audio: AudioConfig::default(),
            variant: Variant::Plain,
            automaton: AutomatonConfig::default(),
            tone: ToneConfig::default(),
        }
    }
}

impl Config {
    /// Check every precondition the hardware relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reference_hz == 0 {
            return Err(ConfigError::ZeroReference);
        }
        self.video.validate(self.reference_hz)?;

        if self.audio.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        let needed = MCLK_TOGGLES_PER_SAMPLE * self.audio.sample_rate as u64;
        if needed > self.reference_hz as u64 {
            return Err(ConfigError::AudioRate {
                sample_rate: self.audio.sample_rate,
                needed,
                reference_hz: self.reference_hz,
            });
        }

        if self.variant.is_automaton() {
            let frames = self.automaton.opening_frames;
            if frames > OPENING_FRAMES_MAX {
                return Err(ConfigError::OpeningFrames { frames });
            }
            if let Seed::Columns(cols) = &self.automaton.seed {
                let width = self.video.h_active;
                if let Some(&column) = cols.iter().find(|&&c| c >= width) {
                    return Err(ConfigError::SeedColumn { column, width });
                }
            }
        } else {
            let base = self.tone.base_hz;
            if base == 0 || base > self.audio.sample_rate / 4 {
                return Err(ConfigError::ToneFrequency);
            }
        }
        Ok(())
    }

    pub fn frame_rate(&self) -> f64 {
        self.video.frame_rate(self.reference_hz)
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Whether a save state taken under `other` can be restored under `self`.
    pub fn same_hardware(&self, other: &Config) -> bool {
        self.reference_hz == other.reference_hz
            && self.video == other.video
            && self.audio == other.audio
            && self.variant == other.variant
    }

    /// A 8×4 picture in 12×8 totals, divider 4, 60 Hz from a 23.04 kHz
    /// reference, with 40 Hz audio and no opening pause.
    #[cfg(test)]
    pub(crate) fn small(variant: Variant) -> Config {
        Config {
            reference_hz: 23_040,
            video: VideoTiming {
                div_ratio: 4,
                h_bporch: 2,
                h_active: 8,
                h_total: 12,
                v_bporch: 2,
                v_active: 4,
                v_total: 8,
                v_active_docked: None,
            },
            audio: AudioConfig { sample_rate: 40 },
            variant,
            automaton: AutomatonConfig { opening_frames: 0, ..AutomatonConfig::default() },
            tone: ToneConfig { base_hz: 5 },
        }
    }
}
