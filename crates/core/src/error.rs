//! Error types for configuration and save-state handling.
//!
//! The tick path itself cannot fail: every register has a next value on
//! every tick. Everything that can go wrong is caught either when a
//! [`Config`](crate::config::Config) is validated or when a state file is
//! read back.

use thiserror::Error;

/// A timing, audio or automaton parameter set that the core cannot run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("pixel clock divider {ratio} must be at least 4 and a multiple of 4")]
    DividerRatio { ratio: u32 },

    #[error("{axis} active window is empty")]
    EmptyActive { axis: &'static str },

    #[error("{axis} total {total} too small: porch + active needs at least {needed}")]
    TotalTooSmall { axis: &'static str, total: u16, needed: u32 },

    #[error("{axis} total {total} exceeds the {max}-position counter")]
    TotalTooLarge { axis: &'static str, total: u16, max: u16 },

    #[error("active width {width} exceeds the {max}-column row register")]
    RowTooWide { width: u16, max: u16 },

    #[error("frame rate {hz:.3} Hz outside the supported band [{min}, {max}) Hz")]
    FrameRate { hz: f64, min: f64, max: f64 },

    #[error("reference clock must be non-zero")]
    ZeroReference,

    #[error("audio sample rate must be non-zero")]
    ZeroSampleRate,

    #[error("audio sample rate {sample_rate} Hz needs a {needed} Hz master toggle rate, reference is {reference_hz} Hz")]
    AudioRate { sample_rate: u32, needed: u64, reference_hz: u32 },

    #[error("docked active height {v_active} does not fit between back porch {v_bporch} and total {v_total}")]
    DockedWindow { v_active: u16, v_bporch: u16, v_total: u16 },

    #[error("opening freeze of {frames} frames exceeds the 6-bit countdown")]
    OpeningFrames { frames: u8 },

    #[error("seed column {column} outside a {width}-column row")]
    SeedColumn { column: u16, width: u16 },

    #[error("tone base frequency must be between 1 Hz and a quarter of the sample rate")]
    ToneFrequency,

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to write, read or apply a save state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("state io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state encoding error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("state decompress error: {0}")]
    Decompress(String),

    #[error("file too small to be a save state")]
    TooSmall,

    #[error("invalid save state file (bad magic)")]
    BadMagic,

    #[error("unsupported save state version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },

    #[error("variant mismatch: save={saved} current={current}")]
    Variant { saved: String, current: String },

    #[error("save state was taken with a different timing or audio configuration")]
    ConfigMismatch,
}
