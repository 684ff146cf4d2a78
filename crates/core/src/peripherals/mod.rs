//! Fixed-function blocks shared by every app variant.
//!
//! - [`PixelClock`]: reference-clock divider producing the pixel strobe and clock levels
//! - [`TimingGenerator`]: beam counters, app strobes and registered `hs`/`vs`/`de`
//! - [`AudioClock`]: mclk / sclk / lrck hierarchy and bit/word strobes
//! - [`InputLatch`]: controller word edge detection

mod pixel_clock;
mod timing;
mod audio_clock;
mod input;

pub use pixel_clock::PixelClock;
pub use timing::{TimingGenerator, VideoStrobes, HS_COLUMN};
pub use audio_clock::{AudioClock, AudioStrobes, WORD_BIT_LAST_POSITION, WORD_STROBE_SLOT};
pub use input::{Button, InputLatch, KeyEdges};
