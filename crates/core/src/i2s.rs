//! Audio sink: decodes the serial DAC line into PCM frames.
//!
//! The line is sampled on each rising edge of `sclk`. A change of `lrck`
//! starts a new channel slot; the first 16 bits of a slot are the sample,
//! MSB first, and the remaining bits are padding. A left/right pair makes
//! one stereo frame.

/// Data bits per channel slot.
pub const WORD_BITS: u8 = 16;

#[derive(Debug, Clone, Default)]
pub struct I2sDecoder {
    prev_sclk: bool,
    channel: Option<bool>,
    shift: u16,
    bits: u8,
    left: Option<i16>,
}

impl I2sDecoder {
    pub fn new() -> Self {
        I2sDecoder::default()
    }

    pub fn reset(&mut self) {
        *self = I2sDecoder::new();
    }

    /// Feed one reference tick. Returns a `[left, right]` frame when the
    /// right-channel word completes.
    #[inline]
    pub fn feed(&mut self, sclk: bool, lrck: bool, data: bool) -> Option<[i16; 2]> {
        let rising = sclk && !self.prev_sclk;
        self.prev_sclk = sclk;
        if !rising {
            return None;
        }

        if self.channel != Some(lrck) {
            self.channel = Some(lrck);
            self.shift = 0;
            self.bits = 0;
        }
        if self.bits >= WORD_BITS {
            return None;
        }

        self.shift = (self.shift << 1) | data as u16;
        self.bits += 1;
        if self.bits < WORD_BITS {
            return None;
        }

        let word = self.shift as i16;
        if lrck {
            self.left.take().map(|l| [l, word])
        } else {
            self.left = Some(word);
            None
        }
    }
}
