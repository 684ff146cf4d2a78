//! Per-frame PCM staging with resampling and post-processing.
//!
//! Collects the stereo frames decoded from the serial DAC line during one
//! video frame, each stamped with the reference tick it completed on, then
//! converts them to the host sample rate.
//!
//! ## Post-processing pipeline
//!
//! When enabled ([`AudioBuffer::filters_enabled`]), four stages run after
//! resampling:
//!
//! 1. **Click suppression**: fades audio in (~2 ms) and out (~5 ms) when the
//!    line starts or stops carrying frames, preventing pops.
//!
//! 2. **Low-pass filter**: 2nd-order Butterworth at 8 kHz rounds off the
//!    upper harmonics of the square tone.
//!
//! 3. **DC-blocking high-pass**: 2nd-order Butterworth at 20 Hz. The data
//!    word always carries its fixed preamble bits, so the raw signal sits on
//!    a large offset.
//!
//! 4. **Stereo crossfeed**: blends 20% of each channel into the other.

use std::f32::consts::{PI, SQRT_2};

// ─── Constants ──────────────────────────────────────────────────────────────

/// Low-pass filter cutoff (Hz).
const LPF_CUTOFF: f32 = 8000.0;
/// DC-blocking high-pass cutoff (Hz).
const HPF_CUTOFF: f32 = 20.0;
/// Default crossfeed: 20% of opposite channel mixed in.
const DEFAULT_CROSSFEED: f32 = 0.20;
/// Envelope attack time (seconds).
const ENV_ATTACK_S: f32 = 0.002;
/// Envelope release time (seconds).
const ENV_RELEASE_S: f32 = 0.005;
/// Full scale of a decoded sample.
const FULL_SCALE: f32 = 32768.0;

// ─── 2nd-order biquad IIR filter ────────────────────────────────────────────

/// Biquad IIR filter using Direct Form 2 Transposed.
#[derive(Debug, Clone)]
struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: f32,
    z2: f32,
}

impl Biquad {
    /// 2nd-order Butterworth low-pass filter. The cutoff is kept below
    /// Nyquist for low host rates.
    fn lowpass(cutoff: f32, sample_rate: f32) -> Self {
        let cutoff = cutoff.min(sample_rate * 0.45);
        let w0 = 2.0 * PI * cutoff / sample_rate;
        let (sin_w, cos_w) = (w0.sin(), w0.cos());
        let alpha = sin_w / (2.0 * SQRT_2);
        let a0_inv = 1.0 / (1.0 + alpha);
        Biquad {
            b0: ((1.0 - cos_w) * 0.5) * a0_inv,
            b1: (1.0 - cos_w) * a0_inv,
            b2: ((1.0 - cos_w) * 0.5) * a0_inv,
            a1: (-2.0 * cos_w) * a0_inv,
            a2: (1.0 - alpha) * a0_inv,
            z1: 0.0,
            z2: 0.0,
        }
    }

    /// 2nd-order Butterworth high-pass filter.
    fn highpass(cutoff: f32, sample_rate: f32) -> Self {
        let w0 = 2.0 * PI * cutoff / sample_rate;
        let (sin_w, cos_w) = (w0.sin(), w0.cos());
        let alpha = sin_w / (2.0 * SQRT_2);
        let a0_inv = 1.0 / (1.0 + alpha);
        Biquad {
            b0: ((1.0 + cos_w) * 0.5) * a0_inv,
            b1: (-(1.0 + cos_w)) * a0_inv,
            b2: ((1.0 + cos_w) * 0.5) * a0_inv,
            a1: (-2.0 * cos_w) * a0_inv,
            a2: (1.0 - alpha) * a0_inv,
            z1: 0.0,
            z2: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y
    }
}

// ─── Audio buffer ───────────────────────────────────────────────────────────

pub struct AudioBuffer {
    /// Frame start tick (set at beginning of run_frame).
    pub frame_start: u64,
    /// Frame end tick (set at end of run_frame).
    pub frame_end: u64,
    /// Decoded frames this video frame: (completion tick, [left, right]).
    samples: Vec<(u64, [i16; 2])>,
    /// Level held from the previous video frame (sample-and-hold).
    held: [f32; 2],

    lpf_l: Biquad,
    lpf_r: Biquad,
    hpf_l: Biquad,
    hpf_r: Biquad,
    envelope_l: f32,
    envelope_r: f32,
    configured_rate: u32,

    /// Enable/disable audio post-processing pipeline.
    pub filters_enabled: bool,
    /// Stereo crossfeed amount (0.0 = full stereo, 0.5 = mono).
    pub crossfeed: f32,
}

impl AudioBuffer {
    pub fn new() -> Self {
        // reconfigured on first render
        let sr = 44100.0;
        AudioBuffer {
            frame_start: 0,
            frame_end: 0,
            samples: Vec::with_capacity(4096),
            held: [0.0; 2],
            lpf_l: Biquad::lowpass(LPF_CUTOFF, sr),
            lpf_r: Biquad::lowpass(LPF_CUTOFF, sr),
            hpf_l: Biquad::highpass(HPF_CUTOFF, sr),
            hpf_r: Biquad::highpass(HPF_CUTOFF, sr),
            envelope_l: 0.0,
            envelope_r: 0.0,
            configured_rate: 0,
            filters_enabled: true,
            crossfeed: DEFAULT_CROSSFEED,
        }
    }

    fn configure_filters(&mut self, sample_rate: u32) {
        let sr = sample_rate as f32;
        self.lpf_l = Biquad::lowpass(LPF_CUTOFF, sr);
        self.lpf_r = Biquad::lowpass(LPF_CUTOFF, sr);
        self.hpf_l = Biquad::highpass(HPF_CUTOFF, sr);
        self.hpf_r = Biquad::highpass(HPF_CUTOFF, sr);
        self.configured_rate = sample_rate;
    }

    /// Begin a new frame: store start tick, clear the sample list.
    pub fn begin_frame(&mut self, tick: u64) {
        self.frame_start = tick;
        self.samples.clear();
    }

    /// End the current frame: store end tick.
    pub fn end_frame(&mut self, tick: u64) {
        self.frame_end = tick;
    }

    #[inline]
    pub fn push(&mut self, tick: u64, frame: [i16; 2]) {
        self.samples.push((tick, frame));
    }

    /// Frames decoded during the current video frame, at the core rate.
    pub fn frames(&self) -> impl Iterator<Item = [i16; 2]> + '_ {
        self.samples.iter().map(|&(_, f)| f)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if any frame was decoded this video frame.
    pub fn has_audio(&self) -> bool {
        !self.samples.is_empty()
    }

    /// True while frames arrive **or** the envelope is still fading out.
    pub fn needs_render(&self) -> bool {
        self.has_audio() || self.envelope_l > 0.001 || self.envelope_r > 0.001
    }

    /// Toggle the post-processing filter pipeline on/off.
    pub fn toggle_filters(&mut self) {
        self.filters_enabled = !self.filters_enabled;
    }

    /// Render the frame to interleaved stereo f32 PCM samples.
    ///
    /// `out` receives \[L, R, L, R, ...\] at `sample_rate` Hz. `clock_hz` is
    /// the reference clock the tick stamps count. Returns the number of
    /// stereo sample pairs written.
    pub fn render_samples(
        &mut self,
        out: &mut Vec<f32>,
        sample_rate: u32,
        clock_hz: u32,
        volume: f32,
    ) -> usize {
        if self.configured_rate != sample_rate {
            self.configure_filters(sample_rate);
        }

        let frame_ticks = self.frame_end.saturating_sub(self.frame_start);
        out.clear();
        if frame_ticks == 0 || sample_rate == 0 || clock_hz == 0 {
            return 0;
        }

        let num_samples = ((frame_ticks as f64 * sample_rate as f64) / clock_hz as f64).ceil() as usize;
        out.reserve(num_samples * 2);

        let tps = clock_hz as f64 / sample_rate as f64; // ticks per sample
        let start = self.frame_start as f64;
        let active = self.has_audio();

        let attack_rate = 1.0 / (ENV_ATTACK_S * sample_rate as f32);
        let release_rate = 1.0 / (ENV_RELEASE_S * sample_rate as f32);

        let mut idx = 0usize;
        for i in 0..num_samples {
            let p_start = start + i as f64 * tps;
            let p_end = p_start + tps;
            let [l_raw, r_raw] = Self::sample_held(&mut idx, &self.samples, &mut self.held, p_start, p_end, tps);
            let (l_raw, r_raw) = (l_raw * volume, r_raw * volume);

            if self.filters_enabled {
                if active {
                    self.envelope_l = (self.envelope_l + attack_rate).min(1.0);
                    self.envelope_r = (self.envelope_r + attack_rate).min(1.0);
                } else {
                    self.envelope_l = (self.envelope_l - release_rate).max(0.0);
                    self.envelope_r = (self.envelope_r - release_rate).max(0.0);
                }

                let l_lp = self.lpf_l.process(l_raw * self.envelope_l);
                let r_lp = self.lpf_r.process(r_raw * self.envelope_r);
                let l_hp = self.hpf_l.process(l_lp);
                let r_hp = self.hpf_r.process(r_lp);

                let cf = self.crossfeed;
                out.push(l_hp * (1.0 - cf) + r_hp * cf);
                out.push(r_hp * (1.0 - cf) + l_hp * cf);
            } else {
                out.push(l_raw);
                out.push(r_raw);
            }
        }

        num_samples
    }

    /// Time-weighted average of the held levels over `[p_start, p_end)`.
    /// Each frame holds its value until the next one arrives.
    #[inline]
    fn sample_held(
        idx: &mut usize,
        samples: &[(u64, [i16; 2])],
        level: &mut [f32; 2],
        p_start: f64,
        p_end: f64,
        tps: f64,
    ) -> [f32; 2] {
        let mut accum = [0.0f64; 2];
        let mut cursor = p_start;

        while *idx < samples.len() && (samples[*idx].0 as f64) < p_end {
            let t = samples[*idx].0 as f64;
            if t > cursor {
                for ch in 0..2 {
                    accum[ch] += level[ch] as f64 * (t - cursor);
                }
                cursor = t;
            }
            let frame = samples[*idx].1;
            *level = [frame[0] as f32 / FULL_SCALE, frame[1] as f32 / FULL_SCALE];
            *idx += 1;
        }

        for ch in 0..2 {
            accum[ch] += level[ch] as f64 * (p_end - cursor);
        }
        [(accum[0] / tps) as f32, (accum[1] / tps) as f32]
    }
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_frame_renders_nothing() {
        let mut buf = AudioBuffer::new();
        buf.begin_frame(100);
        buf.end_frame(100);
        let mut out = Vec::new();
        assert_eq!(buf.render_samples(&mut out, 48_000, 48_000, 1.0), 0);
        assert!(out.is_empty());
        assert!(!buf.needs_render());
    }

    #[test]
    fn test_sample_and_hold_resampling() {
        let mut buf = AudioBuffer::new();
        buf.filters_enabled = false;
        buf.begin_frame(0);
        buf.push(0, [16384, -16384]);
        // switches halfway through the third output sample
        buf.push(25, [0, 0]);
        buf.end_frame(40);
        let mut out = Vec::new();
        // 10 ticks per output sample
        let n = buf.render_samples(&mut out, 100, 1000, 1.0);
        assert_eq!(n, 4);
        assert_eq!(out, vec![0.5, -0.5, 0.5, -0.5, 0.25, -0.25, 0.0, 0.0]);
    }

    #[test]
    fn test_level_held_across_frames() {
        let mut buf = AudioBuffer::new();
        buf.filters_enabled = false;
        buf.begin_frame(0);
        buf.push(0, [8192, 8192]);
        buf.end_frame(10);
        let mut out = Vec::new();
        buf.render_samples(&mut out, 100, 1000, 1.0);
        buf.begin_frame(10);
        buf.end_frame(30);
        buf.render_samples(&mut out, 100, 1000, 0.5);
        assert_eq!(out, vec![0.125, 0.125, 0.125, 0.125]);
    }

    #[test]
    fn test_frames_iterator() {
        let mut buf = AudioBuffer::new();
        buf.begin_frame(0);
        buf.push(3, [1, 2]);
        buf.push(7, [3, 4]);
        assert_eq!(buf.frames().collect::<Vec<_>>(), vec![[1, 2], [3, 4]]);
        assert_eq!(buf.len(), 2);
        buf.begin_frame(8);
        assert!(!buf.has_audio());
    }

    #[test]
    fn test_filters_remove_dc() {
        let mut buf = AudioBuffer::new();
        let mut out = Vec::new();
        let mut last = 1.0f32;
        for f in 0..60u64 {
            buf.begin_frame(f * 800);
            buf.push(f * 800, [-1024, -1024]);
            buf.end_frame((f + 1) * 800);
            buf.render_samples(&mut out, 48_000, 48_000, 1.0);
            last = out[out.len() - 2];
        }
        assert!(last.abs() < 1e-3, "residual offset {}", last);
    }
}
