//! # ca-core
//!
//! Cycle-accurate model of a small video/audio FPGA core that renders a
//! one-dimensional cellular automaton (or a test pattern) on a digital video
//! link and plays a tone on a serial audio DAC.
//!
//! One call to [`System::step`] is one period of the reference clock. Every
//! flip-flop of the design is a [`register::Reg`]; all blocks evaluate from
//! the values latched at the previous edge and commit together, so the
//! order in which blocks are evaluated never shows in the outputs.
//!
//! ## Architecture
//!
//! - [`System`]: Top-level aggregate wiring the clocks, timing, input and app logic
//! - [`peripherals`]: Pixel clock divider, timing generator, audio clocks, input latch
//! - [`app`]: Variant logic: plain automaton, sandbox automaton, test pattern
//! - [`ca`]: Bit rows and elementary rule application
//! - [`scanout`]: Rebuilds the picture from the external `rgb`/`de`/`vs` lines
//! - [`i2s`]: Decodes the serial audio line into PCM frames
//! - [`audio_buffer`]: Resamples decoded PCM to the host rate
//! - [`savestate`] / [`snapshot`]: Quick save files and in-memory rewind
//! - [`config`]: Timing, audio and variant parameters with validation
//!
//! ## Outputs
//!
//! Each tick yields a [`TickOutput`] carrying the registered video and audio
//! lines. The system also feeds them into its own [`scanout::Scanout`] and
//! [`i2s::I2sDecoder`] so a frontend can read a framebuffer and PCM samples
//! without decoding the lines itself.

pub mod register;
pub mod schedule;
pub mod config;
pub mod error;
pub mod palette;
pub mod ca;
pub mod peripherals;
pub mod app;
pub mod scanout;
pub mod i2s;
pub mod audio_buffer;
pub mod png;
pub mod savestate;
pub mod snapshot;

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use app::{App, AppBus, AppLogic};
use peripherals::{AudioClock, InputLatch, PixelClock, TimingGenerator};
use register::Clocked;

pub use audio_buffer::AudioBuffer;
pub use config::{Config, Variant};
pub use error::{ConfigError, StateError};
pub use palette::Rgb;
pub use peripherals::Button;

/// Inputs sampled on one reference tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickInput {
    /// Controller word, one bit per [`Button`].
    pub keys: u32,
    /// Docked notification; latched by the timing generator at frame end.
    pub docked: bool,
}

/// Registered outputs after one reference tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutput {
    pub rgb: Rgb,
    pub de: bool,
    pub hs: bool,
    pub vs: bool,
    pub pixel_clk: bool,
    pub pixel_clk90: bool,
    pub mclk: bool,
    pub sclk: bool,
    pub lrck: bool,
    pub dac: bool,
    /// Internal event strobes of this tick.
    pub pixel_strobe: bool,
    pub hsync_strobe: bool,
    pub vsync_strobe: bool,
}

/// Complete register set of a [`System`], plus its held inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreState {
    pub config: Config,
    pub tick: u64,
    pub pixel_clock: PixelClock,
    pub timing: TimingGenerator,
    pub audio_clock: AudioClock,
    pub input: InputLatch,
    pub app: AppLogic,
    pub pad: u32,
    pub docked: bool,
    pub frame_count: u64,
}

/// The whole core: fixed-function blocks, app logic and the output sinks.
pub struct System {
    config: Config,
    tick: u64,
    pub pixel_clock: PixelClock,
    pub timing: TimingGenerator,
    pub audio_clock: AudioClock,
    pub input: InputLatch,
    pub app: AppLogic,
    /// Rebuilt picture of the active area.
    pub scanout: scanout::Scanout,
    /// Serial audio decoder feeding [`System::audio_buf`].
    pub i2s: i2s::I2sDecoder,
    /// Decoded PCM of the current frame.
    pub audio_buf: AudioBuffer,
    /// Controller word held until changed.
    pad: u32,
    docked: bool,
    frame_count: u64,
}

impl System {
    /// Validate `config` and build a system in its reset state.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let v = &config.video;
        log::info!(
            "{} core: {}x{} active in {}x{} totals, divider {}, {:.3} Hz frame, {} Hz audio",
            config.variant.name(),
            v.h_active,
            v.v_active,
            v.h_total,
            v.v_total,
            v.div_ratio,
            config.frame_rate(),
            config.audio.sample_rate,
        );

        Ok(System {
            tick: 0,
            pixel_clock: PixelClock::new(v.div_ratio),
            timing: TimingGenerator::new(v.clone()),
            audio_clock: AudioClock::new(&config.audio, config.reference_hz),
            input: InputLatch::new(),
            app: AppLogic::new(&config),
            scanout: scanout::Scanout::new(v.h_active as usize, v.v_active_max() as usize),
            i2s: i2s::I2sDecoder::new(),
            audio_buf: AudioBuffer::new(),
            pad: 0,
            docked: false,
            frame_count: 0,
            config,
        })
    }

    /// Return every register to its power-on value.
    ///
    /// Held pad and docked inputs are kept; they are outside the core.
    pub fn reset(&mut self) {
        self.tick = 0;
        self.pixel_clock.reset();
        self.timing.reset();
        self.audio_clock.reset();
        self.input.reset();
        self.app = AppLogic::new(&self.config);
        self.scanout.reset();
        self.i2s.reset();
        self.audio_buf.begin_frame(0);
        self.frame_count = 0;
        log::info!("core reset");
    }

    /// Advance one reference tick.
    pub fn step(&mut self, input: &TickInput) -> TickOutput {
        let pixel = self.pixel_clock.strobe();
        let video = self.timing.strobes(pixel);
        let bus = AppBus {
            tick: self.tick,
            video,
            audio: self.audio_clock.strobes(),
            keys: self.input.edges(input.keys),
        };

        self.pixel_clock.eval();
        self.timing.eval(&video, input.docked);
        self.audio_clock.eval();
        self.input.eval(input.keys);
        self.app.eval(&bus);

        self.pixel_clock.commit();
        self.timing.commit();
        self.audio_clock.commit();
        self.input.commit();
        self.app.commit();
        self.tick += 1;

        if video.vsync {
            self.frame_count += 1;
        }

        let out = TickOutput {
            rgb: self.app.rgb(),
            de: self.timing.de(),
            hs: self.timing.hs(),
            vs: self.timing.vs(),
            pixel_clk: self.pixel_clock.clk(),
            pixel_clk90: self.pixel_clock.clk90(),
            mclk: self.audio_clock.mclk(),
            sclk: self.audio_clock.sclk(),
            lrck: self.audio_clock.lrck(),
            dac: self.app.dac(),
            pixel_strobe: pixel,
            hsync_strobe: video.hsync,
            vsync_strobe: video.vsync,
        };

        self.scanout.feed(out.pixel_clk, out.rgb, out.de, out.vs);
        if let Some(frame) = self.i2s.feed(out.sclk, out.lrck, out.dac) {
            self.audio_buf.push(self.tick, frame);
        }
        out
    }

    /// Step with the held pad and docked inputs until the next vsync strobe.
    pub fn run_frame(&mut self) {
        let input = TickInput { keys: self.pad, docked: self.docked };
        let limit = self.config.video.ticks_per_frame() + 1;

        self.audio_buf.begin_frame(self.tick);
        for _ in 0..limit {
            if self.step(&input).vsync_strobe {
                break;
            }
        }
        self.audio_buf.end_frame(self.tick);
    }

    /// Set button state (true = pressed)
    pub fn set_button(&mut self, button: Button, pressed: bool) {
        if pressed {
            self.pad |= button.mask();
        } else {
            self.pad &= !button.mask();
        }
    }

    /// Replace the whole held controller word.
    pub fn set_keys(&mut self, keys: u32) {
        self.pad = keys;
    }

    pub fn keys(&self) -> u32 {
        self.pad
    }

    pub fn set_docked(&mut self, docked: bool) {
        if docked != self.docked {
            log::debug!("docked input -> {}", docked);
        }
        self.docked = docked;
    }

    pub fn docked(&self) -> bool {
        self.docked
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Vsync strobes seen since reset.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Current beam position `(x, y)`.
    pub fn beam(&self) -> (u16, u16) {
        (self.timing.x(), self.timing.y())
    }

    /// Copy out the full register set.
    pub fn capture_state(&self) -> CoreState {
        CoreState {
            config: self.config.clone(),
            tick: self.tick,
            pixel_clock: self.pixel_clock.clone(),
            timing: self.timing.clone(),
            audio_clock: self.audio_clock.clone(),
            input: self.input.clone(),
            app: self.app.clone(),
            pad: self.pad,
            docked: self.docked,
            frame_count: self.frame_count,
        }
    }

    /// Load a register set captured under the same hardware configuration.
    ///
    /// The output sinks are not part of the state: the decoder restarts at
    /// the next slot and the scanout keeps its picture until overdrawn.
    pub fn restore_state(&mut self, state: &CoreState) -> Result<(), StateError> {
        if state.app.variant() != self.config.variant {
            return Err(StateError::Variant {
                saved: state.app.variant().name().to_string(),
                current: self.config.variant.name().to_string(),
            });
        }
        if !self.config.same_hardware(&state.config) {
            return Err(StateError::ConfigMismatch);
        }

        self.tick = state.tick;
        self.pixel_clock = state.pixel_clock.clone();
        self.timing = state.timing.clone();
        self.audio_clock = state.audio_clock.clone();
        self.input = state.input.clone();
        self.app = state.app.clone();
        self.pad = state.pad;
        self.docked = state.docked;
        self.frame_count = state.frame_count;
        self.i2s.reset();
        self.audio_buf.begin_frame(self.tick);
        log::debug!("state restored at tick {} (frame {})", state.tick, state.frame_count);
        Ok(())
    }

    /// Get display pixel buffer as 0xRRGGBB u32 slice (for minifb etc)
    pub fn framebuffer_u32(&self) -> Vec<u32> {
        self.scanout.as_pixel_buffer()
    }

    /// Get display framebuffer RGBA bytes
    pub fn framebuffer_rgba(&self) -> &[u8] {
        &self.scanout.framebuffer
    }

    /// Format a register dump of the clocks, beam and app state.
    pub fn dump_state(&self) -> String {
        let mut s = String::new();
        let (x, y) = self.beam();
        let _ = writeln!(
            s,
            "tick={} frame={} beam=({}, {}) docked={} v_active={}",
            self.tick,
            self.frame_count,
            x,
            y,
            self.timing.docked(),
            self.timing.v_active(),
        );
        let _ = writeln!(
            s,
            "pixel phase={}/{}  mclk={} sclk={} lrck={} lr_count=0x{:02X}",
            self.pixel_clock.phase(),
            self.pixel_clock.ratio(),
            self.audio_clock.mclk() as u8,
            self.audio_clock.sclk() as u8,
            self.audio_clock.lrck() as u8,
            self.audio_clock.lrck_count(),
        );
        let _ = writeln!(s, "pad=0x{:04X} last=0x{:04X}", self.pad, self.input.last());
        s.push_str(&self.app.describe());
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(variant: Variant) -> System {
        System::new(Config::small(variant)).unwrap()
    }

    fn run(sys: &mut System, input: &TickInput, ticks: u64) -> Vec<TickOutput> {
        (0..ticks).map(|_| sys.step(input)).collect()
    }

    #[test]
    fn test_system_creation() {
        let sys = small(Variant::Plain);
        assert_eq!(sys.tick(), 0);
        assert_eq!(sys.beam(), (0, 0));
        assert_eq!(sys.scanout.width(), 8);
        assert_eq!(sys.scanout.height(), 4);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::small(Variant::Plain);
        config.video.div_ratio = 6;
        assert!(matches!(System::new(config), Err(ConfigError::DividerRatio { ratio: 6 })));
    }

    #[test]
    fn test_one_vsync_per_frame() {
        let mut sys = small(Variant::Plain);
        let v = sys.config().video.clone();
        let ticks = 3 * v.ticks_per_frame();
        let out = run(&mut sys, &TickInput::default(), ticks);
        let pixels = out.iter().filter(|o| o.pixel_strobe).count() as u64;
        let vsyncs = out.iter().filter(|o| o.vsync_strobe).count();
        let hsyncs = out.iter().filter(|o| o.hsync_strobe).count() as u64;
        assert_eq!(pixels, 3 * v.h_total as u64 * v.v_total as u64);
        assert_eq!(vsyncs, 3);
        assert_eq!(hsyncs, 3 * v.v_total as u64);
        assert_eq!(sys.frame_count(), 3);
    }

    #[test]
    fn test_hs_trails_vs() {
        let mut sys = small(Variant::Plain);
        let ratio = sys.config().video.div_ratio as usize;
        let out = run(&mut sys, &TickInput::default(), 200);
        let vs = out.iter().position(|o| o.vs).unwrap();
        let hs = vs + out[vs..].iter().position(|o| o.hs).unwrap();
        assert_eq!(hs - vs, 3 * ratio);
    }

    #[test]
    fn test_pixel_clock_levels() {
        let mut sys = small(Variant::Plain);
        let out = run(&mut sys, &TickInput::default(), 8);
        let clk: Vec<bool> = out.iter().map(|o| o.pixel_clk).collect();
        let strobes: Vec<bool> = out.iter().map(|o| o.pixel_strobe).collect();
        assert_eq!(clk, vec![true, true, false, false, true, true, false, false]);
        assert_eq!(strobes, vec![true, false, false, false, true, false, false, false]);
    }

    #[test]
    fn test_framebuffer_shows_first_frame() {
        let mut sys = small(Variant::Plain);
        sys.run_frame();
        assert_eq!(sys.frame_count(), 1);
        let fb = sys.framebuffer_u32();
        let ink = Rgb::BLACK.to_u32();
        let paper = Rgb::WHITE.to_u32();
        let row = |y: usize| -> String {
            fb[y * 8..(y + 1) * 8].iter().map(|&p| if p == ink { '1' } else { assert_eq!(p, paper); '0' }).collect()
        };
        assert_eq!(row(0), "00001000");
        assert_eq!(row(1), "00011100");
        assert_eq!(row(2), "00100110");
        assert_eq!(sys.scanout.frames, 1);
    }

    #[test]
    fn test_run_frame_stops_on_vsync() {
        let mut sys = small(Variant::Plain);
        sys.run_frame();
        let first = sys.tick();
        sys.run_frame();
        assert_eq!(sys.tick() - first, sys.config().video.ticks_per_frame());
        assert_eq!(sys.audio_buf.frame_start, first);
        assert_eq!(sys.audio_buf.frame_end, sys.tick());
    }

    #[test]
    fn test_deterministic() {
        let mut a = small(Variant::Sandbox);
        let mut b = small(Variant::Sandbox);
        let input = TickInput { keys: Button::X.mask(), docked: false };
        assert_eq!(run(&mut a, &input, 2000), run(&mut b, &input, 2000));
    }

    #[test]
    fn test_restore_replays_bit_exact() {
        let mut sys = small(Variant::Sandbox);
        let idle = TickInput::default();
        let press = TickInput { keys: Button::A.mask() | Button::L1.mask(), docked: false };
        run(&mut sys, &idle, 700);
        run(&mut sys, &press, 50);
        let state = sys.capture_state();

        let first = run(&mut sys, &idle, 1500);
        let mut other = small(Variant::Sandbox);
        other.restore_state(&state).unwrap();
        let second = run(&mut other, &idle, 1500);
        assert_eq!(first, second);
        assert_eq!(sys.capture_state().tick, other.tick());
    }

    #[test]
    fn test_restore_rejects_other_variant() {
        let state = small(Variant::Plain).capture_state();
        let mut sys = small(Variant::TestPattern);
        assert!(matches!(sys.restore_state(&state), Err(StateError::Variant { .. })));

        let mut config = Config::small(Variant::Plain);
        config.video.h_total = 13;
        let mut sys = System::new(config).unwrap();
        assert!(matches!(sys.restore_state(&state), Err(StateError::ConfigMismatch)));
    }

    #[test]
    fn test_tone_decodes_through_serial_line() {
        let mut sys = small(Variant::TestPattern);
        let mut frames = Vec::new();
        for _ in 0..60 {
            sys.run_frame();
            frames.extend(sys.audio_buf.frames());
        }
        assert!(frames.len() > 30);
        for f in &frames {
            for ch in f {
                assert!(*ch == -1024 || *ch == 1023, "unexpected sample {}", ch);
            }
        }
        assert!(frames.iter().any(|f| f[0] == -1024));
        assert!(frames.iter().any(|f| f[0] == 1023));
    }

    #[test]
    fn test_set_button_and_dump() {
        let mut sys = small(Variant::Sandbox);
        sys.set_button(Button::Start, true);
        sys.set_button(Button::A, true);
        sys.set_button(Button::Start, false);
        assert_eq!(sys.keys(), Button::A.mask());
        let dump = sys.dump_state();
        assert!(dump.starts_with("tick=0 frame=0 beam=(0, 0)"));
        assert!(dump.contains("pad=0x0010"));
    }

    #[test]
    fn test_reset_clears_registers() {
        let mut sys = small(Variant::Plain);
        sys.run_frame();
        sys.reset();
        assert_eq!(sys.tick(), 0);
        assert_eq!(sys.frame_count(), 0);
        assert_eq!(sys.beam(), (0, 0));
    }
}
