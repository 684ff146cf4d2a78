//! Desktop frontend for the cellular automaton core.
//!
//! Provides two execution modes:
//!
//! - **GUI mode** (default): Scaled window of the active area with stereo
//!   audio, keyboard/gamepad input, quick save/load, rewind, screenshots.
//! - **Headless mode** (`--headless`): Runs a fixed number of frames with
//!   scripted button presses, ASCII snapshots, PNG and WAV capture.
//!
//! GUI keys: Arrows=D-pad Z/X/A/S=A/B/X/Y Q/W=L1/R1 Enter=Start
//! RShift=Select 1-6=Scale K=Dock M=Mute P=Screenshot D=Dump
//! F5=Save F9=Load Backspace=Rewind Esc=Quit

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ca_core::config::{Config, Variant};
use ca_core::snapshot::{RewindBuffer, Snapshot};
use ca_core::{png, savestate, Button, ConfigError, System};
use clap::Parser;
use gilrs::{Axis, Button as GilrsButton, Event as GilrsEvent, EventType, Gilrs};
use minifb::{Key, KeyRepeat, Scale, ScaleMode, Window, WindowOptions};
use tracing::{debug, error, info, warn, Level};

/// Audio output sample rate in Hz
const AUDIO_SAMPLE_RATE: u32 = 44100;
/// Output gain applied to the decoded samples
const AUDIO_VOLUME: f32 = 0.5;
/// Analog stick deadzone
const STICK_DEADZONE: f32 = 0.3;
/// Analog trigger deadzone
const TRIGGER_DEADZONE: f32 = 0.2;
/// Frames between rewind snapshots
const REWIND_INTERVAL: u32 = 60;
/// Rewind snapshots kept
const REWIND_CAPACITY: usize = 300;

const KEYMAP: [(Key, Button); 12] = [
    (Key::Up, Button::Up),
    (Key::Down, Button::Down),
    (Key::Left, Button::Left),
    (Key::Right, Button::Right),
    (Key::Z, Button::A),
    (Key::X, Button::B),
    (Key::A, Button::X),
    (Key::S, Button::Y),
    (Key::Q, Button::L1),
    (Key::W, Button::R1),
    (Key::RightShift, Button::Select),
    (Key::Enter, Button::Start),
];

// ─── Command line ───────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "ca-sim")]
#[command(version, about = "Cycle-accurate cellular automaton core simulator", long_about = None)]
struct Args {
    /// JSON config file (missing fields take their defaults)
    config: Option<PathBuf>,

    /// App variant: plain, sandbox or test-pattern
    #[arg(long)]
    variant: Option<Variant>,

    /// Initial rule number for the automaton variants
    #[arg(long)]
    rule: Option<u8>,

    /// Frames held frozen after reset (0-63)
    #[arg(long)]
    opening_frames: Option<u8>,

    /// Start with the docked input asserted
    #[arg(long)]
    docked: bool,

    /// Run without a window
    #[arg(long)]
    headless: bool,

    /// Frames to run in headless mode
    #[arg(long, default_value_t = 60)]
    frames: u64,

    /// Scripted press `button@frame[+len]` (headless, repeatable)
    #[arg(long = "press", value_name = "BUTTON@FRAME[+LEN]")]
    presses: Vec<Press>,

    /// Print the picture after frame F (headless, repeatable)
    #[arg(long = "snapshot", value_name = "F")]
    snapshots: Vec<u64>,

    /// Write the last frame as PNG (headless)
    #[arg(long)]
    png: Option<PathBuf>,

    /// Write the decoded audio of the whole run as WAV (headless)
    #[arg(long)]
    wav: Option<PathBuf>,

    /// Print the register dump when the run ends (headless)
    #[arg(long)]
    dump: bool,

    /// Disable audio
    #[arg(long)]
    mute: bool,

    /// Initial scale 1-6
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=6))]
    scale: u8,

    /// Log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// A scripted button hold: `button` from `frame` for `len` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Press {
    button: Button,
    frame: u64,
    len: u64,
}

impl Press {
    fn active(&self, frame: u64) -> bool {
        frame >= self.frame && frame < self.frame.saturating_add(self.len)
    }
}

impl FromStr for Press {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, when) = s
            .split_once('@')
            .ok_or_else(|| format!("expected button@frame[+len], got '{}'", s))?;
        let button = name.parse::<Button>()?;
        let (frame, len) = match when.split_once('+') {
            Some((f, l)) => (f, l),
            None => (when, "1"),
        };
        let frame = frame.parse::<u64>().map_err(|e| format!("bad frame '{}': {}", frame, e))?;
        let len = len.parse::<u64>().map_err(|e| format!("bad length '{}': {}", len, e))?;
        if len == 0 {
            return Err(format!("zero-length press '{}'", s));
        }
        Ok(Press { button, frame, len })
    }
}

fn setup_logging(verbose: u8) {
    use tracing_subscriber::util::SubscriberInitExt;

    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .compact()
        .finish()
        .init();
}

/// Config file (or defaults) with the command-line overrides applied.
fn build_config(args: &Args) -> Result<Config, ConfigError> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Config::from_json(&text)?
        }
        None => Config::default(),
    };
    if let Some(v) = args.variant {
        config.variant = v;
    }
    if let Some(rule) = args.rule {
        config.automaton.rule = rule;
    }
    if let Some(frames) = args.opening_frames {
        config.automaton.opening_frames = frames;
    }
    config.validate()?;
    Ok(config)
}

// ─── Audio ──────────────────────────────────────────────────────────────────

type AudioRing = Arc<Mutex<VecDeque<f32>>>;

/// Streams interleaved stereo samples rendered by the core each frame.
struct PcmSource {
    ring: AudioRing,
    sample_rate: u32,
}

impl Iterator for PcmSource {
    type Item = f32;
    fn next(&mut self) -> Option<f32> {
        // underrun plays silence
        match self.ring.try_lock() {
            Ok(mut ring) => Some(ring.pop_front().unwrap_or(0.0)),
            Err(_) => Some(0.0),
        }
    }
}

impl rodio::Source for PcmSource {
    fn current_frame_len(&self) -> Option<usize> { None }
    fn channels(&self) -> u16 { 2 }
    fn sample_rate(&self) -> u32 { self.sample_rate }
    fn total_duration(&self) -> Option<Duration> { None }
}

fn setup_audio(ring: AudioRing) -> Option<(rodio::OutputStream, rodio::Sink)> {
    match rodio::OutputStream::try_default() {
        Ok((stream, handle)) => match rodio::Sink::try_new(&handle) {
            Ok(sink) => {
                sink.append(PcmSource { ring, sample_rate: AUDIO_SAMPLE_RATE });
                Some((stream, sink))
            }
            Err(e) => {
                warn!("audio sink: {}", e);
                None
            }
        },
        Err(e) => {
            warn!("audio device: {}", e);
            None
        }
    }
}

// ─── Gamepad ────────────────────────────────────────────────────────────────

#[derive(Default)]
struct GamepadState {
    keys: u32,
    left_stick_x: f32,
    left_stick_y: f32,
}

impl GamepadState {
    fn set(&mut self, button: Button, pressed: bool) {
        if pressed {
            self.keys |= button.mask();
        } else {
            self.keys &= !button.mask();
        }
    }

    /// Button word with the left stick folded onto the D-pad.
    fn word(&self) -> u32 {
        let mut keys = self.keys;
        if self.left_stick_y < -STICK_DEADZONE { keys |= Button::Up.mask(); }
        if self.left_stick_y > STICK_DEADZONE { keys |= Button::Down.mask(); }
        if self.left_stick_x < -STICK_DEADZONE { keys |= Button::Left.mask(); }
        if self.left_stick_x > STICK_DEADZONE { keys |= Button::Right.mask(); }
        keys
    }
}

fn init_gamepad() -> Option<Gilrs> {
    match Gilrs::new() {
        Ok(gilrs) => {
            for (id, gp) in gilrs.gamepads() {
                info!("gamepad [{}] \"{}\" ({})", id, gp.name(), gp.os_name());
            }
            Some(gilrs)
        }
        Err(e) => {
            warn!("gamepad: {}", e);
            None
        }
    }
}

fn poll_gamepad(gilrs: &mut Gilrs, state: &mut GamepadState) {
    while let Some(GilrsEvent { event, .. }) = gilrs.next_event() {
        match event {
            EventType::ButtonPressed(b, _) => apply_button(state, b, true),
            EventType::ButtonReleased(b, _) => apply_button(state, b, false),
            EventType::AxisChanged(a, v, _) => apply_axis(state, a, v),
            EventType::Connected => info!("gamepad connected"),
            EventType::Disconnected => {
                info!("gamepad disconnected");
                *state = GamepadState::default();
            }
            _ => {}
        }
    }
}

fn apply_button(state: &mut GamepadState, btn: GilrsButton, pressed: bool) {
    let button = match btn {
        GilrsButton::DPadUp => Button::Up,
        GilrsButton::DPadDown => Button::Down,
        GilrsButton::DPadLeft => Button::Left,
        GilrsButton::DPadRight => Button::Right,
        GilrsButton::South => Button::A,
        GilrsButton::East => Button::B,
        GilrsButton::West => Button::X,
        GilrsButton::North => Button::Y,
        GilrsButton::LeftTrigger => Button::L1,
        GilrsButton::RightTrigger => Button::R1,
        GilrsButton::LeftTrigger2 => Button::L2,
        GilrsButton::RightTrigger2 => Button::R2,
        GilrsButton::LeftThumb => Button::L3,
        GilrsButton::RightThumb => Button::R3,
        GilrsButton::Select => Button::Select,
        GilrsButton::Start => Button::Start,
        _ => return,
    };
    state.set(button, pressed);
}

fn apply_axis(state: &mut GamepadState, axis: Axis, value: f32) {
    match axis {
        Axis::LeftStickX => state.left_stick_x = value,
        // gilrs reports up as positive
        Axis::LeftStickY => state.left_stick_y = -value,
        Axis::DPadX => {
            state.set(Button::Left, value < -STICK_DEADZONE);
            state.set(Button::Right, value > STICK_DEADZONE);
        }
        Axis::DPadY => {
            state.set(Button::Up, value > STICK_DEADZONE);
            state.set(Button::Down, value < -STICK_DEADZONE);
        }
        Axis::LeftZ => state.set(Button::L2, value > TRIGGER_DEADZONE),
        Axis::RightZ => state.set(Button::R2, value > TRIGGER_DEADZONE),
        _ => {}
    }
}

// ─── Capture ────────────────────────────────────────────────────────────────

fn save_screenshot(sys: &System, path: &Path) -> std::io::Result<()> {
    let data = png::encode_png(
        sys.scanout.width() as u32,
        sys.scanout.height() as u32,
        sys.framebuffer_rgba(),
    );
    std::fs::write(path, data)
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() {
    let args = Args::parse();
    setup_logging(args.verbose);

    let config = match build_config(&args) {
        Ok(c) => c,
        Err(e) => {
            error!("config: {}", e);
            std::process::exit(1);
        }
    };
    let mut sys = match System::new(config) {
        Ok(s) => s,
        Err(e) => {
            error!("core: {}", e);
            std::process::exit(1);
        }
    };
    sys.set_docked(args.docked);

    let result = if args.headless {
        run_headless(&args, &mut sys)
    } else {
        run_gui(&args, &mut sys)
    };
    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

// ─── GUI Mode ───────────────────────────────────────────────────────────────

fn open_window(title: &str, w: usize, h: usize, fps: usize) -> Result<Window, String> {
    let mut window = Window::new(
        title,
        w,
        h,
        WindowOptions {
            scale: Scale::X1,
            scale_mode: ScaleMode::AspectRatioStretch,
            resize: true,
            ..Default::default()
        },
    )
    .map_err(|e| format!("window: {}", e))?;
    window.set_target_fps(fps);
    Ok(window)
}

fn run_gui(args: &Args, sys: &mut System) -> Result<(), String> {
    let title = format!("ca-sim [{}]", sys.config().variant.name());
    let (width, height) = (sys.scanout.width(), sys.scanout.height());
    let fps = sys.config().frame_rate().round() as usize;
    let clock_hz = sys.config().reference_hz;
    let state_file = savestate::state_path(args.config.as_deref(), sys.config().variant);

    let mut scale = args.scale as usize;
    let mut scaled_w = width * scale;
    let mut scaled_h = height * scale;
    let mut window = open_window(&title, scaled_w, scaled_h, fps)?;
    let mut scaled_buf = vec![0u32; scaled_w * scaled_h];

    let audio_ring: AudioRing = Arc::new(Mutex::new(VecDeque::with_capacity(16384)));
    let mut muted = args.mute;
    let mut audio = if muted { None } else { setup_audio(audio_ring.clone()) };
    let mut pcm_buf: Vec<f32> = Vec::with_capacity(16384);

    let mut gilrs = init_gamepad();
    let mut gp = GamepadState::default();
    let mut rewind = RewindBuffer::new(REWIND_CAPACITY, REWIND_INTERVAL);
    let mut screenshot_n = 0u32;
    let mut last_fps_time = Instant::now();
    let mut fps_frames: u64 = 0;

    while window.is_open() && !window.is_key_down(Key::Escape) {
        if let Some(ref mut g) = gilrs {
            poll_gamepad(g, &mut gp);
        }

        // Scale toggle (1-6)
        let num_keys = [Key::Key1, Key::Key2, Key::Key3, Key::Key4, Key::Key5, Key::Key6];
        if let Some(i) = num_keys.iter().position(|&k| window.is_key_pressed(k, KeyRepeat::No)) {
            if i + 1 != scale {
                scale = i + 1;
                scaled_w = width * scale;
                scaled_h = height * scale;
                scaled_buf.resize(scaled_w * scaled_h, 0);
                window = open_window(&title, scaled_w, scaled_h, fps)?;
            }
        }

        if window.is_key_pressed(Key::M, KeyRepeat::No) {
            muted = !muted;
            audio = if muted { None } else { setup_audio(audio_ring.clone()) };
            if let Ok(mut ring) = audio_ring.lock() {
                ring.clear();
            }
        }

        if window.is_key_pressed(Key::K, KeyRepeat::No) {
            sys.set_docked(!sys.docked());
            info!("docked: {}", sys.docked());
        }

        if window.is_key_pressed(Key::P, KeyRepeat::No) {
            let path = PathBuf::from(format!("screenshot_{:04}.png", screenshot_n));
            match save_screenshot(sys, &path) {
                Ok(()) => {
                    info!("screenshot: {}", path.display());
                    screenshot_n += 1;
                }
                Err(e) => warn!("screenshot {}: {}", path.display(), e),
            }
        }

        if window.is_key_pressed(Key::D, KeyRepeat::No) {
            eprintln!("--- State ---\n{}---", sys.dump_state());
        }

        if window.is_key_pressed(Key::F5, KeyRepeat::No) {
            if let Err(e) = savestate::save_to_file(&sys.capture_state(), &state_file) {
                warn!("save state: {}", e);
            }
        }

        if window.is_key_pressed(Key::F9, KeyRepeat::No) {
            let loaded = savestate::load_from_file(&state_file, sys.config().variant)
                .and_then(|state| sys.restore_state(&state));
            match loaded {
                Ok(()) => rewind.clear(),
                Err(e) => warn!("load state: {}", e),
            }
        }

        let rewinding = window.is_key_down(Key::Backspace);
        if rewinding {
            if let Some(snap) = rewind.pop() {
                if let Err(e) = sys.restore_state(&snap.state) {
                    warn!("rewind: {}", e);
                }
                debug!("rewound to frame {}", snap.frame);
            }
        }

        let mut keys = gp.word();
        for &(key, button) in KEYMAP.iter() {
            if window.is_key_down(key) {
                keys |= button.mask();
            }
        }
        sys.set_keys(keys);

        sys.run_frame();
        fps_frames += 1;
        if !rewinding && rewind.tick_frame() {
            rewind.push(Snapshot::capture(sys));
        }

        if audio.is_some() && sys.audio_buf.needs_render() {
            sys.audio_buf.render_samples(&mut pcm_buf, AUDIO_SAMPLE_RATE, clock_hz, AUDIO_VOLUME);
            if let Ok(mut ring) = audio_ring.lock() {
                // Limit buffer to avoid latency buildup
                let max_buf = AUDIO_SAMPLE_RATE as usize / 5; // ~200ms
                if ring.len() < max_buf {
                    ring.extend(pcm_buf.iter());
                }
            }
        }

        // Render
        let pixels = sys.framebuffer_u32();
        for y in 0..height {
            for x in 0..width {
                let c = pixels[y * width + x];
                for sy in 0..scale {
                    let base = (y * scale + sy) * scaled_w + x * scale;
                    scaled_buf[base..base + scale].fill(c);
                }
            }
        }
        window
            .update_with_buffer(&scaled_buf, scaled_w, scaled_h)
            .map_err(|e| format!("window update: {}", e))?;

        if last_fps_time.elapsed() >= Duration::from_secs(2) {
            let rate = fps_frames as f64 / last_fps_time.elapsed().as_secs_f64();
            let ms = if muted { " [MUTE]" } else { "" };
            let dock = if sys.docked() { " [DOCK]" } else { "" };
            window.set_title(&format!("{} - {:.0} FPS{}{} ({}x)", title, rate, ms, dock, scale));
            fps_frames = 0;
            last_fps_time = Instant::now();
        }
    }
    info!("{} frames, {} ticks", sys.frame_count(), sys.tick());
    Ok(())
}

// ─── Headless Mode ──────────────────────────────────────────────────────────

fn run_headless(args: &Args, sys: &mut System) -> Result<(), String> {
    let mut wav = match &args.wav {
        Some(path) => {
            let spec = hound::WavSpec {
                channels: 2,
                sample_rate: sys.config().audio.sample_rate,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            };
            let writer = hound::WavWriter::create(path, spec)
                .map_err(|e| format!("{}: {}", path.display(), e))?;
            Some(writer)
        }
        None => None,
    };

    info!("running {} frames", args.frames);
    for frame in 0..args.frames {
        let keys = args
            .presses
            .iter()
            .filter(|p| p.active(frame))
            .fold(0u32, |k, p| k | p.button.mask());
        if keys != sys.keys() {
            debug!("frame {}: keys 0x{:04X}", frame, keys);
        }
        sys.set_keys(keys);
        sys.run_frame();

        if let Some(ref mut w) = wav {
            for [l, r] in sys.audio_buf.frames() {
                w.write_sample(l).map_err(|e| format!("wav: {}", e))?;
                w.write_sample(r).map_err(|e| format!("wav: {}", e))?;
            }
        }

        if args.snapshots.contains(&(frame + 1)) {
            println!("\n  === Frame {} ===", frame + 1);
            print_display(sys);
        }
    }

    if let Some(w) = wav {
        w.finalize().map_err(|e| format!("wav: {}", e))?;
    }
    if let Some(path) = &args.png {
        save_screenshot(sys, path).map_err(|e| format!("{}: {}", path.display(), e))?;
        info!("wrote {}", path.display());
    }
    if args.dump {
        println!("{}", sys.dump_state());
    }
    info!("done: {} frames, {} ticks", sys.frame_count(), sys.tick());
    Ok(())
}

fn print_display(sys: &System) {
    let (w, h) = (sys.scanout.width(), sys.scanout.height());
    let lit = |x: usize, y: usize| y < h && sys.scanout.pixel(x, y).luma() > 128;
    let count = (0..h).flat_map(|y| (0..w).map(move |x| (x, y))).filter(|&(x, y)| lit(x, y)).count();
    println!("  ({} px lit)", count);
    for y in (0..h).step_by(2) {
        let mut l = String::with_capacity(w + 4);
        l.push_str("  |");
        for x in 0..w {
            l.push(match (lit(x, y), lit(x, y + 1)) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                _ => ' ',
            });
        }
        l.push('|');
        println!("{}", l);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_press() {
        let p: Press = "start@10".parse().unwrap();
        assert_eq!(p, Press { button: Button::Start, frame: 10, len: 1 });
        let p: Press = "X@3+4".parse().unwrap();
        assert_eq!(p, Press { button: Button::X, frame: 3, len: 4 });
        assert!(p.active(3) && p.active(6) && !p.active(7) && !p.active(2));
    }

    #[test]
    fn test_press_near_frame_limit() {
        let p = Press { button: Button::A, frame: u64::MAX - 1, len: u64::MAX };
        assert!(p.active(u64::MAX - 1));
        assert!(!p.active(0));
    }

    #[test]
    fn test_parse_press_errors() {
        assert!("start".parse::<Press>().is_err());
        assert!("turbo@1".parse::<Press>().is_err());
        assert!("a@x".parse::<Press>().is_err());
        assert!("a@1+0".parse::<Press>().is_err());
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::parse_from(["ca-sim", "--variant", "sandbox", "--rule", "110", "--opening-frames", "0"]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.variant, Variant::Sandbox);
        assert_eq!(config.automaton.rule, 110);
        assert_eq!(config.automaton.opening_frames, 0);
    }

    #[test]
    fn test_gamepad_word() {
        let mut gp = GamepadState::default();
        apply_button(&mut gp, GilrsButton::South, true);
        apply_axis(&mut gp, Axis::LeftStickY, 0.9);
        assert_eq!(gp.word(), Button::A.mask() | Button::Up.mask());
        apply_button(&mut gp, GilrsButton::South, false);
        apply_axis(&mut gp, Axis::LeftStickY, 0.0);
        assert_eq!(gp.word(), 0);
    }
}
