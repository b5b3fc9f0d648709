//! XVM-8 emulator frontend.
//!
//! Provides three execution modes:
//!
//! - **GUI mode** (default): Scaled window with keyboard/gamepad input,
//!   dynamic scale toggle, screenshot, quick save/load and rewind.
//! - **Headless mode** (`--headless`): Automated runs with ASCII snapshots.
//! - **Step mode** (`--step`): Interactive instruction-level debugger.
//!
//! GUI keys: Arrows=D-pad Z=A X=B 1-6=Scale S=Screenshot D=RegDump
//! F5=Save F9=Load Backspace=Rewind R=Reset Esc=Quit

use clap::Parser;
use gilrs::{Axis, Button as GilrsButton, Event as GilrsEvent, EventType, Gilrs};
use minifb::{Key, Scale, ScaleMode, Window, WindowOptions};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};
use xvm8_core::snapshot::RewindBuffer;
use xvm8_core::{png, savestate, Button, Machine, FRAME_RATE, SCREEN_HEIGHT, SCREEN_WIDTH};

/// Analog stick deadzone for D-pad emulation
const STICK_DEADZONE: f32 = 0.3;
/// Analog trigger threshold for the A button
const TRIGGER_DEADZONE: f32 = 0.2;
/// Rewind history: one snapshot every half second, 30 seconds deep
const REWIND_CAPACITY: usize = 60;
const REWIND_INTERVAL: u32 = 30;

#[derive(Parser, Debug)]
#[command(name = "xvm8-emu")]
#[command(about = "XVM-8 fantasy computer emulator", long_about = None)]
struct Args {
    /// Cartridge image (.xvm)
    rom: PathBuf,

    /// Run without a window
    #[arg(long)]
    headless: bool,

    /// Frames to run (headless), or max steps for `r` (step mode)
    #[arg(long)]
    frames: Option<usize>,

    /// Per-frame diagnostics and debug logging
    #[arg(long)]
    debug: bool,

    /// Initial window scale
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u8).range(1..=6))]
    scale: u8,

    /// Breakpoint at hex address (repeatable)
    #[arg(long = "break", value_name = "ADDR", value_parser = parse_hex)]
    breakpoints: Vec<u16>,

    /// Interactive step debugger
    #[arg(long)]
    step: bool,

    /// Press A on this frame (headless)
    #[arg(long, value_name = "FRAME")]
    press: Option<usize>,

    /// Print the display at this frame (headless, repeatable)
    #[arg(long = "snapshot", value_name = "FRAME")]
    snapshots: Vec<usize>,

    /// Write a PNG of the last frame (headless)
    #[arg(long, value_name = "PATH")]
    screenshot: Option<PathBuf>,
}

fn parse_hex(s: &str) -> Result<u16, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16).map_err(|e| format!("bad address {:?}: {}", s, e))
}

// ─── Logging ────────────────────────────────────────────────────────────────

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(debug: bool) {
    let level = if debug { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

// ─── Gamepad ────────────────────────────────────────────────────────────────

#[derive(Default)]
struct GamepadState {
    up: bool, down: bool, left: bool, right: bool,
    a: bool, b: bool,
    left_stick_x: f32, left_stick_y: f32,
}

impl GamepadState {
    fn eff_up(&self)    -> bool { self.up    || self.left_stick_y < -STICK_DEADZONE }
    fn eff_down(&self)  -> bool { self.down  || self.left_stick_y >  STICK_DEADZONE }
    fn eff_left(&self)  -> bool { self.left  || self.left_stick_x < -STICK_DEADZONE }
    fn eff_right(&self) -> bool { self.right || self.left_stick_x >  STICK_DEADZONE }
}

fn init_gamepad() -> Option<Gilrs> {
    match Gilrs::new() {
        Ok(gilrs) => {
            let mut found = false;
            for (id, gp) in gilrs.gamepads() {
                log::debug!("Gamepad: [{}] \"{}\" ({})", id, gp.name(), gp.os_name());
                found = true;
            }
            if !found { log::debug!("No gamepad (hot-plug supported)."); }
            Some(gilrs)
        }
        Err(e) => { log::warn!("gamepad: {}", e); None }
    }
}

fn poll_gamepad(gilrs: &mut Gilrs, state: &mut GamepadState) {
    while let Some(GilrsEvent { event, .. }) = gilrs.next_event() {
        match event {
            EventType::ButtonPressed(b, _)  => apply_button(state, b, true),
            EventType::ButtonReleased(b, _) => apply_button(state, b, false),
            EventType::AxisChanged(a, v, _) => apply_axis(state, a, v),
            EventType::Connected => log::debug!("Gamepad connected"),
            EventType::Disconnected => {
                log::debug!("Gamepad disconnected");
                *state = GamepadState::default();
            }
            _ => {}
        }
    }
}

fn apply_button(state: &mut GamepadState, btn: GilrsButton, pressed: bool) {
    match btn {
        GilrsButton::DPadUp    => state.up    = pressed,
        GilrsButton::DPadDown  => state.down  = pressed,
        GilrsButton::DPadLeft  => state.left  = pressed,
        GilrsButton::DPadRight => state.right = pressed,
        GilrsButton::South | GilrsButton::LeftTrigger2 | GilrsButton::RightTrigger2 => state.a = pressed,
        GilrsButton::East | GilrsButton::West | GilrsButton::North => state.b = pressed,
        _ => {}
    }
}

fn apply_axis(state: &mut GamepadState, axis: Axis, value: f32) {
    match axis {
        Axis::LeftStickX => state.left_stick_x = value,
        // gilrs reports up as positive
        Axis::LeftStickY => state.left_stick_y = -value,
        Axis::DPadX => { state.left = value < -STICK_DEADZONE; state.right = value > STICK_DEADZONE; }
        Axis::DPadY => { state.up = value > STICK_DEADZONE; state.down = value < -STICK_DEADZONE; }
        Axis::LeftZ | Axis::RightZ => {
            if value > TRIGGER_DEADZONE { state.a = true; }
            else if value < 0.05 { state.a = false; }
        }
        _ => {}
    }
}

// ─── Screenshot (PNG) ───────────────────────────────────────────────────────

fn save_screenshot(machine: &Machine, path: &Path) -> std::io::Result<()> {
    let data = png::encode_png(SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32, machine.framebuffer_rgba());
    fs::write(path, data)
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.debug);

    let rom_data = match fs::read(&args.rom) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Error: {}: {}", args.rom.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let mut machine = Machine::new();
    machine.debug = args.debug;
    if let Err(e) = machine.load_rom(&rom_data) {
        eprintln!("Error: {}: {}", args.rom.display(), e);
        return ExitCode::FAILURE;
    }
    for &addr in &args.breakpoints {
        log::debug!("Breakpoint: 0x{:04X}", addr);
    }
    machine.breakpoints = args.breakpoints.clone();
    machine.start();

    if args.step {
        run_step_mode(&args, &mut machine);
    } else if args.headless {
        if let Err(e) = run_headless(&args, &mut machine) {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    } else if let Err(e) = run_gui(&args, &mut machine, &rom_data) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

// ─── GUI Mode ───────────────────────────────────────────────────────────────

fn open_window(scale: usize) -> Result<Window, minifb::Error> {
    let mut window = Window::new(
        "XVM-8",
        SCREEN_WIDTH * scale,
        SCREEN_HEIGHT * scale,
        WindowOptions {
            scale: Scale::X1,
            scale_mode: ScaleMode::AspectRatioStretch,
            resize: true,
            ..Default::default()
        },
    )?;
    window.set_target_fps(FRAME_RATE as usize);
    Ok(window)
}

fn run_gui(args: &Args, machine: &mut Machine, rom_data: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
    let mut scale = args.scale as usize;
    let mut window = open_window(scale)?;
    let mut scaled_buf = vec![0u32; SCREEN_WIDTH * scale * SCREEN_HEIGHT * scale];

    let mut gilrs = init_gamepad();
    let mut gp = GamepadState::default();
    let mut rewind = RewindBuffer::new(REWIND_CAPACITY, REWIND_INTERVAL);
    let state_file = savestate::state_path(&args.rom);

    let mut frame_count: u64 = 0;
    let start_time = Instant::now();
    let mut last_fps_time = Instant::now();
    let mut fps_frames: u64 = 0;
    let mut screenshot_n = 0u32;
    let mut prev_keys = [false; 5]; // S, D, F5, F9, R
    let mut prev_num = [false; 6];

    while window.is_open() && !window.is_key_down(Key::Escape) {
        if let Some(ref mut g) = gilrs { poll_gamepad(g, &mut gp); }

        // Scale toggle (1-6)
        let num = [Key::Key1, Key::Key2, Key::Key3, Key::Key4, Key::Key5, Key::Key6]
            .map(|k| window.is_key_down(k));
        for (i, (&now, &before)) in num.iter().zip(prev_num.iter()).enumerate() {
            if now && !before && scale != i + 1 {
                scale = i + 1;
                scaled_buf = vec![0u32; SCREEN_WIDTH * scale * SCREEN_HEIGHT * scale];
                window = open_window(scale)?;
            }
        }
        prev_num = num;

        let keys = [Key::S, Key::D, Key::F5, Key::F9, Key::R].map(|k| window.is_key_down(k));
        let pressed = |i: usize| keys[i] && !prev_keys[i];

        // Screenshot (S)
        if pressed(0) {
            let f = PathBuf::from(format!("screenshot_{:04}.png", screenshot_n));
            match save_screenshot(machine, &f) {
                Ok(()) => { log::info!("Screenshot: {}", f.display()); screenshot_n += 1; }
                Err(e) => log::error!("Screenshot {}: {}", f.display(), e),
            }
        }

        // Reg dump (D)
        if pressed(1) {
            eprintln!("--- Regs (frame {}) ---\n{}\nNext: {}\n---",
                machine.frame_count(), machine.dump_regs(), machine.disasm_at_pc());
        }

        // Quick save (F5) / load (F9)
        if pressed(2) {
            match savestate::save_to_file(&machine.to_save_state(), &state_file) {
                Ok(()) => log::info!("Saved state: {}", state_file.display()),
                Err(e) => log::error!("Save state: {}", e),
            }
        }
        if pressed(3) {
            match savestate::load_from_file(&state_file) {
                Ok(state) => {
                    machine.apply_save_state(&state);
                    rewind.clear();
                    log::info!("Loaded state: {}", state_file.display());
                }
                Err(e) => log::error!("Load state: {}", e),
            }
        }

        // Reset (R): reload the cartridge from scratch
        if pressed(4) {
            if machine.load_rom(rom_data).is_ok() {
                machine.start();
                rewind.clear();
            }
        }
        prev_keys = keys;

        // Input, sampled once per frame
        let mut mask = 0u8;
        for (button, down) in [
            (Button::Up,    window.is_key_down(Key::Up)    || gp.eff_up()),
            (Button::Down,  window.is_key_down(Key::Down)  || gp.eff_down()),
            (Button::Left,  window.is_key_down(Key::Left)  || gp.eff_left()),
            (Button::Right, window.is_key_down(Key::Right) || gp.eff_right()),
            (Button::A,     window.is_key_down(Key::Z)     || gp.a),
            (Button::B,     window.is_key_down(Key::X)     || gp.b),
        ] {
            if down { mask |= button.mask(); }
        }
        machine.set_input(mask);

        if window.is_key_down(Key::Backspace) {
            if let Some(snap) = rewind.pop() {
                machine.restore_snapshot(&snap);
            }
        } else {
            if machine.step_frame() && rewind.tick_frame() {
                rewind.push(machine.save_snapshot());
            }
            if machine.breakpoint_hit {
                eprintln!("*** Breakpoint: {} ***\n{}", machine.disasm_at_pc(), machine.dump_regs());
                // Execute past the breakpoint so the next frame makes progress
                machine.step_one();
            }
        }
        frame_count += 1;
        fps_frames += 1;

        // Render
        let pixels = machine.framebuffer_u32();
        let scaled_w = SCREEN_WIDTH * scale;
        for (y, row) in pixels.chunks_exact(SCREEN_WIDTH).enumerate() {
            for (x, &c) in row.iter().enumerate() {
                for sy in 0..scale {
                    let base = (y * scale + sy) * scaled_w + x * scale;
                    scaled_buf[base..base + scale].fill(c);
                }
            }
        }
        window.update_with_buffer(&scaled_buf, scaled_w, SCREEN_HEIGHT * scale)?;

        if last_fps_time.elapsed() >= Duration::from_secs(1) {
            let fps = fps_frames as f64 / last_fps_time.elapsed().as_secs_f64();
            let halted = if machine.running { "" } else { " [HALT]" };
            window.set_title(&format!(
                "XVM-8 - {:.0} FPS  PC={:04X}  cycles={}{} ({}x)",
                fps, machine.cpu.pc(), machine.cycles, halted, scale
            ));
            fps_frames = 0;
            last_fps_time = Instant::now();
        }
    }
    if args.debug {
        let e = start_time.elapsed().as_secs_f64();
        log::debug!("{} frames in {:.1}s ({:.1} FPS), {} cycles",
            frame_count, e, frame_count as f64 / e, machine.cycles);
    }
    Ok(())
}

// ─── Step Mode ──────────────────────────────────────────────────────────────

fn run_step_mode(args: &Args, machine: &mut Machine) {
    let max_steps = args.frames.unwrap_or(100_000);

    println!("Step mode: Enter=step, N<enter>=step N, r=run to break, d=dump, q=quit");
    println!("{}", machine.dump_regs());
    println!("Next: {}", machine.disasm_at_pc());

    let stdin = std::io::stdin();
    let mut steps = 0usize;
    loop {
        let mut line = String::new();
        print!("step> ");
        let _ = std::io::stdout().flush();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let cmd = line.trim();
        match cmd {
            "q" | "quit" => break,
            "d" | "dump" => { println!("{}", machine.dump_regs()); continue; }
            "r" | "run" => {
                for i in 0..max_steps {
                    if !machine.running { println!("*** Halted ***"); break; }
                    if i > 0 && machine.breakpoints.contains(&machine.cpu.pc()) {
                        println!("*** Breakpoint: {} ***", machine.disasm_at_pc());
                        break;
                    }
                    machine.step_one();
                    steps += 1;
                }
                println!("{}", machine.dump_regs());
                println!("Next: {}", machine.disasm_at_pc());
                continue;
            }
            _ => {}
        }
        let n: usize = cmd.parse().unwrap_or(1);
        for i in 0..n {
            if !machine.running { println!("  *** Halted ***"); break; }
            let asm = machine.step_one();
            steps += 1;
            if n <= 20 { println!("  {}", asm); }
            else if i == n - 1 { println!("  ... {} steps, last: {}", n, asm); }
        }
        println!("{}", machine.dump_regs());
        println!("Next: {}", machine.disasm_at_pc());
    }
    println!("Total: {} steps, {} cycles", steps, machine.cycles);
}

// ─── Headless Mode ──────────────────────────────────────────────────────────

fn run_headless(args: &Args, machine: &mut Machine) -> std::io::Result<()> {
    let frames = args.frames.unwrap_or(60);
    if let Some(pf) = args.press { log::debug!("Press A on frame {}", pf); }
    log::debug!("Running {} frames...", frames);

    for frame in 0..frames {
        if let Some(pf) = args.press {
            if frame == pf { machine.set_button(Button::A, true); log::debug!("  >> A pressed"); }
            else if frame == pf + 5 { machine.set_button(Button::A, false); log::debug!("  >> A released"); }
        }
        let c0 = machine.cycles;
        let rendered = machine.step_frame();
        if machine.breakpoint_hit {
            println!("*** Break: {} (frame {}) ***\n{}", machine.disasm_at_pc(), frame + 1, machine.dump_regs());
            machine.step_one();
        }
        if args.debug && rendered {
            let show = frame < 15 || (frame < 100 && frame % 10 == 0) || (frame < 1000 && frame % 100 == 0)
                || frame == frames - 1;
            if show {
                println!("  Frame {:3}: +{:6} cyc  px={:5}  pc=0x{:04X}",
                    frame + 1, machine.cycles - c0, pixel_count(machine), machine.cpu.pc());
            }
        }
        if args.snapshots.contains(&(frame + 1)) || (args.debug && frame == frames - 1) {
            println!("\n  === Frame {} ===", frame + 1);
            print_display(machine);
        }
        if !machine.running {
            println!("Halted at frame {} (PC=0x{:04X})", frame + 1, machine.cpu.pc());
            break;
        }
    }
    if let Some(ref path) = args.screenshot {
        save_screenshot(machine, path)?;
        log::info!("Screenshot: {}", path.display());
    }
    log::debug!("Done. {} cycles, {} BREAKs.", machine.cycles, machine.break_count);
    Ok(())
}

fn is_lit(fb: &[u8], i: usize) -> bool {
    let px = &fb[i * 4..i * 4 + 3];
    // Rec. 601 luma, integer form
    (px[0] as u32 * 299 + px[1] as u32 * 587 + px[2] as u32 * 114) / 1000 > 64
}

fn pixel_count(machine: &Machine) -> usize {
    let fb = machine.framebuffer_rgba();
    (0..SCREEN_WIDTH * SCREEN_HEIGHT).filter(|&i| is_lit(fb, i)).count()
}

fn print_display(machine: &Machine) {
    let fb = machine.framebuffer_rgba();
    println!("  ({} px lit)", pixel_count(machine));
    for y in (0..SCREEN_HEIGHT).step_by(2) {
        let mut l = String::with_capacity(SCREEN_WIDTH * 3 + 4);
        l.push_str("  |");
        for x in 0..SCREEN_WIDTH {
            let t = is_lit(fb, y * SCREEN_WIDTH + x);
            let b = y + 1 < SCREEN_HEIGHT && is_lit(fb, (y + 1) * SCREEN_WIDTH + x);
            l.push(match (t, b) { (true, true) => '█', (true, false) => '▀', (false, true) => '▄', _ => ' ' });
        }
        l.push('|');
        println!("{}", l);
    }
}
