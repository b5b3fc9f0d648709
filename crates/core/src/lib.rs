//! # xvm8-core
//!
//! Emulation core for the XVM-8, a fictional 8-bit computer with a 1 MHz CPU,
//! four 8-bit registers, a 16-bit flat address space and a 128×128 display
//! driven by a 16-entry RGB332 palette.
//!
//! ## Architecture
//!
//! - [`Machine`] — Top-level emulator that owns CPU, memory and display
//! - [`Cpu`] — Register file (A, B, C, D, PC, SP, F)
//! - [`Memory`] — Address space: RAM, VRAM, I/O, ROM and the canonical palette
//! - [`Display`] — VRAM → RGBA framebuffer transform
//! - [`opcodes`] — Instruction decoder and cycle-cost table
//! - [`disasm`] — Instruction disassembler for debug views
//! - [`rom`] — Cartridge image parser
//! - [`snapshot`] — Machine state snapshots for rewind
//! - [`savestate`] — Quick save / quick load files
//! - [`png`] — Screenshot encoder
//!
//! ## Memory map
//!
//! ```text
//! 0x0000-0x7FFF  RAM (32 KB, stack grows down from 0x7FFF)
//! 0x8000-0xBFFF  VRAM (128×128, one palette index per byte)
//! 0xC000-0xC0FF  I/O (0xC001 IRQ status, 0xC010 input, 0xC020-0xC02F palette)
//! 0xC100-0xDFFF  unmapped (reads 0, writes ignored)
//! 0xE000-0xFFFF  ROM (8 KB, read-only to programs)
//! ```
//!
//! The host drives the machine one frame at a time with [`Machine::step_frame`];
//! nothing in the core blocks or keeps time on its own.

pub mod cpu;
pub mod memory;
pub mod opcodes;
pub mod display;
pub mod disasm;
pub mod error;
pub mod interrupt;
pub mod rom;
pub mod png;
pub mod snapshot;
pub mod savestate;

pub use cpu::Cpu;
pub use display::Display;
pub use error::{Result, XvmError};
pub use memory::Memory;

/// CPU clock frequency: 1 MHz
pub const CLOCK_HZ: u32 = 1_000_000;
/// Display refresh rate
pub const FRAME_RATE: u32 = 60;
/// Cycle budget per frame (1 MHz / 60 Hz, rounded up)
pub const CYCLES_PER_FRAME: u32 = 16_667;
/// Interrupt poll cadence in cycles, counted within a frame
pub const INTERRUPT_INTERVAL: u32 = 1_000;

/// RAM size: 32 KB at 0x0000
pub const RAM_SIZE: usize = 0x8000;
/// Video RAM base address
pub const VRAM_BASE: u16 = 0x8000;
/// Video RAM size: one byte per pixel
pub const VRAM_SIZE: usize = 0x4000;
/// I/O page base address
pub const IO_BASE: u16 = 0xC000;
/// I/O page size
pub const IO_SIZE: usize = 0x100;
/// ROM base address
pub const ROM_BASE: u16 = 0xE000;
/// ROM size: 8 KB
pub const ROM_SIZE: usize = 0x2000;

/// I/O mirror of the palette (16 bytes)
pub const PALETTE_MIRROR: u16 = 0xC020;
/// Number of palette entries
pub const PALETTE_SIZE: usize = 16;
/// Interrupt status byte
pub const IRQ_STATUS: u16 = 0xC001;
/// Timer-pending bit in [`IRQ_STATUS`]
pub const IRQ_TIMER_BIT: u8 = 0x02;
/// Interrupt vector
pub const IRQ_VECTOR: u16 = 0xFF00;
/// Button bitmask, see [`Button`]
pub const INPUT_ADDR: u16 = 0xC010;

/// Initial stack pointer
pub const STACK_TOP: u16 = 0x7FFF;
/// Entry point used by a plain reset
pub const DEFAULT_ENTRY: u16 = 0xE000;

/// Display width in pixels
pub const SCREEN_WIDTH: usize = 128;
/// Display height in pixels
pub const SCREEN_HEIGHT: usize = 128;

/// Power-on palette (RGB332)
pub const DEFAULT_PALETTE: [u8; PALETTE_SIZE] = [
    0x00, 0x03, 0x1C, 0x1F, 0xE0, 0xE3, 0xFC, 0xFF,
    0x49, 0x92, 0xB6, 0xDB, 0x24, 0x6D, 0xB0, 0xFF,
];

// Flag bit positions in F
pub const FLAG_Z: u8 = 0;
pub const FLAG_C: u8 = 1;
pub const FLAG_N: u8 = 2;
/// Overflow: reserved, no instruction sets it
pub const FLAG_V: u8 = 3;
/// Interrupt enable
pub const FLAG_I: u8 = 7;

/// Buttons in the input bitmask at [`INPUT_ADDR`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
}

impl Button {
    pub const ALL: [Button; 6] = [
        Button::Up, Button::Down, Button::Left, Button::Right, Button::A, Button::B,
    ];

    pub fn mask(self) -> u8 {
        match self {
            Button::Up => 0x01,
            Button::Down => 0x02,
            Button::Left => 0x04,
            Button::Right => 0x08,
            Button::A => 0x10,
            Button::B => 0x20,
        }
    }
}

/// Top-level XVM-8 machine.
pub struct Machine {
    pub cpu: Cpu,
    pub mem: Memory,
    pub display: Display,
    /// Cycles executed since the last reset
    pub cycles: u64,
    /// Cleared by HALT or [`Machine::stop`]
    pub running: bool,
    /// Progress through the current frame's cycle budget
    frame_cycles: u32,
    frame_count: u32,
    /// Breakpoint addresses
    pub breakpoints: Vec<u16>,
    /// True if the last frame stopped at a breakpoint
    pub breakpoint_hit: bool,
    /// Number of BREAK instructions executed
    pub break_count: u64,
    /// Enable per-instruction diagnostics (unknown opcodes, IRQ delivery)
    pub debug: bool,
    /// Last button state written by the host
    input_state: u8,
}

impl Machine {
    /// Create a machine in reset state with an empty ROM. It does not run
    /// until [`Machine::start`] is called.
    pub fn new() -> Self {
        let mut m = Machine {
            cpu: Cpu::new(),
            mem: Memory::new(),
            display: Display::new(),
            cycles: 0,
            running: false,
            frame_cycles: 0,
            frame_count: 0,
            breakpoints: Vec::new(),
            breakpoint_hit: false,
            break_count: 0,
            debug: false,
            input_state: 0,
        };
        m.reset(DEFAULT_ENTRY);
        m
    }

    /// Load a cartridge image and reset to its entry point.
    ///
    /// The image is validated before anything is touched: on error the
    /// machine is left exactly as it was. Returns the program size in bytes.
    pub fn load_rom(&mut self, data: &[u8]) -> Result<usize> {
        let image = match rom::parse_rom(data) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("ROM rejected: {}", e);
                return Err(e);
            }
        };
        self.mem.load_rom(image.program);
        self.reset(image.entry);
        log::info!(
            "Loaded ROM: {} bytes, entry 0x{:04X}",
            image.program.len(),
            image.entry
        );
        Ok(image.program.len())
    }

    /// Reset CPU and memory. ROM contents and the canonical palette survive;
    /// the palette is copied back into its I/O mirror.
    pub fn reset(&mut self, entry: u16) {
        self.cpu.reset(entry);
        self.mem.reset();
        self.cycles = 0;
        self.frame_cycles = 0;
        self.breakpoint_hit = false;
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Write the full button bitmask into the input byte.
    pub fn set_input(&mut self, mask: u8) {
        self.input_state = mask;
        self.mem.write8(INPUT_ADDR, mask);
    }

    /// Press or release a single button.
    pub fn set_button(&mut self, button: Button, pressed: bool) {
        let mask = if pressed {
            self.input_state | button.mask()
        } else {
            self.input_state & !button.mask()
        };
        self.set_input(mask);
    }

    /// Execute one instruction and return its cycle cost.
    pub fn step(&mut self) -> u8 {
        let pc = self.cpu.pc();
        let op = self.mem.read8(pc);
        let b1 = self.mem.read8(pc.wrapping_add(1));
        let b2 = self.mem.read8(pc.wrapping_add(2));
        let (inst, size) = opcodes::decode(op, b1, b2);
        self.execute_inst(inst, size);
        let cost = opcodes::CYCLE_TABLE[op as usize];
        self.cycles += cost as u64;
        self.frame_cycles += cost as u32;
        cost
    }

    /// Poll the interrupt line when the frame's cycle count lands exactly on
    /// a multiple of [`INTERRUPT_INTERVAL`].
    fn poll_interrupt(&mut self) {
        if self.frame_cycles % INTERRUPT_INTERVAL == 0 {
            self.check_interrupt();
        }
    }

    /// Run one frame: execute until the cycle budget is spent or the machine
    /// halts, then render VRAM into the framebuffer.
    ///
    /// Returns false without rendering if the machine was not running or a
    /// breakpoint stopped execution. A frame interrupted by a breakpoint
    /// resumes where it left off on the next call.
    pub fn step_frame(&mut self) -> bool {
        self.breakpoint_hit = false;
        if !self.running {
            return false;
        }
        while self.frame_cycles < CYCLES_PER_FRAME && self.running {
            if !self.breakpoints.is_empty() && self.breakpoints.contains(&self.cpu.pc()) {
                self.breakpoint_hit = true;
                return false;
            }
            self.step();
            self.poll_interrupt();
        }
        self.frame_cycles = 0;
        self.display.render(&self.mem.vram, &self.mem.palette);
        self.frame_count += 1;

        if self.debug && self.frame_count <= 10 {
            log::debug!(
                "Frame {}: pc=0x{:04X} cycles={} running={}",
                self.frame_count,
                self.cpu.pc(),
                self.cycles,
                self.running
            );
        }
        true
    }

    /// Frames completed since the machine was created.
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Execute a single instruction and return its disassembly.
    ///
    /// Used by the debugger for step-by-step execution.
    pub fn step_one(&mut self) -> String {
        let line = self.disasm_at_pc();
        self.step();
        self.poll_interrupt();
        if self.frame_cycles >= CYCLES_PER_FRAME {
            self.frame_cycles = 0;
            self.display.render(&self.mem.vram, &self.mem.palette);
            self.frame_count += 1;
        }
        line
    }

    /// Disassemble the instruction at the current PC without executing it.
    pub fn disasm_at_pc(&self) -> String {
        let pc = self.cpu.pc();
        let (inst, _) = opcodes::decode(
            self.mem.read8(pc),
            self.mem.read8(pc.wrapping_add(1)),
            self.mem.read8(pc.wrapping_add(2)),
        );
        format!("0x{:04X}: {}", pc, disasm::disassemble(inst))
    }

    /// Format a register dump string with A-D, PC, SP, F and the cycle count.
    pub fn dump_regs(&self) -> String {
        use crate::cpu::Reg;
        format!(
            "A={:02X} B={:02X} C={:02X} D={:02X}\nPC={:04X} SP={:04X} F={} (0x{:02X}) cycles={}",
            self.cpu.reg(Reg::A),
            self.cpu.reg(Reg::B),
            self.cpu.reg(Reg::C),
            self.cpu.reg(Reg::D),
            self.cpu.pc(),
            self.cpu.sp(),
            disasm::format_flags(self.cpu.flags()),
            self.cpu.flags(),
            self.cycles
        )
    }

    /// The last rendered frame as 128×128 RGBA bytes.
    pub fn framebuffer_rgba(&self) -> &[u8] {
        &self.display.framebuffer
    }

    /// The last rendered frame as 0x00RRGGBB pixels (minifb format).
    pub fn framebuffer_u32(&self) -> Vec<u32> {
        self.display.as_pixel_buffer()
    }

    /// Set a canonical palette entry. The I/O mirror only sees it after the
    /// next reset.
    pub fn set_palette_entry(&mut self, index: usize, rgb332: u8) {
        self.mem.set_palette_entry(index, rgb332);
    }

    /// Save current state as a snapshot (for rewind).
    pub fn save_snapshot(&self) -> snapshot::Snapshot {
        snapshot::Snapshot {
            cpu: self.cpu.clone(),
            cycles: self.cycles,
            running: self.running,
            ram: self.mem.ram.clone(),
            vram: self.mem.vram.clone(),
            io: self.mem.io.clone(),
            palette: self.mem.palette,
            frame: self.frame_count,
        }
    }

    /// Restore state from a snapshot (rewind) and redraw the framebuffer.
    pub fn restore_snapshot(&mut self, snap: &snapshot::Snapshot) {
        self.cpu = snap.cpu.clone();
        self.cycles = snap.cycles;
        self.running = snap.running;
        copy_prefix(&mut self.mem.ram, &snap.ram);
        copy_prefix(&mut self.mem.vram, &snap.vram);
        copy_prefix(&mut self.mem.io, &snap.io);
        self.mem.palette = snap.palette;
        self.frame_count = snap.frame;
        self.frame_cycles = 0;
        self.display.render(&self.mem.vram, &self.mem.palette);
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn copy_prefix(dst: &mut [u8], src: &[u8]) {
    let len = dst.len().min(src.len());
    dst[..len].copy_from_slice(&src[..len]);
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cpu::Reg;

    /// Build a cartridge image around `program` with the given entry point.
    pub(crate) fn make_rom(entry: u16, program: &[u8]) -> Vec<u8> {
        let mut data = b"XVM8".to_vec();
        data.extend_from_slice(&entry.to_le_bytes());
        data.extend_from_slice(&(program.len() as u16).to_le_bytes());
        data.extend_from_slice(program);
        data
    }

    fn boot(program: &[u8]) -> Machine {
        let mut m = Machine::new();
        m.load_rom(&make_rom(ROM_BASE, program)).unwrap();
        m.start();
        m
    }

    #[test]
    fn test_machine_creation() {
        let m = Machine::new();
        assert_eq!(m.cpu.pc(), DEFAULT_ENTRY);
        assert_eq!(m.cpu.sp(), STACK_TOP);
        assert!(!m.running);
        assert_eq!(m.mem.read8(PALETTE_MIRROR + 7), DEFAULT_PALETTE[7]);
    }

    #[test]
    fn test_halt_round_trip() {
        let mut m = boot(&[0xFE]);
        assert!(m.step_frame());
        assert!(!m.running);
        assert_eq!(m.cpu.pc(), 0xE001);
        assert_eq!(m.cycles, 7);
        assert_eq!(m.frame_count(), 1);
    }

    #[test]
    fn test_stopped_machine_does_nothing() {
        let mut m = Machine::new();
        m.load_rom(&make_rom(ROM_BASE, &[0x28, 0xFE])).unwrap();
        assert!(!m.step_frame());
        assert_eq!(m.cpu.pc(), 0xE000);
        assert_eq!(m.frame_count(), 0);
    }

    #[test]
    fn test_frame_budget() {
        // Spin: JMP 0xE000 (3 cycles each)
        let mut m = boot(&[0x40, 0x00, 0xE0]);
        assert!(m.step_frame());
        assert!(m.running);
        // 5556 jumps * 3 = 16668, first multiple of 3 at or past 16667
        assert_eq!(m.cycles, 16_668);
        assert!(m.step_frame());
        assert_eq!(m.cycles, 2 * 16_668);
    }

    #[test]
    fn test_load_failure_leaves_machine_untouched() {
        let mut m = boot(&[0x01, 0x42, 0xFE]);
        m.step_frame();
        let regs = m.dump_regs();
        let rom = m.mem.rom.clone();

        let mut bad = make_rom(ROM_BASE, &[0x00, 0x00]);
        bad[3] = b'9';
        assert!(matches!(m.load_rom(&bad), Err(XvmError::BadMagic(_))));
        assert!(m.load_rom(b"XVM").is_err());
        assert_eq!(m.dump_regs(), regs);
        assert_eq!(m.mem.rom, rom);
        assert_eq!(m.cpu.reg(Reg::A), 0x42);
    }

    #[test]
    fn test_load_keeps_rom_tail() {
        let mut m = Machine::new();
        m.load_rom(&make_rom(ROM_BASE, &[0x11, 0x22, 0x33])).unwrap();
        m.load_rom(&make_rom(0xE001, &[0x44])).unwrap();
        assert_eq!(&m.mem.rom[..3], &[0x44, 0x22, 0x33]);
        assert_eq!(m.cpu.pc(), 0xE001);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut m = boot(&[0x01, 0x55, 0x09, 0x00, 0x10, 0xFE]);
        m.step_frame();
        assert_eq!(m.mem.read8(0x1000), 0x55);
        m.reset(0xE002);
        assert_eq!(m.mem.read8(0x1000), 0);
        assert_eq!(m.cpu.reg(Reg::A), 0);
        assert_eq!(m.cpu.flags(), 0);
        assert_eq!(m.cpu.pc(), 0xE002);
        assert_eq!(m.cycles, 0);
        assert_eq!(m.mem.rom[0], 0x01);
    }

    #[test]
    fn test_interrupt_missed_off_cadence() {
        // EI; loop: NOP (1), JMP 0xE001 (3)
        // Frame cycles run 1, 2, 5, 6, 9, ... and never land on a multiple of 1000
        let mut m = boot(&[0xF0, 0x00, 0x40, 0x01, 0xE0]);
        m.mem.rom[(IRQ_VECTOR - ROM_BASE) as usize] = 0xFE;
        m.request_timer_interrupt();
        assert!(m.step_frame());
        assert!(m.running);
        assert_eq!(m.mem.read8(IRQ_STATUS) & IRQ_TIMER_BIT, IRQ_TIMER_BIT);
        assert!(m.cpu.pc() < IRQ_VECTOR);
    }

    #[test]
    fn test_interrupt_on_cadence() {
        // EI; JMP 0xE001 forever
        let mut m = boot(&[0xF0, 0x40, 0x01, 0xE0]);
        m.mem.rom[(IRQ_VECTOR - ROM_BASE) as usize] = 0xFE;
        m.request_timer_interrupt();
        m.step_frame();
        assert!(!m.running);
        // 1 + 3 * 333 = 1000, then HALT in the handler
        assert_eq!(m.cycles, 1000 + 7);
    }

    #[test]
    fn test_palette_mirror_direction() {
        let mut m = Machine::new();
        m.mem.write8(0xC023, 0x1C);
        assert_eq!(m.mem.palette[3], 0x1C);
        m.reset(DEFAULT_ENTRY);
        assert_eq!(m.mem.read8(0xC023), 0x1C);

        m.set_palette_entry(5, 0xAA);
        assert_eq!(m.mem.read8(0xC025), DEFAULT_PALETTE[5]);
        m.reset(DEFAULT_ENTRY);
        assert_eq!(m.mem.read8(0xC025), 0xAA);
    }

    #[test]
    fn test_input_read_by_in() {
        // IN A, [0xC010]; HALT
        let mut m = boot(&[0x70, 0x10, 0xC0, 0xFE]);
        m.set_button(Button::Left, true);
        m.set_button(Button::A, true);
        m.set_button(Button::Left, false);
        m.step_frame();
        assert_eq!(m.cpu.reg(Reg::A), Button::A.mask());
    }

    #[test]
    fn test_render_from_vram() {
        // LD A, 3; ST 0x8000, A; HALT
        let mut m = boot(&[0x01, 0x03, 0x09, 0x00, 0x80, 0xFE]);
        m.step_frame();
        let fb = m.framebuffer_rgba();
        // palette[3] = 0x1F: R=0, G=7*36, B=3*85
        assert_eq!(&fb[..4], &[0, 252, 255, 255]);
        assert_eq!(m.framebuffer_u32()[0], 0x00FCFF);
    }

    #[test]
    fn test_breakpoint_stops_before_execution() {
        // NOP; NOP; HALT
        let mut m = boot(&[0x00, 0x00, 0xFE]);
        m.breakpoints.push(0xE001);
        assert!(!m.step_frame());
        assert!(m.breakpoint_hit);
        assert_eq!(m.cpu.pc(), 0xE001);
        assert_eq!(m.frame_count(), 0);

        assert_eq!(m.step_one(), "0xE001: NOP");
        m.breakpoints.clear();
        assert!(m.step_frame());
        assert!(!m.breakpoint_hit);
        assert!(!m.running);
        assert_eq!(m.cycles, 1 + 1 + 7);
    }

    #[test]
    fn test_disasm_and_dump() {
        let m = boot(&[0x23, 0x10]);
        assert_eq!(m.disasm_at_pc(), "0xE000: ADD A, 0x10");
        let dump = m.dump_regs();
        assert!(dump.contains("PC=E000"));
        assert!(dump.contains("SP=7FFF"));
    }

    #[test]
    fn test_snapshot_restore() {
        // INC A; JMP 0xE000
        let mut m = boot(&[0x28, 0x40, 0x00, 0xE0]);
        m.step_frame();
        let snap = m.save_snapshot();
        let a = m.cpu.reg(Reg::A);
        m.step_frame();
        assert_ne!(m.cycles, snap.cycles);
        m.restore_snapshot(&snap);
        assert_eq!(m.cpu.reg(Reg::A), a);
        assert_eq!(m.cycles, snap.cycles);
        assert_eq!(m.frame_count(), 1);
    }
}
