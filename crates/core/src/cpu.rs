//! XVM-8 CPU core.
//!
//! [`Cpu`] is the register file: four 8-bit general registers, the 16-bit
//! program counter and stack pointer, and the flags byte. Instruction
//! execution runs on [`Machine`] so every load and store goes through the
//! address-space router.
//!
//! Only Zero and Negative are shared between opcodes (via
//! [`Cpu::update_zn`]); Carry is set per opcode and Overflow is never
//! touched by the current instruction set.

use crate::opcodes::{Cond, Instruction};
use crate::{Machine, FLAG_C, FLAG_I, FLAG_N, FLAG_Z, STACK_TOP};
use serde::{Deserialize, Serialize};

/// General-purpose register name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reg {
    A,
    B,
    C,
    D,
}

/// XVM-8 register file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cpu {
    a: u8,
    b: u8,
    c: u8,
    d: u8,
    pc: u16,
    sp: u16,
    f: u8,
}

impl Cpu {
    pub fn new() -> Self {
        Cpu { a: 0, b: 0, c: 0, d: 0, pc: 0, sp: STACK_TOP, f: 0 }
    }

    /// Zero all registers and flags, set SP to the top of RAM and PC to `entry`.
    pub fn reset(&mut self, entry: u16) {
        *self = Cpu { pc: entry, ..Cpu::new() };
    }

    #[inline(always)]
    pub fn reg(&self, r: Reg) -> u8 {
        match r {
            Reg::A => self.a,
            Reg::B => self.b,
            Reg::C => self.c,
            Reg::D => self.d,
        }
    }

    #[inline(always)]
    pub fn set_reg(&mut self, r: Reg, v: u8) {
        match r {
            Reg::A => self.a = v,
            Reg::B => self.b = v,
            Reg::C => self.c = v,
            Reg::D => self.d = v,
        }
    }

    #[inline(always)]
    pub fn pc(&self) -> u16 { self.pc }

    #[inline(always)]
    pub fn set_pc(&mut self, v: u16) { self.pc = v; }

    #[inline(always)]
    pub fn sp(&self) -> u16 { self.sp }

    #[inline(always)]
    pub fn set_sp(&mut self, v: u16) { self.sp = v; }

    #[inline(always)]
    pub fn flags(&self) -> u8 { self.f }

    #[inline(always)]
    pub fn set_flags(&mut self, v: u8) { self.f = v; }

    #[inline(always)]
    pub fn flag(&self, bit: u8) -> bool {
        self.f & (1 << bit) != 0
    }

    #[inline(always)]
    pub fn set_flag(&mut self, bit: u8, v: bool) {
        if v { self.f |= 1 << bit; } else { self.f &= !(1 << bit); }
    }

    /// Set Z from `value == 0` and N from bit 7. C and V are left alone.
    #[inline(always)]
    pub fn update_zn(&mut self, value: u8) {
        self.set_flag(FLAG_Z, value == 0);
        self.set_flag(FLAG_N, value & 0x80 != 0);
    }

    /// B:C as a 16-bit pair (B high)
    #[inline(always)]
    pub fn bc(&self) -> u16 {
        (self.b as u16) << 8 | self.c as u16
    }

    #[inline(always)]
    pub fn set_bc(&mut self, v: u16) {
        self.b = (v >> 8) as u8;
        self.c = v as u8;
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

// --- ALU helpers ---

/// A + v with carry out of bit 7.
fn alu_add(cpu: &mut Cpu, v: u8) {
    let a = cpu.reg(Reg::A);
    let (res, carry) = a.overflowing_add(v);
    cpu.set_flag(FLAG_C, carry);
    cpu.set_reg(Reg::A, res);
    cpu.update_zn(res);
}

/// A - v; carry means borrow.
fn alu_sub(cpu: &mut Cpu, v: u8) {
    let a = cpu.reg(Reg::A);
    let (res, borrow) = a.overflowing_sub(v);
    cpu.set_flag(FLAG_C, borrow);
    cpu.set_reg(Reg::A, res);
    cpu.update_zn(res);
}

/// Flags of A - v without writing A.
fn alu_cmp(cpu: &mut Cpu, v: u8) {
    let a = cpu.reg(Reg::A);
    let (res, borrow) = a.overflowing_sub(v);
    cpu.update_zn(res);
    cpu.set_flag(FLAG_C, borrow);
}

/// Write a result into A and refresh Z/N.
fn set_a(cpu: &mut Cpu, v: u8) {
    cpu.set_reg(Reg::A, v);
    cpu.update_zn(v);
}

impl Cond {
    fn holds(self, cpu: &Cpu) -> bool {
        match self {
            Cond::Z => cpu.flag(FLAG_Z),
            Cond::Nz => !cpu.flag(FLAG_Z),
            Cond::C => cpu.flag(FLAG_C),
            Cond::Nc => !cpu.flag(FLAG_C),
            Cond::N => cpu.flag(FLAG_N),
            Cond::Nn => !cpu.flag(FLAG_N),
        }
    }
}

// ---- Instruction execution on Machine ----

impl Machine {
    /// Execute a single decoded instruction.
    ///
    /// PC is first advanced past the opcode and its `size - 1` operand bytes,
    /// so CALL pushes the address of the following instruction.
    pub fn execute_inst(&mut self, inst: Instruction, size: u8) {
        self.cpu.set_pc(self.cpu.pc().wrapping_add(size as u16));

        match inst {
            Instruction::Nop => {}

            // -- Data transfer --
            Instruction::LdImm { r, k } => {
                self.cpu.set_reg(r, k);
                self.cpu.update_zn(k);
            }
            Instruction::LdAbs { r, addr } => {
                let v = self.mem.read8(addr);
                self.cpu.set_reg(r, v);
                self.cpu.update_zn(v);
            }
            Instruction::St { r, addr } => {
                self.mem.write8(addr, self.cpu.reg(r));
            }
            Instruction::Mov { d, s } => {
                let v = self.cpu.reg(s);
                self.cpu.set_reg(d, v);
                self.cpu.update_zn(v);
            }

            // -- Arithmetic --
            Instruction::AddReg { r } => { let v = self.cpu.reg(r); alu_add(&mut self.cpu, v); }
            Instruction::AddImm { k } => alu_add(&mut self.cpu, k),
            Instruction::SubReg { r } => { let v = self.cpu.reg(r); alu_sub(&mut self.cpu, v); }
            Instruction::SubImm { k } => alu_sub(&mut self.cpu, k),
            Instruction::Inc { r } => {
                let v = self.cpu.reg(r).wrapping_add(1);
                self.cpu.set_reg(r, v);
                self.cpu.update_zn(v);
            }
            Instruction::Dec { r } => {
                let v = self.cpu.reg(r).wrapping_sub(1);
                self.cpu.set_reg(r, v);
                self.cpu.update_zn(v);
            }

            // -- Logic --
            Instruction::And => { let v = self.cpu.reg(Reg::A) & self.cpu.reg(Reg::B); set_a(&mut self.cpu, v); }
            Instruction::Or => { let v = self.cpu.reg(Reg::A) | self.cpu.reg(Reg::B); set_a(&mut self.cpu, v); }
            Instruction::Xor => { let v = self.cpu.reg(Reg::A) ^ self.cpu.reg(Reg::B); set_a(&mut self.cpu, v); }
            Instruction::Not => { let v = !self.cpu.reg(Reg::A); set_a(&mut self.cpu, v); }

            // -- Shift / rotate --
            Instruction::Shl => {
                let a = self.cpu.reg(Reg::A);
                self.cpu.set_flag(FLAG_C, a & 0x80 != 0);
                set_a(&mut self.cpu, a << 1);
            }
            Instruction::Shr => {
                let a = self.cpu.reg(Reg::A);
                self.cpu.set_flag(FLAG_C, a & 0x01 != 0);
                set_a(&mut self.cpu, a >> 1);
            }
            Instruction::Rol => {
                let a = self.cpu.reg(Reg::A);
                let c = self.cpu.flag(FLAG_C) as u8;
                self.cpu.set_flag(FLAG_C, a & 0x80 != 0);
                set_a(&mut self.cpu, (a << 1) | c);
            }
            Instruction::Ror => {
                let a = self.cpu.reg(Reg::A);
                let c = self.cpu.flag(FLAG_C) as u8;
                self.cpu.set_flag(FLAG_C, a & 0x01 != 0);
                set_a(&mut self.cpu, (a >> 1) | (c << 7));
            }

            // -- Compare --
            Instruction::CmpB => { let v = self.cpu.reg(Reg::B); alu_cmp(&mut self.cpu, v); }
            Instruction::CmpImm { k } => alu_cmp(&mut self.cpu, k),

            // -- Control flow --
            Instruction::Jmp { addr } => self.cpu.set_pc(addr),
            Instruction::Jcc { cond, addr } => {
                if cond.holds(&self.cpu) {
                    self.cpu.set_pc(addr);
                }
            }
            Instruction::Call { addr } => {
                self.push16(self.cpu.pc());
                self.cpu.set_pc(addr);
            }
            Instruction::Ret => {
                let pc = self.pop16();
                self.cpu.set_pc(pc);
            }
            Instruction::Reti => {
                let f = self.pop8();
                self.cpu.set_flags(f);
                let pc = self.pop16();
                self.cpu.set_pc(pc);
            }

            // -- Stack --
            Instruction::Push { r } => self.push8(self.cpu.reg(r)),
            Instruction::Pop { r } => {
                let v = self.pop8();
                self.cpu.set_reg(r, v);
            }

            // -- I/O --
            Instruction::In { addr } => {
                let v = self.mem.read8(addr);
                self.cpu.set_reg(Reg::A, v);
            }
            Instruction::Out { addr } => self.mem.write8(addr, self.cpu.reg(Reg::A)),

            // -- 16-bit pairs --
            Instruction::LdBc { k } => self.cpu.set_bc(k),
            Instruction::LdDc { k } => {
                // Low byte lands in C, shared with the B:C pair
                self.cpu.set_reg(Reg::D, (k >> 8) as u8);
                self.cpu.set_reg(Reg::C, k as u8);
            }
            Instruction::IncBc => { let v = self.cpu.bc().wrapping_add(1); self.cpu.set_bc(v); }
            Instruction::DecBc => { let v = self.cpu.bc().wrapping_sub(1); self.cpu.set_bc(v); }

            // -- System --
            Instruction::Ei => self.cpu.set_flag(FLAG_I, true),
            Instruction::Di => self.cpu.set_flag(FLAG_I, false),
            Instruction::Halt => self.running = false,
            Instruction::Break => {
                self.break_count += 1;
                log::info!(
                    "BREAK at PC=0x{:04X}: {}",
                    self.cpu.pc().wrapping_sub(1),
                    self.dump_regs().replace('\n', " ")
                );
            }
            Instruction::Unknown(op) => {
                if self.debug {
                    log::debug!(
                        "unknown opcode 0x{:02X} at pc=0x{:04X}",
                        op,
                        self.cpu.pc().wrapping_sub(1)
                    );
                }
            }
        }
    }

    /// Push a byte: write at SP, then decrement. SP wraps without checks.
    pub(crate) fn push8(&mut self, v: u8) {
        self.mem.write8(self.cpu.sp(), v);
        self.cpu.set_sp(self.cpu.sp().wrapping_sub(1));
    }

    /// Pop a byte: increment SP, then read.
    pub(crate) fn pop8(&mut self) -> u8 {
        self.cpu.set_sp(self.cpu.sp().wrapping_add(1));
        self.mem.read8(self.cpu.sp())
    }

    /// Push a 16-bit word, high byte first (low byte ends up at the lower address).
    pub(crate) fn push16(&mut self, v: u16) {
        self.push8((v >> 8) as u8);
        self.push8(v as u8);
    }

    pub(crate) fn pop16(&mut self) -> u16 {
        let lo = self.pop8();
        let hi = self.pop8();
        (hi as u16) << 8 | lo as u16
    }
}
