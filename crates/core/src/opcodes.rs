//! XVM-8 instruction decoder.
//!
//! Decodes an opcode byte and up to two following operand bytes into a typed
//! [`Instruction`]. Dispatch is a single `match` on the opcode, and the cost
//! of every opcode lives in the parallel [`CYCLE_TABLE`].

use crate::cpu::Reg;

/// Decoded XVM-8 instruction with operands.
///
/// `r` names a general register, `k` an immediate, `addr` an absolute
/// 16-bit address read little-endian from the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Nop,
    // Data transfer
    LdImm { r: Reg, k: u8 },
    LdAbs { r: Reg, addr: u16 },
    St { r: Reg, addr: u16 },
    Mov { d: Reg, s: Reg },
    // Arithmetic (A is the implicit destination)
    AddReg { r: Reg },
    AddImm { k: u8 },
    SubReg { r: Reg },
    SubImm { k: u8 },
    Inc { r: Reg },
    Dec { r: Reg },
    // Logic / shift on A
    And,
    Or,
    Xor,
    Not,
    Shl,
    Shr,
    Rol,
    Ror,
    CmpB,
    CmpImm { k: u8 },
    // Control flow
    Jmp { addr: u16 },
    Jcc { cond: Cond, addr: u16 },
    Call { addr: u16 },
    Ret,
    Reti,
    // Stack
    Push { r: Reg },
    Pop { r: Reg },
    // I/O
    In { addr: u16 },
    Out { addr: u16 },
    // 16-bit pairs
    LdBc { k: u16 },
    LdDc { k: u16 },
    IncBc,
    DecBc,
    // System
    Ei,
    Di,
    Halt,
    Break,
    Unknown(u8),
}

/// Branch condition for the conditional jump family (0x41–0x46).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Z,
    Nz,
    C,
    Nc,
    N,
    Nn,
}

const REGS: [Reg; 4] = [Reg::A, Reg::B, Reg::C, Reg::D];

/// (destination, source) for MOV opcodes 0x10–0x15.
const MOV_PAIRS: [(Reg, Reg); 6] = [
    (Reg::A, Reg::B),
    (Reg::A, Reg::C),
    (Reg::A, Reg::D),
    (Reg::B, Reg::A),
    (Reg::C, Reg::A),
    (Reg::D, Reg::A),
];

/// Cycle cost per opcode. Undefined opcodes cost 1.
pub const CYCLE_TABLE: [u8; 256] = build_cycle_table();

const fn build_cycle_table() -> [u8; 256] {
    let mut t = [1u8; 256];
    let mut i = 0x01;
    while i <= 0x04 { t[i] = 2; i += 1; }
    while i <= 0x0C { t[i] = 4; i += 1; }
    t[0x23] = 2;
    t[0x27] = 2;
    t[0x39] = 2;
    i = 0x40;
    while i <= 0x48 { t[i] = 3; i += 1; }
    t[0x50] = 5;
    t[0x51] = 4;
    t[0x52] = 4;
    i = 0x60;
    while i <= 0x6F { t[i] = 3; i += 1; }
    t[0x70] = 4;
    t[0x71] = 4;
    t[0x80] = 3;
    t[0x81] = 3;
    t[0x82] = 2;
    t[0x83] = 2;
    t[0xFE] = 7;
    t
}

/// Decode an instruction from its opcode and the two bytes after it.
///
/// Returns `(instruction, size)` where `size` counts the opcode byte plus
/// consumed operand bytes (1, 2 or 3). Unknown opcodes consume no operands.
pub fn decode(op: u8, b1: u8, b2: u8) -> (Instruction, u8) {
    let addr = b1 as u16 | ((b2 as u16) << 8);
    match op {
        0x00 => (Instruction::Nop, 1),
        0x01..=0x04 => (Instruction::LdImm { r: REGS[(op - 0x01) as usize], k: b1 }, 2),
        0x05..=0x08 => (Instruction::LdAbs { r: REGS[(op - 0x05) as usize], addr }, 3),
        0x09..=0x0C => (Instruction::St { r: REGS[(op - 0x09) as usize], addr }, 3),
        0x10..=0x15 => {
            let (d, s) = MOV_PAIRS[(op - 0x10) as usize];
            (Instruction::Mov { d, s }, 1)
        }
        0x20..=0x22 => (Instruction::AddReg { r: REGS[(op - 0x1F) as usize] }, 1),
        0x23 => (Instruction::AddImm { k: b1 }, 2),
        0x24..=0x26 => (Instruction::SubReg { r: REGS[(op - 0x23) as usize] }, 1),
        0x27 => (Instruction::SubImm { k: b1 }, 2),
        0x28..=0x2F => {
            let r = REGS[((op - 0x28) >> 1) as usize];
            if op & 1 == 0 { (Instruction::Inc { r }, 1) } else { (Instruction::Dec { r }, 1) }
        }
        0x30 => (Instruction::And, 1),
        0x31 => (Instruction::Or, 1),
        0x32 => (Instruction::Xor, 1),
        0x33 => (Instruction::Not, 1),
        0x34 => (Instruction::Shl, 1),
        0x35 => (Instruction::Shr, 1),
        0x36 => (Instruction::Rol, 1),
        0x37 => (Instruction::Ror, 1),
        0x38 => (Instruction::CmpB, 1),
        0x39 => (Instruction::CmpImm { k: b1 }, 2),
        0x40 => (Instruction::Jmp { addr }, 3),
        0x41..=0x46 => {
            let cond = match op {
                0x41 => Cond::Z,
                0x42 => Cond::Nz,
                0x43 => Cond::C,
                0x44 => Cond::Nc,
                0x45 => Cond::N,
                _ => Cond::Nn,
            };
            (Instruction::Jcc { cond, addr }, 3)
        }
        0x50 => (Instruction::Call { addr }, 3),
        0x51 => (Instruction::Ret, 1),
        0x52 => (Instruction::Reti, 1),
        0x60..=0x63 => (Instruction::Push { r: REGS[(op - 0x60) as usize] }, 1),
        0x64..=0x67 => (Instruction::Pop { r: REGS[(op - 0x64) as usize] }, 1),
        0x70 => (Instruction::In { addr }, 3),
        0x71 => (Instruction::Out { addr }, 3),
        0x80 => (Instruction::LdBc { k: addr }, 3),
        0x81 => (Instruction::LdDc { k: addr }, 3),
        0x82 => (Instruction::IncBc, 1),
        0x83 => (Instruction::DecBc, 1),
        0xF0 => (Instruction::Ei, 1),
        0xF1 => (Instruction::Di, 1),
        0xFE => (Instruction::Halt, 1),
        0xFF => (Instruction::Break, 1),
        _ => (Instruction::Unknown(op), 1),
    }
}
