//! XVM-8 instruction disassembler.
//!
//! Converts decoded [`Instruction`] values back to assembly text.
//! Used by the debugger for breakpoint, step, and register-dump views.

use crate::cpu::Reg;
use crate::opcodes::{Cond, Instruction};

fn reg_name(r: Reg) -> &'static str {
    match r {
        Reg::A => "A",
        Reg::B => "B",
        Reg::C => "C",
        Reg::D => "D",
    }
}

/// Format a decoded instruction as an assembly string (e.g. `ADD A, B`).
pub fn disassemble(inst: Instruction) -> String {
    match inst {
        Instruction::Nop => "NOP".into(),
        Instruction::LdImm { r, k }    => format!("LD {}, 0x{:02X}", reg_name(r), k),
        Instruction::LdAbs { r, addr } => format!("LD {}, [0x{:04X}]", reg_name(r), addr),
        Instruction::St { r, addr }    => format!("ST 0x{:04X}, {}", addr, reg_name(r)),
        Instruction::Mov { d, s }      => format!("MOV {}, {}", reg_name(d), reg_name(s)),
        Instruction::AddReg { r }      => format!("ADD A, {}", reg_name(r)),
        Instruction::AddImm { k }      => format!("ADD A, 0x{:02X}", k),
        Instruction::SubReg { r }      => format!("SUB A, {}", reg_name(r)),
        Instruction::SubImm { k }      => format!("SUB A, 0x{:02X}", k),
        Instruction::Inc { r }         => format!("INC {}", reg_name(r)),
        Instruction::Dec { r }         => format!("DEC {}", reg_name(r)),
        Instruction::And => "AND A, B".into(),
        Instruction::Or  => "OR A, B".into(),
        Instruction::Xor => "XOR A, B".into(),
        Instruction::Not => "NOT A".into(),
        Instruction::Shl => "SHL A".into(),
        Instruction::Shr => "SHR A".into(),
        Instruction::Rol => "ROL A".into(),
        Instruction::Ror => "ROR A".into(),
        Instruction::CmpB => "CMP A, B".into(),
        Instruction::CmpImm { k } => format!("CMP A, 0x{:02X}", k),
        Instruction::Jmp { addr } => format!("JMP 0x{:04X}", addr),
        Instruction::Jcc { cond, addr } => {
            let name = match cond {
                Cond::Z => "JZ",
                Cond::Nz => "JNZ",
                Cond::C => "JC",
                Cond::Nc => "JNC",
                Cond::N => "JN",
                Cond::Nn => "JNN",
            };
            format!("{} 0x{:04X}", name, addr)
        }
        Instruction::Call { addr } => format!("CALL 0x{:04X}", addr),
        Instruction::Ret  => "RET".into(),
        Instruction::Reti => "RETI".into(),
        Instruction::Push { r } => format!("PUSH {}", reg_name(r)),
        Instruction::Pop { r }  => format!("POP {}", reg_name(r)),
        Instruction::In { addr }  => format!("IN A, [0x{:04X}]", addr),
        Instruction::Out { addr } => format!("OUT [0x{:04X}], A", addr),
        Instruction::LdBc { k } => format!("LD BC, 0x{:04X}", k),
        Instruction::LdDc { k } => format!("LD DC, 0x{:04X}", k),
        Instruction::IncBc => "INC BC".into(),
        Instruction::DecBc => "DEC BC".into(),
        Instruction::Ei => "EI".into(),
        Instruction::Di => "DI".into(),
        Instruction::Halt => "HALT".into(),
        Instruction::Break => "BREAK".into(),
        Instruction::Unknown(op) => format!("DB 0x{:02X}", op),
    }
}

/// Format the flags byte as `I---VNCZ`, with `-` for clear bits.
pub fn format_flags(f: u8) -> String {
    const NAMES: [char; 8] = ['Z', 'C', 'N', 'V', '4', '5', '6', 'I'];
    (0..8)
        .rev()
        .map(|bit| {
            if f & (1 << bit) == 0 {
                '-'
            } else {
                NAMES[bit]
            }
        })
        .collect()
}
