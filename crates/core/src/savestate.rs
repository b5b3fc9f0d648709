//! Save state (quick save / quick load) for the XVM-8 emulator.
//!
//! Captures the full machine state to a file using bincode serialization
//! with deflate compression. Users can save/load at any point with a single
//! key press (F5 save, F9 load).
//!
//! ## File format
//!
//! ```text
//! +------------------+
//! | Magic "XVMS"     |  4 bytes
//! +------------------+
//! | Format version   |  u32 little-endian (currently 1)
//! +------------------+
//! | Compressed data  |  deflate-compressed bincode payload
//! +------------------+
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cpu::Cpu;
use crate::{copy_prefix, Machine, Result, XvmError, PALETTE_SIZE};

/// Magic bytes identifying an XVM-8 save state file.
const MAGIC: &[u8; 4] = b"XVMS";
/// Current save state format version.
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveState {
    pub cpu: Cpu,
    pub cycles: u64,
    pub frame_count: u32,
    pub running: bool,

    pub ram: Vec<u8>,
    pub vram: Vec<u8>,
    pub io: Vec<u8>,
    pub palette: [u8; PALETTE_SIZE],
    pub rom: Vec<u8>,
}

impl Machine {
    /// Capture everything needed to resume later, ROM included.
    pub fn to_save_state(&self) -> SaveState {
        SaveState {
            cpu: self.cpu.clone(),
            cycles: self.cycles,
            frame_count: self.frame_count(),
            running: self.running,
            ram: self.mem.ram.clone(),
            vram: self.mem.vram.clone(),
            io: self.mem.io.clone(),
            palette: self.mem.palette,
            rom: self.mem.rom.clone(),
        }
    }

    /// Replace the machine state with a loaded one and redraw the framebuffer.
    pub fn apply_save_state(&mut self, state: &SaveState) {
        let snap = crate::snapshot::Snapshot {
            cpu: state.cpu.clone(),
            cycles: state.cycles,
            running: state.running,
            ram: state.ram.clone(),
            vram: state.vram.clone(),
            io: state.io.clone(),
            palette: state.palette,
            frame: state.frame_count,
        };
        copy_prefix(&mut self.mem.rom, &state.rom);
        self.restore_snapshot(&snap);
    }
}

// ─── Encoding ───────────────────────────────────────────────────────────────

/// Serialize and compress a save state, header included.
pub fn encode(state: &SaveState) -> Result<Vec<u8>> {
    let payload = bincode::serialize(state)?;
    let compressed = miniz_oxide::deflate::compress_to_vec(&payload, 6);

    let mut out = Vec::with_capacity(HEADER_LEN + compressed.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Verify the header and decode a save state.
pub fn decode(data: &[u8]) -> Result<SaveState> {
    if data.len() < HEADER_LEN {
        return Err(XvmError::SaveState("file too small".into()));
    }
    if &data[0..4] != MAGIC {
        return Err(XvmError::SaveState("bad magic".into()));
    }
    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if version != FORMAT_VERSION {
        return Err(XvmError::SaveState(format!(
            "unsupported version {} (expected {})",
            version, FORMAT_VERSION
        )));
    }
    let payload = miniz_oxide::inflate::decompress_to_vec(&data[HEADER_LEN..])
        .map_err(|e| XvmError::SaveState(format!("decompress error: {:?}", e)))?;
    Ok(bincode::deserialize(&payload)?)
}

// ─── File I/O ───────────────────────────────────────────────────────────────

pub fn save_to_file(state: &SaveState, path: &Path) -> Result<()> {
    std::fs::write(path, encode(state)?)?;
    Ok(())
}

pub fn load_from_file(path: &Path) -> Result<SaveState> {
    decode(&std::fs::read(path)?)
}

/// Derive save state file path from the ROM path.
/// `game.xvm` → `game.state`
pub fn state_path(rom_path: &Path) -> PathBuf {
    rom_path.with_extension("state")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::Reg;
    use crate::tests::make_rom;
    use crate::ROM_BASE;

    fn running_machine() -> Machine {
        // LD A, 7; ST 0x8001, A; INC B; JMP 0xE005
        let mut m = Machine::new();
        m.load_rom(&make_rom(ROM_BASE, &[0x01, 0x07, 0x09, 0x01, 0x80, 0x2A, 0x40, 0x05, 0xE0]))
            .unwrap();
        m.start();
        m.step_frame();
        m
    }

    #[test]
    fn test_encode_decode() {
        let m = running_machine();
        let state = m.to_save_state();
        let bytes = encode(&state).unwrap();
        assert_eq!(&bytes[..4], b"XVMS");
        assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
        assert_eq!(decode(&bytes).unwrap(), state);
    }

    #[test]
    fn test_apply_restores_machine() {
        let m = running_machine();
        let state = m.to_save_state();

        let mut other = Machine::new();
        other.apply_save_state(&state);
        assert_eq!(other.cpu, m.cpu);
        assert_eq!(other.cpu.reg(Reg::A), 7);
        assert_eq!(other.mem.vram[1], 7);
        assert_eq!(other.mem.rom, m.mem.rom);
        assert_eq!(other.frame_count(), 1);
        assert!(other.running);
        assert_eq!(other.framebuffer_rgba(), m.framebuffer_rgba());
    }

    #[test]
    fn test_decode_rejects_bad_header() {
        let state = Machine::new().to_save_state();
        let mut bytes = encode(&state).unwrap();

        assert!(matches!(decode(&bytes[..5]), Err(XvmError::SaveState(_))));

        bytes[4] = 2;
        assert!(matches!(decode(&bytes), Err(XvmError::SaveState(ref s)) if s.contains("version")));

        bytes[0] = b'A';
        assert!(matches!(decode(&bytes), Err(XvmError::SaveState(ref s)) if s == "bad magic"));
    }

    #[test]
    fn test_state_path() {
        assert_eq!(state_path(Path::new("roms/game.xvm")), PathBuf::from("roms/game.state"));
        assert_eq!(state_path(Path::new("game")), PathBuf::from("game.state"));
    }
}
