//! XVM-8 address space.
//!
//! The 16-bit address space is routed to four fixed regions:
//!
//! | Address Range | Content                                   |
//! |---------------|-------------------------------------------|
//! | 0x0000–0x7FFF | Working RAM (32 KB)                       |
//! | 0x8000–0xBFFF | Video RAM, 128×128 color indices (16 KB)  |
//! | 0xC000–0xC0FF | I/O registers, palette mirror at 0xC020   |
//! | 0xC100–0xDFFF | Unmapped (reads 0, writes dropped)        |
//! | 0xE000–0xFFFF | Program ROM (8 KB, read-only to the CPU)  |
//!
//! The palette has a canonical copy outside the address space. Writes into
//! the mirror window update the canonical entry; the canonical palette is
//! copied back into the mirror only by [`Memory::reset`].

use crate::{
    DEFAULT_PALETTE, IO_BASE, IO_SIZE, PALETTE_MIRROR, PALETTE_SIZE, RAM_SIZE, ROM_BASE,
    ROM_SIZE, VRAM_BASE, VRAM_SIZE,
};

const PALETTE_END: u16 = PALETTE_MIRROR + PALETTE_SIZE as u16;

/// Memory regions and the canonical palette of one XVM-8 machine.
pub struct Memory {
    /// Working RAM (0x0000–0x7FFF), also holds the stack
    pub ram: Vec<u8>,
    /// Video RAM (0x8000–0xBFFF), one byte per pixel, low nibble significant
    pub vram: Vec<u8>,
    /// I/O page (0xC000–0xC0FF)
    pub io: Vec<u8>,
    /// Program ROM (0xE000–0xFFFF)
    pub rom: Vec<u8>,
    /// Canonical RGB332 palette
    pub palette: [u8; PALETTE_SIZE],
}

impl Memory {
    pub fn new() -> Self {
        let mut mem = Memory {
            ram: vec![0u8; RAM_SIZE],
            vram: vec![0u8; VRAM_SIZE],
            io: vec![0u8; IO_SIZE],
            rom: vec![0u8; ROM_SIZE],
            palette: DEFAULT_PALETTE,
        };
        mem.reset();
        mem
    }

    /// Clear RAM, VRAM and I/O, then copy the canonical palette into the mirror.
    ///
    /// ROM and the canonical palette are preserved.
    pub fn reset(&mut self) {
        self.ram.fill(0);
        self.vram.fill(0);
        self.io.fill(0);
        let off = (PALETTE_MIRROR - IO_BASE) as usize;
        self.io[off..off + PALETTE_SIZE].copy_from_slice(&self.palette);
    }

    // --- Bus access ---

    pub fn read8(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF => self.ram[addr as usize],
            VRAM_BASE..=0xBFFF => self.vram[(addr - VRAM_BASE) as usize],
            IO_BASE..=0xC0FF => self.io[(addr - IO_BASE) as usize],
            ROM_BASE..=0xFFFF => self.rom[(addr - ROM_BASE) as usize],
            _ => 0,
        }
    }

    pub fn write8(&mut self, addr: u16, value: u8) {
        match addr {
            0x0000..=0x7FFF => self.ram[addr as usize] = value,
            VRAM_BASE..=0xBFFF => self.vram[(addr - VRAM_BASE) as usize] = value,
            IO_BASE..=0xC0FF => {
                self.io[(addr - IO_BASE) as usize] = value;
                if (PALETTE_MIRROR..PALETTE_END).contains(&addr) {
                    self.palette[(addr - PALETTE_MIRROR) as usize] = value;
                }
            }
            // Gap and ROM ignore writes
            _ => {}
        }
    }

    /// Little-endian 16-bit read; the high byte address wraps at 0xFFFF.
    #[inline(always)]
    pub fn read16(&self, addr: u16) -> u16 {
        self.read8(addr) as u16 | ((self.read8(addr.wrapping_add(1)) as u16) << 8)
    }

    #[inline(always)]
    pub fn write16(&mut self, addr: u16, value: u16) {
        self.write8(addr, value as u8);
        self.write8(addr.wrapping_add(1), (value >> 8) as u8);
    }

    // --- Host-side access ---

    /// Set a canonical palette entry without touching the I/O mirror.
    ///
    /// The change shows up at 0xC020+index only after the next reset.
    pub fn set_palette_entry(&mut self, index: usize, rgb332: u8) {
        if let Some(slot) = self.palette.get_mut(index) {
            *slot = rgb332;
        }
    }

    /// Copy program bytes into ROM starting at offset 0.
    ///
    /// Bytes past `program.len()` keep their previous contents.
    pub(crate) fn load_rom(&mut self, program: &[u8]) {
        self.rom[..program.len()].copy_from_slice(program);
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_routing() {
        let mut mem = Memory::new();
        mem.write8(0x1234, 0x11);
        mem.write8(0x8000, 0x22);
        mem.write8(0xC005, 0x33);
        assert_eq!(mem.ram[0x1234], 0x11);
        assert_eq!(mem.vram[0], 0x22);
        assert_eq!(mem.io[5], 0x33);
        assert_eq!(mem.read8(0xBFFF), 0);
    }

    #[test]
    fn test_gap_and_rom_ignore_writes() {
        let mut mem = Memory::new();
        mem.rom[0] = 0xAB;
        mem.write8(0xE000, 0x00);
        assert_eq!(mem.read8(0xE000), 0xAB);
        mem.write8(0xC100, 0x55);
        mem.write8(0xDFFF, 0x55);
        assert_eq!(mem.read8(0xC100), 0);
        assert_eq!(mem.read8(0xDFFF), 0);
    }

    #[test]
    fn test_read16_little_endian_wraps() {
        let mut mem = Memory::new();
        mem.write16(0x0100, 0xBEEF);
        assert_eq!(mem.ram[0x100], 0xEF);
        assert_eq!(mem.ram[0x101], 0xBE);
        assert_eq!(mem.read16(0x0100), 0xBEEF);
        // 0xFFFF is ROM, 0x0000 is RAM
        mem.rom[ROM_SIZE - 1] = 0x34;
        mem.ram[0] = 0x12;
        assert_eq!(mem.read16(0xFFFF), 0x1234);
    }

    #[test]
    fn test_palette_mirror_write_updates_canonical() {
        let mut mem = Memory::new();
        assert_eq!(mem.read8(0xC023), DEFAULT_PALETTE[3]);
        mem.write8(0xC023, 0x1C);
        assert_eq!(mem.palette[3], 0x1C);
        mem.reset();
        assert_eq!(mem.read8(0xC023), 0x1C);
    }

    #[test]
    fn test_canonical_write_not_mirrored_until_reset() {
        let mut mem = Memory::new();
        mem.set_palette_entry(3, 0x1C);
        assert_eq!(mem.read8(0xC023), DEFAULT_PALETTE[3]);
        mem.reset();
        assert_eq!(mem.read8(0xC023), 0x1C);
    }

    #[test]
    fn test_reset_keeps_rom() {
        let mut mem = Memory::new();
        mem.load_rom(&[0xFE, 0x00]);
        mem.write8(0x0010, 0x99);
        mem.reset();
        assert_eq!(mem.read8(0x0010), 0);
        assert_eq!(mem.read8(0xE000), 0xFE);
    }
}
