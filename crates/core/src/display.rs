//! Video output for the XVM-8.
//!
//! Video RAM holds one byte per pixel (128×128, row-major). Only the low
//! nibble is used, as an index into the 16-entry RGB332 palette. At the end
//! of every frame [`Display::render`] expands VRAM into an RGBA framebuffer,
//! which is the only thing a presentation layer ever sees.

use crate::{PALETTE_SIZE, SCREEN_HEIGHT, SCREEN_WIDTH};

const FB_SIZE: usize = SCREEN_WIDTH * SCREEN_HEIGHT * 4; // RGBA

/// Expand an RGB332 byte to opaque RGBA8888.
#[inline(always)]
pub fn rgb332_to_rgba(c: u8) -> [u8; 4] {
    let r = ((c >> 5) & 0x07) * 36;
    let g = ((c >> 2) & 0x07) * 36;
    let b = (c & 0x03) * 85;
    [r, g, b, 0xFF]
}

/// Frame output: RGBA framebuffer rebuilt from VRAM once per frame.
pub struct Display {
    pub framebuffer: Vec<u8>,
    /// Whether framebuffer has been rendered since the last reset
    pub dirty: bool,
}

impl Display {
    pub fn new() -> Self {
        let mut framebuffer = vec![0u8; FB_SIZE];
        for px in framebuffer.chunks_exact_mut(4) {
            px[3] = 0xFF;
        }
        Display { framebuffer, dirty: false }
    }

    /// Convert VRAM color indices to RGBA using the canonical palette.
    pub fn render(&mut self, vram: &[u8], palette: &[u8; PALETTE_SIZE]) {
        // Expand the palette once instead of per pixel
        let lut: [[u8; 4]; PALETTE_SIZE] = std::array::from_fn(|i| rgb332_to_rgba(palette[i]));
        for (px, &index) in self.framebuffer.chunks_exact_mut(4).zip(vram.iter()) {
            px.copy_from_slice(&lut[(index & 0x0F) as usize]);
        }
        self.dirty = true;
    }

    /// Convert framebuffer to u32 pixel array (0xRRGGBB format for minifb)
    pub fn as_pixel_buffer(&self) -> Vec<u32> {
        self.framebuffer
            .chunks_exact(4)
            .map(|px| (px[0] as u32) << 16 | (px[1] as u32) << 8 | px[2] as u32)
            .collect()
    }
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DEFAULT_PALETTE, VRAM_SIZE};

    #[test]
    fn test_rgb332_expansion() {
        assert_eq!(rgb332_to_rgba(0x00), [0, 0, 0, 255]);
        assert_eq!(rgb332_to_rgba(0xFF), [252, 252, 255, 255]);
        assert_eq!(rgb332_to_rgba(0xE0), [252, 0, 0, 255]);
        assert_eq!(rgb332_to_rgba(0x1C), [0, 252, 0, 255]);
        assert_eq!(rgb332_to_rgba(0x03), [0, 0, 255, 255]);
    }

    #[test]
    fn test_render_uses_low_nibble() {
        let mut display = Display::new();
        let mut vram = vec![0u8; VRAM_SIZE];
        vram[0] = 0x04; // red in default palette
        vram[1] = 0xF4; // high nibble ignored
        vram[128 * 5 + 3] = 0x07; // (3, 5): white
        display.render(&vram, &DEFAULT_PALETTE);
        assert!(display.dirty);
        assert_eq!(&display.framebuffer[0..4], &[252, 0, 0, 255]);
        assert_eq!(&display.framebuffer[4..8], &[252, 0, 0, 255]);
        let off = (5 * SCREEN_WIDTH + 3) * 4;
        assert_eq!(&display.framebuffer[off..off + 4], &[252, 252, 255, 255]);
    }

    #[test]
    fn test_pixel_buffer_packing() {
        let mut display = Display::new();
        let mut vram = vec![0u8; VRAM_SIZE];
        vram[2] = 0x02; // green
        display.render(&vram, &DEFAULT_PALETTE);
        let pixels = display.as_pixel_buffer();
        assert_eq!(pixels.len(), SCREEN_WIDTH * SCREEN_HEIGHT);
        assert_eq!(pixels[0], 0x000000);
        assert_eq!(pixels[2], 0x00FC00);
    }
}
