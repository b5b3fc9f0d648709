//! XVM-8 cartridge image parser.
//!
//! ```text
//! offset  size  field
//! 0       4     magic "XVM8"
//! 4       2     entry point (little-endian absolute address)
//! 6       2     size field (reserved, not validated)
//! 8       ...   program bytes, copied to 0xE000 onward
//! ```
//!
//! The entry point is not checked against the program bytes; a program whose
//! entry lies past its own code runs whatever the ROM holds there.

use crate::{Result, XvmError, ROM_SIZE};

/// Magic bytes at the start of every cartridge image.
pub const MAGIC: &[u8; 4] = b"XVM8";
/// Header length in bytes.
pub const HEADER_SIZE: usize = 8;

/// A validated cartridge image borrowing its program bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RomImage<'a> {
    pub entry: u16,
    /// Size field from the header, carried through unvalidated
    pub declared_size: u16,
    pub program: &'a [u8],
}

/// Validate a cartridge image.
///
/// Fails on a short header, a wrong magic literal, or a program that does
/// not fit the 8 KB ROM. Never touches machine state.
pub fn parse_rom(data: &[u8]) -> Result<RomImage<'_>> {
    if data.len() < HEADER_SIZE {
        return Err(XvmError::RomTooShort { len: data.len() });
    }
    let magic = [data[0], data[1], data[2], data[3]];
    if &magic != MAGIC {
        return Err(XvmError::BadMagic(magic));
    }
    let program = &data[HEADER_SIZE..];
    if program.len() > ROM_SIZE {
        return Err(XvmError::RomTooLarge { len: program.len() });
    }
    Ok(RomImage {
        entry: u16::from_le_bytes([data[4], data[5]]),
        declared_size: u16::from_le_bytes([data[6], data[7]]),
        program,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        let data = [b'X', b'V', b'M', b'8', 0x10, 0xE0, 0x02, 0x00, 0x00, 0xFE];
        let rom = parse_rom(&data).unwrap();
        assert_eq!(rom.entry, 0xE010);
        assert_eq!(rom.declared_size, 2);
        assert_eq!(rom.program, &[0x00, 0xFE]);
    }

    #[test]
    fn test_size_field_not_validated() {
        let data = [b'X', b'V', b'M', b'8', 0x00, 0xE0, 0xFF, 0xFF, 0xFE];
        let rom = parse_rom(&data).unwrap();
        assert_eq!(rom.declared_size, 0xFFFF);
        assert_eq!(rom.program.len(), 1);
    }

    #[test]
    fn test_bad_magic() {
        let data = [b'X', b'V', b'M', b'9', 0x00, 0xE0, 0x00, 0x00, 0xFE];
        match parse_rom(&data) {
            Err(XvmError::BadMagic(m)) => assert_eq!(&m, b"XVM9"),
            other => panic!("Expected BadMagic, got {:?}", other),
        }
    }

    #[test]
    fn test_too_short() {
        assert!(matches!(parse_rom(b"XVM8\x00"), Err(XvmError::RomTooShort { len: 5 })));
        assert!(matches!(parse_rom(&[]), Err(XvmError::RomTooShort { len: 0 })));
    }

    #[test]
    fn test_too_large() {
        let mut data = b"XVM8\x00\xE0\x00\x00".to_vec();
        data.resize(HEADER_SIZE + ROM_SIZE, 0);
        assert!(parse_rom(&data).is_ok());
        data.push(0);
        assert!(matches!(parse_rom(&data), Err(XvmError::RomTooLarge { len }) if len == ROM_SIZE + 1));
    }
}
