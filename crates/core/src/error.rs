//! Error type shared by the loader and the save-state code.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, XvmError>;

#[derive(Debug, Error)]
pub enum XvmError {
    #[error("ROM image too short: {len} bytes (header is 8)")]
    RomTooShort { len: usize },
    #[error("invalid ROM format: bad magic {0:02X?} (expected \"XVM8\")")]
    BadMagic([u8; 4]),
    #[error("ROM program too large: {len} bytes (max 8192)")]
    RomTooLarge { len: usize },
    #[error("save state error: {0}")]
    SaveState(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode error: {0}")]
    Encode(#[from] bincode::Error),
}
