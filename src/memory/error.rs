// Tue Jan 13 2026 - Alex

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Read failed at address {address:#x}: {reason}")]
    ReadFailed { address: u64, reason: String },
    #[error("Short read at address {address:#x}: wanted {wanted} bytes, got {got}")]
    ShortRead { address: u64, wanted: usize, got: usize },
    #[error("Unterminated string at address {0:#x}")]
    UnterminatedString(u64),
    #[error("Malformed maps line: {0}")]
    MalformedMapsLine(String),
    #[error("Enumeration failed: {0}")]
    EnumerationFailed(String),
    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl MemoryError {
    pub fn read_failed(address: u64, reason: impl Into<String>) -> Self {
        Self::ReadFailed { address, reason: reason.into() }
    }
}
