// Tue Jan 13 2026 - Alex

use crate::memory::MemoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DumpError {
    #[error("Invalid module descriptor: {0}")]
    InvalidInput(String),
    #[error("Memory read failed at offset {offset:#x}: {source}")]
    MemoryRead {
        offset: u64,
        #[source]
        source: MemoryError,
    },
    #[error("Failed to read backing file {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Backing file {0} is empty")]
    EmptyFile(String),
    #[error("Unexpected failure: {0}")]
    Unexpected(String),
}
