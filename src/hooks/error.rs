// Tue Jan 13 2026 - Alex

use crate::memory::Address;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HookError {
    #[error("Export not found: {0}")]
    ExportNotFound(String),
    #[error("Cannot intercept {0}: not an interposable loader entry point")]
    UnsupportedTarget(Address),
    #[error("A listener is already attached at {0}")]
    AlreadyAttached(Address),
    #[error("Attach failed: {0}")]
    AttachFailed(String),
}
