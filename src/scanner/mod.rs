// Tue Jan 13 2026 - Alex

pub mod memory;
pub mod signature;

pub use memory::MemoryScanner;
pub use signature::{matches_signature, ELF_MAGIC, SIGNATURE_LEN};
