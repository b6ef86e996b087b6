// Tue Jan 13 2026 - Alex

pub mod engine;
pub mod error;

pub use engine::{DumpOutcome, ExtractionSource, ModuleDumper};
pub use error::DumpError;
