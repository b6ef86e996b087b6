// Tue Jan 13 2026 - Alex

pub mod address;
pub mod error;
pub mod maps;
pub mod process;
pub mod protection;
pub mod range;
pub mod region;
pub mod traits;

pub use address::Address;
pub use error::MemoryError;
pub use maps::MapsEntry;
pub use process::ProcessMemory;
pub use protection::Protection;
pub use range::MemoryRange;
pub use region::MemoryRegion;
pub use traits::MemoryReader;
