// Wed Jan 15 2026 - Alex

use crate::memory::{Address, MemoryError, MemoryRegion, Protection};

/// Raw access to the address space the dumper lives in.
pub trait MemoryReader: Send + Sync {
    /// Reads exactly `len` bytes. A failed or partial read is an error, never
    /// an empty or truncated buffer.
    fn read_bytes(&self, addr: Address, len: usize) -> Result<Vec<u8>, MemoryError>;

    /// Reads a NUL-terminated string starting at `addr`.
    fn read_c_string(&self, addr: Address) -> Result<String, MemoryError>;

    /// Lists mapped ranges whose protection includes `required`. With
    /// `coalesce`, adjacent ranges of identical protection are merged.
    fn enumerate_ranges(
        &self,
        required: Protection,
        coalesce: bool,
    ) -> Result<Vec<MemoryRegion>, MemoryError>;
}
