// Tue Jan 13 2026 - Alex

use crate::memory::{Address, MemoryRange, Protection};
use std::fmt;

/// One mapping reported by the region enumeration, possibly the result of
/// coalescing several adjacent mappings with identical protection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    range: MemoryRange,
    protection: Protection,
    offset: u64,
    file_path: Option<String>,
}

impl MemoryRegion {
    pub fn new(range: MemoryRange, protection: Protection) -> Self {
        Self {
            range,
            protection,
            offset: 0,
            file_path: None,
        }
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_file_path(mut self, path: String) -> Self {
        self.file_path = Some(path);
        self
    }

    pub fn range(&self) -> &MemoryRange {
        &self.range
    }

    pub fn protection(&self) -> Protection {
        self.protection
    }

    /// Offset into the backing file, 0 for anonymous mappings.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn file_path(&self) -> Option<&str> {
        self.file_path.as_deref()
    }

    pub fn start(&self) -> Address {
        self.range.start()
    }

    pub fn end(&self) -> Address {
        self.range.end()
    }

    pub fn size(&self) -> u64 {
        self.range.size()
    }

    pub fn contains(&self, addr: Address) -> bool {
        self.range.contains(addr)
    }

    pub fn is_executable(&self) -> bool {
        self.protection.can_execute()
    }

    pub fn is_readable(&self) -> bool {
        self.protection.can_read()
    }

    /// Merges `next` into this region when it starts where this one ends and
    /// carries the same protection. Returns the unmerged region otherwise.
    pub fn coalesce(self, next: Self) -> Result<Self, (Self, Self)> {
        if self.protection == next.protection && self.range.is_adjacent_to(&next.range) {
            let range = self.range.union(&next.range);
            Ok(Self { range, ..self })
        } else {
            Err((self, next))
        }
    }
}

impl fmt::Display for MemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.range, self.protection)?;
        if let Some(path) = &self.file_path {
            write!(f, " {}", path)?;
        }
        Ok(())
    }
}
