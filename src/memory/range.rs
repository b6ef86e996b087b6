// Tue Jan 13 2026 - Alex

use crate::memory::Address;
use std::fmt;

/// Half-open address range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryRange {
    start: Address,
    end: Address,
}

impl MemoryRange {
    /// Builds a range, swapping the bounds if they arrive reversed.
    pub fn new(start: Address, end: Address) -> Self {
        if end < start {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    pub fn from_start_size(start: Address, size: u64) -> Self {
        let end = start.checked_add(size).unwrap_or(Address::new(u64::MAX));
        Self::new(start, end)
    }

    pub fn start(&self) -> Address {
        self.start
    }

    pub fn end(&self) -> Address {
        self.end
    }

    pub fn size(&self) -> u64 {
        self.end - self.start
    }

    pub fn contains(&self, addr: Address) -> bool {
        addr.is_within_range(self.start, self.end)
    }

    /// True when `other` begins exactly where this range ends.
    pub fn is_adjacent_to(&self, other: &Self) -> bool {
        self.end == other.start
    }

    pub fn union(&self, other: &Self) -> Self {
        Self::new(self.start.min(other.start), self.end.max(other.end))
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl fmt::Display for MemoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
