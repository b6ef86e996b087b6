// Tue Jan 13 2026 - Alex

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, Sub};

/// A location in the current process's address space.
///
/// Serialized in pointer notation (`0x7000`) so collectors see the same
/// spelling the loader logs use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    value: u64,
}

impl Address {
    pub const fn new(value: u64) -> Self {
        Self { value }
    }

    pub const fn zero() -> Self {
        Self { value: 0 }
    }

    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self { value: ptr as usize as u64 }
    }

    pub fn as_u64(&self) -> u64 {
        self.value
    }

    pub fn as_usize(&self) -> usize {
        self.value as usize
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.value as usize as *const u8
    }

    pub fn is_null(&self) -> bool {
        self.value == 0
    }

    pub fn checked_add(&self, offset: u64) -> Option<Self> {
        self.value.checked_add(offset).map(Self::new)
    }

    pub fn is_within_range(&self, start: Self, end: Self) -> bool {
        self.value >= start.value && self.value < end.value
    }

    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        u64::from_str_radix(digits, 16).ok().map(Self::new)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.value)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.value, f)
    }
}

impl Add<u64> for Address {
    type Output = Self;
    fn add(self, rhs: u64) -> Self::Output {
        Self { value: self.value.wrapping_add(rhs) }
    }
}

impl Sub<Address> for Address {
    type Output = u64;
    fn sub(self, rhs: Address) -> Self::Output {
        self.value.wrapping_sub(rhs.value)
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl From<usize> for Address {
    fn from(value: usize) -> Self {
        Self::new(value as u64)
    }
}

impl From<Address> for u64 {
    fn from(addr: Address) -> Self {
        addr.value
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Address::parse(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid address: {}", text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_pointer_notation() {
        assert_eq!(Address::new(0x7000).to_string(), "0x7000");
        assert_eq!(Address::zero().to_string(), "0x0");
    }

    #[test]
    fn test_parse_accepts_prefixed_and_bare_hex() {
        assert_eq!(Address::parse("0x7f00"), Some(Address::new(0x7f00)));
        assert_eq!(Address::parse("7f00"), Some(Address::new(0x7f00)));
        assert_eq!(Address::parse("zz"), None);
    }

    #[test]
    fn test_serializes_as_hex_string() {
        let json = serde_json::to_string(&Address::new(0xdead0000)).unwrap();
        assert_eq!(json, "\"0xdead0000\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Address::new(0xdead0000));
    }

    #[test]
    fn test_checked_add_overflow() {
        assert_eq!(Address::new(u64::MAX).checked_add(1), None);
        assert_eq!(Address::new(0x1000).checked_add(0x10), Some(Address::new(0x1010)));
    }
}
