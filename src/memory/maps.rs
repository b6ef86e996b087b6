// Tue Jan 13 2026 - Alex

use crate::memory::{Address, MemoryError, MemoryRange, MemoryRegion, Protection};
use crate::module::{file_name_of, ModuleDescriptor};
use indexmap::IndexMap;
use itertools::Itertools;
use std::fs;

const DELETED_SUFFIX: &str = " (deleted)";

/// One line of `/proc/<pid>/maps`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapsEntry {
    pub range: MemoryRange,
    pub protection: Protection,
    pub offset: u64,
    pub pathname: Option<String>,
}

impl MapsEntry {
    pub fn parse(line: &str) -> Result<Self, MemoryError> {
        let malformed = || MemoryError::MalformedMapsLine(line.to_string());
        let mut fields = line.splitn(6, ' ');

        let (start, end) = fields
            .next()
            .and_then(|r| r.split_once('-'))
            .ok_or_else(malformed)?;
        let start = Address::parse(start).ok_or_else(malformed)?;
        let end = Address::parse(end).ok_or_else(malformed)?;
        let perms = fields.next().ok_or_else(malformed)?;
        let offset = fields
            .next()
            .and_then(|o| u64::from_str_radix(o, 16).ok())
            .ok_or_else(malformed)?;
        // device and inode are not needed
        fields.next().ok_or_else(malformed)?;
        fields.next().ok_or_else(malformed)?;

        let pathname = fields
            .next()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        Ok(Self {
            range: MemoryRange::new(start, end),
            protection: Protection::from_maps_perms(perms),
            offset,
            pathname,
        })
    }

    /// True for mappings backed by a regular file path rather than a
    /// pseudo-name such as `[stack]` or `[vdso]`.
    pub fn is_file_backed(&self) -> bool {
        self.pathname.as_deref().map_or(false, |p| p.starts_with('/'))
    }

    pub fn to_region(&self) -> MemoryRegion {
        let region = MemoryRegion::new(self.range, self.protection).with_offset(self.offset);
        match &self.pathname {
            Some(path) => region.with_file_path(path.clone()),
            None => region,
        }
    }
}

pub fn parse_maps(contents: &str) -> Result<Vec<MapsEntry>, MemoryError> {
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(MapsEntry::parse)
        .collect()
}

pub fn read_self_maps() -> Result<Vec<MapsEntry>, MemoryError> {
    let contents = fs::read_to_string("/proc/self/maps")?;
    parse_maps(&contents)
}

/// Filters entries down to those whose protection includes `required`,
/// optionally merging adjacent regions with identical protection.
pub fn select_ranges(entries: &[MapsEntry], required: Protection, coalesce: bool) -> Vec<MemoryRegion> {
    let regions = entries
        .iter()
        .filter(|e| e.protection.includes(required))
        .map(MapsEntry::to_region);

    if coalesce {
        regions.coalesce(MemoryRegion::coalesce).collect()
    } else {
        regions.collect()
    }
}

/// Groups file-backed mappings into one descriptor per path. The image spans
/// from the lowest mapping of that path to the highest end address.
pub fn modules_from_maps(entries: &[MapsEntry]) -> Vec<ModuleDescriptor> {
    let mut spans: IndexMap<String, MemoryRange> = IndexMap::new();

    for entry in entries.iter().filter(|e| e.is_file_backed()) {
        let Some(pathname) = entry.pathname.as_ref() else {
            continue;
        };
        spans
            .entry(pathname.clone())
            .and_modify(|span| *span = span.union(&entry.range))
            .or_insert(entry.range);
    }

    spans
        .into_iter()
        .map(|(pathname, span)| descriptor_for(&pathname, span))
        .collect()
}

fn descriptor_for(pathname: &str, span: MemoryRange) -> ModuleDescriptor {
    match pathname.strip_suffix(DELETED_SUFFIX) {
        Some(original) => ModuleDescriptor::new(file_name_of(original), span.start(), span.size()),
        None => ModuleDescriptor::from_path(pathname, span.start(), span.size()),
    }
}
