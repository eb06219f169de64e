//! Parser for the Multiboot2 memory map.

use bare_metal::{PhysAddr, PhysAddrRange};

use core::fmt;
use core::iter::{FusedIterator, Iterator};

use crate::raw;
use crate::RawTag;

/// The memory map tag. The entries are decoded on demand, so the tag can be
/// walked any number of times.
#[derive(Clone, Copy, Debug)]
pub struct MemoryMapTag<'a> {
    raw: RawTag<'a>,
    entry_size: u32,
    entry_version: u32,
}

impl<'a> MemoryMapTag<'a> {
    pub(crate) fn from_raw(raw: RawTag<'a>) -> Option<Self> {
        if raw.size() < raw::MEMORY_MAP_TAG_SIZE {
            return None;
        }
        Some(MemoryMapTag {
            raw,
            entry_size: raw::read_u32(raw.bytes(), 8)?,
            entry_version: raw::read_u32(raw.bytes(), 12)?,
        })
    }

    /// Stride of the entry array in bytes.
    pub fn entry_size(&self) -> u32 {
        self.entry_size
    }

    pub fn entry_version(&self) -> u32 {
        self.entry_version
    }

    /// Size of the whole tag in bytes, header included.
    pub fn size(&self) -> usize {
        self.raw.size()
    }

    /// Number of entries: `(size - 16) / entry_size`. A stride too small to hold
    /// an entry yields no entries at all.
    pub fn entry_count(&self) -> usize {
        let stride = self.entry_size as usize;
        if stride < raw::MEMORY_MAP_ENTRY_MIN_SIZE {
            0
        } else {
            (self.raw.size() - raw::MEMORY_MAP_TAG_SIZE) / stride
        }
    }

    pub fn entries(&self) -> MemoryMapEntries<'a> {
        MemoryMapEntries {
            bytes: &self.raw.bytes()[raw::MEMORY_MAP_TAG_SIZE..],
            stride: self.entry_size as usize,
            index: 0,
            count: self.entry_count(),
        }
    }
}

/// An iterator over the entries of a multiboot2 memory map.
#[derive(Clone, Debug)]
pub struct MemoryMapEntries<'a> {
    bytes: &'a [u8],
    stride: usize,
    index: usize,
    count: usize,
}

impl<'a> Iterator for MemoryMapEntries<'a> {
    type Item = MemoryMapEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.count {
            return None;
        }
        let offset = self.index * self.stride;
        self.index += 1;
        Some(MemoryMapEntry {
            base_addr: PhysAddr(raw::read_u64(self.bytes, offset)?),
            length: raw::read_u64(self.bytes, offset + 8)?,
            entry_type: EntryType(raw::read_u32(self.bytes, offset + 16)?),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.index;
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for MemoryMapEntries<'a> {}

impl<'a> FusedIterator for MemoryMapEntries<'a> {}

/// The type of an entry in the memory map.
#[derive(PartialEq, Eq, Copy, Clone)]
#[repr(C)]
pub struct EntryType(pub u32);

impl EntryType {
    pub const AVAILABLE: EntryType = EntryType(1);
    pub const RESERVED: EntryType = EntryType(2);
    pub const ACPI_RECLAIMABLE: EntryType = EntryType(3);
    pub const NVS: EntryType = EntryType(4);
    pub const DEFECTIVE: EntryType = EntryType(5);
}

impl fmt::Debug for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = match *self {
            EntryType::AVAILABLE => "Available",
            EntryType::ACPI_RECLAIMABLE => "AcpiReclaimable",
            EntryType::NVS => "Nvs",
            EntryType::DEFECTIVE => "Defective",
            _ => "Reserved",
        };
        write!(f, "EntryType({} ~ {})", self.0, description)
    }
}

/// A single entry of the memory map as provided by the bootloader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryMapEntry {
    base_addr: PhysAddr,
    length: u64,
    entry_type: EntryType,
}

impl MemoryMapEntry {
    pub const fn new(base_addr: PhysAddr, length: u64, entry_type: EntryType) -> Self {
        MemoryMapEntry { base_addr, length, entry_type }
    }

    /// Return whether the memory range described by this entry is available to the OS.
    pub fn is_available(&self) -> bool {
        self.entry_type == EntryType::AVAILABLE
    }

    pub fn base_addr(&self) -> PhysAddr {
        self.base_addr
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    /// First address after the entry, clamped to the top of the address space.
    pub fn end_addr(&self) -> PhysAddr {
        self.base_addr.saturating_add(self.length)
    }

    pub fn range(&self) -> PhysAddrRange {
        PhysAddrRange::new(self.base_addr, self.length)
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }
}
