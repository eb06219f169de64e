//! Normalization of the bootloader memory map.
//!
//! The memory map is handled in two steps. While the tag stream is scanned, the
//! memory map tag is only captured as a `DeferredMemoryMap`, because there is no
//! allocator yet to hold a copy. Once the allocator is up, `materialize` turns
//! it into an array of `NormalizedRegion`s in freshly allocated pages.

use core::{ptr, slice};

use bare_metal::{PhysAddr, VirtAddr};
use kmem::paging::{pages_for, DirectMapping};
use kmem::physical::alloc::PageFrameAllocator;
use kmem::PAGE_SIZE;
use log::{debug, info};
use multiboot2::{EntryType, MemoryMapEntry, MemoryMapTag};
use static_assertions::assert_eq_size;

use crate::error::BootError;

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryClass {
    Available = 1,
    Reserved = 2,
    AcpiReclaimable = 3,
    Nvs = 4,
    Bad = 5,
}

impl MemoryClass {
    /// Unknown types are treated as reserved.
    pub fn classify(entry_type: EntryType) -> MemoryClass {
        match entry_type {
            EntryType::AVAILABLE => MemoryClass::Available,
            EntryType::ACPI_RECLAIMABLE => MemoryClass::AcpiReclaimable,
            EntryType::NVS => MemoryClass::Nvs,
            EntryType::DEFECTIVE => MemoryClass::Bad,
            _ => MemoryClass::Reserved,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MemoryClass::Available => "available",
            MemoryClass::Reserved => "reserved",
            MemoryClass::AcpiReclaimable => "ACPI reclaimable",
            MemoryClass::Nvs => "ACPI NVS",
            MemoryClass::Bad => "bad",
        }
    }
}

/// A memory map entry in the form the kernel expects.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedRegion {
    pub class: MemoryClass,
    reserved: u32,
    pub base: PhysAddr,
    pub len: u64,
}

assert_eq_size!(NormalizedRegion, [u8; 24]);

impl NormalizedRegion {
    pub const fn new(class: MemoryClass, base: PhysAddr, len: u64) -> Self {
        NormalizedRegion { class, reserved: 0, base, len }
    }

    pub fn from_entry(entry: &MemoryMapEntry) -> Self {
        NormalizedRegion::new(MemoryClass::classify(entry.entry_type()), entry.base_addr(), entry.length())
    }

    pub fn range(&self) -> bare_metal::PhysAddrRange {
        bare_metal::PhysAddrRange::new(self.base, self.len)
    }
}

/// The end of the highest entry of the memory map, or zero if it is empty.
pub fn highest_address<I: Iterator<Item = MemoryMapEntry>>(entries: I) -> PhysAddr {
    entries.map(|e| e.end_addr()).max().unwrap_or(PhysAddr(0))
}

/// The memory map tag, captured during the scan for later normalization.
#[derive(Debug, Clone)]
pub struct DeferredMemoryMap<'a> {
    tag: MemoryMapTag<'a>,
}

impl<'a> DeferredMemoryMap<'a> {
    pub fn new(tag: MemoryMapTag<'a>) -> Self {
        DeferredMemoryMap { tag }
    }

    pub fn tag(&self) -> &MemoryMapTag<'a> {
        &self.tag
    }

    pub fn region_count(&self) -> usize {
        self.tag.entry_count()
    }

    /// Log the raw entries and return the end of the highest one.
    pub fn scan(&self) -> PhysAddr {
        for (index, entry) in self.tag.entries().enumerate() {
            debug!(
                "[mmap] {:2}: {:p} + {:#x} {}",
                index, entry.base_addr(), entry.length(), MemoryClass::classify(entry.entry_type()).name()
            );
        }
        highest_address(self.tag.entries())
    }

    /// Copy the memory map into pages taken from `pfa`, which are accessed
    /// through `window`. All allocated pages are cleared first.
    pub fn materialize(
        self, pfa: &mut dyn PageFrameAllocator, window: &DirectMapping,
    ) -> Result<NormalizedMap, BootError> {
        let count = self.region_count();
        if count == 0 {
            return Ok(NormalizedMap::empty());
        }
        let bytes = (count * core::mem::size_of::<NormalizedRegion>()) as u64;
        let pages = pages_for(bytes);
        let frames = pfa.alloc_region(pages).ok_or(BootError::OutOfMemory { pages })?;
        let phys = frames.start.start_address();
        let virt = window.phys_to_virt(phys)
            .filter(|_| window.contains_phys(frames.end.start_address() - 1))
            .ok_or(BootError::NotAccessible { paddr: phys })?;

        let array: *mut NormalizedRegion = unsafe { virt.as_mut_ptr() };
        unsafe {
            ptr::write_bytes(array as *mut u8, 0, (pages * PAGE_SIZE) as usize);
            for (index, entry) in self.tag.entries().take(count).enumerate() {
                array.add(index).write(NormalizedRegion::from_entry(&entry));
            }
        }
        info!("[mmap] {} regions normalized at {:p} ({} pages)", count, phys, pages);

        Ok(NormalizedMap { phys, virt, len: count, pages })
    }
}

/// The normalized memory map in allocator-owned memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMap {
    phys: PhysAddr,
    virt: VirtAddr,
    len: usize,
    pages: u64,
}

impl NormalizedMap {
    pub const fn empty() -> Self {
        NormalizedMap { phys: PhysAddr(0), virt: VirtAddr(0), len: 0, pages: 0 }
    }

    /// Physical address of the first region, zero if there are none.
    pub fn phys_addr(&self) -> PhysAddr {
        self.phys
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of pages backing the array.
    pub fn pages(&self) -> u64 {
        self.pages
    }

    pub fn regions(&self) -> &[NormalizedRegion] {
        if self.len == 0 {
            return &[];
        }
        // written in full by `materialize`, the pages are never handed out again
        unsafe { slice::from_raw_parts(self.virt.as_ptr(), self.len) }
    }
}
