//! This module provides functionality for manipulating page tables.

pub mod direct;
mod entry;

use core::fmt;

use bare_metal::{Alignable, PhysAddr, VirtAddr};
use log::trace;

use crate::physical::alloc::PageFrameAllocator;
use crate::{PAGE_ALIGN_BITS, PAGE_SIZE};

pub use self::direct::DirectMapping;
pub use self::entry::{Flags, PageTable, PageTableEntry, ENTRY_COUNT};

/// Index of a level in the page table hierarchy. 0 represents the lowest level (4K pages).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Level(pub u32);

impl Level {
    /// Page Table level
    pub const PT: Level = Level(0);
    /// Page Directory level
    pub const PD: Level = Level(1);
    /// Page Directory Pointer level
    pub const PDP: Level = Level(2);
    /// Page Map Table Level 4 level
    pub const PML4: Level = Level(3);

    /// The child level in the page table hierarchy, if the current level is not the leaf level (0).
    pub fn child(&self) -> Option<Level> {
        if self.0 == 0 {
            None
        } else {
            Some(Level(self.0 - 1))
        }
    }

    /// Size of the memory mapped by a single entry at this level.
    pub fn page_size(&self) -> u64 {
        1 << (PAGE_ALIGN_BITS + INDEX_BIT_WIDTH * self.0)
    }
}

pub trait AddressSpace {
    /// Map a virtual address to the given physical address in this address space.
    ///
    /// # Arguments
    ///
    /// * `vaddr` the virtual address that should be mapped
    /// * `paddr` the physical address to which the virtual address will be mapped
    /// * `level` the level in the page table hierarchy at which the mapping should be added
    ///   Level 0 refers to the smallest mapping unit (4K pages on AMD64).
    ///   Higher levels are not necessarily supported.
    /// * `flags` the flags of the new entry. `PRESENT` is always added.
    /// * `pfa` a page frame allocator that is used for allocating new page tables if necessary
    fn map(
        &mut self, vaddr: VirtAddr, paddr: PhysAddr, level: Level, flags: Flags,
        pfa: &mut dyn PageFrameAllocator,
    ) -> Result<(), MapError>;

    /// Resolve a virtual address to a physical address in this address space.
    ///
    /// # Returns
    ///
    /// The physical address that the given virtual address is mapped to, or `None` if the
    /// virtual address is not mapped.
    fn resolve(&self, vaddr: VirtAddr) -> Option<PhysAddr>;
}

#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub enum MapError {
    /// There can be no mappings on the requested level.
    InvalidLevel(Level),
    /// Virtual or physical address are not aligned to the page size of the level.
    Misaligned,
    /// There is already a mapping at the given virtual address.
    MappingExists,
    /// There is no memory left for allocating new page tables.
    OutOfMemory,
    /// A page table lies outside the physical memory window.
    TableUnreachable(PhysAddr),
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MapError::InvalidLevel(level) => write!(f, "cannot map at level {}", level.0),
            MapError::Misaligned => write!(f, "address not aligned to page size"),
            MapError::MappingExists => write!(f, "address already mapped"),
            MapError::OutOfMemory => write!(f, "out of memory for page tables"),
            MapError::TableUnreachable(addr) => write!(f, "page table at {:p} not reachable", addr),
        }
    }
}

/// Mask for extracting the 9-bit index into a page table.
const INDEX_MASK: u64 = 0x1FF;
/// Width of the index in bits.
const INDEX_BIT_WIDTH: u32 = 9;

/// Return the index in the page table at the given level (0 is PT, 3 is PML4)
/// that is responsible for mapping the given virtual address.
pub fn index_at_level(level: Level, vaddr: VirtAddr) -> usize {
    ((vaddr.0 >> (PAGE_ALIGN_BITS + INDEX_BIT_WIDTH * level.0)) & INDEX_MASK) as usize
}

/// A 4-level page table hierarchy whose tables are accessed through a window
/// onto physical memory (the identity mapping during early boot).
pub struct MappedPageTable {
    root: PhysAddr,
    window: DirectMapping,
}

impl MappedPageTable {
    /// # Safety
    ///
    /// `root` must be the physical address of a valid PML4, and all page tables
    /// reachable from it as well as every frame handed out by the allocators
    /// passed to `map` must be accessible through `window`.
    pub unsafe fn new(root: PhysAddr, window: DirectMapping) -> Self {
        MappedPageTable { root, window }
    }

    pub fn root(&self) -> PhysAddr {
        self.root
    }

    fn table_ptr(&self, paddr: PhysAddr) -> Result<*mut PageTable, MapError> {
        let vaddr = self.window.phys_to_virt(paddr)
            .ok_or(MapError::TableUnreachable(paddr))?;
        Ok(unsafe { vaddr.as_mut_ptr() })
    }

    /// Allocate and clear a page table, returning its physical address.
    fn new_table(&self, pfa: &mut dyn PageFrameAllocator) -> Result<PhysAddr, MapError> {
        let frame = pfa.alloc().ok_or(MapError::OutOfMemory)?;
        let table = self.table_ptr(frame.start_address())?;
        // clear out page table before attempting to reference anything in it
        unsafe { (*table).clear() };
        Ok(frame.start_address())
    }
}

impl AddressSpace for MappedPageTable {
    fn map(
        &mut self, vaddr: VirtAddr, paddr: PhysAddr, level: Level, flags: Flags,
        pfa: &mut dyn PageFrameAllocator,
    ) -> Result<(), MapError> {
        // can only map 4K and 2M pages
        if level > Level::PD {
            return Err(MapError::InvalidLevel(level));
        }
        let required_alignment = level.page_size();
        if !paddr.is_aligned(required_alignment) || !vaddr.is_aligned(required_alignment) {
            return Err(MapError::Misaligned);
        }
        trace!("[VMM] mmap({:p}, {:p})", vaddr, paddr);

        let mut table = self.table_ptr(self.root)?;
        let mut current_level = Level::PML4;
        while current_level > level {
            let entry = unsafe { &mut (*table).entries[index_at_level(current_level, vaddr)] };
            if !entry.is_present() {
                trace!("[VMM] allocating new page table at level {}", current_level.0);
                // tables linked before a later failure stay in place, they map nothing
                let new_table = self.new_table(pfa)?;
                let mut new_entry = PageTableEntry::new();
                new_entry.set_base(new_table);
                new_entry.set_flags(Flags::PRESENT | Flags::WRITABLE);
                *entry = new_entry;
            } else if entry.is_huge() {
                return Err(MapError::MappingExists);
            }
            table = self.table_ptr(entry.base())?;
            current_level = Level(current_level.0 - 1);
        }

        let entry = unsafe { &mut (*table).entries[index_at_level(level, vaddr)] };
        if entry.is_present() {
            return Err(MapError::MappingExists);
        }
        let mut new_flags = flags | Flags::PRESENT;
        if level > Level::PT {
            // set huge page size flag if we're not mapping at the lowest level
            new_flags |= Flags::SIZE;
        }
        // not-present entries are never cached, no TLB invalidation needed
        let mut new_entry = PageTableEntry::new();
        new_entry.set_base(paddr);
        new_entry.set_flags(new_flags);
        *entry = new_entry;
        Ok(())
    }

    fn resolve(&self, vaddr: VirtAddr) -> Option<PhysAddr> {
        let mut table = self.table_ptr(self.root).ok()?;
        let mut current_level = Level::PML4;
        loop {
            let entry = unsafe { (*table).entries[index_at_level(current_level, vaddr)] };
            if !entry.is_present() {
                break None;
            }
            if current_level == Level::PT || entry.is_huge() {
                let offset_mask = current_level.page_size() - 1;
                break Some(PhysAddr(entry.base().0 + (vaddr.0 & offset_mask)));
            }
            table = self.table_ptr(entry.base()).ok()?;
            current_level = current_level.child()?;
        }
    }
}

/// Number of 4K pages needed to hold `bytes` bytes.
pub fn pages_for(bytes: u64) -> u64 {
    bytes / PAGE_SIZE + if bytes % PAGE_SIZE != 0 { 1 } else { 0 }
}
