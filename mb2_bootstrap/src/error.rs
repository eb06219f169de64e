use core::fmt;

use bare_metal::{PhysAddr, VirtAddr};
use kmem::paging::MapError;
use multiboot2::InfoError;

use crate::pipeline::Stage;

/// Everything that makes booting impossible. None of these can be recovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    /// The boot information header is unusable.
    BootInformation(InfoError),
    /// The bootloader did not provide a memory map.
    NoMemoryMap,
    /// No usable memory is left above the reserved area.
    AllocatorInit { reserved_until: PhysAddr },
    /// A contiguous allocation of `pages` pages failed.
    OutOfMemory { pages: u64 },
    /// Freshly allocated memory is outside the physical memory window.
    NotAccessible { paddr: PhysAddr },
    /// Inserting a page into the direct map failed.
    Mapping { vaddr: VirtAddr, paddr: PhysAddr, error: MapError },
    /// The physical address is too high to be placed in the direct map.
    HhdmOverflow { paddr: PhysAddr },
}

impl BootError {
    /// The pipeline stage in which the error arises.
    pub fn stage(&self) -> Stage {
        match self {
            BootError::BootInformation(_) => Stage::TagPass,
            BootError::NoMemoryMap | BootError::AllocatorInit { .. } => Stage::AllocatorInit,
            BootError::OutOfMemory { .. } | BootError::NotAccessible { .. } => Stage::MapNormalization,
            BootError::Mapping { .. } | BootError::HhdmOverflow { .. } => Stage::DirectMapConstruction,
        }
    }
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            BootError::BootInformation(err) => write!(f, "invalid boot information: {}", err),
            BootError::NoMemoryMap => write!(f, "no memory map provided by the bootloader"),
            BootError::AllocatorInit { reserved_until } =>
                write!(f, "no usable memory above {:p}", reserved_until),
            BootError::OutOfMemory { pages } => write!(f, "cannot allocate {} contiguous pages", pages),
            BootError::NotAccessible { paddr } => write!(f, "memory at {:p} is not accessible", paddr),
            BootError::Mapping { vaddr, paddr, error } =>
                write!(f, "mapping {:p} -> {:p} failed: {}", vaddr, paddr, error),
            BootError::HhdmOverflow { paddr } =>
                write!(f, "{:p} lies beyond the end of the direct map", paddr),
        }
    }
}
