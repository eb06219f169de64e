//! Construction of the higher half direct map (HHDM).

use bare_metal::{PhysAddr, VirtAddr};
use kmem::paging::{AddressSpace, Flags, Level, MapError};
use kmem::physical::alloc::PageFrameAllocator;
use kmem::physical::PageFrameRegion;
use log::{debug, info};

use crate::error::BootError;
use crate::memmap::NormalizedRegion;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectMapStats {
    /// Pages inserted into the address space.
    pub pages_mapped: u64,
    /// Pages that were already mapped to the right frame.
    pub pages_skipped: u64,
}

/// Maps every frame of every memory region at `hhdm_base + physical address`.
pub struct DirectMapBuilder {
    hhdm_base: VirtAddr,
}

impl DirectMapBuilder {
    pub fn new(hhdm_base: VirtAddr) -> Self {
        DirectMapBuilder { hhdm_base }
    }

    /// Virtual address of `paddr` in the direct map.
    pub fn virt_addr(&self, paddr: PhysAddr) -> Result<VirtAddr, BootError> {
        self.hhdm_base.checked_add(paddr.0).ok_or(BootError::HhdmOverflow { paddr })
    }

    /// Map all regions, regardless of their class. Stops at the first failure.
    pub fn build<A: AddressSpace + ?Sized>(
        &self, regions: &[NormalizedRegion], space: &mut A, pfa: &mut dyn PageFrameAllocator,
    ) -> Result<DirectMapStats, BootError> {
        let mut stats = DirectMapStats::default();
        let mut previous: Option<PageFrameRegion> = None;

        for region in regions.iter().filter(|r| r.len > 0) {
            let frames = PageFrameRegion::new_including(&region.range());
            debug!(
                "[hhdm] {:p} + {:#x} ({}), {} frames",
                region.base, region.len, region.class.name(), frames.length()
            );
            for frame in frames.frames() {
                // boundary frame shared with the preceding region
                if previous.as_ref().map_or(false, |p| p.contains(frame)) {
                    stats.pages_skipped += 1;
                    continue;
                }
                let paddr = frame.start_address();
                let vaddr = self.virt_addr(paddr)?;
                match space.map(vaddr, paddr, Level::PT, Flags::WRITABLE, pfa) {
                    Ok(()) => stats.pages_mapped += 1,
                    // overlapping regions may have mapped the frame already
                    Err(MapError::MappingExists) if space.resolve(vaddr) == Some(paddr) =>
                        stats.pages_skipped += 1,
                    Err(error) => return Err(BootError::Mapping { vaddr, paddr, error }),
                }
            }
            previous = Some(frames);
        }

        info!(
            "[hhdm] {} pages mapped at {:p}, {} skipped",
            stats.pages_mapped, self.hhdm_base, stats.pages_skipped
        );
        Ok(stats)
    }
}
