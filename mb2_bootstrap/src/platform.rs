//! The early frame allocator: a bump allocator over the available memory map
//! regions, with everything below the bootstrap watermark cut away.

use core::cmp;

use bare_metal::{PhysAddr, PhysAddrRange};
use kmem::physical::alloc::bump::BumpAllocator;
use kmem::physical::{PageFrame, PageFrameRegion};
use multiboot2::MemoryMapEntry;

use crate::pipeline::AllocatorState;

/// Whole page frames of the available memory map entries at or above a
/// reserved boundary. Entries do not need to be sorted.
///
/// The watermark alone does not protect the boot information, which the
/// bootloader may place anywhere. Its frames are cut out with `excluding`,
/// since it is still read after the allocator is up.
#[derive(Debug, Clone)]
pub struct AvailableRegions<I> {
    entries: I,
    first_free: PageFrame,
    excluded: PageFrameRegion,
    /// Rest of an entry above the excluded frames.
    pending: Option<PageFrameRegion>,
}

impl<I: Iterator<Item = MemoryMapEntry>> AvailableRegions<I> {
    pub fn new(entries: I, reserved_until: PhysAddr) -> Self {
        AvailableRegions {
            entries,
            first_free: PageFrame::next_above(reserved_until),
            excluded: PageFrameRegion { start: PageFrame(0), end: PageFrame(0) },
            pending: None,
        }
    }

    /// Never hand out the frames overlapping `range`.
    pub fn excluding(mut self, range: &PhysAddrRange) -> Self {
        if !range.is_empty() {
            self.excluded = PageFrameRegion::new_including(range);
        }
        self
    }

    fn next_entry(&mut self) -> Option<PageFrameRegion> {
        let first_free = self.first_free;
        self.entries
            .by_ref()
            .filter(|entry| entry.is_available())
            .map(|entry| {
                let mut region = PageFrameRegion::new_included_in(&entry.range());
                region.start = cmp::max(region.start, first_free);
                region
            })
            .find(|region| !region.is_empty())
    }
}

impl<I: Iterator<Item = MemoryMapEntry>> Iterator for AvailableRegions<I> {
    type Item = PageFrameRegion;

    fn next(&mut self) -> Option<PageFrameRegion> {
        loop {
            let region = match self.pending.take() {
                Some(region) => region,
                None => self.next_entry()?,
            };
            let excluded = &self.excluded;
            if excluded.is_empty() || region.end <= excluded.start || region.start >= excluded.end {
                return Some(region);
            }
            if region.end > excluded.end {
                self.pending = Some(PageFrameRegion { start: excluded.end, end: region.end });
            }
            if region.start < excluded.start {
                return Some(PageFrameRegion { start: region.start, end: excluded.start });
            }
        }
    }
}

pub type EarlyAllocator<I> = BumpAllocator<AvailableRegions<I>>;

/// A frame allocator handing out the available memory above `reserved_until`
/// apart from the frames of `boot_info`, or `None` if there is no such memory.
pub fn early_allocator<I>(entries: I, reserved_until: PhysAddr, boot_info: &PhysAddrRange) -> Option<EarlyAllocator<I>>
    where I: Iterator<Item = MemoryMapEntry>
{
    let regions = AvailableRegions::new(entries, reserved_until).excluding(boot_info);
    let mut allocator = BumpAllocator::new(regions);
    allocator.next_free_frame()?;
    Some(allocator)
}

impl<R: Iterator<Item = PageFrameRegion>> AllocatorState for BumpAllocator<R> {
    /// Physical address of the next free frame, zero once exhausted.
    fn state_word(&mut self) -> u64 {
        self.next_free_frame().map_or(0, |frame| frame.start_address().0)
    }
}
