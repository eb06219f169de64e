//! A bump memory allocator that is meant for the early system startup.
//! Memory allocated with it can not be freed, so it should only be used
//! for data that has to live for the whole up time, or that can be reclaimed
//! via different means later.

use crate::physical::{PageFrame, PageFrameRegion};
use super::PageFrameAllocator;

/// A simple page frame allocator that bumps the frame number for each allocation.
/// It does not support freeing. It is parameterized over an iterator yielding
/// memory regions available for allocation. Memory that must not be handed out
/// has to be excluded from the regions up front.
pub struct BumpAllocator<R> {
    /// Current memory region that is up for allocation. Allocations start at the bottom.
    current_region: Option<PageFrameRegion>,
    /// The regions after the current one.
    regions: R,
}

impl<R> BumpAllocator<R> where
    R: Iterator<Item=PageFrameRegion>
{
    pub fn new(mut regions: R) -> Self {
        let first_region = regions.next();
        BumpAllocator {
            current_region: first_region,
            regions,
        }
    }

    /// The frame the next single-frame allocation would hand out, or `None` if
    /// the allocator is exhausted.
    pub fn next_free_frame(&mut self) -> Option<PageFrame> {
        // find first region that is not empty, including the current one
        self.current_region = self.current_region
            .iter().cloned()
            .chain(&mut self.regions)
            .find(|r| !r.is_empty());
        self.current_region.as_ref().map(|r| r.start)
    }
}


impl<R> PageFrameAllocator for BumpAllocator<R> where
    R: Iterator<Item=PageFrameRegion>
{
    fn alloc(&mut self) -> Option<PageFrame> {
        self.alloc_region(1).map(|region| region.start)
    }

    /// The remainder of every region that is too small for the request is given
    /// up, so mixing large and small allocations wastes memory.
    fn alloc_region(&mut self, page_count: u64) -> Option<PageFrameRegion> {
        if page_count == 0 {
            return None;
        }
        // find first region that is large enough, including the current one
        self.current_region = self.current_region
            .iter().cloned()
            .chain(&mut self.regions)
            .find(|r| r.length() >= page_count);

        let region = self.current_region.as_mut()?;
        let start = region.start;
        region.start += page_count;
        Some(PageFrameRegion { start, end: region.start })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn region(start: u64, end: u64) -> PageFrameRegion {
        PageFrameRegion { start: PageFrame(start), end: PageFrame(end) }
    }

    #[test]
    fn allocates_in_ascending_order() {
        let mut pfa = BumpAllocator::new(vec![region(1, 3), region(10, 12)].into_iter());
        assert_eq!(pfa.alloc(), Some(PageFrame(1)));
        assert_eq!(pfa.alloc(), Some(PageFrame(2)));
        assert_eq!(pfa.next_free_frame(), Some(PageFrame(10)));
        assert_eq!(pfa.alloc(), Some(PageFrame(10)));
        assert_eq!(pfa.alloc(), Some(PageFrame(11)));
        assert_eq!(pfa.alloc(), None);
        assert_eq!(pfa.next_free_frame(), None);
    }

    #[test]
    fn contiguous_regions() {
        let mut pfa = BumpAllocator::new(vec![region(1, 3), region(10, 20)].into_iter());
        assert_eq!(pfa.alloc_region(4), Some(region(10, 14)));
        // the rest of the first region was given up
        assert_eq!(pfa.alloc(), Some(PageFrame(14)));
        assert_eq!(pfa.alloc_region(5), Some(region(15, 20)));
        assert_eq!(pfa.alloc_region(1), None);
        assert_eq!(pfa.alloc_region(0), None);
    }
}
