use bare_metal::{Alignable, PhysAddr, PhysAddrRange};
use core::ops;
use crate::{PAGE_SIZE, PAGE_ALIGN_BITS};

pub mod alloc;

/// Number of a physical page frame, counted from the start.
/// The first page frame at physical address 0x0 has number zero.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone)]
pub struct PageFrame(pub u64);

impl PageFrame {
    /// Return the next page frame starting at or above the given physical address.
    pub fn next_above(addr: PhysAddr) -> PageFrame {
        match addr.checked_align_up(PAGE_SIZE) {
            Some(aligned) => PageFrame(aligned.0 >> PAGE_ALIGN_BITS),
            // one past the last frame of the address space
            None => PageFrame(1 << (64 - PAGE_ALIGN_BITS)),
        }
    }

    /// Return the page frame including the given physical address.
    pub fn including(addr: PhysAddr) -> PageFrame {
        PageFrame(addr.align_down(PAGE_SIZE).0 >> PAGE_ALIGN_BITS)
    }

    pub fn start_address(&self) -> PhysAddr {
        PhysAddr(self.0 << PAGE_ALIGN_BITS)
    }

    /// First address after the frame. Clamped for the last frame of the address space.
    pub fn end_address(&self) -> PhysAddr {
        self.start_address().saturating_add(PAGE_SIZE)
    }
}

impl ops::Add<u64> for PageFrame {
    type Output = PageFrame;

    fn add(self, rhs: u64) -> PageFrame {
        PageFrame(self.0 + rhs)
    }
}

impl ops::AddAssign<u64> for PageFrame {
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}

impl ops::Sub<u64> for PageFrame {
    type Output = PageFrame;

    fn sub(self, rhs: u64) -> PageFrame {
        PageFrame(self.0 - rhs)
    }
}

/// A region of physical page frames.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PageFrameRegion {
    /// The first frame included in the region.
    pub start: PageFrame,
    /// The first frame after the region (not included).
    pub end: PageFrame,
}

impl PageFrameRegion {
    /// Construct the largest page frame region that is included in the given physical memory region.
    pub fn new_included_in(range: &PhysAddrRange) -> PageFrameRegion {
        PageFrameRegion {
            start: PageFrame::next_above(range.start),
            end: PageFrame::including(range.end()),
        }
    }

    /// Construct the smallest page frame region that is fully including the given physical memory region.
    pub fn new_including(range: &PhysAddrRange) -> PageFrameRegion {
        let end_base = range.end().0 >> PAGE_ALIGN_BITS;
        let end_offset = if range.end().0 & (PAGE_SIZE - 1) != 0 { 1 } else { 0 };
        PageFrameRegion {
            start: PageFrame::including(range.start),
            end: PageFrame(end_base + end_offset),
        }
    }

    pub fn length(&self) -> u64 {
        if self.start > self.end {
            0
        } else {
            self.end.0 - self.start.0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Whether the frame is part of the region.
    pub fn contains(&self, frame: PageFrame) -> bool {
        frame >= self.start && frame < self.end
    }

    /// The frames of the region in ascending order.
    pub fn frames(&self) -> impl Iterator<Item = PageFrame> + Clone {
        (self.start.0..self.end.0).map(PageFrame)
    }

    /// The physical memory covered by the region.
    pub fn range(&self) -> PhysAddrRange {
        PhysAddrRange::new(self.start.start_address(), self.length() << PAGE_ALIGN_BITS)
    }
}


#[cfg(test)]
mod test {
    use bare_metal::{PhysAddr, PhysAddrRange};
    use super::{PageFrame, PageFrameRegion};

    #[test]
    fn test_page_frame_region() {
        let a = PhysAddr(0x400F);
        let b = PhysAddr(0x4EF0);
        let c = PhysAddr(0x7FFF);

        let in_ab = PageFrameRegion::new_included_in(&PhysAddrRange::from_bounds(a, b));
        assert!(in_ab.is_empty(), "in_ab = {:?}", in_ab);

        let in_ac = PageFrameRegion::new_included_in(&PhysAddrRange::from_bounds(a, c));
        assert!(!in_ac.is_empty(), "in_ac = {:?}", in_ac);
        assert!(in_ac.length() == 2, "in_ac = {:?}", in_ac);
        assert!(in_ac.start.0 == 5 && in_ac.end.0 == 7, "in_ac = {:?}", in_ac);

        let around_ab = PageFrameRegion::new_including(&PhysAddrRange::from_bounds(a, b));
        assert!(!around_ab.is_empty(), "around_ab = {:?}", around_ab);
        assert!(around_ab.length() == 1, "around_ab = {:?}", around_ab);
        assert!(around_ab.start.0 == 4 && around_ab.end.0 == 5, "around_ab = {:?}", around_ab);

        let around_ac = PageFrameRegion::new_including(&PhysAddrRange::from_bounds(a, c));
        assert!(!around_ac.is_empty(), "around_ac = {:?}", around_ac);
        assert!(around_ac.length() == 4, "around_ac = {:?}", around_ac);
        assert!(around_ac.start.0 == 4 && around_ac.end.0 == 8, "around_ac = {:?}", around_ac);

        let whole_mem = PageFrameRegion::new_including(&PhysAddrRange::from_bounds(PhysAddr(0), PhysAddr(0xFFFFFFFFFFFFFFFF)));
        assert!(!whole_mem.is_empty());
        assert_eq!(whole_mem.length(), 0x0010_0000_0000_0000)
    }

    #[test]
    fn frames_of_region() {
        let region = PageFrameRegion::new_including(&PhysAddrRange::new(PhysAddr(0x1800), 0x2000));
        let frames: Vec<PageFrame> = region.frames().collect();
        assert_eq!(frames, vec![PageFrame(1), PageFrame(2), PageFrame(3)]);
        assert!(region.contains(PageFrame(3)));
        assert!(!region.contains(PageFrame(4)));
        assert_eq!(region.range(), PhysAddrRange::new(PhysAddr(0x1000), 0x3000));
    }

    #[test]
    fn frame_addresses_at_the_top() {
        assert_eq!(PageFrame::next_above(PhysAddr(0x1001)), PageFrame(2));
        assert_eq!(PageFrame::next_above(PhysAddr(0x2000)), PageFrame(2));
        assert_eq!(PageFrame::next_above(PhysAddr(u64::MAX)), PageFrame(0x0010_0000_0000_0000));

        let last = PageFrame::including(PhysAddr(u64::MAX));
        assert_eq!(last.start_address(), PhysAddr(0xFFFF_FFFF_FFFF_F000));
        assert_eq!(last.end_address(), PhysAddr(u64::MAX));
    }
}
