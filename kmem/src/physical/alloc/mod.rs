use crate::physical::{PageFrame, PageFrameRegion};

pub mod bump;

/// Generic interface for a page frame allocator.
pub trait PageFrameAllocator {
    /// Allocate a single page frame.
    fn alloc(&mut self) -> Option<PageFrame>;

    /// Allocate a consecutive region of `page_count` physical page frames.
    fn alloc_region(&mut self, page_count: u64) -> Option<PageFrameRegion>;
}
