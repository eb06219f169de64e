#![cfg_attr(not(test), no_std)]
//! Physical page frames, early frame allocation and x86_64 page tables.

pub mod paging;
pub mod physical;

/// Number of trailing zeros in a page aligned address.
pub const PAGE_ALIGN_BITS: u32 = 12;

/// Size of a normal physical page, 4096 bytes.
pub const PAGE_SIZE: u64 = 1 << PAGE_ALIGN_BITS;
