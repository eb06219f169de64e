//! Newtype wrappers that make it harder to accidentally confuse physical and virtual addresses.

use core::fmt;
use core::ops;

use super::align::Alignable;

/// A virtual address. It's validity depends on the current page mapping.
#[repr(C)]
#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Debug, Default, Hash)]
pub struct VirtAddr(pub u64);

/// A physical address. Whether it is accessible depends on the current page mapping.
#[repr(C)]
#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Debug, Default, Hash)]
pub struct PhysAddr(pub u64);

impl VirtAddr {
    /// Returns the address of the value behind the given pointer.
    pub fn from_ptr<T>(ptr: *const T) -> VirtAddr {
        VirtAddr(ptr as usize as u64)
    }

    pub unsafe fn as_ptr<T>(self) -> *const T {
        self.0 as usize as *const T
    }

    pub unsafe fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as usize as *mut T
    }
}

/// An address range of either physical or virtual memory locations.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct AddrRange<Addr> {
    pub start: Addr,
    pub length: u64,
}

pub type PhysAddrRange = AddrRange<PhysAddr>;

macro_rules! impl_addr_arith {
    ($addr:tt) => {
        impl $addr {
            /// Adds an offset, clamping at the top of the address space.
            pub const fn saturating_add(self, offset: u64) -> Self {
                $addr(self.0.saturating_add(offset))
            }

            /// Adds an offset, returning `None` if the result does not fit into 64 bits.
            pub const fn checked_add(self, offset: u64) -> Option<Self> {
                match self.0.checked_add(offset) {
                    Some(addr) => Some($addr(addr)),
                    None => None,
                }
            }
        }

        impl Alignable for $addr {
            type Alignment = u64;

            fn align_up(self, alignment: u64) -> Self {
                $addr(self.0.align_up(alignment))
            }

            fn align_down(self, alignment: u64) -> Self {
                $addr(self.0.align_down(alignment))
            }

            fn checked_align_up(self, alignment: u64) -> Option<Self> {
                self.0.checked_align_up(alignment).map($addr)
            }

            fn is_aligned(self, alignment: u64) -> bool {
                self.0.is_aligned(alignment)
            }
        }

        impl ops::Add<u64> for $addr {
            type Output = $addr;

            fn add(self, other: u64) -> Self::Output {
                $addr(self.0 + other)
            }
        }

        impl ops::AddAssign<u64> for $addr {
            fn add_assign(&mut self, other: u64) {
                self.0 += other;
            }
        }

        impl ops::Sub<u64> for $addr {
            type Output = $addr;

            fn sub(self, other: u64) -> Self::Output {
                $addr(self.0 - other)
            }
        }

        impl ops::Sub<$addr> for $addr {
            type Output = u64;

            fn sub(self, other: $addr) -> Self::Output {
                self.0 - other.0
            }
        }

        impl AddrRange<$addr> {
            pub const fn new(start: $addr, length: u64) -> Self {
                AddrRange { start, length }
            }

            /// The range between `start` (inclusive) and `end` (exclusive).
            /// Inverted bounds produce an empty range.
            pub fn from_bounds(start: $addr, end: $addr) -> Self {
                AddrRange {
                    start,
                    length: end.0.saturating_sub(start.0),
                }
            }

            /// First address after the range. Ranges reaching past the top of
            /// the address space are clamped.
            pub fn end(&self) -> $addr {
                self.start.saturating_add(self.length)
            }

            pub fn contains(&self, addr: $addr) -> bool {
                addr >= self.start && addr.0 - self.start.0 < self.length
            }

            pub fn is_empty(&self) -> bool {
                self.length == 0
            }
        }
    };
}

impl_addr_arith!(VirtAddr);
impl_addr_arith!(PhysAddr);

impl fmt::Pointer for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}_P", self.0)
    }
}

impl fmt::Pointer for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}_V", self.0)
    }
}
