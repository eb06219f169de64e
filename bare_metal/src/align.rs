/// Something (usually addresses or sizes) that is alignable to a certain alignment
/// represented in the same type and usually a power of two.
pub trait Alignable {
    type Alignment;

    /// Return the smallest `x` that is a multiple of `alignment` such that `x >= num`.
    fn align_up(self, alignment: Self::Alignment) -> Self;

    /// Return the largest `x` that is a multiple of `alignment` such that `x <= num`.
    fn align_down(self, alignment: Self::Alignment) -> Self;

    /// Like `align_up`, but returns `None` instead of wrapping around.
    fn checked_align_up(self, alignment: Self::Alignment) -> Option<Self> where Self: Sized;

    /// Return whether the value is a multiple of `alignment`.
    fn is_aligned(self, alignment: Self::Alignment) -> bool;
}

macro_rules! align_impl {
    ($numtype:ty) => {
        impl Alignable for $numtype {
            type Alignment = $numtype;

            fn align_up(self, alignment: Self) -> Self {
                if alignment == 0 {
                    self
                } else {
                    let mask = alignment - 1;
                    assert!(alignment & mask == 0, "alignment must be power of two");
                    let padding = alignment - (self & mask);
                    self.wrapping_add(padding & mask)
                }
            }

            fn align_down(self, alignment: Self) -> Self {
                if alignment == 0 {
                    self
                } else {
                    let mask = alignment - 1;
                    assert!(alignment & mask == 0, "alignment must be power of two");
                    self - (self & mask)
                }
            }

            fn checked_align_up(self, alignment: Self) -> Option<Self> {
                if alignment == 0 {
                    Some(self)
                } else {
                    let mask = alignment - 1;
                    assert!(alignment & mask == 0, "alignment must be power of two");
                    let padding = alignment - (self & mask);
                    self.checked_add(padding & mask)
                }
            }

            fn is_aligned(self, alignment: Self) -> bool {
                self.align_down(alignment) == self
            }
        }
    };
}

align_impl!(u8);
align_impl!(u16);
align_impl!(u32);
align_impl!(u64);
align_impl!(usize);
