use bare_metal::PhysAddr;
use bitflags::bitflags;
use static_assertions::assert_eq_size;

/// An entry in a page table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct PageTableEntry(u64);

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Flags : u64 {
        const PRESENT    = 1 << 0;
        const WRITABLE   = 1 << 1;
        const USER       = 1 << 2;
        const PWT        = 1 << 3;
        const PCD        = 1 << 4;
        const ACCESSED   = 1 << 5;
        const DIRTY      = 1 << 6;
        // in a PTE, this is the PAT (page attribute table) bit
        // Must be zero in PML4.
        const SIZE       = 1 << 7;
        const GLOBAL     = 1 << 8;
        // faults unless EFER.NXE is set
        const NO_EXECUTE = 1 << 63;
    }
}

impl PageTableEntry {
    // mask for valid physical base addresses
    const ADDR_MASK: u64 = 0x000F_FFFF_FFFF_F000;

    pub const fn new() -> Self {
        PageTableEntry(0)
    }

    pub fn flags(&self) -> Flags {
        Flags::from_bits_truncate(self.0)
    }

    pub fn set_flags(&mut self, flags: Flags) {
        self.0 = (self.0 & !Flags::all().bits()) | flags.bits();
    }

    pub fn is_present(&self) -> bool {
        self.flags().contains(Flags::PRESENT)
    }

    /// Whether the entry maps a page directly instead of pointing to a table.
    pub fn is_huge(&self) -> bool {
        self.flags().contains(Flags::SIZE)
    }

    /// Return the physical page address of the page or page table pointed to by this entry.
    pub fn base(&self) -> PhysAddr {
        PhysAddr(self.0 & Self::ADDR_MASK)
    }

    /// Set the physical base address in this entry.
    /// The address is aligned downwards if necessary.
    pub fn set_base(&mut self, addr: PhysAddr) {
        self.0 = (self.0 & !Self::ADDR_MASK) | (addr.0 & Self::ADDR_MASK);
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Number of entries in a page table of any level.
pub const ENTRY_COUNT: usize = 512;

/// A page table of any level, occupying exactly one page frame.
#[derive(Clone)]
#[repr(C, align(4096))]
pub struct PageTable {
    pub entries: [PageTableEntry; ENTRY_COUNT],
}

impl PageTable {
    pub const fn new() -> Self {
        PageTable { entries: [PageTableEntry::new(); ENTRY_COUNT] }
    }

    pub fn clear(&mut self) {
        self.entries.iter_mut().for_each(|e| *e = PageTableEntry::new());
    }
}

assert_eq_size!(PageTableEntry, u64);
assert_eq_size!(PageTable, [u8; 4096]);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn page_table_entry_accessors() {
        let mut pte = PageTableEntry::new();

        let flags = Flags::PRESENT | Flags::SIZE | Flags::USER | Flags::NO_EXECUTE;
        let addr = PhysAddr(0x0008_0F7A_BA02_1000);

        pte.set_flags(flags);
        pte.set_base(addr);

        assert_eq!(pte.flags(), flags, "flag roundtrip failed");
        assert_eq!(pte.base(), addr, "addr roundtrip failed");
        assert!(pte.is_present() && pte.is_huge());

        // set fields in a different order now
        let flags = Flags::PRESENT | Flags::WRITABLE;
        pte.set_base(PhysAddr(0x5000));
        pte.set_flags(flags);

        assert_eq!(pte.flags(), flags, "flag roundtrip failed");
        assert_eq!(pte.base(), PhysAddr(0x5000), "addr roundtrip failed");
        assert_eq!(pte.raw(), 0x5003);
    }

    #[test]
    fn unaligned_base_is_truncated() {
        let mut pte = PageTableEntry::new();
        pte.set_base(PhysAddr(0x1234_5678));
        assert_eq!(pte.base(), PhysAddr(0x1234_5000));
        assert_eq!(pte.flags(), Flags::empty());
    }
}
