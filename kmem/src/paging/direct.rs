use bare_metal::{PhysAddr, VirtAddr};

/// Implements translation of physical to virtual addresses for a direct mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectMapping {
    virtual_base: VirtAddr,
    physical_base: PhysAddr,
    size_in_bytes: u64,
}

impl DirectMapping {
    pub const fn new(virtual_base: VirtAddr, physical_base: PhysAddr, size_in_bytes: u64) -> Self {
        DirectMapping {
            virtual_base,
            physical_base,
            size_in_bytes,
        }
    }

    /// The whole physical address space, accessible at the same virtual addresses.
    pub const fn identity() -> Self {
        DirectMapping::new(VirtAddr(0), PhysAddr(0), u64::MAX)
    }

    /// The start of the virtual address range of this mapping, mapped to `self.physical_base()`.
    pub fn virtual_base(&self) -> VirtAddr {
        self.virtual_base
    }

    /// The start of the physical address range of this mapping.
    pub fn physical_base(&self) -> PhysAddr {
        self.physical_base
    }

    /// The size of the mapped range in bytes.
    pub fn size_in_bytes(&self) -> u64 {
        self.size_in_bytes
    }

    /// Returns whether the given physical address is part of this mapping.
    pub fn contains_phys(&self, phys_addr: PhysAddr) -> bool {
        phys_addr >= self.physical_base && phys_addr.0 - self.physical_base.0 < self.size_in_bytes
    }

    /// Returns whether the given virtual address is part of this mapping.
    pub fn contains_virt(&self, virt_addr: VirtAddr) -> bool {
        virt_addr >= self.virtual_base && virt_addr.0 - self.virtual_base.0 < self.size_in_bytes
    }

    /// Translates a physical to a virtual address using the direct mapping.
    /// Returns `None` if the address lies outside the mapping.
    pub fn phys_to_virt(&self, phys_addr: PhysAddr) -> Option<VirtAddr> {
        if !self.contains_phys(phys_addr) {
            return None;
        }
        self.virtual_base.checked_add(phys_addr.0 - self.physical_base.0)
    }

    /// Translates a virtual to a physical address using the direct mapping.
    /// Returns `None` if the address lies outside the mapping.
    pub fn virt_to_phys(&self, virt_addr: VirtAddr) -> Option<PhysAddr> {
        if !self.contains_virt(virt_addr) {
            return None;
        }
        self.physical_base.checked_add(virt_addr.0 - self.virtual_base.0)
    }
}


#[cfg(test)]
mod tests {
    use bare_metal::{PhysAddr, VirtAddr};
    use super::*;

    #[test]
    fn direct_mapping_roundtrips() {
        let low_phys = PhysAddr(0x0000000000001000);
        let low_virt = VirtAddr(0xFFFFFFFF00000000);
        let size = 4096 * 10000;
        let high_phys = low_phys + size;
        let dm = DirectMapping::new(low_virt, low_phys, size);

        let roundtrip = |p: PhysAddr| dm.phys_to_virt(p).and_then(|v| dm.virt_to_phys(v));

        // test something in between
        let test_phys = PhysAddr(0x4000);
        assert!(dm.contains_phys(test_phys));
        assert_eq!(roundtrip(test_phys), Some(test_phys));

        // test edge cases
        assert!(dm.contains_phys(low_phys));
        assert_eq!(roundtrip(low_phys), Some(low_phys));
        assert!(dm.contains_phys(high_phys - 1));
        assert_eq!(roundtrip(high_phys - 1), Some(high_phys - 1));

        // just outside
        assert!(!dm.contains_phys(low_phys - 1));
        assert!(!dm.contains_phys(high_phys));
        assert_eq!(dm.phys_to_virt(high_phys), None);
        assert_eq!(dm.virt_to_phys(low_virt - 1), None);
    }

    #[test]
    fn higher_half_window() {
        let hhdm = DirectMapping::new(VirtAddr(0xFFFF_C000_0000_0000), PhysAddr(0), 0x8000_0000);
        assert_eq!(hhdm.phys_to_virt(PhysAddr(0x20_1000)), Some(VirtAddr(0xFFFF_C000_0020_1000)));
        assert_eq!(hhdm.virt_to_phys(VirtAddr(0xFFFF_C000_7FFF_FFFF)), Some(PhysAddr(0x7FFF_FFFF)));
        assert_eq!(hhdm.virt_to_phys(VirtAddr(0xFFFF_C000_8000_0000)), None);
    }

    #[test]
    fn identity_window() {
        let id = DirectMapping::identity();
        assert_eq!(id.phys_to_virt(PhysAddr(0xB8000)), Some(VirtAddr(0xB8000)));
        assert_eq!(id.virt_to_phys(VirtAddr(0xFFFF_FFFF_FFFF_F000)), Some(PhysAddr(0xFFFF_FFFF_FFFF_F000)));
    }
}
