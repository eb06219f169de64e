//! The record handed to the kernel. Its layout is shared with code outside of
//! Rust, so it only consists of 64 bit words.

use bare_metal::{PhysAddr, VirtAddr};
use kmem::paging::DirectMapping;
use static_assertions::assert_eq_size;

/// Protocol identifier for boots through a Multiboot2 loader (the magic value
/// the loader passes in `eax`).
pub const BOOT_PROTOCOL_MULTIBOOT2: u64 = 0x36D7_6289;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootMetadata {
    pub boot_protocol: u64,
    /// Physical address of the boot information.
    pub boot_info: u64,
    /// Opaque state of the page frame allocator, for the kernel to take over.
    pub pmm_state: u64,
    /// End of the highest memory map entry.
    pub highest_address: u64,
    pub kernel_elf: u64,
    pub kernel_size: u64,
    pub initramfs: u64,
    pub initramfs_size: u64,
    hhdm_vaddr: u64,
    /// Physical address of the normalized memory map.
    pub memory_map: u64,
    pub memory_map_len: u64,
    /// Physical address of the RSDP copy inside the boot information.
    pub rsdp: u64,
    /// Physical address of the framebuffer tag inside the boot information.
    pub framebuffer: u64,
    /// End of the memory occupied by the bootstrapper and the boot modules.
    pub bootstrap_end: u64,
}

assert_eq_size!(BootMetadata, [u64; 14]);

impl BootMetadata {
    pub const fn new(hhdm_vaddr: VirtAddr) -> Self {
        BootMetadata {
            boot_protocol: BOOT_PROTOCOL_MULTIBOOT2,
            boot_info: 0,
            pmm_state: 0,
            highest_address: 0,
            kernel_elf: 0,
            kernel_size: 0,
            initramfs: 0,
            initramfs_size: 0,
            hhdm_vaddr: hhdm_vaddr.0,
            memory_map: 0,
            memory_map_len: 0,
            rsdp: 0,
            framebuffer: 0,
            bootstrap_end: 0,
        }
    }

    /// Virtual address at which physical address zero is mapped.
    pub fn hhdm_vaddr(&self) -> VirtAddr {
        VirtAddr(self.hhdm_vaddr)
    }

    /// Translation between physical memory and the direct map.
    pub fn direct_mapping(&self) -> DirectMapping {
        DirectMapping::new(self.hhdm_vaddr(), PhysAddr(0), self.highest_address)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use core::mem;

    #[test]
    fn layout() {
        assert_eq!(mem::size_of::<BootMetadata>(), 112);
        assert_eq!(mem::align_of::<BootMetadata>(), 8);
    }

    #[test]
    fn direct_mapping_roundtrip() {
        let mut metadata = BootMetadata::new(VirtAddr(0xFFFF_C000_0000_0000));
        metadata.highest_address = 0x100000 + 0x7EE0000;
        let dm = metadata.direct_mapping();
        for p in [0, 0x1000, 0xB8000, 0x7FD_F000, metadata.highest_address - 1] {
            let p = PhysAddr(p);
            let v = dm.phys_to_virt(p).unwrap();
            assert_eq!(v, VirtAddr(0xFFFF_C000_0000_0000 + p.0));
            assert_eq!(dm.virt_to_phys(v), Some(p));
        }
        assert_eq!(dm.phys_to_virt(PhysAddr(metadata.highest_address)), None);
    }
}
