//! The bare-metal entry point. The assembly stub calls `mb2_bootstrap_main` in
//! long mode, with the low physical memory identity mapped and a fresh PML4.

use core::panic::PanicInfo;
use core::ptr;

use bare_metal::{PhysAddr, PhysAddrRange, VirtAddr};
use kmem::paging::{DirectMapping, MappedPageTable};
use log::{error, info, warn};
use multiboot2::{BootInformation, MemoryMapEntries, MemoryMapTag};
use spin::Once;

use crate::abort::{abort_boot, halt};
use crate::config::BootConfig;
use crate::error::BootError;
use crate::metadata::BootMetadata;
use crate::pipeline::{Bootstrap, Platform};
use crate::platform::{early_allocator, EarlyAllocator};

extern "C" {
    fn bootstrap_set_framebuffer(addr: u64, width: u32, height: u32, pitch: u32);
    fn bootstrap_handoff(metadata: &BootMetadata) -> !;

    /// Defined by the linker script, right after the last section of the image.
    static __BOOTSTRAP_END__: u8;
}

static METADATA: Once<BootMetadata> = Once::new();

/// Physical memory is reached through the identity mapping set up by the stub.
struct IdentityPlatform {
    space: MappedPageTable,
    boot_info: PhysAddrRange,
}

impl Platform<'static> for IdentityPlatform {
    type Allocator = EarlyAllocator<MemoryMapEntries<'static>>;
    type AddressSpace = MappedPageTable;

    fn init_allocator(
        &mut self, memory_map: &MemoryMapTag<'static>, reserved_until: PhysAddr,
    ) -> Option<Self::Allocator> {
        early_allocator(memory_map.entries(), reserved_until, &self.boot_info)
    }

    fn address_space(&mut self) -> &mut MappedPageTable {
        &mut self.space
    }

    fn physical_window(&self) -> DirectMapping {
        DirectMapping::identity()
    }

    fn set_framebuffer(&mut self, addr: PhysAddr, width: u32, height: u32, pitch: u32) {
        unsafe { bootstrap_set_framebuffer(addr.0, width, height, pitch) }
    }
}

#[no_mangle]
pub extern "C" fn mb2_bootstrap_main(mbi_phys: u64, pml4_phys: u64) -> ! {
    let image_end = PhysAddr(unsafe { ptr::addr_of!(__BOOTSTRAP_END__) } as u64);
    let config = BootConfig::DEFAULT.with_reserved_until(image_end);

    if crate::logger::init(config.log_level).is_err() {
        warn!("[boot] logger was already installed");
    }
    info!("[boot] boot information at {:#x}, image ends at {:p}", mbi_phys, image_end);

    let info = unsafe { BootInformation::from_addr(VirtAddr(mbi_phys)) }
        .unwrap_or_else(|err| abort_boot(&BootError::BootInformation(err)));
    let space = unsafe { MappedPageTable::new(PhysAddr(pml4_phys), DirectMapping::identity()) };
    let boot_info = PhysAddrRange::new(PhysAddr(mbi_phys), info.total_size() as u64);

    let mut bootstrap = Bootstrap::new(&config, IdentityPlatform { space, boot_info });
    match bootstrap.run(info) {
        Ok(metadata) => {
            let metadata = METADATA.call_once(|| metadata);
            info!("[boot] handing off to the kernel at {:#x}", metadata.kernel_elf);
            unsafe { bootstrap_handoff(metadata) }
        }
        Err(err) => abort_boot(&err),
    }
}

#[cfg(not(test))]
#[panic_handler]
fn panic(panic_info: &PanicInfo) -> ! {
    // the panic may have happened while logging
    unsafe { crate::logger::force_unlock() };
    error!("[boot] {}", panic_info);
    halt()
}
