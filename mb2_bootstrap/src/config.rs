//! Boot time configuration. Everything is fixed at compile time except for the
//! end of the bootstrapper image, which only the entry point knows.

use bare_metal::{PhysAddr, VirtAddr};
use log::LevelFilter;

/// Virtual address at which all physical memory is mapped.
pub const HHDM_BASE: VirtAddr = VirtAddr(0xFFFF_C000_0000_0000);

/// Module command line identifying the kernel image.
pub const KERNEL_LABEL: &str = "kernel";

/// Module command line identifying the initial filesystem.
pub const INITRAMFS_LABEL: &str = "initramfs";

#[cfg(feature = "verbose")]
pub const LOG_LEVEL: LevelFilter = LevelFilter::Trace;
#[cfg(not(feature = "verbose"))]
pub const LOG_LEVEL: LevelFilter = LevelFilter::Info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootConfig {
    pub hhdm_base: VirtAddr,
    pub kernel_label: &'static str,
    pub initramfs_label: &'static str,
    pub log_level: LevelFilter,
    /// Everything below this address belongs to the bootstrapper and is never
    /// handed out by the frame allocator.
    pub reserved_until: PhysAddr,
}

impl BootConfig {
    pub const DEFAULT: BootConfig = BootConfig {
        hhdm_base: HHDM_BASE,
        kernel_label: KERNEL_LABEL,
        initramfs_label: INITRAMFS_LABEL,
        log_level: LOG_LEVEL,
        reserved_until: PhysAddr(0),
    };

    pub const fn with_reserved_until(mut self, reserved_until: PhysAddr) -> Self {
        self.reserved_until = reserved_until;
        self
    }
}

impl Default for BootConfig {
    fn default() -> Self {
        BootConfig::DEFAULT
    }
}
