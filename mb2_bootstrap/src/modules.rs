//! Identification of the boot modules by their command line.

use bare_metal::PhysAddr;
use log::{info, warn};
use multiboot2::ModuleTag;

/// Physical location of a boot module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleRef {
    pub base: PhysAddr,
    pub len: u64,
}

/// Picks the kernel image and the initial filesystem out of the module tags and
/// tracks the end of all memory occupied by modules.
///
/// The watermark only covers the end of the highest module. Modules are
/// expected to follow the bootstrapper image closely, memory below the
/// watermark that is not part of any module is never handed out either.
/// The boot information itself is not covered and may lie above the
/// watermark; the frame allocator has to exclude it separately
/// (`AvailableRegions::excluding`).
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    kernel_label: &'static str,
    initramfs_label: &'static str,
    kernel: Option<ModuleRef>,
    initramfs: Option<ModuleRef>,
    bootstrap_end: PhysAddr,
}

impl ModuleResolver {
    pub fn new(kernel_label: &'static str, initramfs_label: &'static str, reserved_until: PhysAddr) -> Self {
        ModuleResolver {
            kernel_label,
            initramfs_label,
            kernel: None,
            initramfs: None,
            bootstrap_end: reserved_until,
        }
    }

    pub fn resolve(&mut self, module: &ModuleTag<'_>) {
        let range = module.range();
        let found = ModuleRef { base: range.start, len: range.length };

        let slot = if module.has_label(self.kernel_label) {
            Some(&mut self.kernel)
        } else if module.has_label(self.initramfs_label) {
            Some(&mut self.initramfs)
        } else {
            None
        };
        match slot {
            Some(slot) => {
                if let Some(previous) = slot.replace(found) {
                    warn!("[modules] duplicate module {:?}, replacing {:p}", module.cmd_line(), previous.base);
                }
                info!("[modules] {:?} at {:p}, {} bytes", module.cmd_line(), found.base, found.len);
            }
            None => info!("[modules] ignoring module {:?} at {:p}", module.cmd_line(), found.base),
        }

        if module.mod_end() > self.bootstrap_end {
            self.bootstrap_end = module.mod_end();
        }
    }

    pub fn kernel(&self) -> Option<ModuleRef> {
        self.kernel
    }

    pub fn initramfs(&self) -> Option<ModuleRef> {
        self.initramfs
    }

    /// The highest address occupied by the bootstrapper or any module.
    pub fn bootstrap_end(&self) -> PhysAddr {
        self.bootstrap_end
    }
}
