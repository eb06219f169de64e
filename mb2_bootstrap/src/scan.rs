//! The single pass over the tag stream.

use bare_metal::{PhysAddr, VirtAddr};
use log::{debug, info, warn};
use multiboot2::{AcpiTag, BasicMemInfoTag, BootInformation, FramebufferTag, Tag};

use crate::config::BootConfig;
use crate::memmap::DeferredMemoryMap;
use crate::modules::{ModuleRef, ModuleResolver};

/// Everything learned from the tag stream.
#[derive(Debug, Clone)]
pub struct ScanResult<'a> {
    /// The memory map, not yet normalized.
    pub memory_map: Option<DeferredMemoryMap<'a>>,
    /// End of the highest memory map entry, zero without a memory map.
    pub highest_address: PhysAddr,
    pub kernel: Option<ModuleRef>,
    pub initramfs: Option<ModuleRef>,
    /// End of the bootstrapper image and all modules.
    pub bootstrap_end: PhysAddr,
    /// Address of the RSDP copy, the ACPI 2.0 one if present.
    pub rsdp: Option<VirtAddr>,
    pub framebuffer: Option<FramebufferTag<'a>>,
    pub bootloader_name: Option<&'a str>,
    pub command_line: Option<&'a str>,
    pub basic_meminfo: Option<BasicMemInfoTag>,
    pub load_base: Option<PhysAddr>,
}

pub struct ScanPass<'c> {
    config: &'c BootConfig,
}

impl<'c> ScanPass<'c> {
    pub fn new(config: &'c BootConfig) -> Self {
        ScanPass { config }
    }

    pub fn run<'a>(&self, info: &BootInformation<'a>) -> ScanResult<'a> {
        let mut modules = ModuleResolver::new(
            self.config.kernel_label, self.config.initramfs_label, self.config.reserved_until,
        );
        let mut memory_map = None;
        let mut acpi_old = None;
        let mut acpi_new = None;
        let mut framebuffer = None;
        let mut bootloader_name = None;
        let mut command_line = None;
        let mut basic_meminfo = None;
        let mut load_base = None;

        for tag in info.tags() {
            match tag {
                Tag::Module(module) => modules.resolve(&module),
                Tag::MemoryMap(mmap) => {
                    if memory_map.is_some() {
                        warn!("[scan] ignoring additional memory map");
                    } else {
                        memory_map = Some(DeferredMemoryMap::new(mmap));
                    }
                }
                Tag::CommandLine(cmd_line) => command_line = cmd_line.as_str(),
                Tag::BootLoaderName(name) => bootloader_name = name.as_str(),
                Tag::BasicMemInfo(meminfo) => basic_meminfo = Some(meminfo),
                Tag::Framebuffer(fb) => framebuffer = Some(fb),
                Tag::AcpiOld(acpi) => acpi_old = Some(acpi),
                Tag::AcpiNew(acpi) => acpi_new = Some(acpi),
                Tag::LoadBaseAddr(base) => load_base = Some(base.load_base_addr),
                Tag::Other(raw) => debug!("[scan] skipping tag type {} ({} bytes)", raw.tag_type().0, raw.size()),
            }
        }

        if let Some(name) = bootloader_name {
            info!("[scan] booted by {}", name);
        }
        if let Some(cmd_line) = command_line {
            info!("[scan] command line: {}", cmd_line);
        }
        if let Some(meminfo) = basic_meminfo {
            info!("[scan] lower memory {} KiB, upper memory {} KiB", meminfo.mem_lower, meminfo.mem_upper);
        }
        if let Some(base) = load_base {
            info!("[scan] image loaded at {:p}", base);
        }

        let highest_address = match memory_map {
            Some(ref mmap) => mmap.scan(),
            None => PhysAddr(0),
        };

        ScanResult {
            memory_map,
            highest_address,
            kernel: modules.kernel(),
            initramfs: modules.initramfs(),
            bootstrap_end: modules.bootstrap_end(),
            rsdp: acpi_new.or(acpi_old).map(check_rsdp),
            framebuffer,
            bootloader_name,
            command_line,
            basic_meminfo,
            load_base,
        }
    }
}

/// The RSDP is passed on as is, a broken one is only reported.
fn check_rsdp(acpi: AcpiTag<'_>) -> VirtAddr {
    if !acpi.has_valid_signature() {
        warn!("[scan] RSDP at {:p} has an invalid signature", acpi.rsdp_addr());
    } else if !acpi.checksum_valid() {
        warn!("[scan] RSDP at {:p} has an invalid checksum", acpi.rsdp_addr());
    } else {
        info!("[scan] RSDP revision {} from {:?}", acpi.revision(), acpi.oem_id());
    }
    acpi.rsdp_addr()
}
