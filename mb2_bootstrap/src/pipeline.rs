//! The boot pipeline: scan the tag stream, bring up the frame allocator,
//! normalize the memory map and build the direct map, in that order.

use bare_metal::{PhysAddr, VirtAddr};
use kmem::paging::{AddressSpace, DirectMapping};
use kmem::physical::alloc::PageFrameAllocator;
use log::info;
use multiboot2::{BootInformation, MemoryMapTag};

use crate::config::BootConfig;
use crate::direct_map::DirectMapBuilder;
use crate::error::BootError;
use crate::metadata::BootMetadata;
use crate::scan::ScanPass;

/// Progress of the pipeline. Stages are only ever entered in declaration order,
/// `Halted` can follow any stage but `Finalized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Start,
    TagPass,
    AllocatorInit,
    MapNormalization,
    DirectMapConstruction,
    Finalized,
    Halted,
}

/// Exposes allocator internals the kernel needs to take over from the bootstrapper.
pub trait AllocatorState {
    /// An opaque word stored in the boot metadata.
    fn state_word(&mut self) -> u64;
}

/// The services the pipeline depends on, for boot information living for `'a`.
pub trait Platform<'a> {
    type Allocator: PageFrameAllocator + AllocatorState;
    type AddressSpace: AddressSpace;

    /// Set up a frame allocator over the available memory of `memory_map` that
    /// never hands out memory below `reserved_until`, nor the frames holding
    /// the boot information. `None` if no memory is left.
    fn init_allocator(&mut self, memory_map: &MemoryMapTag<'a>, reserved_until: PhysAddr) -> Option<Self::Allocator>;

    /// The address space receiving the direct map.
    fn address_space(&mut self) -> &mut Self::AddressSpace;

    /// How the bootstrapper itself reaches physical memory.
    fn physical_window(&self) -> DirectMapping;

    fn set_framebuffer(&mut self, addr: PhysAddr, width: u32, height: u32, pitch: u32);
}

pub struct Bootstrap<'c, P> {
    config: &'c BootConfig,
    platform: P,
    stage: Stage,
}

impl<'c, P> Bootstrap<'c, P> {
    pub fn new(config: &'c BootConfig, platform: P) -> Self {
        Bootstrap { config, platform, stage: Stage::Start }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Run the whole pipeline once. On failure the pipeline is `Halted` and
    /// reporting the error is left to the caller (see `abort_boot`).
    pub fn run<'a>(&mut self, info: BootInformation<'a>) -> Result<BootMetadata, BootError>
        where P: Platform<'a>
    {
        let result = self.run_stages(info);
        if result.is_err() {
            info!("[boot] {:?} -> {:?}", self.stage, Stage::Halted);
            self.stage = Stage::Halted;
        }
        result
    }

    fn enter(&mut self, stage: Stage) {
        info!("[boot] {:?} -> {:?}", self.stage, stage);
        self.stage = stage;
    }

    fn run_stages<'a>(&mut self, info: BootInformation<'a>) -> Result<BootMetadata, BootError>
        where P: Platform<'a>
    {
        let window = self.platform.physical_window();
        let mut metadata = BootMetadata::new(self.config.hhdm_base);

        self.enter(Stage::TagPass);
        let scan = ScanPass::new(self.config).run(&info);
        metadata.boot_info = window.virt_to_phys(info.start_addr()).map_or(0, |p| p.0);
        metadata.highest_address = scan.highest_address.0;
        metadata.bootstrap_end = scan.bootstrap_end.0;
        if let Some(kernel) = scan.kernel {
            metadata.kernel_elf = kernel.base.0;
            metadata.kernel_size = kernel.len;
        }
        if let Some(initramfs) = scan.initramfs {
            metadata.initramfs = initramfs.base.0;
            metadata.initramfs_size = initramfs.len;
        }
        let phys = |vaddr: VirtAddr| window.virt_to_phys(vaddr).map_or(0, |p| p.0);
        metadata.rsdp = scan.rsdp.map_or(0, phys);
        if let Some(fb) = scan.framebuffer {
            metadata.framebuffer = phys(fb.start_addr());
            info!("[boot] framebuffer {}x{}x{} at {:p}", fb.width, fb.height, fb.bpp, fb.addr);
            self.platform.set_framebuffer(fb.addr, fb.width, fb.height, fb.pitch);
        }

        self.enter(Stage::AllocatorInit);
        let memory_map = scan.memory_map.ok_or(BootError::NoMemoryMap)?;
        let mut allocator = self.platform
            .init_allocator(memory_map.tag(), scan.bootstrap_end)
            .ok_or(BootError::AllocatorInit { reserved_until: scan.bootstrap_end })?;

        self.enter(Stage::MapNormalization);
        let normalized = memory_map.materialize(&mut allocator, &window)?;
        metadata.memory_map = normalized.phys_addr().0;
        metadata.memory_map_len = normalized.len() as u64;

        self.enter(Stage::DirectMapConstruction);
        DirectMapBuilder::new(metadata.hhdm_vaddr())
            .build(normalized.regions(), self.platform.address_space(), &mut allocator)?;
        metadata.pmm_state = allocator.state_word();

        self.enter(Stage::Finalized);
        Ok(metadata)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bare_metal::PhysAddrRange;
    use kmem::paging::{Flags, Level, MapError};
    use multiboot2::builder::{rsdp_v1, TagStreamBuilder};
    use std::collections::BTreeMap;

    use crate::memmap::{MemoryClass, NormalizedRegion};
    use multiboot2::MemoryMapEntries;

    use crate::platform::{early_allocator, EarlyAllocator};

    const PAGES: usize = 16;
    /// Host addresses do not fit below the default direct map base.
    const HHDM: u64 = 0xFFFF_8000_0000_0000;
    const CONFIG: BootConfig = BootConfig { hhdm_base: VirtAddr(HHDM), ..BootConfig::DEFAULT };

    #[derive(Clone, Copy)]
    #[repr(C, align(4096))]
    struct Page([u8; 4096]);

    /// Host memory standing in for physical memory under an identity window.
    struct Arena {
        pages: Vec<Page>,
    }

    impl Arena {
        fn new() -> Self {
            Arena { pages: vec![Page([0x5A; 4096]); PAGES] }
        }

        fn base(&self) -> u64 {
            self.pages.as_ptr() as u64
        }

        fn end(&self) -> u64 {
            self.base() + (PAGES * 4096) as u64
        }
    }

    #[derive(Default)]
    struct RecordingSpace {
        mappings: BTreeMap<u64, u64>,
        fail_at: Option<u64>,
    }

    impl AddressSpace for RecordingSpace {
        fn map(
            &mut self, vaddr: VirtAddr, paddr: PhysAddr, _level: Level, _flags: Flags,
            _pfa: &mut dyn PageFrameAllocator,
        ) -> Result<(), MapError> {
            if self.fail_at == Some(paddr.0) {
                return Err(MapError::OutOfMemory);
            }
            if self.mappings.insert(vaddr.0, paddr.0).is_some() {
                return Err(MapError::MappingExists);
            }
            Ok(())
        }

        fn resolve(&self, vaddr: VirtAddr) -> Option<PhysAddr> {
            self.mappings.get(&vaddr.0).map(|p| PhysAddr(*p))
        }
    }

    #[derive(Default)]
    struct FakePlatform {
        space: RecordingSpace,
        framebuffer: Option<(PhysAddr, u32, u32, u32)>,
        reserved_until: Option<PhysAddr>,
        boot_info: PhysAddrRange,
    }

    impl<'a> Platform<'a> for FakePlatform {
        type Allocator = EarlyAllocator<MemoryMapEntries<'a>>;
        type AddressSpace = RecordingSpace;

        fn init_allocator(&mut self, memory_map: &MemoryMapTag<'a>, reserved_until: PhysAddr) -> Option<Self::Allocator> {
            self.reserved_until = Some(reserved_until);
            early_allocator(memory_map.entries(), reserved_until, &self.boot_info)
        }

        fn address_space(&mut self) -> &mut RecordingSpace {
            &mut self.space
        }

        fn physical_window(&self) -> DirectMapping {
            DirectMapping::identity()
        }

        fn set_framebuffer(&mut self, addr: PhysAddr, width: u32, height: u32, pitch: u32) {
            self.framebuffer = Some((addr, width, height, pitch));
        }
    }

    fn run<'c>(
        config: &'c BootConfig, bytes: &[u8], platform: FakePlatform,
    ) -> (Bootstrap<'c, FakePlatform>, Result<BootMetadata, BootError>) {
        let info = BootInformation::from_bytes(bytes).unwrap();
        let mut bootstrap = Bootstrap::new(config, platform);
        let result = bootstrap.run(info);
        (bootstrap, result)
    }

    #[test]
    fn full_boot() {
        let arena = Arena::new();
        let rsdp = rsdp_v1(*b"BOCHS ", 0xE_0000);
        let bytes = TagStreamBuilder::new()
            .bootloader_name("GRUB 2.06")
            .module(0x20_0000, 0x30_0000, "kernel")
            .module(0x40_0000, 0x4A_0000, "initramfs")
            .memory_map(&[(0x0, 0x9FC00, 1), (0x9FC00, 0x400, 2), (arena.base(), (PAGES * 4096) as u64, 1)])
            .framebuffer(0xFD00_0000, 4096, 1024, 768, 32)
            .acpi_new(&rsdp)
            .build();
        let info = BootInformation::from_bytes(&bytes).unwrap();

        let (bootstrap, result) = run(&CONFIG, &bytes, FakePlatform::default());
        let metadata = result.unwrap();
        assert_eq!(bootstrap.stage(), Stage::Finalized);

        assert_eq!(metadata.boot_info, info.start_addr().0);
        assert_eq!(metadata.highest_address, arena.end());
        assert_eq!((metadata.kernel_elf, metadata.kernel_size), (0x20_0000, 0x10_0000));
        assert_eq!((metadata.initramfs, metadata.initramfs_size), (0x40_0000, 0xA_0000));
        assert_eq!(metadata.hhdm_vaddr(), VirtAddr(HHDM));
        assert_eq!(metadata.bootstrap_end, 0x4A_0000);
        assert_ne!(metadata.rsdp, 0);
        assert_ne!(metadata.framebuffer, 0);
        assert_eq!(bootstrap.platform().framebuffer, Some((PhysAddr(0xFD00_0000), 1024, 768, 4096)));

        // the normalized map sits in the first arena page, the allocator moved on
        assert_eq!(metadata.memory_map, arena.base());
        assert_eq!(metadata.memory_map_len, 3);
        assert_eq!(metadata.pmm_state, arena.base() + 4096);
        let regions = unsafe {
            std::slice::from_raw_parts(metadata.memory_map as *const NormalizedRegion, 3)
        };
        assert_eq!(regions[1], NormalizedRegion::new(MemoryClass::Reserved, PhysAddr(0x9FC00), 0x400));

        // every frame of every region is in the direct map
        let mappings = &bootstrap.platform().space.mappings;
        assert_eq!(mappings.len(), 0xA0 + PAGES);
        assert_eq!(mappings.get(&(HHDM + 0x9F000)), Some(&0x9F000));
        assert_eq!(mappings.get(&(HHDM + arena.base())), Some(&arena.base()));
    }

    #[test]
    fn allocator_respects_the_watermark() {
        let arena = Arena::new();
        // the bootstrapper image occupies the first half of the arena
        let image_end = arena.base() + 8 * 4096;
        let config = BootConfig { reserved_until: PhysAddr(image_end), ..CONFIG };
        let bytes = TagStreamBuilder::new()
            .module(0x20_0000, 0x30_0000, "kernel")
            .memory_map(&[(arena.base(), (PAGES * 4096) as u64, 1)])
            .build();
        let (bootstrap, result) = run(&config, &bytes, FakePlatform::default());
        let metadata = result.unwrap();
        assert_eq!(bootstrap.platform().reserved_until, Some(PhysAddr(image_end)));
        assert_eq!(metadata.bootstrap_end, image_end);
        assert_eq!(metadata.memory_map, image_end);
        assert_eq!(metadata.pmm_state, image_end + 4096);
    }

    #[test]
    fn boot_information_is_not_handed_out() {
        let mut arena = Arena::new();
        let bytes = TagStreamBuilder::new()
            .bootloader_name("GRUB 2.06")
            .memory_map(&[(arena.base(), (PAGES * 4096) as u64, 1)])
            .build();
        // the bootloader put the boot information into the first free page
        arena.pages[0].0[..bytes.len()].copy_from_slice(&bytes);
        let platform = FakePlatform {
            boot_info: PhysAddrRange::new(PhysAddr(arena.base()), bytes.len() as u64),
            ..Default::default()
        };
        let (_, result) = run(&CONFIG, &arena.pages[0].0[..bytes.len()], platform);
        let metadata = result.unwrap();
        assert_eq!(metadata.boot_info, arena.base());
        assert_eq!(metadata.memory_map, arena.base() + 4096);
        assert_eq!(&arena.pages[0].0[..bytes.len()], &bytes[..]);
    }

    #[test]
    fn missing_memory_map_halts() {
        let bytes = TagStreamBuilder::new().module(0x20_0000, 0x30_0000, "kernel").build();
        let (bootstrap, result) = run(&CONFIG, &bytes, FakePlatform::default());
        assert_eq!(result, Err(BootError::NoMemoryMap));
        assert_eq!(bootstrap.stage(), Stage::Halted);
    }

    #[test]
    fn no_memory_above_the_watermark() {
        let bytes = TagStreamBuilder::new()
            .module(0x20_0000, 0x30_0000, "kernel")
            .memory_map(&[(0x0, 0x9FC00, 1), (0x10_0000, 0x20_0000, 1)])
            .build();
        let (bootstrap, result) = run(&CONFIG, &bytes, FakePlatform::default());
        assert_eq!(result, Err(BootError::AllocatorInit { reserved_until: PhysAddr(0x30_0000) }));
        assert_eq!(bootstrap.platform().reserved_until, Some(PhysAddr(0x30_0000)));
        assert_eq!(bootstrap.stage(), Stage::Halted);
    }

    #[test]
    fn mapping_failure_halts() {
        let arena = Arena::new();
        let bytes = TagStreamBuilder::new()
            .memory_map(&[(arena.base(), (PAGES * 4096) as u64, 1), (0x1_0000_0000_0000, 0x1000, 2)])
            .build();
        let platform = FakePlatform {
            space: RecordingSpace { fail_at: Some(arena.base() + 4096), ..Default::default() },
            ..Default::default()
        };
        let (bootstrap, result) = run(&CONFIG, &bytes, platform);
        assert_eq!(result, Err(BootError::Mapping {
            vaddr: VirtAddr(HHDM + arena.base() + 4096),
            paddr: PhysAddr(arena.base() + 4096),
            error: MapError::OutOfMemory,
        }));
        assert_eq!(bootstrap.stage(), Stage::Halted);
        // nothing after the failing page
        assert_eq!(bootstrap.platform().space.mappings.len(), 1);
    }

    #[test]
    fn stage_order() {
        assert!(Stage::Start < Stage::TagPass);
        assert!(Stage::TagPass < Stage::AllocatorInit);
        assert!(Stage::MapNormalization < Stage::DirectMapConstruction);
        assert!(Stage::DirectMapConstruction < Stage::Finalized);
    }
}
