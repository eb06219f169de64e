//! Typed views of the fixed-layout tags. Each view is decoded eagerly from a
//! `RawTag` and refuses tags that are too short to hold its fields.

use bare_metal::{PhysAddr, PhysAddrRange, VirtAddr};

use core::str;

use crate::raw;
use crate::RawTag;

/// A tag holding a NUL-terminated UTF-8 string (command line, bootloader name).
#[derive(Clone, Copy, Debug)]
pub struct StringTag<'a> {
    raw: RawTag<'a>,
    string: &'a [u8],
}

impl<'a> StringTag<'a> {
    pub(crate) fn from_raw(raw: RawTag<'a>) -> Option<Self> {
        // must contain at least the NUL terminator
        if raw.size() <= raw::TAG_HEADER_SIZE {
            return None;
        }
        Some(StringTag {
            raw,
            string: raw::c_str(raw.payload()),
        })
    }

    /// The string bytes without the terminator.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.string
    }

    /// The string, or `None` if the bootloader did not provide valid UTF-8.
    pub fn as_str(&self) -> Option<&'a str> {
        str::from_utf8(self.string).ok()
    }

    pub fn start_addr(&self) -> VirtAddr {
        self.raw.start_addr()
    }
}

/// A boot module loaded by the bootloader, identified by its command line.
#[derive(Clone, Copy, Debug)]
pub struct ModuleTag<'a> {
    mod_start: u32,
    mod_end: u32,
    cmd_line: &'a [u8],
}

impl<'a> ModuleTag<'a> {
    pub(crate) fn from_raw(raw: RawTag<'a>) -> Option<Self> {
        let bytes = raw.bytes();
        let tail = bytes.get(raw::MODULE_TAG_SIZE..)?;
        Some(ModuleTag {
            mod_start: raw::read_u32(bytes, 8)?,
            mod_end: raw::read_u32(bytes, 12)?,
            cmd_line: raw::c_str(tail),
        })
    }

    /// Physical address where the module begins.
    pub fn mod_start(&self) -> PhysAddr {
        PhysAddr(u64::from(self.mod_start))
    }

    /// Physical address where the module ends (not included).
    pub fn mod_end(&self) -> PhysAddr {
        PhysAddr(u64::from(self.mod_end))
    }

    /// The physical memory occupied by the module. A module whose end lies
    /// below its start is treated as empty.
    pub fn range(&self) -> PhysAddrRange {
        PhysAddrRange::from_bounds(self.mod_start(), self.mod_end())
    }

    /// The module command line, or `None` if it is not valid UTF-8.
    pub fn cmd_line(&self) -> Option<&'a str> {
        str::from_utf8(self.cmd_line).ok()
    }

    /// Whether the command line is exactly `label`.
    pub fn has_label(&self, label: &str) -> bool {
        self.cmd_line == label.as_bytes()
    }
}

/// Amount of lower and upper memory in KiB, as reported by the BIOS.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BasicMemInfoTag {
    pub mem_lower: u32,
    pub mem_upper: u32,
}

impl BasicMemInfoTag {
    pub(crate) fn from_raw(raw: RawTag<'_>) -> Option<Self> {
        if raw.size() < raw::BASIC_MEMINFO_TAG_SIZE {
            return None;
        }
        Some(BasicMemInfoTag {
            mem_lower: raw::read_u32(raw.bytes(), 8)?,
            mem_upper: raw::read_u32(raw.bytes(), 12)?,
        })
    }
}

/// Physical address the image was loaded to (relocatable images only).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadBaseAddrTag {
    pub load_base_addr: PhysAddr,
}

impl LoadBaseAddrTag {
    pub(crate) fn from_raw(raw: RawTag<'_>) -> Option<Self> {
        if raw.size() < raw::LOAD_BASE_ADDR_TAG_SIZE {
            return None;
        }
        Some(LoadBaseAddrTag {
            load_base_addr: PhysAddr(u64::from(raw::read_u32(raw.bytes(), 8)?)),
        })
    }
}

/// The common part of the framebuffer tag. The color information that may follow
/// is not interpreted.
#[derive(Clone, Copy, Debug)]
pub struct FramebufferTag<'a> {
    raw: RawTag<'a>,
    pub addr: PhysAddr,
    pub pitch: u32,
    pub width: u32,
    pub height: u32,
    pub bpp: u8,
    pub framebuffer_type: u8,
}

impl<'a> FramebufferTag<'a> {
    pub(crate) fn from_raw(raw: RawTag<'a>) -> Option<Self> {
        if raw.size() < raw::FRAMEBUFFER_TAG_SIZE {
            return None;
        }
        let bytes = raw.bytes();
        Some(FramebufferTag {
            raw,
            addr: PhysAddr(raw::read_u64(bytes, 8)?),
            pitch: raw::read_u32(bytes, 16)?,
            width: raw::read_u32(bytes, 20)?,
            height: raw::read_u32(bytes, 24)?,
            bpp: raw::read_u8(bytes, 28)?,
            framebuffer_type: raw::read_u8(bytes, 29)?,
        })
    }

    /// Address of the tag itself, for consumers that want to decode the color info.
    pub fn start_addr(&self) -> VirtAddr {
        self.raw.start_addr()
    }
}

/// A copy of the ACPI root system description pointer (old: ACPI 1.0, new: ACPI 2.0+).
#[derive(Clone, Copy, Debug)]
pub struct AcpiTag<'a> {
    rsdp: &'a [u8],
}

impl<'a> AcpiTag<'a> {
    pub const SIGNATURE: &'static [u8; 8] = b"RSD PTR ";

    pub(crate) fn from_raw(raw: RawTag<'a>) -> Option<Self> {
        let rsdp = raw.payload();
        if rsdp.len() < raw::RSDP_SIZE {
            return None;
        }
        Some(AcpiTag { rsdp })
    }

    /// Address of the RSDP copy inside the boot information.
    pub fn rsdp_addr(&self) -> VirtAddr {
        VirtAddr::from_ptr(self.rsdp.as_ptr())
    }

    pub fn has_valid_signature(&self) -> bool {
        &self.rsdp[..8] == Self::SIGNATURE
    }

    /// The ACPI 1.0 checksum: all bytes of the first 20 bytes sum up to zero.
    pub fn checksum_valid(&self) -> bool {
        self.rsdp[..raw::RSDP_SIZE].iter().fold(0u8, |sum, b| sum.wrapping_add(*b)) == 0
    }

    pub fn revision(&self) -> u8 {
        self.rsdp[15]
    }

    pub fn oem_id(&self) -> Option<&'a str> {
        str::from_utf8(&self.rsdp[9..15]).ok()
    }
}

#[cfg(test)]
mod test {
    use crate::builder::{rsdp_v1, TagStreamBuilder};
    use crate::{BootInformation, Tag};
    use bare_metal::PhysAddr;

    #[test]
    fn module_fields() {
        let bytes = TagStreamBuilder::new()
            .module(0x40_0000, 0x4A_0000, "initramfs")
            .build();
        let info = BootInformation::from_bytes(&bytes).unwrap();
        let module = info.modules().next().unwrap();
        assert_eq!(module.mod_start(), PhysAddr(0x40_0000));
        assert_eq!(module.mod_end(), PhysAddr(0x4A_0000));
        assert_eq!(module.range().length, 0xA_0000);
        assert_eq!(module.cmd_line(), Some("initramfs"));
        assert!(module.has_label("initramfs"));
        assert!(!module.has_label("initramfs.cpio"));
        assert!(!module.has_label("initram"));
    }

    #[test]
    fn module_with_inverted_bounds_is_empty() {
        let bytes = TagStreamBuilder::new()
            .module(0x5000, 0x4000, "odd")
            .build();
        let info = BootInformation::from_bytes(&bytes).unwrap();
        assert!(info.modules().next().unwrap().range().is_empty());
    }

    #[test]
    fn invalid_utf8_is_not_a_str() {
        let bytes = TagStreamBuilder::new()
            .raw_tag(2, &[0xFF, 0xFE, 0])
            .build();
        let info = BootInformation::from_bytes(&bytes).unwrap();
        assert_eq!(info.bootloader_name(), None);
        match info.tags().next().unwrap() {
            Tag::BootLoaderName(name) => assert_eq!(name.as_bytes(), &[0xFF, 0xFE]),
            other => panic!("unexpected tag {:?}", other),
        }
    }

    #[test]
    fn framebuffer_fields() {
        let bytes = TagStreamBuilder::new()
            .framebuffer(0xFD00_0000, 4096, 1024, 768, 32)
            .build();
        let info = BootInformation::from_bytes(&bytes).unwrap();
        match info.tags().next().unwrap() {
            Tag::Framebuffer(fb) => {
                assert_eq!(fb.addr, PhysAddr(0xFD00_0000));
                assert_eq!((fb.pitch, fb.width, fb.height, fb.bpp), (4096, 1024, 768, 32));
                assert_eq!(fb.framebuffer_type, 1);
            }
            other => panic!("unexpected tag {:?}", other),
        }
    }

    #[test]
    fn basic_meminfo_and_load_base() {
        let bytes = TagStreamBuilder::new()
            .basic_meminfo(639, 523_264)
            .load_base_addr(0x20_0000)
            .build();
        let info = BootInformation::from_bytes(&bytes).unwrap();
        let tags: Vec<Tag<'_>> = info.tags().collect();
        match (tags[0], tags[1]) {
            (Tag::BasicMemInfo(mem), Tag::LoadBaseAddr(base)) => {
                assert_eq!((mem.mem_lower, mem.mem_upper), (639, 523_264));
                assert_eq!(base.load_base_addr, PhysAddr(0x20_0000));
            }
            other => panic!("unexpected tags {:?}", other),
        }
    }

    #[test]
    fn acpi_rsdp_copy() {
        let rsdp = rsdp_v1(*b"BOCHS ", 0xE_0000);
        let bytes = TagStreamBuilder::new()
            .acpi_old(&rsdp)
            .build();
        let info = BootInformation::from_bytes(&bytes).unwrap();
        match info.tags().next().unwrap() {
            Tag::AcpiOld(acpi) => {
                assert!(acpi.has_valid_signature());
                assert!(acpi.checksum_valid());
                assert_eq!(acpi.revision(), 0);
                assert_eq!(acpi.oem_id(), Some("BOCHS "));
                assert_eq!(acpi.rsdp_addr(), info.start_addr() + 16);
            }
            other => panic!("unexpected tag {:?}", other),
        }
    }

    #[test]
    fn corrupted_rsdp_fails_checks() {
        let mut rsdp = rsdp_v1(*b"BOCHS ", 0xE_0000);
        rsdp[0] = b'X';
        let bytes = TagStreamBuilder::new()
            .acpi_new(&rsdp)
            .build();
        let info = BootInformation::from_bytes(&bytes).unwrap();
        match info.tags().next().unwrap() {
            Tag::AcpiNew(acpi) => {
                assert!(!acpi.has_valid_signature());
                assert!(!acpi.checksum_valid());
            }
            other => panic!("unexpected tag {:?}", other),
        }
    }
}
