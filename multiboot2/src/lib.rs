#![cfg_attr(not(test), no_std)]
//! Parser for the Multiboot2 information structures provided by the bootloader.
//!
//! The boot information is treated as untrusted input: every record is checked
//! against the `total_size` declared in the header before any of its bytes are
//! read, and fields are decoded from the byte slice instead of conjuring
//! references to packed structs. A record whose declared size would reach past
//! the end of the structure terminates the traversal.
//!
//! The lifetime of the parsed views is tied to the byte slice. When the structure
//! comes straight from the bootloader (`BootInformation::from_addr`) that lifetime
//! is `'static`, which only holds as long as the physical memory stays mapped at
//! the same address. If the mapping is not kept, drop all views first.

#[cfg(any(test, feature = "builder"))]
extern crate alloc;

use bare_metal::{Alignable, VirtAddr};

use core::fmt;
use core::iter::FusedIterator;
use core::slice;

use log::warn;

mod raw;
mod tags;
pub mod memmap;
#[cfg(any(test, feature = "builder"))]
pub mod builder;

pub use self::memmap::{EntryType, MemoryMapEntries, MemoryMapEntry, MemoryMapTag};
pub use self::tags::{AcpiTag, BasicMemInfoTag, FramebufferTag, LoadBaseAddrTag, ModuleTag, StringTag};

/// Reasons for rejecting a boot information structure outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoError {
    /// Not even the fixed header fits into the available bytes.
    TooShort { available: usize },
    /// The declared total size is smaller than the header or larger than the available bytes.
    BadTotalSize { total_size: u32, available: usize },
}

impl fmt::Display for InfoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfoError::TooShort { available } =>
                write!(f, "boot information too short ({} bytes)", available),
            InfoError::BadTotalSize { total_size, available } =>
                write!(f, "boot information declares {} bytes, {} available", total_size, available),
        }
    }
}

/// Read-only view of the Multiboot2 boot information. Care must be taken not to
/// overwrite that memory region while the information is still needed.
#[derive(Debug, Clone, Copy)]
pub struct BootInformation<'a> {
    /// The whole structure, header included, cut to the declared total size.
    bytes: &'a [u8],
}

impl<'a> BootInformation<'a> {
    /// Validate the header of a boot information structure held in `bytes`.
    /// Everything after the declared `total_size` is ignored.
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Self, InfoError> {
        let total_size = raw::read_u32(bytes, 0)
            .ok_or(InfoError::TooShort { available: bytes.len() })?;
        let total = total_size as usize;
        if total < raw::HEADER_SIZE || total > bytes.len() {
            return Err(InfoError::BadTotalSize { total_size, available: bytes.len() });
        }
        Ok(BootInformation { bytes: &bytes[..total] })
    }

    /// Access the boot information the bootloader placed at `addr`.
    ///
    /// # Safety
    ///
    /// `addr` must point to readable memory holding at least the 8 byte header,
    /// and the `total_size` bytes it declares must be readable and stay unmodified
    /// for the rest of the program.
    pub unsafe fn from_addr(addr: VirtAddr) -> Result<BootInformation<'static>, InfoError> {
        let total_size = core::ptr::read_unaligned(addr.as_ptr::<u32>());
        let bytes = slice::from_raw_parts(addr.as_ptr::<u8>(), total_size as usize);
        BootInformation::from_bytes(bytes)
    }

    pub fn start_addr(&self) -> VirtAddr {
        VirtAddr::from_ptr(self.bytes.as_ptr())
    }

    /// The declared size of the structure in bytes, header included.
    pub fn total_size(&self) -> usize {
        self.bytes.len()
    }

    pub fn tags(&self) -> TagsIter<'a> {
        TagsIter {
            bytes: self.bytes,
            offset: raw::HEADER_SIZE,
            finished: false,
        }
    }

    pub fn memory_map(&self) -> Option<MemoryMapTag<'a>> {
        self.tags().find_map(|t| match t {
            Tag::MemoryMap(mmap) => Some(mmap),
            _ => None,
        })
    }

    pub fn modules(&self) -> impl Iterator<Item = ModuleTag<'a>> + 'a {
        self.tags().filter_map(|t| match t {
            Tag::Module(module) => Some(module),
            _ => None,
        })
    }

    pub fn bootloader_name(&self) -> Option<&'a str> {
        self.tags().find_map(|t| match t {
            Tag::BootLoaderName(name) => name.as_str(),
            _ => None,
        })
    }

    pub fn command_line(&self) -> Option<&'a str> {
        self.tags().find_map(|t| match t {
            Tag::CommandLine(cmd_line) => cmd_line.as_str(),
            _ => None,
        })
    }
}

#[derive(Eq, PartialEq, Copy, Clone, Debug)]
#[repr(C)]
pub struct TagType(pub u32);

impl TagType {
    pub const END: TagType = TagType(0);
    pub const BOOT_CMD_LINE: TagType = TagType(1);
    pub const BOOT_LOADER_NAME: TagType = TagType(2);
    pub const MODULE: TagType = TagType(3);
    pub const BASIC_MEMINFO: TagType = TagType(4);
    pub const MEMORY_MAP: TagType = TagType(6);
    pub const FRAMEBUFFER: TagType = TagType(8);
    pub const ACPI_OLD: TagType = TagType(14);
    pub const ACPI_NEW: TagType = TagType(15);
    pub const LOAD_BASE_ADDR: TagType = TagType(21);
}

/// A single record of the tag stream, header included, before interpretation.
#[derive(Clone, Copy, Debug)]
pub struct RawTag<'a> {
    tag_type: TagType,
    /// Exactly `size` bytes, starting at the tag header.
    bytes: &'a [u8],
}

impl<'a> RawTag<'a> {
    pub fn tag_type(&self) -> TagType {
        self.tag_type
    }

    /// Size of the record in bytes as declared in its header (without padding).
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// The record, header included.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Everything after the 8 byte tag header.
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[raw::TAG_HEADER_SIZE..]
    }

    /// Address of the tag header in the current address space.
    pub fn start_addr(&self) -> VirtAddr {
        VirtAddr::from_ptr(self.bytes.as_ptr())
    }
}

/// A tag of the boot information, decoded according to its type.
#[derive(Clone, Copy, Debug)]
pub enum Tag<'a> {
    /// Command line that was passed to the kernel by the bootloader.
    CommandLine(StringTag<'a>),
    /// Name of the Multiboot2 compliant bootloader that loaded the kernel.
    BootLoaderName(StringTag<'a>),
    Module(ModuleTag<'a>),
    BasicMemInfo(BasicMemInfoTag),
    MemoryMap(MemoryMapTag<'a>),
    Framebuffer(FramebufferTag<'a>),
    AcpiOld(AcpiTag<'a>),
    AcpiNew(AcpiTag<'a>),
    LoadBaseAddr(LoadBaseAddrTag),
    /// A tag of unknown type, or a known tag too short to hold its fields.
    Other(RawTag<'a>),
}

impl<'a> Tag<'a> {
    fn parse(raw: RawTag<'a>) -> Tag<'a> {
        let parsed = match raw.tag_type() {
            TagType::BOOT_CMD_LINE => StringTag::from_raw(raw).map(Tag::CommandLine),
            TagType::BOOT_LOADER_NAME => StringTag::from_raw(raw).map(Tag::BootLoaderName),
            TagType::MODULE => ModuleTag::from_raw(raw).map(Tag::Module),
            TagType::BASIC_MEMINFO => BasicMemInfoTag::from_raw(raw).map(Tag::BasicMemInfo),
            TagType::MEMORY_MAP => MemoryMapTag::from_raw(raw).map(Tag::MemoryMap),
            TagType::FRAMEBUFFER => FramebufferTag::from_raw(raw).map(Tag::Framebuffer),
            TagType::ACPI_OLD => AcpiTag::from_raw(raw).map(Tag::AcpiOld),
            TagType::ACPI_NEW => AcpiTag::from_raw(raw).map(Tag::AcpiNew),
            TagType::LOAD_BASE_ADDR => LoadBaseAddrTag::from_raw(raw).map(Tag::LoadBaseAddr),
            _ => return Tag::Other(raw),
        };
        parsed.unwrap_or_else(|| {
            warn!("[mb2] tag type {} too short ({} bytes), skipping", raw.tag_type().0, raw.size());
            Tag::Other(raw)
        })
    }

    pub fn tag_type(&self) -> TagType {
        match self {
            Tag::CommandLine(_) => TagType::BOOT_CMD_LINE,
            Tag::BootLoaderName(_) => TagType::BOOT_LOADER_NAME,
            Tag::Module(_) => TagType::MODULE,
            Tag::BasicMemInfo(_) => TagType::BASIC_MEMINFO,
            Tag::MemoryMap(_) => TagType::MEMORY_MAP,
            Tag::Framebuffer(_) => TagType::FRAMEBUFFER,
            Tag::AcpiOld(_) => TagType::ACPI_OLD,
            Tag::AcpiNew(_) => TagType::ACPI_NEW,
            Tag::LoadBaseAddr(_) => TagType::LOAD_BASE_ADDR,
            Tag::Other(raw) => raw.tag_type(),
        }
    }
}

/// An iterator over the tags in the multiboot structure.
/// Construct using `BootInformation::tags`.
///
/// The iterator ends at the terminating tag, or at the first record that does
/// not fit before the end of the structure.
#[derive(Clone, Debug)]
pub struct TagsIter<'a> {
    bytes: &'a [u8],
    /// Offset of the next tag header, always a multiple of 8 past the header.
    offset: usize,
    finished: bool,
}

impl<'a> TagsIter<'a> {
    fn next_raw(&mut self) -> Option<RawTag<'a>> {
        let remaining = self.bytes.len().saturating_sub(self.offset);
        if remaining < raw::TAG_HEADER_SIZE {
            warn!("[mb2] tag stream ends at offset {} without terminator", self.offset);
            return None;
        }

        let tag_type = TagType(raw::read_u32(self.bytes, self.offset)?);
        let size = raw::read_u32(self.bytes, self.offset + 4)? as usize;

        if tag_type == TagType::END {
            return None;
        }

        // the size covers at least the two header fields and must not reach past the end
        if size < raw::TAG_HEADER_SIZE || size > remaining {
            warn!(
                "[mb2] malformed tag type={} size={} at offset {} ({} bytes left), stopping",
                tag_type.0, size, self.offset, remaining
            );
            return None;
        }

        let tag = RawTag {
            tag_type,
            bytes: &self.bytes[self.offset..self.offset + size],
        };
        // goto next tag starting on 8 byte alignment
        self.offset += size.align_up(8);
        Some(tag)
    }
}

impl<'a> Iterator for TagsIter<'a> {
    type Item = Tag<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_raw() {
            Some(raw) => Some(Tag::parse(raw)),
            None => {
                self.finished = true;
                None
            }
        }
    }
}

impl<'a> FusedIterator for TagsIter<'a> {}
