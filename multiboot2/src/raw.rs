//! Wire layout of the Multiboot2 boot information. The structs only document the
//! layout (and let the compiler check their sizes); fields are read with the
//! bounds-checked little-endian helpers below, never through references into
//! the bootloader-provided memory.

// rust doesn't see that we only use these for their layout
#![allow(dead_code)]

use core::mem;
use static_assertions::assert_eq_size;

#[repr(C, packed)]
pub struct Header {
    pub total_size: u32,
    pub reserved: u32,
}

#[repr(C, packed)]
pub struct Tag {
    pub tag_type: u32,
    pub size: u32,
}

#[repr(C, packed)]
pub struct ModuleTag {
    pub header: Tag,
    pub mod_start: u32,
    pub mod_end: u32,
}

#[repr(C, packed)]
pub struct MemoryMapTag {
    pub header: Tag,
    pub entry_size: u32,
    pub entry_version: u32,
}

#[repr(C, packed)]
pub struct MemoryMapEntry {
    pub base_addr: u64,
    pub length: u64,
    pub entry_type: u32,
    pub reserved: u32,
}

#[repr(C, packed)]
pub struct BasicMemInfoTag {
    pub header: Tag,
    pub mem_lower: u32,
    pub mem_upper: u32,
}

#[repr(C, packed)]
pub struct LoadBaseAddrTag {
    pub header: Tag,
    pub load_base_addr: u32,
}

#[repr(C, packed)]
pub struct FramebufferTag {
    pub header: Tag,
    pub framebuffer_addr: u64,
    pub framebuffer_pitch: u32,
    pub framebuffer_width: u32,
    pub framebuffer_height: u32,
    pub framebuffer_bpp: u8,
    pub framebuffer_type: u8,
}

/// The ACPI 1.0 part of the root system description pointer.
#[repr(C, packed)]
pub struct Rsdp {
    pub signature: [u8; 8],
    pub checksum: u8,
    pub oem_id: [u8; 6],
    pub revision: u8,
    pub rsdt_address: u32,
}

assert_eq_size!(Header, [u8; 8]);
assert_eq_size!(Tag, [u8; 8]);
assert_eq_size!(ModuleTag, [u8; 16]);
assert_eq_size!(MemoryMapTag, [u8; 16]);
assert_eq_size!(MemoryMapEntry, [u8; 24]);
assert_eq_size!(BasicMemInfoTag, [u8; 16]);
assert_eq_size!(LoadBaseAddrTag, [u8; 12]);
assert_eq_size!(FramebufferTag, [u8; 30]);
assert_eq_size!(Rsdp, [u8; 20]);

pub const HEADER_SIZE: usize = mem::size_of::<Header>();
pub const TAG_HEADER_SIZE: usize = mem::size_of::<Tag>();
pub const MODULE_TAG_SIZE: usize = mem::size_of::<ModuleTag>();
pub const MEMORY_MAP_TAG_SIZE: usize = mem::size_of::<MemoryMapTag>();
/// Smallest stride that still covers base, length and type of an entry.
pub const MEMORY_MAP_ENTRY_MIN_SIZE: usize = mem::size_of::<MemoryMapEntry>() - 4;
pub const BASIC_MEMINFO_TAG_SIZE: usize = mem::size_of::<BasicMemInfoTag>();
pub const LOAD_BASE_ADDR_TAG_SIZE: usize = mem::size_of::<LoadBaseAddrTag>();
pub const FRAMEBUFFER_TAG_SIZE: usize = mem::size_of::<FramebufferTag>();
pub const RSDP_SIZE: usize = mem::size_of::<Rsdp>();

pub fn read_u8(bytes: &[u8], offset: usize) -> Option<u8> {
    bytes.get(offset).copied()
}

pub fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let field = bytes.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([field[0], field[1], field[2], field[3]]))
}

pub fn read_u64(bytes: &[u8], offset: usize) -> Option<u64> {
    let field = bytes.get(offset..offset.checked_add(8)?)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(field);
    Some(u64::from_le_bytes(buf))
}

/// The bytes of a NUL-terminated string, without the terminator. A missing
/// terminator makes the whole slice the string.
pub fn c_str(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|b| *b == 0) {
        Some(nul) => &bytes[..nul],
        None => bytes,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reads_are_bounds_checked() {
        let bytes = [1, 0, 0, 0, 2, 0, 0];
        assert_eq!(read_u32(&bytes, 0), Some(1));
        assert_eq!(read_u32(&bytes, 4), None);
        assert_eq!(read_u32(&bytes, usize::MAX - 1), None);
        assert_eq!(read_u64(&bytes, 0), None);
        assert_eq!(read_u8(&bytes, 6), Some(0));
        assert_eq!(read_u8(&bytes, 7), None);
    }

    #[test]
    fn c_str_stops_at_nul() {
        assert_eq!(c_str(b"kernel\0junk"), b"kernel");
        assert_eq!(c_str(b"no terminator"), b"no terminator");
        assert_eq!(c_str(b"\0"), b"");
    }
}
