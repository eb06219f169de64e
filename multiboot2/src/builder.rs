//! Assembles Multiboot2 boot information in memory, for exercising consumers of
//! the parser without a bootloader.

use alloc::vec::Vec;

use crate::raw;
use crate::TagType;

/// Accumulates tags and produces the byte image a bootloader would hand over.
#[derive(Clone, Debug, Default)]
pub struct TagStreamBuilder {
    tags: Vec<u8>,
}

impl TagStreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The boot information with header and terminating tag.
    pub fn build(&self) -> Vec<u8> {
        let mut bytes = self.build_unterminated();
        push_u32(&mut bytes, TagType::END.0);
        push_u32(&mut bytes, raw::TAG_HEADER_SIZE as u32);
        set_total_size(&mut bytes);
        bytes
    }

    /// The boot information without a terminating tag.
    pub fn build_unterminated(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(raw::HEADER_SIZE + self.tags.len() + raw::TAG_HEADER_SIZE);
        push_u32(&mut bytes, 0);
        push_u32(&mut bytes, 0);
        bytes.extend_from_slice(&self.tags);
        set_total_size(&mut bytes);
        bytes
    }

    /// Append a tag with the given payload, its size field matching the payload.
    pub fn raw_tag(self, tag_type: u32, payload: &[u8]) -> Self {
        let size = (raw::TAG_HEADER_SIZE + payload.len()) as u32;
        self.raw_tag_with_size(tag_type, size, payload)
    }

    /// Append a tag whose size field lies about the payload that follows.
    pub fn raw_tag_with_size(mut self, tag_type: u32, declared_size: u32, payload: &[u8]) -> Self {
        push_u32(&mut self.tags, tag_type);
        push_u32(&mut self.tags, declared_size);
        self.tags.extend_from_slice(payload);
        while self.tags.len() % 8 != 0 {
            self.tags.push(0);
        }
        self
    }

    pub fn command_line(self, cmd_line: &str) -> Self {
        self.raw_tag(TagType::BOOT_CMD_LINE.0, &nul_terminated(cmd_line))
    }

    pub fn bootloader_name(self, name: &str) -> Self {
        self.raw_tag(TagType::BOOT_LOADER_NAME.0, &nul_terminated(name))
    }

    pub fn module(self, start: u32, end: u32, label: &str) -> Self {
        let mut payload = Vec::new();
        push_u32(&mut payload, start);
        push_u32(&mut payload, end);
        payload.extend_from_slice(&nul_terminated(label));
        self.raw_tag(TagType::MODULE.0, &payload)
    }

    pub fn basic_meminfo(self, mem_lower: u32, mem_upper: u32) -> Self {
        let mut payload = Vec::new();
        push_u32(&mut payload, mem_lower);
        push_u32(&mut payload, mem_upper);
        self.raw_tag(TagType::BASIC_MEMINFO.0, &payload)
    }

    /// A memory map with the standard 24 byte entries `(base, length, type)`.
    pub fn memory_map(self, entries: &[(u64, u64, u32)]) -> Self {
        self.memory_map_with_stride(raw::MEMORY_MAP_ENTRY_MIN_SIZE as u32 + 4, entries)
    }

    /// A memory map with a custom stride. Entries are cut off or zero padded to it.
    pub fn memory_map_with_stride(self, entry_size: u32, entries: &[(u64, u64, u32)]) -> Self {
        let mut payload = Vec::new();
        push_u32(&mut payload, entry_size);
        push_u32(&mut payload, 0);
        for &(base, length, entry_type) in entries {
            let mut entry = Vec::with_capacity(24);
            push_u64(&mut entry, base);
            push_u64(&mut entry, length);
            push_u32(&mut entry, entry_type);
            push_u32(&mut entry, 0);
            entry.resize(entry_size as usize, 0);
            payload.extend_from_slice(&entry);
        }
        self.raw_tag(TagType::MEMORY_MAP.0, &payload)
    }

    pub fn load_base_addr(self, base: u32) -> Self {
        self.raw_tag(TagType::LOAD_BASE_ADDR.0, &base.to_le_bytes())
    }

    /// A direct RGB framebuffer without color information.
    pub fn framebuffer(self, addr: u64, pitch: u32, width: u32, height: u32, bpp: u8) -> Self {
        let mut payload = Vec::new();
        push_u64(&mut payload, addr);
        push_u32(&mut payload, pitch);
        push_u32(&mut payload, width);
        push_u32(&mut payload, height);
        payload.push(bpp);
        payload.push(1);
        self.raw_tag(TagType::FRAMEBUFFER.0, &payload)
    }

    pub fn acpi_old(self, rsdp: &[u8]) -> Self {
        self.raw_tag(TagType::ACPI_OLD.0, rsdp)
    }

    pub fn acpi_new(self, rsdp: &[u8]) -> Self {
        self.raw_tag(TagType::ACPI_NEW.0, rsdp)
    }
}

/// An ACPI 1.0 RSDP with a valid checksum.
pub fn rsdp_v1(oem_id: [u8; 6], rsdt_addr: u32) -> [u8; raw::RSDP_SIZE] {
    let mut rsdp = [0u8; raw::RSDP_SIZE];
    rsdp[..8].copy_from_slice(b"RSD PTR ");
    rsdp[9..15].copy_from_slice(&oem_id);
    rsdp[16..20].copy_from_slice(&rsdt_addr.to_le_bytes());
    let sum = rsdp.iter().fold(0u8, |sum, b| sum.wrapping_add(*b));
    rsdp[8] = 0u8.wrapping_sub(sum);
    rsdp
}

fn nul_terminated(s: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(s.len() + 1);
    bytes.extend_from_slice(s.as_bytes());
    bytes.push(0);
    bytes
}

fn push_u32(bytes: &mut Vec<u8>, value: u32) {
    bytes.extend_from_slice(&value.to_le_bytes());
}

fn push_u64(bytes: &mut Vec<u8>, value: u64) {
    bytes.extend_from_slice(&value.to_le_bytes());
}

fn set_total_size(bytes: &mut [u8]) {
    let total = bytes.len() as u32;
    bytes[0..4].copy_from_slice(&total.to_le_bytes());
}
