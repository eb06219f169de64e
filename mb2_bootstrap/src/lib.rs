#![cfg_attr(all(not(test), target_os = "none"), no_std)]
//! Early boot ingestion of the Multiboot2 boot information.
//!
//! A single pass over the tag stream resolves the boot modules, finds the memory
//! map and collects the firmware pointers. Once the highest address in use by
//! the boot image is known, a page frame allocator is brought up, the memory map
//! is copied into allocator-owned memory in a normalized form and every physical
//! frame it describes is mapped into the higher half direct map. The result is a
//! `BootMetadata` record for the kernel.

pub mod abort;
pub mod config;
pub mod direct_map;
pub mod error;
pub mod memmap;
pub mod metadata;
pub mod modules;
pub mod pipeline;
pub mod platform;
pub mod scan;

#[cfg(target_arch = "x86_64")]
pub mod logger;

#[cfg(all(target_os = "none", target_arch = "x86_64"))]
mod entry;

pub use self::abort::abort_boot;
pub use self::config::BootConfig;
pub use self::error::BootError;
pub use self::metadata::BootMetadata;
pub use self::pipeline::{AllocatorState, Bootstrap, Platform, Stage};
