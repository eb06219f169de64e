#![cfg_attr(not(test), no_std)]
//! Primitive building blocks shared by the bootstrapper crates: address newtypes,
//! alignment arithmetic and the handful of CPU instructions needed before any
//! kernel infrastructure exists.

mod align;
mod addr;

#[cfg(target_arch = "x86_64")]
pub mod cpu;

pub use self::align::*;
pub use self::addr::*;
