//! The end of the road for a boot that cannot continue.

use log::error;

use crate::error::BootError;

/// Report `error` and stop the machine for good.
pub fn abort_boot(error: &BootError) -> ! {
    error!("[boot] aborting in {:?}: {}", error.stage(), error);
    halt()
}

/// Disable interrupts and halt forever.
#[cfg(target_arch = "x86_64")]
pub fn halt() -> ! {
    unsafe {
        bare_metal::cpu::disable_interrupts();
        bare_metal::cpu::hang()
    }
}

#[cfg(not(target_arch = "x86_64"))]
pub fn halt() -> ! {
    loop {
        core::hint::spin_loop();
    }
}
