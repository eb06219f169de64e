//! A `log` sink writing to the first serial port.

use core::fmt::Write;

use bare_metal::cpu::io::com::{SerialPort, COM1_ADDR};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Mutex;

pub struct SerialLogger {
    port: Mutex<SerialPort>,
}

// This is the only place where COM1 is instantiated.
static LOGGER: SerialLogger = SerialLogger {
    port: Mutex::new(unsafe { SerialPort::new(COM1_ADDR) }),
};

/// Program COM1 and install the serial logger. May only succeed once.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    LOGGER.port.lock().init();
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

/// Release the serial port lock, which a panicking logger call may still hold.
///
/// # Safety
/// Nothing else may be writing to the port.
pub unsafe fn force_unlock() {
    if LOGGER.port.is_locked() {
        LOGGER.port.force_unlock();
    }
}

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut port = self.port.lock();
        // nothing sensible to do if the serial port fails
        let _ = writeln!(port, "[{}] {}: {}", record.level(), record.target(), record.args());
    }

    fn flush(&self) {}
}
