//! Provides an interface to the serial COM ports.

use core::fmt;

use super::PortNumber;

/// The usual address of the COM1 port.
pub const COM1_ADDR: PortNumber = PortNumber(0x3F8);

// register offsets relative to the base port
const DATA: u16 = 0;
const INTERRUPT_ENABLE: u16 = 1;
const FIFO_CONTROL: u16 = 2;
const LINE_CONTROL: u16 = 3;
const MODEM_CONTROL: u16 = 4;
const LINE_STATUS: u16 = 5;

/// Line status bit signalling that the transmit holding register is empty.
const TRANSMIT_EMPTY: u8 = 0x20;

/// A safe interface to a serial port identified by its base port number.
#[derive(Debug, Eq, PartialEq)]
pub struct SerialPort(PortNumber);

impl SerialPort {
    /// Creates a new handle to a serial port. This is unsafe for several reason:
    ///   1. some ports allow access to hardware that safe code shouldn't have
    ///   2. it would allow multiple threads to concurrently access the same port
    ///   3. is only safe to use with COM ports
    ///
    /// Therefore, the caller must make sure that writing to this port can do no harm (e.g. writing to COM1),
    /// must ensure that it won't instantiate the same port twice, and that the port number refers to a COM port.
    pub const unsafe fn new(port_number: PortNumber) -> SerialPort {
        SerialPort(port_number)
    }

    /// Program the UART for 38400 baud, 8N1 with FIFOs enabled and interrupts off.
    pub fn init(&mut self) {
        unsafe {
            super::outb(self.0 + INTERRUPT_ENABLE, 0x00);
            // DLAB on, divisor 3
            super::outb(self.0 + LINE_CONTROL, 0x80);
            super::outb(self.0 + DATA, 0x03);
            super::outb(self.0 + INTERRUPT_ENABLE, 0x00);
            // DLAB off, 8 bits, no parity, one stop bit
            super::outb(self.0 + LINE_CONTROL, 0x03);
            super::outb(self.0 + FIFO_CONTROL, 0xC7);
            super::outb(self.0 + MODEM_CONTROL, 0x0B);
        }
    }

    #[inline]
    pub fn write(&mut self, data: &[u8]) {
        for byte in data {
            self.write_byte(*byte);
        }
    }

    #[inline]
    pub fn write_byte(&mut self, data: u8) {
        unsafe {
            while super::inb(self.0 + LINE_STATUS) & TRANSMIT_EMPTY == 0 {
                core::hint::spin_loop();
            }
            super::outb(self.0 + DATA, data);
        }
    }
}

impl fmt::Write for SerialPort {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write(s.as_bytes());
        Ok(())
    }
}
