/*++

Licensed under the Apache-2.0 license.

File Name:

    uart.rs

Abstract:

    File contains API for accessing the host-link UART.

--*/

use crate::transport::SerialIo;
use pqsm_registers::uart::UartReg;

/// Host-link UART.
#[derive(Default, Debug)]
pub struct Uart {}

impl Uart {
    /// Create an instance of the UART driver.
    pub fn new() -> Self {
        Self {}
    }

    /// Write a byte to the UART, blocking while the transmit FIFO is full.
    pub fn write_byte(&mut self, byte: u8) {
        let mut reg = unsafe { UartReg::new() };
        let regs = reg.regs_mut();
        while regs.txfull().read() != 0 {}
        regs.rxtx().write(byte as u32);
    }

    /// Read a byte from the UART, blocking while the receive FIFO is empty.
    pub fn read_byte(&mut self) -> u8 {
        let mut reg = unsafe { UartReg::new() };
        let regs = reg.regs_mut();
        while regs.rxempty().read() != 0 {}
        regs.rxtx().read() as u8
    }
}

impl SerialIo for Uart {
    fn read_byte(&mut self) -> u8 {
        Uart::read_byte(self)
    }

    fn write_byte(&mut self, byte: u8) {
        Uart::write_byte(self, byte)
    }
}
