/*++

Licensed under the Apache-2.0 license.

File Name:

    uart.rs

Abstract:

    File contains the register block for the host-link UART.

--*/

use crate::mmio::{MmioMut, RealMmioMut};
use crate::RegRef;

/// Base address of the UART CSR block.
pub const UART_REG_ADDR: u32 = 0xf000_1000;

/// A zero-sized type that owns access to the UART registers.
pub struct UartReg {
    _priv: (),
}

impl UartReg {
    /// # Safety
    ///
    /// Caller must ensure that all concurrent use of this peripheral in the
    /// firmware is done so in a compatible way. The simplest way to enforce
    /// this is to only call this function once.
    #[inline(always)]
    pub unsafe fn new() -> Self {
        Self { _priv: () }
    }

    /// Returns a register block that can be used to read and write the
    /// UART registers.
    pub fn regs_mut(&mut self) -> RegisterBlock<RealMmioMut> {
        unsafe { RegisterBlock::new(UART_REG_ADDR as *mut u32) }
    }
}

/// UART register block (LiteX CSR flavor).
pub struct RegisterBlock<TMmio: MmioMut = RealMmioMut> {
    ptr: *mut u32,
    mmio: TMmio,
}

impl RegisterBlock<RealMmioMut> {
    /// # Safety
    ///
    /// The caller is responsible for ensuring that `ptr` is valid for
    /// volatile reads and writes at any of the register block's offsets.
    pub unsafe fn new(ptr: *mut u32) -> Self {
        Self {
            ptr,
            mmio: RealMmioMut::default(),
        }
    }
}

impl<TMmio: MmioMut> RegisterBlock<TMmio> {
    /// # Safety
    ///
    /// The caller is responsible for ensuring that `ptr` is valid for
    /// volatile reads and writes at any of the register block's offsets
    /// through the given `mmio`.
    pub unsafe fn new_with_mmio(ptr: *mut u32, mmio: TMmio) -> Self {
        Self { ptr, mmio }
    }

    fn reg(&self, word_offset: usize) -> RegRef<'_, TMmio> {
        unsafe { RegRef::new(self.ptr.add(word_offset), &self.mmio) }
    }

    /// Receive/transmit data window.
    pub fn rxtx(&self) -> RegRef<'_, TMmio> {
        self.reg(0)
    }

    /// Nonzero when the transmit FIFO is full.
    pub fn txfull(&self) -> RegRef<'_, TMmio> {
        self.reg(1)
    }

    /// Nonzero when the receive FIFO is empty.
    pub fn rxempty(&self) -> RegRef<'_, TMmio> {
        self.reg(2)
    }

    /// Nonzero when the transmit FIFO is empty.
    pub fn txempty(&self) -> RegRef<'_, TMmio> {
        self.reg(3)
    }

    /// Nonzero when the receive FIFO is full.
    pub fn rxfull(&self) -> RegRef<'_, TMmio> {
        self.reg(4)
    }
}
