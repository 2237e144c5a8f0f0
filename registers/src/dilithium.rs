/*++

Licensed under the Apache-2.0 license.

File Name:

    dilithium.rs

Abstract:

    File contains the register block for the Dilithium signature accelerator.

--*/

use crate::mmio::{MmioMut, RealMmioMut};
use crate::RegRef;

/// Base address of the accelerator CSR block.
pub const DILITHIUM_REG_ADDR: u32 = 0xf000_4000;

/// A zero-sized type that owns access to the accelerator registers.
///
/// # Safety
///
/// Hardware has exactly one instance of these registers; the caller must
/// ensure only one `DilithiumReg` exists in the firmware at a time.
pub struct DilithiumReg {
    _priv: (),
}

impl DilithiumReg {
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
    /// accelerator registers.
    pub fn regs_mut(&mut self) -> RegisterBlock<RealMmioMut> {
        unsafe { RegisterBlock::new(DILITHIUM_REG_ADDR as *mut u32) }
    }
}

/// Accelerator register block.
///
/// Every CSR is a single 32-bit storage field. The DMA base addresses are
/// 64-bit values split across two words; the high word is written first.
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

    /// Operation select: 0 = keygen, 1 = verify, 2 = sign.
    pub fn mode(&self) -> RegRef<'_, TMmio> {
        self.reg(0)
    }

    /// Parameter set select: 2, 3 or 5.
    pub fn security_level(&self) -> RegRef<'_, TMmio> {
        self.reg(1)
    }

    /// Synchronous reset; held while nonzero.
    pub fn reset(&self) -> RegRef<'_, TMmio> {
        self.reg(2)
    }

    /// Operation start; pulsed.
    pub fn start(&self) -> RegRef<'_, TMmio> {
        self.reg(3)
    }

    /// Reader channel DMA base, bits \[63:32\].
    pub fn reader_base_hi(&self) -> RegRef<'_, TMmio> {
        self.reg(4)
    }

    /// Reader channel DMA base, bits \[31:0\].
    pub fn reader_base_lo(&self) -> RegRef<'_, TMmio> {
        self.reg(5)
    }

    /// Reader channel transfer length in bytes.
    pub fn reader_length(&self) -> RegRef<'_, TMmio> {
        self.reg(6)
    }

    /// Reader channel enable.
    pub fn reader_enable(&self) -> RegRef<'_, TMmio> {
        self.reg(7)
    }

    /// Reader channel completion flag (read-only).
    pub fn reader_done(&self) -> RegRef<'_, TMmio> {
        self.reg(8)
    }

    /// Writer channel DMA base, bits \[63:32\].
    pub fn writer_base_hi(&self) -> RegRef<'_, TMmio> {
        self.reg(9)
    }

    /// Writer channel DMA base, bits \[31:0\].
    pub fn writer_base_lo(&self) -> RegRef<'_, TMmio> {
        self.reg(10)
    }

    /// Writer channel transfer length in bytes.
    pub fn writer_length(&self) -> RegRef<'_, TMmio> {
        self.reg(11)
    }

    /// Writer channel enable.
    pub fn writer_enable(&self) -> RegRef<'_, TMmio> {
        self.reg(12)
    }

    /// Writer channel completion flag (read-only).
    pub fn writer_done(&self) -> RegRef<'_, TMmio> {
        self.reg(13)
    }
}
