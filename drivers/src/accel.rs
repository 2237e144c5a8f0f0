/*++

Licensed under the Apache-2.0 license.

File Name:

    accel.rs

Abstract:

    File contains the register-level interface to the Dilithium signature
    accelerator.

--*/

use crate::dma::DmaChannel;
use crate::params::SecurityLevel;
use pqsm_registers::dilithium::RegisterBlock;
use pqsm_registers::{MmioMut, RealMmioMut};

/// Default spin budget for DMA completion polls.
pub const DEFAULT_SPIN_BUDGET: u32 = 50_000_000;

/// Accelerator operation select.
///
/// The encoding doubles as the host command byte.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u32)]
pub enum Mode {
    Keygen = 0,
    Verify = 1,
    Sign = 2,
}

/// Dilithium accelerator register interface.
///
/// Owns the register block; at most one instance exists per hardware
/// engine, which is what gates concurrent callers.
pub struct Accelerator<TMmio: MmioMut = RealMmioMut> {
    regs: RegisterBlock<TMmio>,
    spin_budget: u32,
}

impl<TMmio: MmioMut> Accelerator<TMmio> {
    /// Creates the interface over a register block.
    pub fn new(regs: RegisterBlock<TMmio>) -> Self {
        Self {
            regs,
            spin_budget: DEFAULT_SPIN_BUDGET,
        }
    }

    /// Overrides the DMA completion spin budget.
    pub fn set_spin_budget(&mut self, spin_budget: u32) {
        self.spin_budget = spin_budget;
    }

    /// Runs the fixed reset sequence. Must precede every operation:
    /// assert reset, clear start, disable both channels, clear reset.
    pub fn reset(&self) {
        self.regs.reset().write(1);
        self.regs.start().write(0);
        self.regs.reader_enable().write(0);
        self.regs.writer_enable().write(0);
        self.regs.reset().write(0);
    }

    /// Programs the operation and parameter set.
    pub fn setup(&self, mode: Mode, level: SecurityLevel) {
        self.regs.mode().write(mode as u32);
        self.regs.security_level().write(level.to_wire() as u32);
    }

    /// Pulses the start trigger.
    pub fn start(&self) {
        self.regs.start().write(1);
        self.regs.start().write(0);
    }

    /// Reader channel: host buffer to accelerator.
    pub fn reader(&self) -> DmaChannel<'_, TMmio> {
        DmaChannel::new(
            self.regs.reader_base_hi(),
            self.regs.reader_base_lo(),
            self.regs.reader_length(),
            self.regs.reader_enable(),
            self.regs.reader_done(),
            self.spin_budget,
        )
    }

    /// Writer channel: accelerator to host buffer.
    pub fn writer(&self) -> DmaChannel<'_, TMmio> {
        DmaChannel::new(
            self.regs.writer_base_hi(),
            self.regs.writer_base_lo(),
            self.regs.writer_length(),
            self.regs.writer_enable(),
            self.regs.writer_done(),
            self.spin_budget,
        )
    }
}
