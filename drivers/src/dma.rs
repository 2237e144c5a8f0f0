/*++

Licensed under the Apache-2.0 license.

File Name:

    dma.rs

Abstract:

    File contains the DMA transfer engine for the accelerator's reader and
    writer channels.

--*/

use crate::error::{PqsmError, PqsmResult};
use crate::wait;
use pqsm_registers::{MmioMut, RegRef};

/// Rounds `val` up to the next multiple of 8.
///
/// The DMA engine truncates a trailing partial 64-bit beat, so every base
/// address and length handed to hardware is rounded here. This is the only
/// place alignment is enforced; callers pass true byte counts.
pub const fn align8(val: usize) -> usize {
    (val + 7) & !7
}

/// One DMA channel (reader or writer) of the accelerator.
///
/// The reader moves host-buffer bytes into the accelerator; the writer moves
/// accelerator output into a host buffer. The channels are independent and
/// may be active concurrently.
pub struct DmaChannel<'a, TMmio: MmioMut> {
    base_hi: RegRef<'a, TMmio>,
    base_lo: RegRef<'a, TMmio>,
    length: RegRef<'a, TMmio>,
    enable: RegRef<'a, TMmio>,
    done: RegRef<'a, TMmio>,
    spin_budget: u32,
}

impl<'a, TMmio: MmioMut> DmaChannel<'a, TMmio> {
    pub(crate) fn new(
        base_hi: RegRef<'a, TMmio>,
        base_lo: RegRef<'a, TMmio>,
        length: RegRef<'a, TMmio>,
        enable: RegRef<'a, TMmio>,
        done: RegRef<'a, TMmio>,
        spin_budget: u32,
    ) -> Self {
        Self {
            base_hi,
            base_lo,
            length,
            enable,
            done,
            spin_budget,
        }
    }

    /// Programs the channel's base address and transfer length, both rounded
    /// up to a multiple of 8 bytes.
    ///
    /// The channel must be disabled; reconfiguring an enabled channel races
    /// an in-flight transfer.
    pub fn setup(&self, addr: u64, len: u32) {
        let addr = (addr + 7) & !7;
        let len = align8(len as usize) as u32;
        self.base_hi.write((addr >> 32) as u32);
        self.base_lo.write(addr as u32);
        self.length.write(len);
    }

    /// Starts the programmed transfer.
    pub fn start(&self) {
        self.enable.write(1);
    }

    /// Returns whether a transfer is still in flight; once the transfer has
    /// completed (or was never started) the enable bit is cleared.
    pub fn in_progress(&self) -> bool {
        if self.enable.read() != 0 && self.done.read() == 0 {
            true
        } else {
            self.enable.write(0);
            false
        }
    }

    /// Spin-polls the completion flag, then disables the channel.
    ///
    /// The poll is bounded by the configured spin budget so a stalled
    /// accelerator surfaces as `HardwareFault` instead of hanging the
    /// caller.
    pub fn wait(&self) -> PqsmResult<()> {
        if wait::until_or_budget(self.spin_budget, || !self.in_progress()) {
            Ok(())
        } else {
            Err(PqsmError::HardwareFault)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align8_is_idempotent_on_multiples() {
        for val in [0usize, 8, 16, 64, 256, 8192] {
            assert_eq!(align8(val), val);
        }
    }

    #[test]
    fn test_align8_returns_smallest_multiple_not_below_input() {
        for val in 0usize..=257 {
            let rounded = align8(val);
            assert_eq!(rounded % 8, 0);
            assert!(rounded >= val);
            assert!(rounded < val + 8);
        }
    }
}
