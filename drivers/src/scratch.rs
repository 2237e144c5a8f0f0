/*++

Licensed under the Apache-2.0 license.

File Name:

    scratch.rs

Abstract:

    File contains the scratch buffer resource shared by all accelerator DMA
    traffic.

--*/

use crate::error::{PqsmError, PqsmResult};
use zeroize::Zeroize;

/// Size of the on-chip staging region. Large enough for the biggest
/// per-operation scratch map at security level 5.
pub const SCRATCH_SIZE: usize = 16 * 1024;

/// Backing store for the scratch buffer, aligned for the DMA engine.
#[repr(C, align(8))]
pub struct ScratchMem(pub [u8; SCRATCH_SIZE]);

impl ScratchMem {
    pub const fn new() -> Self {
        Self([0u8; SCRATCH_SIZE])
    }
}

impl Default for ScratchMem {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive view of the staging region used for all accelerator DMA
/// traffic.
///
/// One operation owns the whole buffer at a time; secret-key material
/// staged here is zeroized before the buffer serves another purpose.
pub struct ScratchBuffer<'a> {
    buf: &'a mut [u8],
}

impl<'a> ScratchBuffer<'a> {
    /// Wraps a raw byte region. The region must start on an 8-byte boundary
    /// and be at least [`SCRATCH_SIZE`] bytes.
    pub fn new(buf: &'a mut [u8]) -> PqsmResult<Self> {
        if buf.as_ptr() as usize % 8 != 0 {
            return Err(PqsmError::InvalidArgument);
        }
        if buf.len() < SCRATCH_SIZE {
            return Err(PqsmError::BufferTooSmall);
        }
        Ok(Self { buf })
    }

    /// Wraps the dedicated backing store.
    pub fn from_mem(mem: &'a mut ScratchMem) -> Self {
        Self { buf: &mut mem.0 }
    }

    /// Bus address of `offset` within the buffer, as programmed into the
    /// DMA base registers.
    pub fn addr(&self, offset: usize) -> u64 {
        self.buf.as_ptr() as usize as u64 + offset as u64
    }

    pub fn bytes(&self, offset: usize, len: usize) -> &[u8] {
        &self.buf[offset..offset + len]
    }

    pub fn bytes_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        &mut self.buf[offset..offset + len]
    }

    /// Copies `src` into the buffer at `offset`.
    pub fn write(&mut self, offset: usize, src: &[u8]) {
        self.buf[offset..offset + src.len()].copy_from_slice(src);
    }

    /// Reads a little-endian 64-bit word, as deposited by the writer DMA.
    pub fn read_u64_le(&self, offset: usize) -> u64 {
        let mut word = [0u8; 8];
        word.copy_from_slice(&self.buf[offset..offset + 8]);
        u64::from_le_bytes(word)
    }

    /// Volatile-zeroes a region; used to scrub secret material before the
    /// buffer is reused.
    pub fn zeroize_region(&mut self, offset: usize, len: usize) {
        self.buf[offset..offset + len].zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_misaligned_region() {
        let mut mem = ScratchMem::new();
        let misaligned = &mut mem.0[1..];
        assert_eq!(
            ScratchBuffer::new(misaligned).err(),
            Some(PqsmError::InvalidArgument)
        );
    }

    #[test]
    fn test_rejects_short_region() {
        let mut mem = ScratchMem::new();
        let short = &mut mem.0[..SCRATCH_SIZE - 8];
        assert_eq!(
            ScratchBuffer::new(short).err(),
            Some(PqsmError::BufferTooSmall)
        );
    }

    #[test]
    fn test_write_read_and_zeroize() {
        let mut mem = ScratchMem::new();
        let mut scratch = ScratchBuffer::from_mem(&mut mem);
        scratch.write(8, &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(scratch.read_u64_le(8), u64::from_le_bytes([1, 2, 3, 4, 5, 6, 7, 8]));
        scratch.zeroize_region(8, 8);
        assert_eq!(scratch.read_u64_le(8), 0);
    }
}
