/*++

Licensed under the Apache-2.0 license.

File Name:

    accel.rs

Abstract:

    File contains the emulated Dilithium signature accelerator peripheral.

    The model implements the register contract exactly: the fixed reset
    sequence, mode/level latching on the start pulse, and per-channel DMA
    with enable/done handshakes. Reader transfers are captured one DMA
    enable at a time, so the chunked ingestion flow the firmware drives is
    observable; writer transfers complete only once the operation's input
    stream has been fully consumed.

--*/

use crate::bus::{Bus, BusError};
use crate::crypto;
use crate::types::{RvAddr, RvData, RvSize};
use pqsm_drivers::params::{field_len, KeyField, SecurityLevel, C_SIZE, RHO_SIZE, SEED_SIZE};

/// Base address of the accelerator CSR block.
pub const DILITHIUM_MODEL_ADDR: RvAddr = 0xf000_4000;

const fn pad8(val: usize) -> usize {
    (val + 7) & !7
}

/// Reads `len` bytes of host memory, as the reader DMA does.
///
/// The addresses come straight from the DMA base registers; the driver
/// programs them with scratch-buffer addresses that stay alive for the
/// duration of the (synchronous) operation.
unsafe fn dma_read(addr: u64, len: usize) -> Vec<u8> {
    let ptr = addr as usize as *const u8;
    (0..len).map(|i| ptr.add(i).read_volatile()).collect()
}

/// Writes `data` to host memory, as the writer DMA does.
unsafe fn dma_write(addr: u64, data: &[u8]) {
    let ptr = addr as usize as *mut u8;
    for (i, &byte) in data.iter().enumerate() {
        ptr.add(i).write_volatile(byte);
    }
}

#[derive(Default)]
struct Channel {
    base_hi: u32,
    base_lo: u32,
    length: u32,
    enable: bool,
    done: bool,
}

impl Channel {
    fn base(&self) -> u64 {
        (self.base_hi as u64) << 32 | self.base_lo as u64
    }

    fn clear(&mut self) {
        self.enable = false;
        self.done = false;
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Op {
    Keygen,
    Verify,
    Sign,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Phase {
    /// First reader payload: seed (keygen), `(Rho, mlen, Tr)` (sign) or
    /// `(Rho, C, Z, T1, mlen)` (verify).
    Head,
    /// Message stream, bounded by the mlen carried in the head payload.
    Message,
    /// Final reader payload: `(K, S1, S2, T0)` (sign) or H (verify).
    Tail,
    Complete,
}

/// One in-flight accelerator operation.
struct Engine {
    op: Op,
    level: SecurityLevel,
    phase: Phase,
    rho: Vec<u8>,
    msg_len: u64,
    msg: Vec<u8>,
    c: Vec<u8>,
    z: Vec<u8>,
    t1: Vec<u8>,
    sk_feed_needed: usize,
    sk_feed_got: usize,
    output: Option<Vec<u8>>,
}

impl Engine {
    fn new(op: Op, level: SecurityLevel) -> Self {
        let sk_feed_needed = pad8(field_len(KeyField::K, level))
            + pad8(field_len(KeyField::S1, level))
            + pad8(field_len(KeyField::S2, level))
            + pad8(field_len(KeyField::T0, level));
        Self {
            op,
            level,
            phase: Phase::Head,
            rho: Vec::new(),
            msg_len: 0,
            msg: Vec::new(),
            c: Vec::new(),
            z: Vec::new(),
            t1: Vec::new(),
            sk_feed_needed,
            sk_feed_got: 0,
            output: None,
        }
    }

    /// Consumes one reader transfer. Bytes beyond what the current phase
    /// needs are DMA alignment padding and are discarded with the
    /// transfer.
    fn feed(&mut self, transfer: &[u8]) {
        match self.phase {
            Phase::Head => self.feed_head(transfer),
            Phase::Message => {
                let remaining = (self.msg_len as usize) - self.msg.len();
                let take = remaining.min(transfer.len());
                self.msg.extend_from_slice(&transfer[..take]);
                if self.msg.len() == self.msg_len as usize {
                    self.advance_past_message();
                }
            }
            Phase::Tail => self.feed_tail(transfer),
            Phase::Complete => {}
        }
    }

    fn feed_head(&mut self, transfer: &[u8]) {
        match self.op {
            Op::Keygen => {
                if transfer.len() < SEED_SIZE {
                    return;
                }
                let km = crypto::expand_keypair(self.level, &transfer[..SEED_SIZE]);
                let mut image = Vec::new();
                for part in [&km.rho, &km.k, &km.s1, &km.s2, &km.t1, &km.t0, &km.tr] {
                    image.extend_from_slice(part);
                    image.resize(pad8(image.len()), 0);
                }
                self.output = Some(image);
                self.phase = Phase::Complete;
            }
            Op::Sign => {
                if transfer.len() < RHO_SIZE + 8 {
                    return;
                }
                self.rho = transfer[..RHO_SIZE].to_vec();
                let mut mlen = [0u8; 8];
                mlen.copy_from_slice(&transfer[RHO_SIZE..RHO_SIZE + 8]);
                self.msg_len = u64::from_be_bytes(mlen);
                self.phase = Phase::Message;
                if self.msg_len == 0 {
                    self.advance_past_message();
                }
            }
            Op::Verify => {
                let z_len = field_len(KeyField::Z, self.level);
                let t1_len = field_len(KeyField::T1, self.level);
                let head_len = RHO_SIZE + C_SIZE + z_len + t1_len + 8;
                if transfer.len() < head_len {
                    return;
                }
                let mut offset = 0;
                self.rho = transfer[offset..offset + RHO_SIZE].to_vec();
                offset += RHO_SIZE;
                self.c = transfer[offset..offset + C_SIZE].to_vec();
                offset += C_SIZE;
                self.z = transfer[offset..offset + z_len].to_vec();
                offset += z_len;
                self.t1 = transfer[offset..offset + t1_len].to_vec();
                offset += t1_len;
                let mut mlen = [0u8; 8];
                mlen.copy_from_slice(&transfer[offset..offset + 8]);
                self.msg_len = u64::from_be_bytes(mlen);
                self.phase = Phase::Message;
                if self.msg_len == 0 {
                    self.advance_past_message();
                }
            }
        }
    }

    fn advance_past_message(&mut self) {
        self.phase = Phase::Tail;
    }

    fn feed_tail(&mut self, transfer: &[u8]) {
        match self.op {
            Op::Keygen => {}
            Op::Sign => {
                self.sk_feed_got += transfer.len();
                if self.sk_feed_got >= self.sk_feed_needed {
                    let (z, h, c) =
                        crypto::signature_parts(self.level, &self.rho, self.msg_len, &self.msg);
                    let mut image = Vec::new();
                    for part in [&z, &h, &c] {
                        image.extend_from_slice(part);
                        image.resize(pad8(image.len()), 0);
                    }
                    self.output = Some(image);
                    self.phase = Phase::Complete;
                }
            }
            Op::Verify => {
                let h_len = field_len(KeyField::H, self.level);
                if transfer.len() < h_len {
                    return;
                }
                let h = &transfer[..h_len];
                let (exp_z, exp_h, exp_c) =
                    crypto::signature_parts(self.level, &self.rho, self.msg_len, &self.msg);
                let exp_t1 = crypto::derive_t1(self.level, &self.rho);
                let accepted =
                    self.z == exp_z && h == exp_h && self.c == exp_c && self.t1 == exp_t1;
                // Result word: zero means accepted, nonzero rejected.
                let word: u64 = if accepted { 0 } else { 1 };
                self.output = Some(word.to_le_bytes().to_vec());
                self.phase = Phase::Complete;
            }
        }
    }
}

/// Emulated accelerator peripheral.
pub struct DilithiumModel {
    mode: u32,
    level: u32,
    reset: u32,
    start: u32,
    reader: Channel,
    writer: Channel,
    engine: Option<Engine>,
    /// Reader transfers received before the start pulse latched an
    /// operation (the keygen flow enables the seed DMA first).
    pending: Vec<Vec<u8>>,
    /// Test hook: leave the reader incomplete forever.
    pub stall_reader: bool,
    /// Test hook: leave the writer incomplete forever.
    pub stall_writer: bool,
    /// Every reader transfer, as captured from host memory.
    pub reader_transfers: Vec<Vec<u8>>,
    /// Total register writes observed.
    pub reg_writes: usize,
}

impl DilithiumModel {
    const ADDR_MODE: RvAddr = 0x00;
    const ADDR_SECURITY_LEVEL: RvAddr = 0x04;
    const ADDR_RESET: RvAddr = 0x08;
    const ADDR_START: RvAddr = 0x0c;
    const ADDR_READER_BASE_HI: RvAddr = 0x10;
    const ADDR_READER_BASE_LO: RvAddr = 0x14;
    const ADDR_READER_LENGTH: RvAddr = 0x18;
    const ADDR_READER_ENABLE: RvAddr = 0x1c;
    const ADDR_READER_DONE: RvAddr = 0x20;
    const ADDR_WRITER_BASE_HI: RvAddr = 0x24;
    const ADDR_WRITER_BASE_LO: RvAddr = 0x28;
    const ADDR_WRITER_LENGTH: RvAddr = 0x2c;
    const ADDR_WRITER_ENABLE: RvAddr = 0x30;
    const ADDR_WRITER_DONE: RvAddr = 0x34;

    pub fn new() -> Self {
        Self {
            mode: 0,
            level: 0,
            reset: 0,
            start: 0,
            reader: Channel::default(),
            writer: Channel::default(),
            engine: None,
            pending: Vec::new(),
            stall_reader: false,
            stall_writer: false,
            reader_transfers: Vec::new(),
            reg_writes: 0,
        }
    }

    /// Drops the captured reader transfer log and returns it.
    pub fn take_reader_transfers(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.reader_transfers)
    }

    fn do_reset(&mut self) {
        self.engine = None;
        self.pending.clear();
        self.reader.clear();
        self.writer.clear();
    }

    fn on_start(&mut self) {
        let op = match self.mode {
            0 => Some(Op::Keygen),
            1 => Some(Op::Verify),
            2 => Some(Op::Sign),
            _ => None,
        };
        let level = SecurityLevel::from_wire(self.level as u8);
        self.engine = match (op, level) {
            (Some(op), Some(level)) => Some(Engine::new(op, level)),
            _ => None,
        };
        let pending = std::mem::take(&mut self.pending);
        if let Some(engine) = self.engine.as_mut() {
            for transfer in &pending {
                engine.feed(transfer);
            }
        }
        self.try_flush_writer();
    }

    fn on_reader_enable(&mut self) {
        self.reader.enable = true;
        if self.stall_reader {
            self.reader.done = false;
            return;
        }
        let transfer = unsafe { dma_read(self.reader.base(), self.reader.length as usize) };
        self.reader_transfers.push(transfer.clone());
        match self.engine.as_mut() {
            Some(engine) => engine.feed(&transfer),
            None => self.pending.push(transfer),
        }
        self.reader.done = true;
        self.try_flush_writer();
    }

    fn on_writer_enable(&mut self) {
        self.writer.enable = true;
        if self.stall_writer {
            self.writer.done = false;
            return;
        }
        self.try_flush_writer();
    }

    /// Completes the writer once the operation has produced its output.
    fn try_flush_writer(&mut self) {
        if !self.writer.enable || self.writer.done || self.stall_writer {
            return;
        }
        let output = match self.engine.as_ref().and_then(|e| e.output.as_ref()) {
            Some(output) => output,
            None => return,
        };
        let mut data = output.clone();
        data.resize(self.writer.length as usize, 0);
        unsafe { dma_write(self.writer.base(), &data) };
        self.writer.done = true;
    }
}

impl Default for DilithiumModel {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for DilithiumModel {
    fn read(&mut self, size: RvSize, addr: RvAddr) -> Result<RvData, BusError> {
        if size != RvSize::Word {
            return Err(BusError::LoadAccessFault);
        }
        let offset = addr
            .checked_sub(DILITHIUM_MODEL_ADDR)
            .ok_or(BusError::LoadAccessFault)?;
        match offset {
            Self::ADDR_MODE => Ok(self.mode),
            Self::ADDR_SECURITY_LEVEL => Ok(self.level),
            Self::ADDR_RESET => Ok(self.reset),
            Self::ADDR_START => Ok(self.start),
            Self::ADDR_READER_BASE_HI => Ok(self.reader.base_hi),
            Self::ADDR_READER_BASE_LO => Ok(self.reader.base_lo),
            Self::ADDR_READER_LENGTH => Ok(self.reader.length),
            Self::ADDR_READER_ENABLE => Ok(self.reader.enable as u32),
            Self::ADDR_READER_DONE => Ok(self.reader.done as u32),
            Self::ADDR_WRITER_BASE_HI => Ok(self.writer.base_hi),
            Self::ADDR_WRITER_BASE_LO => Ok(self.writer.base_lo),
            Self::ADDR_WRITER_LENGTH => Ok(self.writer.length),
            Self::ADDR_WRITER_ENABLE => Ok(self.writer.enable as u32),
            Self::ADDR_WRITER_DONE => {
                self.try_flush_writer();
                Ok(self.writer.done as u32)
            }
            _ => Err(BusError::LoadAccessFault),
        }
    }

    fn write(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), BusError> {
        if size != RvSize::Word {
            return Err(BusError::StoreAccessFault);
        }
        let offset = addr
            .checked_sub(DILITHIUM_MODEL_ADDR)
            .ok_or(BusError::StoreAccessFault)?;
        self.reg_writes += 1;
        match offset {
            Self::ADDR_MODE => self.mode = val,
            Self::ADDR_SECURITY_LEVEL => self.level = val,
            Self::ADDR_RESET => {
                if val != 0 {
                    self.do_reset();
                }
                self.reset = val;
            }
            Self::ADDR_START => {
                if val != 0 && self.start == 0 {
                    self.on_start();
                }
                self.start = val;
            }
            Self::ADDR_READER_BASE_HI => self.reader.base_hi = val,
            Self::ADDR_READER_BASE_LO => self.reader.base_lo = val,
            Self::ADDR_READER_LENGTH => self.reader.length = val,
            Self::ADDR_READER_ENABLE => {
                if val != 0 {
                    self.on_reader_enable();
                } else {
                    self.reader.enable = false;
                }
            }
            Self::ADDR_WRITER_BASE_HI => self.writer.base_hi = val,
            Self::ADDR_WRITER_BASE_LO => self.writer.base_lo = val,
            Self::ADDR_WRITER_LENGTH => self.writer.length = val,
            Self::ADDR_WRITER_ENABLE => {
                if val != 0 {
                    self.on_writer_enable();
                } else {
                    self.writer.enable = false;
                }
            }
            _ => Err(BusError::StoreAccessFault)?,
        }
        Ok(())
    }
}
