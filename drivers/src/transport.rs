/*++

Licensed under the Apache-2.0 license.

File Name:

    transport.rs

Abstract:

    File contains the host-facing streaming protocol: handshake bytes,
    request/response headers and ACK-windowed bulk transfer.

--*/

use crate::error::{PqsmError, PqsmResult};
use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{AsBytes, FromBytes};

/// Host announces presence.
pub const SYNC_BYTE: u8 = 0xB0;
/// Firmware answers a SYNC.
pub const READY_BYTE: u8 = 0xA0;
/// Brackets every data-bearing exchange.
pub const START_BYTE: u8 = 0xAC;
/// Flow-control acknowledgement.
pub const ACK_BYTE: u8 = 0xCC;

/// Default acknowledgement window for bulk transfers. Short cryptographic
/// fields use their own length as the window instead.
pub const BASE_ACK_GROUP_LEN: usize = 64;

/// `verify_res` values in the response header.
pub const VERIFY_RES_ACCEPTED: u8 = 1;
pub const VERIFY_RES_REJECTED: u8 = 0;
pub const VERIFY_RES_NA: u8 = 0xFF;

/// Byte-at-a-time serial link. The UART on hardware; a scripted host in
/// tests.
pub trait SerialIo {
    /// Blocks until a byte is available and returns it.
    fn read_byte(&mut self) -> u8;
    /// Blocks until the byte has been queued for transmission.
    fn write_byte(&mut self, byte: u8);
}

/// Request header, acknowledged as one unit.
#[repr(C)]
#[derive(AsBytes, FromBytes, Clone, Copy, Debug)]
pub struct RequestHeader {
    pub cmd: u8,
    pub sec_level: u8,
    pub msg_len: U32<LittleEndian>,
    pub reserved: [u8; 2],
}

impl RequestHeader {
    pub const LEN: usize = 8;

    pub fn new(cmd: u8, sec_level: u8, msg_len: u32) -> Self {
        Self {
            cmd,
            sec_level,
            msg_len: U32::new(msg_len),
            reserved: [0; 2],
        }
    }
}

/// Response header.
#[repr(C)]
#[derive(AsBytes, FromBytes, Clone, Copy, Debug)]
pub struct ResponseHeader {
    pub cmd: u8,
    pub sec_level: u8,
    pub rsp_code: u8,
    pub verify_res: u8,
}

impl ResponseHeader {
    pub const LEN: usize = 4;
}

pub fn send_ack<S: SerialIo>(io: &mut S) {
    io.write_byte(ACK_BYTE);
}

pub fn send_ready<S: SerialIo>(io: &mut S) {
    io.write_byte(READY_BYTE);
}

pub fn send_start<S: SerialIo>(io: &mut S) {
    io.write_byte(START_BYTE);
}

/// Reads the host's acknowledgement byte. Anything else means the link has
/// desynchronized; there is no retransmission.
pub fn wait_for_ack<S: SerialIo>(io: &mut S) -> PqsmResult<()> {
    if io.read_byte() == ACK_BYTE {
        Ok(())
    } else {
        Err(PqsmError::ProtocolDesync)
    }
}

/// Firmware-initiated transfer handshake: START out, ACK back.
pub fn transmission_handshake<S: SerialIo>(io: &mut S) -> PqsmResult<()> {
    send_start(io);
    wait_for_ack(io)
}

pub fn read_request_header<S: SerialIo>(io: &mut S) -> PqsmResult<RequestHeader> {
    let mut raw = [0u8; RequestHeader::LEN];
    for byte in raw.iter_mut() {
        *byte = io.read_byte();
    }
    RequestHeader::read_from(raw.as_slice()).ok_or(PqsmError::InvalidArgument)
}

pub fn send_response<S: SerialIo>(io: &mut S, rsp: &ResponseHeader) {
    for &byte in rsp.as_bytes() {
        io.write_byte(byte);
    }
}

/// Receives `dst.len()` bytes, acknowledging after every full
/// `ack_group`-byte window except a window ending on the transfer's final
/// byte. An `ack_group` of zero disables windowing; a window larger than
/// the transfer is an argument error.
pub fn read_exact<S: SerialIo>(io: &mut S, dst: &mut [u8], ack_group: usize) -> PqsmResult<()> {
    if ack_group > dst.len() {
        return Err(PqsmError::InvalidArgument);
    }
    let total = dst.len();
    let mut counter = 0;
    for (i, byte) in dst.iter_mut().enumerate() {
        *byte = io.read_byte();
        if ack_group > 0 {
            counter += 1;
            if counter == ack_group && i < total - 1 {
                send_ack(io);
                counter = 0;
            }
        }
    }
    Ok(())
}

/// Sends `src`, blocking on the host's acknowledgement after every full
/// `ack_group`-byte window except a window ending on the transfer's final
/// byte.
pub fn send_exact<S: SerialIo>(io: &mut S, src: &[u8], ack_group: usize) -> PqsmResult<()> {
    if ack_group > src.len() {
        return Err(PqsmError::InvalidArgument);
    }
    let total = src.len();
    let mut counter = 0;
    for (i, &byte) in src.iter().enumerate() {
        io.write_byte(byte);
        if ack_group > 0 {
            counter += 1;
            if counter == ack_group && i < total - 1 {
                wait_for_ack(io)?;
                counter = 0;
            }
        }
    }
    Ok(())
}

/// Receives one logical transfer across multiple staging reads, carrying
/// the acknowledgement window over the read boundaries.
///
/// The message body of a sign/verify operation arrives this way: the
/// transfer is windowed as one unit, but the bytes are staged in
/// DMA-chunk-sized pieces, and the window acknowledgement falling on a
/// chunk boundary is deferred until the next read — after the previous
/// chunk's DMA has completed. That deferral is the backpressure that stops
/// the host from overwriting a chunk the accelerator is still consuming.
pub struct WindowedReader {
    total: usize,
    received: usize,
    ack_group: usize,
    ack_pending: bool,
}

impl WindowedReader {
    pub fn new(total: usize, ack_group: usize) -> Self {
        Self {
            total,
            received: 0,
            ack_group,
            ack_pending: false,
        }
    }

    /// Bytes of the transfer not yet received.
    pub fn remaining(&self) -> usize {
        self.total - self.received
    }

    /// Reads exactly `dst.len()` bytes of the transfer. Must not exceed
    /// [`Self::remaining`].
    pub fn read_into<S: SerialIo>(&mut self, io: &mut S, dst: &mut [u8]) -> PqsmResult<()> {
        if dst.len() > self.remaining() {
            return Err(PqsmError::InvalidArgument);
        }
        if self.ack_pending {
            send_ack(io);
            self.ack_pending = false;
        }
        let len = dst.len();
        for (i, byte) in dst.iter_mut().enumerate() {
            *byte = io.read_byte();
            self.received += 1;
            if self.ack_group > 0
                && self.received % self.ack_group == 0
                && self.received < self.total
            {
                if i < len - 1 {
                    send_ack(io);
                } else {
                    // Window closed on the staging boundary; acknowledge
                    // once the chunk has been handed off.
                    self.ack_pending = true;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct PipeIo {
        incoming: VecDeque<u8>,
        outgoing: Vec<u8>,
    }

    impl SerialIo for PipeIo {
        fn read_byte(&mut self) -> u8 {
            self.incoming.pop_front().expect("script underrun")
        }
        fn write_byte(&mut self, byte: u8) {
            self.outgoing.push(byte);
        }
    }

    #[test]
    fn test_request_header_round_trip() {
        let hdr = RequestHeader::new(2, 5, 0x0123_4567);
        let bytes = hdr.as_bytes();
        assert_eq!(bytes.len(), RequestHeader::LEN);
        assert_eq!(bytes[0], 2);
        assert_eq!(bytes[1], 5);
        // Little-endian message length.
        assert_eq!(&bytes[2..6], &[0x67, 0x45, 0x23, 0x01]);
        let parsed = RequestHeader::read_from(bytes).unwrap();
        assert_eq!(parsed.msg_len.get(), 0x0123_4567);
    }

    #[test]
    fn test_read_exact_ack_windows() {
        // 600 bytes with a 64-byte window: 9 intermediate ACKs, none after
        // the final short window.
        let mut io = PipeIo::default();
        io.incoming.extend(core::iter::repeat(0xAB).take(600));
        let mut dst = [0u8; 600];
        read_exact(&mut io, &mut dst, BASE_ACK_GROUP_LEN).unwrap();
        assert_eq!(io.outgoing.len(), 9);
        assert!(io.outgoing.iter().all(|&b| b == ACK_BYTE));
    }

    #[test]
    fn test_read_exact_no_ack_when_window_is_whole_transfer() {
        let mut io = PipeIo::default();
        io.incoming.extend(core::iter::repeat(0x11).take(32));
        let mut dst = [0u8; 32];
        read_exact(&mut io, &mut dst, 32).unwrap();
        assert!(io.outgoing.is_empty());
    }

    #[test]
    fn test_read_exact_rejects_oversized_window() {
        let mut io = PipeIo::default();
        let mut dst = [0u8; 16];
        assert_eq!(
            read_exact(&mut io, &mut dst, 64),
            Err(PqsmError::InvalidArgument)
        );
    }

    #[test]
    fn test_send_exact_waits_for_window_acks() {
        let mut io = PipeIo::default();
        // Two full windows and a remainder: two host ACKs consumed.
        io.incoming.extend([ACK_BYTE, ACK_BYTE]);
        let src = [0x5Au8; 150];
        send_exact(&mut io, &src, 64).unwrap();
        assert_eq!(io.outgoing.len(), 150);
        assert!(io.incoming.is_empty());
    }

    #[test]
    fn test_send_exact_desync_on_wrong_ack() {
        let mut io = PipeIo::default();
        io.incoming.push_back(0x00);
        let src = [0u8; 130];
        assert_eq!(send_exact(&mut io, &src, 64), Err(PqsmError::ProtocolDesync));
    }

    #[test]
    fn test_windowed_reader_carries_window_across_chunks() {
        // 600-byte transfer staged as 256 + 256 + 88, window 64: exactly 9
        // ACKs total, the chunk-boundary ones deferred to the next read.
        let mut io = PipeIo::default();
        io.incoming.extend(core::iter::repeat(0xCD).take(600));
        let mut reader = WindowedReader::new(600, BASE_ACK_GROUP_LEN);
        let mut acks = Vec::new();
        for chunk_len in [256usize, 256, 88] {
            let mut chunk = vec![0u8; chunk_len];
            reader.read_into(&mut io, &mut chunk).unwrap();
            acks.push(io.outgoing.len());
        }
        assert_eq!(reader.remaining(), 0);
        // 3 inline ACKs per 256-byte chunk, the boundary ACK deferred into
        // the following read, and one inline ACK in the 88-byte tail.
        assert_eq!(acks, vec![3, 7, 9]);
        assert!(io.outgoing.iter().all(|&b| b == ACK_BYTE));
    }

    #[test]
    fn test_windowed_reader_single_read_matches_read_exact() {
        let mut io = PipeIo::default();
        io.incoming.extend(core::iter::repeat(0xEE).take(600));
        let mut reader = WindowedReader::new(600, BASE_ACK_GROUP_LEN);
        let mut dst = vec![0u8; 600];
        reader.read_into(&mut io, &mut dst).unwrap();
        assert_eq!(io.outgoing.len(), 9);
    }

    #[test]
    fn test_windowed_reader_rejects_overrun() {
        let mut io = PipeIo::default();
        let mut reader = WindowedReader::new(10, 0);
        let mut dst = [0u8; 11];
        assert_eq!(
            reader.read_into(&mut io, &mut dst),
            Err(PqsmError::InvalidArgument)
        );
    }
}
