/*++

Licensed under the Apache-2.0 license.

File Name:

    host.rs

Abstract:

    File contains an in-process serial link and host-side helpers for
    driving the firmware's wire protocol from tests.

--*/

use pqsm_drivers::{SerialIo, ACK_BYTE};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::Duration;

const RECV_TIMEOUT: Duration = Duration::from_secs(10);

/// One end of a byte-stream pair. The firmware side plugs into the command
/// server as its `SerialIo`; the host side drives the protocol from the
/// test.
pub struct ChannelIo {
    tx: Sender<u8>,
    rx: Receiver<u8>,
}

/// Creates a connected pair of serial endpoints.
pub fn serial_pair() -> (ChannelIo, ChannelIo) {
    let (a_tx, a_rx) = channel();
    let (b_tx, b_rx) = channel();
    (
        ChannelIo { tx: a_tx, rx: b_rx },
        ChannelIo { tx: b_tx, rx: a_rx },
    )
}

impl ChannelIo {
    pub fn send(&self, bytes: &[u8]) {
        for &byte in bytes {
            self.tx.send(byte).expect("peer hung up");
        }
    }

    pub fn recv(&self) -> u8 {
        self.rx
            .recv_timeout(RECV_TIMEOUT)
            .expect("timed out waiting for peer")
    }

    pub fn recv_n(&self, n: usize) -> Vec<u8> {
        (0..n).map(|_| self.recv()).collect()
    }

    /// Receives one byte and asserts it is the flow-control ACK.
    pub fn expect_ack(&self) {
        let byte = self.recv();
        assert_eq!(byte, ACK_BYTE, "expected ACK, got {byte:#04x}");
    }

    /// Sends one windowed transfer the way the firmware's `read_exact`
    /// consumes it: after every full window that does not end the transfer,
    /// wait for the firmware's ACK before continuing.
    pub fn send_windowed(&self, data: &[u8], group: usize) {
        let total = data.len();
        let mut counter = 0;
        for (i, &byte) in data.iter().enumerate() {
            self.tx.send(byte).expect("peer hung up");
            if group > 0 {
                counter += 1;
                if counter == group && i < total - 1 {
                    self.expect_ack();
                    counter = 0;
                }
            }
        }
    }

    /// Receives one windowed transfer the way the firmware's `send_exact`
    /// produces it, acknowledging every full window that does not end the
    /// transfer.
    pub fn recv_windowed(&self, len: usize, group: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(len);
        let mut counter = 0;
        for i in 0..len {
            data.push(self.recv());
            if group > 0 {
                counter += 1;
                if counter == group && i < len - 1 {
                    self.send(&[ACK_BYTE]);
                    counter = 0;
                }
            }
        }
        data
    }

    /// Sends a transfer windowed like [`Self::send_windowed`], returning
    /// how many ACK bytes the firmware emitted during it.
    pub fn send_windowed_counting_acks(&self, data: &[u8], group: usize) -> usize {
        let total = data.len();
        let mut counter = 0;
        let mut acks = 0;
        for (i, &byte) in data.iter().enumerate() {
            self.tx.send(byte).expect("peer hung up");
            if group > 0 {
                counter += 1;
                if counter == group && i < total - 1 {
                    self.expect_ack();
                    acks += 1;
                    counter = 0;
                }
            }
        }
        acks
    }
}

impl SerialIo for ChannelIo {
    fn read_byte(&mut self) -> u8 {
        self.rx
            .recv_timeout(RECV_TIMEOUT)
            .expect("timed out waiting for host")
    }

    fn write_byte(&mut self, byte: u8) {
        self.tx.send(byte).expect("host hung up");
    }
}
