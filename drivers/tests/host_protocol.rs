// Licensed under the Apache-2.0 license

//! Full-stack host protocol tests: the command server runs on its own
//! thread over an in-process serial link, driving the emulated accelerator;
//! the test plays the host side of the wire protocol.

mod common;

use pqsm_drivers::params::{
    field_len, pk_len, sig_len, sk_len, KeyField, SecurityLevel, C_SIZE, K_SIZE, RHO_SIZE,
    TR_SIZE,
};
use pqsm_drivers::{
    Accelerator, Dilithium, PqsmError, RequestHeader, ScratchBuffer, ScratchMem, SeedSource,
    Server, ServerBuffers, ACK_BYTE, READY_BYTE, START_BYTE, SYNC_BYTE, VERIFY_RES_ACCEPTED,
    VERIFY_RES_NA, VERIFY_RES_REJECTED,
};
use pqsm_emu::host::{serial_pair, ChannelIo};
use pqsm_emu::{crypto, BusMmio, DilithiumModel, DILITHIUM_MODEL_ADDR};
use pqsm_registers::dilithium::RegisterBlock;
use std::cell::RefCell;
use std::rc::Rc;
use std::thread::{self, JoinHandle};
use zerocopy::AsBytes;

const WINDOW: usize = 64;

/// Runs the firmware side — server, orchestrator, emulated accelerator —
/// on its own thread for `signals` host signal bytes.
fn spawn_firmware(io: ChannelIo, signals: usize) -> JoinHandle<()> {
    thread::spawn(move || {
        let model = Rc::new(RefCell::new(DilithiumModel::new()));
        let mut scratch = Box::new(ScratchMem::new());
        let regs = unsafe {
            RegisterBlock::new_with_mmio(
                DILITHIUM_MODEL_ADDR as usize as *mut u32,
                BusMmio::new(model.clone()),
            )
        };
        let mut accel = Accelerator::new(regs);
        accel.set_spin_budget(common::TEST_SPIN_BUDGET);
        let dilithium = Dilithium::new(accel, ScratchBuffer::from_mem(&mut scratch));
        let mut bufs = Box::new(ServerBuffers::new());
        let mut server = Server::new(io, dilithium, &mut bufs, SeedSource::HostLink);
        for _ in 0..signals {
            server.process_one().unwrap();
        }
    })
}

fn header_bytes(cmd: u8, level: u8, msg_len: u32) -> [u8; 8] {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(RequestHeader::new(cmd, level, msg_len).as_bytes());
    raw
}

/// SYNC/READY then START/ACK, leaving the link ready for a header.
fn open_session(host: &ChannelIo) {
    host.send(&[SYNC_BYTE]);
    assert_eq!(host.recv(), READY_BYTE);
    host.send(&[START_BYTE]);
    host.expect_ack();
}

/// Receives the firmware-initiated response: START, ACK back, header,
/// final ACK.
fn recv_response(host: &ChannelIo) -> [u8; 4] {
    assert_eq!(host.recv(), START_BYTE);
    host.send(&[ACK_BYTE]);
    let rsp = host.recv_n(4);
    host.send(&[ACK_BYTE]);
    [rsp[0], rsp[1], rsp[2], rsp[3]]
}

fn message(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 13 + 5) as u8).collect()
}

#[test]
fn test_keygen_over_the_wire() {
    let (fw_io, host) = serial_pair();
    let fw = spawn_firmware(fw_io, 2);

    open_session(&host);
    host.send(&header_bytes(0, 2, 0));
    host.expect_ack();

    // Seed, one whole window.
    let seed = [0u8; 32];
    host.send_windowed(&seed, seed.len());
    host.expect_ack();

    let rsp = recv_response(&host);
    assert_eq!(rsp, [0, 2, 0, VERIFY_RES_NA]);

    let pk = host.recv_windowed(pk_len(SecurityLevel::L2), WINDOW);
    host.send(&[ACK_BYTE]);
    let sk = host.recv_windowed(sk_len(SecurityLevel::L2), WINDOW);
    host.send(&[ACK_BYTE]);

    let km = crypto::expand_keypair(SecurityLevel::L2, &seed);
    assert_eq!(pk, common::wire_pk(&km));
    assert_eq!(sk, common::wire_sk(&km));

    fw.join().unwrap();
}

#[test]
fn test_verify_over_the_wire_counts_message_acks() {
    // A 600-byte message with a 64-byte window: exactly 9 intermediate
    // ACKs and none after the final, shorter window.
    let level = SecurityLevel::L2;
    let seed = [5u8; 32];
    let km = crypto::expand_keypair(level, &seed);
    let msg = message(600);
    let (z, h, c) = crypto::signature_parts(level, &km.rho, 600, &msg);

    let (fw_io, host) = serial_pair();
    let fw = spawn_firmware(fw_io, 2);

    open_session(&host);
    host.send(&header_bytes(1, level.to_wire(), 600));
    host.expect_ack();

    // Rho, C, Z, T1 — then the message, then H last.
    host.send_windowed(&km.rho, RHO_SIZE);
    host.expect_ack();
    host.send_windowed(&c, C_SIZE);
    host.expect_ack();
    host.send_windowed(&z, WINDOW);
    host.expect_ack();
    host.send_windowed(&km.t1, WINDOW);
    host.expect_ack();

    let acks = host.send_windowed_counting_acks(&msg, WINDOW);
    assert_eq!(acks, 9);

    host.send_windowed(&h, WINDOW.min(h.len()));
    host.expect_ack();

    let rsp = recv_response(&host);
    assert_eq!(rsp, [1, 2, 0, VERIFY_RES_ACCEPTED]);

    fw.join().unwrap();
}

#[test]
fn test_verify_over_the_wire_rejects_corrupt_signature() {
    let level = SecurityLevel::L3;
    let seed = [6u8; 32];
    let km = crypto::expand_keypair(level, &seed);
    let msg = message(100);
    let (z, h, mut c) = crypto::signature_parts(level, &km.rho, 100, &msg);
    c[0] ^= 0x01;

    let (fw_io, host) = serial_pair();
    let fw = spawn_firmware(fw_io, 2);

    open_session(&host);
    host.send(&header_bytes(1, level.to_wire(), 100));
    host.expect_ack();

    host.send_windowed(&km.rho, RHO_SIZE);
    host.expect_ack();
    host.send_windowed(&c, C_SIZE);
    host.expect_ack();
    host.send_windowed(&z, WINDOW);
    host.expect_ack();
    host.send_windowed(&km.t1, WINDOW);
    host.expect_ack();
    host.send_windowed_counting_acks(&msg, WINDOW);
    host.send_windowed(&h, WINDOW.min(h.len()));
    host.expect_ack();

    let rsp = recv_response(&host);
    assert_eq!(rsp, [1, level.to_wire(), 0, VERIFY_RES_REJECTED]);

    fw.join().unwrap();
}

#[test]
fn test_sign_then_verify_over_the_wire() {
    let level = SecurityLevel::L2;
    let seed = [8u8; 32];
    let km = crypto::expand_keypair(level, &seed);
    let msg = message(300);

    let (fw_io, host) = serial_pair();
    let fw = spawn_firmware(fw_io, 3);

    open_session(&host);
    host.send(&header_bytes(2, level.to_wire(), 300));
    host.expect_ack();

    // Wire secret key, component by component.
    host.send_windowed(&km.rho, RHO_SIZE);
    host.expect_ack();
    host.send_windowed(&km.k, K_SIZE);
    host.expect_ack();
    host.send_windowed(&km.tr, TR_SIZE);
    host.expect_ack();
    host.send_windowed(&km.s1, WINDOW);
    host.expect_ack();
    host.send_windowed(&km.s2, WINDOW);
    host.expect_ack();
    host.send_windowed(&km.t0, WINDOW);
    host.expect_ack();

    host.send_windowed_counting_acks(&msg, WINDOW);

    let rsp = recv_response(&host);
    assert_eq!(rsp, [2, 2, 0, VERIFY_RES_NA]);

    let sig = host.recv_windowed(sig_len(level), WINDOW);
    host.send(&[ACK_BYTE]);
    let (z, h, c) = crypto::signature_parts(level, &km.rho, 300, &msg);
    assert_eq!(sig, common::wire_sig(&z, &h, &c));

    // Feed the signature straight back through a verify command on the
    // same session loop.
    host.send(&[START_BYTE]);
    host.expect_ack();
    host.send(&header_bytes(1, level.to_wire(), 300));
    host.expect_ack();

    let z_len = field_len(KeyField::Z, level);
    let h_len = field_len(KeyField::H, level);
    host.send_windowed(&km.rho, RHO_SIZE);
    host.expect_ack();
    host.send_windowed(&sig[..C_SIZE], C_SIZE);
    host.expect_ack();
    host.send_windowed(&sig[C_SIZE..C_SIZE + z_len], WINDOW);
    host.expect_ack();
    host.send_windowed(&km.t1, WINDOW);
    host.expect_ack();
    host.send_windowed_counting_acks(&msg, WINDOW);
    host.send_windowed(&sig[C_SIZE + z_len..C_SIZE + z_len + h_len], WINDOW.min(h_len));
    host.expect_ack();

    let rsp = recv_response(&host);
    assert_eq!(rsp, [1, 2, 0, VERIFY_RES_ACCEPTED]);

    fw.join().unwrap();
}

#[test]
fn test_unsupported_level_rejected_before_any_streaming() {
    let (fw_io, host) = serial_pair();
    let fw = spawn_firmware(fw_io, 2);

    open_session(&host);
    host.send(&header_bytes(1, 4, 16));
    // Instead of the header ACK, the firmware opens an error response.
    let rsp = recv_response(&host);
    assert_eq!(
        rsp,
        [1, 4, PqsmError::UnsupportedLevel.wire_code(), VERIFY_RES_NA]
    );

    fw.join().unwrap();
}

#[test]
fn test_unknown_command_rejected() {
    let (fw_io, host) = serial_pair();
    let fw = spawn_firmware(fw_io, 2);

    open_session(&host);
    host.send(&header_bytes(9, 2, 0));
    let rsp = recv_response(&host);
    assert_eq!(
        rsp,
        [9, 2, PqsmError::InvalidArgument.wire_code(), VERIFY_RES_NA]
    );

    fw.join().unwrap();
}

#[test]
fn test_oversized_message_rejected() {
    let (fw_io, host) = serial_pair();
    let fw = spawn_firmware(fw_io, 2);

    open_session(&host);
    host.send(&header_bytes(1, 2, 8193));
    let rsp = recv_response(&host);
    assert_eq!(
        rsp,
        [1, 2, PqsmError::InvalidArgument.wire_code(), VERIFY_RES_NA]
    );

    fw.join().unwrap();
}
