/*++

Licensed under the Apache-2.0 license.

File Name:

    crypto.rs

Abstract:

    File contains the deterministic stand-in for the lattice signature
    engine inside the emulated accelerator.

    The real engine is opaque hardware; the stand-in preserves the
    properties the interface contract exposes — determinism, per-level
    component lengths, and the all-or-nothing dependence of a verification
    verdict on every byte of the keys, signature and message — without
    implementing the lattice scheme itself.

--*/

use pqsm_drivers::params::{field_len, KeyField, SecurityLevel, K_SIZE, RHO_SIZE, TR_SIZE};
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::Shake256;

fn shake256(parts: &[&[u8]], out_len: usize) -> Vec<u8> {
    let mut hasher = Shake256::default();
    for part in parts {
        hasher.update(part);
    }
    let mut out = vec![0u8; out_len];
    hasher.finalize_xof().read(&mut out);
    out
}

/// Expanded keypair components, in true (unpadded) lengths.
pub struct KeyMaterial {
    pub rho: Vec<u8>,
    pub k: Vec<u8>,
    pub tr: Vec<u8>,
    pub s1: Vec<u8>,
    pub s2: Vec<u8>,
    pub t0: Vec<u8>,
    pub t1: Vec<u8>,
}

fn derive(rho: &[u8], level: SecurityLevel, tag: &[u8], len: usize) -> Vec<u8> {
    shake256(&[b"pqsm.field", &[level.to_wire()], tag, rho], len)
}

/// Expands a seed into the full keypair. Every component is a function of
/// rho, which is itself a function of the seed, so public-key components
/// can be re-derived during verification.
pub fn expand_keypair(level: SecurityLevel, seed: &[u8]) -> KeyMaterial {
    let rho = shake256(&[b"pqsm.rho", &[level.to_wire()], seed], RHO_SIZE);
    let k = derive(&rho, level, b"k", K_SIZE);
    let tr = derive(&rho, level, b"tr", TR_SIZE);
    let s1 = derive(&rho, level, b"s1", field_len(KeyField::S1, level));
    let s2 = derive(&rho, level, b"s2", field_len(KeyField::S2, level));
    let t0 = derive(&rho, level, b"t0", field_len(KeyField::T0, level));
    let t1 = derive(&rho, level, b"t1", field_len(KeyField::T1, level));
    KeyMaterial {
        rho,
        k,
        tr,
        s1,
        s2,
        t0,
        t1,
    }
}

/// Re-derives T1 from rho; verification checks the presented public key
/// against this.
pub fn derive_t1(level: SecurityLevel, rho: &[u8]) -> Vec<u8> {
    derive(rho, level, b"t1", field_len(KeyField::T1, level))
}

/// Signature components `(Z, H, C)` for a message under the key identified
/// by rho. The message length is bound explicitly, exactly as the
/// accelerator receives it in the staged head payload.
pub fn signature_parts(
    level: SecurityLevel,
    rho: &[u8],
    msg_len: u64,
    msg: &[u8],
) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    let mlen = msg_len.to_be_bytes();
    let z = shake256(
        &[b"pqsm.z", &[level.to_wire()], rho, &mlen, msg],
        field_len(KeyField::Z, level),
    );
    let h = shake256(
        &[b"pqsm.h", &[level.to_wire()], rho, &mlen, msg],
        field_len(KeyField::H, level),
    );
    let c = shake256(
        &[b"pqsm.c", &[level.to_wire()], rho, &mlen, msg],
        field_len(KeyField::C, level),
    );
    (z, h, c)
}
