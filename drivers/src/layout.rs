/*++

Licensed under the Apache-2.0 license.

File Name:

    layout.rs

Abstract:

    File contains the buffer layout tables: the accelerator's native
    (alignment-padded) memory layouts, the wire (tightly packed) encodings,
    and the per-operation scratch buffer maps.

--*/

use crate::dma::align8;
use crate::params::{
    field_len, KeyField, SecurityLevel, CHUNK_SIZE, C_SIZE, K_SIZE, RHO_SIZE, SEED_SIZE, TR_SIZE,
};

// Native layouts pad every field to a multiple of 8 bytes; native offsets
// are cumulative sums of padded lengths, wire offsets cumulative sums of
// true lengths. The two sequences diverge and are both kept here, in one
// table per object, so the arithmetic exists exactly once.

/// Destination of a keypair segment in the wire encoding.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum KeyDest {
    Public,
    Secret,
}

/// One field of the native keypair image and its place in the wire
/// public/secret key.
#[derive(Debug, Copy, Clone)]
pub struct KeypairSegment {
    pub field: KeyField,
    pub dest: KeyDest,
    /// Offset in the accelerator's native keypair image.
    pub native: usize,
    /// Offset in the wire key selected by `dest`.
    pub wire: usize,
    pub len: usize,
}

/// Native keypair image length: `Rho | K | S1 | S2 | T1 | T0 | Tr`, each
/// segment padded to a multiple of 8.
pub const fn keypair_native_len(level: SecurityLevel) -> usize {
    align8(RHO_SIZE)
        + align8(K_SIZE)
        + align8(field_len(KeyField::S1, level))
        + align8(field_len(KeyField::S2, level))
        + align8(field_len(KeyField::T1, level))
        + align8(field_len(KeyField::T0, level))
        + align8(TR_SIZE)
}

/// Layout table mapping the native keypair image to the wire
/// `pk = (Rho, T1)` and `sk = (Rho, K, Tr, S1, S2, T0)`.
///
/// Rho appears twice: the accelerator emits it once, both wire keys carry
/// it.
pub fn keypair_segments(level: SecurityLevel) -> [KeypairSegment; 8] {
    let s1_len = field_len(KeyField::S1, level);
    let s2_len = field_len(KeyField::S2, level);
    let t0_len = field_len(KeyField::T0, level);
    let t1_len = field_len(KeyField::T1, level);

    // Native offsets, in the order the accelerator emits the fields.
    let rho_n = 0;
    let k_n = rho_n + align8(RHO_SIZE);
    let s1_n = k_n + align8(K_SIZE);
    let s2_n = s1_n + align8(s1_len);
    let t1_n = s2_n + align8(s2_len);
    let t0_n = t1_n + align8(t1_len);
    let tr_n = t0_n + align8(t0_len);

    // Wire offsets, cumulative true lengths per destination key.
    let sk_k_w = RHO_SIZE;
    let sk_tr_w = sk_k_w + K_SIZE;
    let sk_s1_w = sk_tr_w + TR_SIZE;
    let sk_s2_w = sk_s1_w + s1_len;
    let sk_t0_w = sk_s2_w + s2_len;
    let pk_t1_w = RHO_SIZE;

    use KeyDest::*;
    use KeyField::*;
    [
        KeypairSegment { field: Rho, dest: Public, native: rho_n, wire: 0, len: RHO_SIZE },
        KeypairSegment { field: T1, dest: Public, native: t1_n, wire: pk_t1_w, len: t1_len },
        KeypairSegment { field: Rho, dest: Secret, native: rho_n, wire: 0, len: RHO_SIZE },
        KeypairSegment { field: K, dest: Secret, native: k_n, wire: sk_k_w, len: K_SIZE },
        KeypairSegment { field: Tr, dest: Secret, native: tr_n, wire: sk_tr_w, len: TR_SIZE },
        KeypairSegment { field: S1, dest: Secret, native: s1_n, wire: sk_s1_w, len: s1_len },
        KeypairSegment { field: S2, dest: Secret, native: s2_n, wire: sk_s2_w, len: s2_len },
        KeypairSegment { field: T0, dest: Secret, native: t0_n, wire: sk_t0_w, len: t0_len },
    ]
}

/// One field of the native signature image and its place in the wire
/// signature.
#[derive(Debug, Copy, Clone)]
pub struct SignatureSegment {
    pub field: KeyField,
    pub native: usize,
    pub wire: usize,
    pub len: usize,
}

/// Native signature image length: `Z | H | C`, padded per field.
pub const fn signature_native_len(level: SecurityLevel) -> usize {
    align8(field_len(KeyField::Z, level))
        + align8(field_len(KeyField::H, level))
        + align8(C_SIZE)
}

/// Layout table mapping the accelerator's native signature order
/// `(Z, H, C)` to the wire order `(C, Z, H)`.
pub fn signature_segments(level: SecurityLevel) -> [SignatureSegment; 3] {
    let z_len = field_len(KeyField::Z, level);
    let h_len = field_len(KeyField::H, level);

    let z_n = 0;
    let h_n = z_n + align8(z_len);
    let c_n = h_n + align8(h_len);

    let c_w = 0;
    let z_w = c_w + C_SIZE;
    let h_w = z_w + z_len;

    use KeyField::*;
    [
        SignatureSegment { field: C, native: c_n, wire: c_w, len: C_SIZE },
        SignatureSegment { field: Z, native: z_n, wire: z_w, len: z_len },
        SignatureSegment { field: H, native: h_n, wire: h_w, len: h_len },
    ]
}

/// Wire secret key field offsets, used when staging sign input.
#[derive(Debug, Copy, Clone)]
pub struct SkWireMap {
    pub rho: usize,
    pub k: usize,
    pub tr: usize,
    pub s1: usize,
    pub s2: usize,
    pub t0: usize,
}

pub const fn sk_wire_map(level: SecurityLevel) -> SkWireMap {
    let s1 = RHO_SIZE + K_SIZE + TR_SIZE;
    let s2 = s1 + field_len(KeyField::S1, level);
    let t0 = s2 + field_len(KeyField::S2, level);
    SkWireMap {
        rho: 0,
        k: RHO_SIZE,
        tr: RHO_SIZE + K_SIZE,
        s1,
        s2,
        t0,
    }
}

/// Scratch map for key generation: seed, then the native keypair image.
/// The regions are disjoint; the reader and writer channels never target
/// overlapping memory here.
#[derive(Debug, Copy, Clone)]
pub struct KeygenMap {
    pub seed: usize,
    pub keypair: usize,
    pub keypair_len: usize,
    pub total: usize,
}

pub const fn keygen_map(level: SecurityLevel) -> KeygenMap {
    let keypair = align8(SEED_SIZE);
    let keypair_len = keypair_native_len(level);
    KeygenMap {
        seed: 0,
        keypair,
        keypair_len,
        total: keypair + keypair_len,
    }
}

/// Scratch map for signing.
///
/// The head payload `(Rho, message length, Tr)` is staged first and fed to
/// the reader while the host streams the message; the remaining secret-key
/// fields go through `sk_feed` at finish; the accelerator writes the native
/// signature image to `sig_out`.
#[derive(Debug, Copy, Clone)]
pub struct SignMap {
    pub rho: usize,
    pub mlen: usize,
    pub tr: usize,
    pub head_len: usize,
    pub chunk: usize,
    pub sk_feed: usize,
    pub sk_feed_len: usize,
    pub sig_out: usize,
    pub sig_out_len: usize,
    pub total: usize,
}

pub const fn sign_map(level: SecurityLevel) -> SignMap {
    let mlen = align8(RHO_SIZE);
    let tr = mlen + 8;
    let head_len = tr + align8(TR_SIZE);
    let chunk = align8(head_len);
    let sk_feed = chunk + CHUNK_SIZE;
    let sk_feed_len = align8(K_SIZE)
        + align8(field_len(KeyField::S1, level))
        + align8(field_len(KeyField::S2, level))
        + align8(field_len(KeyField::T0, level));
    let sig_out = sk_feed + sk_feed_len;
    let sig_out_len = signature_native_len(level);
    SignMap {
        rho: 0,
        mlen,
        tr,
        head_len,
        chunk,
        sk_feed,
        sk_feed_len,
        sig_out,
        sig_out_len,
        total: sig_out + sig_out_len,
    }
}

/// Scratch map for verification.
///
/// The head payload is `(Rho, C, Z, T1, message length)`; H is staged last,
/// after message ingestion. The 64-bit result word reuses the base of the
/// buffer: by the time the accelerator writes it, the head payload has been
/// consumed.
#[derive(Debug, Copy, Clone)]
pub struct VerifyMap {
    pub rho: usize,
    pub c: usize,
    pub z: usize,
    pub t1: usize,
    pub mlen: usize,
    pub head_len: usize,
    pub chunk: usize,
    pub h: usize,
    pub result: usize,
    pub total: usize,
}

pub const fn verify_map(level: SecurityLevel) -> VerifyMap {
    let c = align8(RHO_SIZE);
    let z = c + align8(C_SIZE);
    let t1 = z + align8(field_len(KeyField::Z, level));
    let mlen = t1 + align8(field_len(KeyField::T1, level));
    let head_len = mlen + 8;
    let chunk = align8(head_len);
    let h = chunk + CHUNK_SIZE;
    VerifyMap {
        rho: 0,
        c,
        z,
        t1,
        mlen,
        head_len,
        chunk,
        h,
        result: 0,
        total: h + align8(field_len(KeyField::H, level)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{pk_len, sig_len, sk_len};
    use crate::scratch::SCRATCH_SIZE;

    #[test]
    fn test_keypair_segments_cover_wire_keys_exactly() {
        for level in SecurityLevel::ALL {
            let mut pk_sum = 0;
            let mut sk_sum = 0;
            for seg in keypair_segments(level) {
                match seg.dest {
                    KeyDest::Public => pk_sum += seg.len,
                    KeyDest::Secret => sk_sum += seg.len,
                }
            }
            assert_eq!(pk_sum, pk_len(level));
            assert_eq!(sk_sum, sk_len(level));
        }
    }

    #[test]
    fn test_keypair_native_offsets_are_padded_cumulative_sums() {
        for level in SecurityLevel::ALL {
            let segs = keypair_segments(level);
            // Native order: Rho, K, S1, S2, T1, T0, Tr.
            let by_field = |f| segs.iter().find(|s| s.field == f).unwrap().native;
            use KeyField::*;
            assert_eq!(by_field(Rho), 0);
            assert_eq!(by_field(K), 32);
            assert_eq!(by_field(S1), 64);
            assert_eq!(by_field(S2), 64 + align8(field_len(S1, level)));
            let t1 = by_field(S2) + align8(field_len(S2, level));
            assert_eq!(by_field(T1), t1);
            let t0 = t1 + align8(field_len(T1, level));
            assert_eq!(by_field(T0), t0);
            assert_eq!(by_field(Tr), t0 + align8(field_len(T0, level)));
            assert_eq!(
                keypair_native_len(level),
                by_field(Tr) + align8(TR_SIZE)
            );
        }
    }

    #[test]
    fn test_signature_reordering() {
        for level in SecurityLevel::ALL {
            let [c, z, h] = signature_segments(level);
            // Native (Z, H, C), wire (C, Z, H).
            assert_eq!(z.native, 0);
            assert_eq!(h.native, align8(z.len));
            assert_eq!(c.native, align8(z.len) + align8(h.len));
            assert_eq!(c.wire, 0);
            assert_eq!(z.wire, C_SIZE);
            assert_eq!(h.wire, C_SIZE + z.len);
            assert_eq!(c.wire + c.len + z.len + h.len, sig_len(level));
        }
    }

    #[test]
    fn test_sk_wire_map_matches_keypair_table() {
        for level in SecurityLevel::ALL {
            let wire = sk_wire_map(level);
            for seg in keypair_segments(level) {
                if seg.dest != KeyDest::Secret {
                    continue;
                }
                let expected = match seg.field {
                    KeyField::Rho => wire.rho,
                    KeyField::K => wire.k,
                    KeyField::Tr => wire.tr,
                    KeyField::S1 => wire.s1,
                    KeyField::S2 => wire.s2,
                    KeyField::T0 => wire.t0,
                    _ => unreachable!(),
                };
                assert_eq!(seg.wire, expected);
            }
        }
    }

    #[test]
    fn test_scratch_maps_fit_scratch_buffer() {
        for level in SecurityLevel::ALL {
            assert!(keygen_map(level).total <= SCRATCH_SIZE);
            assert!(sign_map(level).total <= SCRATCH_SIZE);
            assert!(verify_map(level).total <= SCRATCH_SIZE);
            // Chunk staging areas start 8-byte aligned.
            assert_eq!(sign_map(level).chunk % 8, 0);
            assert_eq!(verify_map(level).chunk % 8, 0);
            assert_eq!(sign_map(level).sk_feed % 8, 0);
        }
    }
}
