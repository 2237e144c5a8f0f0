/*++

Licensed under the Apache-2.0 license.

File Name:

    dilithium.rs

Abstract:

    File contains the operation orchestrator for the Dilithium signature
    accelerator: key generation, the two-phase sign protocol and the
    two-phase verify protocol.

--*/

use crate::accel::{Accelerator, Mode};
use crate::dma::align8;
use crate::error::{PqsmError, PqsmResult};
use crate::layout;
use crate::params::{
    self, field_len, KeyField, SecurityLevel, CHUNK_SIZE, C_SIZE, K_SIZE, MAX_MSG_LEN, RHO_SIZE,
    SEED_SIZE, TR_SIZE,
};
use crate::scratch::{ScratchBuffer, SCRATCH_SIZE};
use pqsm_registers::{MmioMut, RealMmioMut};

/// Token for an in-flight two-phase operation.
///
/// The hardware supports a single session, so the handle carries no
/// identity; ordering is enforced by the orchestrator's state.
pub struct SessionHandle {
    _priv: (),
}

#[derive(Debug, Copy, Clone)]
struct StreamState {
    level: SecurityLevel,
    msg_len: u32,
    /// Message bytes accepted from the caller so far.
    msg_fed: u32,
    /// Bytes sitting in the chunk staging slot, not yet handed to the
    /// reader DMA.
    staged: u32,
}

#[derive(Debug, Copy, Clone)]
enum OpState {
    Idle,
    SignAwaitingFinish(StreamState),
    VerifyAwaitingFinish(StreamState),
}

/// Orchestrates accelerator operations over the DMA engine and the scratch
/// buffer.
///
/// Exactly one operation is in flight at a time; out-of-order calls are
/// rejected as [`PqsmError::ProtocolDesync`].
///
/// Message bytes accumulate in the chunk staging slot and are handed to the
/// reader DMA in whole slot units; only the final transfer of a message may
/// be partial. The DMA stream the accelerator sees is therefore identical
/// no matter how the caller sizes its chunks.
pub struct Dilithium<'a, TMmio: MmioMut = RealMmioMut> {
    accel: Accelerator<TMmio>,
    scratch: ScratchBuffer<'a>,
    state: OpState,
}

impl<'a, TMmio: MmioMut> Dilithium<'a, TMmio> {
    pub fn new(accel: Accelerator<TMmio>, scratch: ScratchBuffer<'a>) -> Self {
        Self {
            accel,
            scratch,
            state: OpState::Idle,
        }
    }

    /// Abandons any in-flight operation: scrubs the scratch buffer, resets
    /// the accelerator and returns to idle.
    pub fn abort(&mut self) {
        let _ = self.fail(PqsmError::ProtocolDesync);
    }

    fn fail(&mut self, err: PqsmError) -> PqsmError {
        self.scratch.zeroize_region(0, SCRATCH_SIZE);
        self.accel.reset();
        self.state = OpState::Idle;
        err
    }

    /// Generates a keypair from `seed`, writing the wire-format public and
    /// secret keys into the caller's buffers. Returns `(pk_len, sk_len)`.
    pub fn keygen(
        &mut self,
        level: SecurityLevel,
        seed: &[u8],
        pk: &mut [u8],
        sk: &mut [u8],
    ) -> PqsmResult<(usize, usize)> {
        if !matches!(self.state, OpState::Idle) {
            return Err(PqsmError::ProtocolDesync);
        }
        if seed.len() != SEED_SIZE {
            return Err(PqsmError::InvalidArgument);
        }
        let pk_len = params::pk_len(level);
        let sk_len = params::sk_len(level);
        if pk.len() < pk_len || sk.len() < sk_len {
            return Err(PqsmError::BufferTooSmall);
        }

        let map = layout::keygen_map(level);
        self.scratch.write(map.seed, seed);

        self.accel.reset();
        self.accel.setup(Mode::Keygen, level);
        let writer = self.accel.writer();
        writer.setup(self.scratch.addr(map.keypair), map.keypair_len as u32);
        writer.start();
        let reader = self.accel.reader();
        reader.setup(self.scratch.addr(map.seed), SEED_SIZE as u32);
        reader.start();
        self.accel.start();

        if let Err(err) = reader.wait().and(writer.wait()) {
            return Err(self.fail(err));
        }

        for seg in layout::keypair_segments(level) {
            let src = self.scratch.bytes(map.keypair + seg.native, seg.len);
            let dst = match seg.dest {
                layout::KeyDest::Public => &mut pk[seg.wire..seg.wire + seg.len],
                layout::KeyDest::Secret => &mut sk[seg.wire..seg.wire + seg.len],
            };
            dst.copy_from_slice(src);
        }

        // The native image holds the secret key; scrub it with the seed.
        self.scratch.zeroize_region(0, map.total);
        Ok((pk_len, sk_len))
    }

    /// Begins a sign operation: stages `(Rho, message length, Tr)` from the
    /// secret key and starts the accelerator without blocking. The message
    /// body is streamed with [`Self::sign_update`]; the operation completes
    /// with [`Self::sign_finish`].
    pub fn sign_start(
        &mut self,
        level: SecurityLevel,
        sk: &[u8],
        msg_len: u32,
    ) -> PqsmResult<SessionHandle> {
        if !matches!(self.state, OpState::Idle) {
            return Err(PqsmError::ProtocolDesync);
        }
        if sk.len() != params::sk_len(level) {
            return Err(PqsmError::InvalidArgument);
        }
        if msg_len > MAX_MSG_LEN {
            return Err(PqsmError::InvalidArgument);
        }

        let map = layout::sign_map(level);
        let wire = layout::sk_wire_map(level);
        self.scratch.write(map.rho, &sk[wire.rho..wire.rho + RHO_SIZE]);
        self.scratch.write(map.mlen, &(msg_len as u64).to_be_bytes());
        self.scratch.write(map.tr, &sk[wire.tr..wire.tr + TR_SIZE]);

        self.accel.reset();
        self.accel.setup(Mode::Sign, level);
        let writer = self.accel.writer();
        writer.setup(self.scratch.addr(map.sig_out), map.sig_out_len as u32);
        writer.start();
        let reader = self.accel.reader();
        reader.setup(self.scratch.addr(map.rho), map.head_len as u32);
        reader.start();
        self.accel.start();

        self.state = OpState::SignAwaitingFinish(StreamState {
            level,
            msg_len,
            msg_fed: 0,
            staged: 0,
        });
        Ok(SessionHandle { _priv: () })
    }

    /// Streams message bytes into the sign operation.
    pub fn sign_update(&mut self, session: &SessionHandle, chunk: &[u8]) -> PqsmResult<()> {
        let _ = session;
        let mut st = match self.state {
            OpState::SignAwaitingFinish(st) => st,
            _ => return Err(PqsmError::ProtocolDesync),
        };
        let chunk_offset = layout::sign_map(st.level).chunk;
        self.feed_bytes(chunk_offset, &mut st, chunk)?;
        self.state = OpState::SignAwaitingFinish(st);
        Ok(())
    }

    /// Streams message bytes into the sign operation, letting `fill`
    /// produce them directly in the staging slot (used by the host protocol
    /// to avoid an intermediate copy). `len` must fit the free space of the
    /// staging slot.
    pub fn sign_update_with<F>(
        &mut self,
        _session: &SessionHandle,
        len: usize,
        fill: F,
    ) -> PqsmResult<()>
    where
        F: FnOnce(&mut [u8]) -> PqsmResult<()>,
    {
        let mut st = match self.state {
            OpState::SignAwaitingFinish(st) => st,
            _ => return Err(PqsmError::ProtocolDesync),
        };
        let chunk_offset = layout::sign_map(st.level).chunk;
        self.feed_with(chunk_offset, &mut st, len, fill)?;
        self.state = OpState::SignAwaitingFinish(st);
        Ok(())
    }

    /// Completes a sign operation: feeds the remaining secret-key fields,
    /// waits for the accelerator, scrubs the secret material and unpacks
    /// the native `(Z, H, C)` image into the wire `(C, Z, H)` signature.
    /// Returns the signature length.
    pub fn sign_finish(
        &mut self,
        session: SessionHandle,
        sk: &[u8],
        sig: &mut [u8],
    ) -> PqsmResult<usize> {
        let _ = session;
        let mut st = match self.state {
            OpState::SignAwaitingFinish(st) => st,
            _ => return Err(PqsmError::ProtocolDesync),
        };
        let level = st.level;
        let sig_len = params::sig_len(level);
        if sk.len() != params::sk_len(level) {
            return Err(self.fail(PqsmError::InvalidArgument));
        }
        if sig.len() < sig_len {
            return Err(self.fail(PqsmError::BufferTooSmall));
        }
        if st.msg_fed != st.msg_len {
            return Err(self.fail(PqsmError::ProtocolDesync));
        }

        let map = layout::sign_map(level);
        self.flush_partial(map.chunk, &mut st)?;

        // Let the last message transfer drain before reusing the reader.
        if let Err(err) = self.accel.reader().wait() {
            return Err(self.fail(err));
        }

        let wire = layout::sk_wire_map(level);
        let mut offset = map.sk_feed;
        let feed = [
            (wire.k, K_SIZE),
            (wire.s1, field_len(KeyField::S1, level)),
            (wire.s2, field_len(KeyField::S2, level)),
            (wire.t0, field_len(KeyField::T0, level)),
        ];
        for (src, len) in feed {
            self.scratch.write(offset, &sk[src..src + len]);
            offset += align8(len);
        }
        let reader = self.accel.reader();
        reader.setup(self.scratch.addr(map.sk_feed), map.sk_feed_len as u32);
        reader.start();

        if let Err(err) = self.accel.reader().wait() {
            return Err(self.fail(err));
        }
        if let Err(err) = self.accel.writer().wait() {
            return Err(self.fail(err));
        }

        // Secret fragments have been consumed by the reader; scrub them
        // before anything else leaves this call.
        self.scratch.zeroize_region(map.rho, map.head_len);
        self.scratch.zeroize_region(map.sk_feed, map.sk_feed_len);

        for seg in layout::signature_segments(level) {
            let src = self.scratch.bytes(map.sig_out + seg.native, seg.len);
            sig[seg.wire..seg.wire + seg.len].copy_from_slice(src);
        }

        self.state = OpState::Idle;
        Ok(sig_len)
    }

    /// Begins a verify operation: stages `(Rho, C, Z, T1, message length)`
    /// and starts the accelerator without blocking. H is excluded here —
    /// its length is level-dependent and it is supplied last, to
    /// [`Self::verify_finish`]. `sig` must carry at least `C | Z`.
    pub fn verify_start(
        &mut self,
        level: SecurityLevel,
        pk: &[u8],
        sig: &[u8],
        msg_len: u32,
    ) -> PqsmResult<SessionHandle> {
        if !matches!(self.state, OpState::Idle) {
            return Err(PqsmError::ProtocolDesync);
        }
        let z_len = field_len(KeyField::Z, level);
        if pk.len() != params::pk_len(level) || sig.len() < C_SIZE + z_len {
            return Err(PqsmError::InvalidArgument);
        }
        if msg_len > MAX_MSG_LEN {
            return Err(PqsmError::InvalidArgument);
        }

        let map = layout::verify_map(level);
        self.scratch.write(map.rho, &pk[..RHO_SIZE]);
        self.scratch.write(map.c, &sig[..C_SIZE]);
        self.scratch.write(map.z, &sig[C_SIZE..C_SIZE + z_len]);
        self.scratch.write(map.t1, &pk[RHO_SIZE..]);
        self.scratch.write(map.mlen, &(msg_len as u64).to_be_bytes());

        self.accel.reset();
        self.accel.setup(Mode::Verify, level);
        let writer = self.accel.writer();
        writer.setup(self.scratch.addr(map.result), 8);
        writer.start();
        let reader = self.accel.reader();
        reader.setup(self.scratch.addr(map.rho), map.head_len as u32);
        reader.start();
        self.accel.start();

        self.state = OpState::VerifyAwaitingFinish(StreamState {
            level,
            msg_len,
            msg_fed: 0,
            staged: 0,
        });
        Ok(SessionHandle { _priv: () })
    }

    /// Streams message bytes into the verify operation.
    pub fn verify_update(&mut self, session: &SessionHandle, chunk: &[u8]) -> PqsmResult<()> {
        let _ = session;
        let mut st = match self.state {
            OpState::VerifyAwaitingFinish(st) => st,
            _ => return Err(PqsmError::ProtocolDesync),
        };
        let chunk_offset = layout::verify_map(st.level).chunk;
        self.feed_bytes(chunk_offset, &mut st, chunk)?;
        self.state = OpState::VerifyAwaitingFinish(st);
        Ok(())
    }

    /// Streams message bytes into the verify operation, letting `fill`
    /// produce them directly in the staging slot.
    pub fn verify_update_with<F>(
        &mut self,
        _session: &SessionHandle,
        len: usize,
        fill: F,
    ) -> PqsmResult<()>
    where
        F: FnOnce(&mut [u8]) -> PqsmResult<()>,
    {
        let mut st = match self.state {
            OpState::VerifyAwaitingFinish(st) => st,
            _ => return Err(PqsmError::ProtocolDesync),
        };
        let chunk_offset = layout::verify_map(st.level).chunk;
        self.feed_with(chunk_offset, &mut st, len, fill)?;
        self.state = OpState::VerifyAwaitingFinish(st);
        Ok(())
    }

    /// Completes a verify operation: feeds H, waits for the accelerator and
    /// reads the 64-bit result word. A result of zero means the signature
    /// was accepted; any nonzero value means rejected.
    pub fn verify_finish(&mut self, session: SessionHandle, h: &[u8]) -> PqsmResult<bool> {
        let _ = session;
        let mut st = match self.state {
            OpState::VerifyAwaitingFinish(st) => st,
            _ => return Err(PqsmError::ProtocolDesync),
        };
        let level = st.level;
        if h.len() != field_len(KeyField::H, level) {
            return Err(self.fail(PqsmError::InvalidArgument));
        }
        if st.msg_fed != st.msg_len {
            return Err(self.fail(PqsmError::ProtocolDesync));
        }

        let map = layout::verify_map(level);
        self.flush_partial(map.chunk, &mut st)?;

        if let Err(err) = self.accel.reader().wait() {
            return Err(self.fail(err));
        }
        self.scratch.write(map.h, h);
        let reader = self.accel.reader();
        reader.setup(self.scratch.addr(map.h), h.len() as u32);
        reader.start();
        if let Err(err) = self.accel.reader().wait() {
            return Err(self.fail(err));
        }
        if let Err(err) = self.accel.writer().wait() {
            return Err(self.fail(err));
        }

        let result = self.scratch.read_u64_le(map.result);
        self.state = OpState::Idle;
        Ok(result == 0)
    }

    /// Appends message bytes to the staging slot, flushing every filled
    /// slot to the reader DMA. Before the slot is reused, the previous
    /// transfer is drained — the backpressure that keeps the host from
    /// overwriting a chunk the accelerator is still consuming.
    fn feed_bytes(
        &mut self,
        chunk_offset: usize,
        st: &mut StreamState,
        mut bytes: &[u8],
    ) -> PqsmResult<()> {
        if st.msg_fed as usize + bytes.len() > st.msg_len as usize {
            return Err(PqsmError::InvalidArgument);
        }
        while !bytes.is_empty() {
            let space = CHUNK_SIZE - st.staged as usize;
            let take = space.min(bytes.len());
            if st.staged == 0 {
                if let Err(err) = self.accel.reader().wait() {
                    return Err(self.fail(err));
                }
            }
            self.scratch
                .write(chunk_offset + st.staged as usize, &bytes[..take]);
            st.staged += take as u32;
            st.msg_fed += take as u32;
            bytes = &bytes[take..];
            if st.staged as usize == CHUNK_SIZE {
                let reader = self.accel.reader();
                reader.setup(self.scratch.addr(chunk_offset), CHUNK_SIZE as u32);
                reader.start();
                st.staged = 0;
            }
        }
        Ok(())
    }

    /// Closure flavor of [`Self::feed_bytes`]; `len` must fit the free
    /// space of the staging slot.
    fn feed_with<F>(
        &mut self,
        chunk_offset: usize,
        st: &mut StreamState,
        len: usize,
        fill: F,
    ) -> PqsmResult<()>
    where
        F: FnOnce(&mut [u8]) -> PqsmResult<()>,
    {
        if st.staged as usize + len > CHUNK_SIZE {
            return Err(PqsmError::InvalidArgument);
        }
        if st.msg_fed as usize + len > st.msg_len as usize {
            return Err(PqsmError::InvalidArgument);
        }
        if len == 0 {
            return Ok(());
        }
        if st.staged == 0 {
            if let Err(err) = self.accel.reader().wait() {
                return Err(self.fail(err));
            }
        }
        if let Err(err) = fill(self
            .scratch
            .bytes_mut(chunk_offset + st.staged as usize, len))
        {
            return Err(self.fail(err));
        }
        st.staged += len as u32;
        st.msg_fed += len as u32;
        if st.staged as usize == CHUNK_SIZE {
            let reader = self.accel.reader();
            reader.setup(self.scratch.addr(chunk_offset), CHUNK_SIZE as u32);
            reader.start();
            st.staged = 0;
        }
        Ok(())
    }

    /// Hands a final, partial staging slot to the reader DMA.
    fn flush_partial(&mut self, chunk_offset: usize, st: &mut StreamState) -> PqsmResult<()> {
        if st.staged == 0 {
            return Ok(());
        }
        if let Err(err) = self.accel.reader().wait() {
            return Err(self.fail(err));
        }
        let reader = self.accel.reader();
        reader.setup(self.scratch.addr(chunk_offset), st.staged);
        reader.start();
        st.staged = 0;
        Ok(())
    }
}
