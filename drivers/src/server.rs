/*++

Licensed under the Apache-2.0 license.

File Name:

    server.rs

Abstract:

    File contains the host command server: SYNC/START dispatch and the
    per-command streaming flows over the serial link.

--*/

use crate::dilithium::Dilithium;
use crate::error::{PqsmError, PqsmResult};
use crate::layout;
use crate::params::{
    self, field_len, KeyField, SecurityLevel, CHUNK_SIZE, C_SIZE, K_SIZE, MAX_MSG_LEN, PK_MAX_LEN,
    RHO_SIZE, SEED_SIZE, SIG_MAX_LEN, SK_MAX_LEN, TR_SIZE,
};
use crate::transport::{
    self, RequestHeader, ResponseHeader, SerialIo, WindowedReader, BASE_ACK_GROUP_LEN, START_BYTE,
    SYNC_BYTE, VERIFY_RES_ACCEPTED, VERIFY_RES_NA, VERIFY_RES_REJECTED,
};
use pqsm_registers::MmioMut;
use zeroize::Zeroize;

/// Host command codes; the encoding doubles as the accelerator mode.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Command {
    Keygen,
    Verify,
    Sign,
}

impl Command {
    pub fn from_wire(val: u8) -> Option<Self> {
        match val {
            0 => Some(Self::Keygen),
            1 => Some(Self::Verify),
            2 => Some(Self::Sign),
            _ => None,
        }
    }

    pub const fn to_wire(self) -> u8 {
        match self {
            Self::Keygen => 0,
            Self::Verify => 1,
            Self::Sign => 2,
        }
    }
}

/// Where the keygen seed comes from.
///
/// Simulation and bring-up builds take it from the host link; production
/// builds take it from the platform entropy subsystem.
pub enum SeedSource<'e> {
    HostLink,
    Entropy(&'e mut dyn EntropySource),
}

/// Platform entropy collaborator (external to this subsystem).
pub trait EntropySource {
    fn fill_seed(&mut self, seed: &mut [u8; SEED_SIZE]) -> PqsmResult<()>;
}

/// Staging buffers for wire-format keys and signatures.
pub struct ServerBuffers {
    pub pk: [u8; PK_MAX_LEN],
    pub sk: [u8; SK_MAX_LEN],
    pub sig: [u8; SIG_MAX_LEN],
}

impl ServerBuffers {
    pub const fn new() -> Self {
        Self {
            pk: [0; PK_MAX_LEN],
            sk: [0; SK_MAX_LEN],
            sig: [0; SIG_MAX_LEN],
        }
    }
}

impl Default for ServerBuffers {
    fn default() -> Self {
        Self::new()
    }
}

/// Host command server.
///
/// Owns the serial link and the orchestrator; one command is processed at a
/// time, mirroring the single hardware session.
pub struct Server<'a, S: SerialIo, TMmio: MmioMut> {
    io: S,
    dilithium: Dilithium<'a, TMmio>,
    bufs: &'a mut ServerBuffers,
    seed_source: SeedSource<'a>,
}

impl<'a, S: SerialIo, TMmio: MmioMut> Server<'a, S, TMmio> {
    pub fn new(
        io: S,
        dilithium: Dilithium<'a, TMmio>,
        bufs: &'a mut ServerBuffers,
        seed_source: SeedSource<'a>,
    ) -> Self {
        Self {
            io,
            dilithium,
            bufs,
            seed_source,
        }
    }

    /// Reads one signal byte from the host and services it: SYNC is
    /// answered with READY, START runs a full command exchange, anything
    /// else is ignored.
    ///
    /// An error means the link desynchronized mid-command; the session was
    /// abandoned and the host must re-synchronize with SYNC/START.
    pub fn process_one(&mut self) -> PqsmResult<()> {
        let signal = self.io.read_byte();
        if signal == SYNC_BYTE {
            transport::send_ready(&mut self.io);
            Ok(())
        } else if signal == START_BYTE {
            self.handle_command()
        } else {
            Ok(())
        }
    }

    fn handle_command(&mut self) -> PqsmResult<()> {
        transport::send_ack(&mut self.io);
        let hdr = transport::read_request_header(&mut self.io)?;
        let msg_len = hdr.msg_len.get();

        let cmd = match Command::from_wire(hdr.cmd) {
            Some(cmd) => cmd,
            None => return self.respond_header_err(&hdr, PqsmError::InvalidArgument),
        };
        let level = match SecurityLevel::from_wire(hdr.sec_level) {
            Some(level) => level,
            None => return self.respond_header_err(&hdr, PqsmError::UnsupportedLevel),
        };
        if msg_len > MAX_MSG_LEN {
            return self.respond_header_err(&hdr, PqsmError::InvalidArgument);
        }
        transport::send_ack(&mut self.io);

        match cmd {
            Command::Keygen => self.handle_keygen(level),
            Command::Sign => self.handle_sign(level, msg_len),
            Command::Verify => self.handle_verify(level, msg_len),
        }
    }

    fn handle_keygen(&mut self, level: SecurityLevel) -> PqsmResult<()> {
        let mut seed = [0u8; SEED_SIZE];
        match &mut self.seed_source {
            SeedSource::HostLink => {
                transport::read_exact(&mut self.io, &mut seed, SEED_SIZE)?;
                transport::send_ack(&mut self.io);
            }
            SeedSource::Entropy(entropy) => entropy.fill_seed(&mut seed)?,
        }

        let result = self
            .dilithium
            .keygen(level, &seed, &mut self.bufs.pk, &mut self.bufs.sk);
        seed.zeroize();
        let (pk_len, sk_len) = match result {
            Ok(lens) => lens,
            Err(err) => return self.respond_op_err(Command::Keygen, level, err),
        };

        self.respond(Command::Keygen.to_wire(), level.to_wire(), 0, VERIFY_RES_NA)?;
        transport::send_exact(&mut self.io, &self.bufs.pk[..pk_len], BASE_ACK_GROUP_LEN)?;
        transport::wait_for_ack(&mut self.io)?;
        transport::send_exact(&mut self.io, &self.bufs.sk[..sk_len], BASE_ACK_GROUP_LEN)?;
        transport::wait_for_ack(&mut self.io)?;
        self.bufs.sk.zeroize();
        Ok(())
    }

    fn handle_sign(&mut self, level: SecurityLevel, msg_len: u32) -> PqsmResult<()> {
        let wire = layout::sk_wire_map(level);
        let sk_len = params::sk_len(level);

        // Wire secret key, component by component: the 32-byte fields are
        // acknowledged as whole windows, the long vectors with the base
        // window.
        let fields = [
            (wire.rho, RHO_SIZE, RHO_SIZE),
            (wire.k, K_SIZE, K_SIZE),
            (wire.tr, TR_SIZE, TR_SIZE),
            (wire.s1, field_len(KeyField::S1, level), BASE_ACK_GROUP_LEN),
            (wire.s2, field_len(KeyField::S2, level), BASE_ACK_GROUP_LEN),
            (wire.t0, field_len(KeyField::T0, level), BASE_ACK_GROUP_LEN),
        ];
        for (offset, len, group) in fields {
            let result = transport::read_exact(
                &mut self.io,
                &mut self.bufs.sk[offset..offset + len],
                group,
            );
            if let Err(err) = result {
                self.bufs.sk.zeroize();
                return Err(err);
            }
            transport::send_ack(&mut self.io);
        }

        let session = match self.dilithium.sign_start(level, &self.bufs.sk[..sk_len], msg_len) {
            Ok(session) => session,
            Err(err) => {
                self.bufs.sk.zeroize();
                return self.respond_op_err(Command::Sign, level, err);
            }
        };

        let mut reader = WindowedReader::new(msg_len as usize, BASE_ACK_GROUP_LEN);
        while reader.remaining() > 0 {
            let len = reader.remaining().min(CHUNK_SIZE);
            let io = &mut self.io;
            let result = self
                .dilithium
                .sign_update_with(&session, len, |slot| reader.read_into(io, slot));
            if let Err(err) = result {
                self.bufs.sk.zeroize();
                return self.respond_op_err(Command::Sign, level, err);
            }
        }

        let result = self
            .dilithium
            .sign_finish(session, &self.bufs.sk[..sk_len], &mut self.bufs.sig);
        self.bufs.sk.zeroize();
        let sig_len = match result {
            Ok(len) => len,
            Err(err) => return self.respond_op_err(Command::Sign, level, err),
        };

        self.respond(Command::Sign.to_wire(), level.to_wire(), 0, VERIFY_RES_NA)?;
        transport::send_exact(&mut self.io, &self.bufs.sig[..sig_len], BASE_ACK_GROUP_LEN)?;
        transport::wait_for_ack(&mut self.io)
    }

    fn handle_verify(&mut self, level: SecurityLevel, msg_len: u32) -> PqsmResult<()> {
        let z_len = field_len(KeyField::Z, level);
        let t1_len = field_len(KeyField::T1, level);
        let h_len = field_len(KeyField::H, level);
        let pk_len = params::pk_len(level);

        // Wire order: Rho, C, Z, T1, then the message, then H last.
        transport::read_exact(&mut self.io, &mut self.bufs.pk[..RHO_SIZE], RHO_SIZE)?;
        transport::send_ack(&mut self.io);
        transport::read_exact(&mut self.io, &mut self.bufs.sig[..C_SIZE], C_SIZE)?;
        transport::send_ack(&mut self.io);
        transport::read_exact(
            &mut self.io,
            &mut self.bufs.sig[C_SIZE..C_SIZE + z_len],
            BASE_ACK_GROUP_LEN,
        )?;
        transport::send_ack(&mut self.io);
        transport::read_exact(
            &mut self.io,
            &mut self.bufs.pk[RHO_SIZE..RHO_SIZE + t1_len],
            BASE_ACK_GROUP_LEN,
        )?;
        transport::send_ack(&mut self.io);

        let session = match self.dilithium.verify_start(
            level,
            &self.bufs.pk[..pk_len],
            &self.bufs.sig[..C_SIZE + z_len],
            msg_len,
        ) {
            Ok(session) => session,
            Err(err) => return self.respond_op_err(Command::Verify, level, err),
        };

        let mut reader = WindowedReader::new(msg_len as usize, BASE_ACK_GROUP_LEN);
        while reader.remaining() > 0 {
            let len = reader.remaining().min(CHUNK_SIZE);
            let io = &mut self.io;
            let result = self
                .dilithium
                .verify_update_with(&session, len, |slot| reader.read_into(io, slot));
            if let Err(err) = result {
                return self.respond_op_err(Command::Verify, level, err);
            }
        }

        let h_group = h_len.min(BASE_ACK_GROUP_LEN);
        let h_offset = C_SIZE + z_len;
        transport::read_exact(
            &mut self.io,
            &mut self.bufs.sig[h_offset..h_offset + h_len],
            h_group,
        )?;
        transport::send_ack(&mut self.io);

        let accepted = match self
            .dilithium
            .verify_finish(session, &self.bufs.sig[h_offset..h_offset + h_len])
        {
            Ok(accepted) => accepted,
            Err(err) => return self.respond_op_err(Command::Verify, level, err),
        };

        let verify_res = if accepted {
            VERIFY_RES_ACCEPTED
        } else {
            VERIFY_RES_REJECTED
        };
        self.respond(Command::Verify.to_wire(), level.to_wire(), 0, verify_res)
    }

    /// Error response for a header rejected before dispatch; echoes the raw
    /// header bytes so the host can correlate.
    fn respond_header_err(&mut self, hdr: &RequestHeader, err: PqsmError) -> PqsmResult<()> {
        self.respond(hdr.cmd, hdr.sec_level, err.wire_code(), VERIFY_RES_NA)
    }

    /// Error response for a failed operation; the session is abandoned and
    /// the accelerator reset.
    fn respond_op_err(
        &mut self,
        cmd: Command,
        level: SecurityLevel,
        err: PqsmError,
    ) -> PqsmResult<()> {
        self.dilithium.abort();
        self.respond(cmd.to_wire(), level.to_wire(), err.wire_code(), VERIFY_RES_NA)
    }

    fn respond(
        &mut self,
        cmd: u8,
        sec_level: u8,
        rsp_code: u8,
        verify_res: u8,
    ) -> PqsmResult<()> {
        transport::transmission_handshake(&mut self.io)?;
        transport::send_response(
            &mut self.io,
            &ResponseHeader {
                cmd,
                sec_level,
                rsp_code,
                verify_res,
            },
        );
        transport::wait_for_ack(&mut self.io)
    }
}
