/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the PQSM driver library.

--*/

#![cfg_attr(not(any(test, feature = "std")), no_std)]

mod accel;
mod dilithium;
mod dma;
mod error;
pub mod layout;
pub mod params;
pub mod printer;
mod scratch;
mod server;
mod transport;
mod uart;
pub mod wait;

pub use accel::{Accelerator, Mode, DEFAULT_SPIN_BUDGET};
pub use dilithium::{Dilithium, SessionHandle};
pub use dma::{align8, DmaChannel};
pub use error::{PqsmError, PqsmResult};
pub use scratch::{ScratchBuffer, ScratchMem, SCRATCH_SIZE};
pub use server::{Command, EntropySource, SeedSource, Server, ServerBuffers};
pub use transport::{
    read_exact, read_request_header, send_ack, send_exact, send_ready, send_response, send_start,
    transmission_handshake, wait_for_ack, RequestHeader, ResponseHeader, SerialIo, WindowedReader,
    ACK_BYTE, BASE_ACK_GROUP_LEN, READY_BYTE, START_BYTE, SYNC_BYTE, VERIFY_RES_ACCEPTED,
    VERIFY_RES_NA, VERIFY_RES_REJECTED,
};
pub use uart::Uart;
