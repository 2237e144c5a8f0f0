/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the PQSM software emulator library.

--*/

mod accel;
mod bus;
pub mod crypto;
pub mod host;
mod mmio;
mod types;

pub use accel::{DilithiumModel, DILITHIUM_MODEL_ADDR};
pub use bus::{Bus, BusError};
pub use host::{serial_pair, ChannelIo};
pub use mmio::BusMmio;
pub use types::{RvAddr, RvData, RvSize};
