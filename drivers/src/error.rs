/*++

Licensed under the Apache-2.0 license.

File Name:

    error.rs

Abstract:

    File contains the error type used by the library.

--*/

/// PQSM driver error.
///
/// Closed enumeration; every fallible driver entry point reports one of
/// these categories. Each maps to a stable one-byte code carried in the
/// response header's `rsp_code` field.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum PqsmError {
    /// Bad argument: wrong slice length, disallowed chunk size, message
    /// length over the maximum.
    InvalidArgument = 1,

    /// A caller-supplied output buffer is smaller than the computed
    /// required length.
    BufferTooSmall = 2,

    /// Security level outside {2, 3, 5}.
    UnsupportedLevel = 3,

    /// A DMA channel failed to complete within the spin budget.
    HardwareFault = 4,

    /// Host link desynchronized, or an operation's calls arrived out of
    /// order. Recovery requires a fresh SYNC/START handshake.
    ProtocolDesync = 5,
}

impl PqsmError {
    /// Code carried in the response header.
    pub fn wire_code(self) -> u8 {
        self as u8
    }
}

pub type PqsmResult<T> = Result<T, PqsmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_codes_are_stable() {
        assert_eq!(PqsmError::InvalidArgument.wire_code(), 1);
        assert_eq!(PqsmError::BufferTooSmall.wire_code(), 2);
        assert_eq!(PqsmError::UnsupportedLevel.wire_code(), 3);
        assert_eq!(PqsmError::HardwareFault.wire_code(), 4);
        assert_eq!(PqsmError::ProtocolDesync.wire_code(), 5);
    }
}
