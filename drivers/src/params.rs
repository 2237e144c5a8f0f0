/*++

Licensed under the Apache-2.0 license.

File Name:

    params.rs

Abstract:

    File contains the accelerator parameter table: per-level byte lengths of
    the key and signature components, and the derived aggregate lengths.

--*/

/// Seed length consumed by key generation.
pub const SEED_SIZE: usize = 32;

/// Lengths of the fixed-size components (level independent).
pub const RHO_SIZE: usize = 32;
pub const K_SIZE: usize = 32;
pub const TR_SIZE: usize = 32;
pub const C_SIZE: usize = 32;

/// Message ingestion chunk bound; one chunk is staged and handed to the
/// reader DMA at a time.
pub const CHUNK_SIZE: usize = 256;

/// Maximum message length accepted by the command interface.
pub const MAX_MSG_LEN: u32 = 8192;

/// Accelerator parameter set.
///
/// The level byte is validated at the wire boundary; past it, an invalid
/// level is unrepresentable.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SecurityLevel {
    L2,
    L3,
    L5,
}

impl SecurityLevel {
    /// Parses the level byte from the request header.
    pub fn from_wire(val: u8) -> Option<Self> {
        match val {
            2 => Some(Self::L2),
            3 => Some(Self::L3),
            5 => Some(Self::L5),
            _ => None,
        }
    }

    /// Level byte as carried on the wire and written to the
    /// `security_level` register.
    pub const fn to_wire(self) -> u8 {
        match self {
            Self::L2 => 2,
            Self::L3 => 3,
            Self::L5 => 5,
        }
    }

    pub const ALL: [SecurityLevel; 3] = [Self::L2, Self::L3, Self::L5];
}

/// Named byte-vector components of the public key, secret key and
/// signature.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum KeyField {
    Rho,
    K,
    Tr,
    S1,
    S2,
    T0,
    T1,
    Z,
    C,
    H,
}

/// Byte length of `field` at `level`.
pub const fn field_len(field: KeyField, level: SecurityLevel) -> usize {
    use KeyField::*;
    use SecurityLevel::*;
    match field {
        Rho => RHO_SIZE,
        K => K_SIZE,
        Tr => TR_SIZE,
        C => C_SIZE,
        S1 => match level {
            L2 => 384,
            L3 => 640,
            L5 => 672,
        },
        S2 => match level {
            L2 => 384,
            L3 => 768,
            L5 => 768,
        },
        T0 => match level {
            L2 => 1664,
            L3 => 2496,
            L5 => 3328,
        },
        T1 => match level {
            L2 => 1280,
            L3 => 1920,
            L5 => 2560,
        },
        Z => match level {
            L2 => 2304,
            L3 => 3200,
            L5 => 4480,
        },
        H => match level {
            L2 => 84,
            L3 => 61,
            L5 => 83,
        },
    }
}

/// Wire public key length: `Rho | T1`.
pub const fn pk_len(level: SecurityLevel) -> usize {
    RHO_SIZE + field_len(KeyField::T1, level)
}

/// Wire secret key length: `Rho | K | Tr | S1 | S2 | T0`.
pub const fn sk_len(level: SecurityLevel) -> usize {
    RHO_SIZE
        + K_SIZE
        + TR_SIZE
        + field_len(KeyField::S1, level)
        + field_len(KeyField::S2, level)
        + field_len(KeyField::T0, level)
}

/// Wire signature length: `C | Z | H`.
pub const fn sig_len(level: SecurityLevel) -> usize {
    C_SIZE + field_len(KeyField::Z, level) + field_len(KeyField::H, level)
}

/// Largest wire public key across the parameter sets.
pub const PK_MAX_LEN: usize = pk_len(SecurityLevel::L5);

/// Largest wire secret key across the parameter sets.
pub const SK_MAX_LEN: usize = sk_len(SecurityLevel::L5);

/// Largest wire signature across the parameter sets.
pub const SIG_MAX_LEN: usize = sig_len(SecurityLevel::L5);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_wire_rejects_invalid_levels() {
        assert_eq!(SecurityLevel::from_wire(2), Some(SecurityLevel::L2));
        assert_eq!(SecurityLevel::from_wire(3), Some(SecurityLevel::L3));
        assert_eq!(SecurityLevel::from_wire(5), Some(SecurityLevel::L5));
        for val in [0u8, 1, 4, 6, 0xFF] {
            assert_eq!(SecurityLevel::from_wire(val), None);
        }
    }

    #[test]
    fn test_derived_lengths() {
        assert_eq!(pk_len(SecurityLevel::L2), 32 + 1280);
        assert_eq!(pk_len(SecurityLevel::L3), 32 + 1920);
        assert_eq!(pk_len(SecurityLevel::L5), 32 + 2560);

        assert_eq!(sk_len(SecurityLevel::L2), 96 + 384 + 384 + 1664);
        assert_eq!(sk_len(SecurityLevel::L3), 96 + 640 + 768 + 2496);
        assert_eq!(sk_len(SecurityLevel::L5), 96 + 672 + 768 + 3328);

        assert_eq!(sig_len(SecurityLevel::L2), 32 + 2304 + 84);
        assert_eq!(sig_len(SecurityLevel::L3), 32 + 3200 + 61);
        assert_eq!(sig_len(SecurityLevel::L5), 32 + 4480 + 83);
    }

    #[test]
    fn test_max_lengths_cover_every_level() {
        for level in SecurityLevel::ALL {
            assert!(pk_len(level) <= PK_MAX_LEN);
            assert!(sk_len(level) <= SK_MAX_LEN);
            assert!(sig_len(level) <= SIG_MAX_LEN);
        }
    }
}
