//! # Dual-CRC Fingerprints
//!
//! Two independent table-driven CRC accumulators. A block is identified by the
//! pair of remainders; both must agree before a candidate is worth a pixel
//! compare.
//!
//! The calculators are MSB-first and non-reflected with no final XOR, so the
//! value depends only on the byte content and its length.

use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{HashError, Result};
use crate::picture::Sample;

/// Process-wide default pair, built on first use.
static DEFAULT_PAIR: Lazy<Arc<CrcPair>> = Lazy::new(|| Arc::new(CrcPair::default()));

/// CRC parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct CrcParams {
    /// Register width in bits (8..=32)
    pub bits: u32,
    /// Truncated polynomial (implicit top bit omitted)
    pub poly: u32,
    /// Initial remainder
    pub seed: u32,
}

impl CrcParams {
    /// CRC-16 with the CCITT polynomial, zero seed.
    pub const CRC16_CCITT: CrcParams = CrcParams { bits: 16, poly: 0x1021, seed: 0x0000 };

    /// CRC-16 with the IBM polynomial, all-ones seed.
    pub const CRC16_IBM: CrcParams = CrcParams { bits: 16, poly: 0x8005, seed: 0xFFFF };

    /// First 24-bit calculator of the AV1 reference encoders.
    pub const AV1_PRIMARY: CrcParams = CrcParams { bits: 24, poly: 0x5D6DCB, seed: 0 };

    /// Second 24-bit calculator of the AV1 reference encoders.
    pub const AV1_SECONDARY: CrcParams = CrcParams { bits: 24, poly: 0x864CFB, seed: 0 };

    fn mask(&self) -> u32 {
        if self.bits == 32 {
            u32::MAX
        } else {
            (1u32 << self.bits) - 1
        }
    }

    /// Check width and that poly/seed fit the register.
    pub fn validate(&self) -> Result<()> {
        if !(8..=32).contains(&self.bits) {
            return Err(HashError::InvalidCrc(format!(
                "width {} outside 8..=32",
                self.bits
            )));
        }
        let mask = self.mask();
        if self.poly & !mask != 0 || self.poly == 0 {
            return Err(HashError::InvalidCrc(format!(
                "polynomial {:#x} does not fit {} bits",
                self.poly, self.bits
            )));
        }
        if self.seed & !mask != 0 {
            return Err(HashError::InvalidCrc(format!(
                "seed {:#x} does not fit {} bits",
                self.seed, self.bits
            )));
        }
        Ok(())
    }
}

/// Table-driven CRC calculator
#[derive(Clone)]
pub struct CrcCalculator {
    params: CrcParams,
    mask: u32,
    table: [u32; 256],
}

impl CrcCalculator {
    /// Build the lookup table for `params`.
    pub fn new(params: CrcParams) -> Result<Self> {
        params.validate()?;
        let mask = params.mask();
        let high_bit = 1u32 << (params.bits - 1);

        let mut table = [0u32; 256];
        for (value, entry) in table.iter_mut().enumerate() {
            let mut remainder = 0u32;
            let mut bit = 0x80usize;
            while bit != 0 {
                if value & bit != 0 {
                    remainder ^= high_bit;
                }
                if remainder & high_bit != 0 {
                    remainder = (remainder << 1) ^ params.poly;
                } else {
                    remainder <<= 1;
                }
                bit >>= 1;
            }
            *entry = remainder & mask;
        }

        Ok(Self { params, mask, table })
    }

    /// Parameters this calculator was built from
    pub fn params(&self) -> CrcParams {
        self.params
    }

    /// Continue a running remainder over `bytes`.
    #[inline]
    pub fn update(&self, state: u32, bytes: &[u8]) -> u32 {
        let shift = self.params.bits - 8;
        let mut remainder = state & self.mask;
        for &byte in bytes {
            let index = ((remainder >> shift) as u8 ^ byte) as usize;
            remainder = ((remainder << 8) ^ self.table[index]) & self.mask;
        }
        remainder
    }

    /// Fresh remainder over `bytes`, starting from the seed.
    #[inline]
    pub fn checksum(&self, bytes: &[u8]) -> u32 {
        self.update(self.params.seed, bytes)
    }
}

impl std::fmt::Debug for CrcCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrcCalculator")
            .field("params", &self.params)
            .finish()
    }
}

/// Fingerprint pair of one block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BlockFingerprint {
    /// Value from the primary calculator; its low 16 bits select the bucket.
    pub primary: u32,
    /// Value from the secondary calculator, stored alongside each position.
    pub secondary: u32,
}

impl BlockFingerprint {
    /// Bucket key for this fingerprint at block dimension `size`.
    pub fn bucket_key(&self, size: usize) -> Result<u32> {
        crate::table::bucket_key(size, self.primary)
    }
}

/// Two independent calculators used together
#[derive(Debug, Clone)]
pub struct CrcPair {
    primary: CrcCalculator,
    secondary: CrcCalculator,
}

impl Default for CrcPair {
    fn default() -> Self {
        Self::new(CrcParams::CRC16_CCITT, CrcParams::CRC16_IBM)
            .unwrap_or_else(|_| unreachable!("built-in CRC parameters are valid"))
    }
}

impl CrcPair {
    /// Build a pair from two parameter sets.
    pub fn new(primary: CrcParams, secondary: CrcParams) -> Result<Self> {
        Ok(Self {
            primary: CrcCalculator::new(primary)?,
            secondary: CrcCalculator::new(secondary)?,
        })
    }

    /// The 24-bit pair used by the AV1 reference encoders.
    pub fn av1() -> Self {
        Self::new(CrcParams::AV1_PRIMARY, CrcParams::AV1_SECONDARY)
            .unwrap_or_else(|_| unreachable!("built-in CRC parameters are valid"))
    }

    /// Shared handle to the default pair
    pub fn shared_default() -> Arc<CrcPair> {
        Arc::clone(&DEFAULT_PAIR)
    }

    pub fn primary(&self) -> &CrcCalculator {
        &self.primary
    }

    pub fn secondary(&self) -> &CrcCalculator {
        &self.secondary
    }

    /// Fingerprint an arbitrary packed byte sequence.
    #[inline]
    pub fn fingerprint(&self, bytes: &[u8]) -> BlockFingerprint {
        BlockFingerprint {
            primary: self.primary.checksum(bytes),
            secondary: self.secondary.checksum(bytes),
        }
    }

    /// Fingerprint a raw 2x2 sample quad.
    #[inline]
    pub fn hash_quad<S: Sample>(&self, quad: &[S; 4]) -> BlockFingerprint {
        let mut packed = [0u8; 8];
        let len = S::pack_quad(quad, &mut packed);
        self.fingerprint(&packed[..len])
    }

    /// Fingerprint a block from its four quadrant children
    /// (top-left, top-right, bottom-left, bottom-right).
    ///
    /// Each calculator only sees the children's values from that same
    /// calculator, packed as four little-endian `u32`s.
    #[inline]
    pub fn combine(&self, children: &[BlockFingerprint; 4]) -> BlockFingerprint {
        let mut primary = [0u8; 16];
        let mut secondary = [0u8; 16];
        for (i, child) in children.iter().enumerate() {
            primary[i * 4..i * 4 + 4].copy_from_slice(&child.primary.to_le_bytes());
            secondary[i * 4..i * 4 + 4].copy_from_slice(&child.secondary.to_le_bytes());
        }
        BlockFingerprint {
            primary: self.primary.checksum(&primary),
            secondary: self.secondary.checksum(&secondary),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc16_ccitt_check_value() {
        // CRC-16/XMODEM: poly 0x1021, init 0, no reflection, no xorout
        let crc = CrcCalculator::new(CrcParams::CRC16_CCITT).unwrap();
        assert_eq!(crc.checksum(b"123456789"), 0x31C3);
    }

    #[test]
    fn test_crc16_ibm_seeded_check_value() {
        // CRC-16/CMS: poly 0x8005, init 0xFFFF, no reflection, no xorout
        let crc = CrcCalculator::new(CrcParams::CRC16_IBM).unwrap();
        assert_eq!(crc.checksum(b"123456789"), 0xAEE7);
    }

    #[test]
    fn test_update_is_incremental() {
        let crc = CrcCalculator::new(CrcParams::AV1_PRIMARY).unwrap();
        let whole = crc.checksum(b"hello world");
        let part = crc.update(crc.params().seed, b"hello");
        assert_eq!(crc.update(part, b" world"), whole);
    }

    #[test]
    fn test_values_fit_width() {
        let crc = CrcCalculator::new(CrcParams::AV1_SECONDARY).unwrap();
        for len in 0..32u8 {
            let data: Vec<u8> = (0..len).map(|i| i.wrapping_mul(37)).collect();
            assert!(crc.checksum(&data) < (1 << 24));
        }
    }

    #[test]
    fn test_invalid_params() {
        assert!(CrcCalculator::new(CrcParams { bits: 4, poly: 0x3, seed: 0 }).is_err());
        assert!(CrcCalculator::new(CrcParams { bits: 16, poly: 0x1_1021, seed: 0 }).is_err());
        assert!(CrcCalculator::new(CrcParams { bits: 16, poly: 0x1021, seed: 0x1_0000 }).is_err());
        assert!(CrcCalculator::new(CrcParams { bits: 16, poly: 0, seed: 0 }).is_err());
        assert!(CrcCalculator::new(CrcParams { bits: 32, poly: 0x04C1_1DB7, seed: u32::MAX }).is_ok());
    }

    #[test]
    fn test_pair_is_decorrelated() {
        let pair = CrcPair::default();
        let fp = pair.fingerprint(&[1, 2, 3, 4]);
        assert_ne!(fp.primary, fp.secondary);
    }
}
