//! # Hashing Configuration
//!
//! Configuration parsed from encoder-provided JSON.

use serde::{Deserialize, Serialize};

use crate::crc::{CrcPair, CrcParams};
use crate::error::{HashError, Result};
use crate::table::size_index;

/// Hashing configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HashConfig {
    /// Calculator whose low 16 bits select the bucket
    #[serde(rename = "primaryCrc")]
    pub primary_crc: CrcParams,

    /// Calculator stored with each entry for verification
    #[serde(rename = "secondaryCrc")]
    pub secondary_crc: CrcParams,

    /// Smallest block size inserted into the table
    #[serde(rename = "minBlockSize")]
    pub min_block_size: usize,

    /// Largest block size built and inserted
    #[serde(rename = "maxBlockSize")]
    pub max_block_size: usize,

    /// Build tier rows on the rayon pool
    pub parallel: bool,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            primary_crc: CrcParams::CRC16_CCITT,
            secondary_crc: CrcParams::CRC16_IBM,
            min_block_size: 4,
            max_block_size: 128,
            parallel: true,
        }
    }
}

impl HashConfig {
    /// Parse and validate config from bytes (JSON)
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            log::warn!("Empty hash config data, using defaults");
            return Ok(Self::default());
        }

        let config: Self = serde_json::from_slice(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Check CRC parameters and the indexed size range.
    pub fn validate(&self) -> Result<()> {
        self.primary_crc.validate()?;
        self.secondary_crc.validate()?;

        for size in [self.min_block_size, self.max_block_size] {
            if size_index(size).is_none() {
                return Err(HashError::InvalidConfig(format!(
                    "block size {} is not one of 4, 8, 16, 32, 64, 128",
                    size
                )));
            }
        }
        if self.min_block_size > self.max_block_size {
            return Err(HashError::InvalidConfig(format!(
                "minBlockSize {} exceeds maxBlockSize {}",
                self.min_block_size, self.max_block_size
            )));
        }
        if self.primary_crc == self.secondary_crc {
            log::warn!("Primary and secondary CRC are identical; fingerprints will not be independent");
        }
        Ok(())
    }

    /// Calculators described by this config
    pub fn crc_pair(&self) -> Result<CrcPair> {
        CrcPair::new(self.primary_crc, self.secondary_crc)
    }

    /// Block sizes inserted into the table, smallest first.
    pub fn indexed_sizes(&self) -> impl Iterator<Item = usize> {
        let (min, max) = (self.min_block_size, self.max_block_size);
        crate::table::INDEXED_SIZES
            .into_iter()
            .filter(move |size| (min..=max).contains(size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_bytes_give_defaults() {
        assert_eq!(HashConfig::from_bytes(b"").unwrap(), HashConfig::default());
    }

    #[test]
    fn test_round_trip() {
        let config = HashConfig {
            primary_crc: CrcParams::AV1_PRIMARY,
            secondary_crc: CrcParams::AV1_SECONDARY,
            min_block_size: 8,
            max_block_size: 64,
            parallel: false,
        };
        let parsed = HashConfig::from_bytes(&config.to_bytes()).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(parsed.indexed_sizes().collect::<Vec<_>>(), vec![8, 16, 32, 64]);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = HashConfig::from_bytes(br#"{"maxBlockSize": 32, "parallel": false}"#).unwrap();
        assert_eq!(config.max_block_size, 32);
        assert_eq!(config.min_block_size, 4);
        assert!(!config.parallel);
        assert_eq!(config.primary_crc, CrcParams::CRC16_CCITT);
    }

    #[test]
    fn test_invalid_configs() {
        assert!(matches!(
            HashConfig::from_bytes(br#"{"minBlockSize": 6}"#),
            Err(HashError::InvalidConfig(_))
        ));
        assert!(matches!(
            HashConfig::from_bytes(br#"{"minBlockSize": 64, "maxBlockSize": 16}"#),
            Err(HashError::InvalidConfig(_))
        ));
        assert!(matches!(
            HashConfig::from_bytes(br#"{"primaryCrc": {"bits": 16, "poly": 70000, "seed": 0}}"#),
            Err(HashError::InvalidCrc(_))
        ));
        assert!(matches!(HashConfig::from_bytes(b"{not json"), Err(HashError::Config(_))));
    }
}
