//! # Picture Hash Index
//!
//! Owns everything built for one picture: the tier builder runs from 2x2 up
//! to the largest configured size, each indexed tier is inserted as soon as it
//! exists, and the finished table is handed to search as read-only data.
//! Dropping the index releases the table, including on early error returns
//! while it is being built.

use std::sync::Arc;

use crate::config::HashConfig;
use crate::crc::{BlockFingerprint, CrcPair};
use crate::error::{HashError, Result};
use crate::hierarchy::{TierBuilder, BASE_BLOCK_SIZE};
use crate::picture::Picture;
use crate::table::{bucket_key, BlockHash, HashTable, TableStats};

/// Fingerprint index of one picture
#[derive(Debug)]
pub struct PictureHashIndex {
    table: HashTable,
    width: usize,
    height: usize,
    min_block_size: usize,
    max_block_size: usize,
}

impl PictureHashIndex {
    /// Build every tier of `picture` and index the configured sizes.
    ///
    /// `crc` must carry the parameters named in `config`; a mismatch is
    /// rejected so lookups with `config.crc_pair()` stay consistent.
    pub fn build(picture: &Picture<'_>, crc: Arc<CrcPair>, config: &HashConfig) -> Result<Self> {
        config.validate()?;
        let in_use = (crc.primary().params(), crc.secondary().params());
        if in_use != (config.primary_crc, config.secondary_crc) {
            return Err(HashError::InvalidConfig(format!(
                "CRC pair {:?} / {:?} differs from configured {:?} / {:?}",
                in_use.0, in_use.1, config.primary_crc, config.secondary_crc
            )));
        }
        let indexed: Vec<usize> = config.indexed_sizes().collect();

        let mut index = Self {
            table: HashTable::new(),
            width: picture.width(),
            height: picture.height(),
            min_block_size: config.min_block_size,
            max_block_size: config.max_block_size,
        };
        index.table.create()?;

        let mut builder = TierBuilder::for_picture(crc, picture, config.parallel)?;
        let mut size = BASE_BLOCK_SIZE;
        while size <= config.max_block_size {
            let tier = builder.build_tier(picture, size)?;
            if indexed.contains(&size) {
                index.table.insert_valid_positions(&tier)?;
            }
            size *= 2;
        }

        let stats = index.table.stats();
        log::debug!(
            "Indexed {}x{} picture: {} entries in {} buckets (largest {})",
            index.width,
            index.height,
            stats.entries,
            stats.buckets,
            stats.largest_bucket
        );

        Ok(index)
    }

    pub fn table(&self) -> &HashTable {
        &self.table
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Whether blocks of `size` were inserted.
    pub fn is_indexed(&self, size: usize) -> bool {
        size >= self.min_block_size
            && size <= self.max_block_size
            && crate::table::size_index(size).is_some()
    }

    /// Entries sharing the bucket of `fingerprint` at `size`.
    pub fn count(&self, size: usize, fingerprint: &BlockFingerprint) -> Result<usize> {
        Ok(self.table.count(bucket_key(size, fingerprint.primary)?))
    }

    /// Positions whose full fingerprint pair equals `fingerprint` at `size`.
    pub fn candidates(
        &self,
        size: usize,
        fingerprint: &BlockFingerprint,
    ) -> Result<impl Iterator<Item = &BlockHash> + '_> {
        let key = bucket_key(size, fingerprint.primary)?;
        Ok(self.table.candidates(key, fingerprint.secondary))
    }

    pub fn stats(&self) -> TableStats {
        self.table.stats()
    }
}

impl Drop for PictureHashIndex {
    fn drop(&mut self) {
        self.table.destroy();
        log::trace!("Released hash index for {}x{} picture", self.width, self.height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picture::Plane;

    #[test]
    fn test_build_respects_size_range() {
        let data: Vec<u8> = (0..32 * 32).map(|i| (i * 13 % 241) as u8).collect();
        let picture = Picture::Low(Plane::packed(&data, 32, 32).unwrap());
        let config = HashConfig {
            min_block_size: 8,
            max_block_size: 16,
            ..HashConfig::default()
        };
        let index = PictureHashIndex::build(&picture, CrcPair::shared_default(), &config).unwrap();

        let stats = index.stats();
        assert_eq!(stats.entries_per_size[0], 0);
        assert!(stats.entries_per_size[1] > 0);
        assert!(stats.entries_per_size[2] > 0);
        assert_eq!(stats.entries_per_size[3], 0);
        assert!(index.is_indexed(8));
        assert!(!index.is_indexed(32));
    }

    #[test]
    fn test_crc_pair_must_match_config() {
        let data: Vec<u8> = (0..16 * 16).map(|i| (i * 29 % 251) as u8).collect();
        let picture = Picture::Low(Plane::packed(&data, 16, 16).unwrap());
        let config = HashConfig {
            primary_crc: crate::crc::CrcParams::AV1_PRIMARY,
            secondary_crc: crate::crc::CrcParams::AV1_SECONDARY,
            ..HashConfig::default()
        };

        let result = PictureHashIndex::build(&picture, CrcPair::shared_default(), &config);
        assert!(matches!(result, Err(HashError::InvalidConfig(_))));

        let crc = Arc::new(config.crc_pair().unwrap());
        let index = PictureHashIndex::build(&picture, crc.clone(), &config).unwrap();
        let fingerprint = crate::online::OnlineHasher::new(crc)
            .hash_one_block(&picture, 0, 0, 8)
            .unwrap();
        assert!(index
            .candidates(8, &fingerprint)
            .unwrap()
            .any(|entry| (entry.x, entry.y) == (0, 0)));
    }

    #[test]
    fn test_tiny_picture_is_empty_not_error() {
        let data = [7u8; 9];
        let picture = Picture::Low(Plane::packed(&data, 3, 3).unwrap());
        let index =
            PictureHashIndex::build(&picture, CrcPair::shared_default(), &HashConfig::default())
                .unwrap();
        assert_eq!(index.stats().entries, 0);
    }
}
