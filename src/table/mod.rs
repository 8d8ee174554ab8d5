//! # Block Hash Table
//!
//! Size-partitioned bucket store for one picture.
//!
//! A bucket key concatenates a 3-bit size index with the low 16 bits of the
//! primary fingerprint, so each block size owns a disjoint 64K slice of the
//! address space. Buckets keep candidate positions in insertion order along
//! with the secondary fingerprint the caller must compare next.
//!
//! The table is filled once, then only read. There is no removal; `destroy`
//! (or drop) releases everything at the end of the picture.

use crate::error::{HashError, Result};
use crate::hierarchy::TierView;

/// Bits of the primary fingerprint used in a key
pub const CRC_BITS: u32 = 16;

/// Bits reserved for the size index
pub const BLOCK_SIZE_BITS: u32 = 3;

/// Number of addressable buckets
pub const TABLE_SLOTS: usize = 1 << (CRC_BITS + BLOCK_SIZE_BITS);

const CRC_MASK: u32 = (1 << CRC_BITS) - 1;

/// Capacity of a freshly created bucket
const INITIAL_BUCKET_CAPACITY: usize = 10;

/// Block dimensions that can be indexed, by size index
pub const INDEXED_SIZES: [usize; 6] = [4, 8, 16, 32, 64, 128];

/// Size index of a block dimension.
pub fn size_index(size: usize) -> Option<u32> {
    match size {
        4 => Some(0),
        8 => Some(1),
        16 => Some(2),
        32 => Some(3),
        64 => Some(4),
        128 => Some(5),
        _ => None,
    }
}

/// Bucket key for a block of dimension `size` with primary fingerprint `primary`.
pub fn bucket_key(size: usize, primary: u32) -> Result<u32> {
    let index = size_index(size).ok_or(HashError::UnsupportedBlockSize(size))?;
    Ok((index << CRC_BITS) | (primary & CRC_MASK))
}

/// One candidate position
///
/// Coordinates fit in `u32` because [`crate::picture::Plane`] rejects larger
/// dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockHash {
    pub x: u32,
    pub y: u32,
    /// Secondary fingerprint, compared before any pixel check
    pub secondary: u32,
}

/// Occupancy summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStats {
    /// Non-empty buckets
    pub buckets: usize,
    /// Total entries
    pub entries: usize,
    /// Entries in the fullest bucket
    pub largest_bucket: usize,
    /// Entries per size index
    pub entries_per_size: [usize; 6],
}

/// Bucketed position store
///
/// Call [`HashTable::create`] before inserting. Queries on a table that was
/// never created report no matches; callers should not rely on that.
#[derive(Debug, Default)]
pub struct HashTable {
    buckets: Option<Vec<Option<Vec<BlockHash>>>>,
}

impl HashTable {
    /// Unallocated table
    pub fn new() -> Self {
        Self { buckets: None }
    }

    pub fn is_created(&self) -> bool {
        self.buckets.is_some()
    }

    /// Allocate the bucket array, or empty every bucket if already allocated.
    pub fn create(&mut self) -> Result<()> {
        if let Some(buckets) = self.buckets.as_mut() {
            let cleared = buckets.iter_mut().filter_map(Option::take).count();
            log::debug!("Hash table reused, {} buckets cleared", cleared);
            return Ok(());
        }

        let mut buckets = Vec::new();
        buckets
            .try_reserve_exact(TABLE_SLOTS)
            .map_err(|_| HashError::alloc_failed::<Option<Vec<BlockHash>>>(TABLE_SLOTS))?;
        buckets.resize_with(TABLE_SLOTS, || None);
        self.buckets = Some(buckets);

        log::debug!("Hash table created with {} slots", TABLE_SLOTS);
        Ok(())
    }

    /// Release every bucket and the bucket array. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        if let Some(buckets) = self.buckets.take() {
            let live = buckets.iter().filter(|bucket| bucket.is_some()).count();
            log::trace!("Hash table destroyed ({} live buckets)", live);
        }
    }

    /// Append `entry` to the bucket for `key`.
    pub fn insert(&mut self, key: u32, entry: BlockHash) -> Result<()> {
        let buckets = self.buckets.as_mut().ok_or(HashError::TableNotCreated)?;
        let slot = buckets
            .get_mut(key as usize)
            .ok_or(HashError::InvalidKey(key))?;

        if slot.is_none() {
            let mut bucket = Vec::new();
            bucket
                .try_reserve(INITIAL_BUCKET_CAPACITY)
                .map_err(|_| HashError::alloc_failed::<BlockHash>(INITIAL_BUCKET_CAPACITY))?;
            *slot = Some(bucket);
        }
        let bucket = slot.get_or_insert_with(Vec::new);

        bucket
            .try_reserve(1)
            .map_err(|_| HashError::alloc_failed::<BlockHash>(bucket.len() + 1))?;
        bucket.push(entry);
        Ok(())
    }

    /// Insert every insert-worthy position of `tier`.
    ///
    /// Positions are visited column by column (x outer, y inner), which fixes
    /// the order of entries inside each bucket. Returns the number inserted.
    pub fn insert_valid_positions(&mut self, tier: &TierView<'_>) -> Result<usize> {
        let size = tier.size();
        let index = size_index(size).ok_or(HashError::UnsupportedBlockSize(size))?;
        if !self.is_created() {
            return Err(HashError::TableNotCreated);
        }

        let (x_end, y_end) = tier.extent();
        let mut inserted = 0;
        for x in 0..x_end {
            for y in 0..y_end {
                let Some(cell) = tier.cell(x, y) else { continue };
                if !cell.insert_worthy {
                    continue;
                }
                let (Ok(entry_x), Ok(entry_y)) = (u32::try_from(x), u32::try_from(y)) else {
                    return Err(HashError::BlockOutOfBounds {
                        x,
                        y,
                        size,
                        width: tier.width(),
                        height: tier.height(),
                    });
                };
                let key = (index << CRC_BITS) | (cell.fingerprint.primary & CRC_MASK);
                self.insert(
                    key,
                    BlockHash {
                        x: entry_x,
                        y: entry_y,
                        secondary: cell.fingerprint.secondary,
                    },
                )?;
                inserted += 1;
            }
        }

        log::debug!("Inserted {} positions for {}x{} blocks", inserted, size, size);
        Ok(inserted)
    }

    /// Entries stored under `key` (0 for an absent bucket).
    pub fn count(&self, key: u32) -> usize {
        self.matches(key).len()
    }

    /// Entries under `key` in insertion order.
    pub fn matches(&self, key: u32) -> &[BlockHash] {
        self.buckets
            .as_ref()
            .and_then(|buckets| buckets.get(key as usize))
            .and_then(|slot| slot.as_deref())
            .unwrap_or(&[])
    }

    /// Iterator starting at the first entry under `key`.
    pub fn first_match(&self, key: u32) -> std::slice::Iter<'_, BlockHash> {
        self.matches(key).iter()
    }

    /// Entries under `key` whose secondary fingerprint equals `secondary`.
    ///
    /// A hit is still only a fingerprint match; compare pixels before use.
    pub fn candidates(&self, key: u32, secondary: u32) -> impl Iterator<Item = &BlockHash> + '_ {
        self.first_match(key)
            .filter(move |entry| entry.secondary == secondary)
    }

    /// Occupancy summary
    pub fn stats(&self) -> TableStats {
        let mut stats = TableStats::default();
        let Some(buckets) = self.buckets.as_ref() else {
            return stats;
        };
        for (key, bucket) in buckets.iter().enumerate() {
            let Some(bucket) = bucket else { continue };
            if bucket.is_empty() {
                continue;
            }
            stats.buckets += 1;
            stats.entries += bucket.len();
            stats.largest_bucket = stats.largest_bucket.max(bucket.len());
            if let Some(count) = stats.entries_per_size.get_mut(key >> CRC_BITS) {
                *count += bucket.len();
            }
        }
        stats
    }
}

impl Drop for HashTable {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_index_bijection() {
        for (index, size) in INDEXED_SIZES.iter().enumerate() {
            assert_eq!(size_index(*size), Some(index as u32));
        }
        assert_eq!(size_index(2), None);
        assert_eq!(size_index(256), None);
        assert_eq!(size_index(12), None);
    }

    #[test]
    fn test_keys_never_alias_across_sizes() {
        let a = bucket_key(4, 0xABCD_1234).unwrap();
        let b = bucket_key(8, 0xABCD_1234).unwrap();
        assert_ne!(a, b);
        assert_eq!(a & CRC_MASK, b & CRC_MASK);
        assert_eq!(bucket_key(128, u32::MAX).unwrap() as usize, (5 << 16) | 0xFFFF);
        assert!(bucket_key(3, 0).is_err());
    }

    #[test]
    fn test_query_before_create() {
        let table = HashTable::new();
        assert_eq!(table.count(0), 0);
        assert_eq!(table.first_match(0).count(), 0);
        assert_eq!(table.stats(), TableStats::default());
    }

    #[test]
    fn test_insert_before_create_fails() {
        let mut table = HashTable::new();
        let entry = BlockHash { x: 0, y: 0, secondary: 0 };
        assert!(matches!(table.insert(0, entry), Err(HashError::TableNotCreated)));
    }

    #[test]
    fn test_insert_preserves_order() {
        let mut table = HashTable::new();
        table.create().unwrap();
        for i in 0..25 {
            table.insert(42, BlockHash { x: i, y: i * 2, secondary: i }).unwrap();
        }
        assert_eq!(table.count(42), 25);
        let xs: Vec<u32> = table.first_match(42).map(|entry| entry.x).collect();
        assert_eq!(xs, (0..25).collect::<Vec<_>>());
        assert_eq!(table.candidates(42, 7).count(), 1);
    }

    #[test]
    fn test_invalid_key() {
        let mut table = HashTable::new();
        table.create().unwrap();
        let entry = BlockHash { x: 0, y: 0, secondary: 0 };
        assert!(matches!(
            table.insert(TABLE_SLOTS as u32, entry),
            Err(HashError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_create_clears_and_destroy_is_idempotent() {
        let mut table = HashTable::new();
        table.create().unwrap();
        table.insert(7, BlockHash { x: 1, y: 1, secondary: 1 }).unwrap();
        table.create().unwrap();
        assert_eq!(table.count(7), 0);
        assert!(table.is_created());

        table.destroy();
        table.destroy();
        assert!(!table.is_created());
    }
}
