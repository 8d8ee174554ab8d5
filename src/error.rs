//! # Errors
//!
//! Error type shared by every stage of fingerprint construction and indexing.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HashError>;

/// Block hashing errors
#[derive(Debug, Error)]
pub enum HashError {
    /// Bucket array, bucket list or tier array could not be allocated.
    #[error("allocation failed: could not allocate {requested_bytes} bytes")]
    AllocationFailed { requested_bytes: usize },

    /// Block size is not one of the supported power-of-two dimensions.
    #[error("unsupported block size {0}")]
    UnsupportedBlockSize(usize),

    /// Tiers were requested out of increasing order.
    #[error("tier {requested}x{requested} requested after tier {built}x{built}")]
    TierOutOfOrder { requested: usize, built: usize },

    /// Picture dimensions changed between tiers of one hierarchy.
    #[error("picture is {width}x{height}, hierarchy was started for {expected_width}x{expected_height}")]
    DimensionMismatch {
        width: usize,
        height: usize,
        expected_width: usize,
        expected_height: usize,
    },

    /// Plane geometry does not fit the sample slice.
    #[error("invalid plane: {0}")]
    InvalidPlane(String),

    /// Requested block does not lie inside the plane.
    #[error("block {size}x{size} at ({x}, {y}) exceeds plane {width}x{height}")]
    BlockOutOfBounds {
        x: usize,
        y: usize,
        size: usize,
        width: usize,
        height: usize,
    },

    /// CRC width, polynomial or seed out of range.
    #[error("invalid CRC parameters: {0}")]
    InvalidCrc(String),

    /// Bucket key outside the table's address space.
    #[error("bucket key {0:#x} outside table")]
    InvalidKey(u32),

    /// Insertion attempted before `HashTable::create`.
    #[error("hash table used before create()")]
    TableNotCreated,

    /// Configuration could not be parsed.
    #[error("config parse error: {0}")]
    Config(#[from] serde_json::Error),

    /// Configuration parsed but holds inconsistent values.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl HashError {
    /// Allocation failure for `count` elements of `T`.
    pub(crate) fn alloc_failed<T>(count: usize) -> Self {
        HashError::AllocationFailed {
            requested_bytes: count.saturating_mul(std::mem::size_of::<T>()),
        }
    }
}
