//! # IBC Hash Core
//!
//! Content-hash block matching for intra block copy search.
//!
//! ## Modules
//!
//! - **CRC**: dual independent CRC fingerprints
//! - **Picture**: borrowed 8-bit / 16-bit luma planes and 2x2 sampling
//! - **Hierarchy**: picture-wide fingerprints for block sizes 2..128, each tier
//!   derived from the one below
//! - **Table**: size-partitioned buckets of candidate positions
//! - **Online**: single-block fingerprints matching the picture-wide path
//! - **Index**: per-picture owner of the table and tier build
//!
//! ## Usage
//!
//! ```rust,ignore
//! let picture = Picture::Low(Plane::new(&luma, stride, width, height)?);
//! let index = PictureHashIndex::build(&picture, CrcPair::shared_default(), &HashConfig::default())?;
//!
//! let mut hasher = OnlineHasher::new(CrcPair::shared_default());
//! let fingerprint = hasher.hash_one_block(&picture, x, y, 16)?;
//! for candidate in index.candidates(16, &fingerprint)? {
//!     // compare pixels before accepting the candidate
//! }
//! ```

pub mod config;
pub mod crc;
pub mod error;
pub mod hierarchy;
pub mod index;
pub mod online;
pub mod picture;
pub mod table;
pub mod util;

// Re-exports
pub use config::HashConfig;
pub use crc::{BlockFingerprint, CrcCalculator, CrcPair, CrcParams};
pub use error::{HashError, Result};
pub use hierarchy::{TierBuilder, TierCell, TierView};
pub use index::PictureHashIndex;
pub use online::{hash_blocks_parallel, OnlineHasher};
pub use picture::{BitDepth, Picture, Plane, Sample};
pub use table::{bucket_key, size_index, BlockHash, HashTable, TableStats};

use std::sync::Once;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = "ibc_hash_core";

/// Initialization guard
static INIT: Once = Once::new();

/// Install logging and report the environment. Safe to call repeatedly.
pub fn initialize() {
    INIT.call_once(|| {
        init_logging();

        log::info!("{} v{}", NAME, VERSION);
        log::info!("Platform: {} {}", std::env::consts::OS, std::env::consts::ARCH);
        log::info!("CPU Cores: {}", num_cpus::get());
    });
}

/// Initialize logging
fn init_logging() {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .try_init();
}
