//! # Per-Block Online Hasher
//!
//! Fingerprints a single candidate block on demand. The block's own 2x2 grid
//! is hashed from pixels and then folded tier by tier through a double
//! buffer, using the same CRC combination as [`crate::hierarchy`]. For equal
//! pixels the result is bit-identical to the picture-wide tier arrays at that
//! position.
//!
//! Each worker owns one [`OnlineHasher`]; the scratch buffers are reused for
//! every query and never shared.

use std::sync::Arc;

use rayon::prelude::*;

use crate::crc::{BlockFingerprint, CrcPair};
use crate::error::{HashError, Result};
use crate::hierarchy::{is_tier_size, MAX_BLOCK_SIZE};
use crate::picture::{Picture, Plane, Sample};
use crate::util::DoubleBuffer;

/// 2x2 sub-blocks in the largest block
pub const SCRATCH_LEN: usize = (MAX_BLOCK_SIZE / 2) * (MAX_BLOCK_SIZE / 2);

/// Worker-local block hasher
#[derive(Debug, Clone)]
pub struct OnlineHasher {
    crc: Arc<CrcPair>,
    scratch: DoubleBuffer<BlockFingerprint>,
}

impl OnlineHasher {
    /// Hasher with freshly allocated scratch. Aborts if the scratch cannot be
    /// allocated, like any `Vec`; use [`OnlineHasher::try_new`] to observe that.
    pub fn new(crc: Arc<CrcPair>) -> Self {
        Self {
            crc,
            scratch: DoubleBuffer::new(SCRATCH_LEN),
        }
    }

    /// Like [`OnlineHasher::new`], reporting allocation failure as an error.
    pub fn try_new(crc: Arc<CrcPair>) -> Result<Self> {
        Ok(Self {
            crc,
            scratch: DoubleBuffer::try_new(SCRATCH_LEN)?,
        })
    }

    pub fn crc(&self) -> &Arc<CrcPair> {
        &self.crc
    }

    /// Fingerprint of the `size` x `size` block at (x, y).
    pub fn hash_one_block(
        &mut self,
        picture: &Picture<'_>,
        x: usize,
        y: usize,
        size: usize,
    ) -> Result<BlockFingerprint> {
        match picture {
            Picture::Low(plane) => self.hash_block(plane, x, y, size),
            Picture::High(plane) => self.hash_block(plane, x, y, size),
        }
    }

    /// Sample-width generic form of [`OnlineHasher::hash_one_block`].
    pub fn hash_block<S: Sample>(
        &mut self,
        plane: &Plane<'_, S>,
        x: usize,
        y: usize,
        size: usize,
    ) -> Result<BlockFingerprint> {
        if !is_tier_size(size) {
            return Err(HashError::UnsupportedBlockSize(size));
        }
        if !plane.contains_block(x, y, size) {
            return Err(HashError::BlockOutOfBounds {
                x,
                y,
                size,
                width: plane.width(),
                height: plane.height(),
            });
        }

        let crc = &*self.crc;

        // 2x2 grid of the block
        let mut grid = size / 2;
        {
            let base = self.scratch.front_mut();
            for row in 0..grid {
                for col in 0..grid {
                    let quad = plane.quad(x + col * 2, y + row * 2);
                    base[row * grid + col] = crc.hash_quad(&quad);
                }
            }
        }

        while grid > 1 {
            let next = grid / 2;
            let (src, dst) = self.scratch.split();
            for row in 0..next {
                for col in 0..next {
                    let top = row * 2 * grid + col * 2;
                    let bottom = top + grid;
                    let children = [src[top], src[top + 1], src[bottom], src[bottom + 1]];
                    dst[row * next + col] = crc.combine(&children);
                }
            }
            self.scratch.swap();
            grid = next;
        }

        Ok(self.scratch.front()[0])
    }
}

/// Hash many candidate blocks of one size, one hasher per rayon worker.
pub fn hash_blocks_parallel(
    picture: &Picture<'_>,
    crc: &Arc<CrcPair>,
    positions: &[(usize, usize)],
    size: usize,
) -> Result<Vec<BlockFingerprint>> {
    positions
        .par_iter()
        .map_init(
            || OnlineHasher::try_new(Arc::clone(crc)),
            |hasher, &(x, y)| match hasher {
                Ok(hasher) => hasher.hash_one_block(picture, x, y, size),
                Err(_) => Err(HashError::alloc_failed::<BlockFingerprint>(SCRATCH_LEN * 2)),
            },
        )
        .collect()
}
