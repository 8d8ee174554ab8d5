//! # Hierarchical Hash Builder
//!
//! Picture-wide fingerprints for every block size from 2x2 up to 128x128.
//!
//! Only the 2x2 base tier reads pixels. Every larger tier combines the four
//! quadrant fingerprints of the tier below it, so building all tiers costs a
//! constant amount of CRC work per position per tier instead of rehashing the
//! whole block area.
//!
//! The builder keeps exactly two tier arrays and swaps them after each tier.
//! Rows of one tier depend only on the previous tier and are filled in
//! parallel with rayon.

use std::sync::Arc;

use rayon::prelude::*;

use crate::crc::{BlockFingerprint, CrcPair};
use crate::error::{HashError, Result};
use crate::picture::{Picture, Plane, Sample};
use crate::util::DoubleBuffer;

/// Smallest tier, hashed directly from pixels
pub const BASE_BLOCK_SIZE: usize = 2;

/// Largest tier
pub const MAX_BLOCK_SIZE: usize = 128;

/// Per-position data of one tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierCell {
    pub fingerprint: BlockFingerprint,
    /// Every row of the block is made of equal pairs
    pub row_same: bool,
    /// Every column of the block is made of equal pairs
    pub col_same: bool,
    /// Position is eligible for hash table insertion (sizes >= 4)
    pub insert_worthy: bool,
}

/// Number of valid top-left coordinates along one axis.
#[inline]
pub fn valid_extent(dimension: usize, size: usize) -> usize {
    if dimension >= size {
        dimension - size + 1
    } else {
        0
    }
}

/// Whether `size` is a tier the builder can produce.
pub fn is_tier_size(size: usize) -> bool {
    size.is_power_of_two() && (BASE_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&size)
}

/// Read-only view of the most recently built tier
#[derive(Debug, Clone, Copy)]
pub struct TierView<'a> {
    size: usize,
    width: usize,
    height: usize,
    cells: &'a [TierCell],
}

impl<'a> TierView<'a> {
    /// Block dimension of this tier (0 before any tier is built)
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Count of valid x and y coordinates.
    pub fn extent(&self) -> (usize, usize) {
        if self.size == 0 {
            return (0, 0);
        }
        (
            valid_extent(self.width, self.size),
            valid_extent(self.height, self.size),
        )
    }

    /// Cell at (x, y), or `None` if the block would leave the picture.
    #[inline]
    pub fn cell(&self, x: usize, y: usize) -> Option<&'a TierCell> {
        let (x_end, y_end) = self.extent();
        if x < x_end && y < y_end {
            Some(&self.cells[y * self.width + x])
        } else {
            None
        }
    }
}

/// Builds tiers in increasing size order for pictures of one geometry
pub struct TierBuilder {
    crc: Arc<CrcPair>,
    width: usize,
    height: usize,
    size: usize,
    parallel: bool,
    cells: DoubleBuffer<TierCell>,
}

impl TierBuilder {
    /// Allocate both tier arrays for a `width` x `height` picture.
    pub fn new(crc: Arc<CrcPair>, width: usize, height: usize, parallel: bool) -> Result<Self> {
        let len = width
            .checked_mul(height)
            .ok_or(HashError::AllocationFailed { requested_bytes: usize::MAX })?;
        let cells = DoubleBuffer::try_new(len)?;

        log::debug!(
            "Tier arrays allocated for {}x{} picture ({} cells x 2)",
            width,
            height,
            len
        );

        Ok(Self {
            crc,
            width,
            height,
            size: 0,
            parallel,
            cells,
        })
    }

    /// Builder sized for `picture`.
    pub fn for_picture(crc: Arc<CrcPair>, picture: &Picture<'_>, parallel: bool) -> Result<Self> {
        Self::new(crc, picture.width(), picture.height(), parallel)
    }

    /// The most recently built tier.
    pub fn current(&self) -> TierView<'_> {
        TierView {
            size: self.size,
            width: self.width,
            height: self.height,
            cells: self.cells.front(),
        }
    }

    /// Build the tier for `size`.
    ///
    /// Size 2 starts a hierarchy from the picture's pixels. Any larger size
    /// must be exactly twice the previously built tier and is derived from it.
    /// A picture smaller than `size` yields an empty tier.
    pub fn build_tier(&mut self, picture: &Picture<'_>, size: usize) -> Result<TierView<'_>> {
        if !is_tier_size(size) {
            return Err(HashError::UnsupportedBlockSize(size));
        }
        if picture.width() != self.width || picture.height() != self.height {
            return Err(HashError::DimensionMismatch {
                width: picture.width(),
                height: picture.height(),
                expected_width: self.width,
                expected_height: self.height,
            });
        }

        let _span = tracing::trace_span!("build_tier", size).entered();

        if size == BASE_BLOCK_SIZE {
            match picture {
                Picture::Low(plane) => self.build_base(plane),
                Picture::High(plane) => self.build_base(plane),
            }
        } else {
            if self.size != size / 2 {
                return Err(HashError::TierOutOfOrder {
                    requested: size,
                    built: self.size,
                });
            }
            self.build_combined(size);
        }

        self.size = size;
        Ok(self.current())
    }

    fn build_base<S: Sample>(&mut self, plane: &Plane<'_, S>) {
        let x_end = valid_extent(self.width, BASE_BLOCK_SIZE);
        let y_end = valid_extent(self.height, BASE_BLOCK_SIZE);
        let width = self.width;
        let crc = &*self.crc;
        let (_, dst) = self.cells.split();

        for_each_row(dst, width, y_end, self.parallel, |y, row| {
            for (x, cell) in row[..x_end].iter_mut().enumerate() {
                let p = plane.quad(x, y);
                *cell = TierCell {
                    fingerprint: crc.hash_quad(&p),
                    row_same: p[0] == p[1] && p[2] == p[3],
                    col_same: p[0] == p[2] && p[1] == p[3],
                    insert_worthy: false,
                };
            }
        });

        self.cells.swap();
    }

    fn build_combined(&mut self, size: usize) {
        let half = size / 2;
        let mask = size - 1;
        let x_end = valid_extent(self.width, size);
        let y_end = valid_extent(self.height, size);
        let width = self.width;
        let crc = &*self.crc;
        let (src, dst) = self.cells.split();

        for_each_row(dst, width, y_end, self.parallel, |y, row| {
            let top = y * width;
            let bottom = (y + half) * width;
            for (x, cell) in row[..x_end].iter_mut().enumerate() {
                let children = [
                    src[top + x],
                    src[top + x + half],
                    src[bottom + x],
                    src[bottom + x + half],
                ];
                let fingerprints = children.map(|child| child.fingerprint);
                let row_same = children.iter().all(|child| child.row_same);
                let col_same = children.iter().all(|child| child.col_same);

                *cell = TierCell {
                    fingerprint: crc.combine(&fingerprints),
                    row_same,
                    col_same,
                    insert_worthy: (!row_same && !col_same)
                        || (((x & mask) == 0) && ((y & mask) == 0)),
                };
            }
        });

        self.cells.swap();
    }
}

/// Run `fill(y, row)` over the first `rows` rows of `cells`.
fn for_each_row<F>(cells: &mut [TierCell], width: usize, rows: usize, parallel: bool, fill: F)
where
    F: Fn(usize, &mut [TierCell]) + Send + Sync,
{
    if width == 0 || rows == 0 {
        return;
    }
    let cells = &mut cells[..rows * width];
    if parallel {
        cells
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| fill(y, row));
    } else {
        cells
            .chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| fill(y, row));
    }
}
