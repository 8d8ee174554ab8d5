//! # Double Buffer
//!
//! Two equally sized buffers with swappable roles. One tier is read from the
//! front buffer while the next is written to the back; `swap` then promotes
//! the freshly written data without copying or reallocating.

use crate::error::{HashError, Result};

/// Ping-pong buffer pair
#[derive(Debug, Clone)]
pub struct DoubleBuffer<T> {
    buffers: [Vec<T>; 2],
    front: usize,
}

impl<T: Copy + Default> DoubleBuffer<T> {
    /// Two buffers of `len` default elements each.
    pub fn new(len: usize) -> Self {
        Self {
            buffers: [vec![T::default(); len], vec![T::default(); len]],
            front: 0,
        }
    }

    /// Like [`DoubleBuffer::new`], reporting allocation failure instead of aborting.
    pub fn try_new(len: usize) -> Result<Self> {
        Ok(Self {
            buffers: [try_filled(len)?, try_filled(len)?],
            front: 0,
        })
    }
}

fn try_filled<T: Copy + Default>(len: usize) -> Result<Vec<T>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| HashError::alloc_failed::<T>(len))?;
    buffer.resize(len, T::default());
    Ok(buffer)
}

impl<T> DoubleBuffer<T> {
    /// Length of each buffer
    pub fn len(&self) -> usize {
        self.buffers[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers[0].is_empty()
    }

    /// Current source buffer
    pub fn front(&self) -> &[T] {
        &self.buffers[self.front]
    }

    pub fn front_mut(&mut self) -> &mut [T] {
        &mut self.buffers[self.front]
    }

    /// Source and destination at once: `(front, back)`.
    pub fn split(&mut self) -> (&[T], &mut [T]) {
        let (first, second) = self.buffers.split_at_mut(1);
        if self.front == 0 {
            (first[0].as_slice(), second[0].as_mut_slice())
        } else {
            (second[0].as_slice(), first[0].as_mut_slice())
        }
    }

    /// Exchange roles: the back buffer becomes the front.
    pub fn swap(&mut self) {
        self.front ^= 1;
    }
}
