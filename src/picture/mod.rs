//! # Picture Planes
//!
//! Read-only luma views handed in by the encoder. The crate never owns
//! picture memory; a [`Plane`] borrows the sample slice together with its
//! stride and cropped dimensions.

use crate::error::{HashError, Result};

/// Pixel sample width
///
/// Packing is what the CRCs see. An 8-bit quad packs to its four bytes; a
/// 16-bit quad packs to eight little-endian bytes in the same sample order.
pub trait Sample: Copy + Eq + Send + Sync + 'static {
    /// Bytes per packed sample
    const BYTES: usize;

    /// Pack a 2x2 quad into `out`, returning the number of bytes written.
    fn pack_quad(quad: &[Self; 4], out: &mut [u8; 8]) -> usize;
}

impl Sample for u8 {
    const BYTES: usize = 1;

    #[inline]
    fn pack_quad(quad: &[u8; 4], out: &mut [u8; 8]) -> usize {
        out[..4].copy_from_slice(quad);
        4
    }
}

impl Sample for u16 {
    const BYTES: usize = 2;

    #[inline]
    fn pack_quad(quad: &[u16; 4], out: &mut [u8; 8]) -> usize {
        for (i, sample) in quad.iter().enumerate() {
            out[i * 2..i * 2 + 2].copy_from_slice(&sample.to_le_bytes());
        }
        8
    }
}

/// Strided sample plane
#[derive(Debug, Clone, Copy)]
pub struct Plane<'a, S: Sample> {
    data: &'a [S],
    stride: usize,
    width: usize,
    height: usize,
}

impl<'a, S: Sample> Plane<'a, S> {
    /// Wrap `data` as a `width` x `height` plane with row pitch `stride`.
    pub fn new(data: &'a [S], stride: usize, width: usize, height: usize) -> Result<Self> {
        if stride < width {
            return Err(HashError::InvalidPlane(format!(
                "stride {} smaller than width {}",
                stride, width
            )));
        }
        if u32::try_from(width).is_err() || u32::try_from(height).is_err() {
            return Err(HashError::InvalidPlane(format!(
                "{}x{} exceeds the addressable block position range",
                width, height
            )));
        }
        let required = match height {
            0 => Some(0),
            _ => stride
                .checked_mul(height - 1)
                .and_then(|rows| rows.checked_add(width)),
        }
        .ok_or_else(|| {
            HashError::InvalidPlane(format!(
                "{}x{} with stride {} overflows the address space",
                width, height, stride
            ))
        })?;
        if data.len() < required {
            return Err(HashError::InvalidPlane(format!(
                "{} samples supplied, {}x{} with stride {} needs {}",
                data.len(),
                width,
                height,
                stride,
                required
            )));
        }
        Ok(Self { data, stride, width, height })
    }

    /// Tightly packed plane (stride == width).
    pub fn packed(data: &'a [S], width: usize, height: usize) -> Result<Self> {
        Self::new(data, width, width, height)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// 2x2 quad with top-left at (x, y), in raster order.
    #[inline]
    pub fn quad(&self, x: usize, y: usize) -> [S; 4] {
        let top = y * self.stride + x;
        let bottom = top + self.stride;
        [
            self.data[top],
            self.data[top + 1],
            self.data[bottom],
            self.data[bottom + 1],
        ]
    }

    /// Whether a `size` x `size` block at (x, y) lies inside the plane.
    #[inline]
    pub fn contains_block(&self, x: usize, y: usize, size: usize) -> bool {
        size <= self.width
            && size <= self.height
            && x <= self.width - size
            && y <= self.height - size
    }
}

/// Sample precision of a picture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    Eight,
    High,
}

/// Luma plane of the picture being encoded
#[derive(Debug, Clone, Copy)]
pub enum Picture<'a> {
    /// 8-bit samples
    Low(Plane<'a, u8>),
    /// 10/12-bit samples stored in 16 bits
    High(Plane<'a, u16>),
}

impl<'a> Picture<'a> {
    pub fn width(&self) -> usize {
        match self {
            Picture::Low(plane) => plane.width(),
            Picture::High(plane) => plane.width(),
        }
    }

    pub fn height(&self) -> usize {
        match self {
            Picture::Low(plane) => plane.height(),
            Picture::High(plane) => plane.height(),
        }
    }

    pub fn bit_depth(&self) -> BitDepth {
        match self {
            Picture::Low(_) => BitDepth::Eight,
            Picture::High(_) => BitDepth::High,
        }
    }
}

impl<'a> From<Plane<'a, u8>> for Picture<'a> {
    fn from(plane: Plane<'a, u8>) -> Self {
        Picture::Low(plane)
    }
}

impl<'a> From<Plane<'a, u16>> for Picture<'a> {
    fn from(plane: Plane<'a, u16>) -> Self {
        Picture::High(plane)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_raster_order() {
        let data: Vec<u8> = (0..16).collect();
        let plane = Plane::new(&data, 4, 3, 4).unwrap();
        assert_eq!(plane.quad(1, 2), [9, 10, 13, 14]);
    }

    #[test]
    fn test_plane_rejects_short_slice() {
        let data = [0u8; 10];
        assert!(Plane::new(&data, 4, 4, 3).is_err());
        assert!(Plane::new(&data, 2, 4, 2).is_err());
        assert!(Plane::new(&data, 4, 2, 3).is_ok());
    }

    #[test]
    fn test_plane_geometry_overflow_is_an_error() {
        let data = [0u8; 4];
        assert!(matches!(
            Plane::new(&data, usize::MAX / 2, 2, 4),
            Err(HashError::InvalidPlane(_))
        ));
        assert!(matches!(
            Plane::new(&data, usize::MAX, usize::MAX, 2),
            Err(HashError::InvalidPlane(_))
        ));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_plane_dimensions_fit_u32() {
        let data = [0u8; 4];
        let too_wide = u32::MAX as usize + 1;
        assert!(matches!(
            Plane::new(&data, too_wide, too_wide, 1),
            Err(HashError::InvalidPlane(_))
        ));
    }

    #[test]
    fn test_contains_block_far_outside() {
        let data = [0u8; 64];
        let plane = Plane::packed(&data, 8, 8).unwrap();
        assert!(plane.contains_block(4, 4, 4));
        assert!(!plane.contains_block(5, 4, 4));
        assert!(!plane.contains_block(usize::MAX - 1, 0, 4));
        assert!(!plane.contains_block(0, usize::MAX, 4));
        assert!(!plane.contains_block(0, 0, 16));
    }

    #[test]
    fn test_u16_packs_little_endian() {
        let mut out = [0u8; 8];
        let len = u16::pack_quad(&[0x0102, 0x0304, 0x0506, 0x0708], &mut out);
        assert_eq!(len, 8);
        assert_eq!(out, [0x02, 0x01, 0x04, 0x03, 0x06, 0x05, 0x08, 0x07]);
    }

    #[test]
    fn test_u8_packs_in_order() {
        let mut out = [0u8; 8];
        let len = u8::pack_quad(&[9, 8, 7, 6], &mut out);
        assert_eq!(&out[..len], &[9, 8, 7, 6]);
    }
}
