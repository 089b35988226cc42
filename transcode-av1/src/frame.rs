//! Reconstructed frame storage.

use std::fmt;

use crate::block::TileContext;
use crate::error::{Av1Error, Result};
use crate::header::{FrameHeader, SequenceHeader};
use crate::types::{ModeInfoPosition, Plane, MODE_INFO_SIZE_LOG2};

#[derive(Clone)]
struct PlaneData {
    data: Vec<u16>,
    width: usize,
    height: usize,
    stride: usize,
}

/// Planar sample buffer the reconstruction stages write into.
///
/// Planes are padded to the mode-info extent so that transform blocks on the
/// right and bottom edges never fall outside the allocation.
#[derive(Clone)]
pub struct FrameBuffer {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Bit depth of the samples.
    pub bit_depth: u8,
    subsampling: (u32, u32),
    planes: Vec<PlaneData>,
}

impl FrameBuffer {
    /// Allocate a buffer for a frame.
    pub fn new(sequence: &SequenceHeader, frame: &FrameHeader) -> Self {
        let luma_width = (frame.mi_columns() << MODE_INFO_SIZE_LOG2) as usize;
        let luma_height = (frame.mi_rows() << MODE_INFO_SIZE_LOG2) as usize;
        let subsampling = sequence.subsampling(Plane::U);

        let planes = Plane::ALL[..sequence.plane_count()]
            .iter()
            .map(|plane| {
                let (sx, sy) = sequence.subsampling(*plane);
                let width = (luma_width + sx as usize) >> sx;
                let height = (luma_height + sy as usize) >> sy;
                // Align stride to 32 samples
                let stride = (width + 31) & !31;
                PlaneData {
                    data: vec![0u16; stride * height],
                    width,
                    height,
                    stride,
                }
            })
            .collect();

        Self {
            width: frame.width,
            height: frame.height,
            bit_depth: sequence.bit_depth,
            subsampling,
            planes,
        }
    }

    /// Get the number of planes.
    pub fn num_planes(&self) -> usize {
        self.planes.len()
    }

    /// Get a plane's samples.
    pub fn plane(&self, plane: Plane) -> Option<&[u16]> {
        self.planes.get(plane.index()).map(|p| p.data.as_slice())
    }

    /// Get a mutable reference to a plane's samples.
    pub fn plane_mut(&mut self, plane: Plane) -> Option<&mut [u16]> {
        self.planes.get_mut(plane.index()).map(|p| p.data.as_mut_slice())
    }

    /// Get the stride for a plane.
    pub fn stride(&self, plane: Plane) -> usize {
        self.planes.get(plane.index()).map(|p| p.stride).unwrap_or(0)
    }

    /// Allocated `(width, height)` of a plane.
    pub fn plane_dimensions(&self, plane: Plane) -> (usize, usize) {
        self.planes
            .get(plane.index())
            .map(|p| (p.width, p.height))
            .unwrap_or((0, 0))
    }

    /// Sample coordinates `(x, y)` of a mode-info position in a plane.
    pub fn block_origin(&self, plane: Plane, position: ModeInfoPosition) -> (usize, usize) {
        let (sx, sy) = if plane.is_chroma() {
            self.subsampling
        } else {
            (0, 0)
        };
        (
            ((position.column >> sx) << MODE_INFO_SIZE_LOG2) as usize,
            ((position.row >> sy) << MODE_INFO_SIZE_LOG2) as usize,
        )
    }

    /// Sample offset of a mode-info position in a plane.
    pub fn block_offset(&self, plane: Plane, position: ModeInfoPosition) -> usize {
        let (x, y) = self.block_origin(plane, position);
        y * self.stride(plane) + x
    }

    /// Copy the samples covered by a tile from a buffer of the same geometry.
    pub fn copy_tile_from(&mut self, source: &FrameBuffer, tile: &TileContext) -> Result<()> {
        let same_geometry = self.subsampling == source.subsampling
            && self.planes.len() == source.planes.len()
            && self
                .planes
                .iter()
                .zip(&source.planes)
                .all(|(a, b)| (a.width, a.height, a.stride) == (b.width, b.height, b.stride));
        if !same_geometry {
            return Err(Av1Error::InvalidDimensions {
                width: source.width,
                height: source.height,
            });
        }

        for (index, (dst, src)) in self.planes.iter_mut().zip(&source.planes).enumerate() {
            let (sx, sy) = if index > 0 { self.subsampling } else { (0, 0) };
            let x0 = ((tile.mi_column_start << MODE_INFO_SIZE_LOG2) >> sx) as usize;
            let x1 = ((((tile.mi_column_end << MODE_INFO_SIZE_LOG2) + sx) >> sx) as usize).min(dst.width);
            let y0 = ((tile.mi_row_start << MODE_INFO_SIZE_LOG2) >> sy) as usize;
            let y1 = ((((tile.mi_row_end << MODE_INFO_SIZE_LOG2) + sy) >> sy) as usize).min(dst.height);
            if x0 >= x1 {
                continue;
            }
            for y in y0..y1 {
                let row = y * dst.stride;
                dst.data[row + x0..row + x1].copy_from_slice(&src.data[row + x0..row + x1]);
            }
        }
        Ok(())
    }

    /// Fill all planes with a value.
    pub fn fill(&mut self, value: u16) {
        for plane in &mut self.planes {
            plane.data.fill(value);
        }
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bit_depth", &self.bit_depth)
            .field("planes", &self.planes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_geometry_420() {
        let seq = SequenceHeader::default();
        let frame = FrameHeader::new(100, 50);
        let buffer = FrameBuffer::new(&seq, &frame);
        assert_eq!(buffer.num_planes(), 3);
        assert_eq!(buffer.plane_dimensions(Plane::Y), (104, 56));
        assert_eq!(buffer.plane_dimensions(Plane::U), (52, 28));
        assert_eq!(buffer.stride(Plane::Y), 128);
        assert_eq!(buffer.stride(Plane::V), 64);
        assert_eq!(buffer.plane(Plane::U).unwrap().len(), 64 * 28);
    }

    #[test]
    fn test_monochrome() {
        let seq = SequenceHeader {
            monochrome: true,
            ..SequenceHeader::default()
        };
        let buffer = FrameBuffer::new(&seq, &FrameHeader::new(64, 64));
        assert_eq!(buffer.num_planes(), 1);
        assert!(buffer.plane(Plane::U).is_none());
        assert_eq!(buffer.stride(Plane::U), 0);
    }

    #[test]
    fn test_block_offset() {
        let seq = SequenceHeader::default();
        let buffer = FrameBuffer::new(&seq, &FrameHeader::new(64, 64));
        let pos = ModeInfoPosition::new(4, 8);
        assert_eq!(buffer.block_origin(Plane::Y, pos), (32, 16));
        assert_eq!(buffer.block_offset(Plane::Y, pos), 16 * 64 + 32);
        assert_eq!(buffer.block_origin(Plane::U, pos), (16, 8));
        assert_eq!(buffer.block_offset(Plane::U, pos), 8 * 32 + 16);
    }

    #[test]
    fn test_copy_tile_from() {
        let seq = SequenceHeader::default();
        let header = FrameHeader::new(128, 64);
        let mut target = FrameBuffer::new(&seq, &header);
        let mut source = FrameBuffer::new(&seq, &header);
        source.fill(9);
        let right = TileContext {
            row: 0,
            column: 1,
            mi_row_start: 0,
            mi_row_end: 16,
            mi_column_start: 16,
            mi_column_end: 32,
        };
        target.copy_tile_from(&source, &right).unwrap();

        let luma = target.plane(Plane::Y).unwrap();
        let stride = target.stride(Plane::Y);
        assert_eq!(luma[63], 0);
        assert_eq!(luma[64], 9);
        assert_eq!(luma[63 * stride + 127], 9);
        let chroma = target.plane(Plane::U).unwrap();
        let stride = target.stride(Plane::U);
        assert_eq!(chroma[31], 0);
        assert_eq!(chroma[31 * stride + 32], 9);

        let other = FrameBuffer::new(&seq, &FrameHeader::new(64, 64));
        assert!(matches!(
            target.copy_tile_from(&other, &right),
            Err(Av1Error::InvalidDimensions { width: 64, height: 64 })
        ));
    }

    #[test]
    fn test_fill() {
        let seq = SequenceHeader::default();
        let mut buffer = FrameBuffer::new(&seq, &FrameHeader::new(16, 16));
        buffer.fill(128);
        assert!(buffer.plane(Plane::V).unwrap().iter().all(|s| *s == 128));
        buffer.plane_mut(Plane::Y).unwrap()[0] = 7;
        assert_eq!(buffer.plane(Plane::Y).unwrap()[0], 7);
    }
}
