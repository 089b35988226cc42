//! Block decoding.
//!
//! [`BlockDecoder`] is the seam between frame traversal and per-block
//! reconstruction. The frame decoder primes it once per superblock and then
//! hands it every block in coding order, together with the inverse quantizer
//! and the dequantization context that is current for that superblock.
//!
//! [`ResidualBlockDecoder`] is the stock implementation: it walks the
//! transform units of each plane, dequantizes their coefficients and forwards
//! prediction and inverse transform to a [`Reconstructor`].

use crate::dequant::DequantizationContext;
use crate::error::{Av1Error, Result};
use crate::frame::FrameBuffer;
use crate::header::SequenceHeader;
use crate::inverse_quantizer::InverseQuantizer;
use crate::layout::{BlockModeInfo, SuperblockInfo};
use crate::types::{
    BlockSize, ModeInfoPosition, Plane, TransformSize, TransformType, MAX_PLANES,
    MODE_INFO_SIZE_LOG2,
};

/// Tile being decoded, with its bounds in mode-info units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileContext {
    /// Tile row index.
    pub row: u32,
    /// Tile column index.
    pub column: u32,
    /// First mode-info row.
    pub mi_row_start: u32,
    /// Mode-info row past the end.
    pub mi_row_end: u32,
    /// First mode-info column.
    pub mi_column_start: u32,
    /// Mode-info column past the end.
    pub mi_column_end: u32,
}

impl TileContext {
    /// Whether a mode-info position lies inside the tile.
    pub fn contains(&self, position: ModeInfoPosition) -> bool {
        (self.mi_row_start..self.mi_row_end).contains(&position.row)
            && (self.mi_column_start..self.mi_column_end).contains(&position.column)
    }
}

/// Everything a block decoder needs for one block.
#[derive(Debug, Clone, Copy)]
pub struct BlockContext<'c, 'a> {
    /// Mode info of the block.
    pub mode: &'c BlockModeInfo,
    /// Global position in mode-info units.
    pub position: ModeInfoPosition,
    /// Block size.
    pub block_size: BlockSize,
    /// Superblock containing the block.
    pub superblock: &'c SuperblockInfo,
    /// Tile containing the block.
    pub tile: &'c TileContext,
    /// Quantizer steps current for this superblock.
    pub dequant: &'c DequantizationContext,
    /// Frame inverse quantizer.
    pub quantizer: &'c InverseQuantizer<'a>,
}

/// Per-block reconstruction driven by the frame decoder.
pub trait BlockDecoder {
    /// Reset per-superblock state before its first block.
    fn prime_superblock(&mut self, superblock: &SuperblockInfo) -> Result<()>;

    /// Decode one block.
    fn decode_block(&mut self, block: &BlockContext<'_, '_>) -> Result<()>;

    /// Frame this decoder reconstructs into, if it owns one.
    ///
    /// The frame decoder hands it to the post filters and, when tiles are
    /// decoded in parallel, merges the tile frames through it.
    fn frame_mut(&mut self) -> Option<&mut FrameBuffer> {
        None
    }
}

impl<T: BlockDecoder + ?Sized> BlockDecoder for &mut T {
    fn prime_superblock(&mut self, superblock: &SuperblockInfo) -> Result<()> {
        (**self).prime_superblock(superblock)
    }

    fn decode_block(&mut self, block: &BlockContext<'_, '_>) -> Result<()> {
        (**self).decode_block(block)
    }

    fn frame_mut(&mut self) -> Option<&mut FrameBuffer> {
        (**self).frame_mut()
    }
}

/// A transform block located in a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformBlock {
    /// Plane.
    pub plane: Plane,
    /// Sample column in the plane.
    pub x: usize,
    /// Sample row in the plane.
    pub y: usize,
    /// Transform size.
    pub size: TransformSize,
    /// Transform type.
    pub tx_type: TransformType,
    /// Block belongs to a lossless segment.
    pub lossless: bool,
}

/// Prediction and inverse transform for transform blocks.
pub trait Reconstructor {
    /// Write the prediction of a transform block.
    fn predict(&mut self, frame: &mut FrameBuffer, block: &TransformBlock) -> Result<()>;

    /// Inverse transform `coefficients` (raster order over the coded region)
    /// and add the residual to the prediction.
    fn reconstruct(
        &mut self,
        frame: &mut FrameBuffer,
        block: &TransformBlock,
        coefficients: &[i32],
        count: usize,
    ) -> Result<()>;
}

/// Block decoder that dequantizes residuals and reconstructs them.
#[derive(Debug)]
pub struct ResidualBlockDecoder<R> {
    frame: FrameBuffer,
    reconstructor: R,
    plane_count: usize,
    coefficient_index: [usize; MAX_PLANES],
    scratch: Vec<i32>,
    units_reconstructed: usize,
}

impl<R: Reconstructor> ResidualBlockDecoder<R> {
    /// Create a decoder writing into `frame`.
    pub fn new(sequence: &SequenceHeader, frame: FrameBuffer, reconstructor: R) -> Self {
        let sb_area = (sequence.sb_size() * sequence.sb_size()) as usize;
        Self {
            frame,
            reconstructor,
            plane_count: sequence.plane_count(),
            coefficient_index: [0; MAX_PLANES],
            scratch: vec![0; sb_area],
            units_reconstructed: 0,
        }
    }

    /// Frame being reconstructed.
    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    /// Reconstructor.
    pub fn reconstructor(&self) -> &R {
        &self.reconstructor
    }

    /// Number of transform units that went through reconstruction.
    pub fn units_reconstructed(&self) -> usize {
        self.units_reconstructed
    }

    /// Coefficient cursor of a plane within the current superblock.
    pub fn coefficient_index(&self, plane: Plane) -> usize {
        self.coefficient_index[plane.index()]
    }

    /// Take back the frame and the reconstructor.
    pub fn into_parts(self) -> (FrameBuffer, R) {
        (self.frame, self.reconstructor)
    }

    fn decode_plane(&mut self, block: &BlockContext<'_, '_>, plane: Plane, lossless: bool) -> Result<()> {
        let mode = block.mode;
        let (origin_x, origin_y) = self.frame.block_origin(plane, block.position);

        for unit in mode.units(plane) {
            if lossless && unit.size != TransformSize::Tx4x4 {
                return Err(Av1Error::InvalidQuantization(format!(
                    "lossless block uses {:?} transform",
                    unit.size
                )));
            }
            let tx_block = TransformBlock {
                plane,
                x: origin_x + ((unit.offset.column as usize) << MODE_INFO_SIZE_LOG2),
                y: origin_y + ((unit.offset.row as usize) << MODE_INFO_SIZE_LOG2),
                size: unit.size,
                tx_type: unit.tx_type,
                lossless,
            };
            self.reconstructor.predict(&mut self.frame, &tx_block)?;

            if mode.skip || !unit.coded {
                continue;
            }

            let cursor = self.coefficient_index[plane.index()];
            let runs = block.superblock.plane_coefficients(plane);
            let levels = runs.get(cursor..).ok_or(Av1Error::BufferTooSmall {
                needed: cursor + 1,
                actual: runs.len(),
            })?;
            let area = unit.size.coded_area();
            let coefficients = &mut self.scratch[..area];
            coefficients.fill(0);

            let count = block.quantizer.inverse_quantize(
                block.dequant,
                mode,
                levels,
                coefficients,
                unit.tx_type,
                unit.size,
                plane,
            )?;
            if count != 0 {
                self.coefficient_index[plane.index()] += count + 1;
                self.reconstructor
                    .reconstruct(&mut self.frame, &tx_block, coefficients, count)?;
                self.units_reconstructed += 1;
            }
        }
        Ok(())
    }
}

impl<R: Reconstructor> BlockDecoder for ResidualBlockDecoder<R> {
    fn prime_superblock(&mut self, _superblock: &SuperblockInfo) -> Result<()> {
        self.coefficient_index = [0; MAX_PLANES];
        Ok(())
    }

    fn decode_block(&mut self, block: &BlockContext<'_, '_>) -> Result<()> {
        let lossless = block.quantizer.is_lossless(block.mode.segment_id)?;
        for plane in &Plane::ALL[..self.plane_count] {
            if plane.is_chroma() && !block.mode.has_chroma {
                continue;
            }
            self.decode_plane(block, *plane, lossless)?;
        }
        Ok(())
    }

    fn frame_mut(&mut self) -> Option<&mut FrameBuffer> {
        Some(&mut self.frame)
    }
}
