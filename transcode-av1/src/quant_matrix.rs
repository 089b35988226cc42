//! Quantization matrices.
//!
//! Weights live in one shared table: for each of the 15 real matrix levels
//! and each plane class (luma, chroma) a block of [`QM_TOTAL_SIZE`] entries
//! holds every distinct matrix back to back. [`QuantMatrixIndex`] maps
//! `(level, plane, transform size)` to the start of the matrix for that
//! combination. Sizes with a 64-sample dimension share the matrix of their
//! adjusted size. Level [`FLAT_QM_LEVEL`] has no entry at all.

use std::sync::Arc;

use crate::error::{Av1Error, Result};
use crate::header::FLAT_QM_LEVEL;
use crate::types::{Plane, TransformSize, MAX_PLANES, TX_SIZES_ALL};

/// Number of matrix levels including the flat sentinel.
pub const NUM_QM_LEVELS: usize = 16;

/// Entries per level and plane class.
pub const QM_TOTAL_SIZE: usize = 3344;

/// Fractional bits of a matrix weight.
pub const AOM_QM_BITS: u32 = 5;

/// Number of plane classes with distinct matrices.
const QM_PLANE_CLASSES: usize = 2;

/// Total number of weights in a complete table.
pub const QM_WEIGHT_COUNT: usize = (NUM_QM_LEVELS - 1) * QM_PLANE_CLASSES * QM_TOTAL_SIZE;

/// Shared inverse-quantization matrix weights.
///
/// Cloning is cheap; the table is reference counted and read-only.
#[derive(Debug, Clone)]
pub struct QuantMatrixWeights {
    weights: Arc<[u8]>,
}

impl QuantMatrixWeights {
    /// Table where every weight is unity (32 at 5-bit precision).
    pub fn flat() -> Self {
        Self {
            weights: vec![1u8 << AOM_QM_BITS; QM_WEIGHT_COUNT].into(),
        }
    }

    /// Build from a complete weight table laid out `[level][class][entry]`.
    pub fn from_weights(weights: impl Into<Arc<[u8]>>) -> Result<Self> {
        let weights = weights.into();
        if weights.len() != QM_WEIGHT_COUNT {
            return Err(Av1Error::InvalidQuantMatrix(format!(
                "expected {} weights, got {}",
                QM_WEIGHT_COUNT,
                weights.len()
            )));
        }
        Ok(Self { weights })
    }

    /// Raw weight table.
    pub fn as_slice(&self) -> &[u8] {
        &self.weights
    }
}

impl Default for QuantMatrixWeights {
    fn default() -> Self {
        Self::flat()
    }
}

/// Lookup from `(level, plane, transform size)` to a matrix offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantMatrixIndex {
    offsets: [[[Option<u32>; TX_SIZES_ALL]; MAX_PLANES]; NUM_QM_LEVELS],
}

impl QuantMatrixIndex {
    /// Build the index.
    pub fn new() -> Result<Self> {
        let mut offsets = [[[None; TX_SIZES_ALL]; MAX_PLANES]; NUM_QM_LEVELS];
        for (level, per_level) in offsets.iter_mut().enumerate() {
            if level == FLAT_QM_LEVEL as usize {
                continue;
            }
            for (plane, per_plane) in Plane::ALL.iter().zip(per_level.iter_mut()) {
                let class = plane.matrix_class();
                let base = (level * QM_PLANE_CLASSES + class) * QM_TOTAL_SIZE;
                let mut current = 0usize;
                for size in TransformSize::ALL {
                    let adjusted = size.adjusted();
                    if size != adjusted {
                        per_plane[size.index()] = per_plane[adjusted.index()];
                        continue;
                    }
                    per_plane[size.index()] = Some((base + current) as u32);
                    current += size.pels();
                    if current > QM_TOTAL_SIZE {
                        return Err(Av1Error::InvalidQuantMatrix(format!(
                            "matrix cursor {} exceeds {}",
                            current, QM_TOTAL_SIZE
                        )));
                    }
                }
            }
        }
        Ok(Self { offsets })
    }

    /// Offset of the matrix for a combination, `None` for the flat level.
    pub fn offset(&self, level: u8, plane: Plane, size: TransformSize) -> Option<usize> {
        self.offsets
            .get(level as usize)?
            .get(plane.index())?
            .get(size.index())
            .copied()
            .flatten()
            .map(|o| o as usize)
    }

    /// Resolve the weights slice for a combination.
    pub fn matrix<'a>(
        &self,
        weights: &'a QuantMatrixWeights,
        level: u8,
        plane: Plane,
        size: TransformSize,
    ) -> Option<&'a [u8]> {
        let offset = self.offset(level, plane, size)?;
        let len = size.adjusted().pels();
        weights.as_slice().get(offset..offset + len)
    }
}

/// Weighted quantizer step at a raster position.
///
/// Without a matrix the step is returned unchanged and nothing is read.
#[inline]
pub fn weighted_step(step: i32, raster_pos: usize, matrix: Option<&[u8]>) -> i32 {
    match matrix {
        Some(m) => ((m[raster_pos] as i32 * step) + (1 << (AOM_QM_BITS - 1))) >> AOM_QM_BITS,
        None => step,
    }
}
