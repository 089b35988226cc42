//! Inverse quantization.
//!
//! Converts scan-ordered quantized levels into raster-ordered coefficients
//! ready for the inverse transform. The arithmetic follows the reference
//! decoder exactly:
//!
//! ```text
//! dqv   = qm ? (qm[pos] * step + 16) >> 5 : step
//! coeff = ((|level| * dqv) & 0xFFFFFF) >> scale
//! coeff = clamp(sign(level) * coeff, -(1 << (7 + bd)), (1 << (7 + bd)) - 1)
//! ```
//!
//! The 24-bit truncation and the final clamp are part of the bitstream
//! definition.

use crate::dequant::DequantizationContext;
use crate::error::{Av1Error, Result};
use crate::header::{FrameHeader, SequenceHeader, FLAT_QM_LEVEL, MAX_QINDEX};
use crate::layout::{BlockModeInfo, SuperblockInfo};
use crate::quant_matrix::{weighted_step, QuantMatrixIndex, QuantMatrixWeights};
use crate::scan::scan_order;
use crate::tables::{ac_q, dc_q};
use crate::types::{Plane, TransformSize, TransformType, MAX_SEGMENTS};

/// Mask applied to the product of level and step.
const DEQUANT_MASK: i64 = 0xFF_FFFF;

/// Frame-scoped inverse quantizer.
///
/// Borrows the headers for the duration of the frame and owns the
/// quantization matrix index built from them.
#[derive(Debug, Clone)]
pub struct InverseQuantizer<'a> {
    sequence: &'a SequenceHeader,
    frame: &'a FrameHeader,
    weights: QuantMatrixWeights,
    index: QuantMatrixIndex,
}

impl<'a> InverseQuantizer<'a> {
    /// Create an inverse quantizer with unity matrix weights.
    pub fn new(sequence: &'a SequenceHeader, frame: &'a FrameHeader) -> Result<Self> {
        Self::with_weights(sequence, frame, QuantMatrixWeights::flat())
    }

    /// Create an inverse quantizer with explicit matrix weights.
    pub fn with_weights(
        sequence: &'a SequenceHeader,
        frame: &'a FrameHeader,
        weights: QuantMatrixWeights,
    ) -> Result<Self> {
        let index = QuantMatrixIndex::new()?;
        tracing::debug!(
            bit_depth = sequence.bit_depth,
            base_q_idx = frame.quantization.base_q_idx,
            using_qmatrix = frame.quantization.using_qmatrix,
            delta_q = frame.delta_q.present,
            "Created inverse quantizer"
        );
        Ok(Self {
            sequence,
            frame,
            weights,
            index,
        })
    }

    /// Quantization matrix index.
    pub fn matrix_index(&self) -> &QuantMatrixIndex {
        &self.index
    }

    /// Refresh the quantizer steps for a superblock.
    ///
    /// Does nothing unless delta-Q is present. Otherwise the superblock's
    /// quantizer index replaces the frame base index for every segment.
    pub fn update_dequant(
        &self,
        context: &mut DequantizationContext,
        superblock: &SuperblockInfo,
    ) -> Result<()> {
        if !self.frame.delta_q.present {
            return Ok(());
        }
        if !(0..=MAX_QINDEX).contains(&superblock.qindex) {
            return Err(Av1Error::InvalidQuantization(format!(
                "superblock ({}, {}) quantizer index {} outside 0..={}",
                superblock.position.row, superblock.position.column, superblock.qindex, MAX_QINDEX
            )));
        }

        let bit_depth = self.sequence.bit_depth;
        let quant = &self.frame.quantization;
        for segment in 0..MAX_SEGMENTS {
            let qindex = self.frame.segmentation.qindex(segment, superblock.qindex);
            for plane in Plane::ALL {
                let p = plane.index();
                let dc = dc_q(qindex, quant.delta_q_dc[p] as i32, bit_depth)?;
                let ac = ac_q(qindex, quant.delta_q_ac[p] as i32, bit_depth)?;
                context.set_dc(segment as u8, plane, dc)?;
                context.set_ac(segment as u8, plane, ac)?;
            }
        }
        tracing::trace!(
            row = superblock.position.row,
            column = superblock.position.column,
            qindex = superblock.qindex,
            "Refreshed dequantization context"
        );
        Ok(())
    }

    /// Whether a segment is coded losslessly.
    pub fn is_lossless(&self, segment: u8) -> Result<bool> {
        self.frame
            .lossless
            .get(segment as usize)
            .copied()
            .ok_or(Av1Error::SegmentOutOfRange(segment))
    }

    /// Matrix level used for a segment and plane.
    pub fn qm_level(&self, segment: u8, plane: Plane) -> Result<u8> {
        if self.is_lossless(segment)? || !self.frame.quantization.using_qmatrix {
            Ok(FLAT_QM_LEVEL)
        } else {
            Ok(self.frame.quantization.qm_level[plane.index()])
        }
    }

    /// Dequantize one transform unit.
    ///
    /// `levels[0]` is the number of coded coefficients, followed by that many
    /// levels in scan order. Nonzero levels are written to their raster
    /// positions in `out`; every other position is left untouched. Returns the
    /// coefficient count.
    pub fn inverse_quantize(
        &self,
        context: &DequantizationContext,
        mode: &BlockModeInfo,
        levels: &[i32],
        out: &mut [i32],
        tx_type: TransformType,
        tx_size: TransformSize,
        plane: Plane,
    ) -> Result<usize> {
        let raw_count = *levels.first().ok_or(Av1Error::BufferTooSmall {
            needed: 1,
            actual: 0,
        })?;
        let count = usize::try_from(raw_count).map_err(|_| {
            Av1Error::InvalidQuantization(format!("negative coefficient count {}", raw_count))
        })?;
        if count == 0 {
            return Ok(0);
        }

        let limit = tx_size.coded_area();
        if count > limit {
            return Err(Av1Error::CoefficientOverflow { count, limit });
        }
        if levels.len() < count + 1 {
            return Err(Av1Error::BufferTooSmall {
                needed: count + 1,
                actual: levels.len(),
            });
        }
        if out.len() < limit {
            return Err(Av1Error::BufferTooSmall {
                needed: limit,
                actual: out.len(),
            });
        }

        let scan = scan_order(tx_size, tx_type);
        let segment = mode.segment_id;
        let qm_level = self.qm_level(segment, plane)?;
        let dc_step = context.dc(segment, plane)? as i32;
        let ac_step = context.ac(segment, plane)? as i32;
        let matrix = if tx_type.uses_matrix() {
            self.index.matrix(&self.weights, qm_level, plane, tx_size)
        } else {
            None
        };

        let shift = tx_size.scale();
        let bound = 1i64 << (7 + context.bit_depth() as u32);
        let (min, max) = (-bound, bound - 1);

        let levels = &levels[1..=count];
        if levels[0] != 0 {
            out[0] = dequantize(levels[0], weighted_step(dc_step, 0, matrix), shift, min, max);
        }
        for (&level, &pos) in levels.iter().zip(scan).skip(1) {
            if level != 0 {
                let pos = pos as usize;
                out[pos] = dequantize(level, weighted_step(ac_step, pos, matrix), shift, min, max);
            }
        }
        Ok(count)
    }
}

/// Scale one level by a weighted step.
#[inline]
fn dequantize(level: i32, step: i32, shift: u32, min: i64, max: i64) -> i32 {
    let magnitude = ((level.unsigned_abs() as i64 * step as i64) & DEQUANT_MASK) >> shift;
    let signed = if level < 0 { -magnitude } else { magnitude };
    signed.clamp(min, max) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::SuperblockPosition;
    use crate::quant_matrix::QM_WEIGHT_COUNT;
    use crate::tables::{AC_QLOOKUP_8BIT, DC_QLOOKUP_8BIT};
    use crate::types::BlockSize;

    fn headers(base_q_idx: u8) -> (SequenceHeader, FrameHeader) {
        let seq = SequenceHeader::default();
        let mut frame = FrameHeader::new(64, 64);
        frame.quantization.base_q_idx = base_q_idx;
        frame.derive_lossless();
        (seq, frame)
    }

    fn mode(segment: u8) -> BlockModeInfo {
        BlockModeInfo::new(BlockSize::Block8x8, segment)
    }

    #[test]
    fn test_dequantize_arithmetic() {
        assert_eq!(dequantize(3, 100, 0, -32768, 32767), 300);
        assert_eq!(dequantize(-3, 100, 1, -32768, 32767), -150);
        // 24-bit mask applies before the shift.
        assert_eq!(dequantize(0x10000, 0x100, 0, i64::MIN, i64::MAX), 0);
        assert_eq!(dequantize(-100_000, 1828, 0, -32768, 32767), -32768);
        assert_eq!(dequantize(100_000, 1828, 0, -32768, 32767), 32767);
    }

    #[test]
    fn test_basic_inverse_quantize() {
        let (seq, frame) = headers(100);
        let iq = InverseQuantizer::new(&seq, &frame).unwrap();
        let ctx = DequantizationContext::new(&seq, &frame).unwrap();
        let mut out = vec![0i32; 16];
        let levels = [3, 2, -1, 4];
        let count = iq
            .inverse_quantize(&ctx, &mode(0), &levels, &mut out, TransformType::DctDct, TransformSize::Tx4x4, Plane::Y)
            .unwrap();
        assert_eq!(count, 3);
        let dc = DC_QLOOKUP_8BIT[100] as i32;
        let ac = AC_QLOOKUP_8BIT[100] as i32;
        assert_eq!(out[0], 2 * dc);
        // Scan positions 1 and 2 of the 4x4 diagonal scan are raster 4 and 1.
        assert_eq!(out[4], -ac);
        assert_eq!(out[1], 4 * ac);
        assert_eq!(out.iter().filter(|c| **c != 0).count(), 3);
    }

    #[test]
    fn test_zero_count_writes_nothing() {
        let (seq, frame) = headers(100);
        let iq = InverseQuantizer::new(&seq, &frame).unwrap();
        let ctx = DequantizationContext::new(&seq, &frame).unwrap();
        let mut out = vec![7i32; 16];
        let count = iq
            .inverse_quantize(&ctx, &mode(0), &[0, 5, 5], &mut out, TransformType::DctDct, TransformSize::Tx4x4, Plane::Y)
            .unwrap();
        assert_eq!(count, 0);
        assert!(out.iter().all(|c| *c == 7));
    }

    #[test]
    fn test_zero_levels_leave_positions_untouched() {
        let (seq, frame) = headers(50);
        let iq = InverseQuantizer::new(&seq, &frame).unwrap();
        let ctx = DequantizationContext::new(&seq, &frame).unwrap();
        let mut out = vec![-9i32; 16];
        iq.inverse_quantize(&ctx, &mode(0), &[2, 0, 0], &mut out, TransformType::DctDct, TransformSize::Tx4x4, Plane::Y)
            .unwrap();
        assert!(out.iter().all(|c| *c == -9));
    }

    #[test]
    fn test_large_transform_shift() {
        let (seq, frame) = headers(100);
        let iq = InverseQuantizer::new(&seq, &frame).unwrap();
        let ctx = DequantizationContext::new(&seq, &frame).unwrap();
        let mut out = vec![0i32; 1024];
        iq.inverse_quantize(&ctx, &mode(0), &[1, 9], &mut out, TransformType::DctDct, TransformSize::Tx64x64, Plane::Y)
            .unwrap();
        assert_eq!(out[0], (9 * DC_QLOOKUP_8BIT[100] as i32) >> 2);
    }

    #[test]
    fn test_buffer_errors() {
        let (seq, frame) = headers(100);
        let iq = InverseQuantizer::new(&seq, &frame).unwrap();
        let ctx = DequantizationContext::new(&seq, &frame).unwrap();
        let m = mode(0);
        let mut small = vec![0i32; 8];
        assert!(matches!(
            iq.inverse_quantize(&ctx, &m, &[1, 1], &mut small, TransformType::DctDct, TransformSize::Tx4x4, Plane::Y),
            Err(Av1Error::BufferTooSmall { needed: 16, actual: 8 })
        ));
        let mut out = vec![0i32; 16];
        assert!(matches!(
            iq.inverse_quantize(&ctx, &m, &[17], &mut out, TransformType::DctDct, TransformSize::Tx4x4, Plane::Y),
            Err(Av1Error::CoefficientOverflow { count: 17, limit: 16 })
        ));
        assert!(matches!(
            iq.inverse_quantize(&ctx, &m, &[3, 1], &mut out, TransformType::DctDct, TransformSize::Tx4x4, Plane::Y),
            Err(Av1Error::BufferTooSmall { needed: 4, actual: 2 })
        ));
        assert!(iq
            .inverse_quantize(&ctx, &m, &[], &mut out, TransformType::DctDct, TransformSize::Tx4x4, Plane::Y)
            .is_err());
        assert!(matches!(
            iq.inverse_quantize(&ctx, &m, &[-1], &mut out, TransformType::DctDct, TransformSize::Tx4x4, Plane::Y),
            Err(Av1Error::InvalidQuantization(_))
        ));
    }

    #[test]
    fn test_matrix_weights_apply_to_2d_only() {
        let (seq, mut frame) = headers(100);
        frame.quantization.using_qmatrix = true;
        frame.quantization.qm_level = [0, 0, 0];
        let iq = InverseQuantizer::with_weights(
            &seq,
            &frame,
            QuantMatrixWeights::from_weights(vec![64u8; QM_WEIGHT_COUNT]).unwrap(),
        )
        .unwrap();
        let ctx = DequantizationContext::new(&seq, &frame).unwrap();
        let dc = DC_QLOOKUP_8BIT[100] as i32;

        let mut out = vec![0i32; 16];
        iq.inverse_quantize(&ctx, &mode(0), &[1, 1], &mut out, TransformType::AdstAdst, TransformSize::Tx4x4, Plane::Y)
            .unwrap();
        assert_eq!(out[0], (64 * dc + 16) >> 5);

        for tx_type in [TransformType::Identity, TransformType::VerticalDct, TransformType::HorizontalFlipAdst] {
            let mut out = vec![0i32; 16];
            iq.inverse_quantize(&ctx, &mode(0), &[1, 1], &mut out, tx_type, TransformSize::Tx4x4, Plane::Y)
                .unwrap();
            assert_eq!(out[0], dc);
        }
    }

    #[test]
    fn test_lossless_segment_forces_flat() {
        let (seq, mut frame) = headers(100);
        frame.quantization.using_qmatrix = true;
        frame.quantization.qm_level = [2, 3, 4];
        frame.lossless[6] = true;
        let iq = InverseQuantizer::new(&seq, &frame).unwrap();
        assert_eq!(iq.qm_level(6, Plane::U).unwrap(), FLAT_QM_LEVEL);
        assert_eq!(iq.qm_level(0, Plane::U).unwrap(), 3);
        assert_eq!(iq.qm_level(9, Plane::U), Err(Av1Error::SegmentOutOfRange(9)));
    }

    #[test]
    fn test_update_dequant_noop_without_delta_q() {
        let (seq, frame) = headers(100);
        let iq = InverseQuantizer::new(&seq, &frame).unwrap();
        let mut ctx = DequantizationContext::new(&seq, &frame).unwrap();
        let before = ctx.clone();
        let sb = SuperblockInfo::new(SuperblockPosition::default(), 10);
        iq.update_dequant(&mut ctx, &sb).unwrap();
        assert_eq!(ctx, before);
    }

    #[test]
    fn test_update_dequant_replaces_base() {
        let (seq, mut frame) = headers(100);
        frame.delta_q.present = true;
        frame.quantization.delta_q_ac[1] = 3;
        let iq = InverseQuantizer::new(&seq, &frame).unwrap();
        let mut ctx = DequantizationContext::new(&seq, &frame).unwrap();
        let sb = SuperblockInfo::new(SuperblockPosition::default(), 60);
        iq.update_dequant(&mut ctx, &sb).unwrap();
        assert_eq!(ctx.dc(0, Plane::Y).unwrap(), DC_QLOOKUP_8BIT[60]);
        assert_eq!(ctx.ac(7, Plane::U).unwrap(), AC_QLOOKUP_8BIT[63]);

        let bad = SuperblockInfo::new(SuperblockPosition::default(), 256);
        assert!(matches!(
            iq.update_dequant(&mut ctx, &bad),
            Err(Av1Error::InvalidQuantization(_))
        ));
    }
}
