//! Per-segment, per-plane quantizer steps.

use crate::error::{Av1Error, Result};
use crate::header::{FrameHeader, SequenceHeader};
use crate::tables::{ac_q, dc_q};
use crate::types::{Plane, MAX_PLANES, MAX_SEGMENTS};

const DC: usize = 0;
const AC: usize = 1;

/// DC and AC quantizer steps indexed by `(segment, plane)`.
///
/// Built once per frame from the frame-level quantizer indices. When delta-Q
/// is active the inverse quantizer overwrites it at the start of every
/// superblock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DequantizationContext {
    steps: [[[i16; 2]; MAX_PLANES]; MAX_SEGMENTS],
    bit_depth: u8,
}

impl DequantizationContext {
    /// Build the frame-level context.
    pub fn new(sequence: &SequenceHeader, frame: &FrameHeader) -> Result<Self> {
        let mut context = Self {
            steps: [[[0; 2]; MAX_PLANES]; MAX_SEGMENTS],
            bit_depth: sequence.bit_depth,
        };
        for segment in 0..MAX_SEGMENTS {
            let qindex = frame.segment_qindex(segment);
            context.fill_segment(frame, segment, qindex)?;
        }
        Ok(context)
    }

    fn fill_segment(&mut self, frame: &FrameHeader, segment: usize, qindex: i32) -> Result<()> {
        let quant = &frame.quantization;
        for plane in Plane::ALL {
            let p = plane.index();
            self.steps[segment][p] = [
                dc_q(qindex, quant.delta_q_dc[p] as i32, self.bit_depth)?,
                ac_q(qindex, quant.delta_q_ac[p] as i32, self.bit_depth)?,
            ];
        }
        Ok(())
    }

    /// Bit depth the steps were computed for.
    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    /// DC step for a segment and plane.
    pub fn dc(&self, segment: u8, plane: Plane) -> Result<i16> {
        Ok(self.entry(segment, plane)?[DC])
    }

    /// AC step for a segment and plane.
    pub fn ac(&self, segment: u8, plane: Plane) -> Result<i16> {
        Ok(self.entry(segment, plane)?[AC])
    }

    /// Overwrite the DC step.
    pub(crate) fn set_dc(&mut self, segment: u8, plane: Plane, step: i16) -> Result<()> {
        self.entry_mut(segment, plane)?[DC] = step;
        Ok(())
    }

    /// Overwrite the AC step.
    pub(crate) fn set_ac(&mut self, segment: u8, plane: Plane, step: i16) -> Result<()> {
        self.entry_mut(segment, plane)?[AC] = step;
        Ok(())
    }

    fn entry(&self, segment: u8, plane: Plane) -> Result<&[i16; 2]> {
        self.steps
            .get(segment as usize)
            .map(|s| &s[plane.index()])
            .ok_or(Av1Error::SegmentOutOfRange(segment))
    }

    fn entry_mut(&mut self, segment: u8, plane: Plane) -> Result<&mut [i16; 2]> {
        self.steps
            .get_mut(segment as usize)
            .map(|s| &mut s[plane.index()])
            .ok_or(Av1Error::SegmentOutOfRange(segment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::SegmentFeature;
    use crate::tables::{
        AC_QLOOKUP_10BIT, AC_QLOOKUP_12BIT, AC_QLOOKUP_8BIT, DC_QLOOKUP_12BIT, DC_QLOOKUP_8BIT,
    };

    fn frame(base_q_idx: u8) -> FrameHeader {
        let mut frame = FrameHeader::new(64, 64);
        frame.quantization.base_q_idx = base_q_idx;
        frame
    }

    #[test]
    fn test_frame_level_steps() {
        let seq = SequenceHeader::default();
        let mut frame = frame(100);
        frame.quantization.delta_q_dc[1] = -4;
        frame.quantization.delta_q_ac[2] = 6;
        let ctx = DequantizationContext::new(&seq, &frame).unwrap();

        assert_eq!(ctx.dc(0, Plane::Y).unwrap(), DC_QLOOKUP_8BIT[100]);
        assert_eq!(ctx.ac(0, Plane::Y).unwrap(), AC_QLOOKUP_8BIT[100]);
        assert_eq!(ctx.dc(7, Plane::U).unwrap(), DC_QLOOKUP_8BIT[96]);
        assert_eq!(ctx.ac(3, Plane::V).unwrap(), AC_QLOOKUP_8BIT[106]);
    }

    #[test]
    fn test_segment_override() {
        let seq = SequenceHeader::default();
        let mut frame = frame(100);
        frame.segmentation.enabled = true;
        frame.segmentation.set_feature(5, SegmentFeature::AltQ, 40).unwrap();
        let ctx = DequantizationContext::new(&seq, &frame).unwrap();
        assert_eq!(ctx.ac(5, Plane::Y).unwrap(), AC_QLOOKUP_8BIT[140]);
        assert_eq!(ctx.ac(4, Plane::Y).unwrap(), AC_QLOOKUP_8BIT[100]);
    }

    #[test]
    fn test_segment_out_of_range() {
        let seq = SequenceHeader::default();
        let mut ctx = DequantizationContext::new(&seq, &frame(10)).unwrap();
        assert_eq!(ctx.dc(8, Plane::Y), Err(Av1Error::SegmentOutOfRange(8)));
        assert!(ctx.set_ac(200, Plane::V, 1).is_err());
    }

    #[test]
    fn test_setters() {
        let seq = SequenceHeader::default();
        let mut ctx = DequantizationContext::new(&seq, &frame(10)).unwrap();
        ctx.set_dc(2, Plane::U, 77).unwrap();
        ctx.set_ac(2, Plane::U, 99).unwrap();
        assert_eq!(ctx.dc(2, Plane::U).unwrap(), 77);
        assert_eq!(ctx.ac(2, Plane::U).unwrap(), 99);
        assert_ne!(ctx.dc(2, Plane::V).unwrap(), 77);
    }

    #[test]
    fn test_high_bit_depth_steps() {
        let ten = SequenceHeader {
            bit_depth: 10,
            ..SequenceHeader::default()
        };
        let ctx = DequantizationContext::new(&ten, &frame(255)).unwrap();
        assert_eq!(ctx.bit_depth(), 10);
        assert_eq!(ctx.dc(0, Plane::Y).unwrap(), 5347);
        assert_eq!(ctx.ac(0, Plane::Y).unwrap(), AC_QLOOKUP_10BIT[255]);

        let twelve = SequenceHeader {
            bit_depth: 12,
            ..SequenceHeader::default()
        };
        let ctx = DequantizationContext::new(&twelve, &frame(0)).unwrap();
        assert_eq!(ctx.dc(3, Plane::V).unwrap(), 4);
        let ctx = DequantizationContext::new(&twelve, &frame(180)).unwrap();
        assert_eq!(ctx.dc(0, Plane::U).unwrap(), DC_QLOOKUP_12BIT[180]);
        assert_eq!(ctx.ac(0, Plane::U).unwrap(), AC_QLOOKUP_12BIT[180]);
    }
}
