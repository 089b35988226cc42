#![no_main]

//! Fuzz target for AV1 inverse quantization.
//!
//! Feeds arbitrary levels, counts and quantizer setups through the inverse
//! quantizer and checks the output range contract.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use transcode_av1::{
    BlockModeInfo, BlockSize, DequantizationContext, FrameHeader, InverseQuantizer, Plane,
    SegmentFeature, SequenceHeader, TransformSize, TransformType,
};

#[derive(Arbitrary, Debug)]
struct QuantInput {
    bit_depth: u8,
    base_q_idx: u8,
    delta_dc: i8,
    delta_ac: i8,
    using_qmatrix: bool,
    qm_level: u8,
    segment: u8,
    alt_q: i16,
    size: u8,
    tx_type: u8,
    plane: u8,
    out_len: u16,
    levels: Vec<i32>,
}

fuzz_target!(|input: QuantInput| {
    // Limit input size to prevent OOM
    if input.levels.len() > 4096 {
        return;
    }

    let seq = SequenceHeader {
        bit_depth: [8, 10, 12][input.bit_depth as usize % 3],
        ..SequenceHeader::default()
    };
    let mut frame = FrameHeader::new(64, 64);
    frame.quantization.base_q_idx = input.base_q_idx;
    frame.quantization.delta_q_dc = [input.delta_dc.clamp(-64, 63); 3];
    frame.quantization.delta_q_ac = [input.delta_ac.clamp(-64, 63); 3];
    frame.quantization.using_qmatrix = input.using_qmatrix;
    frame.quantization.qm_level = [input.qm_level % 16; 3];
    frame.segmentation.enabled = true;
    if frame
        .segmentation
        .set_feature(input.segment as usize, SegmentFeature::AltQ, input.alt_q.clamp(-255, 255))
        .is_err()
    {
        return;
    }
    frame.derive_lossless();

    let Ok(iq) = InverseQuantizer::new(&seq, &frame) else {
        return;
    };
    let Ok(ctx) = DequantizationContext::new(&seq, &frame) else {
        return;
    };

    let size = TransformSize::ALL[input.size as usize % TransformSize::ALL.len()];
    let Some(tx_type) = TransformType::from_u8(input.tx_type % 16) else {
        return;
    };
    let plane = Plane::ALL[input.plane as usize % 3];
    let mode = BlockModeInfo::new(BlockSize::Block64x64, input.segment);
    let mut out = vec![0i32; input.out_len as usize % 2048];

    match iq.inverse_quantize(&ctx, &mode, &input.levels, &mut out, tx_type, size, plane) {
        Ok(count) => {
            assert!(count <= size.coded_area());
            let bound = 1i32 << (7 + seq.bit_depth);
            assert!(out.iter().all(|c| (-bound..bound).contains(c)));
        }
        Err(_) => {
            // Contract violations are reported, never panics
        }
    }
});
