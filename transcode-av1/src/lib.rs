//! AV1 intra frame reconstruction for the transcode library.
//!
//! This crate implements the reconstruction core of an AV1 decoder: it walks
//! a frame tile by tile and superblock by superblock, keeps the per-segment
//! quantizer steps current, and turns quantized levels into dequantized
//! transform coefficients. Entropy decoding, prediction, inverse transforms
//! and the in-loop filters plug in through traits.
//!
//! # Features
//!
//! - Tile traversal with per-superblock delta-Q refresh
//! - Inverse quantization for 8, 10 and 12-bit content, with quantization
//!   matrices and lossless segments
//! - Fixed-order post-filter sequencing (loop filter, CDEF, upscaling, restoration)
//! - Optional parallel tile decoding on a rayon pool, merged into one frame
//!
//! # Example
//!
//! ```
//! use transcode_av1::{
//!     Av1DecoderConfig, BlockContext, BlockDecoder, BlockInfo, BlockModeInfo, BlockSize,
//!     FrameDecoder, FrameHeader, FrameLayout, ModeInfoPosition, NoPostFilter, SequenceHeader,
//!     SuperblockInfo,
//! };
//!
//! #[derive(Default)]
//! struct CountBlocks(usize);
//!
//! impl BlockDecoder for CountBlocks {
//!     fn prime_superblock(&mut self, _sb: &SuperblockInfo) -> transcode_av1::Result<()> {
//!         Ok(())
//!     }
//!
//!     fn decode_block(&mut self, _block: &BlockContext<'_, '_>) -> transcode_av1::Result<()> {
//!         self.0 += 1;
//!         Ok(())
//!     }
//! }
//!
//! let sequence = SequenceHeader::default();
//! let frame = FrameHeader::new(128, 128);
//! let layout = FrameLayout::filled(&sequence, &frame, |position| {
//!     SuperblockInfo::new(position, 0).with_block(BlockInfo::new(
//!         ModeInfoPosition::default(),
//!         BlockModeInfo::new(BlockSize::Block64x64, 0),
//!     ))
//! });
//!
//! let mut decoder = FrameDecoder::new(&sequence, &frame, &layout, Av1DecoderConfig::default())?;
//! let mut blocks = CountBlocks::default();
//! let stats = decoder.decode_frame(&mut blocks, &mut NoPostFilter)?;
//! assert_eq!(stats.superblocks, 4);
//! assert_eq!(blocks.0, 4);
//! # Ok::<(), transcode_av1::Av1Error>(())
//! ```

#![warn(missing_docs)]

pub mod block;
pub mod config;
pub mod decoder;
pub mod dequant;
pub mod error;
pub mod frame;
pub mod header;
pub mod inverse_quantizer;
pub mod layout;
pub mod post_filter;
pub mod quant_matrix;
pub mod scan;
pub mod tables;
pub mod types;

pub use block::{
    BlockContext, BlockDecoder, Reconstructor, ResidualBlockDecoder, TileContext, TransformBlock,
};
pub use config::Av1DecoderConfig;
pub use decoder::{DecodeState, DecodeStats, FrameDecoder};
pub use dequant::DequantizationContext;
pub use error::{Av1Error, Result};
pub use frame::FrameBuffer;
pub use header::{
    CdefParams, DeltaQParams, FrameHeader, LoopFilterParams, QuantizationParams,
    RestorationType, SegmentFeature, SegmentationParams, SequenceHeader, SuperResParams,
    TileInfo,
};
pub use inverse_quantizer::InverseQuantizer;
pub use layout::{
    BlockInfo, BlockModeInfo, FrameLayout, SuperblockInfo, SuperblockPosition, TransformUnit,
};
pub use post_filter::{NoPostFilter, PostFilter, PostFilterStage};
pub use quant_matrix::{QuantMatrixIndex, QuantMatrixWeights};
pub use types::{
    BlockSize, ModeInfoPosition, Plane, TransformClass, TransformSize, TransformType,
};
