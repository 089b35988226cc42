//! AV1 frame decoder.
//!
//! This module drives reconstruction of one frame:
//! - Tile traversal (tile columns, then tile rows, then superblock rows)
//! - Per-superblock dequantization refresh
//! - Block dispatch to a [`BlockDecoder`]
//! - Post-filter sequencing
//!
//! Every mode-info unit of every tile is visited exactly once. Within a tile
//! superblocks are visited left to right, top to bottom, so the left and
//! above neighbors of a block are always reconstructed before it.

use parking_lot::Mutex;
use rayon::prelude::*;

use crate::block::{BlockContext, BlockDecoder, TileContext};
use crate::config::Av1DecoderConfig;
use crate::dequant::DequantizationContext;
use crate::error::{Av1Error, Result};
use crate::frame::FrameBuffer;
use crate::header::{FrameHeader, SequenceHeader};
use crate::inverse_quantizer::InverseQuantizer;
use crate::layout::{FrameLayout, SuperblockInfo, SuperblockPosition};
use crate::post_filter::{PostFilter, PostFilterStage};
use crate::quant_matrix::QuantMatrixWeights;
use crate::types::{ModeInfoPosition, MAX_SEGMENTS};

/// Frame decoder progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeState {
    /// Nothing decoded yet.
    #[default]
    NotStarted,
    /// Reconstructing tiles.
    DecodingTiles,
    /// Running post filters.
    PostProcessing,
    /// Frame complete.
    Done,
}

/// Counters collected while decoding a frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Tiles decoded.
    pub tiles: usize,
    /// Superblocks decoded.
    pub superblocks: usize,
    /// Blocks dispatched to the block decoder.
    pub blocks: usize,
    /// Superblocks visited by the loop filter pass.
    pub loop_filter_superblocks: usize,
    /// Post-filter stages that ran, in order.
    pub stages: Vec<PostFilterStage>,
}

impl DecodeStats {
    /// Add the tile counters of another run.
    pub fn merge(&mut self, other: &DecodeStats) {
        self.tiles += other.tiles;
        self.superblocks += other.superblocks;
        self.blocks += other.blocks;
        self.loop_filter_superblocks += other.loop_filter_superblocks;
        self.stages.extend_from_slice(&other.stages);
    }
}

/// Frame reconstruction driver.
///
/// Borrows the headers and the layout for the whole decode. One instance
/// decodes exactly one frame.
#[derive(Debug)]
pub struct FrameDecoder<'a> {
    sequence: &'a SequenceHeader,
    frame: &'a FrameHeader,
    layout: &'a FrameLayout,
    config: Av1DecoderConfig,
    quantizer: InverseQuantizer<'a>,
    dequant: DequantizationContext,
    state: DecodeState,
    stats: DecodeStats,
}

impl<'a> FrameDecoder<'a> {
    /// Create a decoder using unity quantization matrix weights.
    pub fn new(
        sequence: &'a SequenceHeader,
        frame: &'a FrameHeader,
        layout: &'a FrameLayout,
        config: Av1DecoderConfig,
    ) -> Result<Self> {
        Self::with_weights(sequence, frame, layout, config, QuantMatrixWeights::flat())
    }

    /// Create a decoder with explicit quantization matrix weights.
    ///
    /// Fails before anything is decoded if the headers are invalid, the
    /// layout does not match the frame, or a block names a segment past 7.
    pub fn with_weights(
        sequence: &'a SequenceHeader,
        frame: &'a FrameHeader,
        layout: &'a FrameLayout,
        config: Av1DecoderConfig,
        weights: QuantMatrixWeights,
    ) -> Result<Self> {
        frame.validate(sequence)?;
        let sb_columns = frame.sb_columns(sequence);
        let sb_rows = frame.sb_rows(sequence);
        if layout.sb_columns() != sb_columns || layout.sb_rows() != sb_rows {
            return Err(Av1Error::invalid_tile_info(format!(
                "layout is {}x{} superblocks, frame needs {}x{}",
                layout.sb_columns(),
                layout.sb_rows(),
                sb_columns,
                sb_rows
            )));
        }

        if let Some(segment) = layout
            .superblocks()
            .flat_map(|sb| &sb.blocks)
            .map(|block| block.mode.segment_id)
            .find(|id| usize::from(*id) >= MAX_SEGMENTS)
        {
            return Err(Av1Error::SegmentOutOfRange(segment));
        }

        let quantizer = InverseQuantizer::with_weights(sequence, frame, weights)?;
        let dequant = DequantizationContext::new(sequence, frame)?;

        tracing::debug!(
            width = frame.width,
            height = frame.height,
            tile_columns = frame.tile_info.column_count,
            tile_rows = frame.tile_info.row_count,
            sb_size = sequence.sb_size(),
            bit_depth = sequence.bit_depth,
            "Created AV1 frame decoder"
        );

        Ok(Self {
            sequence,
            frame,
            layout,
            config,
            quantizer,
            dequant,
            state: DecodeState::NotStarted,
            stats: DecodeStats::default(),
        })
    }

    /// Current state.
    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Counters of the last decode.
    pub fn stats(&self) -> &DecodeStats {
        &self.stats
    }

    /// Decoder configuration.
    pub fn config(&self) -> &Av1DecoderConfig {
        &self.config
    }

    /// Frame inverse quantizer.
    pub fn quantizer(&self) -> &InverseQuantizer<'a> {
        &self.quantizer
    }

    /// Dequantization context as left by the sequential decode.
    pub fn dequantization_context(&self) -> &DequantizationContext {
        &self.dequant
    }

    /// Tiles in decode order (tile columns outermost).
    pub fn tiles(&self) -> Vec<TileContext> {
        let info = &self.frame.tile_info;
        let mut tiles = Vec::with_capacity(info.tile_count() as usize);
        for column in 0..info.column_count {
            for row in 0..info.row_count {
                tiles.push(self.tile_context(row, column));
            }
        }
        tiles
    }

    fn tile_context(&self, row: u32, column: u32) -> TileContext {
        let info = &self.frame.tile_info;
        TileContext {
            row,
            column,
            mi_row_start: info.row_start_mi[row as usize],
            mi_row_end: info.row_start_mi[row as usize + 1],
            mi_column_start: info.column_start_mi[column as usize],
            mi_column_end: info.column_start_mi[column as usize + 1],
        }
    }

    fn begin(&mut self) -> Result<()> {
        if self.state != DecodeState::NotStarted {
            return Err(Av1Error::InvalidState(format!(
                "frame decode requested in state {:?}",
                self.state
            )));
        }
        self.state = DecodeState::DecodingTiles;
        self.stats = DecodeStats::default();
        Ok(())
    }

    /// Decode every tile with one block decoder, then run the post filters.
    pub fn decode_frame<B, P>(&mut self, block_decoder: &mut B, post_filter: &mut P) -> Result<DecodeStats>
    where
        B: BlockDecoder,
        P: PostFilter,
    {
        self.begin()?;
        let mut dequant = self.dequant.clone();
        let mut stats = DecodeStats::default();
        for tile_column in 0..self.frame.tile_info.column_count {
            self.decode_frame_tiles(tile_column, block_decoder, &mut dequant, &mut stats)?;
        }
        self.dequant = dequant;
        self.stats = stats;
        self.finish(post_filter, block_decoder.frame_mut())
    }

    /// Decode tiles on a worker pool, one block decoder per tile.
    ///
    /// Each tile gets its own decoder from `factory` and its own copy of the
    /// frame-level dequantization context. All tiles complete before any post
    /// filter runs. The decoders are returned in tile order.
    ///
    /// When the decoders own frames, every tile's region is copied into the
    /// frame of the first decoder, which then holds the whole reconstruction
    /// and is the frame the post filters see.
    pub fn decode_frame_parallel<B, F, P>(
        &mut self,
        factory: F,
        post_filter: &mut P,
    ) -> Result<(DecodeStats, Vec<B>)>
    where
        B: BlockDecoder + Send,
        F: Fn(&TileContext) -> B + Sync,
        P: PostFilter,
    {
        self.begin()?;
        let tiles = self.tiles();
        let threads = self.config.effective_threads();

        let totals = Mutex::new(DecodeStats::default());

        let mut decoders = {
            let this = &*self;
            let run = |tile: &TileContext| -> Result<B> {
                let mut decoder = factory(tile);
                let mut dequant = this.dequant.clone();
                let mut stats = DecodeStats::default();
                this.decode_tile(tile, &mut decoder, &mut dequant, &mut stats)?;
                totals.lock().merge(&stats);
                Ok(decoder)
            };

            let pool = if threads > 1 {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|idx| format!("av1-tile-{}", idx))
                    .build()
                    .map_err(|e| {
                        tracing::warn!(error = %e, "Tile pool unavailable, decoding tiles sequentially");
                    })
                    .ok()
            } else {
                None
            };

            match pool {
                Some(pool) => pool.install(|| tiles.par_iter().map(&run).collect::<Result<Vec<_>>>()),
                None => tiles.iter().map(&run).collect::<Result<Vec<_>>>(),
            }?
        };
        merge_tile_frames(&tiles, &mut decoders)?;

        self.stats = totals.into_inner();
        let frame = decoders.first_mut().and_then(|decoder| decoder.frame_mut());
        let stats = self.finish(post_filter, frame)?;
        Ok((stats, decoders))
    }

    fn finish<P: PostFilter>(
        &mut self,
        post_filter: &mut P,
        frame: Option<&mut FrameBuffer>,
    ) -> Result<DecodeStats> {
        self.state = DecodeState::PostProcessing;
        let mut stats = std::mem::take(&mut self.stats);
        self.run_post_filters(post_filter, frame, &mut stats)?;
        self.state = DecodeState::Done;
        tracing::debug!(
            tiles = stats.tiles,
            superblocks = stats.superblocks,
            blocks = stats.blocks,
            stages = stats.stages.len(),
            "Decoded AV1 frame"
        );
        self.stats = stats.clone();
        Ok(stats)
    }

    /// Decode every tile of one tile column.
    pub fn decode_frame_tiles<B: BlockDecoder>(
        &self,
        tile_column: u32,
        block_decoder: &mut B,
        dequant: &mut DequantizationContext,
        stats: &mut DecodeStats,
    ) -> Result<()> {
        for tile_row in 0..self.frame.tile_info.row_count {
            let tile = self.tile_context(tile_row, tile_column);
            self.decode_tile(&tile, block_decoder, dequant, stats)?;
        }
        Ok(())
    }

    /// Decode one tile, every superblock row of it in order.
    pub fn decode_tile<B: BlockDecoder>(
        &self,
        tile: &TileContext,
        block_decoder: &mut B,
        dequant: &mut DequantizationContext,
        stats: &mut DecodeStats,
    ) -> Result<()> {
        let sb_log2 = self.sequence.sb_mi_log2();
        let first_sb_row = tile.mi_row_start >> sb_log2;
        let end_sb_row = (tile.mi_row_end + (1 << sb_log2) - 1) >> sb_log2;
        tracing::trace!(
            tile_row = tile.row,
            tile_column = tile.column,
            first_sb_row,
            end_sb_row,
            "Decoding tile"
        );

        for sb_row in first_sb_row..end_sb_row {
            let mi_row = sb_row << sb_log2;
            self.decode_tile_row(tile, mi_row, sb_row, block_decoder, dequant, stats)?;
        }
        stats.tiles += 1;
        Ok(())
    }

    /// Decode one superblock row of a tile, left to right.
    pub fn decode_tile_row<B: BlockDecoder>(
        &self,
        tile: &TileContext,
        mi_row: u32,
        sb_row: u32,
        block_decoder: &mut B,
        dequant: &mut DequantizationContext,
        stats: &mut DecodeStats,
    ) -> Result<()> {
        let sb_log2 = self.sequence.sb_mi_log2();
        let step = self.sequence.sb_mi_size() as usize;
        for mi_column in (tile.mi_column_start..tile.mi_column_end).step_by(step) {
            let sb_column = mi_column >> sb_log2;
            let superblock = self.layout.get(sb_row, sb_column)?;
            self.decode_superblock(
                ModeInfoPosition::new(mi_row, mi_column),
                superblock,
                tile,
                block_decoder,
                dequant,
                stats,
            )?;
        }
        Ok(())
    }

    /// Decode one superblock.
    pub fn decode_superblock<B: BlockDecoder>(
        &self,
        position: ModeInfoPosition,
        superblock: &SuperblockInfo,
        tile: &TileContext,
        block_decoder: &mut B,
        dequant: &mut DequantizationContext,
        stats: &mut DecodeStats,
    ) -> Result<()> {
        tracing::trace!(
            mi_row = position.row,
            mi_column = position.column,
            blocks = superblock.block_count(),
            "Decoding superblock"
        );
        block_decoder.prime_superblock(superblock)?;
        self.quantizer.update_dequant(dequant, superblock)?;
        self.decode_partition(position, superblock, tile, block_decoder, dequant, stats)?;
        stats.superblocks += 1;
        Ok(())
    }

    /// Dispatch the resolved blocks of a superblock.
    pub fn decode_partition<B: BlockDecoder>(
        &self,
        position: ModeInfoPosition,
        superblock: &SuperblockInfo,
        tile: &TileContext,
        block_decoder: &mut B,
        dequant: &DequantizationContext,
        stats: &mut DecodeStats,
    ) -> Result<()> {
        for block in &superblock.blocks {
            let context = BlockContext {
                mode: &block.mode,
                position: position.offset(block.offset),
                block_size: block.size(),
                superblock,
                tile,
                dequant,
                quantizer: &self.quantizer,
            };
            block_decoder.decode_block(&context)?;
            stats.blocks += 1;
        }
        Ok(())
    }

    /// Run the loop filter over the whole frame in superblock raster order.
    pub fn decode_loop_filter_for_frame<P: PostFilter>(
        &self,
        post_filter: &mut P,
        mut frame: Option<&mut FrameBuffer>,
        stats: &mut DecodeStats,
    ) -> Result<()> {
        let sb_columns = self.layout.sb_columns();
        for row in 0..self.layout.sb_rows() {
            for column in 0..sb_columns {
                let end_of_row = column + 1 == sb_columns;
                post_filter.loop_filter_superblock(
                    frame.as_deref_mut(),
                    SuperblockPosition::new(row, column),
                    end_of_row,
                )?;
                stats.loop_filter_superblocks += 1;
            }
        }
        Ok(())
    }

    fn run_post_filters<P: PostFilter>(
        &self,
        post_filter: &mut P,
        mut frame: Option<&mut FrameBuffer>,
        stats: &mut DecodeStats,
    ) -> Result<()> {
        let loop_filter = self.config.enable_loop_filter && self.frame.do_loop_filter();
        let cdef = self.config.enable_cdef && self.frame.do_cdef();
        let upscale = self.config.enable_super_res && self.frame.do_super_res();
        let restoration = self.config.enable_loop_restoration && self.frame.do_loop_restoration();

        let plan = [
            (PostFilterStage::LoopFilter, loop_filter),
            (PostFilterStage::SaveDeblockedBoundaries, restoration),
            (PostFilterStage::Cdef, cdef),
            (PostFilterStage::Upscale, upscale),
            (PostFilterStage::SaveCdefBoundaries, restoration),
            (PostFilterStage::LoopRestoration, restoration),
        ];
        for (stage, enabled) in plan {
            if !enabled {
                tracing::debug!(stage = stage.name(), "Skipping post-filter stage");
                continue;
            }
            let target = frame.as_deref_mut();
            match stage {
                PostFilterStage::LoopFilter => self.decode_loop_filter_for_frame(post_filter, target, stats)?,
                PostFilterStage::SaveDeblockedBoundaries => post_filter.save_deblocked_boundaries(target)?,
                PostFilterStage::Cdef => post_filter.cdef(target)?,
                PostFilterStage::Upscale => post_filter.upscale(target)?,
                PostFilterStage::SaveCdefBoundaries => post_filter.save_cdef_boundaries(target)?,
                PostFilterStage::LoopRestoration => post_filter.loop_restoration(target)?,
            }
            stats.stages.push(stage);
        }
        Ok(())
    }
}

/// Copy every tile's region into the frame of the first decoder.
fn merge_tile_frames<B: BlockDecoder>(tiles: &[TileContext], decoders: &mut [B]) -> Result<()> {
    let Some((first, rest)) = decoders.split_first_mut() else {
        return Ok(());
    };
    let Some(target) = first.frame_mut() else {
        return Ok(());
    };
    for (tile, decoder) in tiles.iter().skip(1).zip(rest) {
        if let Some(source) = decoder.frame_mut() {
            target.copy_tile_from(source, tile)?;
        }
    }
    tracing::trace!(tiles = tiles.len(), "Merged tile frames");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::BlockInfo;
    use crate::layout::BlockModeInfo;
    use crate::post_filter::NoPostFilter;
    use crate::types::BlockSize;

    #[derive(Default)]
    struct Visits {
        primed: Vec<SuperblockPosition>,
        blocks: Vec<(ModeInfoPosition, u32, u32)>,
    }

    impl BlockDecoder for Visits {
        fn prime_superblock(&mut self, superblock: &SuperblockInfo) -> Result<()> {
            self.primed.push(superblock.position);
            Ok(())
        }

        fn decode_block(&mut self, block: &BlockContext<'_, '_>) -> Result<()> {
            self.blocks.push((block.position, block.tile.row, block.tile.column));
            Ok(())
        }
    }

    fn one_block_layout(seq: &SequenceHeader, frame: &FrameHeader) -> FrameLayout {
        let size = BlockSize::superblock(seq.sb_size_log2).unwrap();
        FrameLayout::filled(seq, frame, |pos| {
            SuperblockInfo::new(pos, frame.quantization.base_q_idx as i32).with_block(BlockInfo::new(
                ModeInfoPosition::default(),
                BlockModeInfo::new(size, 0),
            ))
        })
    }

    #[test]
    fn test_state_transitions() {
        let seq = SequenceHeader::default();
        let frame = FrameHeader::new(64, 64);
        let layout = one_block_layout(&seq, &frame);
        let mut decoder = FrameDecoder::new(&seq, &frame, &layout, Av1DecoderConfig::default()).unwrap();
        assert_eq!(decoder.state(), DecodeState::NotStarted);
        let mut visits = Visits::default();
        decoder.decode_frame(&mut visits, &mut NoPostFilter).unwrap();
        assert_eq!(decoder.state(), DecodeState::Done);
        assert!(matches!(
            decoder.decode_frame(&mut visits, &mut NoPostFilter),
            Err(Av1Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_superblock_order_within_tile() {
        let seq = SequenceHeader::default();
        let frame = FrameHeader::new(192, 128);
        let layout = one_block_layout(&seq, &frame);
        let mut decoder = FrameDecoder::new(&seq, &frame, &layout, Av1DecoderConfig::default()).unwrap();
        let mut visits = Visits::default();
        let stats = decoder.decode_frame(&mut visits, &mut NoPostFilter).unwrap();
        assert_eq!(stats.superblocks, 6);
        assert_eq!(stats.tiles, 1);
        let expected: Vec<_> = (0..2)
            .flat_map(|r| (0..3).map(move |c| SuperblockPosition::new(r, c)))
            .collect();
        assert_eq!(visits.primed, expected);
        assert_eq!(visits.blocks[4].0, ModeInfoPosition::new(16, 16));
    }

    #[test]
    fn test_layout_size_mismatch() {
        let seq = SequenceHeader::default();
        let frame = FrameHeader::new(128, 128);
        let small = FrameHeader::new(64, 64);
        let layout = one_block_layout(&seq, &small);
        assert!(matches!(
            FrameDecoder::new(&seq, &frame, &layout, Av1DecoderConfig::default()),
            Err(Av1Error::InvalidTileInfo(_))
        ));
    }

    #[test]
    fn test_invalid_segment_id_fails_construction() {
        let seq = SequenceHeader::default();
        let frame = FrameHeader::new(64, 64);
        let mut layout = FrameLayout::new(&seq, &frame);
        layout
            .insert(
                SuperblockInfo::new(SuperblockPosition::new(0, 0), 0).with_block(BlockInfo::new(
                    ModeInfoPosition::default(),
                    BlockModeInfo::new(BlockSize::Block64x64, 200),
                )),
            )
            .unwrap();
        assert_eq!(
            FrameDecoder::new(&seq, &frame, &layout, Av1DecoderConfig::default()).unwrap_err(),
            Av1Error::SegmentOutOfRange(200)
        );
    }

    #[test]
    fn test_missing_superblock() {
        let seq = SequenceHeader::default();
        let frame = FrameHeader::new(128, 64);
        let mut layout = FrameLayout::new(&seq, &frame);
        layout
            .insert(SuperblockInfo::new(SuperblockPosition::new(0, 0), 0))
            .unwrap();
        let mut decoder = FrameDecoder::new(&seq, &frame, &layout, Av1DecoderConfig::default()).unwrap();
        let err = decoder
            .decode_frame(&mut Visits::default(), &mut NoPostFilter)
            .unwrap_err();
        assert_eq!(err, Av1Error::MissingSuperblock { row: 0, column: 1 });
        assert_eq!(decoder.state(), DecodeState::DecodingTiles);
    }

    #[test]
    fn test_stats_merge() {
        let mut a = DecodeStats {
            tiles: 1,
            superblocks: 2,
            blocks: 3,
            ..DecodeStats::default()
        };
        a.merge(&DecodeStats {
            tiles: 1,
            superblocks: 4,
            blocks: 5,
            ..DecodeStats::default()
        });
        assert_eq!((a.tiles, a.superblocks, a.blocks), (2, 6, 8));
    }
}
