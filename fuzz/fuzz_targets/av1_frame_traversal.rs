#![no_main]

//! Fuzz target for AV1 frame traversal.
//!
//! Builds arbitrary tile layouts and sparse superblock grids and checks that
//! traversal either visits every superblock once or reports an error.

use std::collections::HashSet;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use transcode_av1::{
    Av1DecoderConfig, BlockContext, BlockDecoder, FrameDecoder, FrameHeader, FrameLayout,
    NoPostFilter, Result, SequenceHeader, SuperblockInfo, SuperblockPosition, TileInfo,
};

#[derive(Arbitrary, Debug)]
struct TraversalInput {
    width: u16,
    height: u16,
    large_superblocks: bool,
    columns_log2: u8,
    rows_log2: u8,
    delta_q: bool,
    qindex: Vec<i16>,
    holes: Vec<u16>,
}

#[derive(Default)]
struct Primed(Vec<SuperblockPosition>);

impl BlockDecoder for Primed {
    fn prime_superblock(&mut self, superblock: &SuperblockInfo) -> Result<()> {
        self.0.push(superblock.position);
        Ok(())
    }

    fn decode_block(&mut self, _block: &BlockContext<'_, '_>) -> Result<()> {
        Ok(())
    }
}

fuzz_target!(|input: TraversalInput| {
    let width = (input.width % 2048) as u32 + 1;
    let height = (input.height % 2048) as u32 + 1;
    let seq = SequenceHeader {
        sb_size_log2: if input.large_superblocks { 7 } else { 6 },
        ..SequenceHeader::default()
    };
    let mut frame = FrameHeader::new(width, height);
    frame.delta_q.present = input.delta_q;
    let Ok(tiles) = TileInfo::uniform(
        frame.mi_columns(),
        frame.mi_rows(),
        seq.sb_mi_log2(),
        input.columns_log2 as u32,
        input.rows_log2 as u32,
    ) else {
        return;
    };
    frame.tile_info = tiles;

    let holes: HashSet<u16> = input.holes.iter().copied().collect();
    let mut index = 0usize;
    let mut missing = false;
    let mut layout = FrameLayout::new(&seq, &frame);
    for row in 0..layout.sb_rows() {
        for column in 0..layout.sb_columns() {
            let qindex = input.qindex.get(index).copied().unwrap_or(0) as i32;
            if holes.contains(&(index as u16)) {
                missing = true;
            } else if layout
                .insert(SuperblockInfo::new(SuperblockPosition::new(row, column), qindex))
                .is_err()
            {
                return;
            }
            index += 1;
        }
    }

    let Ok(mut decoder) = FrameDecoder::new(&seq, &frame, &layout, Av1DecoderConfig::default()) else {
        return;
    };
    let mut primed = Primed::default();
    if decoder.decode_frame(&mut primed, &mut NoPostFilter).is_ok() {
        assert!(!missing);
        let unique: HashSet<_> = primed.0.iter().copied().collect();
        assert_eq!(unique.len(), primed.0.len());
        assert_eq!(primed.0.len(), index);
    }
});
