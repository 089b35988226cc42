//! AV1 sequence and frame header model.
//!
//! Headers are produced by the bitstream parser and are read-only for the
//! reconstruction stages. This module holds:
//! - Sequence-level settings (superblock size, bit depth, chroma format)
//! - Tile geometry in mode-info units
//! - Quantization, segmentation and delta-Q parameters
//! - Post-filter parameters used to decide which stages run

use crate::error::{Av1Error, Result};
use crate::types::{Plane, MAX_PLANES, MAX_SEGMENTS, MODE_INFO_SIZE_LOG2};

/// Maximum quantizer index.
pub const MAX_QINDEX: i32 = 255;

/// Quantization matrix level meaning "no matrix".
pub const FLAT_QM_LEVEL: u8 = 15;

/// Number of segmentation features.
pub const SEG_LVL_MAX: usize = 8;

/// Maximum tile width in pixels.
pub const MAX_TILE_WIDTH: u32 = 4096;

/// Maximum tile area in pixels.
pub const MAX_TILE_AREA: u32 = 4096 * 2304;

/// Maximum number of tile columns or rows.
pub const MAX_TILE_COUNT: u32 = 64;

/// Sequence header fields used by frame reconstruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceHeader {
    /// Log2 of the superblock size in pixels (6 or 7).
    pub sb_size_log2: u8,
    /// Bit depth (8, 10 or 12).
    pub bit_depth: u8,
    /// Monochrome stream (luma only).
    pub monochrome: bool,
    /// Horizontal chroma subsampling.
    pub subsampling_x: bool,
    /// Vertical chroma subsampling.
    pub subsampling_y: bool,
}

impl Default for SequenceHeader {
    fn default() -> Self {
        Self {
            sb_size_log2: 6,
            bit_depth: 8,
            monochrome: false,
            subsampling_x: true,
            subsampling_y: true,
        }
    }
}

impl SequenceHeader {
    /// Number of coded planes.
    pub const fn plane_count(&self) -> usize {
        if self.monochrome {
            1
        } else {
            MAX_PLANES
        }
    }

    /// Log2 of the superblock size in mode-info units.
    ///
    /// Sizes outside 64..=128 pixels saturate to the nearest legal size;
    /// `validate` reports them.
    pub const fn sb_mi_log2(&self) -> u32 {
        let log2 = if self.sb_size_log2 < 6 {
            6
        } else if self.sb_size_log2 > 7 {
            7
        } else {
            self.sb_size_log2
        };
        log2 as u32 - MODE_INFO_SIZE_LOG2
    }

    /// Superblock size in mode-info units.
    pub const fn sb_mi_size(&self) -> u32 {
        1 << self.sb_mi_log2()
    }

    /// Superblock size in pixels.
    pub const fn sb_size(&self) -> u32 {
        1 << (self.sb_mi_log2() + MODE_INFO_SIZE_LOG2)
    }

    /// Subsampling shifts `(x, y)` for a plane.
    pub const fn subsampling(&self, plane: Plane) -> (u32, u32) {
        if plane.is_chroma() {
            (self.subsampling_x as u32, self.subsampling_y as u32)
        } else {
            (0, 0)
        }
    }

    /// Validate the sequence header.
    pub fn validate(&self) -> Result<()> {
        if self.sb_size_log2 != 6 && self.sb_size_log2 != 7 {
            return Err(Av1Error::UnsupportedSuperblockSize(self.sb_size_log2));
        }
        if !matches!(self.bit_depth, 8 | 10 | 12) {
            return Err(Av1Error::UnsupportedBitDepth(self.bit_depth));
        }
        Ok(())
    }
}

/// Tile geometry in mode-info units.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TileInfo {
    /// Number of tile columns.
    pub column_count: u32,
    /// Number of tile rows.
    pub row_count: u32,
    /// Start column of each tile column, plus the frame width (count + 1 entries).
    pub column_start_mi: Vec<u32>,
    /// Start row of each tile row, plus the frame height (count + 1 entries).
    pub row_start_mi: Vec<u32>,
}

impl TileInfo {
    /// Single tile covering the whole frame.
    pub fn single(mi_columns: u32, mi_rows: u32) -> Self {
        Self {
            column_count: 1,
            row_count: 1,
            column_start_mi: vec![0, mi_columns],
            row_start_mi: vec![0, mi_rows],
        }
    }

    /// Uniformly spaced tiles, as signalled by `uniform_tile_spacing_flag`.
    ///
    /// The requested log2 counts are the values read from the bitstream; the
    /// resulting tile count can be smaller when the frame is narrow.
    pub fn uniform(
        mi_columns: u32,
        mi_rows: u32,
        sb_mi_log2: u32,
        columns_log2: u32,
        rows_log2: u32,
    ) -> Result<Self> {
        if !(4..=5).contains(&sb_mi_log2) {
            return Err(Av1Error::invalid_tile_info(format!(
                "superblock log2 {} in mode-info units outside 4..=5",
                sb_mi_log2
            )));
        }
        let max_log2 = MAX_TILE_COUNT.trailing_zeros();
        if columns_log2 > max_log2 || rows_log2 > max_log2 {
            return Err(Av1Error::invalid_tile_info(format!(
                "tile log2 counts {}x{} exceed {}",
                columns_log2, rows_log2, max_log2
            )));
        }
        let sb_columns = (mi_columns + (1 << sb_mi_log2) - 1) >> sb_mi_log2;
        let sb_rows = (mi_rows + (1 << sb_mi_log2) - 1) >> sb_mi_log2;
        let sb_size_log2 = sb_mi_log2 + MODE_INFO_SIZE_LOG2;
        let max_tile_width_sb = MAX_TILE_WIDTH >> sb_size_log2;
        let max_tile_height_sb = (MAX_TILE_AREA / MAX_TILE_WIDTH) >> sb_size_log2;

        let tile_width_sb = (sb_columns + (1 << columns_log2) - 1) >> columns_log2;
        if tile_width_sb == 0 || tile_width_sb > max_tile_width_sb {
            return Err(Av1Error::invalid_tile_info(format!(
                "tile width {} superblocks outside 1..={}",
                tile_width_sb, max_tile_width_sb
            )));
        }
        let tile_height_sb = (sb_rows + (1 << rows_log2) - 1) >> rows_log2;
        if tile_height_sb == 0 || tile_height_sb > max_tile_height_sb {
            return Err(Av1Error::invalid_tile_info(format!(
                "tile height {} superblocks outside 1..={}",
                tile_height_sb, max_tile_height_sb
            )));
        }

        let column_start_mi = uniform_starts(sb_columns, tile_width_sb, sb_mi_log2, mi_columns);
        let row_start_mi = uniform_starts(sb_rows, tile_height_sb, sb_mi_log2, mi_rows);

        Ok(Self {
            column_count: column_start_mi.len() as u32 - 1,
            row_count: row_start_mi.len() as u32 - 1,
            column_start_mi,
            row_start_mi,
        })
    }

    /// Total number of tiles.
    pub fn tile_count(&self) -> u32 {
        self.column_count * self.row_count
    }

    /// Validate the boundary arrays against the frame extent.
    ///
    /// Boundaries must start at 0, be strictly increasing, end at the frame
    /// extent, and every interior boundary must sit on a superblock edge.
    pub fn validate(&self, mi_columns: u32, mi_rows: u32, sb_mi_log2: u32) -> Result<()> {
        if self.column_count == 0 || self.row_count == 0 {
            return Err(Av1Error::invalid_tile_info("tile count must be at least 1"));
        }
        if self.column_count > MAX_TILE_COUNT || self.row_count > MAX_TILE_COUNT {
            return Err(Av1Error::invalid_tile_info(format!(
                "{}x{} tiles exceeds {} per dimension",
                self.column_count, self.row_count, MAX_TILE_COUNT
            )));
        }
        validate_starts("column", &self.column_start_mi, self.column_count, mi_columns, sb_mi_log2)?;
        validate_starts("row", &self.row_start_mi, self.row_count, mi_rows, sb_mi_log2)
    }
}

fn uniform_starts(sb_count: u32, step_sb: u32, sb_mi_log2: u32, mi_extent: u32) -> Vec<u32> {
    let mut starts: Vec<u32> = (0..sb_count)
        .step_by(step_sb as usize)
        .map(|sb| sb << sb_mi_log2)
        .collect();
    starts.push(mi_extent);
    starts
}

fn validate_starts(
    axis: &str,
    starts: &[u32],
    count: u32,
    mi_extent: u32,
    sb_mi_log2: u32,
) -> Result<()> {
    if starts.len() != count as usize + 1 {
        return Err(Av1Error::invalid_tile_info(format!(
            "{} boundary array has {} entries, expected {}",
            axis,
            starts.len(),
            count + 1
        )));
    }
    if starts[0] != 0 {
        return Err(Av1Error::invalid_tile_info(format!(
            "first {} boundary is {}, expected 0",
            axis, starts[0]
        )));
    }
    if starts[starts.len() - 1] != mi_extent {
        return Err(Av1Error::invalid_tile_info(format!(
            "last {} boundary is {}, expected {}",
            axis,
            starts[starts.len() - 1],
            mi_extent
        )));
    }
    for pair in starts.windows(2) {
        if pair[1] <= pair[0] {
            return Err(Av1Error::invalid_tile_info(format!(
                "{} boundaries not strictly increasing at {}",
                axis, pair[1]
            )));
        }
    }
    let sb_mask = (1u32 << sb_mi_log2) - 1;
    if let Some(start) = starts[1..starts.len() - 1].iter().find(|s| *s & sb_mask != 0) {
        return Err(Av1Error::invalid_tile_info(format!(
            "{} boundary {} is not superblock aligned",
            axis, start
        )));
    }
    Ok(())
}

/// Quantization parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizationParams {
    /// Base quantizer index (0-255).
    pub base_q_idx: u8,
    /// Per-plane DC delta.
    pub delta_q_dc: [i8; MAX_PLANES],
    /// Per-plane AC delta (luma AC delta is always 0 in the bitstream).
    pub delta_q_ac: [i8; MAX_PLANES],
    /// Quantization matrices enabled.
    pub using_qmatrix: bool,
    /// Per-plane quantization matrix level (0-15).
    pub qm_level: [u8; MAX_PLANES],
}

impl Default for QuantizationParams {
    fn default() -> Self {
        Self {
            base_q_idx: 0,
            delta_q_dc: [0; MAX_PLANES],
            delta_q_ac: [0; MAX_PLANES],
            using_qmatrix: false,
            qm_level: [FLAT_QM_LEVEL; MAX_PLANES],
        }
    }
}

impl QuantizationParams {
    /// Whether every DC and AC delta is zero.
    pub fn deltas_are_zero(&self) -> bool {
        self.delta_q_dc.iter().chain(self.delta_q_ac.iter()).all(|d| *d == 0)
    }

    /// Validate quantization parameters.
    pub fn validate(&self) -> Result<()> {
        if let Some(level) = self.qm_level.iter().find(|l| **l > FLAT_QM_LEVEL) {
            return Err(Av1Error::InvalidQuantization(format!(
                "quantization matrix level {} exceeds {}",
                level, FLAT_QM_LEVEL
            )));
        }
        Ok(())
    }
}

/// Segmentation features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SegmentFeature {
    /// Alternative quantizer index.
    AltQ = 0,
    /// Alternative vertical luma loop filter level.
    AltLoopFilterYVertical = 1,
    /// Alternative horizontal luma loop filter level.
    AltLoopFilterYHorizontal = 2,
    /// Alternative U loop filter level.
    AltLoopFilterU = 3,
    /// Alternative V loop filter level.
    AltLoopFilterV = 4,
    /// Reference frame.
    RefFrame = 5,
    /// Skip.
    Skip = 6,
    /// Global motion.
    GlobalMv = 7,
}

/// Segmentation parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentationParams {
    /// Segmentation enabled.
    pub enabled: bool,
    /// Segment feature enabled.
    pub feature_enabled: [[bool; SEG_LVL_MAX]; MAX_SEGMENTS],
    /// Segment feature data.
    pub feature_data: [[i16; SEG_LVL_MAX]; MAX_SEGMENTS],
}

impl SegmentationParams {
    /// Set a feature value for a segment and mark it enabled.
    pub fn set_feature(&mut self, segment: usize, feature: SegmentFeature, value: i16) -> Result<()> {
        if segment >= MAX_SEGMENTS {
            return Err(Av1Error::SegmentOutOfRange(segment.min(u8::MAX as usize) as u8));
        }
        self.feature_enabled[segment][feature as usize] = true;
        self.feature_data[segment][feature as usize] = value;
        Ok(())
    }

    /// Whether a feature is active for a segment. Unknown segments have no features.
    pub fn is_feature_active(&self, segment: usize, feature: SegmentFeature) -> bool {
        self.enabled
            && self
                .feature_enabled
                .get(segment)
                .is_some_and(|features| features[feature as usize])
    }

    /// Effective quantizer index of a segment for the given base index.
    pub fn qindex(&self, segment: usize, base_q_idx: i32) -> i32 {
        if self.is_feature_active(segment, SegmentFeature::AltQ) {
            let data = self.feature_data[segment][SegmentFeature::AltQ as usize] as i32;
            (base_q_idx + data).clamp(0, MAX_QINDEX)
        } else {
            base_q_idx
        }
    }
}

/// Superblock delta-Q parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeltaQParams {
    /// Superblocks carry a quantizer index override.
    pub present: bool,
    /// Log2 of the delta-Q resolution.
    pub resolution_log2: u8,
}

/// Loop filter parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopFilterParams {
    /// Filter levels: luma vertical, luma horizontal, U, V.
    pub levels: [u8; 4],
    /// Sharpness (0-7).
    pub sharpness: u8,
}

impl LoopFilterParams {
    /// Whether any luma filter level is non-zero.
    pub fn is_enabled(&self) -> bool {
        self.levels[0] != 0 || self.levels[1] != 0
    }
}

/// CDEF parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CdefParams {
    /// Number of bits for the per-block strength index.
    pub bits: u8,
    /// Luma strengths.
    pub y_strengths: [u8; 8],
    /// Chroma strengths.
    pub uv_strengths: [u8; 8],
}

impl CdefParams {
    /// Whether the parameters describe a non-trivial filter.
    pub fn is_enabled(&self) -> bool {
        self.bits != 0 || self.y_strengths[0] != 0 || self.uv_strengths[0] != 0
    }
}

/// Loop restoration type of a plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RestorationType {
    /// No restoration.
    #[default]
    None,
    /// Wiener filter.
    Wiener,
    /// Self-guided filter.
    SgrProj,
    /// Per-unit choice.
    Switchable,
}

/// Super-resolution parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SuperResParams {
    /// Super-resolution enabled.
    pub enabled: bool,
    /// Width after upscaling.
    pub upscaled_width: u32,
}

/// Frame header fields used by frame reconstruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Intra block copy allowed (disables all in-loop filters).
    pub allow_intrabc: bool,
    /// Tile geometry.
    pub tile_info: TileInfo,
    /// Quantization parameters.
    pub quantization: QuantizationParams,
    /// Segmentation parameters.
    pub segmentation: SegmentationParams,
    /// Delta-Q parameters.
    pub delta_q: DeltaQParams,
    /// Lossless flag per segment.
    pub lossless: [bool; MAX_SEGMENTS],
    /// Loop filter parameters.
    pub loop_filter: LoopFilterParams,
    /// CDEF parameters.
    pub cdef: CdefParams,
    /// Super-resolution parameters.
    pub super_res: SuperResParams,
    /// Loop restoration type per plane.
    pub restoration: [RestorationType; MAX_PLANES],
}

impl Default for FrameHeader {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            allow_intrabc: false,
            tile_info: TileInfo::default(),
            quantization: QuantizationParams::default(),
            segmentation: SegmentationParams::default(),
            delta_q: DeltaQParams::default(),
            lossless: [false; MAX_SEGMENTS],
            loop_filter: LoopFilterParams::default(),
            cdef: CdefParams::default(),
            super_res: SuperResParams::default(),
            restoration: [RestorationType::None; MAX_PLANES],
        }
    }
}

impl FrameHeader {
    /// Create a single-tile frame header for the given dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        let mut header = Self {
            width,
            height,
            ..Self::default()
        };
        header.tile_info = TileInfo::single(header.mi_columns(), header.mi_rows());
        header
    }

    /// Frame width in mode-info units (always a multiple of 2).
    pub const fn mi_columns(&self) -> u32 {
        2 * ((self.width + 7) >> 3)
    }

    /// Frame height in mode-info units (always a multiple of 2).
    pub const fn mi_rows(&self) -> u32 {
        2 * ((self.height + 7) >> 3)
    }

    /// Frame width in superblocks.
    pub fn sb_columns(&self, sequence: &SequenceHeader) -> u32 {
        let log2 = sequence.sb_mi_log2();
        (self.mi_columns() + (1 << log2) - 1) >> log2
    }

    /// Frame height in superblocks.
    pub fn sb_rows(&self, sequence: &SequenceHeader) -> u32 {
        let log2 = sequence.sb_mi_log2();
        (self.mi_rows() + (1 << log2) - 1) >> log2
    }

    /// Effective quantizer index of a segment at frame level.
    pub fn segment_qindex(&self, segment: usize) -> i32 {
        self.segmentation
            .qindex(segment, self.quantization.base_q_idx as i32)
    }

    /// Recompute the per-segment lossless flags from the quantizer setup.
    pub fn derive_lossless(&mut self) {
        let deltas_zero = self.quantization.deltas_are_zero();
        for segment in 0..MAX_SEGMENTS {
            self.lossless[segment] = deltas_zero && self.segment_qindex(segment) == 0;
        }
    }

    /// Every segment is lossless.
    pub fn coded_lossless(&self) -> bool {
        self.lossless.iter().all(|l| *l)
    }

    /// Coded lossless and not upscaled.
    pub fn all_lossless(&self) -> bool {
        self.coded_lossless() && (!self.super_res.enabled || self.super_res.upscaled_width == self.width)
    }

    /// Whether the header asks for the loop filter pass.
    pub fn do_loop_filter(&self) -> bool {
        !self.allow_intrabc && self.loop_filter.is_enabled()
    }

    /// Whether the header asks for CDEF.
    pub fn do_cdef(&self) -> bool {
        !self.allow_intrabc && !self.coded_lossless() && self.cdef.is_enabled()
    }

    /// Whether the header asks for super-resolution upscaling.
    pub fn do_super_res(&self) -> bool {
        self.super_res.enabled && self.super_res.upscaled_width != self.width
    }

    /// Whether the header asks for loop restoration.
    pub fn do_loop_restoration(&self) -> bool {
        !self.allow_intrabc && self.restoration.iter().any(|r| *r != RestorationType::None)
    }

    /// Validate the frame header against the sequence header.
    pub fn validate(&self, sequence: &SequenceHeader) -> Result<()> {
        sequence.validate()?;
        if self.width == 0 || self.height == 0 {
            return Err(Av1Error::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        self.quantization.validate()?;
        self.tile_info
            .validate(self.mi_columns(), self.mi_rows(), sequence.sb_mi_log2())
    }
}
