//! Resolved frame layout.
//!
//! Upstream partition parsing produces, for every superblock, the flat list
//! of blocks it contains along with their mode info, transform units and
//! quantized levels. The reconstruction stages only read this data.

use crate::error::{Av1Error, Result};
use crate::header::{FrameHeader, SequenceHeader};
use crate::types::{BlockSize, ModeInfoPosition, Plane, TransformSize, TransformType, MAX_PLANES};

/// One transform unit of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformUnit {
    /// Transform size.
    pub size: TransformSize,
    /// Transform type.
    pub tx_type: TransformType,
    /// Offset from the block origin in 4x4 units of the plane.
    pub offset: ModeInfoPosition,
    /// Coded block flag (the unit carries coefficients).
    pub coded: bool,
}

impl TransformUnit {
    /// Create a coded transform unit.
    pub fn new(size: TransformSize, tx_type: TransformType, offset: ModeInfoPosition) -> Self {
        Self {
            size,
            tx_type,
            offset,
            coded: true,
        }
    }

    /// Mark the unit as carrying no coefficients.
    pub fn uncoded(mut self) -> Self {
        self.coded = false;
        self
    }
}

/// Mode info of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockModeInfo {
    /// Block size.
    pub block_size: BlockSize,
    /// Segment id (0-7).
    pub segment_id: u8,
    /// Skip residual flag.
    pub skip: bool,
    /// Whether the block carries chroma.
    pub has_chroma: bool,
    /// Transform units per plane, in coding order.
    pub transform_units: [Vec<TransformUnit>; MAX_PLANES],
}

impl BlockModeInfo {
    /// Create mode info with no transform units.
    pub fn new(block_size: BlockSize, segment_id: u8) -> Self {
        Self {
            block_size,
            segment_id,
            skip: false,
            has_chroma: true,
            transform_units: Default::default(),
        }
    }

    /// Append a transform unit to a plane.
    pub fn with_transform_unit(mut self, plane: Plane, unit: TransformUnit) -> Self {
        self.transform_units[plane.index()].push(unit);
        self
    }

    /// Set the skip flag.
    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    /// Set whether the block carries chroma.
    pub fn with_chroma(mut self, has_chroma: bool) -> Self {
        self.has_chroma = has_chroma;
        self
    }

    /// Transform units of a plane.
    pub fn units(&self, plane: Plane) -> &[TransformUnit] {
        &self.transform_units[plane.index()]
    }
}

/// A block placed inside a superblock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    /// Offset from the superblock origin in mode-info units.
    pub offset: ModeInfoPosition,
    /// Mode info.
    pub mode: BlockModeInfo,
}

impl BlockInfo {
    /// Create a block.
    pub fn new(offset: ModeInfoPosition, mode: BlockModeInfo) -> Self {
        Self { offset, mode }
    }

    /// Block size.
    pub fn size(&self) -> BlockSize {
        self.mode.block_size
    }
}

/// Superblock coordinate in superblock units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct SuperblockPosition {
    /// Superblock row.
    pub row: u32,
    /// Superblock column.
    pub column: u32,
}

impl SuperblockPosition {
    /// Create a position.
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// Mode-info position of the superblock origin.
    pub const fn origin(self, sb_mi_log2: u32) -> ModeInfoPosition {
        ModeInfoPosition::new(self.row << sb_mi_log2, self.column << sb_mi_log2)
    }
}

/// Resolved data of one superblock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperblockInfo {
    /// Grid position.
    pub position: SuperblockPosition,
    /// Blocks in coding order.
    pub blocks: Vec<BlockInfo>,
    /// Quantizer index after applying the superblock delta-Q.
    pub qindex: i32,
    /// Quantized levels per plane, one run per coded transform unit.
    ///
    /// Each run starts with the coefficient count followed by the levels in
    /// scan order.
    pub coefficients: [Vec<i32>; MAX_PLANES],
}

impl SuperblockInfo {
    /// Create an empty superblock.
    pub fn new(position: SuperblockPosition, qindex: i32) -> Self {
        Self {
            position,
            blocks: Vec::new(),
            qindex,
            coefficients: Default::default(),
        }
    }

    /// Append a block.
    pub fn with_block(mut self, block: BlockInfo) -> Self {
        self.blocks.push(block);
        self
    }

    /// Append one coefficient run to a plane.
    pub fn with_coefficients(mut self, plane: Plane, levels: &[i32]) -> Self {
        self.coefficients[plane.index()].push(levels.len() as i32);
        self.coefficients[plane.index()].extend_from_slice(levels);
        self
    }

    /// Number of blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Quantized level runs of a plane.
    pub fn plane_coefficients(&self, plane: Plane) -> &[i32] {
        &self.coefficients[plane.index()]
    }
}

/// Lookup from superblock coordinate to resolved superblock data.
#[derive(Debug, Clone, Default)]
pub struct FrameLayout {
    sb_columns: u32,
    sb_rows: u32,
    superblocks: Vec<Option<SuperblockInfo>>,
}

impl FrameLayout {
    /// Create an empty layout sized for the frame.
    pub fn new(sequence: &SequenceHeader, frame: &FrameHeader) -> Self {
        let sb_columns = frame.sb_columns(sequence);
        let sb_rows = frame.sb_rows(sequence);
        Self {
            sb_columns,
            sb_rows,
            superblocks: vec![None; (sb_columns * sb_rows) as usize],
        }
    }

    /// Create a layout with every superblock produced by `f`.
    pub fn filled<F>(sequence: &SequenceHeader, frame: &FrameHeader, mut f: F) -> Self
    where
        F: FnMut(SuperblockPosition) -> SuperblockInfo,
    {
        let mut layout = Self::new(sequence, frame);
        for row in 0..layout.sb_rows {
            for column in 0..layout.sb_columns {
                let index = (row * layout.sb_columns + column) as usize;
                layout.superblocks[index] = Some(f(SuperblockPosition::new(row, column)));
            }
        }
        layout
    }

    /// Grid width in superblocks.
    pub fn sb_columns(&self) -> u32 {
        self.sb_columns
    }

    /// Grid height in superblocks.
    pub fn sb_rows(&self) -> u32 {
        self.sb_rows
    }

    fn index(&self, row: u32, column: u32) -> Option<usize> {
        (row < self.sb_rows && column < self.sb_columns)
            .then(|| (row * self.sb_columns + column) as usize)
    }

    /// Store a superblock at its own position.
    pub fn insert(&mut self, superblock: SuperblockInfo) -> Result<()> {
        let SuperblockPosition { row, column } = superblock.position;
        let index = self
            .index(row, column)
            .ok_or(Av1Error::MissingSuperblock { row, column })?;
        self.superblocks[index] = Some(superblock);
        Ok(())
    }

    /// Superblocks present in the layout, in raster order.
    pub fn superblocks(&self) -> impl Iterator<Item = &SuperblockInfo> {
        self.superblocks.iter().flatten()
    }

    /// Superblock at a grid coordinate.
    pub fn get(&self, row: u32, column: u32) -> Result<&SuperblockInfo> {
        self.index(row, column)
            .and_then(|i| self.superblocks[i].as_ref())
            .ok_or(Av1Error::MissingSuperblock { row, column })
    }
}
