//! AV1 block, transform and plane enumerations.
//!
//! This module defines the small value types shared by the header model,
//! the frame layout and the inverse quantizer:
//! - Color planes
//! - Block sizes (4x4 through 128x128, including 4:1 shapes)
//! - Transform sizes and their coefficient geometry
//! - Transform types and classes
//! - Mode-info positions

use crate::error::{Av1Error, Result};

/// Log2 of the mode-info unit size in pixels.
pub const MODE_INFO_SIZE_LOG2: u32 = 2;

/// Maximum number of segments.
pub const MAX_SEGMENTS: usize = 8;

/// Maximum number of color planes.
pub const MAX_PLANES: usize = 3;

/// Color plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Plane {
    /// Luma.
    Y = 0,
    /// Blue-difference chroma.
    U = 1,
    /// Red-difference chroma.
    V = 2,
}

impl Plane {
    /// All planes in coding order.
    pub const ALL: [Plane; 3] = [Plane::Y, Plane::U, Plane::V];

    /// Plane index (0..3).
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Create from a plane index.
    pub fn from_index(index: usize) -> Result<Self> {
        match index {
            0 => Ok(Self::Y),
            1 => Ok(Self::U),
            2 => Ok(Self::V),
            _ => Err(Av1Error::PlaneOutOfRange(index)),
        }
    }

    /// Whether this is a chroma plane.
    pub const fn is_chroma(self) -> bool {
        !matches!(self, Self::Y)
    }

    /// Quantization matrix plane class (0 for luma, 1 for chroma).
    pub const fn matrix_class(self) -> usize {
        if self.is_chroma() {
            1
        } else {
            0
        }
    }
}

/// AV1 block sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum BlockSize {
    /// 4x4 block.
    Block4x4 = 0,
    /// 4x8 block.
    Block4x8 = 1,
    /// 8x4 block.
    Block8x4 = 2,
    /// 8x8 block.
    Block8x8 = 3,
    /// 8x16 block.
    Block8x16 = 4,
    /// 16x8 block.
    Block16x8 = 5,
    /// 16x16 block.
    Block16x16 = 6,
    /// 16x32 block.
    Block16x32 = 7,
    /// 32x16 block.
    Block32x16 = 8,
    /// 32x32 block.
    Block32x32 = 9,
    /// 32x64 block.
    Block32x64 = 10,
    /// 64x32 block.
    Block64x32 = 11,
    /// 64x64 block.
    Block64x64 = 12,
    /// 64x128 block.
    Block64x128 = 13,
    /// 128x64 block.
    Block128x64 = 14,
    /// 128x128 block.
    Block128x128 = 15,
    /// 4x16 block.
    Block4x16 = 16,
    /// 16x4 block.
    Block16x4 = 17,
    /// 8x32 block.
    Block8x32 = 18,
    /// 32x8 block.
    Block32x8 = 19,
    /// 16x64 block.
    Block16x64 = 20,
    /// 64x16 block.
    Block64x16 = 21,
}

impl BlockSize {
    /// Get log2 of the block width.
    pub const fn width_log2(&self) -> u32 {
        match self {
            Self::Block4x4 | Self::Block4x8 | Self::Block4x16 => 2,
            Self::Block8x4 | Self::Block8x8 | Self::Block8x16 | Self::Block8x32 => 3,
            Self::Block16x4
            | Self::Block16x8
            | Self::Block16x16
            | Self::Block16x32
            | Self::Block16x64 => 4,
            Self::Block32x8 | Self::Block32x16 | Self::Block32x32 | Self::Block32x64 => 5,
            Self::Block64x16
            | Self::Block64x32
            | Self::Block64x64
            | Self::Block64x128 => 6,
            Self::Block128x64 | Self::Block128x128 => 7,
        }
    }

    /// Get log2 of the block height.
    pub const fn height_log2(&self) -> u32 {
        match self {
            Self::Block4x4 | Self::Block8x4 | Self::Block16x4 => 2,
            Self::Block4x8 | Self::Block8x8 | Self::Block16x8 | Self::Block32x8 => 3,
            Self::Block4x16
            | Self::Block8x16
            | Self::Block16x16
            | Self::Block32x16
            | Self::Block64x16 => 4,
            Self::Block8x32 | Self::Block16x32 | Self::Block32x32 | Self::Block64x32 => 5,
            Self::Block16x64
            | Self::Block32x64
            | Self::Block64x64
            | Self::Block128x64 => 6,
            Self::Block64x128 | Self::Block128x128 => 7,
        }
    }

    /// Get the width of this block size.
    pub const fn width(&self) -> u32 {
        1 << self.width_log2()
    }

    /// Get the height of this block size.
    pub const fn height(&self) -> u32 {
        1 << self.height_log2()
    }

    /// Get width in mode info units (4x4).
    pub const fn mi_width(&self) -> u32 {
        self.width() >> MODE_INFO_SIZE_LOG2
    }

    /// Get height in mode info units (4x4).
    pub const fn mi_height(&self) -> u32 {
        self.height() >> MODE_INFO_SIZE_LOG2
    }

    /// Check if this is a square block.
    pub const fn is_square(&self) -> bool {
        self.width_log2() == self.height_log2()
    }

    /// Square block size covering a whole superblock of the given log2 size.
    pub fn superblock(sb_size_log2: u8) -> Result<Self> {
        match sb_size_log2 {
            6 => Ok(Self::Block64x64),
            7 => Ok(Self::Block128x128),
            other => Err(Av1Error::UnsupportedSuperblockSize(other)),
        }
    }
}

/// Number of transform sizes.
pub const TX_SIZES_ALL: usize = 19;

/// AV1 transform sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TransformSize {
    /// 4x4 transform.
    Tx4x4 = 0,
    /// 8x8 transform.
    Tx8x8 = 1,
    /// 16x16 transform.
    Tx16x16 = 2,
    /// 32x32 transform.
    Tx32x32 = 3,
    /// 64x64 transform.
    Tx64x64 = 4,
    /// 4x8 transform.
    Tx4x8 = 5,
    /// 8x4 transform.
    Tx8x4 = 6,
    /// 8x16 transform.
    Tx8x16 = 7,
    /// 16x8 transform.
    Tx16x8 = 8,
    /// 16x32 transform.
    Tx16x32 = 9,
    /// 32x16 transform.
    Tx32x16 = 10,
    /// 32x64 transform.
    Tx32x64 = 11,
    /// 64x32 transform.
    Tx64x32 = 12,
    /// 4x16 transform.
    Tx4x16 = 13,
    /// 16x4 transform.
    Tx16x4 = 14,
    /// 8x32 transform.
    Tx8x32 = 15,
    /// 32x8 transform.
    Tx32x8 = 16,
    /// 16x64 transform.
    Tx16x64 = 17,
    /// 64x16 transform.
    Tx64x16 = 18,
}

impl TransformSize {
    /// All transform sizes in index order.
    pub const ALL: [TransformSize; TX_SIZES_ALL] = [
        Self::Tx4x4,
        Self::Tx8x8,
        Self::Tx16x16,
        Self::Tx32x32,
        Self::Tx64x64,
        Self::Tx4x8,
        Self::Tx8x4,
        Self::Tx8x16,
        Self::Tx16x8,
        Self::Tx16x32,
        Self::Tx32x16,
        Self::Tx32x64,
        Self::Tx64x32,
        Self::Tx4x16,
        Self::Tx16x4,
        Self::Tx8x32,
        Self::Tx32x8,
        Self::Tx16x64,
        Self::Tx64x16,
    ];

    /// Transform size index (0..19).
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Get log2 of the transform width.
    pub const fn width_log2(self) -> u32 {
        match self {
            Self::Tx4x4 | Self::Tx4x8 | Self::Tx4x16 => 2,
            Self::Tx8x8 | Self::Tx8x4 | Self::Tx8x16 | Self::Tx8x32 => 3,
            Self::Tx16x16 | Self::Tx16x8 | Self::Tx16x32 | Self::Tx16x4 | Self::Tx16x64 => 4,
            Self::Tx32x32 | Self::Tx32x16 | Self::Tx32x64 | Self::Tx32x8 => 5,
            Self::Tx64x64 | Self::Tx64x32 | Self::Tx64x16 => 6,
        }
    }

    /// Get log2 of the transform height.
    pub const fn height_log2(self) -> u32 {
        match self {
            Self::Tx4x4 | Self::Tx8x4 | Self::Tx16x4 => 2,
            Self::Tx8x8 | Self::Tx4x8 | Self::Tx16x8 | Self::Tx32x8 => 3,
            Self::Tx16x16 | Self::Tx8x16 | Self::Tx32x16 | Self::Tx4x16 | Self::Tx64x16 => 4,
            Self::Tx32x32 | Self::Tx16x32 | Self::Tx64x32 | Self::Tx8x32 => 5,
            Self::Tx64x64 | Self::Tx32x64 | Self::Tx16x64 => 6,
        }
    }

    /// Transform width in samples.
    pub const fn width(self) -> usize {
        1 << self.width_log2()
    }

    /// Transform height in samples.
    pub const fn height(self) -> usize {
        1 << self.height_log2()
    }

    /// Total number of samples covered by the transform.
    pub const fn pels(self) -> usize {
        self.width() * self.height()
    }

    /// Width of the coded coefficient region (64 collapses to 32).
    pub const fn coded_width(self) -> usize {
        let w = self.width();
        if w > 32 {
            32
        } else {
            w
        }
    }

    /// Height of the coded coefficient region (64 collapses to 32).
    pub const fn coded_height(self) -> usize {
        let h = self.height();
        if h > 32 {
            32
        } else {
            h
        }
    }

    /// Number of coefficients that can be coded for this transform.
    pub const fn coded_area(self) -> usize {
        self.coded_width() * self.coded_height()
    }

    /// Size whose quantization matrix this transform shares.
    pub const fn adjusted(self) -> Self {
        match self {
            Self::Tx64x64 | Self::Tx32x64 | Self::Tx64x32 => Self::Tx32x32,
            Self::Tx16x64 => Self::Tx16x32,
            Self::Tx64x16 => Self::Tx32x16,
            other => other,
        }
    }

    /// Right shift applied to dequantized magnitudes.
    pub const fn scale(self) -> u32 {
        let pels = self.pels();
        (pels > 256) as u32 + (pels > 1024) as u32
    }
}

/// AV1 transform types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum TransformType {
    /// DCT in both directions.
    #[default]
    DctDct = 0,
    /// ADST vertically, DCT horizontally.
    AdstDct = 1,
    /// DCT vertically, ADST horizontally.
    DctAdst = 2,
    /// ADST in both directions.
    AdstAdst = 3,
    /// Flipped ADST vertically, DCT horizontally.
    FlipAdstDct = 4,
    /// DCT vertically, flipped ADST horizontally.
    DctFlipAdst = 5,
    /// Flipped ADST in both directions.
    FlipAdstFlipAdst = 6,
    /// ADST vertically, flipped ADST horizontally.
    AdstFlipAdst = 7,
    /// Flipped ADST vertically, ADST horizontally.
    FlipAdstAdst = 8,
    /// Identity in both directions.
    Identity = 9,
    /// DCT vertically, identity horizontally.
    VerticalDct = 10,
    /// Identity vertically, DCT horizontally.
    HorizontalDct = 11,
    /// ADST vertically, identity horizontally.
    VerticalAdst = 12,
    /// Identity vertically, ADST horizontally.
    HorizontalAdst = 13,
    /// Flipped ADST vertically, identity horizontally.
    VerticalFlipAdst = 14,
    /// Identity vertically, flipped ADST horizontally.
    HorizontalFlipAdst = 15,
}

/// Transform class, which selects the scan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformClass {
    /// Two-dimensional (including identity).
    TwoD,
    /// One-dimensional transform along rows.
    Horizontal,
    /// One-dimensional transform along columns.
    Vertical,
}

impl TransformType {
    /// Create from the raw type index.
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::DctDct,
            1 => Self::AdstDct,
            2 => Self::DctAdst,
            3 => Self::AdstAdst,
            4 => Self::FlipAdstDct,
            5 => Self::DctFlipAdst,
            6 => Self::FlipAdstFlipAdst,
            7 => Self::AdstFlipAdst,
            8 => Self::FlipAdstAdst,
            9 => Self::Identity,
            10 => Self::VerticalDct,
            11 => Self::HorizontalDct,
            12 => Self::VerticalAdst,
            13 => Self::HorizontalAdst,
            14 => Self::VerticalFlipAdst,
            15 => Self::HorizontalFlipAdst,
            _ => return None,
        })
    }

    /// Whether quantization matrices apply (every type before identity).
    pub const fn uses_matrix(self) -> bool {
        (self as u8) < (Self::Identity as u8)
    }

    /// Transform class of this type.
    pub const fn class(self) -> TransformClass {
        match self {
            Self::VerticalDct | Self::VerticalAdst | Self::VerticalFlipAdst => {
                TransformClass::Vertical
            }
            Self::HorizontalDct | Self::HorizontalAdst | Self::HorizontalFlipAdst => {
                TransformClass::Horizontal
            }
            _ => TransformClass::TwoD,
        }
    }
}

/// Position in mode-info units (4x4 luma samples).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ModeInfoPosition {
    /// Mode-info row.
    pub row: u32,
    /// Mode-info column.
    pub column: u32,
}

impl ModeInfoPosition {
    /// Create a new position.
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// Offset this position by another one.
    pub const fn offset(self, other: ModeInfoPosition) -> Self {
        Self {
            row: self.row + other.row,
            column: self.column + other.column,
        }
    }

    /// Luma pixel coordinates `(x, y)` of this position.
    pub const fn to_pixels(self) -> (u32, u32) {
        (
            self.column << MODE_INFO_SIZE_LOG2,
            self.row << MODE_INFO_SIZE_LOG2,
        )
    }
}
