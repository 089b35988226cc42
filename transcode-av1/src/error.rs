//! AV1 reconstruction error types.
//!
//! Errors fall into three groups: header/layout precondition violations
//! detected before any block is touched, buffer contract violations at the
//! inverse quantizer boundary, and failures reported by external stages
//! (block reconstruction, post filters). None of them is retried.

use thiserror::Error;

/// Errors raised while reconstructing an AV1 frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Av1Error {
    /// Tile boundaries are inconsistent with the frame extent.
    #[error("Invalid tile info: {0}")]
    InvalidTileInfo(String),

    /// Invalid quantization parameters.
    #[error("Invalid quantization parameters: {0}")]
    InvalidQuantization(String),

    /// Invalid frame dimensions.
    #[error("Invalid frame dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Frame width.
        width: u32,
        /// Frame height.
        height: u32,
    },

    /// Bit depth has no quantizer step table.
    #[error("Unsupported bit depth: {0}")]
    UnsupportedBitDepth(u8),

    /// Superblock size other than 64 or 128 pixels.
    #[error("Unsupported superblock size: log2 {0}")]
    UnsupportedSuperblockSize(u8),

    /// Segment id outside 0..8.
    #[error("Segment id {0} out of range")]
    SegmentOutOfRange(u8),

    /// Plane index outside the configured plane count.
    #[error("Plane {0} out of range")]
    PlaneOutOfRange(usize),

    /// The frame layout has no superblock at the traversed coordinate.
    #[error("No superblock at row {row}, column {column}")]
    MissingSuperblock {
        /// Superblock row.
        row: u32,
        /// Superblock column.
        column: u32,
    },

    /// Coefficient count exceeds what the transform or the input can hold.
    #[error("Coefficient count {count} exceeds limit {limit}")]
    CoefficientOverflow {
        /// Requested count.
        count: usize,
        /// Maximum allowed.
        limit: usize,
    },

    /// Destination buffer is smaller than required.
    #[error("Buffer too small: need {needed}, got {actual}")]
    BufferTooSmall {
        /// Required length.
        needed: usize,
        /// Provided length.
        actual: usize,
    },

    /// Quantization matrix weight table has the wrong shape.
    #[error("Invalid quantization matrix weights: {0}")]
    InvalidQuantMatrix(String),

    /// Decode entry point called in the wrong state.
    #[error("Invalid decoder state: {0}")]
    InvalidState(String),

    /// Failure reported by an external stage.
    #[error("Collaborator error: {0}")]
    Collaborator(String),
}

/// AV1 result type.
pub type Result<T> = std::result::Result<T, Av1Error>;

impl Av1Error {
    /// Create an invalid tile info error.
    pub fn invalid_tile_info(msg: impl Into<String>) -> Self {
        Self::InvalidTileInfo(msg.into())
    }

    /// Create a collaborator error.
    pub fn collaborator(msg: impl Into<String>) -> Self {
        Self::Collaborator(msg.into())
    }

    /// Check if this error is a header or layout precondition violation.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::InvalidTileInfo(_)
                | Self::InvalidQuantization(_)
                | Self::InvalidDimensions { .. }
                | Self::UnsupportedBitDepth(_)
                | Self::UnsupportedSuperblockSize(_)
                | Self::SegmentOutOfRange(_)
                | Self::PlaneOutOfRange(_)
                | Self::MissingSuperblock { .. }
                | Self::InvalidState(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Av1Error::MissingSuperblock { row: 3, column: 7 };
        assert_eq!(err.to_string(), "No superblock at row 3, column 7");
    }

    #[test]
    fn test_coefficient_overflow_display() {
        let err = Av1Error::CoefficientOverflow { count: 1025, limit: 1024 };
        assert!(err.to_string().contains("1025"));
        assert!(err.to_string().contains("1024"));
    }

    #[test]
    fn test_constructors() {
        let err = Av1Error::invalid_tile_info("boundaries not increasing");
        assert!(matches!(err, Av1Error::InvalidTileInfo(_)));
        let err = Av1Error::collaborator("reconstruct failed");
        assert_eq!(err.to_string(), "Collaborator error: reconstruct failed");
    }

    #[test]
    fn test_is_precondition() {
        assert!(Av1Error::SegmentOutOfRange(9).is_precondition());
        assert!(Av1Error::UnsupportedBitDepth(10).is_precondition());
        assert!(!Av1Error::collaborator("x").is_precondition());
        assert!(!Av1Error::BufferTooSmall { needed: 16, actual: 4 }.is_precondition());
    }
}
