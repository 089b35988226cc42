//! In-loop post-filter stages.
//!
//! The frame decoder runs these after every tile has been reconstructed, in
//! a fixed order: loop filter, deblocked boundary save, CDEF, upscaling, CDEF
//! boundary save, loop restoration. Only the sequencing lives here; the
//! filters themselves are supplied through [`PostFilter`].
//!
//! Every hook receives the reconstructed frame when the block decoder owns
//! one (see [`BlockDecoder::frame_mut`](crate::block::BlockDecoder::frame_mut)).

use crate::error::Result;
use crate::frame::FrameBuffer;
use crate::layout::SuperblockPosition;

/// Named post-filter stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostFilterStage {
    /// Deblocking loop filter.
    LoopFilter,
    /// Save deblocked rows for CDEF and restoration.
    SaveDeblockedBoundaries,
    /// Constrained directional enhancement filter.
    Cdef,
    /// Super-resolution upscaling.
    Upscale,
    /// Save CDEF-filtered rows for restoration.
    SaveCdefBoundaries,
    /// Loop restoration.
    LoopRestoration,
}

impl PostFilterStage {
    /// Stage name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoopFilter => "loop_filter",
            Self::SaveDeblockedBoundaries => "save_deblocked_boundaries",
            Self::Cdef => "cdef",
            Self::Upscale => "upscale",
            Self::SaveCdefBoundaries => "save_cdef_boundaries",
            Self::LoopRestoration => "loop_restoration",
        }
    }
}

/// Post-filter implementation. Every stage defaults to doing nothing.
pub trait PostFilter {
    /// Filter one superblock. `end_of_row` is set on the last column.
    fn loop_filter_superblock(
        &mut self,
        frame: Option<&mut FrameBuffer>,
        position: SuperblockPosition,
        end_of_row: bool,
    ) -> Result<()> {
        let _ = (frame, position, end_of_row);
        Ok(())
    }

    /// Save deblocked boundary rows.
    fn save_deblocked_boundaries(&mut self, frame: Option<&mut FrameBuffer>) -> Result<()> {
        let _ = frame;
        Ok(())
    }

    /// Run CDEF over the frame.
    fn cdef(&mut self, frame: Option<&mut FrameBuffer>) -> Result<()> {
        let _ = frame;
        Ok(())
    }

    /// Upscale the frame horizontally.
    fn upscale(&mut self, frame: Option<&mut FrameBuffer>) -> Result<()> {
        let _ = frame;
        Ok(())
    }

    /// Save CDEF-filtered boundary rows.
    fn save_cdef_boundaries(&mut self, frame: Option<&mut FrameBuffer>) -> Result<()> {
        let _ = frame;
        Ok(())
    }

    /// Run loop restoration over the frame.
    fn loop_restoration(&mut self, frame: Option<&mut FrameBuffer>) -> Result<()> {
        let _ = frame;
        Ok(())
    }
}

/// Post filter that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPostFilter;

impl PostFilter for NoPostFilter {}

impl<T: PostFilter + ?Sized> PostFilter for &mut T {
    fn loop_filter_superblock(
        &mut self,
        frame: Option<&mut FrameBuffer>,
        position: SuperblockPosition,
        end_of_row: bool,
    ) -> Result<()> {
        (**self).loop_filter_superblock(frame, position, end_of_row)
    }

    fn save_deblocked_boundaries(&mut self, frame: Option<&mut FrameBuffer>) -> Result<()> {
        (**self).save_deblocked_boundaries(frame)
    }

    fn cdef(&mut self, frame: Option<&mut FrameBuffer>) -> Result<()> {
        (**self).cdef(frame)
    }

    fn upscale(&mut self, frame: Option<&mut FrameBuffer>) -> Result<()> {
        (**self).upscale(frame)
    }

    fn save_cdef_boundaries(&mut self, frame: Option<&mut FrameBuffer>) -> Result<()> {
        (**self).save_cdef_boundaries(frame)
    }

    fn loop_restoration(&mut self, frame: Option<&mut FrameBuffer>) -> Result<()> {
        (**self).loop_restoration(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{FrameHeader, SequenceHeader};
    use crate::types::Plane;

    #[test]
    fn test_default_stages_succeed() {
        let mut filter = NoPostFilter;
        assert!(filter
            .loop_filter_superblock(None, SuperblockPosition::new(0, 0), true)
            .is_ok());
        assert!(filter.save_deblocked_boundaries(None).is_ok());
        assert!(filter.cdef(None).is_ok());
        assert!(filter.upscale(None).is_ok());
        assert!(filter.save_cdef_boundaries(None).is_ok());
        assert!(filter.loop_restoration(None).is_ok());
    }

    struct Brighten(u16);

    impl PostFilter for Brighten {
        fn cdef(&mut self, frame: Option<&mut FrameBuffer>) -> Result<()> {
            if let Some(frame) = frame {
                for sample in frame.plane_mut(Plane::Y).unwrap_or_default() {
                    *sample += self.0;
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_forwarded_hook_reaches_frame() {
        let seq = SequenceHeader::default();
        let mut frame = FrameBuffer::new(&seq, &FrameHeader::new(16, 16));
        let mut filter = Brighten(3);
        let mut forwarded = &mut filter;
        <&mut Brighten as PostFilter>::cdef(&mut forwarded, Some(&mut frame)).unwrap();
        assert!(frame.plane(Plane::Y).unwrap().iter().all(|s| *s == 3));
        assert!(frame.plane(Plane::U).unwrap().iter().all(|s| *s == 0));
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(PostFilterStage::Cdef.name(), "cdef");
        assert_eq!(PostFilterStage::LoopRestoration.name(), "loop_restoration");
    }
}
