//! Frame sources
//!
//! A frame source is an insertion-ordered store of named, pre-serialized
//! frames. Sources are populated once (in memory, or by scanning a log
//! directory) and read-only afterwards; replay sessions share them via `Arc`.

mod directory;
mod frame;
mod memory;

pub use directory::{DirectorySource, FRAME_DATA_SUFFIX};
pub use frame::{frame_timestamp, set_frame_timestamp, Frame, FramePayload};
pub use memory::MemorySource;

use anyhow::Result;

/// Indexed, insertion-ordered access to the frames of one recorded log.
pub trait FrameSource: Send + Sync {
    /// Number of frames in the source.
    fn len(&self) -> usize;

    /// Frame at `index` (0-based, insertion order).
    fn frame(&self, index: usize) -> Result<Frame>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
