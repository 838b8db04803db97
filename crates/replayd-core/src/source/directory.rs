//! Directory-backed frame source
//!
//! Serves a recorded log laid out as `<index>-frame.json` files, starting at
//! index 1. Both bare (`1-frame.json`) and zero-padded (`001-frame.json`)
//! names are accepted. The scan stops at the first missing index.

use super::{Frame, FramePayload, FrameSource};
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

/// File name suffix of recorded frames.
pub const FRAME_DATA_SUFFIX: &str = "-frame.json";

const START_INDEX: usize = 1;
const MAX_FRAMES: usize = 99_999;

/// Frame source reading `<index>-frame.json` files from a log directory.
///
/// File contents are read lazily at send time; the payload kind is sniffed
/// per read.
#[derive(Debug)]
pub struct DirectorySource {
    frames: Vec<(String, PathBuf)>,
}

fn frame_names(index: usize) -> [String; 2] {
    [
        format!("{}{}", index, FRAME_DATA_SUFFIX),
        format!("{:03}{}", index, FRAME_DATA_SUFFIX),
    ]
}

impl DirectorySource {
    /// Scan `dir` for frame files. Fails if no frames are found.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut frames = Vec::new();

        for index in START_INDEX..=MAX_FRAMES {
            let found = frame_names(index).into_iter().find_map(|name| {
                let path = dir.join(&name);
                path.exists().then_some((name, path))
            });
            match found {
                Some(entry) => frames.push(entry),
                None => break,
            }
        }

        if frames.is_empty() {
            return Err(anyhow!(
                "no *{} files found in {}",
                FRAME_DATA_SUFFIX,
                dir.display()
            ));
        }

        Ok(Self { frames })
    }
}

impl FrameSource for DirectorySource {
    fn len(&self) -> usize {
        self.frames.len()
    }

    fn frame(&self, index: usize) -> Result<Frame> {
        let (name, path) = self
            .frames
            .get(index)
            .ok_or_else(|| anyhow!("frame index {} out of range ({} frames)", index, self.frames.len()))?;

        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read frame {}", path.display()))?;

        Ok(Frame {
            name: name.clone(),
            payload: FramePayload::from_bytes(bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_loads_frames_in_index_order() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("1-frame.json"), "{\"meta\":true}").unwrap();
        std::fs::write(dir.path().join("2-frame.json"), "{\"n\":2}").unwrap();
        std::fs::write(dir.path().join("3-frame.json"), [0u8, 1, 2]).unwrap();

        let source = DirectorySource::open(dir.path()).unwrap();
        assert_eq!(source.len(), 3);

        let first = source.frame(0).unwrap();
        assert_eq!(first.name, "1-frame.json");
        assert_eq!(first.payload, FramePayload::Json("{\"meta\":true}".to_string()));

        let third = source.frame(2).unwrap();
        assert_eq!(third.payload, FramePayload::Binary(vec![0, 1, 2]));
    }

    #[test]
    fn test_zero_padded_names() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("001-frame.json"), "{}").unwrap();
        std::fs::write(dir.path().join("002-frame.json"), "{}").unwrap();

        let source = DirectorySource::open(dir.path()).unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(source.frame(0).unwrap().name, "001-frame.json");
    }

    #[test]
    fn test_stops_at_first_gap() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("1-frame.json"), "{}").unwrap();
        std::fs::write(dir.path().join("2-frame.json"), "{}").unwrap();
        std::fs::write(dir.path().join("4-frame.json"), "{}").unwrap();

        let source = DirectorySource::open(dir.path()).unwrap();
        assert_eq!(source.len(), 2);
    }

    #[test]
    fn test_empty_directory_is_error() {
        let dir = tempdir().unwrap();
        assert!(DirectorySource::open(dir.path()).is_err());
    }
}
