//! In-memory frame source

use super::{Frame, FramePayload, FrameSource};
use anyhow::{anyhow, Result};

/// Insertion-ordered, in-memory mapping from record name to serialized
/// payload bytes.
///
/// Populated once before serving; re-inserting an existing name replaces the
/// payload but keeps the original insertion position.
#[derive(Debug, Default)]
pub struct MemorySource {
    frames: Vec<Frame>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a named record. The payload kind (JSON text vs binary) is
    /// sniffed from the bytes.
    pub fn insert(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        let name = name.into();
        let payload = FramePayload::from_bytes(data.into());

        if let Some(existing) = self.frames.iter_mut().find(|f| f.name == name) {
            existing.payload = payload;
        } else {
            self.frames.push(Frame { name, payload });
        }
    }

    pub fn get(&self, name: &str) -> Option<&Frame> {
        self.frames.iter().find(|f| f.name == name)
    }
}

impl FrameSource for MemorySource {
    fn len(&self) -> usize {
        self.frames.len()
    }

    fn frame(&self, index: usize) -> Result<Frame> {
        self.frames
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow!("frame index {} out of range ({} frames)", index, self.frames.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order() {
        let mut source = MemorySource::new();
        source.insert("1-frame.json", "{\"a\":1}");
        source.insert("2-frame.json", "{\"b\":2}");
        source.insert("3-frame.json", "{\"c\":3}");

        assert_eq!(source.len(), 3);
        let names: Vec<String> = (0..source.len())
            .map(|i| source.frame(i).unwrap().name)
            .collect();
        assert_eq!(names, vec!["1-frame.json", "2-frame.json", "3-frame.json"]);
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut source = MemorySource::new();
        source.insert("a", "{\"v\":1}");
        source.insert("b", "{\"v\":2}");
        source.insert("a", "{\"v\":9}");

        assert_eq!(source.len(), 2);
        let first = source.frame(0).unwrap();
        assert_eq!(first.name, "a");
        assert_eq!(first.payload, FramePayload::Json("{\"v\":9}".to_string()));
    }

    #[test]
    fn test_payload_kinds() {
        let mut source = MemorySource::new();
        source.insert("meta", "{\"version\":\"2.0.0\"}");
        source.insert("image", vec![0u8, 1, 2, 3]);

        assert!(matches!(source.frame(0).unwrap().payload, FramePayload::Json(_)));
        assert!(matches!(source.frame(1).unwrap().payload, FramePayload::Binary(_)));
    }

    #[test]
    fn test_out_of_range() {
        let source = MemorySource::new();
        assert!(source.frame(0).is_err());
        assert!(source.is_empty());
    }
}
