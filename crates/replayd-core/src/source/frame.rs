//! Frame payloads and timestamp helpers

use serde_json::{json, Value};

/// A single named frame of a recorded log.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Record name within the log (e.g. `2-frame.json`).
    pub name: String,
    pub payload: FramePayload,
}

/// Serialized frame payload.
///
/// The kind is sniffed from the serialized bytes: a leading `{` byte means a
/// JSON text frame (sent as a WebSocket text message), anything else is
/// opaque binary (sent as a binary message).
#[derive(Debug, Clone, PartialEq)]
pub enum FramePayload {
    Json(String),
    Binary(Vec<u8>),
}

impl FramePayload {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        if bytes.first() == Some(&b'{') {
            FramePayload::Json(String::from_utf8_lossy(&bytes).into_owned())
        } else {
            FramePayload::Binary(bytes)
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FramePayload::Json(text) => text.len(),
            FramePayload::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Timestamp of a decoded JSON frame: the pose time if present, otherwise
/// the max timestamp across state updates.
pub fn frame_timestamp(frame: &Value) -> Option<f64> {
    if let Some(time) = frame.pointer("/vehicle_pose/time").and_then(Value::as_f64) {
        return Some(time);
    }

    let updates = frame.get("state_updates")?.as_array()?;
    let max = updates
        .iter()
        .filter_map(|update| update.get("timestamp").and_then(Value::as_f64))
        .fold(0.0_f64, f64::max);
    Some(max)
}

/// Rewrite the timestamp of a decoded JSON frame.
///
/// Used when a looped replay runs past the end of the recording and frame
/// time would otherwise regress. Viewers take the max of any timestamp in a
/// state update, so setting the first entry is enough.
pub fn set_frame_timestamp(frame: &mut Value, timestamp: f64) {
    if let Some(pose) = frame.get_mut("vehicle_pose").and_then(Value::as_object_mut) {
        pose.insert("time".to_string(), json!(timestamp));
        return;
    }

    if let Some(first) = frame
        .get_mut("state_updates")
        .and_then(Value::as_array_mut)
        .and_then(|updates| updates.first_mut())
        .and_then(Value::as_object_mut)
    {
        first.insert("timestamp".to_string(), json!(timestamp));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_sniffing() {
        let json = FramePayload::from_bytes(b"{\"a\":1}".to_vec());
        assert_eq!(json, FramePayload::Json("{\"a\":1}".to_string()));

        let binary = FramePayload::from_bytes(vec![0x67, 0x6c, 0x54, 0x46]);
        assert_eq!(binary, FramePayload::Binary(vec![0x67, 0x6c, 0x54, 0x46]));

        assert_eq!(FramePayload::from_bytes(Vec::new()), FramePayload::Binary(Vec::new()));
    }

    #[test]
    fn test_timestamp_from_vehicle_pose() {
        let frame = json!({"vehicle_pose": {"time": 12.5}, "state_updates": [{"timestamp": 99.0}]});
        assert_eq!(frame_timestamp(&frame), Some(12.5));
    }

    #[test]
    fn test_timestamp_from_state_updates_max() {
        let frame = json!({"state_updates": [{"timestamp": 3.0}, {"timestamp": 7.0}, {"timestamp": 5.0}]});
        assert_eq!(frame_timestamp(&frame), Some(7.0));
    }

    #[test]
    fn test_timestamp_absent() {
        assert_eq!(frame_timestamp(&json!({"other": true})), None);
    }

    #[test]
    fn test_set_timestamp_on_pose() {
        let mut frame = json!({"vehicle_pose": {"time": 1.0}});
        set_frame_timestamp(&mut frame, 42.0);
        assert_eq!(frame_timestamp(&frame), Some(42.0));
    }

    #[test]
    fn test_set_timestamp_on_state_updates() {
        let mut frame = json!({"state_updates": [{"timestamp": 1.0}, {"timestamp": 2.0}]});
        set_frame_timestamp(&mut frame, 42.0);
        assert_eq!(frame_timestamp(&frame), Some(42.0));
        // Only the first entry is rewritten
        assert_eq!(frame["state_updates"][1]["timestamp"], json!(2.0));
    }
}
