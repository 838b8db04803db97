//! Replay session
//!
//! Per-connection loop that transmits the frames of one source in insertion
//! order. Pacing, frame limits, looping, and control messages follow the
//! recorded-log replay semantics: frame 0 (the metadata frame) is sent once,
//! looping cycles through the remaining frames.

use crate::source::{frame_timestamp, set_frame_timestamp, FramePayload, FrameSource};
use crate::ws::server::close_frame;
use anyhow::Result;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

/// Default interval between frames.
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_millis(50);

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Per-session replay settings.
#[derive(Debug, Clone)]
pub struct ReplaySettings {
    /// Interval between frames. Zero sends back-to-back.
    pub send_interval: Duration,
    /// Total frames to send. More than the source holds loops the replay;
    /// `None` sends the source once.
    pub frame_limit: Option<usize>,
    /// Skip binary frames (video/image data). Skipped frames still advance
    /// the send counter.
    pub skip_binary: bool,
    /// Stream immediately on connect instead of waiting for the client's
    /// `open_log` message.
    pub start_on_connect: bool,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            send_interval: DEFAULT_SEND_INTERVAL,
            frame_limit: None,
            skip_binary: false,
            start_on_connect: true,
        }
    }
}

/// Messages sent to the client.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    Done,
}

/// Control messages from the client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    OpenLog,
}

async fn send_json<S: Serialize>(ws_tx: &mut WsSink, msg: &S) -> Result<()> {
    let text = serde_json::to_string(msg)?;
    ws_tx.send(Message::Text(text)).await?;
    Ok(())
}

/// Replay of one frame source to one client connection.
pub struct ReplaySession {
    log: String,
    source: Arc<dyn FrameSource>,
    settings: ReplaySettings,
}

/// Index into the source for the `sent`-th transmission. Looping past the
/// end cycles through `1..len`, never repeating the metadata frame at 0.
fn loop_index(sent: usize, len: usize) -> usize {
    if sent >= len {
        let cycle = len - 1;
        let index = sent % cycle;
        if index == 0 {
            cycle
        } else {
            index
        }
    } else {
        sent
    }
}

/// Total frames to send. Looping needs at least one frame beyond the
/// metadata frame, so short sources cap the limit at their own length.
fn effective_total(frame_limit: Option<usize>, len: usize) -> usize {
    let total = frame_limit.unwrap_or(len);
    if len < 2 {
        total.min(len)
    } else {
        total
    }
}

/// Keep frame time monotonic when a looped replay wraps around. The rewrite
/// applies to this session's copy of the frame only.
fn rewrite_looped_timestamp(text: String, looped: bool, interval: f64, last: &mut f64) -> String {
    let mut frame: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(_) => return text,
    };
    let Some(timestamp) = frame_timestamp(&frame) else {
        return text;
    };

    if looped && timestamp < *last {
        let next = *last + interval;
        set_frame_timestamp(&mut frame, next);
        *last = next;
        serde_json::to_string(&frame).unwrap_or(text)
    } else {
        *last = timestamp;
        text
    }
}

impl ReplaySession {
    pub fn new(
        log: impl Into<String>,
        source: Arc<dyn FrameSource>,
        settings: ReplaySettings,
    ) -> Self {
        Self {
            log: log.into(),
            source,
            settings,
        }
    }

    /// Drive the replay until completion or client disconnect.
    pub async fn run(self, ws_stream: WebSocketStream<TcpStream>, addr: SocketAddr) -> Result<()> {
        let (mut ws_tx, mut ws_rx) = ws_stream.split();

        let len = self.source.len();
        let total = effective_total(self.settings.frame_limit, len);
        let loops = total > len;
        let interval_secs = self.settings.send_interval.as_secs_f64();

        let mut sent = 0usize;
        let mut started = self.settings.start_on_connect;
        let mut last_timestamp = 0.0_f64;

        info!(?addr, log = %self.log, frames = len, total, "Replay session started");

        loop {
            if started && sent >= total {
                send_json(&mut ws_tx, &ServerMessage::Done).await?;
                let _ = ws_tx.send(Message::Close(None)).await;
                info!(?addr, log = %self.log, sent, "Replay complete");
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.send_interval), if started => {
                    let index = loop_index(sent, len);
                    let frame = match self.source.frame(index) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!(?addr, log = %self.log, index, error = %e, "Failed to read frame");
                            let _ = ws_tx
                                .send(Message::Close(Some(close_frame(4002, "Frame read failed"))))
                                .await;
                            break;
                        }
                    };

                    match frame.payload {
                        FramePayload::Binary(data) => {
                            if self.settings.skip_binary {
                                debug!(?addr, log = %self.log, name = %frame.name, "Skipping binary frame");
                            } else if ws_tx.send(Message::Binary(data)).await.is_err() {
                                break;
                            }
                        }
                        FramePayload::Json(text) => {
                            let text = if loops {
                                rewrite_looped_timestamp(
                                    text,
                                    sent >= len,
                                    interval_secs,
                                    &mut last_timestamp,
                                )
                            } else {
                                text
                            };
                            if ws_tx.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                    }

                    sent += 1;
                }

                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<ClientMessage>(&text) {
                                Ok(ClientMessage::OpenLog) => {
                                    debug!(?addr, log = %self.log, "open_log received");
                                    started = true;
                                }
                                Err(_) => {
                                    debug!(?addr, %text, "Ignoring unknown control message");
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            info!(?addr, log = %self.log, sent, "Client disconnected");
                            return Ok(());
                        }
                        Some(Err(e)) => {
                            warn!(?addr, log = %self.log, error = %e, "WebSocket error");
                            return Ok(());
                        }
                        _ => {}
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_index_within_source() {
        for i in 0..5 {
            assert_eq!(loop_index(i, 5), i);
        }
    }

    #[test]
    fn test_loop_index_skips_metadata_frame() {
        // len 5: looping cycles 1..=4
        assert_eq!(loop_index(5, 5), 1);
        assert_eq!(loop_index(6, 5), 2);
        assert_eq!(loop_index(7, 5), 3);
        assert_eq!(loop_index(8, 5), 4);
        assert_eq!(loop_index(9, 5), 1);
    }

    #[test]
    fn test_effective_total() {
        assert_eq!(effective_total(None, 5), 5);
        assert_eq!(effective_total(Some(3), 5), 3);
        assert_eq!(effective_total(Some(10), 5), 10);
        // Short sources cannot loop
        assert_eq!(effective_total(Some(10), 1), 1);
        assert_eq!(effective_total(Some(10), 0), 0);
    }

    #[test]
    fn test_rewrite_only_when_time_regresses() {
        let mut last = 0.0;

        // First pass tracks timestamps without touching the payload
        let text = "{\"vehicle_pose\":{\"time\":10.0}}".to_string();
        let out = rewrite_looped_timestamp(text.clone(), false, 0.5, &mut last);
        assert_eq!(out, text);
        assert_eq!(last, 10.0);

        // Wrapped frame with an older timestamp gets advanced
        let wrapped = "{\"vehicle_pose\":{\"time\":2.0}}".to_string();
        let out = rewrite_looped_timestamp(wrapped, true, 0.5, &mut last);
        let frame: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(frame_timestamp(&frame), Some(10.5));
        assert_eq!(last, 10.5);
    }

    #[test]
    fn test_rewrite_leaves_non_json_untouched() {
        let mut last = 5.0;
        let text = "not json".to_string();
        assert_eq!(rewrite_looped_timestamp(text.clone(), true, 0.05, &mut last), text);
        assert_eq!(last, 5.0);
    }
}
