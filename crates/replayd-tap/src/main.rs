//! replayd-tap - inspect or capture a replay stream
//!
//! Connects to a running replayd server, requests a log, and prints one line
//! per received frame. With --out, frames are also written back out as
//! `<n>-frame.json` files, in a layout replayd can serve again.
//!
//! Usage:
//!   replayd-tap kitti-0005
//!   replayd-tap kitti-0005 --host localhost --port 3000 --out ./captured

use anyhow::{Context, Result};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3000;

#[derive(Parser, Debug)]
#[command(name = "replayd-tap")]
#[command(about = "Inspect or capture a replay stream from a replayd server")]
#[command(version)]
struct Args {
    /// The log to request (e.g. kitti-0005)
    log: String,

    /// Replay server host
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    host: String,

    /// Replay server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Write received frames to this directory as <n>-frame.json files
    #[arg(long)]
    out: Option<PathBuf>,
}

/// Control messages to the server
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    OpenLog,
}

fn is_done_message(text: &str) -> bool {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| v.get("type").and_then(Value::as_str).map(|t| t == "done"))
        .unwrap_or(false)
}

fn write_frame(out: &Path, index: usize, data: &[u8]) -> Result<()> {
    let path = out.join(format!("{}-frame.json", index));
    std::fs::write(&path, data).with_context(|| format!("failed to write {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let url = format!("ws://{}:{}/{}", args.host, args.port, args.log);
    eprintln!("Connecting to {}...", url);

    let (ws_stream, _) = connect_async(url.as_str())
        .await
        .context("Failed to connect to replay server")?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    // Start the replay in case the server is waiting for us
    let open = serde_json::to_string(&ClientMessage::OpenLog)?;
    ws_tx.send(WsMessage::Text(open)).await?;

    if let Some(out) = &args.out {
        std::fs::create_dir_all(out)
            .with_context(|| format!("failed to create {}", out.display()))?;
    }

    let mut index = 1usize;
    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        if is_done_message(&text) {
                            eprintln!("Replay complete ({} frames)", index - 1);
                            break;
                        }
                        println!("frame {:>6}  json    {:>9} bytes", index, text.len());
                        if let Some(out) = &args.out {
                            write_frame(out, index, text.as_bytes())?;
                        }
                        index += 1;
                    }
                    Some(Ok(WsMessage::Binary(data))) => {
                        println!("frame {:>6}  binary  {:>9} bytes", index, data.len());
                        if let Some(out) = &args.out {
                            write_frame(out, index, &data)?;
                        }
                        index += 1;
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        match frame {
                            Some(frame) if !frame.reason.is_empty() => {
                                eprintln!(
                                    "Server closed connection: {} ({})",
                                    frame.reason,
                                    u16::from(frame.code)
                                )
                            }
                            _ => eprintln!("Server closed connection"),
                        }
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        eprintln!("WebSocket error: {}", e);
                        return Err(e.into());
                    }
                    None => break,
                }
            }

            _ = tokio::signal::ctrl_c() => {
                eprintln!("Interrupted after {} frames", index - 1);
                break;
            }
        }
    }

    Ok(())
}
