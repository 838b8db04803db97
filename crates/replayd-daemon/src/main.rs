//! replayd - serve recorded visualization logs over WebSocket
//!
//! Loads `*-frame.json` logs from a data directory and replays them to
//! connecting clients. The directory itself is registered as the log
//! `default` when it contains frames; every immediate subdirectory with
//! frames is registered under its directory name.
//!
//! Usage:
//!   replayd --data-directory ./data/generated --port 3000
//!   replayd --data-directory ./logs --delay 100 --frame-limit 8000 --skip-images

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use replayd_core::{DirectorySource, FrameSource, ReplayServer, ReplayServerOptions, ReplaySettings};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "replayd")]
#[command(about = "Serve recorded visualization logs over WebSocket")]
#[command(version)]
struct Args {
    /// WebSocket port to listen on
    #[arg(short, long, default_value_t = replayd_core::DEFAULT_PORT)]
    port: u16,

    /// Directory holding *-frame.json files, or one subdirectory per log
    #[arg(short, long, default_value = ".")]
    data_directory: PathBuf,

    /// Interval between frames in milliseconds
    #[arg(long, default_value_t = 50)]
    delay: u64,

    /// Reduce or extend the number of frames sent per session
    #[arg(long)]
    frame_limit: Option<usize>,

    /// Do not send binary (image) frames
    #[arg(long)]
    skip_images: bool,

    /// Wait for the client's open_log message before streaming
    #[arg(long)]
    wait_for_open: bool,
}

fn log_filter() -> tracing_subscriber::EnvFilter {
    let level = if let Ok(v) = std::env::var("RUST_LOG") {
        v
    } else if let Ok(v) = std::env::var("REPLAYD_LOG_LEVEL") {
        match v.as_str() {
            "silent" => "off".to_string(),
            "fatal" => "error".to_string(),
            other => other.to_string(),
        }
    } else {
        "info".to_string()
    };

    tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
}

/// Find loadable logs: the directory itself as `default`, plus every
/// immediate subdirectory that holds frames, under its own name.
fn discover_logs(dir: &Path) -> Result<Vec<(String, DirectorySource)>> {
    let mut logs = Vec::new();

    if let Ok(source) = DirectorySource::open(dir) {
        logs.push(("default".to_string(), source));
    }

    let mut subdirs: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read data directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    subdirs.sort();

    for subdir in subdirs {
        let Some(name) = subdir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        match DirectorySource::open(&subdir) {
            Ok(source) => logs.push((name.to_string(), source)),
            Err(e) => debug!(dir = %subdir.display(), error = %e, "Skipping directory without frames"),
        }
    }

    Ok(logs)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let logs = discover_logs(&args.data_directory)?;
    if logs.is_empty() {
        return Err(anyhow!(
            "no *-frame.json data found under {}",
            args.data_directory.display()
        ));
    }

    let settings = ReplaySettings {
        send_interval: Duration::from_millis(args.delay),
        frame_limit: args.frame_limit,
        skip_binary: args.skip_images,
        start_on_connect: !args.wait_for_open,
    };

    let mut server = ReplayServer::new(ReplayServerOptions {
        port: args.port,
        replay: settings,
    });

    for (name, source) in logs {
        info!(log = %name, frames = source.len(), "Registered log");
        server.register(name, Arc::new(source));
    }

    server.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("Interrupt received, shutting down");
    server.stop().await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_discover_logs_flat_and_nested() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("1-frame.json"), "{}").unwrap();

        let nested = dir.path().join("kitti-0005");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("1-frame.json"), "{}").unwrap();
        std::fs::write(nested.join("2-frame.json"), "{}").unwrap();

        std::fs::create_dir(dir.path().join("empty")).unwrap();

        let logs = discover_logs(dir.path()).unwrap();
        let names: Vec<&str> = logs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["default", "kitti-0005"]);
        assert_eq!(logs[1].1.len(), 2);
    }

    #[test]
    fn test_discover_logs_empty_tree() {
        let dir = tempdir().unwrap();
        assert!(discover_logs(dir.path()).unwrap().is_empty());
    }
}
