//! WebSocket replay server
//!
//! Accepts connections, resolves the client-requested log name through a
//! `SessionHandler`, and drives one replay session per accepted connection.
//! Sessions are independent; there is no ordering between connections.
//!
//! Close codes:
//! - 4000: no log name in the request
//! - 4001: unknown log
//! - 4002: frame read failed mid-replay

use super::request::ConnectRequest;
use super::session::{ReplaySession, ReplaySettings};
use crate::source::FrameSource;
use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex, RwLock};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::handshake::server::{
    Request as WsRequest, Response as WsResponse,
};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{accept_hdr_async, tungstenite::Message};
use tracing::{error, info, warn};

/// Default port, shared with the notebook widget.
pub const DEFAULT_PORT: u16 = 3000;

/// Replay server options
pub struct ReplayServerOptions {
    /// Port to listen on (0 picks an ephemeral port)
    pub port: u16,
    /// Settings applied to sessions opened through the registry
    pub replay: ReplaySettings,
}

impl Default for ReplayServerOptions {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            replay: ReplaySettings::default(),
        }
    }
}

/// Produces a replay session for an accepted connection, or declines it.
pub trait SessionHandler: Send + Sync {
    fn open_session(&self, request: &ConnectRequest) -> Option<ReplaySession>;
}

/// Default handler: a mapping from log name to registered frame source.
pub struct SourceRegistry {
    sources: RwLock<HashMap<String, Arc<dyn FrameSource>>>,
    settings: ReplaySettings,
}

impl SourceRegistry {
    pub fn new(settings: ReplaySettings) -> Self {
        Self {
            sources: RwLock::new(HashMap::new()),
            settings,
        }
    }

    pub fn register(&self, key: impl Into<String>, source: Arc<dyn FrameSource>) {
        let key = key.into();
        if let Ok(mut sources) = self.sources.write() {
            sources.insert(key, source);
        }
    }
}

impl SessionHandler for SourceRegistry {
    fn open_session(&self, request: &ConnectRequest) -> Option<ReplaySession> {
        let log = request.log()?;
        let source = self.sources.read().ok()?.get(log).cloned()?;
        Some(ReplaySession::new(log, source, self.settings.clone()))
    }
}

/// WebSocket replay server
pub struct ReplayServer {
    port: u16,
    handler: Arc<dyn SessionHandler>,
    registry: Option<Arc<SourceRegistry>>,
    local_addr: Option<SocketAddr>,
    shutdown_tx: Option<broadcast::Sender<()>>,
}

pub(crate) fn close_frame(code: u16, reason: impl Into<String>) -> CloseFrame<'static> {
    CloseFrame {
        code: CloseCode::from(code),
        reason: reason.into().into(),
    }
}

impl ReplayServer {
    /// Create a server backed by the default source registry.
    pub fn new(options: ReplayServerOptions) -> Self {
        let registry = Arc::new(SourceRegistry::new(options.replay));
        Self {
            port: options.port,
            handler: registry.clone(),
            registry: Some(registry),
            local_addr: None,
            shutdown_tx: None,
        }
    }

    /// Create a server with a custom session handler instead of the registry.
    pub fn with_handler(options: ReplayServerOptions, handler: Arc<dyn SessionHandler>) -> Self {
        Self {
            port: options.port,
            handler,
            registry: None,
            local_addr: None,
            shutdown_tx: None,
        }
    }

    /// Bind a log name to a frame source.
    pub fn register(&self, key: impl Into<String>, source: Arc<dyn FrameSource>) {
        match &self.registry {
            Some(registry) => registry.register(key, source),
            None => warn!("register ignored: server uses a custom session handler"),
        }
    }

    /// Address the server is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Start accepting connections.
    pub async fn start(&mut self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);

        info!(addr = %local_addr, "Replay server started");

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);

        let handler = self.handler.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, addr)) => {
                                let handler = handler.clone();
                                tokio::spawn(async move {
                                    if let Err(e) = Self::handle_connection(stream, addr, handler).await {
                                        error!(?e, ?addr, "WebSocket connection error");
                                    }
                                });
                            }
                            Err(e) => {
                                error!(?e, "Failed to accept connection");
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Replay server shutting down");
                        break;
                    }
                }
            }
        });

        Ok(())
    }

    /// Stop the server.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        info!("Replay server stopped");
    }

    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        handler: Arc<dyn SessionHandler>,
    ) -> Result<()> {
        // Capture the request URI from the handshake
        let uri_cell = Arc::new(StdMutex::new(String::new()));
        let uri_cell2 = Arc::clone(&uri_cell);

        let ws_stream = accept_hdr_async(stream, move |req: &WsRequest, resp: WsResponse| {
            if let Ok(mut uri) = uri_cell2.lock() {
                *uri = match req.uri().query() {
                    Some(query) => format!("{}?{}", req.uri().path(), query),
                    None => req.uri().path().to_string(),
                };
            }
            Ok(resp)
        })
        .await?;

        let uri = uri_cell
            .lock()
            .map(|u| u.clone())
            .unwrap_or_else(|_| "/".to_string());
        let request = ConnectRequest::parse(&uri);

        let Some(log) = request.log() else {
            let (mut ws_tx, _ws_rx) = ws_stream.split();
            let _ = ws_tx
                .send(Message::Close(Some(close_frame(
                    4000,
                    "No log requested. Use /<log> or ?log=<log>",
                ))))
                .await;
            warn!(?addr, %uri, "Connection without log name");
            return Ok(());
        };

        match handler.open_session(&request) {
            Some(session) => session.run(ws_stream, addr).await,
            None => {
                let (mut ws_tx, _ws_rx) = ws_stream.split();
                let _ = ws_tx
                    .send(Message::Close(Some(close_frame(
                        4001,
                        format!("Unknown log: {}", log),
                    ))))
                    .await;
                warn!(?addr, log = %log, "Declined session for unknown log");
                Ok(())
            }
        }
    }
}
