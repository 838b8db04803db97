//! WebSocket replay serving
//!
//! Clients connect with a log name (`ws://host:port/<log>` or `?log=<log>`)
//! and receive that log's frames in insertion order, one WebSocket message
//! per frame, followed by a `done` message.

mod request;
pub(crate) mod server;
mod session;

pub use request::ConnectRequest;
pub use server::{
    ReplayServer, ReplayServerOptions, SessionHandler, SourceRegistry, DEFAULT_PORT,
};
pub use session::{ReplaySession, ReplaySettings, DEFAULT_SEND_INTERVAL};
