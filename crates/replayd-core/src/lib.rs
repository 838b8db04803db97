//! replayd-core
//!
//! Replay server for recorded visualization logs: insertion-ordered frame
//! sources (in memory or on disk), a WebSocket server that streams a
//! requested log to each client, and the notebook widget state struct that
//! fronts it.

pub mod source;
pub mod widget;
pub mod ws;

pub use source::{DirectorySource, Frame, FramePayload, FrameSource, MemorySource};
pub use widget::ViewerWidget;
pub use ws::{
    ConnectRequest, ReplayServer, ReplayServerOptions, ReplaySession, ReplaySettings,
    SessionHandler, SourceRegistry, DEFAULT_PORT,
};
