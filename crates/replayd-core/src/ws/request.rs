//! Connection request parsing
//!
//! Clients identify the log they want either as the first path segment
//! (`ws://host:port/<log>`) or as a `log=` query parameter
//! (`ws://host:port/?log=<log>`). The query parameter wins when both are
//! present. Remaining query parameters are kept for handler use.

use std::collections::HashMap;

/// Parsed WebSocket handshake request.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectRequest {
    path: String,
    log: Option<String>,
    params: HashMap<String, String>,
}

impl ConnectRequest {
    /// Parse the request URI captured during the handshake.
    pub fn parse(uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (uri, None),
        };

        let mut params = HashMap::new();
        if let Some(query) = query {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                match pair.split_once('=') {
                    Some((key, value)) => params.insert(key.to_string(), value.to_string()),
                    None => params.insert(pair.to_string(), String::new()),
                };
            }
        }

        let log = params
            .get("log")
            .filter(|v| !v.is_empty())
            .cloned()
            .or_else(|| {
                path.trim_matches('/')
                    .split('/')
                    .next()
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string())
            });

        Self {
            path: path.to_string(),
            log,
            params,
        }
    }

    /// The log name the client asked for, if any.
    pub fn log(&self) -> Option<&str> {
        self.log.as_deref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|s| s.as_str())
    }
}
