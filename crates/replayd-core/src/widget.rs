//! Notebook widget state
//!
//! Back-end half of the notebook viewer widget: a plain state struct whose
//! attributes are synchronized to the front-end rendering context. The
//! front-end package registers the model/view pair named below and connects
//! to the replay server using the synced `log` and `port` attributes.

use crate::ws::DEFAULT_PORT;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const MODEL_NAME: &str = "ReplayViewerModel";
pub const VIEW_NAME: &str = "ReplayViewerView";
pub const WIDGET_MODULE: &str = "@replayd/jupyter-widget";
pub const WIDGET_MODULE_VERSION: &str = "^0.1.0";

/// Synced widget attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerWidget {
    /// Log name the viewer requests from the replay server.
    pub log: String,
    /// Replay server port the viewer connects to.
    pub port: u16,
    /// Map tile access token forwarded to the base-map layer.
    pub mapbox_access_token: String,
}

impl Default for ViewerWidget {
    fn default() -> Self {
        Self {
            log: "default".to_string(),
            port: DEFAULT_PORT,
            mapbox_access_token: String::new(),
        }
    }
}

impl ViewerWidget {
    pub fn new(log: impl Into<String>) -> Self {
        Self {
            log: log.into(),
            ..Default::default()
        }
    }

    /// Reject attribute combinations the front-end cannot use.
    pub fn validate(&self) -> Result<()> {
        if self.log.is_empty() {
            return Err(anyhow!("widget log name must not be empty"));
        }
        if self.port == 0 {
            return Err(anyhow!("widget port must not be 0"));
        }
        Ok(())
    }

    /// Full state payload synchronized to the host: model/view metadata plus
    /// the synced attributes.
    pub fn sync_state(&self) -> Result<Value> {
        self.validate()?;
        Ok(json!({
            "_model_name": MODEL_NAME,
            "_model_module": WIDGET_MODULE,
            "_model_module_version": WIDGET_MODULE_VERSION,
            "_view_name": VIEW_NAME,
            "_view_module": WIDGET_MODULE,
            "_view_module_version": WIDGET_MODULE_VERSION,
            "log": self.log,
            "port": self.port,
            "mapboxAccessToken": self.mapbox_access_token,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let widget = ViewerWidget::default();
        assert_eq!(widget.log, "default");
        assert_eq!(widget.port, 3000);
        assert_eq!(widget.mapbox_access_token, "");
        assert!(widget.validate().is_ok());
    }

    #[test]
    fn test_sync_state_payload() {
        let mut widget = ViewerWidget::new("kitti-0005");
        widget.mapbox_access_token = "pk.token".to_string();

        let state = widget.sync_state().unwrap();
        assert_eq!(state["_model_name"], "ReplayViewerModel");
        assert_eq!(state["_view_name"], "ReplayViewerView");
        assert_eq!(state["_model_module"], state["_view_module"]);
        assert_eq!(state["log"], "kitti-0005");
        assert_eq!(state["port"], 3000);
        assert_eq!(state["mapboxAccessToken"], "pk.token");
    }

    #[test]
    fn test_validation_rejects_bad_attributes() {
        let mut widget = ViewerWidget::new("");
        assert!(widget.validate().is_err());

        widget.log = "ok".to_string();
        widget.port = 0;
        assert!(widget.validate().is_err());
        assert!(widget.sync_state().is_err());
    }

    #[test]
    fn test_serde_uses_camel_case() {
        let widget = ViewerWidget::default();
        let text = serde_json::to_string(&widget).unwrap();
        assert!(text.contains("mapboxAccessToken"));

        let parsed: ViewerWidget =
            serde_json::from_str("{\"log\":\"a\",\"port\":9000,\"mapboxAccessToken\":\"t\"}")
                .unwrap();
        assert_eq!(parsed.port, 9000);
    }
}
