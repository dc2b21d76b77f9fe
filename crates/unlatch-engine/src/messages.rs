//! Command and response messaging between external controllers and a
//! running engine.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Named requests an external controller may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    /// Clear `stopped` and re-evaluate immediately.
    ForceBypass,
    /// Scroll to the bottom, then force a bypass.
    ScrollToBottom,
    /// Scroll to the top.
    ScrollToTop,
}

/// Acknowledgement for a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

/// Inbound message for the scheduler task.
#[derive(Debug)]
pub enum EngineCommand {
    Request {
        request: Request,
        reply: oneshot::Sender<Response>,
    },
    /// External enable/disable toggle.
    SetEnabled(bool),
}
