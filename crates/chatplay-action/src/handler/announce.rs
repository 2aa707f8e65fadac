//! Announce action handler.
//!
//! Shows a fixed message on the operator console. Useful for dry runs of a
//! command table.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::handler::{parse_params, ActionParams, ChatAction};
use crate::presentation::Presentation;
use crate::types::ErrorOutcome;

#[derive(Debug, Deserialize)]
struct AnnounceParams {
    message: String,
}

/// Emits `message` as a status line (and a log line) every time it runs.
pub struct AnnounceAction {
    message: String,
    status: Option<Arc<dyn Presentation>>,
}

impl AnnounceAction {
    pub const KIND: &'static str = "announce";

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: Arc<dyn Presentation>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn from_params(params: &ActionParams) -> Result<Self, String> {
        let parsed: AnnounceParams = parse_params(params)?;
        if parsed.message.trim().is_empty() {
            return Err("message must not be empty".to_string());
        }
        Ok(Self::new(parsed.message))
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[async_trait]
impl ChatAction for AnnounceAction {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    async fn run(&self, force: bool) -> ErrorOutcome {
        tracing::info!(message = %self.message, force, "Announcement");
        if let Some(status) = &self.status {
            status.status(&self.message);
        }
        ErrorOutcome::success()
    }

    fn describe(&self) -> String {
        format!("Announce: {}", self.message)
    }
}
