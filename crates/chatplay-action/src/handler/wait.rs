//! Wait action handler.
//!
//! Holds a worker for a fixed time, standing in for held game inputs.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::handler::{parse_params, ActionParams, ChatAction};
use crate::types::ErrorOutcome;

#[derive(Debug, Deserialize)]
struct WaitParams {
    millis: u64,
}

pub struct WaitAction {
    duration: Duration,
}

impl WaitAction {
    pub const KIND: &'static str = "wait";

    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn from_params(params: &ActionParams) -> Result<Self, String> {
        let parsed: WaitParams = parse_params(params)?;
        Ok(Self::new(Duration::from_millis(parsed.millis)))
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

#[async_trait]
impl ChatAction for WaitAction {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    async fn run(&self, _force: bool) -> ErrorOutcome {
        tokio::time::sleep(self.duration).await;
        ErrorOutcome::success()
    }

    fn describe(&self) -> String {
        format!("Wait {}ms", self.duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_params() {
        let params = serde_json::json!({"millis": 250}).as_object().cloned().unwrap();
        let action = WaitAction::from_params(&params).unwrap();
        assert_eq!(action.duration(), Duration::from_millis(250));
        assert_eq!(action.describe(), "Wait 250ms");
    }

    #[test]
    fn test_negative_millis_rejected() {
        let params = serde_json::json!({"millis": -5}).as_object().cloned().unwrap();
        assert!(WaitAction::from_params(&params).is_err());
    }

    #[tokio::test]
    async fn test_wait_sleeps_for_duration() {
        let action = WaitAction::new(Duration::from_millis(30));
        let start = tokio::time::Instant::now();
        assert!(action.run(false).await.is_success());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
