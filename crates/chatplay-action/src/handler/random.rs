//! Random action handler.
//!
//! Runs one of the other public commands, picked uniformly at random.

use std::sync::Arc;

use async_trait::async_trait;
use rand::seq::IndexedRandom;

use crate::handler::ChatAction;
use crate::types::{ErrorOutcome, FailureFlag};

pub struct RandomAction {
    candidates: Vec<(String, Arc<dyn ChatAction>)>,
}

impl RandomAction {
    /// Reserved handler kind; the table builds it last from the other entries.
    pub const KIND: &'static str = "random";

    pub fn new(candidates: Vec<(String, Arc<dyn ChatAction>)>) -> Self {
        Self { candidates }
    }

    pub fn candidate_tags(&self) -> Vec<&str> {
        self.candidates.iter().map(|(tag, _)| tag.as_str()).collect()
    }
}

#[async_trait]
impl ChatAction for RandomAction {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    async fn run(&self, force: bool) -> ErrorOutcome {
        let picked = {
            let mut rng = rand::rng();
            self.candidates
                .choose(&mut rng)
                .map(|(tag, action)| (tag.clone(), Arc::clone(action)))
        };
        match picked {
            Some((tag, action)) => {
                tracing::info!(tag = %tag, "Random pick");
                action.run(force).await
            }
            None => ErrorOutcome::failure(FailureFlag::NothingToRun),
        }
    }

    fn describe(&self) -> String {
        format!("Random of {}", self.candidate_tags().join(", "))
    }
}
