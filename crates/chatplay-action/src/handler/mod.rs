//! Action handler registry and trait definition.
//!
//! Defines the `ChatAction` async trait and the registry that turns a
//! handler kind from configuration into a runnable action.

pub mod announce;
pub mod random;
pub mod shell_command;
pub mod toggle;
pub mod wait;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::presentation::Presentation;
use crate::switch::CommandSwitch;
use crate::types::ErrorOutcome;

pub use announce::AnnounceAction;
pub use random::RandomAction;
pub use shell_command::ShellCommandAction;
pub use toggle::ToggleCommandsAction;
pub use wait::WaitAction;

/// Handler parameters as written under `[commands.<tag>.params]`.
pub type ActionParams = serde_json::Map<String, serde_json::Value>;

/// Something a chat command can trigger.
///
/// Expected failures are reported through the returned outcome. A panic is
/// reserved for bugs; the engine turns it into a `Panic` flag.
#[async_trait]
pub trait ChatAction: Send + Sync {
    /// Handler kind this action was built from.
    fn kind(&self) -> &'static str;

    /// Run the action. `force` is set for superuser invocations.
    async fn run(&self, force: bool) -> ErrorOutcome;

    /// Short human-readable description for the operator console.
    fn describe(&self) -> String {
        self.kind().to_string()
    }
}

/// Shared state handed to factories while the table is built.
#[derive(Clone, Default)]
pub struct ActionContext {
    pub switch: CommandSwitch,
    /// Where actions write operator-facing lines. Log-only when `None`.
    pub status: Option<Arc<dyn Presentation>>,
}

impl ActionContext {
    pub fn new(switch: CommandSwitch) -> Self {
        Self {
            switch,
            status: None,
        }
    }

    pub fn with_status(mut self, status: Arc<dyn Presentation>) -> Self {
        self.status = Some(status);
        self
    }
}

impl std::fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionContext")
            .field("switch", &self.switch)
            .field("status", &self.status.is_some())
            .finish()
    }
}

type ActionFactory =
    Box<dyn Fn(&ActionParams, &ActionContext) -> Result<Arc<dyn ChatAction>, String> + Send + Sync>;

/// Maps handler kinds to factories.
#[derive(Default)]
pub struct ActionRegistry {
    factories: HashMap<String, ActionFactory>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in handler kind.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_defaults();
        registry
    }

    /// Register the built-in handler kinds.
    pub fn register_defaults(&mut self) {
        self.register(AnnounceAction::KIND, |params, ctx| {
            let mut action = AnnounceAction::from_params(params)?;
            if let Some(status) = &ctx.status {
                action = action.with_status(Arc::clone(status));
            }
            Ok(Arc::new(action) as Arc<dyn ChatAction>)
        });
        self.register(WaitAction::KIND, |params, _| {
            Ok(Arc::new(WaitAction::from_params(params)?) as Arc<dyn ChatAction>)
        });
        self.register(ShellCommandAction::KIND, |params, _| {
            Ok(Arc::new(ShellCommandAction::from_params(params)?) as Arc<dyn ChatAction>)
        });
        self.register(ToggleCommandsAction::KIND, |_, ctx| {
            Ok(Arc::new(ToggleCommandsAction::new(ctx.switch.clone())) as Arc<dyn ChatAction>)
        });
    }

    /// Register (or replace) a factory for `kind`.
    pub fn register<F>(&mut self, kind: &str, factory: F)
    where
        F: Fn(&ActionParams, &ActionContext) -> Result<Arc<dyn ChatAction>, String>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(kind.to_string(), Box::new(factory));
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Build an action. `None` when the kind is not registered.
    pub fn build(
        &self,
        kind: &str,
        params: &ActionParams,
        ctx: &ActionContext,
    ) -> Option<Result<Arc<dyn ChatAction>, String>> {
        self.factories.get(kind).map(|factory| factory(params, ctx))
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

/// Deserialize handler parameters into a typed struct.
pub(crate) fn parse_params<T: DeserializeOwned>(params: &ActionParams) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::Object(params.clone())).map_err(|e| e.to_string())
}
