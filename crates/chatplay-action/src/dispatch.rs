//! The dispatch loop: messages in, admitted tasks out.
//!
//! Runs on a single task. Every read of the command switch and every
//! governor admission happens here, in message arrival order.

use std::sync::Arc;
use std::time::Duration;

use chatplay_core::{ChatMessage, ChatPlayConfig};

use crate::authorization::{AuthorizationResolver, IgnoreReason, Verdict};
use crate::blocklist::Blocklist;
use crate::engine::ExecutionEngine;
use crate::error::Rejection;
use crate::governor::Governor;
use crate::presentation::Presentation;
use crate::source::MessageSource;
use crate::switch::CommandSwitch;
use crate::table::ActionTable;
use crate::task::{Completion, TaskHandle};

/// Counters for one dispatcher run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub received: u64,
    /// Messages that resolved to nothing, including `disabled`.
    pub ignored: u64,
    /// Matched commands dropped because commands were switched off.
    pub disabled: u64,
    pub overloaded: u64,
    pub too_soon: u64,
    pub saturated: u64,
    pub submitted: u64,
}

/// What happened to one message.
#[derive(Debug)]
pub enum MessageOutcome {
    Ignored(IgnoreReason),
    Rejected(Rejection),
    Saturated,
    Submitted(TaskHandle),
}

pub struct Dispatcher {
    source: Box<dyn MessageSource>,
    resolver: AuthorizationResolver,
    governor: Governor,
    engine: ExecutionEngine,
    presentation: Arc<dyn Presentation>,
    channels: Vec<String>,
    poll_timeout: Duration,
    stats: DispatchStats,
}

impl Dispatcher {
    /// Create a dispatcher and its execution engine. Needs a tokio runtime.
    pub fn new(
        source: Box<dyn MessageSource>,
        resolver: AuthorizationResolver,
        governor: Governor,
        presentation: Arc<dyn Presentation>,
        pool_size: usize,
        poll_timeout: Duration,
    ) -> Self {
        let sink = Arc::clone(&presentation);
        let engine = ExecutionEngine::new(pool_size, move |completion: &Completion| {
            report_completion(sink.as_ref(), completion);
        });

        Self {
            source,
            resolver,
            governor,
            engine,
            presentation,
            channels: Vec::new(),
            poll_timeout,
            stats: DispatchStats::default(),
        }
    }

    /// Wire a dispatcher from configuration.
    pub fn from_config(
        config: &ChatPlayConfig,
        table: Arc<ActionTable>,
        switch: CommandSwitch,
        blocklist: Arc<dyn Blocklist>,
        source: Box<dyn MessageSource>,
        presentation: Arc<dyn Presentation>,
    ) -> Self {
        let resolver = AuthorizationResolver::from_config(config, table, switch, blocklist);
        Self::new(
            source,
            resolver,
            Governor::from_config(&config.engine),
            presentation,
            config.engine.worker_threads(),
            config.engine.poll_timeout(),
        )
        .with_channels(config.channels.clone())
    }

    /// Channels whose blocklist scope is refreshed on every message.
    pub fn with_channels(mut self, channels: Vec<String>) -> Self {
        self.channels = channels;
        self
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn governor(&self) -> &Governor {
        &self.governor
    }

    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    pub fn resolver(&self) -> &AuthorizationResolver {
        &self.resolver
    }

    /// Run until the presentation asks to exit or the source runs dry.
    ///
    /// Tasks still in flight are not awaited; see [`Dispatcher::drain`].
    pub async fn run(&mut self) -> DispatchStats {
        tracing::info!(
            commands = self.resolver.table().len(),
            max_concurrent = self.governor.max_concurrent(),
            "Dispatch loop started"
        );

        loop {
            self.presentation.tick();
            if self.presentation.exit_requested() {
                tracing::info!("Exit requested");
                break;
            }
            if self.source.is_finished() {
                tracing::info!("Message source finished");
                break;
            }

            if let Some(msg) = self.source.try_next(self.poll_timeout).await {
                self.handle_message(msg);
            }
        }

        tracing::info!(
            received = self.stats.received,
            submitted = self.stats.submitted,
            in_flight = self.engine.pending(),
            "Dispatch loop stopped"
        );
        self.stats
    }

    /// Authorize, admit and submit one message.
    pub fn handle_message(&mut self, msg: ChatMessage) -> MessageOutcome {
        self.stats.received += 1;
        self.refresh_blocklist(&msg);

        let decision = match self.resolver.resolve(&msg) {
            Verdict::Run(decision) => decision,
            Verdict::Ignored(reason) => {
                self.stats.ignored += 1;
                if let IgnoreReason::Disabled { tag: Some(tag) } = &reason {
                    self.stats.disabled += 1;
                    self.presentation.status(&format!(
                        "Commands disabled! Ignoring '{}' from {}",
                        tag, msg.username
                    ));
                }
                tracing::trace!(user = %msg.username, reason = ?reason, "Message ignored");
                return MessageOutcome::Ignored(reason);
            }
        };

        let ticket = match self.governor.try_admit() {
            Ok(ticket) => ticket,
            Err(rejection) => {
                match rejection {
                    Rejection::Overloaded { .. } => self.stats.overloaded += 1,
                    Rejection::TooSoon { .. } => self.stats.too_soon += 1,
                }
                tracing::debug!(
                    tag = %decision.tag,
                    user = %decision.owner,
                    reason = %rejection,
                    "Trigger dropped"
                );
                return MessageOutcome::Rejected(rejection);
            }
        };

        let running = self.resolver.running_line(&decision);
        match self.engine.submit(decision, ticket) {
            Ok(handle) => {
                self.stats.submitted += 1;
                self.presentation.status(&running);
                MessageOutcome::Submitted(handle)
            }
            Err(e) => {
                self.stats.saturated += 1;
                tracing::warn!(error = %e, "Task dropped");
                MessageOutcome::Saturated
            }
        }
    }

    /// Wait up to `timeout` for in-flight completions to be delivered.
    /// Returns whether everything finished.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.engine.pending() > 0 {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        true
    }

    fn refresh_blocklist(&self, msg: &ChatMessage) {
        let blocklist = self.resolver.blocklist();
        for channel in &self.channels {
            blocklist.refresh(channel);
        }
        if !self.channels.iter().any(|c| c.eq_ignore_ascii_case(&msg.channel)) {
            blocklist.refresh(&msg.channel);
        }
    }
}

fn report_completion(presentation: &dyn Presentation, completion: &Completion) {
    if completion.is_success() {
        tracing::info!(tag = %completion.tag, user = %completion.owner, "Command finished");
    } else {
        tracing::warn!(
            tag = %completion.tag,
            user = %completion.owner,
            outcome = %completion.outcome,
            fault = ?completion.fault,
            "Command failed"
        );
    }
    presentation.status(&completion.status_line());
}
