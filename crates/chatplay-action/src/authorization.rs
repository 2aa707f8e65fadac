//! Authorization: decides whether one chat message fires an action.
//!
//! Pure apart from logging. Meant to be called from the dispatch loop only.

use std::collections::HashSet;
use std::sync::Arc;

use chatplay_core::{ChatMessage, ChatPlayConfig, Privilege};

use crate::blocklist::Blocklist;
use crate::switch::CommandSwitch;
use crate::table::ActionTable;
use crate::types::{AuthorizationDecision, RANDOM_TAG};

/// Why a message did not resolve to an action. None of these are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Commands are switched off. `tag` is what the message would have run,
    /// after the bot fallback and the `random` rule; `None` means no notice.
    Disabled { tag: Option<String> },
    /// No alias matched and the sender is not a bot.
    NoMatch,
    /// The command needs elevation the message does not have.
    Privileged { tag: String },
    /// The sender or the channel is blocklisted.
    Blocked { identity: String },
    /// The tag has no table entry (a bot fallback with no `random` command).
    MissingEntry { tag: String },
}

/// Result of resolving one message.
#[derive(Debug, Clone)]
pub enum Verdict {
    Run(AuthorizationDecision),
    Ignored(IgnoreReason),
}

impl Verdict {
    pub fn decision(&self) -> Option<&AuthorizationDecision> {
        match self {
            Verdict::Run(decision) => Some(decision),
            Verdict::Ignored(_) => None,
        }
    }

    pub fn into_decision(self) -> Option<AuthorizationDecision> {
        match self {
            Verdict::Run(decision) => Some(decision),
            Verdict::Ignored(_) => None,
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Verdict::Ignored(_))
    }
}

/// Turns chat messages into authorization decisions.
pub struct AuthorizationResolver {
    table: Arc<ActionTable>,
    switch: CommandSwitch,
    blocklist: Arc<dyn Blocklist>,
    superusers: HashSet<String>,
    bots: HashSet<String>,
    /// Mention the channel in log lines when listening to several.
    multi_channel: bool,
}

impl AuthorizationResolver {
    pub fn new(
        table: Arc<ActionTable>,
        switch: CommandSwitch,
        blocklist: Arc<dyn Blocklist>,
    ) -> Self {
        Self {
            table,
            switch,
            blocklist,
            superusers: HashSet::new(),
            bots: HashSet::new(),
            multi_channel: false,
        }
    }

    /// Resolver using the access lists and channel count from `config`.
    pub fn from_config(
        config: &ChatPlayConfig,
        table: Arc<ActionTable>,
        switch: CommandSwitch,
        blocklist: Arc<dyn Blocklist>,
    ) -> Self {
        Self::new(table, switch, blocklist)
            .with_superusers(&config.access.superusers)
            .with_bots(&config.access.bots)
            .with_multi_channel(config.channels.len() > 1)
    }

    pub fn with_superusers<S: AsRef<str>>(mut self, users: &[S]) -> Self {
        self.superusers = users
            .iter()
            .map(|u| chatplay_core::normalize_identity(u.as_ref()))
            .collect();
        self
    }

    pub fn with_bots<S: AsRef<str>>(mut self, users: &[S]) -> Self {
        self.bots = users
            .iter()
            .map(|u| chatplay_core::normalize_identity(u.as_ref()))
            .collect();
        self
    }

    pub fn with_multi_channel(mut self, multi_channel: bool) -> Self {
        self.multi_channel = multi_channel;
        self
    }

    pub fn table(&self) -> &ActionTable {
        &self.table
    }

    pub fn switch(&self) -> &CommandSwitch {
        &self.switch
    }

    pub fn blocklist(&self) -> &dyn Blocklist {
        self.blocklist.as_ref()
    }

    /// Decide whether `msg` fires an action, and with what elevation.
    pub fn resolve(&self, msg: &ChatMessage) -> Verdict {
        let text = msg.payload.trim().to_lowercase();
        let prefixed = self.table.strip_superuser_prefix(&text).is_some();
        let sender = msg.sender();
        let is_bot = self.bots.contains(&sender);
        let mut elevated = prefixed && self.superusers.contains(&sender);

        let tag = match self.table.find_tag_by_alias(&text) {
            Some(tag) => Some(tag.to_string()),
            None if is_bot => {
                elevated = false;
                Some(RANDOM_TAG.to_string())
            }
            None => None,
        };

        // `random` is never directly user-triggerable: it needs elevation or a
        // bot sender. Kept separate from the general privilege rule below.
        let random_denied = tag.as_deref() == Some(RANDOM_TAG) && !elevated && !is_bot;

        if !self.switch.is_enabled() {
            // Only a trigger that would otherwise have run earns a notice.
            let tag = if random_denied { None } else { tag };
            return Verdict::Ignored(IgnoreReason::Disabled { tag });
        }

        let Some(tag) = tag else {
            return Verdict::Ignored(IgnoreReason::NoMatch);
        };
        if random_denied {
            return Verdict::Ignored(IgnoreReason::Privileged { tag });
        }

        let Some(entry) = self.table.get(&tag) else {
            return Verdict::Ignored(IgnoreReason::MissingEntry { tag });
        };

        let bot_random = tag == RANDOM_TAG && is_bot;
        if entry.privilege == Privilege::SuperuserOnly && !elevated && !bot_random {
            return Verdict::Ignored(IgnoreReason::Privileged { tag });
        }

        let channel = msg.channel_id();
        for identity in [&sender, &channel] {
            if !identity.is_empty() && self.blocklist.is_blocked(identity) {
                return Verdict::Ignored(IgnoreReason::Blocked {
                    identity: identity.clone(),
                });
            }
        }

        let decision = AuthorizationDecision {
            action: Arc::clone(&entry.action),
            tag,
            elevated,
            owner: msg.username.clone(),
            channel: msg.channel.clone(),
        };

        if self.multi_channel {
            tracing::info!(
                tag = %decision.tag,
                user = %decision.owner,
                elevated = decision.elevated,
                channel = %decision.channel,
                "Command authorized"
            );
        } else {
            tracing::info!(
                tag = %decision.tag,
                user = %decision.owner,
                elevated = decision.elevated,
                "Command authorized"
            );
        }

        Verdict::Run(decision)
    }

    /// Operator-facing line announcing an authorized command.
    pub fn running_line(&self, decision: &AuthorizationDecision) -> String {
        let mut line = format!(
            "Running {}'{}' from {}",
            if decision.elevated { "superuser " } else { "" },
            decision.tag,
            decision.owner
        );
        if self.multi_channel {
            line.push_str(" in channel ");
            line.push_str(&decision.channel);
        }
        line
    }
}
