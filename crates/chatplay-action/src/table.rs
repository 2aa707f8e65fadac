//! Action table: tag → command entry, plus alias lookup.
//!
//! Built once at startup from `[commands.*]` and read-only afterwards.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chatplay_core::{ChatPlayConfig, CommandConfig, Privilege};

use crate::error::TableError;
use crate::handler::{ActionContext, ActionRegistry, ChatAction, RandomAction};
use crate::types::{CommandEntry, RANDOM_TAG};

/// The loaded command table.
#[derive(Debug)]
pub struct ActionTable {
    entries: BTreeMap<String, CommandEntry>,
    /// (alias, tag) sorted longest alias first.
    aliases: Vec<(String, String)>,
    superuser_prefix: String,
}

impl ActionTable {
    /// Build from a full configuration.
    pub fn from_config(
        config: &ChatPlayConfig,
        registry: &ActionRegistry,
        ctx: &ActionContext,
    ) -> Result<Self, TableError> {
        Self::build(
            &config.commands,
            &config.engine.superuser_prefix,
            registry,
            ctx,
        )
    }

    /// Build the table, resolving every command's handler kind.
    ///
    /// Fails on the first duplicate alias, duplicate tag, unknown kind or
    /// bad parameter set. The `random` kind is only accepted under the
    /// `random` tag, and that tag only with that kind.
    pub fn build(
        commands: &BTreeMap<String, CommandConfig>,
        superuser_prefix: &str,
        registry: &ActionRegistry,
        ctx: &ActionContext,
    ) -> Result<Self, TableError> {
        let mut entries: BTreeMap<String, CommandEntry> = BTreeMap::new();
        let mut alias_owner: HashMap<String, String> = HashMap::new();
        let mut deferred_random: Vec<(String, Vec<String>, Privilege)> = Vec::new();
        let superuser_prefix = superuser_prefix.trim().to_lowercase();

        for (raw_tag, command) in commands {
            let tag = raw_tag.trim().to_string();
            if entries.contains_key(&tag) || deferred_random.iter().any(|(t, _, _)| *t == tag) {
                return Err(TableError::DuplicateTag(tag));
            }

            let kind = command.action.trim();
            if (kind == RandomAction::KIND) != (tag == RANDOM_TAG) {
                return Err(TableError::ReservedRandom {
                    tag,
                    kind: kind.to_string(),
                });
            }

            let aliases = normalize_aliases(&tag, &command.aliases, &superuser_prefix)?;
            for alias in &aliases {
                if let Some(first) = alias_owner.get(alias) {
                    return Err(TableError::DuplicateAlias {
                        alias: alias.clone(),
                        first: first.clone(),
                        second: tag.clone(),
                    });
                }
                alias_owner.insert(alias.clone(), tag.clone());
            }

            if kind == RandomAction::KIND {
                deferred_random.push((tag, aliases, command.privilege));
                continue;
            }

            let action = registry
                .build(kind, &command.params, ctx)
                .ok_or_else(|| TableError::UnknownAction {
                    tag: tag.clone(),
                    kind: kind.to_string(),
                })?
                .map_err(|reason| TableError::InvalidParams {
                    tag: tag.clone(),
                    reason,
                })?;

            entries.insert(
                tag.clone(),
                CommandEntry {
                    tag,
                    aliases,
                    privilege: command.privilege,
                    kind: kind.to_string(),
                    action,
                },
            );
        }

        // Random picks among the public, concrete commands built above.
        let candidates: Vec<(String, Arc<dyn ChatAction>)> = entries
            .values()
            .filter(|entry| entry.privilege == Privilege::Public)
            .map(|entry| (entry.tag.clone(), Arc::clone(&entry.action)))
            .collect();
        for (tag, aliases, privilege) in deferred_random {
            let action: Arc<dyn ChatAction> = Arc::new(RandomAction::new(candidates.clone()));
            entries.insert(
                tag.clone(),
                CommandEntry {
                    tag,
                    aliases,
                    privilege,
                    kind: RandomAction::KIND.to_string(),
                    action,
                },
            );
        }

        let mut aliases: Vec<(String, String)> = alias_owner.into_iter().collect();
        aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        tracing::debug!(commands = entries.len(), "Action table built");

        Ok(Self {
            entries,
            aliases,
            superuser_prefix,
        })
    }

    /// Find the tag whose alias is the longest prefix of `text`.
    ///
    /// Matching is case-insensitive, ignores surrounding whitespace and a
    /// leading superuser prefix, and only accepts an alias that ends at a
    /// word boundary (`"jump"` matches `"jump high"` but not `"jumping"`).
    pub fn find_tag_by_alias(&self, text: &str) -> Option<&str> {
        let lowered = text.trim().to_lowercase();
        let stripped = self.strip_superuser_prefix(&lowered).unwrap_or(&lowered);
        let stripped = stripped.trim_start();

        self.aliases
            .iter()
            .find(|(alias, _)| matches_at_boundary(stripped, alias))
            .map(|(_, tag)| tag.as_str())
    }

    /// The remainder of `text` after the superuser prefix, if present.
    /// `text` is compared as given; callers lowercase it first.
    pub fn strip_superuser_prefix<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.strip_prefix(self.superuser_prefix.as_str())
    }

    pub fn superuser_prefix(&self) -> &str {
        &self.superuser_prefix
    }

    pub fn get(&self, tag: &str) -> Option<&CommandEntry> {
        self.entries.get(tag)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CommandEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Canonical aliases of every command, for pasting into chat.
    pub fn commands_str(&self) -> String {
        self.entries
            .values()
            .map(CommandEntry::canonical_alias)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn normalize_aliases(
    tag: &str,
    raw: &[String],
    superuser_prefix: &str,
) -> Result<Vec<String>, TableError> {
    let mut aliases: Vec<String> = Vec::with_capacity(raw.len());
    for alias in raw {
        let alias = alias.trim().to_lowercase();
        if alias.is_empty() {
            return Err(TableError::InvalidParams {
                tag: tag.to_string(),
                reason: "aliases must not be blank".to_string(),
            });
        }
        // Lookup strips the prefix first, so such an alias could never match.
        if !superuser_prefix.is_empty() && alias.starts_with(superuser_prefix) {
            return Err(TableError::InvalidParams {
                tag: tag.to_string(),
                reason: format!("alias '{alias}' starts with the superuser prefix '{superuser_prefix}'"),
            });
        }
        if !aliases.contains(&alias) {
            aliases.push(alias);
        }
    }
    if aliases.is_empty() {
        return Err(TableError::EmptyAliases(tag.to_string()));
    }
    Ok(aliases)
}

fn matches_at_boundary(text: &str, alias: &str) -> bool {
    match text.strip_prefix(alias) {
        Some(rest) => rest.is_empty() || rest.starts_with(char::is_whitespace),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commands(entries: &[(&str, CommandConfig)]) -> BTreeMap<String, CommandConfig> {
        entries
            .iter()
            .map(|(tag, cmd)| (tag.to_string(), cmd.clone()))
            .collect()
    }

    fn announce(aliases: &[&str]) -> CommandConfig {
        CommandConfig::new(aliases, "announce").with_param("message", "hi")
    }

    fn build(entries: &[(&str, CommandConfig)]) -> Result<ActionTable, TableError> {
        ActionTable::build(
            &commands(entries),
            "!",
            &ActionRegistry::with_defaults(),
            &ActionContext::default(),
        )
    }

    #[test]
    fn test_exact_alias_lookup() {
        let table = build(&[("jump", announce(&["jump", "j"])), ("duck", announce(&["duck"]))])
            .unwrap();
        assert_eq!(table.find_tag_by_alias("jump"), Some("jump"));
        assert_eq!(table.find_tag_by_alias("j"), Some("jump"));
        assert_eq!(table.find_tag_by_alias("duck"), Some("duck"));
        assert_eq!(table.find_tag_by_alias("fly"), None);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let table = build(&[("jump", announce(&["Jump"]))]).unwrap();
        assert_eq!(table.find_tag_by_alias("JUMP"), Some("jump"));
        assert_eq!(table.find_tag_by_alias("  jUmP  "), Some("jump"));
    }

    #[test]
    fn test_lookup_strips_superuser_prefix() {
        let table = build(&[("skip", announce(&["skip"]))]).unwrap();
        assert_eq!(table.find_tag_by_alias("!skip"), Some("skip"));
        assert_eq!(table.find_tag_by_alias("! skip"), Some("skip"));
    }

    #[test]
    fn test_longest_alias_wins() {
        let table = build(&[
            ("left", announce(&["go"])),
            ("far_left", announce(&["go left"])),
        ])
        .unwrap();
        assert_eq!(table.find_tag_by_alias("go left now"), Some("far_left"));
        assert_eq!(table.find_tag_by_alias("go right"), Some("left"));
    }

    #[test]
    fn test_alias_must_end_at_word_boundary() {
        let table = build(&[("jump", announce(&["jump"]))]).unwrap();
        assert_eq!(table.find_tag_by_alias("jumping"), None);
        assert_eq!(table.find_tag_by_alias("jump please"), Some("jump"));
    }

    #[test]
    fn test_duplicate_alias_across_tags() {
        let err = build(&[("a", announce(&["go"])), ("b", announce(&["GO"]))]).unwrap_err();
        match err {
            TableError::DuplicateAlias { alias, first, second } => {
                assert_eq!(alias, "go");
                assert_eq!(first, "a");
                assert_eq!(second, "b");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_repeated_alias_within_one_tag_is_merged() {
        let table = build(&[("jump", announce(&["jump", "JUMP"]))]).unwrap();
        assert_eq!(table.get("jump").unwrap().aliases, vec!["jump"]);
    }

    #[test]
    fn test_duplicate_tag_after_trimming() {
        let err = build(&[(" jump", announce(&["a"])), ("jump", announce(&["b"]))]).unwrap_err();
        assert!(matches!(err, TableError::DuplicateTag(tag) if tag == "jump"));
    }

    #[test]
    fn test_tags_keep_their_case() {
        let table = build(&[("S", announce(&["skip"]))]).unwrap();
        assert_eq!(table.find_tag_by_alias("SKIP"), Some("S"));
        assert!(table.get("S").is_some());
    }

    #[test]
    fn test_unknown_action() {
        let err = build(&[("fly", CommandConfig::new(&["fly"], "teleport"))]).unwrap_err();
        assert!(matches!(err, TableError::UnknownAction { kind, .. } if kind == "teleport"));
    }

    #[test]
    fn test_invalid_params() {
        let err = build(&[("hold", CommandConfig::new(&["hold"], "wait"))]).unwrap_err();
        assert!(matches!(err, TableError::InvalidParams { tag, .. } if tag == "hold"));
    }

    #[test]
    fn test_empty_aliases() {
        let err = build(&[("hold", announce(&[]))]).unwrap_err();
        assert!(matches!(err, TableError::EmptyAliases(_)));
    }

    #[test]
    fn test_random_built_from_public_entries() {
        let table = build(&[
            ("jump", announce(&["jump"])),
            ("duck", announce(&["duck"])),
            ("secret", announce(&["secret"]).superuser_only()),
            (RANDOM_TAG, CommandConfig::new(&["random"], "random").superuser_only()),
        ])
        .unwrap();

        let random = table.get(RANDOM_TAG).unwrap();
        assert_eq!(random.kind, "random");
        assert_eq!(random.privilege, Privilege::SuperuserOnly);
        assert_eq!(random.action.describe(), "Random of duck, jump");
    }

    #[test]
    fn test_random_kind_under_other_tag_rejected() {
        let err = build(&[
            ("jump", announce(&["jump"])),
            ("chaos", CommandConfig::new(&["chaos"], "random")),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            TableError::ReservedRandom { tag, kind } if tag == "chaos" && kind == "random"
        ));
    }

    #[test]
    fn test_random_tag_with_other_kind_rejected() {
        let err = build(&[(RANDOM_TAG, announce(&["random"]))]).unwrap_err();
        assert!(matches!(
            err,
            TableError::ReservedRandom { tag, kind } if tag == RANDOM_TAG && kind == "announce"
        ));
    }

    #[test]
    fn test_alias_starting_with_superuser_prefix_rejected() {
        let err = build(&[("help", announce(&["help", "!help"]))]).unwrap_err();
        match err {
            TableError::InvalidParams { tag, reason } => {
                assert_eq!(tag, "help");
                assert!(reason.contains("'!help'"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_commands_str_uses_canonical_aliases() {
        let table = build(&[("jump", announce(&["jump", "j"])), ("duck", announce(&["crouch", "duck"]))])
            .unwrap();
        assert_eq!(table.commands_str(), "crouch, jump");
        assert_eq!(table.len(), 2);
        assert!(!table.is_empty());
    }

    #[test]
    fn test_from_default_config() {
        let config = ChatPlayConfig::default();
        let table = ActionTable::from_config(
            &config,
            &ActionRegistry::with_defaults(),
            &ActionContext::default(),
        )
        .unwrap();
        assert_eq!(table.len(), config.commands.len());
        assert_eq!(table.superuser_prefix(), "!");
    }
}
