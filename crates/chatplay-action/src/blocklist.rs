//! Blocked users and channels.
//!
//! The dispatcher only asks "is this identity blocked?" and occasionally
//! asks the store to refresh itself; persistence is up to the implementation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use chatplay_core::normalize_identity;

use crate::error::BlocklistError;

/// Predicate over usernames and channel names.
pub trait Blocklist: Send + Sync {
    /// Whether `identity` (a username or channel) is blocked.
    fn is_blocked(&self, identity: &str) -> bool;

    /// Bring the list up to date for `scope` (a channel name). May be a no-op.
    fn refresh(&self, scope: &str);
}

/// Fixed in-memory blocklist.
#[derive(Debug, Default)]
pub struct StaticBlocklist {
    blocked: HashSet<String>,
}

impl StaticBlocklist {
    pub fn new<I, S>(identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            blocked: identities
                .into_iter()
                .map(|s| normalize_identity(s.as_ref()))
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl Blocklist for StaticBlocklist {
    fn is_blocked(&self, identity: &str) -> bool {
        self.blocked.contains(&normalize_identity(identity))
    }

    fn refresh(&self, _scope: &str) {}
}

#[derive(Debug, Default)]
struct FileState {
    blocked: HashSet<String>,
    modified: Option<SystemTime>,
}

/// Blocklist backed by a text file, one identity per line.
///
/// Blank lines and lines starting with `#` are ignored. The file is re-read
/// on `refresh` only when its modification time changed. A missing file is
/// an empty list; a read failure keeps the previous contents.
#[derive(Debug)]
pub struct FileBlocklist {
    path: PathBuf,
    state: Mutex<FileState>,
}

impl FileBlocklist {
    /// Open and read the file once. A missing file is not an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, BlocklistError> {
        let list = Self {
            path: path.into(),
            state: Mutex::new(FileState::default()),
        };
        list.reload()?;
        Ok(list)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .blocked
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Re-read the file if it changed since the last read.
    /// Returns whether the contents were reloaded.
    pub fn reload(&self) -> Result<bool, BlocklistError> {
        let modified = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.modified().ok(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
                let had_entries = !state.blocked.is_empty();
                *state = FileState::default();
                return Ok(had_entries);
            }
            Err(source) => {
                return Err(BlocklistError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        {
            let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if modified.is_some() && state.modified == modified {
                return Ok(false);
            }
        }

        let content = std::fs::read_to_string(&self.path).map_err(|source| BlocklistError::Read {
            path: self.path.clone(),
            source,
        })?;
        let blocked = parse_blocklist(&content);

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(path = %self.path.display(), entries = blocked.len(), "Blocklist loaded");
        *state = FileState { blocked, modified };
        Ok(true)
    }
}

impl Blocklist for FileBlocklist {
    fn is_blocked(&self, identity: &str) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .blocked
            .contains(&normalize_identity(identity))
    }

    fn refresh(&self, scope: &str) {
        if let Err(e) = self.reload() {
            tracing::warn!(scope = %scope, error = %e, "Blocklist refresh failed; keeping previous list");
        }
    }
}

/// `#name` is a channel; `#` followed by whitespace (or nothing) is a comment.
fn is_comment(line: &str) -> bool {
    match line.strip_prefix('#') {
        Some(rest) => rest.is_empty() || rest.starts_with(char::is_whitespace),
        None => false,
    }
}

fn parse_blocklist(content: &str) -> HashSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_comment(line))
        .map(normalize_identity)
        .filter(|id| !id.is_empty())
        .collect()
}
