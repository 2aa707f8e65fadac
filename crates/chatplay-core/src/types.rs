use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Newtype Wrappers
// =============================================================================

/// Wall-clock time in whole seconds since the Unix epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0, 0).unwrap_or_default()
    }
}

/// Normalize a username or channel for identity comparison.
///
/// Chat identities are case-insensitive and commonly arrive with stray
/// whitespace or a leading `#` on channel names.
pub fn normalize_identity(raw: &str) -> String {
    raw.trim().trim_start_matches('#').to_lowercase()
}

// =============================================================================
// Chat Messages
// =============================================================================

/// One chat line received from a message source.
///
/// Immutable once produced; the dispatcher consumes each message exactly once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender display name as received. Compare with [`ChatMessage::sender`].
    pub username: String,
    /// Channel the message was posted in.
    pub channel: String,
    /// Raw message text.
    pub payload: String,
    pub received_at: Timestamp,
}

impl ChatMessage {
    /// Build a message stamped with the current time.
    pub fn new(
        username: impl Into<String>,
        channel: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            channel: channel.into(),
            payload: payload.into(),
            received_at: Timestamp::now(),
        }
    }

    /// Case-insensitive sender identity.
    pub fn sender(&self) -> String {
        normalize_identity(&self.username)
    }

    /// Case-insensitive channel identity.
    pub fn channel_id(&self) -> String {
        normalize_identity(&self.channel)
    }
}
