//! Message sources: where chat lines come from.
//!
//! The dispatch loop polls a source with a short timeout so it can keep
//! ticking the presentation layer and checking for exit between messages.

use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chatplay_core::ChatMessage;
use tokio::sync::mpsc;

/// A lazy, possibly empty stream of chat messages.
#[async_trait]
pub trait MessageSource: Send {
    /// Next message, or `None` if nothing arrived within `timeout`.
    async fn try_next(&mut self, timeout: Duration) -> Option<ChatMessage>;

    /// Whether the source can never yield another message.
    fn is_finished(&self) -> bool {
        false
    }
}

/// Parse one offline line: `user: text` or `user@channel: text`.
///
/// Lines without a `:` or with an empty user are skipped.
pub fn parse_chat_line(line: &str, default_channel: &str) -> Option<ChatMessage> {
    let (sender, text) = line.split_once(':')?;
    let sender = sender.trim();
    let (user, channel) = match sender.split_once('@') {
        Some((user, channel)) if !channel.trim().is_empty() => (user.trim(), channel.trim()),
        Some((user, _)) => (user.trim(), default_channel),
        None => (sender, default_channel),
    };
    if user.is_empty() {
        return None;
    }
    Some(ChatMessage::new(user, channel, text.trim()))
}

/// Pre-recorded messages, delivered in order.
#[derive(Debug, Default)]
pub struct ReplaySource {
    queue: VecDeque<ChatMessage>,
}

impl ReplaySource {
    pub fn new<I>(messages: I) -> Self
    where
        I: IntoIterator<Item = ChatMessage>,
    {
        Self {
            queue: messages.into_iter().collect(),
        }
    }

    /// Parse `user: text` lines; unparseable lines are dropped.
    pub fn from_lines<'a, I>(lines: I, default_channel: &str) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::new(
            lines
                .into_iter()
                .filter_map(|line| parse_chat_line(line, default_channel)),
        )
    }

    pub fn from_file(path: &Path, default_channel: &str) -> chatplay_core::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let source = Self::from_lines(content.lines(), default_channel);
        tracing::info!(path = %path.display(), messages = source.len(), "Replay loaded");
        Ok(source)
    }

    pub fn push(&mut self, msg: ChatMessage) {
        self.queue.push_back(msg);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[async_trait]
impl MessageSource for ReplaySource {
    async fn try_next(&mut self, timeout: Duration) -> Option<ChatMessage> {
        match self.queue.pop_front() {
            Some(msg) => Some(msg),
            None => {
                tokio::time::sleep(timeout).await;
                None
            }
        }
    }

    fn is_finished(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Messages pushed by another task (a network reader, stdin, a test).
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<ChatMessage>,
    closed: bool,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<ChatMessage>) -> Self {
        Self { rx, closed: false }
    }

    /// A bounded channel and the source reading from it.
    pub fn channel(capacity: usize) -> (mpsc::Sender<ChatMessage>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn try_next(&mut self, timeout: Duration) -> Option<ChatMessage> {
        if self.closed {
            return None;
        }
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(msg)) => Some(msg),
            Ok(None) => {
                tracing::debug!("Message channel closed");
                self.closed = true;
                None
            }
            Err(_) => None,
        }
    }

    fn is_finished(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_line() {
        let msg = parse_chat_line("Bob: jump now", "stream").unwrap();
        assert_eq!(msg.username, "Bob");
        assert_eq!(msg.channel, "stream");
        assert_eq!(msg.payload, "jump now");
    }

    #[test]
    fn test_parse_line_with_channel() {
        let msg = parse_chat_line("bob@other: duck", "stream").unwrap();
        assert_eq!(msg.channel, "other");
        assert_eq!(msg.payload, "duck");

        let msg = parse_chat_line("bob@: duck", "stream").unwrap();
        assert_eq!(msg.channel, "stream");
    }

    #[test]
    fn test_parse_keeps_colons_in_text() {
        let msg = parse_chat_line("bob: say: hi", "stream").unwrap();
        assert_eq!(msg.payload, "say: hi");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse_chat_line("no separator", "stream").is_none());
        assert!(parse_chat_line(": text", "stream").is_none());
        assert!(parse_chat_line("", "stream").is_none());
    }

    #[tokio::test]
    async fn test_replay_in_order() {
        let mut source = ReplaySource::from_lines(["a: one", "junk", "b: two"], "stream");
        assert_eq!(source.len(), 2);

        let first = source.try_next(Duration::from_millis(1)).await.unwrap();
        let second = source.try_next(Duration::from_millis(1)).await.unwrap();
        assert_eq!(first.payload, "one");
        assert_eq!(second.payload, "two");
        assert!(source.is_finished());
        assert!(source.try_next(Duration::from_millis(1)).await.is_none());
    }

    #[test]
    fn test_replay_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.log");
        std::fs::write(&path, "bob: jump\nalice@second: !skip\n").unwrap();

        let source = ReplaySource::from_file(&path, "stream").unwrap();
        assert_eq!(source.len(), 2);
    }

    #[test]
    fn test_replay_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ReplaySource::from_file(&dir.path().join("missing.log"), "stream").is_err());
    }

    #[tokio::test]
    async fn test_channel_source_times_out() {
        let (_tx, mut source) = ChannelSource::channel(4);
        assert!(source.try_next(Duration::from_millis(10)).await.is_none());
        assert!(!source.is_finished());
    }

    #[tokio::test]
    async fn test_channel_source_delivers_and_closes() {
        let (tx, mut source) = ChannelSource::channel(4);
        tx.send(ChatMessage::new("bob", "stream", "jump")).await.unwrap();
        drop(tx);

        let msg = source.try_next(Duration::from_millis(50)).await.unwrap();
        assert_eq!(msg.payload, "jump");
        assert!(source.try_next(Duration::from_millis(50)).await.is_none());
        assert!(source.is_finished());
    }
}
