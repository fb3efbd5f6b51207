use chrono::{DateTime, Utc};

use super::tags::Tags;

/// A single parsed IRC protocol line.
///
/// - <https://tools.ietf.org/html/rfc1459#section-2.3>
/// - <https://ircv3.net/specs/extensions/message-tags>
///
/// Equality ignores [`received_at`](Self::received_at), so a message
/// compares equal to its own re-parsed form.
#[derive(Clone, Debug)]
pub struct Message {
    /// IRCv3 tags with unescaped values. `None` when the line had no tags.
    pub tags: Option<Tags>,
    /// Source of the message, e.g. `nick!user@host` or `irc.example.org`.
    /// Empty when absent.
    pub prefix: String,
    /// A verb (`PRIVMSG`, `PING`, ...) or a three digit numeric reply.
    pub command: String,
    /// Command parameters. The last one may contain spaces.
    pub params: Vec<String>,
    /// When the line was parsed. May be overwritten, e.g. from a
    /// `server-time` tag.
    pub received_at: DateTime<Utc>,
}

impl Message {
    /// Create a message with no tags or prefix.
    pub fn new<C, I, P>(command: C, params: I) -> Self
    where
        C: Into<String>,
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            tags: None,
            prefix: String::new(),
            command: command.into(),
            params: params.into_iter().map(Into::into).collect(),
            received_at: Utc::now(),
        }
    }

    /// Add or replace a tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags
            .get_or_insert_with(Tags::new)
            .insert(key.into(), value.into());
        self
    }

    /// Set the prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Look up a tag value. Tags without a value yield `Some("")`.
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags
            .as_ref()
            .and_then(|tags| tags.get(key))
            .map(String::as_str)
    }

    /// Parameter at `index`, if present.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// The nickname part of the prefix (everything before `!` or `@`).
    pub fn source_nickname(&self) -> Option<&str> {
        if self.prefix.is_empty() {
            return None;
        }
        let end = self.prefix.find(['!', '@']).unwrap_or(self.prefix.len());
        Some(&self.prefix[..end])
    }

    /// Tags, treating an empty map as no tags at all.
    pub fn tags(&self) -> Option<&Tags> {
        self.tags.as_ref().filter(|tags| !tags.is_empty())
    }

    /// Timestamp from the IRCv3 `time` tag, if present and valid.
    ///
    /// - <https://ircv3.net/specs/extensions/server-time>
    pub fn server_time(&self) -> Option<DateTime<Utc>> {
        let raw = self.tag_value("time")?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|time| time.with_timezone(&Utc))
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.tags() == other.tags()
            && self.prefix == other.prefix
            && self.command == other.command
            && self.params == other.params
    }
}

impl Eq for Message {}
