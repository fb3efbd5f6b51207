//! IRCv3 capability negotiation state.
//!
//! [`Capabilities`] tracks, per connection, which capabilities the other
//! side advertised (`supported`) and which were negotiated (`enabled`),
//! each with an optional value. It is shared between a connection's read
//! pump and any middleware stage, so every operation takes a lock.
//!
//! # Reference
//! - <https://ircv3.net/specs/extensions/capability-negotiation>
//! - <https://ircv3.net/specs/extensions/cap-notify>

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Known IRCv3 capability types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Show all user prefix modes in NAMES
    MultiPrefix,
    /// SASL authentication
    Sasl,
    /// Notify of account login/logout
    AccountNotify,
    /// Notify of away status changes
    AwayNotify,
    /// Extended JOIN with account and realname
    ExtendedJoin,
    /// STARTTLS upgrade
    Tls,
    /// Client metadata
    Metadata,
    /// MONITOR command for presence tracking
    Monitor,
    /// Add account tag to messages
    AccountTag,
    /// Message batching
    Batch,
    /// Notify of capability changes
    CapNotify,
    /// Notify of hostname changes
    ChgHost,
    /// Echo messages back to sender
    EchoMessage,
    /// Notify of channel invites
    InviteNotify,
    /// Server-time message tags
    ServerTime,
    /// Full nick!user@host in NAMES
    UserhostInNames,
    /// Client message tags support
    MessageTags,
    /// Unknown/custom capability
    Custom(String),
}

impl AsRef<str> for Capability {
    fn as_ref(&self) -> &str {
        match self {
            Self::MultiPrefix => "multi-prefix",
            Self::Sasl => "sasl",
            Self::AccountNotify => "account-notify",
            Self::AwayNotify => "away-notify",
            Self::ExtendedJoin => "extended-join",
            Self::Tls => "tls",
            Self::Metadata => "metadata",
            Self::Monitor => "monitor",
            Self::AccountTag => "account-tag",
            Self::Batch => "batch",
            Self::CapNotify => "cap-notify",
            Self::ChgHost => "chghost",
            Self::EchoMessage => "echo-message",
            Self::InviteNotify => "invite-notify",
            Self::ServerTime => "server-time",
            Self::UserhostInNames => "userhost-in-names",
            Self::MessageTags => "message-tags",
            Self::Custom(s) => s,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl From<&str> for Capability {
    fn from(s: &str) -> Self {
        match s {
            "multi-prefix" => Self::MultiPrefix,
            "sasl" => Self::Sasl,
            "account-notify" => Self::AccountNotify,
            "away-notify" => Self::AwayNotify,
            "extended-join" => Self::ExtendedJoin,
            "tls" => Self::Tls,
            "metadata" => Self::Metadata,
            "monitor" => Self::Monitor,
            "account-tag" => Self::AccountTag,
            "batch" => Self::Batch,
            "cap-notify" => Self::CapNotify,
            "chghost" => Self::ChgHost,
            "echo-message" => Self::EchoMessage,
            "invite-notify" => Self::InviteNotify,
            "server-time" => Self::ServerTime,
            "userhost-in-names" => Self::UserhostInNames,
            "message-tags" => Self::MessageTags,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<Capability> for String {
    fn from(cap: Capability) -> Self {
        match cap {
            Capability::Custom(name) => name,
            known => known.as_ref().to_string(),
        }
    }
}

/// CAP negotiation version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NegotiationVersion {
    /// CAP 3.1
    #[default]
    V301,
    /// CAP 3.2
    V302,
}

impl NegotiationVersion {
    /// Get the numeric version value.
    pub fn version(&self) -> u32 {
        match self {
            Self::V301 => 301,
            Self::V302 => 302,
        }
    }

    /// Map a `CAP LS <version>` argument to a negotiation version.
    /// Anything at or above 302 negotiates as 3.2.
    pub fn from_number(version: u32) -> Self {
        if version >= 302 {
            Self::V302
        } else {
            Self::V301
        }
    }
}

/// Split a CAP value list (`"sasl=PLAIN,EXTERNAL server-time"`) into a
/// name to value mapping. Capabilities without `=` map to an empty value.
pub fn parse_cap_list(list: &str) -> HashMap<String, String> {
    list.split_whitespace()
        .map(|cap| match cap.split_once('=') {
            Some((name, value)) => (name.to_string(), value.to_string()),
            None => (cap.to_string(), String::new()),
        })
        .collect()
}

#[derive(Debug, Default)]
struct CapState {
    version: NegotiationVersion,
    supported: HashMap<String, String>,
    enabled: HashMap<String, String>,
}

/// Concurrency-safe capability store with three states per name:
/// unknown, supported, enabled.
///
/// Cloning yields another handle onto the same store. Enabling does not
/// require the capability to be supported first.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    inner: Arc<RwLock<CapState>>,
}

impl Capabilities {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with `supported` pre-populated.
    pub fn with_supported<I, K, V>(supported: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let caps = Self::new();
        caps.support(supported);
        caps
    }

    // The maps are only ever mutated by single inserts/removes, so a
    // poisoned lock still guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, CapState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CapState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// The negotiation version in use.
    pub fn version(&self) -> NegotiationVersion {
        self.read().version
    }

    /// Record the negotiation version.
    pub fn set_version(&self, version: NegotiationVersion) {
        self.write().version = version;
    }

    /// Returns if `cap` is supported.
    pub fn supported(&self, cap: &str) -> bool {
        self.read().supported.contains_key(cap)
    }

    /// Value of a supported cap, empty if it has none or is unknown.
    pub fn supported_value(&self, cap: &str) -> String {
        self.read().supported.get(cap).cloned().unwrap_or_default()
    }

    /// Returns if `cap` is enabled.
    pub fn enabled(&self, cap: &str) -> bool {
        self.read().enabled.contains_key(cap)
    }

    /// Value of an enabled cap, empty if it has none or is unknown.
    pub fn enabled_value(&self, cap: &str) -> String {
        self.read().enabled.get(cap).cloned().unwrap_or_default()
    }

    /// Snapshot of the supported capabilities.
    pub fn ls(&self) -> HashMap<String, String> {
        self.read().supported.clone()
    }

    /// Snapshot of the enabled capabilities.
    pub fn list(&self) -> HashMap<String, String> {
        self.read().enabled.clone()
    }

    /// Mark the given caps as supported. Later values replace earlier ones.
    pub fn support<I, K, V>(&self, caps: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let caps: Vec<(String, String)> =
            caps.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        let mut state = self.write();
        state.supported.extend(caps);
    }

    /// Enable the given caps. Does NOT check that they are supported.
    pub fn enable<I, K, V>(&self, caps: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let caps: Vec<(String, String)> =
            caps.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        let mut state = self.write();
        state.enabled.extend(caps);
    }

    /// Disable the given caps, leaving their support untouched.
    pub fn disable<I, S>(&self, caps: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.write();
        for cap in caps {
            state.enabled.remove(cap.as_ref());
        }
    }

    /// Remove support for, and disable, the given caps.
    pub fn del<I, S>(&self, caps: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.write();
        for cap in caps {
            state.supported.remove(cap.as_ref());
            state.enabled.remove(cap.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn initial() -> HashMap<String, String> {
        HashMap::from([
            ("server-time".to_string(), String::new()),
            ("sasl".to_string(), "PLAIN".to_string()),
        ])
    }

    #[test]
    fn test_capability_as_ref() {
        assert_eq!(Capability::MultiPrefix.as_ref(), "multi-prefix");
        assert_eq!(Capability::ServerTime.to_string(), "server-time");
    }

    #[test]
    fn test_capability_from_str() {
        assert_eq!(Capability::from("sasl"), Capability::Sasl);
        assert_eq!(
            Capability::from("draft/chathistory"),
            Capability::Custom("draft/chathistory".to_string())
        );
    }

    #[test]
    fn test_capability_into_store() {
        let caps = Capabilities::new();
        caps.enable([
            (Capability::CapNotify, ""),
            (Capability::Custom("draft/chathistory".to_string()), "1"),
        ]);
        assert!(caps.enabled("cap-notify"));
        assert_eq!(caps.enabled_value("draft/chathistory"), "1");
    }

    #[test]
    fn test_detects_supported() {
        let caps = Capabilities::with_supported(initial());
        assert!(caps.supported("server-time"));
        assert!(!caps.supported("away-notify"));
        assert_eq!(caps.supported_value("sasl"), "PLAIN");
        assert_eq!(caps.supported_value("away-notify"), "");
    }

    #[test]
    fn test_enables_without_support() {
        let caps = Capabilities::with_supported(initial());
        caps.enable([("sasl", "PLAIN")]);
        assert!(caps.enabled("sasl"));
        assert!(!caps.enabled("server-time"));
        assert_eq!(caps.enabled_value("sasl"), "PLAIN");

        let empty = Capabilities::new();
        empty.enable([("batch", "")]);
        assert!(empty.enabled("batch"));
        assert!(!empty.supported("batch"));
    }

    #[test]
    fn test_supports_new_caps() {
        let caps = Capabilities::with_supported(initial());
        caps.support([("batch", ""), ("key", "value")]);
        assert!(caps.supported("batch"));
        assert!(caps.supported("key"));
        assert_eq!(caps.supported_value("key"), "value");

        caps.del(["batch"]);
        assert!(!caps.supported("batch"));
    }

    #[test]
    fn test_last_write_wins() {
        let caps = Capabilities::new();
        caps.support([("sasl", "PLAIN")]);
        caps.support([("sasl", "PLAIN,EXTERNAL")]);
        assert_eq!(caps.supported_value("sasl"), "PLAIN,EXTERNAL");
    }

    #[test]
    fn test_deletes_caps() {
        let caps = Capabilities::with_supported(initial());
        caps.enable([("server-time", "")]);
        caps.del(["server-time", "sasl"]);
        assert!(caps.ls().is_empty());
        assert!(caps.list().is_empty());
    }

    #[test]
    fn test_disable_keeps_support() {
        let caps = Capabilities::with_supported(initial());
        caps.enable([("sasl", "PLAIN")]);
        caps.disable(["sasl"]);
        assert!(!caps.enabled("sasl"));
        assert!(caps.supported("sasl"));
    }

    #[test]
    fn test_unknown_names_are_noops() {
        let caps = Capabilities::new();
        caps.del(["nothing"]);
        caps.disable(["nothing"]);
        assert!(!caps.supported("nothing"));
        assert!(!caps.enabled("nothing"));
    }

    #[test]
    fn test_snapshots_are_copies() {
        let caps = Capabilities::with_supported(initial());
        assert_eq!(caps.ls(), initial());

        let mut snapshot = caps.ls();
        snapshot.insert("extra".into(), String::new());
        assert!(!caps.supported("extra"));

        let enabled = HashMap::from([("server-time".to_string(), String::new())]);
        caps.enable(enabled.clone());
        assert_eq!(caps.list(), enabled);
    }

    #[test]
    fn test_version() {
        let caps = Capabilities::new();
        assert_eq!(caps.version(), NegotiationVersion::V301);
        caps.set_version(NegotiationVersion::from_number(302));
        assert_eq!(caps.version().version(), 302);
    }

    #[test]
    fn test_parse_cap_list() {
        let caps = parse_cap_list("multi-prefix sasl=PLAIN,EXTERNAL  server-time");
        assert_eq!(caps.len(), 3);
        assert_eq!(caps["multi-prefix"], "");
        assert_eq!(caps["sasl"], "PLAIN,EXTERNAL");
        assert!(parse_cap_list("").is_empty());
    }

    #[test]
    fn test_concurrent_access() {
        let caps = Capabilities::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let caps = caps.clone();
                thread::spawn(move || {
                    for j in 0..100 {
                        let name = format!("cap-{}-{}", i, j);
                        caps.support([(name.clone(), "")]);
                        caps.enable([(name.clone(), "v")]);
                        assert!(caps.supported(&name));
                        let _ = caps.ls();
                        if j % 2 == 0 {
                            caps.del([name]);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(caps.ls().len(), 8 * 50);
        assert_eq!(caps.list().len(), 8 * 50);
    }
}
