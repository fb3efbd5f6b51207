//! Error types for the bouncer.
//!
//! This module defines errors for the wire protocol, message parsing,
//! connection lifecycles, and configuration loading.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Errors raised while framing or decoding lines from a stream.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 decoding error.
    #[error("decode error: {0}")]
    Decode(#[from] std::string::FromUtf8Error),

    /// Line exceeded the maximum allowed length.
    #[error("message too long: {actual} bytes (limit {limit})")]
    MessageTooLong {
        /// Length of the offending line in bytes.
        actual: usize,
        /// Configured limit in bytes.
        limit: usize,
    },

    /// Failed to parse an IRC message.
    #[error("invalid message: {string}")]
    InvalidMessage {
        /// The raw message string.
        string: String,
        /// The underlying parse error.
        #[source]
        cause: MessageParseError,
    },
}

/// Errors encountered when parsing IRC messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MessageParseError {
    /// Message was empty or contained only spaces.
    #[error("empty message")]
    EmptyMessage,

    /// Tags and/or a prefix were present but no command followed.
    #[error("missing command")]
    MissingCommand,
}

/// Errors scoped to a single connection.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConnectionError {
    /// Dialling the remote end failed.
    #[error("failed to connect to {addr}: {source}")]
    Dial {
        /// The `host:port` that was dialled.
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Registration lines could not be written.
    #[error("registration failed: {0}")]
    Register(#[source] ProtocolError),

    /// The write pump stopped because the stream rejected a write.
    #[error("write failed: {0}")]
    Write(#[source] ProtocolError),

    /// A pump task panicked or was aborted.
    #[error("connection task failed: {0}")]
    Task(String),

    /// The write pump could not drain its queue in time and was aborted.
    #[error("write pump did not drain within {0:?}")]
    DrainTimeout(std::time::Duration),

    /// The connection is closed and no longer accepts messages.
    #[error("connection closed")]
    Closed,
}

/// Errors related to configuration loading and validation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// No home directory could be determined for the default config path.
    #[error("couldn't find home directory")]
    NoHomeDirectory,

    /// Failed to read the configuration file.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// No upstream networks were configured.
    #[error("no networks configured")]
    NoNetworks,

    /// A required network field was empty.
    #[error("network {network:?}: {field} must not be empty")]
    EmptyField {
        network: String,
        field: &'static str,
    },

    /// Port zero was configured.
    #[error("network {0:?}: port must be non-zero")]
    InvalidPort(String),

    /// Two networks share a name.
    #[error("duplicate network name {0:?}")]
    DuplicateNetwork(String),
}
