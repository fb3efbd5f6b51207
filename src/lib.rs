//! # bounce
//!
//! An IRC bouncer: one persistent connection to an IRC network, shared by
//! any number of IRC clients, with an ordered middleware pipeline between
//! the two sides.
//!
//! ## Features
//!
//! - IRC message parsing and composition with IRCv3 tags
//! - A concurrency-safe IRCv3 capability store
//! - Tokio connection wrappers with independent read and write pumps
//! - Channel-linked middleware chains that preserve message order
//! - Fan-out of network traffic to every attached client
//!
//! ## Quick Start
//!
//! ### Parsing and composing messages
//!
//! ```rust
//! use bounce::Message;
//!
//! let raw = "@time=2023-01-01T12:00:00Z :nick!user@host PRIVMSG #channel :Hello there";
//! let message: Message = raw.parse().expect("valid IRC message");
//!
//! assert_eq!(message.command, "PRIVMSG");
//! assert_eq!(message.params, vec!["#channel", "Hello there"]);
//! assert_eq!(message.tag_value("time"), Some("2023-01-01T12:00:00Z"));
//! assert_eq!(message.source_nickname(), Some("nick"));
//!
//! let reply = Message::new("PRIVMSG", ["#channel", "hi back"]).with_tag("label", "a b");
//! assert_eq!(reply.to_string(), "@label=a\\sb PRIVMSG #channel :hi back\r\n");
//! ```
//!
//! ### Tracking capabilities
//!
//! ```rust
//! use bounce::Capabilities;
//!
//! let caps = Capabilities::new();
//! caps.support([("batch", ""), ("sasl", "PLAIN")]);
//! assert!(caps.supported("batch"));
//! assert_eq!(caps.supported_value("sasl"), "PLAIN");
//!
//! caps.del(["batch"]);
//! assert!(!caps.supported("batch"));
//! ```

#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod caps;
pub mod config;
pub mod error;
pub mod message;

#[cfg(feature = "tokio")]
pub mod bouncer;
#[cfg(feature = "tokio")]
pub mod connection;
#[cfg(feature = "tokio")]
pub mod irc;
#[cfg(feature = "tokio")]
pub mod line;
#[cfg(feature = "tokio")]
pub mod middleware;
#[cfg(feature = "tokio")]
pub mod pipeline;

pub use self::caps::{Capabilities, Capability, NegotiationVersion};
pub use self::config::{Config, NetworkConfig};
pub use self::error::{ConfigError, ConnectionError, MessageParseError, ProtocolError};
pub use self::message::{Message, Tags};

#[cfg(feature = "tokio")]
pub use self::bouncer::Bouncer;
#[cfg(feature = "tokio")]
pub use self::connection::{ClientHandle, Connection, ConnectionOptions, NetworkHandle};
#[cfg(feature = "tokio")]
pub use self::irc::IrcCodec;
#[cfg(feature = "tokio")]
pub use self::line::{LineCodec, MAX_IRC_LINE_LEN, MAX_MESSAGE_LEN, MAX_TAGS_LEN};
#[cfg(feature = "tokio")]
pub use self::middleware::{Downstream, Middleware, Upstream};
#[cfg(feature = "tokio")]
pub use self::pipeline::Pipeline;
