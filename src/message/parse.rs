//! Line parser.
//!
//! ```text
//! <message> ::= ['@' <tags> <SPACE>] [':' <prefix> <SPACE>] <command> <params>
//! ```

use std::str::FromStr;

use chrono::Utc;

use crate::error::MessageParseError;

use super::tags::parse_tags;
use super::Message;

/// Advance the `trail` and `lead` cursors to the start and end of the next
/// space-delimited word, starting the search at `lead`.
///
/// ```text
/// next_token("ABC DEF", 0, 3) == (4, 7)
/// "ABC DEF"  ->  "ABC DEF"
///  ^  ^               ^  ^
/// ```
///
/// Runs of spaces are skipped. Once the input is exhausted both cursors
/// sit at `raw.len()`.
pub fn next_token(raw: &str, _trail: usize, lead: usize) -> (usize, usize) {
    let bytes = raw.as_bytes();
    let length = bytes.len();

    let mut trail = lead.min(length);
    while trail < length && bytes[trail] == b' ' {
        trail += 1;
    }

    let mut lead = trail;
    while lead < length && bytes[lead] != b' ' {
        lead += 1;
    }

    (trail, lead)
}

impl Message {
    /// Parse a raw IRC line.
    ///
    /// A trailing CR and/or LF is tolerated and stripped. Empty input and
    /// lines without a command are rejected rather than guessed at.
    pub fn parse(raw: &str) -> Result<Message, MessageParseError> {
        let raw = raw.trim_end_matches(['\r', '\n']);
        let bytes = raw.as_bytes();
        let length = bytes.len();

        let (mut trail, mut lead) = next_token(raw, 0, 0);
        if trail >= length {
            return Err(MessageParseError::EmptyMessage);
        }

        // <tags> ::= <tag> [';' <tag>]*
        let mut tags = None;
        if bytes[trail] == b'@' {
            tags = parse_tags(&raw[trail + 1..lead]);
            (trail, lead) = next_token(raw, trail, lead);
        }

        // <prefix> ::= <servername> | <nick> ['!' <user>] ['@' <host>]
        let mut prefix = String::new();
        if trail < length && bytes[trail] == b':' {
            prefix = raw[trail + 1..lead].to_string();
            (trail, lead) = next_token(raw, trail, lead);
        }

        // <command> ::= <letter> {<letter>} | <number> <number> <number>
        if trail >= length {
            return Err(MessageParseError::MissingCommand);
        }
        let command = raw[trail..lead].to_string();
        (trail, lead) = next_token(raw, trail, lead);

        // <params> ::= <SPACE> [':' <trailing> | <middle> <params>]
        let mut params = Vec::new();
        while trail < length {
            if bytes[trail] == b':' {
                params.push(raw[trail + 1..].to_string());
                break;
            }
            params.push(raw[trail..lead].to_string());
            (trail, lead) = next_token(raw, trail, lead);
        }

        Ok(Message {
            tags,
            prefix,
            command,
            params,
            received_at: Utc::now(),
        })
    }
}

impl FromStr for Message {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Message::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_token_initial() {
        assert_eq!(next_token("ABC DEF GHI", 0, 0), (0, 3));
    }

    #[test]
    fn test_next_token_middle() {
        assert_eq!(next_token("ABC DEF GHI", 0, 3), (4, 7));
        assert_eq!(next_token("ABC DEF GHI", 4, 7), (8, 11));
    }

    #[test]
    fn test_next_token_last() {
        assert_eq!(next_token("ABC DEF GHI", 8, 11), (11, 11));
    }

    #[test]
    fn test_next_token_skips_multiple_spaces() {
        assert_eq!(next_token("ABC  DEF", 0, 4), (5, 8));
        assert_eq!(next_token("ABC DEF    GHI", 4, 7), (11, 14));
    }

    #[test]
    fn test_next_token_empty() {
        assert_eq!(next_token("", 0, 0), (0, 0));
        assert_eq!(next_token("   ", 0, 0), (3, 3));
    }

    #[test]
    fn test_basic_command() {
        let msg = Message::parse("PRIVMSG").unwrap();
        assert_eq!(msg.tags, None);
        assert_eq!(msg.prefix, "");
        assert_eq!(msg.command, "PRIVMSG");
        assert!(msg.params.is_empty());
    }

    #[test]
    fn test_basic_tag() {
        let msg = Message::parse("@key=value PING").unwrap();
        assert_eq!(msg.tag_value("key"), Some("value"));
        assert_eq!(msg.tags.as_ref().map(|t| t.len()), Some(1));
        assert_eq!(msg.command, "PING");
        assert!(msg.params.is_empty());
    }

    #[test]
    fn test_multiple_tags() {
        let msg = Message::parse("@first;second=2;third PING").unwrap();
        let tags = msg.tags.unwrap();
        assert_eq!(tags.len(), 3);
        assert_eq!(tags["first"], "");
        assert_eq!(tags["second"], "2");
        assert_eq!(tags["third"], "");
    }

    #[test]
    fn test_prefix() {
        let msg = Message::parse(":irc.example.org PING").unwrap();
        assert_eq!(msg.prefix, "irc.example.org");
        assert_eq!(msg.command, "PING");
        assert!(msg.params.is_empty());
    }

    #[test]
    fn test_basic_param() {
        let msg = Message::parse("PING one").unwrap();
        assert_eq!(msg.params, vec!["one"]);
    }

    #[test]
    fn test_trailing_whitespace() {
        assert!(Message::parse("PING ").unwrap().params.is_empty());
        assert_eq!(Message::parse("PING one ").unwrap().params, vec!["one"]);
    }

    #[test]
    fn test_trailing_param_keeps_spaces() {
        let msg = Message::parse("PRIVMSG #channel :a b c ").unwrap();
        assert_eq!(msg.params, vec!["#channel", "a b c "]);
    }

    #[test]
    fn test_empty_trailing_param() {
        let msg = Message::parse("PRIVMSG #channel :").unwrap();
        assert_eq!(msg.params, vec!["#channel", ""]);
    }

    #[test]
    fn test_collapses_runs_of_spaces() {
        let msg = Message::parse(":nick   PRIVMSG   #chan   :hi  there").unwrap();
        assert_eq!(msg.prefix, "nick");
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, vec!["#chan", "hi  there"]);
    }

    #[test]
    fn test_all_of_the_above() {
        let msg =
            Message::parse("@time=half\\sfive;foo :example.org CAP * LS :server-time sasl")
                .unwrap();
        let tags = msg.tags.as_ref().unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags["time"], "half five");
        assert_eq!(tags["foo"], "");
        assert_eq!(msg.prefix, "example.org");
        assert_eq!(msg.command, "CAP");
        assert_eq!(msg.params, vec!["*", "LS", "server-time sasl"]);
    }

    #[test]
    fn test_numeric() {
        let msg = Message::parse(":server 001 nick :Welcome").unwrap();
        assert_eq!(msg.command, "001");
        assert_eq!(msg.params, vec!["nick", "Welcome"]);
    }

    #[test]
    fn test_strips_line_ending() {
        let msg = Message::parse("PING :server\r\n").unwrap();
        assert_eq!(msg.params, vec!["server"]);
        let msg = Message::parse("PING server\n").unwrap();
        assert_eq!(msg.params, vec!["server"]);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(Message::parse(""), Err(MessageParseError::EmptyMessage));
        assert_eq!(Message::parse("   "), Err(MessageParseError::EmptyMessage));
        assert_eq!(Message::parse("\r\n"), Err(MessageParseError::EmptyMessage));
    }

    #[test]
    fn test_missing_command() {
        assert_eq!(Message::parse("@a=b"), Err(MessageParseError::MissingCommand));
        assert_eq!(Message::parse(":prefix"), Err(MessageParseError::MissingCommand));
        assert_eq!(
            Message::parse("@a=b :prefix   "),
            Err(MessageParseError::MissingCommand)
        );
    }

    #[test]
    fn test_lone_markers() {
        // A bare `@` or `:` is an empty tag block / prefix, not a crash.
        assert_eq!(Message::parse("@"), Err(MessageParseError::MissingCommand));
        let msg = Message::parse(": PING").unwrap();
        assert_eq!(msg.prefix, "");
        assert_eq!(msg.command, "PING");
    }

    #[test]
    fn test_from_str() {
        let msg: Message = "NICK bouncer".parse().unwrap();
        assert_eq!(msg.command, "NICK");
        assert_eq!(msg.params, vec!["bouncer"]);
    }
}
