//! IRCv3 message tag parsing and escaping.
//!
//! - <https://ircv3.net/specs/extensions/message-tags#escaping-values>

use std::collections::BTreeMap;
use std::fmt::{Result as FmtResult, Write};

/// Parsed tag block: key to unescaped value.
pub type Tags = BTreeMap<String, String>;

/// Escape a tag value for serialization.
///
/// Each character is looked at once, so a backslash introduced by one
/// escape is never re-escaped by another.
pub fn escape_tag_value(f: &mut dyn Write, value: &str) -> FmtResult {
    for c in value.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            ';' => f.write_str("\\:")?,
            ' ' => f.write_str("\\s")?,
            '\r' => f.write_str("\\r")?,
            '\n' => f.write_str("\\n")?,
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

/// Unescape a tag value from wire format.
///
/// Reverses [`escape_tag_value`] in a single pass. Unknown escapes and a
/// dangling trailing backslash are kept as they appeared on the wire.
pub fn unescape_tag_value(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut iter = value.chars();
    while let Some(c) = iter.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        match iter.next() {
            Some(':') => unescaped.push(';'),
            Some('s') => unescaped.push(' '),
            Some('\\') => unescaped.push('\\'),
            Some('r') => unescaped.push('\r'),
            Some('n') => unescaped.push('\n'),
            Some(other) => {
                unescaped.push('\\');
                unescaped.push(other);
            }
            None => unescaped.push('\\'),
        }
    }
    unescaped
}

/// Parse the body of a tag block (the text between `@` and the first space).
///
/// ```text
/// <tags> ::= <tag> [';' <tag>]*
/// <tag>  ::= <key> ['=' <escaped value>]
/// ```
///
/// Empty keys are skipped. Returns `None` if nothing remains.
pub fn parse_tags(block: &str) -> Option<Tags> {
    let mut tags = Tags::new();
    for tag in block.split(';') {
        let (key, value) = match tag.split_once('=') {
            Some((key, value)) => (key, unescape_tag_value(value)),
            None => (tag, String::new()),
        };
        if key.is_empty() {
            continue;
        }
        tags.insert(key.to_string(), value);
    }
    if tags.is_empty() {
        None
    } else {
        Some(tags)
    }
}

/// Write a tag block body, without the leading `@` or trailing space.
///
/// Tags with an empty value are written as a bare key.
pub(crate) fn write_tags(f: &mut dyn Write, tags: &Tags) -> FmtResult {
    let mut first = true;
    for (key, value) in tags {
        if !first {
            f.write_char(';')?;
        }
        first = false;
        f.write_str(key)?;
        if !value.is_empty() {
            f.write_char('=')?;
            escape_tag_value(f, value)?;
        }
    }
    Ok(())
}
