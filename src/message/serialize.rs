//! Line composer.

use std::fmt::{self, Display, Formatter, Write};

use super::tags::write_tags;
use super::Message;

/// Check if a parameter must be sent as a `:`-prefixed trailing argument
/// to survive a re-parse.
#[inline]
pub(crate) fn needs_colon_prefix(param: &str) -> bool {
    param.is_empty() || param.contains(' ') || param.starts_with(':')
}

impl Message {
    /// Compose the message into a CRLF-terminated line.
    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl Display for Message {
    /// ```text
    /// ['@' <tags> <SPACE>] [':' <prefix> <SPACE>] <command> <params> <crlf>
    /// ```
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(tags) = self.tags() {
            f.write_char('@')?;
            write_tags(f, tags)?;
            f.write_char(' ')?;
        }

        if !self.prefix.is_empty() {
            f.write_char(':')?;
            f.write_str(&self.prefix)?;
            f.write_char(' ')?;
        }

        f.write_str(&self.command)?;

        for param in &self.params {
            f.write_char(' ')?;
            if needs_colon_prefix(param) {
                f.write_char(':')?;
            }
            f.write_str(param)?;
        }

        f.write_str("\r\n")
    }
}
