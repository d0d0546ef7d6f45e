//! Server reply line classification.

/// Three-digit SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// 220 Service ready (greeting, STARTTLS go-ahead)
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 235 Authentication succeeded
    pub const AUTH_OK: Self = Self(235);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 334 Continue with authentication
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);
    /// 530 Relaying denied
    pub const NO_RELAY: Self = Self(530);
    /// 535 Authentication credentials invalid
    pub const AUTH_FAILED: Self = Self(535);
    /// 550 Mailbox unavailable / content rejected
    pub const REJECTED: Self = Self(550);

    /// Creates a reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One classified server line.
///
/// `last` is true for the `NNN ` form that closes a reply, false for the
/// `NNN-` continuation form of a multi-line reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code.
    pub code: ReplyCode,
    /// Whether this line closes the reply.
    pub last: bool,
    /// Text after the code and separator.
    pub text: String,
}

impl Reply {
    /// Classifies one server line. Lines that do not open with a
    /// three-digit code followed by a space or dash yield `None`; the
    /// session ignores them.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let bytes = line.as_bytes();
        if bytes.len() < 4 || !bytes[..3].iter().all(u8::is_ascii_digit) {
            return None;
        }
        let code: u16 = line[..3].parse().ok()?;
        let last = match bytes[3] {
            b' ' => true,
            b'-' => false,
            _ => return None,
        };
        Some(Self {
            code: ReplyCode::new(code),
            last,
            text: line[4..].to_string(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_final_line() {
        let reply = Reply::parse("250 OK").unwrap();
        assert_eq!(reply.code, ReplyCode::OK);
        assert!(reply.last);
        assert_eq!(reply.text, "OK");
    }

    #[test]
    fn parses_continuation_line() {
        let reply = Reply::parse("250-AUTH PLAIN LOGIN").unwrap();
        assert_eq!(reply.code, ReplyCode::OK);
        assert!(!reply.last);
        assert_eq!(reply.text, "AUTH PLAIN LOGIN");
    }

    #[test]
    fn parses_greeting() {
        let reply = Reply::parse("220 smtp.example.com ESMTP ready").unwrap();
        assert_eq!(reply.code, ReplyCode::SERVICE_READY);
        assert!(reply.last);
    }

    #[test]
    fn final_line_may_have_empty_text() {
        let reply = Reply::parse("250 ").unwrap();
        assert!(reply.last);
        assert_eq!(reply.text, "");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(Reply::parse("").is_none());
        assert!(Reply::parse("250").is_none());
        assert!(Reply::parse("ABC OK").is_none());
        assert!(Reply::parse("250#OK").is_none());
        assert!(Reply::parse("2500").is_none());
    }

    #[test]
    fn code_display() {
        assert_eq!(ReplyCode::REJECTED.to_string(), "550");
        assert_eq!(ReplyCode::new(421).as_u16(), 421);
    }
}
