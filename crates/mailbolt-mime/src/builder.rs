//! Multipart/mixed wire rendering.

use crate::encoding::encode_word;
use crate::envelope::{Envelope, Part};
use rand::Rng;
use std::fmt::Write as _;

/// Fixed multipart boundary token. The `Content-Type` header and every
/// delimiter line in the body share this literal; they must never diverge.
pub const BOUNDARY: &str = "mailbolt--separator--delimiter";

/// Generates the random token for a `Message-Id` header; the builder
/// appends `@relayhost`.
#[must_use]
pub fn message_id() -> String {
    let mut rng = rand::thread_rng();
    (0..16).fold(String::with_capacity(32), |mut id, _| {
        let _ = write!(id, "{:02x}", rng.r#gen::<u8>());
        id
    })
}

/// Renders the complete wire message for one send: RFC 2822 headers, a
/// multipart/mixed body with one boundary-delimited section per part, and
/// the terminating SMTP end-of-data marker.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    from_name: Option<String>,
    from_email: String,
    relay_host: String,
}

impl MessageBuilder {
    /// Creates a builder for a sender address and the relay host used in
    /// the `Message-Id` header.
    #[must_use]
    pub fn new(from_email: impl Into<String>, relay_host: impl Into<String>) -> Self {
        Self {
            from_name: None,
            from_email: from_email.into(),
            relay_host: relay_host.into(),
        }
    }

    /// Adds a display name for the `From` header. Non-ASCII names are
    /// encoded-word'd.
    #[must_use]
    pub fn from_name(mut self, name: impl Into<String>) -> Self {
        self.from_name = Some(name.into());
        self
    }

    /// Renders the message. Every line break is CRLF and the output ends
    /// with the literal `\r\n.\r\n`.
    #[must_use]
    pub fn render(&self, envelope: &Envelope, parts: &[Part]) -> String {
        let mut message = String::new();

        let date = chrono::Utc::now().to_rfc2822();
        let _ = write!(message, "Date: {date}\r\n");
        let _ = write!(
            message,
            "Message-Id: <{}@{}>\r\n",
            message_id(),
            self.relay_host
        );

        match self.from_name.as_deref() {
            Some(name) if !name.is_empty() => {
                let _ = write!(
                    message,
                    "From: \"{}\" <{}>\r\n",
                    encode_word(name),
                    self.from_email
                );
            }
            _ => {
                let _ = write!(message, "From: <{}>\r\n", self.from_email);
            }
        }

        if !envelope.to.is_empty() {
            let _ = write!(message, "To: {}\r\n", envelope.to);
        }
        if let Some(cc) = envelope.cc.as_deref()
            && !cc.is_empty()
        {
            let _ = write!(message, "Cc: {cc}\r\n");
        }
        if !envelope.subject.is_empty() {
            let _ = write!(message, "Subject: {}\r\n", encode_word(&envelope.subject));
        }

        let _ = write!(
            message,
            "Content-Type: multipart/mixed; boundary={BOUNDARY}\r\n"
        );
        message.push_str("Mime-Version: 1.0\r\n");
        message.push_str("\r\n");
        let _ = write!(message, "--{BOUNDARY}\r\n");

        for part in parts {
            if let Some(disposition) = part.content_disposition() {
                let _ = write!(message, "Content-Disposition: {disposition}\r\n");
            }
            if let Some(content_type) = part.content_type() {
                let _ = write!(message, "Content-Type: {content_type}\r\n");
            }
            let _ = write!(
                message,
                "Content-Transfer-Encoding: {}\r\n\r\n",
                part.transfer_encoding()
            );
            message.push_str(part.body());
            message.push_str("\r\n");
            let _ = write!(message, "--{BOUNDARY}\r\n");
        }

        message.push_str("\r\n.\r\n");
        message
    }
}
