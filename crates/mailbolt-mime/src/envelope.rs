//! Mail envelope and body part model.

use std::fmt;

/// Content transfer encoding for a message part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit text.
    EightBit,
    /// Base64 encoding.
    Base64,
}

impl TransferEncoding {
    /// Parses a transfer encoding name; anything unrecognized (including
    /// `7bit`) is treated as 7-bit.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            _ => Self::SevenBit,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
        }
    }
}

/// An outgoing mail envelope.
///
/// `to` and `cc` may each hold several addresses separated by `;` or `,`.
/// Empty optional fields are silently omitted from the rendered message.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Recipient address list.
    pub to: String,
    /// Carbon-copy address list.
    pub cc: Option<String>,
    /// Subject line.
    pub subject: String,
    /// Content type for the leading body part.
    pub content_type: String,
    /// Transfer encoding for the leading body part.
    pub content_transfer_encoding: TransferEncoding,
}

impl Envelope {
    /// Creates an envelope with a text/plain body part configuration.
    #[must_use]
    pub fn new(to: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            cc: None,
            subject: subject.into(),
            content_type: "text/plain; charset=utf-8".to_string(),
            content_transfer_encoding: TransferEncoding::EightBit,
        }
    }

    /// Adds a carbon-copy address list.
    #[must_use]
    pub fn cc(mut self, cc: impl Into<String>) -> Self {
        self.cc = Some(cc.into());
        self
    }

    /// Builds the leading body part from this envelope's content type and
    /// transfer encoding.
    #[must_use]
    pub fn body_part(&self, body: impl Into<String>) -> Part {
        Part::Plain {
            content_type: self.content_type.clone(),
            transfer_encoding: self.content_transfer_encoding,
            body: body.into(),
        }
    }
}

/// A single MIME body part. Parts are ordered; the order given to the
/// message builder is the order on the wire.
#[derive(Debug, Clone)]
pub enum Part {
    /// Inline message text.
    Plain {
        /// `Content-Type` header value.
        content_type: String,
        /// `Content-Transfer-Encoding` header value.
        transfer_encoding: TransferEncoding,
        /// Raw part body, already in its transfer encoding.
        body: String,
    },
    /// An attachment carried as a base64 body.
    File {
        /// Attachment filename for the `Content-Disposition` header.
        filename: String,
        /// Optional `Content-Type` header value.
        content_type: Option<String>,
        /// `Content-Transfer-Encoding` header value.
        transfer_encoding: TransferEncoding,
        /// Base64 text of the file contents.
        body: String,
    },
}

impl Part {
    /// Creates an inline text part.
    #[must_use]
    pub fn plain(
        content_type: impl Into<String>,
        transfer_encoding: TransferEncoding,
        body: impl Into<String>,
    ) -> Self {
        Self::Plain {
            content_type: content_type.into(),
            transfer_encoding,
            body: body.into(),
        }
    }

    /// Creates an attachment part from a filename and base64 body text.
    #[must_use]
    pub fn file(filename: impl Into<String>, base64_body: impl Into<String>) -> Self {
        Self::File {
            filename: filename.into(),
            content_type: None,
            transfer_encoding: TransferEncoding::Base64,
            body: base64_body.into(),
        }
    }

    /// The `Content-Disposition` header value, when the part carries one.
    /// Non-ASCII filenames are encoded-word'd.
    #[must_use]
    pub fn content_disposition(&self) -> Option<String> {
        match self {
            Self::Plain { .. } => None,
            Self::File { filename, .. } => Some(format!(
                "attachment;\r\n\tfilename=\"{}\"",
                crate::encoding::encode_word(filename)
            )),
        }
    }

    /// The `Content-Type` header value, when the part carries one.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        match self {
            Self::Plain { content_type, .. } => Some(content_type),
            Self::File { content_type, .. } => content_type.as_deref(),
        }
    }

    /// The part's transfer encoding.
    #[must_use]
    pub const fn transfer_encoding(&self) -> TransferEncoding {
        match self {
            Self::Plain {
                transfer_encoding, ..
            }
            | Self::File {
                transfer_encoding, ..
            } => *transfer_encoding,
        }
    }

    /// The raw part body.
    #[must_use]
    pub fn body(&self) -> &str {
        match self {
            Self::Plain { body, .. } | Self::File { body, .. } => body,
        }
    }
}
