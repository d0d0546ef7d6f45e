//! # mailbolt-mime
//!
//! MIME multipart message generation for the mailbolt SMTP client.
//!
//! Renders an RFC 2822 header block plus a multipart/mixed body (RFC
//! 2045/2046) from a mail envelope and an ordered list of body parts,
//! terminated with the SMTP end-of-data marker. Non-ASCII header text is
//! encoded as RFC 2047 encoded-words.
//!
//! ## Quick Start
//!
//! ```
//! use mailbolt_mime::{Envelope, MessageBuilder, Part};
//!
//! let envelope = Envelope::new("alice@example.com", "Weekly report");
//! let parts = vec![
//!     envelope.body_part("Report attached.\r\n"),
//!     Part::file("report.pdf", "JVBERi0xLjQK"),
//! ];
//!
//! let message = MessageBuilder::new("bob@example.com", "smtp.example.com")
//!     .from_name("Bob")
//!     .render(&envelope, &parts);
//!
//! assert!(message.ends_with("\r\n.\r\n"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod builder;
mod envelope;

pub mod encoding;

pub use builder::{BOUNDARY, MessageBuilder, message_id};
pub use envelope::{Envelope, Part, TransferEncoding};
