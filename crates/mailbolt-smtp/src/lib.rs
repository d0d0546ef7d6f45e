//! # mailbolt-smtp
//!
//! An async one-shot SMTP submission client.
//!
//! A [`Mailer`] resolves a relay host, walks a queue of candidate ports,
//! and drives one message through the EHLO / STARTTLS / AUTH / MAIL
//! transaction until the relay accepts or refuses it. The protocol logic
//! lives in a pure state machine fed one reply line at a time, so every
//! path is testable without a socket.
//!
//! ## Features
//!
//! - **STARTTLS**: opportunistic upgrade via rustls when the server
//!   advertises it
//! - **Authentication**: AUTH PLAIN and AUTH LOGIN, PLAIN preferred
//! - **Port fallback**: an ordered queue of candidate ports, tried until
//!   one accepts the connection
//! - **Liveness windows**: a short per-command reply timeout and a long
//!   post-DATA timeout
//! - **MIME**: multipart/mixed rendering from `mailbolt-mime`
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailbolt_smtp::{Credentials, Envelope, HostConfig, Mailer};
//!
//! #[tokio::main]
//! async fn main() -> mailbolt_smtp::Result<()> {
//!     let config = HostConfig::new("smtp.example.com", 587)
//!         .with_auth()
//!         .with_tls();
//!     let credentials = Credentials::new("bob@example.com")
//!         .with_name("Bob")
//!         .with_login("bob", "secret");
//!
//!     let envelope = Envelope::new("alice@example.com", "Weekly report");
//!     let parts = vec![envelope.body_part("Report attached.\r\n")];
//!
//!     let mut mailer = Mailer::new(config, credentials)
//!         .relay_ports(vec![587, 2525, 25]);
//!     mailer.send(envelope, parts).await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`sender`]: the connection driver
//! - [`session`]: the protocol state machine
//! - [`config`]: relay and account configuration
//! - [`reply`]: server reply classification

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
pub mod auth;
pub mod buffer;
pub mod config;
mod error;
pub mod reply;
pub mod sender;
pub mod session;
mod transport;
pub mod watchdog;

pub use config::{Credentials, HostConfig};
pub use error::{Error, Result};
pub use sender::Mailer;

pub use mailbolt_mime::{Envelope, MessageBuilder, Part, TransferEncoding};
