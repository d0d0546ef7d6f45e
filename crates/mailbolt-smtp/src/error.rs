//! Error types for mail delivery.

use std::io;

/// Result type alias for send operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a send attempt. Each `send` resolves with at most
/// one of these; the session is torn down before the error is returned.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The relay hostname did not resolve to any usable address.
    #[error("error resolving host {0}")]
    HostResolutionFailed(String),

    /// No candidate port yielded a connection.
    #[error("unable to connect to the server")]
    ConnectionFailed,

    /// The server stopped answering within the liveness window.
    #[error("timeout sending message")]
    ConnectionTimeout,

    /// The stream closed before the session completed.
    #[error("the connection to the server was interrupted")]
    ConnectionInterrupted,

    /// Authentication is required but the server advertises neither
    /// AUTH PLAIN nor AUTH LOGIN.
    #[error("unsupported login mechanism")]
    UnsupportedAuthMechanism,

    /// The server refused the credentials (535).
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The server refused to relay for this sender (530).
    #[error("relay rejected")]
    RelayRejected,

    /// The server refused a recipient or the message content (550).
    #[error("message rejected by server")]
    MessageRejected,

    /// Authentication is required but login or password is missing.
    #[error("authentication requires both login and password")]
    MissingCredentials,

    /// The envelope names no recipient.
    #[error("mail has no recipient address")]
    MissingRecipients,

    /// A mailer drives exactly one send; later calls are refused.
    #[error("message has already been sent")]
    AlreadySent,

    /// Unexpected protocol condition.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),
}
