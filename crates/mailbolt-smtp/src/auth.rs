//! AUTH mechanism negotiation (RFC 4954 PLAIN and LOGIN).

use crate::config::Credentials;
use crate::error::{Error, Result};
use mailbolt_mime::encoding::encode_base64;

/// `base64("Username:")` — the first AUTH LOGIN challenge.
pub(crate) const LOGIN_USERNAME_CHALLENGE: &str = "VXNlcm5hbWU6";
/// `base64("Password:")` — the second AUTH LOGIN challenge.
pub(crate) const LOGIN_PASSWORD_CHALLENGE: &str = "UGFzc3dvcmQ6";

/// The negotiated way into an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mechanism {
    /// One round trip: `AUTH PLAIN <base64("\0login\0password")>`.
    Plain {
        /// The RFC 4616 initial response, already base64 encoded.
        initial_response: String,
    },
    /// Two challenges: `AUTH LOGIN`, then base64 login, then base64
    /// password.
    Login,
}

/// Picks a mechanism from the advertised capability flags. PLAIN wins
/// over LOGIN when both are offered (one round trip instead of two).
/// Fails deterministically, before any secret is produced, when neither
/// is advertised or the credentials are incomplete.
///
/// # Errors
///
/// Returns [`Error::MissingCredentials`] when login or password is
/// absent, [`Error::UnsupportedAuthMechanism`] when the server offers
/// neither mechanism.
pub fn negotiate(
    supports_plain: bool,
    supports_login: bool,
    credentials: &Credentials,
) -> Result<Mechanism> {
    let (Some(login), Some(password)) = (&credentials.login, &credentials.password) else {
        return Err(Error::MissingCredentials);
    };

    if supports_plain {
        Ok(Mechanism::Plain {
            initial_response: plain_initial(login, password),
        })
    } else if supports_login {
        Ok(Mechanism::Login)
    } else {
        Err(Error::UnsupportedAuthMechanism)
    }
}

/// Base64 of the RFC 4616 `\0login\0password` form.
#[must_use]
pub fn plain_initial(login: &str, password: &str) -> String {
    encode_base64(format!("\0{login}\0{password}").as_bytes())
}
