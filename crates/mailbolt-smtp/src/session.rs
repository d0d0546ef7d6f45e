//! The SMTP client state machine.
//!
//! [`Session`] is a pure transition function over server reply lines: it
//! owns no socket and performs no I/O. Each call to [`Session::on_line`]
//! consumes one decoded line and returns the actions the driver must
//! perform, in order. This keeps every protocol path testable against
//! canned reply sequences.

use crate::address::rcpt_block;
use crate::auth::{self, LOGIN_PASSWORD_CHALLENGE, LOGIN_USERNAME_CHALLENGE, Mechanism};
use crate::config::{Credentials, HostConfig};
use crate::error::Error;
use crate::reply::{Reply, ReplyCode};
use crate::watchdog::Window;
use mailbolt_mime::encoding::encode_base64;
use mailbolt_mime::{Envelope, MessageBuilder, Part};
use tracing::trace;

/// Where the session stands in the protocol exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Waiting for the 220 greeting.
    Connecting,
    /// EHLO sent, collecting the capability reply.
    WaitingEhlo,
    /// STARTTLS sent, waiting for the 220 go-ahead.
    WaitingTls,
    /// AUTH LOGIN sent, waiting for the username challenge.
    WaitingLoginUser,
    /// Username sent, waiting for the password challenge.
    WaitingLoginPass,
    /// Last AUTH step sent, waiting for the 235 verdict.
    WaitingAuthResult,
    /// MAIL FROM sent.
    WaitingFromReply,
    /// RCPT TO block sent, collecting one reply per recipient.
    WaitingToReply,
    /// DATA sent, waiting for the 354 prompt.
    WaitingDataPrompt,
    /// Message body transmitted, waiting for the queue verdict.
    WaitingSendResult,
    /// QUIT sent.
    WaitingQuitReply,
    /// Terminal: the message was accepted.
    Sent,
    /// Terminal: the session failed.
    Failed,
}

impl State {
    /// Terminal states absorb all further input.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }
}

/// Server capabilities gathered from the EHLO reply. Kept across the
/// post-STARTTLS EHLO so a server that stops re-advertising a mechanism
/// after the upgrade does not strand the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// `AUTH PLAIN` advertised.
    pub auth_plain: bool,
    /// `AUTH LOGIN` advertised.
    pub auth_login: bool,
    /// `8BITMIME` advertised.
    pub eight_bit_mime: bool,
    /// `STARTTLS` advertised.
    pub starttls: bool,
}

/// One instruction for the driver, produced by [`Session::on_line`].
#[derive(Debug)]
pub enum Action {
    /// Write these bytes to the transport. `trace` is the loggable form
    /// of the payload (secrets masked, bodies summarized).
    Send {
        /// Wire bytes, terminator included.
        bytes: Vec<u8>,
        /// Loggable form of the payload.
        trace: String,
    },
    /// Perform the TLS handshake on the current stream.
    UpgradeTls,
    /// Arm the given liveness window.
    Arm(Window),
    /// The message was accepted; resolve the send successfully.
    Succeed,
    /// Resolve the send with this error.
    Fail(Error),
}

/// Protocol state for one send attempt.
#[derive(Debug)]
pub struct Session {
    state: State,
    caps: Capabilities,
    secure: bool,
    config: HostConfig,
    credentials: Credentials,
    envelope: Envelope,
    parts: Vec<Part>,
}

impl Session {
    /// Creates a session in [`State::Connecting`].
    #[must_use]
    pub fn new(
        config: HostConfig,
        credentials: Credentials,
        envelope: Envelope,
        parts: Vec<Part>,
    ) -> Self {
        Self {
            state: State::Connecting,
            caps: Capabilities::default(),
            secure: false,
            config,
            credentials,
            envelope,
            parts,
        }
    }

    /// Current protocol state.
    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    /// Capabilities gathered so far.
    #[must_use]
    pub const fn capabilities(&self) -> Capabilities {
        self.caps
    }

    /// Consumes one server line and returns the driver actions, in order.
    ///
    /// Lines that do not parse as replies, and replies the current state
    /// has no transition for, re-arm the liveness window and are otherwise
    /// ignored. Terminal states absorb everything.
    pub fn on_line(&mut self, line: &str) -> Vec<Action> {
        if self.state.is_terminal() {
            return Vec::new();
        }

        let Some(reply) = Reply::parse(line) else {
            return self.ignored();
        };

        // Authentication and relay refusals end the session from any
        // state before the message body goes out. Once the body is
        // transmitted the relay has the final say via the send verdict;
        // stray refusal codes after acceptance must not undo it.
        let pre_data = !matches!(
            self.state,
            State::WaitingSendResult | State::WaitingQuitReply
        );
        if reply.last && pre_data {
            if reply.code == ReplyCode::AUTH_FAILED {
                return self.fail(Error::InvalidCredentials);
            }
            if reply.code == ReplyCode::NO_RELAY {
                return self.fail(Error::RelayRejected);
            }
        }

        match self.state {
            State::Connecting => self.on_greeting(&reply),
            State::WaitingEhlo => self.on_ehlo_line(&reply),
            State::WaitingTls => self.on_tls_go_ahead(&reply),
            State::WaitingLoginUser => self.on_login_challenge(&reply),
            State::WaitingLoginPass => self.on_login_challenge(&reply),
            State::WaitingAuthResult => self.on_auth_verdict(&reply),
            State::WaitingFromReply => self.on_from_reply(&reply),
            State::WaitingToReply => self.on_to_reply(&reply),
            State::WaitingDataPrompt => self.on_data_prompt(&reply),
            State::WaitingSendResult => self.on_send_verdict(&reply),
            State::WaitingQuitReply => self.on_quit_reply(&reply),
            State::Sent | State::Failed => Vec::new(),
        }
    }

    fn on_greeting(&mut self, reply: &Reply) -> Vec<Action> {
        if reply.last && reply.code == ReplyCode::SERVICE_READY {
            self.state = State::WaitingEhlo;
            vec![Self::command("EHLO localhost"), Action::Arm(Window::Command)]
        } else {
            self.ignored()
        }
    }

    fn on_ehlo_line(&mut self, reply: &Reply) -> Vec<Action> {
        if reply.code != ReplyCode::OK {
            return self.ignored();
        }
        self.record_capability(&reply.text);
        if !reply.last {
            return vec![Action::Arm(Window::Command)];
        }

        if self.config.wants_tls && !self.secure && self.caps.starttls {
            self.state = State::WaitingTls;
            return vec![Self::command("STARTTLS"), Action::Arm(Window::Command)];
        }
        if self.config.requires_auth {
            return self.start_auth();
        }
        self.mail_from(false)
    }

    fn on_tls_go_ahead(&mut self, reply: &Reply) -> Vec<Action> {
        if reply.last && reply.code == ReplyCode::SERVICE_READY {
            self.secure = true;
            self.state = State::WaitingEhlo;
            vec![
                Action::UpgradeTls,
                Self::command("EHLO localhost"),
                Action::Arm(Window::Command),
            ]
        } else {
            self.ignored()
        }
    }

    fn start_auth(&mut self) -> Vec<Action> {
        match auth::negotiate(self.caps.auth_plain, self.caps.auth_login, &self.credentials) {
            Ok(Mechanism::Plain { initial_response }) => {
                self.state = State::WaitingAuthResult;
                vec![
                    Self::command_masked(
                        format!("AUTH PLAIN {initial_response}"),
                        "AUTH PLAIN ********",
                    ),
                    Action::Arm(Window::Command),
                ]
            }
            Ok(Mechanism::Login) => {
                self.state = State::WaitingLoginUser;
                vec![Self::command("AUTH LOGIN"), Action::Arm(Window::Command)]
            }
            Err(error) => self.fail(error),
        }
    }

    fn on_login_challenge(&mut self, reply: &Reply) -> Vec<Action> {
        if !(reply.last && reply.code == ReplyCode::AUTH_CONTINUE) {
            return self.ignored();
        }
        let (Some(login), Some(password)) = (&self.credentials.login, &self.credentials.password)
        else {
            return self.fail(Error::MissingCredentials);
        };

        match (self.state, reply.text.trim()) {
            (State::WaitingLoginUser, LOGIN_USERNAME_CHALLENGE) => {
                let response = encode_base64(login.as_bytes());
                self.state = State::WaitingLoginPass;
                vec![
                    Self::command_masked(response, "********"),
                    Action::Arm(Window::Command),
                ]
            }
            (State::WaitingLoginPass, LOGIN_PASSWORD_CHALLENGE) => {
                let response = encode_base64(password.as_bytes());
                self.state = State::WaitingAuthResult;
                vec![
                    Self::command_masked(response, "********"),
                    Action::Arm(Window::Command),
                ]
            }
            _ => self.ignored(),
        }
    }

    fn on_auth_verdict(&mut self, reply: &Reply) -> Vec<Action> {
        if reply.last && reply.code == ReplyCode::AUTH_OK {
            self.mail_from(self.caps.eight_bit_mime)
        } else {
            self.ignored()
        }
    }

    fn mail_from(&mut self, with_body: bool) -> Vec<Action> {
        let from = &self.credentials.email;
        let command = if with_body {
            format!("MAIL FROM:<{from}> BODY=8BITMIME")
        } else {
            format!("MAIL FROM:<{from}>")
        };
        self.state = State::WaitingFromReply;
        vec![Self::command(command), Action::Arm(Window::Command)]
    }

    fn on_from_reply(&mut self, reply: &Reply) -> Vec<Action> {
        if !reply.last {
            return self.ignored();
        }
        if reply.code == ReplyCode::REJECTED {
            return self.fail(Error::MessageRejected);
        }
        if reply.code != ReplyCode::OK {
            return self.ignored();
        }

        let block = rcpt_block(&self.envelope.to, self.envelope.cc.as_deref());
        if block.is_empty() {
            return self.fail(Error::MissingRecipients);
        }
        self.state = State::WaitingToReply;
        vec![
            Action::Send {
                trace: block.trim_end().to_string(),
                bytes: block.into_bytes(),
            },
            Action::Arm(Window::Command),
        ]
    }

    fn on_to_reply(&mut self, reply: &Reply) -> Vec<Action> {
        if !reply.last {
            return self.ignored();
        }
        if reply.code == ReplyCode::REJECTED {
            return self.fail(Error::MessageRejected);
        }
        if reply.code != ReplyCode::OK {
            return self.ignored();
        }

        // The first final 250 covers the whole RCPT block; servers that
        // acknowledge per recipient get their later 250s absorbed while
        // waiting for the DATA prompt.
        self.state = State::WaitingDataPrompt;
        vec![Self::command("DATA"), Action::Arm(Window::Command)]
    }

    fn on_data_prompt(&mut self, reply: &Reply) -> Vec<Action> {
        if reply.last && reply.code == ReplyCode::REJECTED {
            return self.fail(Error::MessageRejected);
        }
        if !(reply.last && reply.code == ReplyCode::START_DATA) {
            return self.ignored();
        }

        let mut builder = MessageBuilder::new(&*self.credentials.email, &*self.config.host);
        if let Some(name) = &self.credentials.display_name {
            builder = builder.from_name(name);
        }
        let message = builder.render(&self.envelope, &self.parts);
        self.state = State::WaitingSendResult;
        vec![
            Action::Send {
                trace: format!("({} byte message body)", message.len()),
                bytes: message.into_bytes(),
            },
            Action::Arm(Window::Data),
        ]
    }

    fn on_send_verdict(&mut self, reply: &Reply) -> Vec<Action> {
        if reply.last && reply.code == ReplyCode::REJECTED {
            return self.fail(Error::MessageRejected);
        }
        if reply.last && reply.code == ReplyCode::OK {
            self.state = State::WaitingQuitReply;
            return vec![Self::command("QUIT"), Action::Arm(Window::Command)];
        }
        self.ignored()
    }

    fn on_quit_reply(&mut self, reply: &Reply) -> Vec<Action> {
        if reply.last && reply.code == ReplyCode::CLOSING {
            self.state = State::Sent;
            vec![Action::Succeed]
        } else {
            self.ignored()
        }
    }

    fn record_capability(&mut self, text: &str) {
        let text = text.trim();
        if let Some(mechanisms) = text
            .strip_prefix("AUTH ")
            .or_else(|| text.strip_prefix("auth "))
        {
            for mechanism in mechanisms.split_whitespace() {
                if mechanism.eq_ignore_ascii_case("PLAIN") {
                    self.caps.auth_plain = true;
                } else if mechanism.eq_ignore_ascii_case("LOGIN") {
                    self.caps.auth_login = true;
                }
            }
        } else if text.eq_ignore_ascii_case("8BITMIME") {
            self.caps.eight_bit_mime = true;
        } else if text.eq_ignore_ascii_case("STARTTLS") {
            self.caps.starttls = true;
        }
        trace!(caps = ?self.caps, "capabilities");
    }

    /// Unhandled input leaves the state alone and restarts the liveness
    /// window for the reply the session is still waiting on.
    fn ignored(&self) -> Vec<Action> {
        let window = if self.state == State::WaitingSendResult {
            Window::Data
        } else {
            Window::Command
        };
        vec![Action::Arm(window)]
    }

    fn fail(&mut self, error: Error) -> Vec<Action> {
        self.state = State::Failed;
        vec![Action::Fail(error)]
    }

    fn command(line: impl Into<String>) -> Action {
        let line = line.into();
        Action::Send {
            bytes: format!("{line}\r\n").into_bytes(),
            trace: line,
        }
    }

    fn command_masked(line: impl Into<String>, trace: impl Into<String>) -> Action {
        Action::Send {
            bytes: format!("{}\r\n", line.into()).into_bytes(),
            trace: trace.into(),
        }
    }
}
