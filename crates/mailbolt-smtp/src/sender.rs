//! One-shot mail delivery driver.
//!
//! [`Mailer`] owns the connection lifecycle: resolving the relay host,
//! walking the candidate port queue, and pumping transport bytes through
//! the protocol [`Session`](crate::session::Session) until the send
//! resolves one way or the other.

use crate::address::rcpt_block;
use crate::buffer::LineBuffer;
use crate::config::{Credentials, HostConfig};
use crate::error::{Error, Result};
use crate::session::{Action, Session, State};
use crate::transport::Transport;
use crate::watchdog::{COMMAND_TIMEOUT, DATA_TIMEOUT, Watchdog, Window};
use mailbolt_mime::{Envelope, Part};
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(8);

/// Drives exactly one message to one relay.
///
/// A mailer is single-use: the first [`Mailer::send`] consumes its one
/// attempt and every later call resolves with [`Error::AlreadySent`].
/// Build a fresh mailer per message.
#[derive(Debug)]
pub struct Mailer {
    config: HostConfig,
    credentials: Credentials,
    relay_ports: Option<Vec<u16>>,
    connect_timeout: Duration,
    command_timeout: Duration,
    data_timeout: Duration,
    done: bool,
}

impl Mailer {
    /// Creates a mailer for one relay and account.
    #[must_use]
    pub fn new(config: HostConfig, credentials: Credentials) -> Self {
        Self {
            config,
            credentials,
            relay_ports: None,
            connect_timeout: CONNECT_TIMEOUT,
            command_timeout: COMMAND_TIMEOUT,
            data_timeout: DATA_TIMEOUT,
            done: false,
        }
    }

    /// Replaces the default port with an ordered queue of candidate
    /// ports, tried until one accepts the connection.
    #[must_use]
    pub fn relay_ports(mut self, ports: Vec<u16>) -> Self {
        self.relay_ports = Some(ports);
        self
    }

    /// Overrides the per-port connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Overrides the reply liveness windows: the short per-command window
    /// and the long post-DATA window.
    #[must_use]
    pub const fn reply_timeouts(mut self, command: Duration, data: Duration) -> Self {
        self.command_timeout = command;
        self.data_timeout = data;
        self
    }

    /// Sends one message and resolves when the relay has accepted or
    /// refused it. The connection is torn down before this returns.
    ///
    /// # Errors
    ///
    /// Resolves with exactly one [`Error`] describing the first failure:
    /// preflight ([`Error::AlreadySent`], [`Error::MissingCredentials`],
    /// [`Error::MissingRecipients`]), connection
    /// ([`Error::HostResolutionFailed`], [`Error::ConnectionFailed`],
    /// [`Error::ConnectionTimeout`], [`Error::ConnectionInterrupted`]) or
    /// protocol ([`Error::InvalidCredentials`], [`Error::RelayRejected`],
    /// [`Error::MessageRejected`], ...).
    pub async fn send(&mut self, envelope: Envelope, parts: Vec<Part>) -> Result<()> {
        if self.done {
            return Err(Error::AlreadySent);
        }
        self.done = true;

        if self.config.requires_auth
            && (self.credentials.login.is_none() || self.credentials.password.is_none())
        {
            return Err(Error::MissingCredentials);
        }
        if rcpt_block(&envelope.to, envelope.cc.as_deref()).is_empty() {
            return Err(Error::MissingRecipients);
        }

        let addrs = self.resolve().await?;
        let stream = self.open_stream(&addrs).await?;
        self.drive(stream, envelope, parts).await
    }

    /// Resolves the relay hostname ahead of the port walk, so a bad
    /// hostname fails once instead of once per port.
    async fn resolve(&self) -> Result<Vec<IpAddr>> {
        let host = self.config.host.as_str();
        let addrs: Vec<IpAddr> = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|_| Error::HostResolutionFailed(host.to_string()))?
            .map(|addr| addr.ip())
            .collect();
        if addrs.is_empty() {
            return Err(Error::HostResolutionFailed(host.to_string()));
        }
        Ok(addrs)
    }

    /// Walks the candidate port queue in order and returns the first
    /// stream that connects within the per-port timeout.
    async fn open_stream(&self, addrs: &[IpAddr]) -> Result<Transport> {
        let ports = match &self.relay_ports {
            Some(ports) if ports.is_empty() => {
                warn!(host = %self.config.host, "empty relay port queue");
                return Err(Error::ConnectionFailed);
            }
            Some(ports) => ports.clone(),
            None => vec![self.config.port],
        };

        let mut timed_out = false;
        for port in ports {
            debug!(host = %self.config.host, port, "connecting");
            match timeout(self.connect_timeout, Transport::connect(addrs, port)).await {
                Ok(Ok(stream)) => return Ok(stream),
                Ok(Err(error)) => {
                    debug!(port, %error, "connection refused");
                    timed_out = false;
                }
                Err(_) => {
                    debug!(port, "connection timed out");
                    timed_out = true;
                }
            }
        }
        // The final attempt decides which error the caller sees.
        Err(if timed_out {
            Error::ConnectionTimeout
        } else {
            Error::ConnectionFailed
        })
    }

    /// Pumps the transport through the protocol session until a terminal
    /// action or a liveness window expires.
    async fn drive(
        &self,
        mut stream: Transport,
        envelope: Envelope,
        parts: Vec<Part>,
    ) -> Result<()> {
        let mut session = Session::new(
            self.config.clone(),
            self.credentials.clone(),
            envelope,
            parts,
        );
        let mut watchdog = Watchdog::new(self.command_timeout, self.data_timeout);
        // The greeting is a reply too; guard it.
        watchdog.arm(Window::Command);

        let mut buffer = LineBuffer::new();
        let mut chunk = [0u8; 1024];

        loop {
            tokio::select! {
                read = stream.read_some(&mut chunk) => {
                    let n = match read {
                        Ok(n) => n,
                        Err(error) => {
                            let _ = stream.shutdown().await;
                            return Err(error);
                        }
                    };
                    if n == 0 {
                        let _ = stream.shutdown().await;
                        return Err(Error::ConnectionInterrupted);
                    }

                    buffer.feed(&chunk[..n]);
                    while let Some(line) = buffer.next_line() {
                        debug!("S: {line}");
                        watchdog.disarm();
                        for action in session.on_line(&line) {
                            match action {
                                Action::Send { bytes, trace } => {
                                    debug!("C: {trace}");
                                    if let Err(error) = stream.write_all(&bytes).await {
                                        let _ = stream.shutdown().await;
                                        return Err(error);
                                    }
                                }
                                Action::UpgradeTls => {
                                    debug!(host = %self.config.host, "negotiating TLS");
                                    stream = stream.upgrade_to_tls(&self.config.host).await?;
                                }
                                Action::Arm(window) => watchdog.arm(window),
                                Action::Succeed => {
                                    let _ = stream.shutdown().await;
                                    return Ok(());
                                }
                                Action::Fail(error) => {
                                    let _ = stream.shutdown().await;
                                    return Err(error);
                                }
                            }
                        }
                    }
                }
                () = watchdog.expired() => {
                    let _ = stream.shutdown().await;
                    // A relay that accepts the message but never answers
                    // QUIT has still delivered it.
                    return if session.state() == State::WaitingQuitReply {
                        Ok(())
                    } else {
                        Err(Error::ConnectionTimeout)
                    };
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mailbolt_mime::BOUNDARY;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    enum Step {
        /// Write these bytes to the client.
        Send(&'static str),
        /// Read one client line and assert its prefix.
        Expect(&'static str),
        /// Read client lines until the marker line arrives.
        ExpectUntil(&'static str),
        /// Keep the socket open without answering.
        Hold(Duration),
    }

    /// Runs a scripted relay on an ephemeral port, returning the port and
    /// a handle resolving to every line the client sent.
    async fn fake_relay(steps: Vec<Step>) -> (u16, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = socket.into_split();
            let mut lines = BufReader::new(read_half).lines();
            let mut received = Vec::new();

            for step in steps {
                match step {
                    Step::Send(text) => write_half.write_all(text.as_bytes()).await.unwrap(),
                    Step::Expect(prefix) => {
                        let line = lines.next_line().await.unwrap().unwrap();
                        assert!(line.starts_with(prefix), "expected {prefix:?}, got {line:?}");
                        received.push(line);
                    }
                    Step::ExpectUntil(marker) => loop {
                        let line = lines.next_line().await.unwrap().unwrap();
                        let done = line == marker;
                        received.push(line);
                        if done {
                            break;
                        }
                    },
                    Step::Hold(duration) => tokio::time::sleep(duration).await,
                }
            }
            received
        });

        (port, handle)
    }

    fn envelope() -> Envelope {
        Envelope::new("alice@example.com", "Hi")
    }

    fn mailer(port: u16) -> Mailer {
        Mailer::new(
            HostConfig::new("127.0.0.1", port).with_auth(),
            Credentials::new("bob@example.com")
                .with_name("Bob")
                .with_login("bob", "secret"),
        )
    }

    #[tokio::test]
    async fn authenticated_multipart_send_succeeds() {
        init_tracing();
        let (port, server) = fake_relay(vec![
            Step::Send("220 fake ESMTP ready\r\n"),
            Step::Expect("EHLO"),
            Step::Send("250-fake Hello\r\n250-AUTH PLAIN LOGIN\r\n250 8BITMIME\r\n"),
            Step::Expect("AUTH PLAIN AGJvYgBzZWNyZXQ="),
            Step::Send("235 Accepted\r\n"),
            Step::Expect("MAIL FROM:<bob@example.com> BODY=8BITMIME"),
            Step::Send("250 OK\r\n"),
            Step::Expect("RCPT TO:<alice@example.com>"),
            Step::Send("250 OK\r\n"),
            Step::Expect("RCPT TO:<dave@example.com>"),
            Step::Send("250 OK\r\n"),
            Step::Expect("RCPT TO:<carol@example.com>"),
            Step::Send("250 OK\r\n"),
            Step::Expect("DATA"),
            Step::Send("354 End data with <CR><LF>.<CR><LF>\r\n"),
            Step::ExpectUntil("."),
            Step::Send("250 Queued\r\n"),
            Step::Expect("QUIT"),
            Step::Send("221 Bye\r\n"),
        ])
        .await;

        let envelope = Envelope::new("alice@example.com, dave@example.com", "Status report")
            .cc("carol@example.com");
        let parts = vec![
            envelope.body_part("All systems nominal.\r\n"),
            Part::file("report.bin", "AAAABBBB"),
        ];

        let mut mailer = mailer(port);
        mailer.send(envelope, parts).await.unwrap();

        let received = server.await.unwrap();
        let delimiter = format!("--{BOUNDARY}");
        // Opening delimiter plus one per part.
        assert_eq!(
            received.iter().filter(|line| **line == delimiter).count(),
            3
        );
        assert!(received.iter().any(|l| l == "Subject: Status report"));
        assert!(received.iter().any(|l| l.contains("report.bin")));
    }

    #[tokio::test]
    async fn login_fallback_when_plain_absent() {
        init_tracing();
        let (port, server) = fake_relay(vec![
            Step::Send("220 fake ready\r\n"),
            Step::Expect("EHLO"),
            Step::Send("250-fake Hello\r\n250 AUTH LOGIN\r\n"),
            Step::Expect("AUTH LOGIN"),
            Step::Send("334 VXNlcm5hbWU6\r\n"),
            Step::Expect("Ym9i"),
            Step::Send("334 UGFzc3dvcmQ6\r\n"),
            Step::Expect("c2VjcmV0"),
            Step::Send("235 Accepted\r\n"),
            Step::Expect("MAIL FROM:<bob@example.com>"),
            Step::Send("250 OK\r\n"),
            Step::Expect("RCPT TO:<alice@example.com>"),
            Step::Send("250 OK\r\n"),
            Step::Expect("DATA"),
            Step::Send("354 Go\r\n"),
            Step::ExpectUntil("."),
            Step::Send("250 Queued\r\n"),
            Step::Expect("QUIT"),
            Step::Send("221 Bye\r\n"),
        ])
        .await;

        let mut mailer = mailer(port);
        mailer.send(envelope(), Vec::new()).await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn refused_port_falls_through_the_queue() {
        init_tracing();
        // Bind then drop to get a port that refuses connections.
        let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_port = dead.local_addr().unwrap().port();
        drop(dead);

        let (live_port, server) = fake_relay(vec![
            Step::Send("220 fake ready\r\n"),
            Step::Expect("EHLO"),
            Step::Send("250 fake Hello\r\n"),
            Step::Expect("MAIL FROM:<bob@example.com>"),
            Step::Send("250 OK\r\n"),
            Step::Expect("RCPT TO:<alice@example.com>"),
            Step::Send("250 OK\r\n"),
            Step::Expect("DATA"),
            Step::Send("354 Go\r\n"),
            Step::ExpectUntil("."),
            Step::Send("250 Queued\r\n"),
            Step::Expect("QUIT"),
            Step::Send("221 Bye\r\n"),
        ])
        .await;

        let mut mailer = Mailer::new(
            HostConfig::new("127.0.0.1", 25),
            Credentials::new("bob@example.com"),
        )
        .relay_ports(vec![dead_port, live_port]);
        mailer.send(envelope(), Vec::new()).await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn empty_port_queue_fails_without_connecting() {
        let mut mailer = Mailer::new(
            HostConfig::new("127.0.0.1", 25),
            Credentials::new("bob@example.com"),
        )
        .relay_ports(Vec::new());
        assert!(matches!(
            mailer.send(envelope(), Vec::new()).await,
            Err(Error::ConnectionFailed)
        ));
    }

    #[tokio::test]
    async fn relay_refusal_surfaces_relay_rejected() {
        init_tracing();
        let (port, _server) = fake_relay(vec![
            Step::Send("220 fake ready\r\n"),
            Step::Expect("EHLO"),
            Step::Send("250 fake Hello\r\n"),
            Step::Expect("MAIL FROM"),
            Step::Send("530 Relaying denied\r\n"),
        ])
        .await;

        let mut mailer = Mailer::new(
            HostConfig::new("127.0.0.1", port),
            Credentials::new("bob@example.com"),
        );
        assert!(matches!(
            mailer.send(envelope(), Vec::new()).await,
            Err(Error::RelayRejected)
        ));
    }

    #[tokio::test]
    async fn bad_credentials_surface_invalid_credentials() {
        init_tracing();
        let (port, _server) = fake_relay(vec![
            Step::Send("220 fake ready\r\n"),
            Step::Expect("EHLO"),
            Step::Send("250 AUTH PLAIN\r\n"),
            Step::Expect("AUTH PLAIN"),
            Step::Send("535 Authentication credentials invalid\r\n"),
        ])
        .await;

        let mut mailer = mailer(port);
        assert!(matches!(
            mailer.send(envelope(), Vec::new()).await,
            Err(Error::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn second_send_is_refused() {
        let (port, server) = fake_relay(vec![
            Step::Send("220 fake ready\r\n"),
            Step::Expect("EHLO"),
            Step::Send("250 fake Hello\r\n"),
            Step::Expect("MAIL FROM"),
            Step::Send("250 OK\r\n"),
            Step::Expect("RCPT TO"),
            Step::Send("250 OK\r\n"),
            Step::Expect("DATA"),
            Step::Send("354 Go\r\n"),
            Step::ExpectUntil("."),
            Step::Send("250 Queued\r\n"),
            Step::Expect("QUIT"),
            Step::Send("221 Bye\r\n"),
        ])
        .await;

        let mut mailer = Mailer::new(
            HostConfig::new("127.0.0.1", port),
            Credentials::new("bob@example.com"),
        );
        mailer.send(envelope(), Vec::new()).await.unwrap();
        server.await.unwrap();

        assert!(matches!(
            mailer.send(envelope(), Vec::new()).await,
            Err(Error::AlreadySent)
        ));
    }

    #[tokio::test]
    async fn missing_recipients_fail_preflight() {
        let mut mailer = Mailer::new(
            HostConfig::new("127.0.0.1", 25),
            Credentials::new("bob@example.com"),
        );
        assert!(matches!(
            mailer.send(Envelope::new("  ; , ", "Hi"), Vec::new()).await,
            Err(Error::MissingRecipients)
        ));
    }

    #[tokio::test]
    async fn missing_credentials_fail_preflight() {
        let mut mailer = Mailer::new(
            HostConfig::new("127.0.0.1", 25).with_auth(),
            Credentials::new("bob@example.com"),
        );
        assert!(matches!(
            mailer.send(envelope(), Vec::new()).await,
            Err(Error::MissingCredentials)
        ));
    }

    #[tokio::test]
    async fn unresolvable_host_fails_resolution() {
        let mut mailer = Mailer::new(
            HostConfig::new("relay.invalid", 25),
            Credentials::new("bob@example.com"),
        );
        assert!(matches!(
            mailer.send(envelope(), Vec::new()).await,
            Err(Error::HostResolutionFailed(_))
        ));
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        init_tracing();
        let (port, _server) = fake_relay(vec![
            Step::Send("220 fake ready\r\n"),
            Step::Expect("EHLO"),
            Step::Hold(Duration::from_secs(2)),
        ])
        .await;

        let mut mailer = Mailer::new(
            HostConfig::new("127.0.0.1", port),
            Credentials::new("bob@example.com"),
        )
        .reply_timeouts(Duration::from_millis(100), Duration::from_millis(200));
        assert!(matches!(
            mailer.send(envelope(), Vec::new()).await,
            Err(Error::ConnectionTimeout)
        ));
    }

    #[tokio::test]
    async fn unanswered_quit_still_counts_as_sent() {
        init_tracing();
        let (port, _server) = fake_relay(vec![
            Step::Send("220 fake ready\r\n"),
            Step::Expect("EHLO"),
            Step::Send("250 fake Hello\r\n"),
            Step::Expect("MAIL FROM"),
            Step::Send("250 OK\r\n"),
            Step::Expect("RCPT TO"),
            Step::Send("250 OK\r\n"),
            Step::Expect("DATA"),
            Step::Send("354 Go\r\n"),
            Step::ExpectUntil("."),
            Step::Send("250 Queued\r\n"),
            Step::Expect("QUIT"),
            Step::Hold(Duration::from_secs(2)),
        ])
        .await;

        let mut mailer = Mailer::new(
            HostConfig::new("127.0.0.1", port),
            Credentials::new("bob@example.com"),
        )
        .reply_timeouts(Duration::from_millis(100), Duration::from_millis(200));
        mailer.send(envelope(), Vec::new()).await.unwrap();
    }

    #[tokio::test]
    async fn early_disconnect_surfaces_interrupted() {
        init_tracing();
        let (port, _server) = fake_relay(vec![
            Step::Send("220 fake ready\r\n"),
            Step::Expect("EHLO"),
        ])
        .await;

        let mut mailer = Mailer::new(
            HostConfig::new("127.0.0.1", port),
            Credentials::new("bob@example.com"),
        );
        assert!(matches!(
            mailer.send(envelope(), Vec::new()).await,
            Err(Error::ConnectionInterrupted)
        ));
    }
}
