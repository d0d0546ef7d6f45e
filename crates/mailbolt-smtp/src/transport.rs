//! Byte-stream transport over TCP, with in-place STARTTLS upgrade.

use crate::error::{Error, Result};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::trace;

/// SMTP transport (TCP or TLS).
///
/// Exactly one transport is open per session. After [`Transport::shutdown`]
/// the stream must not be read from or written to again.
#[derive(Debug)]
pub enum Transport {
    /// Plain TCP connection.
    Tcp(TcpStream),
    /// TLS-encrypted connection.
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl Transport {
    /// Opens a plain TCP stream on `port` to the first reachable of the
    /// already-resolved `addrs`.
    ///
    /// # Errors
    ///
    /// Returns the last connect error when every address fails.
    pub async fn connect(addrs: &[IpAddr], port: u16) -> Result<Self> {
        let mut last_err: Option<io::Error> = None;
        for addr in addrs {
            match TcpStream::connect((*addr, port)).await {
                Ok(stream) => return Ok(Self::Tcp(stream)),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.map_or(Error::ConnectionFailed, Error::Io))
    }

    /// Reads whatever bytes are available. `Ok(0)` signals end-of-stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub async fn read_some(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = match self {
            Self::Tcp(stream) => stream.read(buf).await?,
            Self::Tls(stream) => stream.read(buf).await?,
        };
        trace!(bytes = n, "read");
        Ok(n)
    }

    /// Writes and flushes the full buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Tcp(stream) => {
                stream.write_all(data).await?;
                stream.flush().await?;
            }
            Self::Tls(stream) => {
                stream.write_all(data).await?;
                stream.flush().await?;
            }
        }
        trace!(bytes = data.len(), "wrote");
        Ok(())
    }

    /// Upgrades the plaintext stream to TLS in place: consumes the TCP
    /// stream and returns a secured stream wrapping the same socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is already secured or the handshake
    /// fails.
    pub async fn upgrade_to_tls(self, hostname: &str) -> Result<Self> {
        let tcp_stream = match self {
            Self::Tcp(stream) => stream,
            Self::Tls(_) => return Err(Error::Protocol("already using TLS".into())),
        };

        let connector = tls_connector();
        let server_name = ServerName::try_from(hostname.to_string())
            .map_err(|_| Error::Protocol(format!("invalid hostname: {hostname}")))?;

        let tls_stream = connector.connect(server_name, tcp_stream).await?;
        Ok(Self::Tls(Box::new(tls_stream)))
    }

    /// Tears the stream down. The transport must not be used afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown fails.
    pub async fn shutdown(&mut self) -> Result<()> {
        match self {
            Self::Tcp(stream) => stream.shutdown().await?,
            Self::Tls(stream) => stream.shutdown().await?,
        }
        Ok(())
    }
}

/// Creates a TLS connector with the webpki root certificates.
fn tls_connector() -> TlsConnector {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connects_and_exchanges_bytes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"220 ready\r\n").await.unwrap();
            let mut buf = [0u8; 64];
            let n = socket.read(&mut buf).await.unwrap();
            buf[..n].to_vec()
        });

        let addrs = vec!["127.0.0.1".parse().unwrap()];
        let mut transport = Transport::connect(&addrs, port).await.unwrap();

        let mut buf = [0u8; 64];
        let n = transport.read_some(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"220 ready\r\n");

        transport.write_all(b"QUIT\r\n").await.unwrap();
        transport.shutdown().await.unwrap();

        assert_eq!(server.await.unwrap(), b"QUIT\r\n");
    }

    #[tokio::test]
    async fn read_returns_zero_at_end_of_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let addrs = vec!["127.0.0.1".parse().unwrap()];
        let mut transport = Transport::connect(&addrs, port).await.unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(transport.read_some(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn refused_port_reports_io_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let addrs = vec!["127.0.0.1".parse::<IpAddr>().unwrap()];
        assert!(matches!(
            Transport::connect(&addrs, port).await,
            Err(Error::Io(_))
        ));
    }

    #[tokio::test]
    async fn invalid_hostname_rejected_before_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let _socket = listener.accept().await;
        });

        let addrs = vec!["127.0.0.1".parse().unwrap()];
        let transport = Transport::connect(&addrs, port).await.unwrap();
        assert!(matches!(
            transport.upgrade_to_tls("not a hostname").await,
            Err(Error::Protocol(_))
        ));
    }
}
