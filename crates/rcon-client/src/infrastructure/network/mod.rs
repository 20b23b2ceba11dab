//! Network infrastructure for the client application.
//!
//! Owns everything that touches the RCON server's TCP port:
//!
//! - [`Session`]: one live connection, correlating responses by sequence
//!   number and acknowledging server events.
//! - [`auth`]: the `login.hashed` challenge-response handshake.
//! - [`ReconnectSupervisor`]: opens, authenticates, and re-opens sessions.
//! - [`RconClient`]: the handle the application layer talks to.
//!
//! The transport is abstracted behind [`Connector`] so tests can hand the
//! supervisor in-memory streams instead of real sockets.

pub mod auth;
pub mod client;
pub mod error;
pub mod event_queue;
pub mod session;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::{authenticate, login_hash, EventsStatus};
pub use client::RconClient;
pub use error::{LoginStep, RconError};
pub use event_queue::EventQueue;
pub use session::Session;
pub use supervisor::{ConnectionState, ReconnectSupervisor};

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

use crate::infrastructure::storage::config::ClientConfig;

/// Any bidirectional byte stream a [`Session`] can run over.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Transport for T {}

/// Type-erased transport, as produced by a [`Connector`].
pub type BoxedTransport = Box<dyn Transport>;

/// Opens new transports to the server.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens one connection.  Timeouts are applied by the caller.
    async fn open(&self) -> io::Result<BoxedTransport>;
}

/// [`Connector`] that dials a TCP address.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
}

impl TcpConnector {
    /// Creates a connector for `host:port`.  No connection is made yet.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn open(&self) -> io::Result<BoxedTransport> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        // Commands are small and latency-sensitive.
        stream.set_nodelay(true)?;
        debug!(host = %self.host, port = self.port, "tcp connection established");
        Ok(Box::new(stream))
    }
}

/// Connection behaviour shared by the supervisor and the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Password for the `login.hashed` handshake.
    pub password: String,
    /// Bound on each request and each `listen` call.
    pub timeout: Duration,
    /// Bound on opening the transport.
    pub connect_timeout: Duration,
    /// Pause between reconnect attempts after a transient failure.
    pub reconnect_backoff: Duration,
    /// Fail the handshake if `admin.eventsEnabled true` is refused.
    pub require_events_enabled: bool,
    /// Keep retrying after authentication failures instead of giving up.
    pub retry_non_transient: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            password: String::new(),
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            reconnect_backoff: Duration::from_secs(10),
            require_events_enabled: false,
            retry_non_transient: false,
        }
    }
}

impl From<&ClientConfig> for ConnectionSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            password: config.server.password.clone(),
            timeout: Duration::from_secs(config.session.timeout_secs),
            connect_timeout: Duration::from_secs(config.session.connect_timeout_secs),
            reconnect_backoff: Duration::from_secs(config.session.reconnect_backoff_secs),
            require_events_enabled: config.session.require_events_enabled,
            retry_non_transient: config.session.retry_non_transient,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
