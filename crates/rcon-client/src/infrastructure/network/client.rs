//! Long-lived client handle that survives reconnects.
//!
//! [`RconClient`] owns the [`EventQueue`] and a [`ReconnectSupervisor`], and
//! swaps in a fresh [`Session`] whenever it reconnects.  Because the queue
//! belongs to the client rather than to any one session, events that arrived
//! just before a disconnect are still returned by [`RconClient::listen`]
//! afterwards.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info};

use super::{
    ConnectionSettings, ConnectionState, Connector, EventQueue, RconError, ReconnectSupervisor,
    Session, TcpConnector,
};
use crate::application::listen::{ChannelError, RconChannel};
use crate::infrastructure::storage::config::ClientConfig;

/// RCON client with automatic reconnection.
pub struct RconClient {
    supervisor: ReconnectSupervisor,
    events: EventQueue,
    session: RwLock<Option<Arc<Session>>>,
    timeout: Duration,
}

impl RconClient {
    /// Creates a disconnected client.  Call [`connect`](Self::connect) or
    /// [`reconnect`](Self::reconnect) before sending commands.
    pub fn new(settings: ConnectionSettings, connector: Arc<dyn Connector>) -> Self {
        let events = EventQueue::new();
        let timeout = settings.timeout;
        Self {
            supervisor: ReconnectSupervisor::new(settings, connector, events.clone()),
            events,
            session: RwLock::new(None),
            timeout,
        }
    }

    /// Creates a disconnected client for the TCP server named in `config`.
    pub fn from_config(config: &ClientConfig) -> Self {
        let connector = TcpConnector::new(config.server.host.clone(), config.server.port);
        Self::new(ConnectionSettings::from(config), Arc::new(connector))
    }

    /// Makes one connect-and-authenticate attempt.
    ///
    /// # Errors
    ///
    /// See [`ReconnectSupervisor::connect`].
    pub async fn connect(&self) -> Result<(), RconError> {
        self.close_session().await;
        let session = self.supervisor.connect().await?;
        self.install(session).await;
        Ok(())
    }

    /// Drops the current session and reconnects, retrying transient failures.
    ///
    /// # Errors
    ///
    /// See [`ReconnectSupervisor::reconnect`].
    pub async fn reconnect(&self) -> Result<(), RconError> {
        self.close_session().await;
        let session = self.supervisor.reconnect().await?;
        self.install(session).await;
        Ok(())
    }

    /// Sends a command on the current session and returns its response words.
    ///
    /// # Errors
    ///
    /// - [`RconError::ConnectionClosed`] if there is no live session.
    /// - Any error from [`Session::send`].
    pub async fn send_command<S: AsRef<str>>(&self, words: &[S]) -> Result<Vec<String>, RconError> {
        let session = self.current().await?;
        let result = session.send(words).await;
        if matches!(result, Err(RconError::ConnectionClosed)) || session.is_closed() {
            self.supervisor.mark_disconnected();
        }
        result
    }

    /// Waits up to the session timeout for the next server event.
    ///
    /// Works while disconnected: it drains events received earlier.
    ///
    /// # Errors
    ///
    /// Returns [`RconError::Timeout`] if no event arrives in time.
    pub async fn listen(&self) -> Result<Vec<String>, RconError> {
        self.events.pop(self.timeout).await
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    /// Subscribes to connection state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.supervisor.subscribe()
    }

    /// Closes the current session, if any.
    pub async fn disconnect(&self) {
        self.close_session().await;
        info!("disconnected");
    }

    async fn current(&self) -> Result<Arc<Session>, RconError> {
        self.session
            .read()
            .await
            .as_ref()
            .map(Arc::clone)
            .ok_or(RconError::ConnectionClosed)
    }

    async fn install(&self, session: Session) {
        *self.session.write().await = Some(Arc::new(session));
    }

    async fn close_session(&self) {
        let old = self.session.write().await.take();
        if let Some(session) = old {
            debug!(session = %session.id(), "closing previous session");
            session.close().await;
        }
        self.supervisor.mark_disconnected();
    }
}

fn channel_error(e: RconError) -> ChannelError {
    match e {
        RconError::Timeout(_) => ChannelError::Timeout,
        other => ChannelError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl RconChannel for RconClient {
    async fn send_command(&self, words: Vec<String>) -> Result<Vec<String>, ChannelError> {
        RconClient::send_command(self, words.as_slice()).await.map_err(channel_error)
    }

    async fn listen(&self) -> Result<Vec<String>, ChannelError> {
        RconClient::listen(self).await.map_err(channel_error)
    }

    async fn reconnect(&self) -> Result<(), ChannelError> {
        RconClient::reconnect(self).await.map_err(channel_error)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
