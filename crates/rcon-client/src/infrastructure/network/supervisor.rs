//! Reconnect supervisor: opens and re-opens authenticated sessions.
//!
//! # State machine (for beginners)
//!
//! ```text
//!  Disconnected ──► Connecting ──► Authenticating ──► Connected
//!       ▲               │                 │               │
//!       └───────────────┴─────────────────┴───────────────┘
//!                    any failure / session loss
//! ```
//!
//! [`ReconnectSupervisor::connect`] makes exactly one attempt.
//! [`ReconnectSupervisor::reconnect`] repeats attempts with a fixed pause
//! while the failures are transient (refused, unreachable, connect timeout).
//! Any other failure, such as a rejected password, is returned to the caller
//! instead of being retried, unless `retry_non_transient` is set.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time;
use tracing::{error, info, warn};

use super::auth::{authenticate, EventsStatus};
use super::{ConnectionSettings, Connector, EventQueue, RconError, Session};

/// Where the supervisor is in its connect cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticating,
    Connected,
}

/// Produces authenticated [`Session`]s, retrying transient failures.
pub struct ReconnectSupervisor {
    settings: ConnectionSettings,
    connector: Arc<dyn Connector>,
    events: EventQueue,
    state: watch::Sender<ConnectionState>,
}

impl ReconnectSupervisor {
    /// Creates a supervisor.  Every session it opens pushes into `events`.
    pub fn new(settings: ConnectionSettings, connector: Arc<dyn Connector>, events: EventQueue) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            settings,
            connector,
            events,
            state,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Subscribes to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Marks the current session as lost.
    pub fn mark_disconnected(&self) {
        self.set_state(ConnectionState::Disconnected);
    }

    /// Makes a single connect-and-authenticate attempt.
    ///
    /// # Errors
    ///
    /// - [`RconError::ConnectTimeout`] if the transport did not open in time.
    /// - [`RconError::Io`] if the transport could not be opened.
    /// - Any error from [`authenticate`]; the half-open session is closed first.
    pub async fn connect(&self) -> Result<Session, RconError> {
        self.set_state(ConnectionState::Connecting);
        let connect_timeout = self.settings.connect_timeout;
        let transport = match time::timeout(connect_timeout, self.connector.open()).await {
            Ok(Ok(transport)) => transport,
            Ok(Err(e)) => {
                self.set_state(ConnectionState::Disconnected);
                return Err(RconError::Io(e));
            }
            Err(_) => {
                self.set_state(ConnectionState::Disconnected);
                return Err(RconError::ConnectTimeout(connect_timeout));
            }
        };

        let session = Session::new(transport, self.events.clone(), self.settings.timeout);
        self.set_state(ConnectionState::Authenticating);

        match authenticate(
            &session,
            &self.settings.password,
            self.settings.require_events_enabled,
        )
        .await
        {
            Ok(events) => {
                if let EventsStatus::Rejected(status) = &events {
                    warn!(session = %session.id(), %status, "connected without server events");
                }
                self.set_state(ConnectionState::Connected);
                Ok(session)
            }
            Err(e) => {
                session.close().await;
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    /// Attempts to connect until an attempt succeeds or fails non-transiently.
    ///
    /// Transient failures are followed by a pause of `reconnect_backoff`;
    /// there is no attempt limit.
    ///
    /// # Errors
    ///
    /// Returns the first non-transient error (see [`RconError::is_transient`])
    /// unless `retry_non_transient` is set, in which case it never returns an
    /// error.
    pub async fn reconnect(&self) -> Result<Session, RconError> {
        let backoff = self.settings.reconnect_backoff;
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            match self.connect().await {
                Ok(session) => {
                    info!(attempt, session = %session.id(), "connection established");
                    return Ok(session);
                }
                Err(e) if e.is_transient() => {
                    warn!(attempt, "connection attempt failed: {e}; retrying in {backoff:?}");
                }
                Err(e) if self.settings.retry_non_transient => {
                    error!(attempt, "connection attempt failed: {e}; retrying in {backoff:?}");
                }
                Err(e) => {
                    error!(attempt, "giving up on reconnect: {e}");
                    return Err(e);
                }
            }
            time::sleep(backoff).await;
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
