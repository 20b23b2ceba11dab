//! Error type shared by the session, the handshake, and the supervisor.

use std::fmt;
use std::io;
use std::time::Duration;

use rcon_core::FrameError;
use thiserror::Error;

/// Which round of the `login.hashed` exchange rejected the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStep {
    /// The empty `login.hashed` request that fetches the salt.
    Challenge,
    /// The `login.hashed <hash>` request carrying the salted password hash.
    Login,
}

impl fmt::Display for LoginStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginStep::Challenge => f.write_str("salt challenge"),
            LoginStep::Login => f.write_str("hashed login"),
        }
    }
}

/// Errors that can occur in the client network layer.
#[derive(Debug, Error)]
pub enum RconError {
    /// A handshake step answered with something other than `"OK"`.
    #[error("authentication failed at {step}: server answered {status:?}")]
    AuthenticationFailure { step: LoginStep, status: String },

    /// `admin.eventsEnabled true` was refused and the configuration requires it.
    #[error("server refused to enable events: {status:?}")]
    EventsNotEnabled { status: String },

    /// No response or event arrived within the session timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Opening the transport did not finish within the connect timeout.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// The transport is closing, or closed while the request was pending.
    #[error("connection closed")]
    ConnectionClosed,

    /// A frame could not be encoded or decoded.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// An I/O error on the transport.
    #[error("connection I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RconError {
    /// Returns `true` for failures the reconnect loop retries silently:
    /// connect timeouts and the usual "server is not there yet" socket errors.
    pub fn is_transient(&self) -> bool {
        match self {
            RconError::ConnectTimeout(_) => true,
            RconError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::NetworkUnreachable
                    | io::ErrorKind::HostUnreachable
                    | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}
