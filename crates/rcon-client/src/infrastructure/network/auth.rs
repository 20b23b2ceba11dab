//! Challenge-response login and event enabling.
//!
//! # The `login.hashed` exchange (for beginners)
//!
//! The password never travels in clear text.  Instead:
//!
//! ```text
//! Client                                   Server
//! ──────                                   ──────
//! login.hashed                    ──►
//!                                 ◄──      OK <salt as hex>
//! hash = MD5(unhex(salt) ‖ password), upper-case hex
//! login.hashed <hash>             ──►
//!                                 ◄──      OK
//! admin.eventsEnabled true        ──►
//!                                 ◄──      OK
//! ```
//!
//! A server that refuses `admin.eventsEnabled` still accepts commands, so by
//! default that refusal is logged and reported rather than treated as fatal.

use md5::{Digest, Md5};
use tracing::{debug, info, warn};

use super::{LoginStep, RconError, Session};

/// Command used for both rounds of the login exchange.
pub const LOGIN_COMMAND: &str = "login.hashed";

/// Command that subscribes the connection to server events.
pub const EVENTS_COMMAND: &str = "admin.eventsEnabled";

/// Status word of a successful response.
pub const STATUS_OK: &str = "OK";

/// What the server said to `admin.eventsEnabled true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventsStatus {
    /// Events will be delivered on this connection.
    Enabled,
    /// The server answered with the contained non-`OK` status.
    Rejected(String),
}

/// Computes the `login.hashed` password hash.
///
/// The hash is the MD5 digest of the raw salt bytes (hex-decoded) followed by
/// the UTF-8 password bytes, rendered as upper-case hexadecimal.
///
/// # Errors
///
/// Returns [`RconError::AuthenticationFailure`] if `salt_hex` is not valid
/// hexadecimal.
///
/// # Examples
///
/// ```rust
/// use rcon_client::infrastructure::network::auth::login_hash;
///
/// let hash = login_hash("00000000000000000000000000000000", "secret").unwrap();
/// assert_eq!(hash, "830F2E49C4E8F0057461535F67ACA0EA");
/// ```
pub fn login_hash(salt_hex: &str, password: &str) -> Result<String, RconError> {
    let salt = hex::decode(salt_hex).map_err(|e| RconError::AuthenticationFailure {
        step: LoginStep::Challenge,
        status: format!("invalid salt {salt_hex:?}: {e}"),
    })?;

    let mut hasher = Md5::new();
    hasher.update(&salt);
    hasher.update(password.as_bytes());
    Ok(hex::encode_upper(hasher.finalize()))
}

/// Runs the login exchange and enables events on `session`.
///
/// When `require_events` is `false`, a refused `admin.eventsEnabled` is
/// returned as [`EventsStatus::Rejected`]; when `true` it fails the handshake.
///
/// # Errors
///
/// - [`RconError::AuthenticationFailure`] if either login round is refused.
///   No further command is sent after a refusal.
/// - [`RconError::EventsNotEnabled`] if events are refused and required.
/// - Any session error ([`RconError::Timeout`], [`RconError::ConnectionClosed`], ...).
pub async fn authenticate(
    session: &Session,
    password: &str,
    require_events: bool,
) -> Result<EventsStatus, RconError> {
    let challenge = session.send(&[LOGIN_COMMAND]).await?;
    expect_ok(&challenge, LoginStep::Challenge)?;
    let salt = challenge
        .get(1)
        .ok_or_else(|| RconError::AuthenticationFailure {
            step: LoginStep::Challenge,
            status: "OK without salt".to_string(),
        })?;
    debug!(session = %session.id(), "received login salt");

    let hash = login_hash(salt, password)?;
    let login = session.send(&[LOGIN_COMMAND, hash.as_str()]).await?;
    expect_ok(&login, LoginStep::Login)?;
    info!(session = %session.id(), "logged in");

    let reply = session.send(&[EVENTS_COMMAND, "true"]).await?;
    match status_of(&reply) {
        STATUS_OK => Ok(EventsStatus::Enabled),
        status => {
            warn!(session = %session.id(), status, "server refused to enable events");
            if require_events {
                Err(RconError::EventsNotEnabled {
                    status: status.to_string(),
                })
            } else {
                Ok(EventsStatus::Rejected(status.to_string()))
            }
        }
    }
}

fn status_of(words: &[String]) -> &str {
    words.first().map(String::as_str).unwrap_or_default()
}

fn expect_ok(words: &[String], step: LoginStep) -> Result<(), RconError> {
    match status_of(words) {
        STATUS_OK => Ok(()),
        status => Err(RconError::AuthenticationFailure {
            step,
            status: status.to_string(),
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
