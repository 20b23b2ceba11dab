//! rcon-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does rcon-client do? (for beginners)
//!
//! A game server's RCON port accepts text commands (`serverInfo`,
//! `admin.say`, ...) and pushes events (`player.onJoin`, ...) over one TCP
//! connection.  This crate keeps such a connection alive:
//!
//! 1. Opens the TCP connection and logs in with the salted-MD5
//!    `login.hashed` exchange.
//! 2. Enables server events and acknowledges each one as it arrives.
//! 3. Matches command responses to their requests by sequence number, so
//!    several commands may be in flight at once.
//! 4. Reconnects with a fixed back-off when the server goes away, keeping
//!    already received events available to the consumer.
//!
//! The `rcon-listener` binary wires these pieces to a logging event handler
//! and a `serverInfo` heartbeat.

/// Application layer: use cases and the channel trait they depend on.
pub mod application;

/// Infrastructure layer: network session, reconnect supervisor, and config.
pub mod infrastructure;
