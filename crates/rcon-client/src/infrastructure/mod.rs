//! Infrastructure layer for the RCON client.
//!
//! Contains the adapters that touch the outside world: the TCP session to the
//! server and the configuration file.
//!
//! **Dependency rule**: this layer may depend on `application` and `rcon_core`,
//! but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`network`** – Protocol session, `login.hashed` handshake, reconnect
//!   supervisor, and the [`RconClient`](network::RconClient) that implements
//!   the application's `RconChannel` trait.
//!
//! - **`storage`** – TOML configuration loading with serde defaults.

pub mod network;
pub mod storage;
