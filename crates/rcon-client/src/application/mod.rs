//! Application layer use cases for the RCON listener.
//!
//! # What use cases does the listener have?
//!
//! - **`listen`** – Pulls server events off an [`RconChannel`](listen::RconChannel)
//!   and hands them to an [`EventHandler`](listen::EventHandler), while a
//!   `serverInfo` heartbeat detects dead connections and asks the channel to
//!   reconnect.  The channel itself is implemented in the infrastructure
//!   layer and injected at construction time.

pub mod listen;
