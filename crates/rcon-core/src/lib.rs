//! # rcon-core
//!
//! Shared library for the RCON client containing the binary frame codec, the
//! frame type, and the 30-bit sequence counter.
//!
//! It has no dependencies on sockets, timers, or async runtimes: everything
//! here is a pure transformation between bytes and values, so it can be
//! tested and benchmarked in isolation.
//!
//! # Architecture overview (for beginners)
//!
//! The RCON protocol used by several game servers exchanges *frames*: a
//! 12-byte prefix followed by a list of length-prefixed text words.  The
//! client sends commands (`serverInfo`, `login.hashed`, ...) and the server
//! answers each with a frame carrying the same sequence number.  The server
//! may also push *events* (`player.onJoin`, ...) at any time, which the client
//! must acknowledge.
//!
//! - **`protocol::frame`** – the [`Frame`] value and the header bit layout.
//! - **`protocol::codec`** – [`encode_frame`], [`decode_frame`] and
//!   [`is_complete`], the stream readiness check.
//! - **`protocol::sequence`** – [`SequenceCounter`], which wraps after 2^30 − 1.
//! - **`protocol::event`** – [`RawEvent`], the name/arguments split handed to
//!   event consumers.

pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `rcon_core::Frame` instead of `rcon_core::protocol::frame::Frame`.
pub use protocol::codec::{decode_frame, encode_frame, is_complete, FrameError};
pub use protocol::event::{EmptyEvent, RawEvent};
pub use protocol::frame::Frame;
pub use protocol::sequence::SequenceCounter;
