//! Thread-safe 30-bit sequence counter for request numbering.
//!
//! # What is a sequence number? (for beginners)
//!
//! Every command the client sends carries a sequence number, and the server
//! copies it into the matching response.  Because several commands may be in
//! flight at once and responses may come back in any order, the sequence
//! number is the *only* thing that ties a response to its request.
//!
//! The RCON header reserves 30 bits for it, so the counter runs from 0 to
//! 2^30 − 1 and then wraps back to 0.
//!
//! # Thread safety
//!
//! The counter uses an `AtomicU32` updated with a compare-and-swap loop, so
//! concurrent callers never observe the same value twice (until wraparound).

use std::sync::atomic::{AtomicU32, Ordering};

use crate::protocol::frame::MAX_SEQUENCE;

/// A thread-safe counter producing sequence numbers in `[0, 2^30 − 1]`.
///
/// # Examples
///
/// ```rust
/// use rcon_core::protocol::SequenceCounter;
///
/// let counter = SequenceCounter::new();
/// assert_eq!(counter.next(), 0);
/// assert_eq!(counter.next(), 1);
/// ```
#[derive(Debug)]
pub struct SequenceCounter {
    inner: AtomicU32,
}

impl SequenceCounter {
    /// Creates a new counter starting at 0.
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Creates a counter whose next value is `start`, masked to 30 bits.
    pub fn starting_at(start: u32) -> Self {
        Self {
            inner: AtomicU32::new(start & MAX_SEQUENCE),
        }
    }

    /// Returns the next sequence number and advances the counter.
    ///
    /// After returning [`MAX_SEQUENCE`] the following call returns 0.
    pub fn next(&self) -> u32 {
        // `Relaxed` suffices: the value only has to be unique, it does not
        // publish other memory.
        match self
            .inner
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(advance(current))
            }) {
            Ok(previous) | Err(previous) => previous,
        }
    }

    /// Returns the value the next call to [`next`](Self::next) will produce.
    pub fn current(&self) -> u32 {
        self.inner.load(Ordering::Relaxed)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

fn advance(current: u32) -> u32 {
    if current >= MAX_SEQUENCE {
        0
    } else {
        current + 1
    }
}
