//! Unbounded FIFO of server events.
//!
//! The queue is deliberately not owned by a [`Session`](super::Session): the
//! client creates one queue and hands a clone to every session it opens, so
//! events received just before a disconnect can still be consumed after the
//! supervisor has reconnected.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::time;

use super::RconError;

/// Cloneable handle to a shared event queue.
#[derive(Debug, Clone)]
pub struct EventQueue {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    tx: mpsc::UnboundedSender<Vec<String>>,
    // Consumers take turns; the lock is released when a `pop` is cancelled.
    rx: Mutex<mpsc::UnboundedReceiver<Vec<String>>>,
}

impl EventQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                tx,
                rx: Mutex::new(rx),
            }),
        }
    }

    /// Appends an event's words to the back of the queue.
    pub fn push(&self, words: Vec<String>) {
        // Cannot fail: `inner` owns the receiver for as long as any handle lives.
        let _ = self.inner.tx.send(words);
    }

    /// Removes the oldest event, waiting up to `timeout` for one to arrive.
    ///
    /// # Errors
    ///
    /// Returns [`RconError::Timeout`] if the queue stays empty for `timeout`.
    pub async fn pop(&self, timeout: Duration) -> Result<Vec<String>, RconError> {
        let next = time::timeout(timeout, async {
            let mut rx = self.inner.rx.lock().await;
            rx.recv().await
        })
        .await
        .map_err(|_| RconError::Timeout(timeout))?;

        next.ok_or(RconError::ConnectionClosed)
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
