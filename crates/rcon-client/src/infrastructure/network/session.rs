//! Protocol session: one live RCON connection.
//!
//! A [`Session`] turns a byte stream into correlated request/response pairs
//! plus a side channel of server events, and turns outbound command words
//! into frame writes.
//!
//! # How a session is wired (for beginners)
//!
//! ```text
//!            send(words)                       listen()
//!                │                                ▲
//!                ▼                                │
//!   ┌── pending table ◄── resolve ──┐        EventQueue
//!   │   seq → oneshot               │             ▲
//!   │                               │             │ push
//!   ▼                               │             │
//! outbound queue ──► writer task ──► TCP ──► reader task ── dispatch ──► ack
//!        ▲                                                               │
//!        └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! - `send` registers a one-shot slot under a fresh sequence number, queues
//!   the encoded request, and waits for the slot to be filled.
//! - A single spawned reader task accumulates bytes, cuts them into frames,
//!   and either resolves the matching slot (responses) or queues the words
//!   and an acknowledgement (events).  It never waits on the socket's write
//!   side, so a peer that stops reading cannot stall event delivery.
//! - A single spawned writer task owns the write half and drains the outbound
//!   queue one whole frame at a time, so frames from concurrent senders and
//!   acknowledgements never interleave on the wire.
//! - When the stream ends, every outstanding slot is dropped, which fails the
//!   waiting `send` calls with [`RconError::ConnectionClosed`].

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rcon_core::protocol::{decode_frame, encode_frame, is_complete, Frame, SequenceCounter};
use tokio::io::{self, AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{BoxedTransport, EventQueue, RconError, Transport};

/// Size of each individual `read()` from the transport.
const READ_CHUNK_SIZE: usize = 4096;

type ResponseSlot = oneshot::Sender<Vec<String>>;

/// One item for the writer task.
enum Outbound {
    /// An encoded frame.  `written` reports the outcome to a waiting sender.
    Frame {
        bytes: Vec<u8>,
        written: Option<oneshot::Sender<io::Result<()>>>,
    },
    /// Writes everything queued before it, then shuts the write half down.
    Shutdown(oneshot::Sender<()>),
}

/// State shared between the session handle and its tasks.
struct Shared {
    id: Uuid,
    outbound: mpsc::UnboundedSender<Outbound>,
    sequence: SequenceCounter,
    pending: Mutex<HashMap<u32, ResponseSlot>>,
    closed: watch::Sender<bool>,
}

impl Shared {
    fn pending(&self) -> MutexGuard<'_, HashMap<u32, ResponseSlot>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Allocates a sequence number and registers its response slot.
    ///
    /// Both happen under the table lock, and the closed flag is checked under
    /// the same lock, so a slot can never be registered after
    /// [`close_pending`](Self::close_pending) has drained the table.
    fn register(&self) -> Result<(u32, oneshot::Receiver<Vec<String>>), RconError> {
        let mut pending = self.pending();
        if self.is_closed() {
            return Err(RconError::ConnectionClosed);
        }
        let (tx, rx) = oneshot::channel();
        loop {
            let sequence = self.sequence.next();
            // After wraparound a very old request may still hold this number.
            if let Entry::Vacant(slot) = pending.entry(sequence) {
                slot.insert(tx);
                return Ok((sequence, rx));
            }
        }
    }

    /// Marks the session closed and fails every outstanding request.
    fn close_pending(&self) {
        let drained: Vec<ResponseSlot> = {
            let mut pending = self.pending();
            self.closed.send_replace(true);
            pending.drain().map(|(_, slot)| slot).collect()
        };
        if !drained.is_empty() {
            debug!(session = %self.id, failed = drained.len(), "failing outstanding requests");
        }
        // Dropping the senders wakes every waiter with a receive error.
        drop(drained);
    }

    /// Hands an encoded frame to the writer task without waiting for it.
    fn enqueue(
        &self,
        bytes: Vec<u8>,
        written: Option<oneshot::Sender<io::Result<()>>>,
    ) -> Result<(), RconError> {
        self.outbound
            .send(Outbound::Frame { bytes, written })
            .map_err(|_| RconError::ConnectionClosed)
    }

    /// Routes one decoded frame.
    fn dispatch(&self, frame: Frame, events: &EventQueue) {
        if frame.is_response {
            let slot = self.pending().remove(&frame.sequence);
            match slot {
                Some(slot) => {
                    debug!(session = %self.id, sequence = frame.sequence, "response received");
                    // The waiter may have timed out in the meantime; nothing to do then.
                    let _ = slot.send(frame.words);
                }
                None => {
                    debug!(
                        session = %self.id,
                        sequence = frame.sequence,
                        "dropping response for unknown sequence"
                    );
                }
            }
            return;
        }

        if frame.is_from_server {
            let ack = Frame::acknowledgement(&frame);
            debug!(
                session = %self.id,
                sequence = frame.sequence,
                event = frame.status().unwrap_or_default(),
                "event received"
            );
            events.push(frame.words);
            if self.is_closed() {
                debug!(session = %self.id, "transport closing; event not acknowledged");
                return;
            }
            let queued = encode_frame(&ack)
                .map_err(RconError::from)
                .and_then(|bytes| self.enqueue(bytes, None));
            if let Err(e) = queued {
                warn!(session = %self.id, sequence = ack.sequence, "failed to acknowledge event: {e}");
            }
            return;
        }

        debug!(
            session = %self.id,
            sequence = frame.sequence,
            "dropping client-direction request from server"
        );
    }
}

/// One authenticated-or-not connection to an RCON server.
///
/// Dropping the session stops its reader and writer tasks; outstanding
/// requests then fail with [`RconError::ConnectionClosed`].
pub struct Session {
    shared: Arc<Shared>,
    events: EventQueue,
    timeout: Duration,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Session {
    /// Wraps a connected transport and starts its reader task.
    ///
    /// Events are pushed onto `events`; `timeout` bounds both [`send`](Self::send)
    /// and [`listen`](Self::listen).
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new<T: Transport + 'static>(transport: T, events: EventQueue, timeout: Duration) -> Self {
        Self::with_first_sequence(transport, events, timeout, 0)
    }

    /// Like [`new`](Self::new), but the first request uses `first_sequence`
    /// (masked to 30 bits).
    pub fn with_first_sequence<T: Transport + 'static>(
        transport: T,
        events: EventQueue,
        timeout: Duration,
        first_sequence: u32,
    ) -> Self {
        let boxed: BoxedTransport = Box::new(transport);
        let (read_half, write_half) = io::split(boxed);
        let (closed, _) = watch::channel(false);
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            id: Uuid::new_v4(),
            outbound,
            sequence: SequenceCounter::starting_at(first_sequence),
            pending: Mutex::new(HashMap::new()),
            closed,
        });

        let reader = tokio::spawn(read_loop(read_half, Arc::clone(&shared), events.clone()));
        let writer = tokio::spawn(write_loop(write_half, outbound_rx, Arc::clone(&shared)));
        info!(session = %shared.id, "session started");

        Self {
            shared,
            events,
            timeout,
            reader,
            writer,
        }
    }

    /// Identifier used in this session's log output.
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Sends a command and waits for its response words.
    ///
    /// Responses are matched by sequence number only, so several `send`
    /// calls may be in flight at once and complete in any order.
    ///
    /// # Errors
    ///
    /// - [`RconError::ConnectionClosed`] if the transport is already closing
    ///   (nothing is written) or closes before the response arrives.
    /// - [`RconError::Timeout`] if the request is not written and answered
    ///   within the session timeout.  The request is not retried.
    /// - [`RconError::Frame`] if a word contains a zero byte.
    /// - [`RconError::Io`] if writing the request fails.
    pub async fn send<S: AsRef<str>>(&self, words: &[S]) -> Result<Vec<String>, RconError> {
        let words: Vec<String> = words.iter().map(|w| w.as_ref().to_owned()).collect();
        let (sequence, response) = self.shared.register()?;
        // Removes the slot on every exit path, including cancellation.
        let _slot = SlotGuard {
            shared: &self.shared,
            sequence,
        };

        let request = Frame::request(sequence, words);
        debug!(
            session = %self.shared.id,
            sequence,
            command = request.status().unwrap_or_default(),
            "sending request"
        );
        let bytes = encode_frame(&request)?;
        let (written_tx, written) = oneshot::channel();
        self.shared.enqueue(bytes, Some(written_tx))?;

        match time::timeout(self.timeout, await_response(written, response)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(session = %self.shared.id, sequence, "request timed out");
                Err(RconError::Timeout(self.timeout))
            }
        }
    }

    /// Waits up to the session timeout for the next server event.
    ///
    /// # Errors
    ///
    /// Returns [`RconError::Timeout`] if no event arrives in time.
    pub async fn listen(&self) -> Result<Vec<String>, RconError> {
        self.events.pop(self.timeout).await
    }

    /// Returns `true` once the transport is closing or closed.
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Resolves when the transport has closed.
    pub async fn closed(&self) {
        let mut rx = self.shared.closed.subscribe();
        // The sender lives in `shared`, which `self` keeps alive.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Number of requests currently waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.shared.pending().len()
    }

    /// Closes the transport and fails every outstanding request.
    ///
    /// Frames already queued are written before the write half is shut down,
    /// waiting at most the session timeout.
    pub async fn close(&self) {
        self.shared.close_pending();
        self.reader.abort();
        let (done_tx, done) = oneshot::channel();
        if self.shared.outbound.send(Outbound::Shutdown(done_tx)).is_ok()
            && time::timeout(self.timeout, done).await.is_err()
        {
            debug!(session = %self.shared.id, "writer did not drain before close");
        }
        self.writer.abort();
        info!(session = %self.shared.id, "session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shared.close_pending();
        self.reader.abort();
        self.writer.abort();
    }
}

/// Waits for the request to be written, then for its response.
async fn await_response(
    written: oneshot::Receiver<io::Result<()>>,
    response: oneshot::Receiver<Vec<String>>,
) -> Result<Vec<String>, RconError> {
    written
        .await
        .map_err(|_| RconError::ConnectionClosed)?
        .map_err(RconError::Io)?;
    response.await.map_err(|_| RconError::ConnectionClosed)
}

/// Removes a pending slot when the owning `send` finishes or is dropped.
struct SlotGuard<'a> {
    shared: &'a Shared,
    sequence: u32,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.shared.pending().remove(&self.sequence);
    }
}

/// Reads from the transport until EOF or error, dispatching every complete
/// frame, then fails all outstanding requests.
async fn read_loop(mut reader: ReadHalf<BoxedTransport>, shared: Arc<Shared>, events: EventQueue) {
    // Accumulates bytes across read() calls until a whole frame is present.
    let mut buffer: Vec<u8> = Vec::with_capacity(READ_CHUNK_SIZE);
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    'read: loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => {
                debug!(session = %shared.id, "connection closed by server (EOF)");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                warn!(session = %shared.id, "read failed: {e}");
                break;
            }
        };
        buffer.extend_from_slice(&chunk[..n]);

        // One read may carry several frames, or only part of one.
        while is_complete(&buffer) {
            match decode_frame(&buffer) {
                Ok((frame, consumed)) => {
                    buffer.drain(..consumed);
                    shared.dispatch(frame, &events);
                }
                Err(e) => {
                    // The stream position is lost; nothing after this is trustworthy.
                    warn!(session = %shared.id, "undecodable frame, closing session: {e}");
                    break 'read;
                }
            }
        }
    }

    shared.close_pending();
}

/// Writes queued frames in order until shutdown or a write error.
///
/// A failed write closes the session: the stream may now hold a partial
/// frame, so nothing after it can be trusted.
async fn write_loop(
    mut writer: WriteHalf<BoxedTransport>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    shared: Arc<Shared>,
) {
    while let Some(item) = outbound.recv().await {
        match item {
            Outbound::Frame { bytes, written } => {
                let result = match writer.write_all(&bytes).await {
                    Ok(()) => writer.flush().await,
                    Err(e) => Err(e),
                };
                let failed = result.is_err();
                if let Err(e) = &result {
                    warn!(session = %shared.id, "write failed: {e}");
                }
                if let Some(written) = written {
                    // The sender may have timed out already.
                    let _ = written.send(result);
                }
                if failed {
                    shared.close_pending();
                    break;
                }
            }
            Outbound::Shutdown(done) => {
                if let Err(e) = writer.shutdown().await {
                    debug!(session = %shared.id, "shutdown after close: {e}");
                }
                let _ = done.send(());
                break;
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
