//! ListenUseCase: consumes server events and keeps the connection alive.
//!
//! The use case runs two loops side by side until the shutdown flag clears:
//!
//! - the **event loop** pulls events from the [`RconChannel`] and hands them
//!   to an [`EventHandler`];
//! - the **heartbeat loop** sends `serverInfo` every interval.  A failed
//!   heartbeat is how a dead connection is noticed, and it hands control to
//!   [`RconChannel::reconnect`].  Clearing the shutdown flag abandons a
//!   reconnect that is still retrying.
//!
//! The channel implementation lives in the infrastructure layer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rcon_core::RawEvent;
use thiserror::Error;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

/// Liveness probe sent by the heartbeat loop.
pub const HEARTBEAT_COMMAND: &str = "serverInfo";

/// Pause after a listen failure other than a timeout.
const LISTEN_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Longest stretch the heartbeat loop sleeps without checking the shutdown flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

/// Error type for channel operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// Nothing arrived within the channel's timeout.
    #[error("timed out")]
    Timeout,
    /// The channel cannot serve requests right now.
    #[error("channel unavailable: {0}")]
    Unavailable(String),
}

/// Command/event channel to an RCON server.
#[async_trait]
pub trait RconChannel: Send + Sync {
    /// Sends a command and returns the response words.
    async fn send_command(&self, words: Vec<String>) -> Result<Vec<String>, ChannelError>;

    /// Returns the next server event, or [`ChannelError::Timeout`].
    async fn listen(&self) -> Result<Vec<String>, ChannelError>;

    /// Replaces the connection, retrying transient failures.
    async fn reconnect(&self) -> Result<(), ChannelError>;
}

/// Consumer of decoded events.
#[cfg_attr(test, mockall::automock)]
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: RawEvent);
}

/// [`EventHandler`] that writes every event to the log.
#[derive(Debug, Default)]
pub struct LoggingEventHandler;

impl EventHandler for LoggingEventHandler {
    fn handle(&self, event: RawEvent) {
        info!(event = %event.name, args = ?event.args, "server event");
    }
}

/// The Listen use case.
pub struct ListenUseCase {
    channel: Arc<dyn RconChannel>,
    handler: Arc<dyn EventHandler>,
    heartbeat_interval: Duration,
}

impl ListenUseCase {
    /// Creates a new use case over `channel`.
    pub fn new(
        channel: Arc<dyn RconChannel>,
        handler: Arc<dyn EventHandler>,
        heartbeat_interval: Duration,
    ) -> Self {
        Self {
            channel,
            handler,
            heartbeat_interval,
        }
    }

    /// Runs until `running` is cleared.
    ///
    /// # Errors
    ///
    /// Returns the error of a reconnect that failed after a missed heartbeat.
    pub async fn run(&self, running: Arc<AtomicBool>) -> Result<(), ChannelError> {
        tokio::try_join!(self.event_loop(&running), self.heartbeat_loop(&running))?;
        Ok(())
    }

    async fn event_loop(&self, running: &AtomicBool) -> Result<(), ChannelError> {
        while running.load(Ordering::Relaxed) {
            match self.channel.listen().await {
                Ok(words) => self.dispatch(words),
                Err(ChannelError::Timeout) => {}
                Err(e) => {
                    debug!("listen failed: {e}");
                    time::sleep(LISTEN_RETRY_DELAY).await;
                }
            }
        }
        Ok(())
    }

    async fn heartbeat_loop(&self, running: &AtomicBool) -> Result<(), ChannelError> {
        let mut next_beat = Instant::now() + self.heartbeat_interval;
        while running.load(Ordering::Relaxed) {
            let now = Instant::now();
            if now < next_beat {
                time::sleep((next_beat - now).min(SHUTDOWN_POLL)).await;
                continue;
            }
            next_beat = now + self.heartbeat_interval;

            match self
                .channel
                .send_command(vec![HEARTBEAT_COMMAND.to_string()])
                .await
            {
                Ok(words) => {
                    debug!(status = words.first().map(String::as_str), "heartbeat answered");
                }
                Err(e) => {
                    warn!("heartbeat failed: {e}; reconnecting");
                    tokio::select! {
                        result = self.channel.reconnect() => {
                            result?;
                            info!("reconnected after missed heartbeat");
                        }
                        () = shutdown_requested(running) => {
                            info!("shutdown requested while reconnecting");
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn dispatch(&self, words: Vec<String>) {
        match RawEvent::try_from(words) {
            Ok(event) => self.handler.handle(event),
            Err(e) => warn!("ignoring event: {e}"),
        }
    }
}

/// Resolves once `running` has been cleared.
async fn shutdown_requested(running: &AtomicBool) {
    while running.load(Ordering::Relaxed) {
        time::sleep(SHUTDOWN_POLL).await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    // ── Fake channel ──────────────────────────────────────────────────────────

    #[derive(Default)]
    struct FakeChannel {
        events: Mutex<VecDeque<Vec<String>>>,
        commands: Mutex<Vec<Vec<String>>>,
        /// Number of upcoming heartbeats that fail.
        failing_heartbeats: AtomicUsize,
        reconnects: AtomicUsize,
        reconnect_fails: bool,
        /// `reconnect` never returns, like a server that stays down.
        reconnect_hangs: bool,
    }

    impl FakeChannel {
        fn with_events(events: &[&[&str]]) -> Self {
            let queued: VecDeque<Vec<String>> = events
                .iter()
                .map(|ws| ws.iter().map(|w| (*w).to_string()).collect::<Vec<String>>())
                .collect();
            Self {
                events: Mutex::new(queued),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl RconChannel for FakeChannel {
        async fn send_command(&self, words: Vec<String>) -> Result<Vec<String>, ChannelError> {
            self.commands.lock().unwrap().push(words);
            let failing = self.failing_heartbeats.load(Ordering::SeqCst);
            if failing > 0 {
                self.failing_heartbeats.store(failing - 1, Ordering::SeqCst);
                return Err(ChannelError::Unavailable("connection closed".to_string()));
            }
            Ok(vec!["OK".to_string()])
        }

        async fn listen(&self) -> Result<Vec<String>, ChannelError> {
            let next = self.events.lock().unwrap().pop_front();
            match next {
                Some(words) => Ok(words),
                None => {
                    time::sleep(Duration::from_millis(5)).await;
                    Err(ChannelError::Timeout)
                }
            }
        }

        async fn reconnect(&self) -> Result<(), ChannelError> {
            self.reconnects.fetch_add(1, Ordering::SeqCst);
            if self.reconnect_hangs {
                std::future::pending::<()>().await;
            }
            if self.reconnect_fails {
                return Err(ChannelError::Unavailable("authentication failed".to_string()));
            }
            Ok(())
        }
    }

    fn silent_handler() -> Arc<MockEventHandler> {
        let mut handler = MockEventHandler::new();
        handler.expect_handle().returning(|_| ());
        Arc::new(handler)
    }

    /// Runs the use case for `duration`, then clears the running flag.
    async fn run_for(use_case: &ListenUseCase, duration: Duration) -> Result<(), ChannelError> {
        let running = Arc::new(AtomicBool::new(true));
        let stopper = Arc::clone(&running);
        tokio::spawn(async move {
            time::sleep(duration).await;
            stopper.store(false, Ordering::Relaxed);
        });
        use_case.run(running).await
    }

    // ── Event loop ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_events_are_handed_to_handler_in_order() {
        // Arrange
        let channel = Arc::new(FakeChannel::with_events(&[
            &["player.onJoin", "Alice"],
            &["player.onKill", "Alice", "Bob", "M16A4", "true"],
        ]));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut handler = MockEventHandler::new();
        handler
            .expect_handle()
            .times(2)
            .returning(move |event| sink.lock().unwrap().push(event.name));
        let use_case = ListenUseCase::new(channel, Arc::new(handler), Duration::from_secs(60));

        // Act
        run_for(&use_case, Duration::from_millis(50)).await.unwrap();

        // Assert
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["player.onJoin".to_string(), "player.onKill".to_string()]
        );
    }

    #[tokio::test]
    async fn test_empty_event_is_skipped() {
        // Arrange
        let channel = Arc::new(FakeChannel::with_events(&[&[]]));
        let mut handler = MockEventHandler::new();
        handler.expect_handle().never();
        let use_case = ListenUseCase::new(channel, Arc::new(handler), Duration::from_secs(60));

        // Act / Assert – the mock panics if the empty event is handled
        run_for(&use_case, Duration::from_millis(30)).await.unwrap();
    }

    // ── Heartbeat loop ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_heartbeat_sends_server_info_periodically() {
        // Arrange
        let channel = Arc::new(FakeChannel::default());
        let use_case = ListenUseCase::new(
            Arc::clone(&channel) as Arc<dyn RconChannel>,
            silent_handler(),
            Duration::from_millis(10),
        );

        // Act
        run_for(&use_case, Duration::from_millis(100)).await.unwrap();

        // Assert
        let commands = channel.commands.lock().unwrap();
        assert!(commands.len() >= 2, "expected several heartbeats, got {}", commands.len());
        assert!(commands.iter().all(|c| c == &vec![HEARTBEAT_COMMAND.to_string()]));
        assert_eq!(channel.reconnects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_heartbeat_triggers_reconnect() {
        // Arrange
        let channel = Arc::new(FakeChannel {
            failing_heartbeats: AtomicUsize::new(1),
            ..FakeChannel::default()
        });
        let use_case = ListenUseCase::new(
            Arc::clone(&channel) as Arc<dyn RconChannel>,
            silent_handler(),
            Duration::from_millis(10),
        );

        // Act
        run_for(&use_case, Duration::from_millis(100)).await.unwrap();

        // Assert
        assert_eq!(channel.reconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_reconnect_stops_the_use_case() {
        // Arrange
        let channel = Arc::new(FakeChannel {
            failing_heartbeats: AtomicUsize::new(1),
            reconnect_fails: true,
            ..FakeChannel::default()
        });
        let use_case = ListenUseCase::new(channel, silent_handler(), Duration::from_millis(10));

        // Act
        let result = run_for(&use_case, Duration::from_secs(5)).await;

        // Assert
        assert_eq!(
            result,
            Err(ChannelError::Unavailable("authentication failed".to_string()))
        );
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_reconnect_in_progress() {
        // Arrange
        let channel = Arc::new(FakeChannel {
            failing_heartbeats: AtomicUsize::new(1),
            reconnect_hangs: true,
            ..FakeChannel::default()
        });
        let use_case = ListenUseCase::new(
            Arc::clone(&channel) as Arc<dyn RconChannel>,
            silent_handler(),
            Duration::from_millis(10),
        );

        // Act
        let result = time::timeout(
            Duration::from_secs(2),
            run_for(&use_case, Duration::from_millis(50)),
        )
        .await;

        // Assert
        assert_eq!(result, Ok(Ok(())), "run must return once shutdown is requested");
        assert_eq!(channel.reconnects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_logging_handler_accepts_any_event() {
        let event = RawEvent {
            name: "server.onRoundOver".to_string(),
            args: vec!["1".to_string()],
        };
        LoggingEventHandler.handle(event);
    }
}
