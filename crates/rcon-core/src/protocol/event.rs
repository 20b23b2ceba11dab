//! Boundary type for server events.
//!
//! The session hands events over as raw word arrays.  [`RawEvent`] only splits
//! off the event name (the first word, e.g. `player.onJoin`); interpreting the
//! remaining words per event name belongs to whoever consumes the events.

use thiserror::Error;

/// Returned when an event frame carries no words at all.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("event frame carried no words")]
pub struct EmptyEvent;

/// A server event split into its name and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Event name, e.g. `player.onKill` or `server.onRoundOver`.
    pub name: String,
    /// Remaining words, uninterpreted.
    pub args: Vec<String>,
}

impl TryFrom<Vec<String>> for RawEvent {
    type Error = EmptyEvent;

    fn try_from(mut words: Vec<String>) -> Result<Self, Self::Error> {
        if words.is_empty() {
            return Err(EmptyEvent);
        }
        let name = words.remove(0);
        Ok(Self { name, args: words })
    }
}
