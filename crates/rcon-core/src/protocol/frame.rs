//! Frame type and wire-format constants for the RCON protocol.
//!
//! # What is a frame? (for beginners)
//!
//! Everything that travels over the RCON connection is a *frame*: a small
//! binary envelope carrying an ordered list of text "words".  A command such
//! as `serverInfo` is a frame with one word; the server's reply is a frame
//! whose first word is a status such as `"OK"` followed by the result values.
//!
//! The envelope also carries a 30-bit *sequence number* and two flag bits:
//!
//! ```text
//! bit 31          bit 30          bits 29..0
//! is_from_server  is_response     sequence
//! ```
//!
//! - A command the client sends: `is_response = false`, `is_from_server = false`.
//! - The server's reply to it: same sequence, `is_response = true`,
//!   `is_from_server = false`.
//! - An unsolicited event from the server: `is_response = false`,
//!   `is_from_server = true`.
//! - The client's acknowledgement of that event: same sequence,
//!   `is_response = true`, `is_from_server = true`.

/// Size in bytes of the fixed frame prefix: header + total size + word count.
pub const FRAME_PREFIX_SIZE: usize = 12;

/// Per-word overhead: 4-byte length prefix plus the trailing zero byte.
pub const WORD_OVERHEAD: usize = 5;

/// Bit mask selecting the sequence number from the header word.
pub const SEQUENCE_MASK: u32 = 0x3FFF_FFFF;

/// Largest sequence number representable on the wire (2^30 − 1).
pub const MAX_SEQUENCE: u32 = SEQUENCE_MASK;

/// Header bit set on replies (to commands or to events).
pub const RESPONSE_FLAG: u32 = 0x4000_0000;

/// Header bit set on frames that belong to a server-originated exchange.
pub const FROM_SERVER_FLAG: u32 = 0x8000_0000;

/// One protocol message: a request, a response, an event, or an event
/// acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Correlates a request with its response.  Must not exceed
    /// [`MAX_SEQUENCE`] when encoded.
    pub sequence: u32,
    /// `true` for the reply half of an exchange.
    pub is_response: bool,
    /// `true` for frames belonging to a server-originated exchange.
    pub is_from_server: bool,
    /// Ordered words.  Order is significant.
    pub words: Vec<String>,
}

impl Frame {
    /// Creates a frame from its parts.
    pub fn new(sequence: u32, is_response: bool, is_from_server: bool, words: Vec<String>) -> Self {
        Self {
            sequence,
            is_response,
            is_from_server,
            words,
        }
    }

    /// Builds a client-originated command frame.
    pub fn request(sequence: u32, words: Vec<String>) -> Self {
        Self::new(sequence, false, false, words)
    }

    /// Builds the acknowledgement the client must send back for a server
    /// event: same sequence and words, with both flag bits set.
    pub fn acknowledgement(event: &Frame) -> Self {
        Self::new(event.sequence, true, true, event.words.clone())
    }

    /// Returns `true` if this frame is an unsolicited server event.
    pub fn is_event(&self) -> bool {
        !self.is_response && self.is_from_server
    }

    /// Packs the sequence and flag bits into the 32-bit header word.
    ///
    /// The sequence is masked to 30 bits; range validation is the encoder's
    /// job.
    pub fn header(&self) -> u32 {
        let mut header = self.sequence & SEQUENCE_MASK;
        if self.is_response {
            header |= RESPONSE_FLAG;
        }
        if self.is_from_server {
            header |= FROM_SERVER_FLAG;
        }
        header
    }

    /// Number of bytes this frame occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        FRAME_PREFIX_SIZE
            + self
                .words
                .iter()
                .map(|w| w.len() + WORD_OVERHEAD)
                .sum::<usize>()
    }

    /// First word of the frame, usually the status of a response.
    pub fn status(&self) -> Option<&str> {
        self.words.first().map(String::as_str)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
