//! Binary codec for encoding and decoding RCON frames.
//!
//! Wire format:
//! ```text
//! [header:4][total_size:4][word_count:4] { [word_len:4][word:N][0x00] } * word_count
//! ```
//! Prefix size: 12 bytes. All integers are little-endian `u32`.
//!
//! # Stream framing (for beginners)
//!
//! TCP delivers a byte stream, not messages.  The reader accumulates bytes and
//! calls [`is_complete`] before every [`decode_frame`]: only once the buffer
//! holds at least `total_size` bytes is a full frame available.  The decoder
//! then reports how many bytes it consumed so the caller can drain them from
//! the front of its buffer.

use thiserror::Error;

use crate::protocol::frame::{
    Frame, FRAME_PREFIX_SIZE, FROM_SERVER_FLAG, MAX_SEQUENCE, RESPONSE_FLAG, SEQUENCE_MASK,
    WORD_OVERHEAD,
};

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The buffer is shorter than the frame it claims to contain.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The declared total size cannot hold even the fixed prefix.
    #[error("invalid frame size {0}: smaller than the 12-byte prefix")]
    InvalidSize(usize),

    /// The words did not end exactly at the declared total size.
    #[error("frame size mismatch: header declares {declared} bytes, words end at {actual}")]
    SizeMismatch { declared: usize, actual: usize },

    /// The sequence number does not fit in 30 bits.
    #[error("sequence {0} exceeds the 30-bit maximum")]
    SequenceOutOfRange(u32),

    /// A word contains a zero byte, which the wire format uses as terminator.
    #[error("word {index} contains an embedded zero byte")]
    EmbeddedNul { index: usize },

    /// A length does not fit in the 32-bit wire field.
    #[error("frame too large: {0} bytes")]
    TooLarge(usize),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Returns `true` once `buffer` holds at least one complete frame.
///
/// This is the sole readiness gate before [`decode_frame`]: the buffer must be
/// longer than 8 bytes (so the size field is readable) and at least as long as
/// the declared `total_size`.
///
/// # Examples
///
/// ```rust
/// use rcon_core::protocol::{encode_frame, is_complete, Frame};
///
/// let bytes = encode_frame(&Frame::request(1, vec!["serverInfo".into()])).unwrap();
/// assert!(is_complete(&bytes));
/// assert!(!is_complete(&bytes[..bytes.len() - 1]));
/// ```
pub fn is_complete(buffer: &[u8]) -> bool {
    buffer.len() > 8 && buffer.len() >= read_u32(buffer, 4) as usize
}

/// Encodes a [`Frame`] into its wire representation.
///
/// # Errors
///
/// Returns [`FrameError::SequenceOutOfRange`] if the sequence exceeds 30 bits
/// (callers must pre-mask), and [`FrameError::EmbeddedNul`] if any word
/// contains a zero byte, which could not be decoded back faithfully.
///
/// # Examples
///
/// ```rust
/// use rcon_core::protocol::{decode_frame, encode_frame, Frame};
///
/// let frame = Frame::request(3, vec!["login.hashed".into()]);
/// let bytes = encode_frame(&frame).unwrap();
/// let (decoded, consumed) = decode_frame(&bytes).unwrap();
/// assert_eq!(decoded, frame);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, FrameError> {
    if frame.sequence > MAX_SEQUENCE {
        return Err(FrameError::SequenceOutOfRange(frame.sequence));
    }
    if let Some(index) = frame.words.iter().position(|w| w.as_bytes().contains(&0)) {
        return Err(FrameError::EmbeddedNul { index });
    }

    let total_size = frame.encoded_len();
    let total_size_u32 = u32::try_from(total_size).map_err(|_| FrameError::TooLarge(total_size))?;
    let word_count = u32::try_from(frame.words.len()).map_err(|_| FrameError::TooLarge(total_size))?;

    let mut buf = Vec::with_capacity(total_size);
    buf.extend_from_slice(&frame.header().to_le_bytes());
    buf.extend_from_slice(&total_size_u32.to_le_bytes());
    buf.extend_from_slice(&word_count.to_le_bytes());

    for word in &frame.words {
        let bytes = word.as_bytes();
        // Fits: the whole frame length already fit in a u32.
        buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(bytes);
        buf.push(0x00);
    }

    debug_assert_eq!(buf.len(), total_size);
    Ok(buf)
}

/// Decodes one [`Frame`] from the beginning of `buffer`.
///
/// Returns the frame and the number of bytes consumed, which always equals the
/// declared `total_size`.  Bytes past the frame are left untouched.
///
/// # Errors
///
/// - [`FrameError::InsufficientData`] if [`is_complete`] was not checked first.
/// - [`FrameError::InvalidSize`] if the declared size is below the prefix size.
/// - [`FrameError::SizeMismatch`] if the words overrun or underrun the
///   declared size.
pub fn decode_frame(buffer: &[u8]) -> Result<(Frame, usize), FrameError> {
    if buffer.len() < FRAME_PREFIX_SIZE {
        return Err(FrameError::InsufficientData {
            needed: FRAME_PREFIX_SIZE,
            available: buffer.len(),
        });
    }

    let header = read_u32(buffer, 0);
    let total_size = read_u32(buffer, 4) as usize;
    let word_count = read_u32(buffer, 8) as usize;

    if total_size < FRAME_PREFIX_SIZE {
        return Err(FrameError::InvalidSize(total_size));
    }
    if buffer.len() < total_size {
        return Err(FrameError::InsufficientData {
            needed: total_size,
            available: buffer.len(),
        });
    }

    // Only the declared frame is visible to the word loop.
    let body = &buffer[..total_size];
    let mut words = Vec::with_capacity(word_count.min(total_size / WORD_OVERHEAD));
    let mut offset = FRAME_PREFIX_SIZE;
    for _ in 0..word_count {
        let (word, next) = read_word(body, offset, total_size)?;
        words.push(word);
        offset = next;
    }

    if offset != total_size {
        return Err(FrameError::SizeMismatch {
            declared: total_size,
            actual: offset,
        });
    }

    let frame = Frame {
        sequence: header & SEQUENCE_MASK,
        is_response: header & RESPONSE_FLAG != 0,
        is_from_server: header & FROM_SERVER_FLAG != 0,
        words,
    };
    Ok((frame, total_size))
}

// ── Utility helpers ───────────────────────────────────────────────────────────

/// Reads a little-endian `u32` at `offset`.  Callers guarantee the bounds.
fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

/// Reads one length-prefixed, zero-terminated word starting at `offset`.
/// Returns the word and the offset of the byte after its terminator.
fn read_word(body: &[u8], offset: usize, declared: usize) -> Result<(String, usize), FrameError> {
    let overrun = |actual: usize| FrameError::SizeMismatch { declared, actual };

    if body.len() < offset + 4 {
        return Err(overrun(offset + 4));
    }
    let len = read_u32(body, offset) as usize;
    let start = offset + 4;
    let next = start
        .checked_add(len)
        .and_then(|end| end.checked_add(1))
        .ok_or_else(|| overrun(usize::MAX))?;
    if next > body.len() {
        return Err(overrun(next));
    }

    // Lossy: a single non-UTF-8 player name must not tear down the session.
    let word = String::from_utf8_lossy(&body[start..start + len]).into_owned();
    Ok((word, next))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn words(ws: &[&str]) -> Vec<String> {
        ws.iter().map(|w| (*w).to_string()).collect()
    }

    fn round_trip(frame: &Frame) -> Frame {
        let encoded = encode_frame(frame).expect("encode failed");
        let (decoded, consumed) = decode_frame(&encoded).expect("decode failed");
        assert_eq!(consumed, encoded.len(), "consumed bytes should equal total encoded size");
        decoded
    }

    // ── Layout ───────────────────────────────────────────────────────────────

    #[test]
    fn test_encode_writes_little_endian_prefix() {
        // Arrange
        let frame = Frame::new(1, true, false, words(&["OK"]));

        // Act
        let bytes = encode_frame(&frame).unwrap();

        // Assert – header, size (12 + 2 + 5 = 19), word count
        assert_eq!(&bytes[0..4], &(0x4000_0001u32).to_le_bytes());
        assert_eq!(&bytes[4..8], &19u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &1u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &2u32.to_le_bytes());
        assert_eq!(&bytes[16..18], b"OK");
        assert_eq!(bytes[18], 0x00);
        assert_eq!(bytes.len(), 19);
    }

    #[test]
    fn test_header_flags_decode_from_high_bits() {
        // Arrange – sequence 5, both flags set
        let mut bytes = encode_frame(&Frame::new(5, false, false, vec![])).unwrap();
        bytes[0..4].copy_from_slice(&(5u32 | RESPONSE_FLAG | FROM_SERVER_FLAG).to_le_bytes());

        // Act
        let (frame, _) = decode_frame(&bytes).unwrap();

        // Assert
        assert_eq!(frame.sequence, 5);
        assert!(frame.is_response);
        assert!(frame.is_from_server);
    }

    #[test]
    fn test_empty_frame_is_prefix_only() {
        let frame = Frame::new(0, false, false, vec![]);
        let bytes = encode_frame(&frame).unwrap();
        assert_eq!(bytes.len(), FRAME_PREFIX_SIZE);
        assert_eq!(round_trip(&frame), frame);
    }

    // ── Round trips ──────────────────────────────────────────────────────────

    #[test]
    fn test_event_round_trip_preserves_words_and_flags() {
        let frame = Frame::new(
            MAX_SEQUENCE,
            false,
            true,
            words(&["player.onKill", "Alice", "Bob", "M16A4", "true"]),
        );
        assert_eq!(round_trip(&frame), frame);
    }

    #[test]
    fn test_round_trip_with_utf8_and_empty_words() {
        let frame = Frame::new(42, true, false, words(&["OK", "", "Zoë", "日本"]));
        assert_eq!(round_trip(&frame), frame);
    }

    #[test]
    fn test_decode_leaves_trailing_bytes_unconsumed() {
        // Arrange – two frames back to back
        let first = Frame::request(1, words(&["version"]));
        let second = Frame::request(2, words(&["serverInfo"]));
        let mut buf = encode_frame(&first).unwrap();
        let first_len = buf.len();
        buf.extend(encode_frame(&second).unwrap());

        // Act
        let (decoded, consumed) = decode_frame(&buf).unwrap();
        let (decoded_second, _) = decode_frame(&buf[consumed..]).unwrap();

        // Assert
        assert_eq!(decoded, first);
        assert_eq!(consumed, first_len);
        assert_eq!(decoded_second, second);
    }

    #[test]
    fn test_decode_replaces_invalid_utf8_instead_of_failing() {
        // Arrange – one word containing a lone 0xFF byte
        let mut bytes = encode_frame(&Frame::new(3, false, true, words(&["x"]))).unwrap();
        bytes[16] = 0xFF;

        // Act
        let (frame, _) = decode_frame(&bytes).unwrap();

        // Assert
        assert_eq!(frame.words, vec!["\u{FFFD}".to_string()]);
    }

    // ── is_complete ──────────────────────────────────────────────────────────

    #[test]
    fn test_is_complete_false_for_every_strict_prefix() {
        // Arrange
        let bytes = encode_frame(&Frame::request(9, words(&["admin.eventsEnabled", "true"]))).unwrap();

        // Act / Assert
        for len in 0..bytes.len() {
            assert!(!is_complete(&bytes[..len]), "prefix of {len} bytes must be incomplete");
        }
        assert!(is_complete(&bytes));
    }

    #[test]
    fn test_is_complete_requires_more_than_eight_bytes() {
        // A size field claiming 0 bytes is still not "complete" at 8 bytes.
        let buf = [0u8; 8];
        assert!(!is_complete(&buf));
        assert!(is_complete(&[0u8; 9]));
    }

    // ── Encode rejections ────────────────────────────────────────────────────

    #[test]
    fn test_encode_rejects_sequence_above_30_bits() {
        let frame = Frame::request(MAX_SEQUENCE + 1, vec![]);
        assert_eq!(
            encode_frame(&frame),
            Err(FrameError::SequenceOutOfRange(MAX_SEQUENCE + 1))
        );
    }

    #[test]
    fn test_encode_rejects_embedded_nul() {
        let frame = Frame::request(0, words(&["ok", "bad\0word"]));
        assert_eq!(encode_frame(&frame), Err(FrameError::EmbeddedNul { index: 1 }));
    }

    // ── Decode rejections ────────────────────────────────────────────────────

    #[test]
    fn test_decode_short_buffer_returns_insufficient_data() {
        let result = decode_frame(&[0u8; 4]);
        assert_eq!(
            result,
            Err(FrameError::InsufficientData {
                needed: FRAME_PREFIX_SIZE,
                available: 4
            })
        );
    }

    #[test]
    fn test_decode_truncated_frame_returns_insufficient_data() {
        let bytes = encode_frame(&Frame::request(1, words(&["serverInfo"]))).unwrap();
        let result = decode_frame(&bytes[..bytes.len() - 2]);
        assert!(matches!(result, Err(FrameError::InsufficientData { .. })));
    }

    #[test]
    fn test_decode_rejects_size_below_prefix() {
        let mut bytes = vec![0u8; 12];
        bytes[4..8].copy_from_slice(&4u32.to_le_bytes());
        assert_eq!(decode_frame(&bytes), Err(FrameError::InvalidSize(4)));
    }

    #[test]
    fn test_decode_rejects_word_count_larger_than_payload() {
        // Arrange – claim two words but only encode one
        let mut bytes = encode_frame(&Frame::request(1, words(&["OK"]))).unwrap();
        bytes[8..12].copy_from_slice(&2u32.to_le_bytes());

        // Act
        let result = decode_frame(&bytes);

        // Assert
        assert!(matches!(result, Err(FrameError::SizeMismatch { .. })));
    }

    #[test]
    fn test_decode_rejects_trailing_garbage_inside_declared_size() {
        // Arrange – declare one extra byte that no word accounts for
        let mut bytes = encode_frame(&Frame::request(1, words(&["OK"]))).unwrap();
        let declared = bytes.len() as u32 + 1;
        bytes[4..8].copy_from_slice(&declared.to_le_bytes());
        bytes.push(0xAA);

        // Act
        let result = decode_frame(&bytes);

        // Assert
        assert_eq!(
            result,
            Err(FrameError::SizeMismatch {
                declared: declared as usize,
                actual: declared as usize - 1
            })
        );
    }

    #[test]
    fn test_decode_rejects_word_length_overrunning_frame() {
        let mut bytes = encode_frame(&Frame::request(1, words(&["OK"]))).unwrap();
        bytes[12..16].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            decode_frame(&bytes),
            Err(FrameError::SizeMismatch { .. })
        ));
    }
}
