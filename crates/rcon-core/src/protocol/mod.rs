//! Protocol module containing the frame type, the binary codec, and the
//! sequence counter.

pub mod codec;
pub mod event;
pub mod frame;
pub mod sequence;

pub use codec::{decode_frame, encode_frame, is_complete, FrameError};
pub use event::{EmptyEvent, RawEvent};
pub use frame::*;
pub use sequence::SequenceCounter;
