//! Binary codec for messages leaving the local pipeline.
//!
//! Every [`Message`] is serde-serializable, so a transport can pick any format. This
//! module fixes one: bincode with fixed-size integers, which [`QueuedChannel`] uses to
//! turn outbound messages into packets.
//!
//! # Examples
//!
//! ```
//! use pitlane::routing::codec::{decode_message, encode_message};
//! use pitlane::{Message, StageId};
//!
//! let message = Message::StageBegin { stage_id: StageId::new(2) };
//! let bytes = encode_message(&message).expect("encoding should succeed");
//! let decoded = decode_message(&bytes).expect("decoding should succeed");
//! assert_eq!(decoded, message);
//! ```
//!
//! [`QueuedChannel`]: crate::routing::channel::QueuedChannel

use serde::{de::DeserializeOwned, Serialize};
use std::fmt;

use crate::messages::Message;

fn config() -> impl bincode::config::Config {
    bincode::config::standard().with_fixed_int_encoding()
}

/// What the codec was doing when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodecOperation {
    /// Encoding a [`Message`].
    EncodeMessage,
    /// Decoding a [`Message`].
    DecodeMessage,
    /// Appending to a buffer.
    AppendToBuffer,
    /// Encoding any other value.
    Encode,
    /// Decoding any other value.
    Decode,
}

impl fmt::Display for CodecOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EncodeMessage => write!(f, "encoding message"),
            Self::DecodeMessage => write!(f, "decoding message"),
            Self::AppendToBuffer => write!(f, "appending to buffer"),
            Self::Encode => write!(f, "encoding"),
            Self::Decode => write!(f, "decoding"),
        }
    }
}

/// Errors that can occur during encoding or decoding.
///
/// Bincode's errors carry no structured reason, so their rendered text is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecError {
    /// The encoding operation failed.
    EncodeError {
        /// The underlying bincode error message.
        message: String,
        /// The operation that was being performed.
        operation: CodecOperation,
    },
    /// The decoding operation failed.
    DecodeError {
        /// The underlying bincode error message.
        message: String,
        /// The operation that was being performed.
        operation: CodecOperation,
    },
    /// Bytes were left over after a complete message was decoded.
    TrailingBytes {
        /// Bytes consumed by the message.
        consumed: usize,
        /// Bytes supplied.
        provided: usize,
    },
}

impl CodecError {
    /// Creates a new encode error with the given message and operation.
    pub fn encode(message: impl Into<String>, operation: CodecOperation) -> Self {
        Self::EncodeError {
            message: message.into(),
            operation,
        }
    }

    /// Creates a new decode error with the given message and operation.
    pub fn decode(message: impl Into<String>, operation: CodecOperation) -> Self {
        Self::DecodeError {
            message: message.into(),
            operation,
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EncodeError { message, operation } => {
                write!(f, "encoding failed while {operation}: {message}")
            },
            Self::DecodeError { message, operation } => {
                write!(f, "decoding failed while {operation}: {message}")
            },
            Self::TrailingBytes { consumed, provided } => {
                write!(
                    f,
                    "message ended after {consumed} of {provided} bytes"
                )
            },
        }
    }
}

impl std::error::Error for CodecError {}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Encodes any serializable value into a new `Vec<u8>`.
pub fn encode<T: Serialize>(value: &T) -> CodecResult<Vec<u8>> {
    bincode::serde::encode_to_vec(value, config())
        .map_err(|e| CodecError::encode(e.to_string(), CodecOperation::Encode))
}

/// Appends the encoding of a value to `buffer`, returning the bytes written.
///
/// ```
/// use pitlane::routing::codec::encode_append;
/// use pitlane::Message;
///
/// let mut buffer = Vec::new();
/// let first = encode_append(&Message::Advance, &mut buffer).expect("encoding should succeed");
/// let second = encode_append(&Message::CupEnd, &mut buffer).expect("encoding should succeed");
/// assert_eq!(buffer.len(), first + second);
/// ```
pub fn encode_append<T: Serialize>(value: &T, buffer: &mut Vec<u8>) -> CodecResult<usize> {
    let start_len = buffer.len();
    bincode::serde::encode_into_std_write(value, buffer, config())
        .map(|_| buffer.len() - start_len)
        .map_err(|e| CodecError::encode(e.to_string(), CodecOperation::AppendToBuffer))
}

/// Decodes a value, returning it with the number of bytes consumed.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<(T, usize)> {
    bincode::serde::decode_from_slice(bytes, config())
        .map_err(|e| CodecError::decode(e.to_string(), CodecOperation::Decode))
}

/// Decodes a value, ignoring the bytes consumed.
pub fn decode_value<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    decode(bytes).map(|(value, _)| value)
}

/// Encodes a message into a standalone packet.
pub fn encode_message(message: &Message) -> CodecResult<Vec<u8>> {
    bincode::serde::encode_to_vec(message, config())
        .map_err(|e| CodecError::encode(e.to_string(), CodecOperation::EncodeMessage))
}

/// Decodes a packet that must hold exactly one message.
pub fn decode_message(bytes: &[u8]) -> CodecResult<Message> {
    let (message, consumed): (Message, usize) =
        bincode::serde::decode_from_slice(bytes, config())
            .map_err(|e| CodecError::decode(e.to_string(), CodecOperation::DecodeMessage))?;
    if consumed != bytes.len() {
        return Err(CodecError::TrailingBytes {
            consumed,
            provided: bytes.len(),
        });
    }
    Ok(message)
}

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::cup::TrackDescription;
    use crate::StageId;

    #[test]
    fn message_with_payload_survives_encoding() {
        let original = Message::Intermission {
            stage_id: StageId::new(1),
            track: TrackDescription::new("canyon run", 9, 2),
        };
        let bytes = encode_message(&original).unwrap();
        assert_eq!(decode_message(&bytes).unwrap(), original);
    }

    #[test]
    fn fixed_int_encoding_is_size_stable() {
        let small = encode(&1_u32).unwrap();
        let large = encode(&u32::MAX).unwrap();
        assert_eq!(small.len(), 4);
        assert_eq!(small.len(), large.len());
    }

    #[test]
    fn appended_messages_decode_in_sequence() {
        let mut buffer = Vec::new();
        let first = encode_append(&Message::Advance, &mut buffer).unwrap();
        encode_append(&Message::Restart, &mut buffer).unwrap();

        let (a, read): (Message, _) = decode(&buffer).unwrap();
        assert_eq!(a, Message::Advance);
        assert_eq!(read, first);
        let (b, _): (Message, _) = decode(&buffer[read..]).unwrap();
        assert_eq!(b, Message::Restart);
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = encode_message(&Message::CupEnd).unwrap();
        bytes.push(0);
        assert!(matches!(
            decode_message(&bytes),
            Err(CodecError::TrailingBytes { .. })
        ));
    }

    #[test]
    fn truncated_packet_is_a_decode_error() {
        let bytes = encode_message(&Message::StageBegin {
            stage_id: StageId::new(7),
        })
        .unwrap();
        let err = decode_message(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, CodecError::DecodeError { .. }));
        assert!(err.to_string().contains("decoding message"));
    }
}
