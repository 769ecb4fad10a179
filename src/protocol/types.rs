//! Wire Protocol Reply Types
//!
//! This module defines the tagged reply values emberkv sends back to
//! clients, and their binary serialization.
//!
//! ## Reply Format
//!
//! Every reply travels inside a frame: a `u32` little-endian length header
//! followed by that many body bytes. The body is one type-tagged value:
//!
//! ```text
//! Nil    = tag(0)
//! Err    = tag(1) | i32 code | u32 msg-len | msg bytes
//! Bulk   = tag(2) | u32 len  | bytes
//! Int    = tag(3) | i64 value
//! Array  = tag(4) | u32 count | count nested values
//! ```
//!
//! All integers are little-endian. An array carries no overall length of
//! its own; a decoder must recursively consume exactly `count` nested
//! values to find where it ends.

use bytes::Bytes;
use std::fmt;

/// Maximum payload size for a single request or response body (bytes).
pub const MAX_MESSAGE_SIZE: usize = 4096;

/// Size of the frame length header on the wire.
pub const HEADER_LEN: usize = 4;

/// Type tags for serialized reply values.
pub mod tag {
    pub const NIL: u8 = 0;
    pub const ERR: u8 = 1;
    pub const BULK: u8 = 2;
    pub const INT: u8 = 3;
    pub const ARRAY: u8 = 4;
}

/// Error codes carried by `Reply::Err`.
pub mod code {
    /// Unknown command or wrong arity.
    pub const UNKNOWN: i32 = 1;
    /// The reply body would exceed [`MAX_MESSAGE_SIZE`](super::MAX_MESSAGE_SIZE).
    pub const TOO_BIG: i32 = 2;
}

/// The result of one command, prior to binary serialization.
///
/// Produced once per request by the command dispatcher and immediately
/// encoded into the connection's write path; never retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Absence of a value (`get` on a missing key, `set` acknowledgement).
    Nil,

    /// A command-level error. Not connection-fatal: the client keeps its
    /// connection and the error travels as an ordinary reply.
    Err { code: i32, message: String },

    /// A binary-safe byte string (stored values, key names).
    Bulk(Bytes),

    /// A 64-bit signed integer (`del` result).
    Int(i64),

    /// A sequence of nested replies (`keys` result), possibly recursive.
    Array(Vec<Reply>),
}

impl Reply {
    /// Creates a nil reply.
    pub fn nil() -> Self {
        Reply::Nil
    }

    /// Creates an error reply with the given code.
    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Reply::Err {
            code,
            message: message.into(),
        }
    }

    /// The generic reply for an unrecognized command or bad arity.
    pub fn unknown_command() -> Self {
        Reply::error(code::UNKNOWN, "unknown command")
    }

    /// The substitute reply for a response body that would exceed
    /// [`MAX_MESSAGE_SIZE`].
    pub fn response_too_large() -> Self {
        Reply::error(code::TOO_BIG, "response too large")
    }

    /// Creates a bulk (byte string) reply.
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Reply::Bulk(data.into())
    }

    /// Creates an integer reply.
    pub fn int(n: i64) -> Self {
        Reply::Int(n)
    }

    /// Creates an array reply.
    pub fn array(values: Vec<Reply>) -> Self {
        Reply::Array(values)
    }

    /// Returns true if this reply is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Err { .. })
    }

    /// Number of bytes `encode` would produce, computed without
    /// serializing. Used to reject oversized replies before any of the
    /// payload reaches the write buffer.
    pub fn encoded_len(&self) -> usize {
        match self {
            Reply::Nil => 1,
            Reply::Err { message, .. } => 1 + 4 + 4 + message.len(),
            Reply::Bulk(data) => 1 + 4 + data.len(),
            Reply::Int(_) => 1 + 8,
            Reply::Array(values) => 1 + 4 + values.iter().map(Reply::encoded_len).sum::<usize>(),
        }
    }

    /// Serializes the reply body (everything after the frame header).
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf
    }

    /// Serializes the reply body into an existing buffer.
    ///
    /// More efficient than [`encode`](Self::encode) when a buffer is
    /// being reused across replies.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            Reply::Nil => {
                buf.push(tag::NIL);
            }
            Reply::Err { code, message } => {
                buf.push(tag::ERR);
                buf.extend_from_slice(&code.to_le_bytes());
                buf.extend_from_slice(&(message.len() as u32).to_le_bytes());
                buf.extend_from_slice(message.as_bytes());
            }
            Reply::Bulk(data) => {
                buf.push(tag::BULK);
                buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
                buf.extend_from_slice(data);
            }
            Reply::Int(n) => {
                buf.push(tag::INT);
                buf.extend_from_slice(&n.to_le_bytes());
            }
            Reply::Array(values) => {
                buf.push(tag::ARRAY);
                buf.extend_from_slice(&(values.len() as u32).to_le_bytes());
                for value in values {
                    value.encode_into(buf);
                }
            }
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Nil => write!(f, "(nil)"),
            Reply::Err { code, message } => write!(f, "(error {}) {}", code, message),
            Reply::Int(n) => write!(f, "(integer) {}", n),
            Reply::Bulk(data) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    write!(f, "\"{}\"", s)
                } else {
                    write!(f, "(binary data, {} bytes)", data.len())
                }
            }
            Reply::Array(values) => {
                if values.is_empty() {
                    write!(f, "(empty array)")
                } else {
                    writeln!(f)?;
                    for (i, v) in values.iter().enumerate() {
                        writeln!(f, "{}) {}", i + 1, v)?;
                    }
                    Ok(())
                }
            }
        }
    }
}
