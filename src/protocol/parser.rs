//! Request Parsing and Reply Decoding
//!
//! Pure functions over byte slices: no I/O, no state. The connection
//! layer extracts a complete frame payload and hands it here.
//!
//! ## Request Format
//!
//! A request payload (the bytes inside one frame) is:
//!
//! ```text
//! u32 argc | argc x ( u32 len | len bytes )
//! ```
//!
//! Parsing is strict: a declared length that overruns the payload, a
//! truncated header, or bytes left over after `argc` arguments have been
//! consumed ("trailing garbage") are hard errors. A malformed request is
//! never dispatched; the connection that sent it is closed.
//!
//! ## Reply Decoding
//!
//! [`decode_reply`] is the exact inverse of [`Reply::encode`]. The server
//! never decodes replies itself; the function exists for the bundled
//! client and for the encode/decode identity tests.

use crate::protocol::types::{tag, Reply, MAX_MESSAGE_SIZE};
use bytes::Bytes;
use thiserror::Error;

/// Errors produced while parsing a request payload or decoding a reply.
///
/// Any of these is a protocol violation: the peer is not speaking the
/// wire format and the connection carrying the bytes must be closed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Ran out of bytes before the structure was complete.
    #[error("truncated message")]
    Truncated,

    /// A declared length runs past the end of the payload.
    #[error("declared length {declared} overruns {available} available bytes")]
    LengthOverrun { declared: usize, available: usize },

    /// Bytes remain after the declared argument count was consumed.
    #[error("trailing garbage: {0} bytes after last argument")]
    TrailingGarbage(usize),

    /// A reply body starts with an unrecognized type tag.
    #[error("unknown reply tag: {0:#04x}")]
    UnknownTag(u8),

    /// A message exceeds the per-frame payload limit.
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

#[inline]
fn read_u32(buf: &[u8], pos: usize) -> ParseResult<u32> {
    let bytes = buf
        .get(pos..pos + 4)
        .ok_or(ParseError::Truncated)?
        .try_into()
        .expect("slice of length 4");
    Ok(u32::from_le_bytes(bytes))
}

/// Parses a request payload into its argument list.
///
/// # Returns
///
/// The argument byte strings in wire order. The first argument is the
/// command name; interpretation belongs to the command dispatcher.
pub fn parse_request(payload: &[u8]) -> ParseResult<Vec<Bytes>> {
    let argc = read_u32(payload, 0)? as usize;

    // Each argument needs at least its own length header, so an argc
    // larger than the payload could ever hold is already malformed.
    // Checking here also keeps the Vec preallocation honest.
    if argc > payload.len() / 4 {
        return Err(ParseError::LengthOverrun {
            declared: argc,
            available: payload.len() / 4,
        });
    }

    let mut args = Vec::with_capacity(argc);
    let mut pos = 4;

    for _ in 0..argc {
        let len = read_u32(payload, pos)? as usize;
        pos += 4;
        let end = pos.checked_add(len).ok_or(ParseError::Truncated)?;
        if end > payload.len() {
            return Err(ParseError::LengthOverrun {
                declared: len,
                available: payload.len() - pos,
            });
        }
        args.push(Bytes::copy_from_slice(&payload[pos..end]));
        pos = end;
    }

    if pos != payload.len() {
        return Err(ParseError::TrailingGarbage(payload.len() - pos));
    }

    Ok(args)
}

/// Encodes an argument list as a complete framed request, outer length
/// header included.
///
/// Used by the bundled client; the server only ever parses requests.
pub fn encode_request<T: AsRef<[u8]>>(args: &[T]) -> ParseResult<Vec<u8>> {
    let body_len = 4 + args
        .iter()
        .map(|a| 4 + a.as_ref().len())
        .sum::<usize>();
    if body_len > MAX_MESSAGE_SIZE {
        return Err(ParseError::MessageTooLarge {
            size: body_len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut buf = Vec::with_capacity(4 + body_len);
    buf.extend_from_slice(&(body_len as u32).to_le_bytes());
    buf.extend_from_slice(&(args.len() as u32).to_le_bytes());
    for arg in args {
        let arg = arg.as_ref();
        buf.extend_from_slice(&(arg.len() as u32).to_le_bytes());
        buf.extend_from_slice(arg);
    }
    Ok(buf)
}

/// Decodes one reply value from the front of `buf`.
///
/// # Returns
///
/// The decoded value and the number of bytes it occupied. Arrays are
/// decoded by recursively consuming exactly `count` nested values.
pub fn decode_reply(buf: &[u8]) -> ParseResult<(Reply, usize)> {
    let tag_byte = *buf.first().ok_or(ParseError::Truncated)?;
    match tag_byte {
        tag::NIL => Ok((Reply::Nil, 1)),
        tag::ERR => {
            let code_bytes = buf
                .get(1..5)
                .ok_or(ParseError::Truncated)?
                .try_into()
                .expect("slice of length 4");
            let code = i32::from_le_bytes(code_bytes);
            let len = read_u32(buf, 5)? as usize;
            let msg = buf.get(9..9 + len).ok_or(ParseError::LengthOverrun {
                declared: len,
                available: buf.len().saturating_sub(9),
            })?;
            let message = String::from_utf8_lossy(msg).into_owned();
            Ok((Reply::Err { code, message }, 9 + len))
        }
        tag::BULK => {
            let len = read_u32(buf, 1)? as usize;
            let data = buf.get(5..5 + len).ok_or(ParseError::LengthOverrun {
                declared: len,
                available: buf.len().saturating_sub(5),
            })?;
            Ok((Reply::Bulk(Bytes::copy_from_slice(data)), 5 + len))
        }
        tag::INT => {
            let bytes = buf
                .get(1..9)
                .ok_or(ParseError::Truncated)?
                .try_into()
                .expect("slice of length 8");
            Ok((Reply::Int(i64::from_le_bytes(bytes)), 9))
        }
        tag::ARRAY => {
            let count = read_u32(buf, 1)? as usize;
            let mut values = Vec::with_capacity(count.min(buf.len()));
            let mut consumed = 5;
            for _ in 0..count {
                let (value, n) = decode_reply(&buf[consumed..])?;
                values.push(value);
                consumed += n;
            }
            Ok((Reply::Array(values), consumed))
        }
        other => Err(ParseError::UnknownTag(other)),
    }
}
