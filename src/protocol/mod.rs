//! Binary Wire Protocol
//!
//! emberkv speaks a length-prefixed binary protocol over TCP. Every unit
//! on the wire is a frame: a `u32` little-endian length header bounded by
//! [`MAX_MESSAGE_SIZE`], followed by that many payload bytes.
//!
//! - A request payload is an argument count followed by length-prefixed
//!   byte strings (see [`parser::parse_request`]).
//! - A response payload is one recursively encoded, type-tagged
//!   [`Reply`] value (see [`types`]).
//!
//! ## Modules
//!
//! - `types`: the `Reply` enum, its serialization, and the wire limits
//! - `parser`: request parsing, request encoding, reply decoding
//!
//! ## Example
//!
//! ```
//! use emberkv::protocol::{encode_request, decode_reply, Reply, HEADER_LEN};
//!
//! let framed = encode_request(&["get", "name"]).unwrap();
//! assert_eq!(framed.len(), HEADER_LEN + 4 + (4 + 3) + (4 + 4));
//!
//! let body = Reply::bulk("hello").encode();
//! let (reply, consumed) = decode_reply(&body).unwrap();
//! assert_eq!(reply, Reply::bulk("hello"));
//! assert_eq!(consumed, body.len());
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used items for convenience
pub use parser::{decode_reply, encode_request, parse_request, ParseError, ParseResult};
pub use types::{code, tag, Reply, HEADER_LEN, MAX_MESSAGE_SIZE};
