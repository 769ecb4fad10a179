//! # emberkv - An In-Memory Key-Value Store
//!
//! emberkv is a single-process, in-memory key-value store served over a
//! custom length-prefixed binary TCP protocol.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            emberkv                              │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐          │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │          │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │          │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘          │
//! │                                               │                 │
//! │  ┌─────────────┐    ┌─────────────────────────▼──────────────┐  │
//! │  │ Wire Codec  │    │                 Dict                   │  │
//! │  │ (framing,   │    │   primary table ◄── incremental ───    │  │
//! │  │  replies)   │    │                     migration          │  │
//! │  └─────────────┘    │                 secondary table        │  │
//! │                     └────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Data flows one way per request: the connection handler fills its read
//! buffer, extracts complete frames, the codec parses them, the command
//! handler runs them against the dict, and the reply is encoded and
//! flushed before the next frame is touched.
//!
//! ## Wire Protocol
//!
//! Every message is a frame: a `u32` little-endian length header (max
//! payload 4096 bytes) followed by the payload. Requests carry an
//! argument count and length-prefixed byte strings; responses carry one
//! type-tagged value (`Nil`, `Err`, `Bulk`, `Int`, or a recursively
//! encoded `Array`). See the [`protocol`] module.
//!
//! ## Commands
//!
//! - `get key`
//! - `set key value`
//! - `del key`
//! - `keys`
//!
//! ## Design Highlights
//!
//! ### Incremental Rehashing
//!
//! The store is a hand-built chained hash table. When its load factor
//! crosses a threshold it does not rehash in one stop-the-world pass;
//! instead the old table is drained into a doubled new table a bounded
//! number of entries per operation, so no single request ever pays for a
//! full resize. See the [`storage`] module.
//!
//! ### Pipelining
//!
//! A connection may send many requests back to back; the handler drains
//! every complete frame in its buffer before reading again and answers
//! strictly in arrival order.
//!
//! ## Module Overview
//!
//! - [`protocol`]: frame parsing and the tagged reply codec
//! - [`storage`]: the incrementally-resized hash table
//! - [`commands`]: command dispatch (`get`/`set`/`del`/`keys`)
//! - [`connection`]: per-connection state machine and statistics

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use connection::{handle_connection, ConnectionError, ConnectionStats};
pub use protocol::{ParseError, Reply, HEADER_LEN, MAX_MESSAGE_SIZE};
pub use storage::Dict;

/// The default port emberkv listens on
pub const DEFAULT_PORT: u16 = 9988;

/// The default host emberkv binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of emberkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
