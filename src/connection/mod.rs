//! Connection Module
//!
//! Manages individual client connections. Each accepted socket gets its
//! own async task running the per-connection state machine:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                      (main.rs)                              │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │ accept() + spawn
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  ConnectionHandler                          │
//! │                                                             │
//! │  ┌────────────┐   ┌───────────────┐   ┌────────────────┐    │
//! │  │ fill read  │──>│ extract frame │──>│ parse+dispatch │    │
//! │  │  buffer    │   │ (pipelining)  │   └───────┬────────┘    │
//! │  └────────────┘   └───────────────┘           ▼             │
//! │                                       ┌────────────────┐    │
//! │                                       │  flush reply   │    │
//! │                                       └────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Protocol violations (oversized frame, malformed request) close the
//! connection with no reply; command-level errors travel back as error
//! replies and the connection keeps serving. A client only ever sees a
//! complete reply or an abrupt close, never a partial one.

pub mod handler;

// Re-export commonly used types
pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
