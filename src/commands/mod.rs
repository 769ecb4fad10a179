//! Command Dispatch Module
//!
//! Sits between the wire protocol and the storage dict:
//!
//! ```text
//! Request frame
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ parse_request   │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │      Dict       │  (storage module)
//! └─────────────────┘
//! ```
//!
//! Commands: `get`, `set`, `del`, `keys`. Everything else yields an
//! error reply, not a closed connection.

pub mod handler;

// Re-export the main command handler
pub use handler::CommandHandler;
