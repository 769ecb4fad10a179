//! Storage Module
//!
//! Home of [`Dict`], the incrementally-resized hash table that owns every
//! stored key/value pair. The dict is deliberately single-writer: the
//! command dispatcher wraps one instance in a mutex and executes commands
//! against it serially, so the table itself carries no locking.
//!
//! See [`dict`] for the two-table resize scheme.

pub mod dict;

// Re-export commonly used types
pub use dict::{hash_key, Dict, LOAD_FACTOR, MIGRATION_QUOTA};
