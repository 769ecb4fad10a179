//! Command Execution
//!
//! This module interprets a parsed request (a list of byte strings) as a
//! command against the storage dict and produces the reply value.
//!
//! ## Supported Commands
//!
//! - `get key` — `Nil` if absent, else the stored value
//! - `set key value` — upsert, always `Nil`
//! - `del key` — `Int(1)` if a key was removed, else `Int(0)`
//! - `keys` — array of every stored key
//!
//! Anything else — an unknown name, wrong arity, or an empty argument
//! list — yields the generic unknown-command error reply. Command-level
//! errors are never connection-fatal; the client keeps its connection.
//!
//! ## Concurrency
//!
//! The dict sits behind a single mutex: the data path is intentionally
//! serial, and every dict operation (lookups included) takes `&mut self`
//! to advance the incremental resize. Each command acquires the lock
//! once, for the duration of that one table operation.

use crate::protocol::Reply;
use crate::storage::Dict;
use bytes::Bytes;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Executes commands against the shared storage dict.
#[derive(Clone)]
pub struct CommandHandler {
    /// The storage dict, shared across all connections.
    store: Arc<Mutex<Dict>>,
}

impl CommandHandler {
    /// Creates a new command handler over the given dict.
    pub fn new(store: Arc<Mutex<Dict>>) -> Self {
        Self { store }
    }

    /// Executes one request and returns the reply.
    ///
    /// `args` is the argument list in wire order; `args[0]` is the
    /// command name, matched exactly (lowercase).
    pub fn execute(&self, args: &[Bytes]) -> Reply {
        match args {
            [name, key] if name.as_ref() == b"get" => self.cmd_get(key),
            [name, key, value] if name.as_ref() == b"set" => self.cmd_set(key, value),
            [name, key] if name.as_ref() == b"del" => self.cmd_del(key),
            [name] if name.as_ref() == b"keys" => self.cmd_keys(),
            _ => {
                debug!(argc = args.len(), "unknown command");
                Reply::unknown_command()
            }
        }
    }

    /// `get key`
    fn cmd_get(&self, key: &Bytes) -> Reply {
        let mut store = self.store.lock().unwrap();
        match store.get(key) {
            Some(value) => Reply::Bulk(value),
            None => Reply::Nil,
        }
    }

    /// `set key value`
    fn cmd_set(&self, key: &Bytes, value: &Bytes) -> Reply {
        let mut store = self.store.lock().unwrap();
        store.set(key.clone(), value.clone());
        Reply::Nil
    }

    /// `del key`
    fn cmd_del(&self, key: &Bytes) -> Reply {
        let mut store = self.store.lock().unwrap();
        if store.remove(key) {
            Reply::Int(1)
        } else {
            Reply::Int(0)
        }
    }

    /// `keys`
    fn cmd_keys(&self) -> Reply {
        let store = self.store.lock().unwrap();
        // The element count comes from the live table size; keys() must
        // produce exactly that many elements regardless of scan order.
        let count = store.len();
        let keys = store.keys();
        debug_assert_eq!(keys.len(), count);
        Reply::Array(keys.into_iter().map(Reply::Bulk).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> CommandHandler {
        CommandHandler::new(Arc::new(Mutex::new(Dict::new())))
    }

    fn args(parts: &[&str]) -> Vec<Bytes> {
        parts.iter().map(|p| Bytes::copy_from_slice(p.as_bytes())).collect()
    }

    #[test]
    fn test_set_then_get() {
        let h = handler();
        assert_eq!(h.execute(&args(&["set", "a", "1"])), Reply::Nil);
        assert_eq!(h.execute(&args(&["get", "a"])), Reply::bulk("1"));
    }

    #[test]
    fn test_get_missing() {
        let h = handler();
        assert_eq!(h.execute(&args(&["get", "nope"])), Reply::Nil);
    }

    #[test]
    fn test_set_overwrites() {
        let h = handler();
        h.execute(&args(&["set", "a", "1"]));
        h.execute(&args(&["set", "a", "2"]));
        assert_eq!(h.execute(&args(&["get", "a"])), Reply::bulk("2"));
    }

    #[test]
    fn test_del() {
        let h = handler();
        h.execute(&args(&["set", "a", "1"]));
        assert_eq!(h.execute(&args(&["del", "a"])), Reply::Int(1));
        assert_eq!(h.execute(&args(&["del", "a"])), Reply::Int(0));
        assert_eq!(h.execute(&args(&["get", "a"])), Reply::Nil);
    }

    #[test]
    fn test_keys() {
        let h = handler();
        h.execute(&args(&["set", "a", "1"]));
        h.execute(&args(&["set", "b", "2"]));
        h.execute(&args(&["set", "c", "3"]));
        h.execute(&args(&["del", "b"]));

        let reply = h.execute(&args(&["keys"]));
        let Reply::Array(elements) = reply else {
            panic!("expected array reply");
        };
        assert_eq!(elements.len(), 2);
        let mut names: Vec<Bytes> = elements
            .into_iter()
            .map(|r| match r {
                Reply::Bulk(b) => b,
                other => panic!("expected bulk element, got {:?}", other),
            })
            .collect();
        names.sort();
        assert_eq!(names, vec![Bytes::from("a"), Bytes::from("c")]);
    }

    #[test]
    fn test_keys_empty_store() {
        let h = handler();
        assert_eq!(h.execute(&args(&["keys"])), Reply::Array(vec![]));
    }

    #[test]
    fn test_unknown_command() {
        let h = handler();
        let reply = h.execute(&args(&["foo"]));
        assert!(reply.is_error());
    }

    #[test]
    fn test_wrong_arity_is_unknown() {
        let h = handler();
        assert!(h.execute(&args(&["get"])).is_error());
        assert!(h.execute(&args(&["set", "a"])).is_error());
        assert!(h.execute(&args(&["del", "a", "b"])).is_error());
        assert!(h.execute(&args(&["keys", "pattern"])).is_error());
    }

    #[test]
    fn test_case_sensitive_names() {
        let h = handler();
        assert!(h.execute(&args(&["GET", "a"])).is_error());
    }

    #[test]
    fn test_empty_request_is_unknown() {
        let h = handler();
        assert!(h.execute(&[]).is_error());
    }

    #[test]
    fn test_empty_key_and_value() {
        let h = handler();
        assert_eq!(h.execute(&args(&["set", "", ""])), Reply::Nil);
        assert_eq!(h.execute(&args(&["get", ""])), Reply::bulk(""));
        assert_eq!(h.execute(&args(&["del", ""])), Reply::Int(1));
    }
}
