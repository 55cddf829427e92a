//! Persistent key/value storage.
//!
//! The store is a passive durability sink: it holds opaque bytes under string
//! keys and knows nothing about what they mean. The lifecycle manager owns
//! the encoding.

mod client_id;
mod memory;
mod sqlite;

use std::future::Future;
use std::sync::Arc;

pub use client_id::{CLIENT_ID_KEY, ClientIdentity};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::Result;

/// Durable byte storage scoped by key.
pub trait KeyValueStore: Send + Sync {
    /// Returns the bytes stored under `key`, if any.
    fn load(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Stores `value` under `key`, replacing any previous value.
    fn save(&self, key: &str, value: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Deletes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}

impl<T: KeyValueStore> KeyValueStore for Arc<T> {
    fn load(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &[u8]) -> impl Future<Output = Result<()>> + Send {
        (**self).save(key, value)
    }

    fn remove(&self, key: &str) -> impl Future<Output = Result<()>> + Send {
        (**self).remove(key)
    }
}
