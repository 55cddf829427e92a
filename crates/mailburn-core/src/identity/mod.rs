//! Temporary identity lifecycle.
//!
//! The [`IdentityManager`] owns the registry of tracked addresses and their
//! expiry times. Every mutation goes through it and is mirrored to the
//! backing store; callers only ever observe the registry through
//! [`IdentityManager::list_entries`] snapshots.

mod clock;
mod manager;
mod model;

pub use clock::{Clock, ManualClock, SystemClock};
pub use manager::IdentityManager;
pub use model::{Entry, EntryStatus, HistoryRecord, RegistryStats, Snapshot};
