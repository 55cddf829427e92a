//! # mailburn-core
//!
//! Lifecycle management for disposable mailbox addresses.
//!
//! This crate provides:
//! - **Expiry policy** - lifetimes, expiry arithmetic and remaining-time labels
//! - **Identity lifecycle** - the registry of tracked addresses, persisted per client
//! - **Persistent store** - `SQLite` and in-memory key/value backends
//! - **Address generation** - remote (`genRandomMailbox`) or local strategies
//! - **Mailbox gateway** - read-only access to the mailboxes of tracked addresses
//! - **Session timers** - periodic sweeping and mailbox polling
//!
//! ## Example
//!
//! ```ignore
//! use mailburn_core::{
//!     IdentityManager, Lifetime, LocalGenerator, MemoryStore, SystemClock, format_remaining,
//! };
//!
//! let manager =
//!     IdentityManager::initialize(MemoryStore::new(), LocalGenerator::default(), SystemClock)
//!         .await?;
//! let address = manager.create(Lifetime::ONE_HOUR).await?;
//! println!("{address} expires in {}", format_remaining(manager.query(address.as_str()).await));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod address;
pub mod config;
mod error;
pub mod expiry;
pub mod gateway;
pub mod generator;
pub mod identity;
pub mod session;
pub mod store;

pub use address::TemporaryAddress;
pub use config::{GeneratorKind, Settings};
pub use error::{Error, Result};
pub use expiry::{
    DurationUnit, EXPIRED_LABEL, EpochMillis, Lifetime, Urgency, compute_expiry, format_file_size,
    format_remaining, is_expired, remaining_time,
};
pub use gateway::{
    Action, AddressRegistry, AttachmentInfo, MailboxApi, MailboxGateway, MessageDetail,
    MessageHeader,
};
pub use generator::{
    AddressGenerator, ConfiguredGenerator, DEFAULT_DOMAINS, LocalGenerator, RemoteGenerator,
};
pub use identity::{
    Clock, Entry, EntryStatus, HistoryRecord, IdentityManager, ManualClock, RegistryStats,
    Snapshot, SystemClock,
};
pub use session::{Session, SessionConfig, SessionEvent};
pub use store::{ClientIdentity, KeyValueStore, MemoryStore, SqliteStore};
