//! Read-only views of the registry.

use serde::Serialize;

use crate::expiry::{self, EpochMillis};

/// One tracked address and its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Address text.
    pub address: String,
    /// Absolute expiry in epoch milliseconds.
    pub expiry: EpochMillis,
}

impl Entry {
    /// Whether the entry is dead at `now` (strict `now > expiry`).
    #[must_use]
    pub const fn is_expired(&self, now: EpochMillis) -> bool {
        expiry::is_expired(self.expiry, now)
    }

    /// Milliseconds left at `now`.
    #[must_use]
    pub fn remaining(&self, now: EpochMillis) -> Option<u64> {
        expiry::remaining_time(self.expiry, now)
    }

    /// Active or expired at `now`.
    #[must_use]
    pub const fn status(&self, now: EpochMillis) -> EntryStatus {
        if self.is_expired(now) {
            EntryStatus::Expired
        } else {
            EntryStatus::Active
        }
    }
}

/// Registry contents as of `now`.
///
/// Entries may include addresses that are already expired but not yet
/// swept; comparing each `expiry` against `now` tells them apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Time the snapshot was taken.
    pub now: EpochMillis,
    /// Entries ordered by expiry, then address.
    pub entries: Vec<Entry>,
}

impl Snapshot {
    /// Entries with the given status (any if `None`) whose address contains
    /// `search`, ignoring case.
    pub fn matching<'a>(
        &'a self,
        status: Option<EntryStatus>,
        search: &str,
    ) -> impl Iterator<Item = &'a Entry> + 'a {
        let search = search.trim().to_lowercase();
        self.entries.iter().filter(move |entry| {
            status.is_none_or(|status| entry.status(self.now) == status)
                && entry.address.to_lowercase().contains(&search)
        })
    }
}

/// Dashboard counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryStats {
    /// Every tracked address.
    pub total: usize,
    /// Addresses with `expiry > now`.
    pub active: usize,
    /// Addresses with `expiry <= now`.
    pub expired: usize,
}

/// Status label written to history exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Still usable.
    Active,
    /// Past its expiry.
    Expired,
}

/// One row of a history export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRecord {
    /// Address text.
    pub email: String,
    /// Expiry as an RFC 3339 timestamp.
    pub expiry: String,
    /// Status at export time.
    pub status: EntryStatus,
}

impl HistoryRecord {
    pub(crate) fn from_entry(entry: &Entry, now: EpochMillis) -> Self {
        let expiry = chrono::DateTime::from_timestamp_millis(entry.expiry).map_or_else(
            || entry.expiry.to_string(),
            |at| at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        );
        Self {
            email: entry.address.clone(),
            expiry,
            status: entry.status(now),
        }
    }
}
