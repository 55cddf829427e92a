//! The identity lifecycle manager.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::model::{Entry, HistoryRecord, RegistryStats, Snapshot};
use crate::address::TemporaryAddress;
use crate::expiry::{self, EpochMillis, Lifetime};
use crate::generator::AddressGenerator;
use crate::store::{ClientIdentity, KeyValueStore};
use crate::Result;

type Registry = HashMap<String, EpochMillis>;

/// Owns the registry of tracked addresses.
///
/// The registry lives behind an async mutex so create, delete, sweep and
/// clear stay serialized even when timers run on other tasks. Address
/// generation happens before the lock is taken, so a slow address source
/// never holds up a sweep.
pub struct IdentityManager<S, G, C = SystemClock> {
    store: S,
    generator: G,
    clock: C,
    client_id: ClientIdentity,
    registry: Mutex<Registry>,
}

impl<S, G, C> IdentityManager<S, G, C>
where
    S: KeyValueStore,
    G: AddressGenerator,
    C: Clock,
{
    /// Loads prior state for this client and sweeps anything already expired.
    ///
    /// Unparsable stored data is discarded and the manager starts empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the client identity
    /// cannot be persisted.
    pub async fn initialize(store: S, generator: G, clock: C) -> Result<Self> {
        let client_id = ClientIdentity::load_or_create(&store, clock.now()).await?;

        let registry = match store.load(&client_id.registry_key()).await? {
            Some(bytes) => decode_registry(&bytes).unwrap_or_else(|e| {
                warn!("Discarding unreadable registry for {client_id}: {e}");
                Registry::new()
            }),
            None => Registry::new(),
        };
        debug!("Loaded {} tracked addresses for {client_id}", registry.len());

        let manager = Self {
            store,
            generator,
            clock,
            client_id,
            registry: Mutex::new(registry),
        };
        manager.sweep_now().await;
        Ok(manager)
    }

    /// Obtains a new address and tracks it for `lifetime`.
    ///
    /// Re-creating an address that is already tracked replaces its expiry.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::GenerationFailure`] if no address could be
    /// obtained. The registry is left untouched in that case.
    pub async fn create(&self, lifetime: Lifetime) -> Result<TemporaryAddress> {
        let address = self.generator.generate().await?;
        let expiry = expiry::compute_expiry(self.clock.now(), lifetime);

        let mut registry = self.registry.lock().await;
        if let Some(previous) = registry.insert(address.to_string(), expiry) {
            warn!("Address {address} was already tracked (expiry {previous}), now expires at {expiry}");
        }
        self.persist(&registry).await;
        drop(registry);

        info!("Created {address}, valid for {lifetime}");
        Ok(address)
    }

    /// Stops tracking `address`. Returns whether it was tracked.
    pub async fn delete(&self, address: &str) -> bool {
        let address = address.trim();
        let mut registry = self.registry.lock().await;
        if registry.remove(address).is_none() {
            return false;
        }
        self.persist(&registry).await;
        info!("Deleted {address}");
        true
    }

    /// Removes every entry expired at `now` and returns the removed
    /// addresses, sorted.
    ///
    /// The store is only written when something was removed.
    pub async fn sweep(&self, now: EpochMillis) -> Vec<String> {
        let mut registry = self.registry.lock().await;
        let mut removed: Vec<String> = registry
            .iter()
            .filter(|&(_, &expiry)| expiry::is_expired(expiry, now))
            .map(|(address, _)| address.clone())
            .collect();
        if removed.is_empty() {
            return removed;
        }

        for address in &removed {
            registry.remove(address);
        }
        self.persist(&registry).await;
        drop(registry);

        removed.sort();
        info!("Swept {} expired addresses", removed.len());
        removed
    }

    /// [`Self::sweep`] at the clock's current time.
    pub async fn sweep_now(&self) -> Vec<String> {
        self.sweep(self.clock.now()).await
    }

    /// Milliseconds left for `address`.
    ///
    /// Addresses are matched the way [`TemporaryAddress::parse`] reads them,
    /// ignoring surrounding whitespace.
    ///
    /// Returns `None` both for untracked addresses and for tracked ones that
    /// have expired but not yet been swept.
    pub async fn query(&self, address: &str) -> Option<u64> {
        let expiry = *self.registry.lock().await.get(address.trim())?;
        expiry::remaining_time(expiry, self.clock.now())
    }

    /// Whether `address` is present in the registry, expired or not.
    pub async fn is_tracked(&self, address: &str) -> bool {
        self.registry.lock().await.contains_key(address.trim())
    }

    /// Forgets every address and deletes this client's stored registry.
    pub async fn clear(&self) {
        let mut registry = self.registry.lock().await;
        registry.clear();
        if let Err(e) = self.store.remove(&self.client_id.registry_key()).await {
            warn!("Failed to remove stored registry for {}: {e}", self.client_id);
        }
        info!("Cleared address history");
    }

    /// Ordered copy of the registry, stamped with the current time.
    pub async fn list_entries(&self) -> Snapshot {
        let now = self.clock.now();
        let registry = self.registry.lock().await;
        let mut entries: Vec<Entry> = registry
            .iter()
            .map(|(address, &expiry)| Entry {
                address: address.clone(),
                expiry,
            })
            .collect();
        drop(registry);

        entries.sort_by(|a, b| a.expiry.cmp(&b.expiry).then_with(|| a.address.cmp(&b.address)));
        Snapshot { now, entries }
    }

    /// Counts of total, active and expired entries.
    pub async fn stats(&self) -> RegistryStats {
        let now = self.clock.now();
        let registry = self.registry.lock().await;
        let active = registry.values().filter(|&&expiry| expiry > now).count();
        RegistryStats {
            total: registry.len(),
            active,
            expired: registry.len() - active,
        }
    }

    /// Pretty-printed JSON export of the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub async fn export_history(&self) -> Result<String> {
        let snapshot = self.list_entries().await;
        let records: Vec<HistoryRecord> = snapshot
            .entries
            .iter()
            .map(|entry| HistoryRecord::from_entry(entry, snapshot.now))
            .collect();
        Ok(serde_json::to_string_pretty(&records)?)
    }

    /// Number of tracked addresses.
    pub async fn len(&self) -> usize {
        self.registry.lock().await.len()
    }

    /// Whether nothing is tracked.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Identity namespacing this manager's stored state.
    pub const fn client_id(&self) -> &ClientIdentity {
        &self.client_id
    }

    /// Current time according to the injected clock.
    pub fn now(&self) -> EpochMillis {
        self.clock.now()
    }

    /// Writes the registry to the store. Failures are logged, not returned:
    /// the in-memory registry stays authoritative for the session.
    async fn persist(&self, registry: &Registry) {
        let key = self.client_id.registry_key();
        let result = match encode_registry(registry) {
            Ok(bytes) => self.store.save(&key, &bytes).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("Failed to persist registry under {key}: {e}");
        }
    }
}

/// Registry wire form: a JSON array of `[address, expiry_ms]` pairs.
fn encode_registry(registry: &Registry) -> Result<Vec<u8>> {
    let mut pairs: Vec<(&str, EpochMillis)> = registry
        .iter()
        .map(|(address, &expiry)| (address.as_str(), expiry))
        .collect();
    pairs.sort_unstable();
    Ok(serde_json::to_vec(&pairs)?)
}

fn decode_registry(bytes: &[u8]) -> Result<Registry> {
    let pairs: Vec<(String, EpochMillis)> = serde_json::from_slice(bytes)?;
    Ok(pairs.into_iter().collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::Error;
    use crate::identity::ManualClock;
    use crate::store::{CLIENT_ID_KEY, MemoryStore};

    const T0: EpochMillis = 1_700_000_000_000;

    /// Hands out `addr<N>@1secmail.com`, or fails on demand.
    #[derive(Default)]
    struct SequenceGenerator {
        next: AtomicUsize,
        fixed: Option<&'static str>,
        fail: bool,
    }

    impl AddressGenerator for SequenceGenerator {
        async fn generate(&self) -> Result<TemporaryAddress> {
            if self.fail {
                return Err(Error::GenerationFailure("source offline".to_string()));
            }
            if let Some(fixed) = self.fixed {
                return TemporaryAddress::parse(fixed);
            }
            let n = self.next.fetch_add(1, Ordering::SeqCst);
            TemporaryAddress::parse(&format!("addr{n}@1secmail.com"))
        }
    }

    type TestManager = IdentityManager<Arc<MemoryStore>, SequenceGenerator, ManualClock>;

    async fn manager_with(
        store: &Arc<MemoryStore>,
        generator: SequenceGenerator,
        clock: &ManualClock,
    ) -> TestManager {
        IdentityManager::initialize(Arc::clone(store), generator, clock.clone())
            .await
            .unwrap()
    }

    async fn fresh() -> (TestManager, Arc<MemoryStore>, ManualClock) {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(T0);
        let manager = manager_with(&store, SequenceGenerator::default(), &clock).await;
        (manager, store, clock)
    }

    #[tokio::test]
    async fn test_create_then_query() {
        let (manager, _store, clock) = fresh().await;

        let address = manager.create(Lifetime::ONE_HOUR).await.unwrap();
        assert_eq!(manager.query(address.as_str()).await, Some(3_600_000));

        clock.advance(1_000);
        let remaining = manager.query(address.as_str()).await;
        assert_eq!(remaining, Some(3_599_000));
        assert_eq!(expiry::format_remaining(remaining), "59m 59s");
    }

    #[tokio::test]
    async fn test_full_lifecycle_scenario() {
        let (manager, _store, clock) = fresh().await;
        let address = manager.create(Lifetime::ONE_HOUR).await.unwrap();

        // Exactly at expiry the address is still valid.
        assert!(manager.sweep(T0 + 3_600_000).await.is_empty());

        let removed = manager.sweep(T0 + 3_600_001).await;
        assert_eq!(removed, vec![address.to_string()]);

        clock.set(T0 + 3_600_001);
        assert_eq!(manager.query(address.as_str()).await, None);
        assert!(manager.is_empty().await);
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent_and_skips_redundant_writes() {
        let (manager, store, _clock) = fresh().await;
        manager.create(Lifetime::ONE_HOUR).await.unwrap();
        manager.create(Lifetime::ONE_DAY).await.unwrap();

        let key = manager.client_id().registry_key();
        let first = manager.sweep(T0 + 3_600_001).await;
        assert_eq!(first.len(), 1);

        // Remove the stored copy: a sweep with nothing to do must not rewrite it.
        store.remove(&key).await.unwrap();
        assert!(manager.sweep(T0 + 3_600_001).await.is_empty());
        assert!(!store.contains(&key));
        assert_eq!(manager.len().await, 1);
    }

    #[tokio::test]
    async fn test_generation_failure_leaves_registry_untouched() {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(T0);
        let generator = SequenceGenerator {
            fail: true,
            ..SequenceGenerator::default()
        };
        let manager = manager_with(&store, generator, &clock).await;

        let result = manager.create(Lifetime::ONE_HOUR).await;
        assert!(matches!(result, Err(Error::GenerationFailure(_))));
        assert!(manager.is_empty().await);
        assert!(!store.contains(&manager.client_id().registry_key()));
    }

    #[tokio::test]
    async fn test_collision_overwrites_expiry() {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(T0);
        let generator = SequenceGenerator {
            fixed: Some("same@1secmail.com"),
            ..SequenceGenerator::default()
        };
        let manager = manager_with(&store, generator, &clock).await;

        manager.create(Lifetime::ONE_HOUR).await.unwrap();
        manager.create(Lifetime::ONE_WEEK).await.unwrap();

        assert_eq!(manager.len().await, 1);
        assert_eq!(
            manager.query("same@1secmail.com").await,
            Some(Lifetime::ONE_WEEK.as_millis())
        );
    }

    #[tokio::test]
    async fn test_delete() {
        let (manager, _store, _clock) = fresh().await;
        let address = manager.create(Lifetime::ONE_DAY).await.unwrap();

        assert!(!manager.delete("never@1secmail.com").await);
        assert_eq!(manager.len().await, 1);

        assert!(manager.delete(address.as_str()).await);
        assert!(!manager.delete(address.as_str()).await);
        assert_eq!(manager.query(address.as_str()).await, None);
    }

    #[tokio::test]
    async fn test_query_untracked_is_none() {
        let (manager, _store, _clock) = fresh().await;
        manager.create(Lifetime::ONE_DAY).await.unwrap();
        assert_eq!(manager.query("stranger@1secmail.net").await, None);
        assert_eq!(manager.query("not an address").await, None);
    }

    #[tokio::test]
    async fn test_expired_but_unswept_queries_as_none_but_is_listed() {
        let (manager, _store, clock) = fresh().await;
        let address = manager.create(Lifetime::ONE_HOUR).await.unwrap();

        clock.advance(3_600_001);
        assert_eq!(manager.query(address.as_str()).await, None);
        assert!(manager.is_tracked(address.as_str()).await);

        let snapshot = manager.list_entries().await;
        assert_eq!(snapshot.entries.len(), 1);
        assert!(snapshot.entries[0].is_expired(snapshot.now));
    }

    #[tokio::test]
    async fn test_clear_removes_stored_key() {
        let (manager, store, _clock) = fresh().await;
        for _ in 0..3 {
            manager.create(Lifetime::ONE_DAY).await.unwrap();
        }
        let key = manager.client_id().registry_key();
        assert!(store.contains(&key));

        manager.clear().await;
        assert_eq!(manager.len().await, 0);
        assert!(!store.contains(&key));
        assert!(store.contains(CLIENT_ID_KEY));
    }

    #[tokio::test]
    async fn test_reload_round_trip() {
        let (manager, store, clock) = fresh().await;
        manager.create(Lifetime::ONE_HOUR).await.unwrap();
        manager.create(Lifetime::ONE_WEEK).await.unwrap();
        let before = manager.list_entries().await;
        let client_id = manager.client_id().clone();
        drop(manager);

        let reloaded = manager_with(&store, SequenceGenerator::default(), &clock).await;
        assert_eq!(reloaded.client_id(), &client_id);
        assert_eq!(reloaded.list_entries().await, before);
    }

    #[tokio::test]
    async fn test_initialize_sweeps_and_persists() {
        let (manager, store, clock) = fresh().await;
        manager.create(Lifetime::ONE_HOUR).await.unwrap();
        let survivor = manager.create(Lifetime::ONE_WEEK).await.unwrap();
        drop(manager);

        clock.advance(2 * 3_600_000);
        let reloaded = manager_with(&store, SequenceGenerator::default(), &clock).await;
        assert_eq!(reloaded.len().await, 1);
        assert!(reloaded.is_tracked(survivor.as_str()).await);

        let stored = store
            .load(&reloaded.client_id().registry_key())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decode_registry(&stored).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_store_resets_to_empty() {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(T0);
        let client_id = ClientIdentity::load_or_create(&*store, T0).await.unwrap();
        store
            .save(&client_id.registry_key(), b"{not json")
            .await
            .unwrap();

        let manager = manager_with(&store, SequenceGenerator::default(), &clock).await;
        assert!(manager.is_empty().await);

        manager.create(Lifetime::ONE_HOUR).await.unwrap();
        assert_eq!(manager.len().await, 1);
    }

    #[tokio::test]
    async fn test_reads_legacy_pair_array() {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(T0);
        let client_id = ClientIdentity::load_or_create(&*store, T0).await.unwrap();
        let legacy = format!(r#"[["abc@1secmail.com",{}]]"#, T0 + 60_000);
        store
            .save(&client_id.registry_key(), legacy.as_bytes())
            .await
            .unwrap();

        let manager = manager_with(&store, SequenceGenerator::default(), &clock).await;
        assert_eq!(manager.query("abc@1secmail.com").await, Some(60_000));
    }

    #[tokio::test]
    async fn test_adopts_history_under_existing_device_id() {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(T0);
        store
            .save(CLIENT_ID_KEY, b"device_1699999999999_k3x9q2abc")
            .await
            .unwrap();
        let history = format!(r#"[["old@1secmail.net",{}]]"#, T0 + 120_000);
        store
            .save(
                "emailHistory_device_1699999999999_k3x9q2abc",
                history.as_bytes(),
            )
            .await
            .unwrap();

        let manager = manager_with(&store, SequenceGenerator::default(), &clock).await;
        assert_eq!(manager.client_id().as_str(), "device_1699999999999_k3x9q2abc");
        assert_eq!(manager.query("old@1secmail.net").await, Some(120_000));
    }

    #[tokio::test]
    async fn test_new_identity_uses_injected_clock() {
        let (manager, _store, _clock) = fresh().await;
        assert!(
            manager
                .client_id()
                .as_str()
                .starts_with(&format!("device_{T0}_"))
        );
    }

    #[tokio::test]
    async fn test_lookups_ignore_surrounding_whitespace() {
        let (manager, _store, _clock) = fresh().await;
        let address = manager.create(Lifetime::ONE_HOUR).await.unwrap();
        let padded = format!("  {address} ");

        assert!(manager.is_tracked(&padded).await);
        assert_eq!(manager.query(&padded).await, Some(3_600_000));
        assert!(manager.delete(&padded).await);
        assert!(!manager.is_tracked(address.as_str()).await);
    }

    #[tokio::test]
    async fn test_stats_and_export() {
        let (manager, _store, clock) = fresh().await;
        manager.create(Lifetime::ONE_HOUR).await.unwrap();
        manager.create(Lifetime::ONE_DAY).await.unwrap();
        clock.advance(3_600_000);

        // At exactly its expiry an entry counts as expired on the dashboard.
        let stats = manager.stats().await;
        assert_eq!(
            stats,
            RegistryStats {
                total: 2,
                active: 1,
                expired: 1
            }
        );

        let json: serde_json::Value =
            serde_json::from_str(&manager.export_history().await.unwrap()).unwrap();
        let rows = json.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["email"], "addr0@1secmail.com");
        assert_eq!(rows[0]["expiry"], "2023-11-14T23:13:20.000Z");
        assert_eq!(rows[0]["status"], "active");
        assert_eq!(rows[1]["status"], "active");
    }

    #[tokio::test]
    async fn test_list_entries_ordered_by_expiry() {
        let (manager, _store, _clock) = fresh().await;
        let week = manager.create(Lifetime::ONE_WEEK).await.unwrap();
        let hour = manager.create(Lifetime::ONE_HOUR).await.unwrap();

        let snapshot = manager.list_entries().await;
        let order: Vec<&str> = snapshot.entries.iter().map(|e| e.address.as_str()).collect();
        assert_eq!(order, vec![hour.as_str(), week.as_str()]);
        assert_eq!(snapshot.now, T0);
    }
}
