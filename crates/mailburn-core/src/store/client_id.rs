//! Per-client identity used to namespace stored state.

use std::fmt;

use rand::Rng;
use tracing::{info, warn};

use super::KeyValueStore;
use crate::Result;
use crate::expiry::EpochMillis;

/// Key holding the client identity itself.
pub const CLIENT_ID_KEY: &str = "deviceId";

/// Prefix of the key holding a client's registry.
const REGISTRY_KEY_PREFIX: &str = "emailHistory_";

const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const SUFFIX_LEN: usize = 9;

/// Opaque, stable identifier for this client.
///
/// Generated on first access and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Loads the stored identity, creating and persisting one stamped with
    /// `now_ms` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the new identity
    /// cannot be written.
    pub async fn load_or_create<S: KeyValueStore>(
        store: &S,
        now_ms: EpochMillis,
    ) -> Result<Self> {
        if let Some(bytes) = store.load(CLIENT_ID_KEY).await? {
            match String::from_utf8(bytes) {
                Ok(id) if !id.trim().is_empty() => return Ok(Self(id)),
                _ => warn!("Stored client identity is unreadable, generating a new one"),
            }
        }

        let id = Self::generate(now_ms);
        store.save(CLIENT_ID_KEY, id.0.as_bytes()).await?;
        info!("Created client identity {id}");
        Ok(id)
    }

    /// Builds a fresh identity of the form `device_<epoch_ms>_<suffix>`.
    fn generate(now_ms: EpochMillis) -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| char::from(SUFFIX_CHARSET[rng.gen_range(0..SUFFIX_CHARSET.len())]))
            .collect();
        Self(format!("device_{now_ms}_{suffix}"))
    }

    /// Key under which this client's registry is stored.
    #[must_use]
    pub fn registry_key(&self) -> String {
        format!("{REGISTRY_KEY_PREFIX}{}", self.0)
    }

    /// Identity text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
