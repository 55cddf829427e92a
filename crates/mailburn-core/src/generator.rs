//! Address generation strategies.
//!
//! Two deployments exist: one asks the mailbox service for a random mailbox,
//! the other invents a username locally and pairs it with a domain from a
//! fixed pool. Both sit behind [`AddressGenerator`].

use std::future::Future;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::address::TemporaryAddress;
use crate::gateway::MailboxApi;
use crate::{Error, Result};

/// Domains served by the default mailbox service.
pub const DEFAULT_DOMAINS: [&str; 3] = ["1secmail.com", "1secmail.org", "1secmail.net"];

const USERNAME_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const USERNAME_LEN: usize = 12;

/// Source of fresh addresses.
pub trait AddressGenerator: Send + Sync {
    /// Produces one new address.
    ///
    /// Fails with [`Error::GenerationFailure`] when the source is unreachable
    /// or has no candidate to offer.
    fn generate(&self) -> impl Future<Output = Result<TemporaryAddress>> + Send;
}

/// Generates `<12 random [a-z0-9]>@<pool domain>` without any network call.
#[derive(Debug, Clone)]
pub struct LocalGenerator {
    domains: Vec<String>,
}

impl LocalGenerator {
    /// Creates a generator over the given domain pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the pool is empty.
    pub fn new<I, D>(domains: I) -> Result<Self>
    where
        I: IntoIterator<Item = D>,
        D: Into<String>,
    {
        let domains: Vec<String> = domains.into_iter().map(Into::into).collect();
        if domains.is_empty() {
            return Err(Error::Config("local generator needs at least one domain".to_string()));
        }
        Ok(Self { domains })
    }

    fn candidate(&self) -> Option<String> {
        let mut rng = rand::thread_rng();
        let domain = self.domains.choose(&mut rng)?;
        let username: String = (0..USERNAME_LEN)
            .map(|_| char::from(USERNAME_CHARSET[rng.gen_range(0..USERNAME_CHARSET.len())]))
            .collect();
        Some(format!("{username}@{domain}"))
    }
}

impl Default for LocalGenerator {
    fn default() -> Self {
        Self {
            domains: DEFAULT_DOMAINS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl AddressGenerator for LocalGenerator {
    async fn generate(&self) -> Result<TemporaryAddress> {
        let candidate = self
            .candidate()
            .ok_or_else(|| Error::GenerationFailure("empty domain pool".to_string()))?;
        TemporaryAddress::parse(&candidate)
            .map_err(|_| Error::GenerationFailure(format!("generated malformed address {candidate:?}")))
    }
}

/// Asks the mailbox service for a random mailbox.
#[derive(Debug, Clone)]
pub struct RemoteGenerator {
    api: MailboxApi,
}

impl RemoteGenerator {
    /// Creates a generator backed by `api`.
    #[must_use]
    pub const fn new(api: MailboxApi) -> Self {
        Self { api }
    }
}

impl AddressGenerator for RemoteGenerator {
    async fn generate(&self) -> Result<TemporaryAddress> {
        let mailboxes = self
            .api
            .gen_random_mailbox(1)
            .await
            .map_err(|e| Error::GenerationFailure(e.to_string()))?;

        let first = mailboxes
            .into_iter()
            .next()
            .ok_or_else(|| Error::GenerationFailure("service returned no mailbox".to_string()))?;
        debug!("Service offered {first}");

        TemporaryAddress::parse(&first)
            .map_err(|_| Error::GenerationFailure(format!("service returned malformed address {first:?}")))
    }
}

/// Generator chosen at runtime from settings.
#[derive(Debug, Clone)]
pub enum ConfiguredGenerator {
    /// Remote `genRandomMailbox` call.
    Remote(RemoteGenerator),
    /// Local username plus domain pool.
    Local(LocalGenerator),
}

impl AddressGenerator for ConfiguredGenerator {
    async fn generate(&self) -> Result<TemporaryAddress> {
        match self {
            Self::Remote(remote) => remote.generate().await,
            Self::Local(local) => local.generate().await,
        }
    }
}
