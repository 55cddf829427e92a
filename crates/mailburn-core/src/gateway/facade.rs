//! Tracking-enforcing gateway.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use super::api::MailboxApi;
use super::model::{MessageDetail, MessageHeader};
use crate::address::TemporaryAddress;
use crate::generator::AddressGenerator;
use crate::identity::{Clock, IdentityManager};
use crate::store::KeyValueStore;
use crate::{Error, Result};

/// Answers whether an address belongs to this client.
pub trait AddressRegistry: Send + Sync {
    /// Whether `address` is currently tracked.
    fn is_tracked(&self, address: &str) -> impl Future<Output = bool> + Send;
}

impl<S, G, C> AddressRegistry for IdentityManager<S, G, C>
where
    S: KeyValueStore,
    G: AddressGenerator,
    C: Clock,
{
    fn is_tracked(&self, address: &str) -> impl Future<Output = bool> + Send {
        Self::is_tracked(self, address)
    }
}

impl<T: AddressRegistry> AddressRegistry for Arc<T> {
    fn is_tracked(&self, address: &str) -> impl Future<Output = bool> + Send {
        (**self).is_tracked(address)
    }
}

/// Read-only access to the mailboxes of tracked addresses.
///
/// Each call validates the address, then consults the registry, then issues
/// exactly one request. The registry lock is released before the request
/// goes out, so a slow response never delays a sweep.
#[derive(Debug, Clone)]
pub struct MailboxGateway<R> {
    api: MailboxApi,
    registry: R,
}

impl<R: AddressRegistry> MailboxGateway<R> {
    /// Creates a gateway that only serves addresses known to `registry`.
    #[must_use]
    pub const fn new(api: MailboxApi, registry: R) -> Self {
        Self { api, registry }
    }

    /// Lists the messages of `address`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidAddress`], [`Error::NotTracked`] or
    /// [`Error::TransportFailure`].
    pub async fn list_messages(&self, address: &str) -> Result<Vec<MessageHeader>> {
        let address = self.authorize(address).await?;
        let messages = self.api.get_messages(&address).await?;
        debug!("{address} has {} messages", messages.len());
        Ok(messages)
    }

    /// Reads message `id` of `address`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidAddress`], [`Error::NotTracked`] or
    /// [`Error::TransportFailure`].
    pub async fn read_message(&self, address: &str, id: u64) -> Result<MessageDetail> {
        let address = self.authorize(address).await?;
        self.api.read_message(&address, id).await
    }

    /// Downloads attachment `filename` of message `id`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidAddress`], [`Error::NotTracked`] or
    /// [`Error::TransportFailure`].
    pub async fn fetch_attachment(&self, address: &str, id: u64, filename: &str) -> Result<Bytes> {
        let address = self.authorize(address).await?;
        let payload = self.api.download(&address, id, filename).await?;
        debug!("Downloaded {filename} ({} bytes) from message {id}", payload.len());
        Ok(payload)
    }

    async fn authorize(&self, address: &str) -> Result<TemporaryAddress> {
        let address = TemporaryAddress::parse(address)?;
        if !self.registry.is_tracked(address.as_str()).await {
            return Err(Error::NotTracked(address.to_string()));
        }
        Ok(address)
    }
}
