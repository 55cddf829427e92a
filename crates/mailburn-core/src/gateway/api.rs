//! HTTP client for the mailbox service.
//!
//! Every call is a `GET` against the base URL with an `action` query
//! parameter. There are no retries: one failed attempt is reported as is.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::model::{MessageDetail, MessageHeader};
use crate::address::TemporaryAddress;
use crate::{Error, Result};

/// Default public endpoint.
pub const DEFAULT_BASE_URL: &str = "https://www.1secmail.com/api/v1/";

/// Wire actions understood by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Produce random mailbox names.
    GenRandomMailbox,
    /// List a mailbox.
    GetMessages,
    /// Fetch one message.
    ReadMessage,
    /// Fetch an attachment's bytes.
    Download,
}

impl Action {
    /// Value of the `action` query parameter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GenRandomMailbox => "genRandomMailbox",
            Self::GetMessages => "getMessages",
            Self::ReadMessage => "readMessage",
            Self::Download => "download",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client for the mailbox service.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct MailboxApi {
    base_url: Url,
    http_client: Client,
}

impl MailboxApi {
    /// Creates a client for `base_url` with no request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL does not parse.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, None)
    }

    /// Creates a client for `base_url`, optionally bounding every request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL does not parse or the HTTP client
    /// cannot be built.
    pub fn with_timeout(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid mailbox API URL {base_url:?}: {e}")))?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            http_client,
        })
    }

    /// Endpoint all requests are sent to.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds the request URL for `action` with extra query parameters, in
    /// the order given.
    #[must_use]
    pub fn request_url(&self, action: Action, params: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("action", action.as_str());
            for (name, value) in params {
                query.append_pair(name, value);
            }
        }
        url
    }

    /// Asks the service for `count` random mailbox addresses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportFailure`] on network errors, non-success
    /// responses or an unreadable body.
    pub async fn gen_random_mailbox(&self, count: u32) -> Result<Vec<String>> {
        let action = Action::GenRandomMailbox;
        let count = count.to_string();
        let url = self.request_url(action, &[("count", count.as_str())]);
        self.get_json(action, url).await
    }

    /// Lists the messages in `address`'s mailbox.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportFailure`] on network errors, non-success
    /// responses or an unreadable body.
    pub async fn get_messages(&self, address: &TemporaryAddress) -> Result<Vec<MessageHeader>> {
        let action = Action::GetMessages;
        let url = self.request_url(
            action,
            &[("login", address.login()), ("domain", address.domain())],
        );
        self.get_json(action, url).await
    }

    /// Fetches message `id` from `address`'s mailbox.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportFailure`] on network errors, non-success
    /// responses or an unreadable body.
    pub async fn read_message(&self, address: &TemporaryAddress, id: u64) -> Result<MessageDetail> {
        let action = Action::ReadMessage;
        let id = id.to_string();
        let url = self.request_url(
            action,
            &[
                ("login", address.login()),
                ("domain", address.domain()),
                ("id", id.as_str()),
            ],
        );
        self.get_json(action, url).await
    }

    /// Downloads attachment `filename` of message `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportFailure`] on network errors or non-success
    /// responses.
    pub async fn download(
        &self,
        address: &TemporaryAddress,
        id: u64,
        filename: &str,
    ) -> Result<Bytes> {
        let action = Action::Download;
        let id = id.to_string();
        let url = self.request_url(
            action,
            &[
                ("login", address.login()),
                ("domain", address.domain()),
                ("id", id.as_str()),
                ("file", filename),
            ],
        );
        let response = self.get(action, url).await?;
        response
            .bytes()
            .await
            .map_err(|e| Error::transport(action, format!("failed to read body: {e}")))
    }

    async fn get(&self, action: Action, url: Url) -> Result<Response> {
        debug!("GET {url}");
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::transport(action, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::transport(action, format!("HTTP {status}")));
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, action: Action, url: Url) -> Result<T> {
        let response = self.get(action, url).await?;
        response
            .json()
            .await
            .map_err(|e| Error::transport(action, format!("invalid response body: {e}")))
    }
}
