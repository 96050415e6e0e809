//! Where a poller gets its payloads from.
//!
//! The loop only knows the [`Fetch`] trait; [`HttpFetcher`] is the real
//! implementation, tests plug in scripted sources.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tracing::debug;

use crate::error::PollError;

/// One fetch per polling cycle. Cancellation is handled by the caller
/// dropping the returned future, so implementations need not watch a token.
#[async_trait]
pub trait Fetch: Send + Sync {
    type Output: Send;

    async fn fetch(&self) -> Result<Self::Output, PollError>;

    /// Human-readable source for logs.
    fn target(&self) -> &str;
}

/// `GET <url>` and decode the JSON body into `T`.
pub struct HttpFetcher<T> {
    client: reqwest::Client,
    url: String,
    _payload: PhantomData<fn() -> T>,
}

impl<T> HttpFetcher<T> {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            _payload: PhantomData,
        }
    }
}

#[async_trait]
impl<T> Fetch for HttpFetcher<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Output = T;

    async fn fetch(&self) -> Result<T, PollError> {
        let resp = self.client.get(&self.url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PollError::Status(status));
        }

        let body = resp.bytes().await?;
        debug!(url = %self.url, bytes = body.len(), "Fetched poll response");
        Ok(serde_json::from_slice(&body)?)
    }

    fn target(&self) -> &str {
        &self.url
    }
}
