//! Shared outbound HTTP client with periodic connection recycling.
use std::{sync::RwLock, time::Duration};

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{instrument, trace};

use crate::error::{Error, Result};

/// How often the underlying [`Client`] is replaced, so DNS gets re-resolved
/// and idle connections to providers that moved behind a new IP get dropped.
pub const RECYCLE_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// A [`Client`] shared across all outbound calls, periodically swapped out
/// for a fresh one by a background task.
#[derive(Debug)]
pub struct ClientPool {
    current: RwLock<Client>,
}

impl ClientPool {
    /// Build a pool around a freshly constructed client.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Client::new()),
        }
    }

    /// The client snapshot in effect right now.
    #[must_use]
    pub fn client(&self) -> Client {
        self.current.read().unwrap().clone()
    }

    /// Replace the pooled client with a new one.
    pub fn recycle(&self) {
        trace!("recycling http client");
        *self.current.write().unwrap() = Client::new();
    }

    /// Spawn the background task that calls [`Self::recycle`] every
    /// [`RECYCLE_INTERVAL`]. The returned handle may be dropped; the task
    /// keeps running until the process exits.
    pub fn spawn_recycler(self: &std::sync::Arc<Self>) -> tokio::task::JoinHandle<()> {
        let pool = std::sync::Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(RECYCLE_INTERVAL);
            interval.tick().await; // first tick fires immediately; skip it
            loop {
                interval.tick().await;
                pool.recycle();
            }
        })
    }
}

impl Default for ClientPool {
    fn default() -> Self {
        Self::new()
    }
}

/// POST `form` to `url` as `application/x-www-form-urlencoded` and parse the
/// JSON body as `T`. A non-2xx status is reported as [`Error::UpstreamStatus`]
/// without forwarding the provider's response body to the caller.
#[instrument(skip(client, form))]
pub async fn post_form<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    form: &(impl Serialize + ?Sized),
) -> Result<T> {
    let res = client.post(url).form(form).send().await?;
    let status = res.status();

    if !status.is_success() {
        return Err(Error::UpstreamStatus(status));
    }

    res.json().await.map_err(Error::from)
}
