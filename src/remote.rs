//! REST bridge to the realtime document store.
//!
//! Speaks the store's plain REST surface: `GET/PUT/PATCH/DELETE
//! {base}/{path}.json`, with an optional auth token query parameter. Live
//! subscriptions are realized as interval polling; a snapshot is only
//! re-delivered when the fetched value actually changed, so downstream
//! recomputes stay idle on quiet collections.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::store::{RealtimeStore, SnapshotHandler, StoreError, Subscription};

/// Bound on every REST request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Default gap between subscription polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Normalise the store base URL: ensure a scheme (https, or http for
/// localhost) and strip trailing slashes.
pub fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

fn friendly_error(url: &str, err: &reqwest::Error) -> StoreError {
    if err.is_connect() {
        return StoreError::Unreachable(url.to_string());
    }
    if err.is_timeout() {
        return StoreError::Timeout(url.to_string());
    }
    StoreError::Other(format!("network error communicating with {url}: {err}"))
}

fn status_error(status: StatusCode) -> StoreError {
    StoreError::Status(status.as_u16())
}

/// [`RealtimeStore`] implementation over the document store's REST surface.
pub struct RestStore {
    base: String,
    auth_token: Option<String>,
    client: Client,
    poll_interval: Duration,
}

impl RestStore {
    pub fn new(base_url: &str) -> Result<Self, StoreError> {
        Self::with_options(base_url, None, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_options(
        base_url: &str,
        auth_token: Option<String>,
        poll_interval: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Other(format!("failed to create HTTP client: {e}")))?;

        Ok(RestStore {
            base: normalize_base_url(base_url),
            auth_token,
            client,
            poll_interval,
        })
    }

    /// `{base}/{path}.json`, plus the auth token when configured.
    fn url_for(&self, path: &str) -> String {
        let trimmed = path.trim_matches('/');
        match &self.auth_token {
            Some(token) => format!("{}/{trimmed}.json?auth={token}", self.base),
            None => format!("{}/{trimmed}.json", self.base),
        }
    }

    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, StoreError> {
        let url = self.url_for(path);
        let mut req = self.client.request(method, &url);
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(|e| friendly_error(&self.base, &e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(status_error(status));
        }

        let value: Value = resp
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        if value.is_null() {
            Ok(None)
        } else {
            Ok(Some(value))
        }
    }
}

#[async_trait]
impl RealtimeStore for RestStore {
    /// Poll-based subscription. Must be called from within a tokio runtime;
    /// the polling task stops when the returned [`Subscription`] is dropped.
    fn subscribe(&self, path: &str, handler: SnapshotHandler) -> Subscription {
        let client = self.client.clone();
        let url = self.url_for(path);
        let base = self.base.clone();
        let interval = self.poll_interval;
        let path = path.to_string();

        let task = tokio::spawn(async move {
            let mut last_seen: Option<Option<Value>> = None;
            loop {
                let outcome = async {
                    let resp = client
                        .get(&url)
                        .send()
                        .await
                        .map_err(|e| friendly_error(&base, &e))?;
                    let status = resp.status();
                    if !status.is_success() {
                        return Err(status_error(status));
                    }
                    let value: Value = resp
                        .json()
                        .await
                        .map_err(|e| StoreError::Decode(e.to_string()))?;
                    Ok(if value.is_null() { None } else { Some(value) })
                }
                .await;

                match outcome {
                    Ok(snapshot) => {
                        if last_seen.as_ref() != Some(&snapshot) {
                            debug!(path = %path, "snapshot changed, delivering");
                            last_seen = Some(snapshot.clone());
                            handler(Ok(snapshot));
                        }
                    }
                    Err(err) => {
                        warn!(path = %path, error = %err, "poll failed");
                        handler(Err(err));
                    }
                }

                tokio::time::sleep(interval).await;
            }
        });

        Subscription::new(move || task.abort())
    }

    async fn fetch_once(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.request(reqwest::Method::GET, path, None).await
    }

    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.request(reqwest::Method::PUT, path, Some(&value)).await?;
        Ok(())
    }

    async fn patch(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.request(reqwest::Method::PATCH, path, Some(&value)).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.request(reqwest::Method::DELETE, path, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_urls_get_a_scheme_and_lose_trailing_slashes() {
        assert_eq!(
            normalize_base_url("bakery-demo.example.com/"),
            "https://bakery-demo.example.com"
        );
        assert_eq!(
            normalize_base_url("localhost:9000//"),
            "http://localhost:9000"
        );
        assert_eq!(
            normalize_base_url("https://store.example.com"),
            "https://store.example.com"
        );
    }

    #[test]
    fn urls_append_the_json_suffix_and_auth_token() {
        let store = RestStore::new("https://store.example.com").unwrap();
        assert_eq!(
            store.url_for("orders"),
            "https://store.example.com/orders.json"
        );
        assert_eq!(
            store.url_for("/metadata/orderCounts/"),
            "https://store.example.com/metadata/orderCounts.json"
        );

        let authed = RestStore::with_options(
            "https://store.example.com",
            Some("tok123".into()),
            Duration::from_secs(15),
        )
        .unwrap();
        assert_eq!(
            authed.url_for("orders"),
            "https://store.example.com/orders.json?auth=tok123"
        );
    }
}
