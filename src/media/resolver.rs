// src/media/resolver.rs

//! Fresh-URL resolution with memoization and request coalescing.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use reqwest::Client;
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;

use crate::error::Result;
use crate::media::MediaRef;
use crate::utils::http::create_async_client;

/// Source of current media URLs, usually the media API route.
#[async_trait]
pub trait MediaEndpoint: Send + Sync {
    /// Current URL, or `None` on any failure or non-success status.
    async fn fetch_url(&self, media: &MediaRef) -> Option<String>;
}

#[derive(Debug, Deserialize)]
struct MediaResponse {
    #[serde(default)]
    url: Option<String>,
}

/// [`MediaEndpoint`] calling `GET {base}/api/notion-media`.
pub struct HttpMediaEndpoint {
    client: Client,
    endpoint: String,
}

impl HttpMediaEndpoint {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: create_async_client("notion-blog-media/0.1", timeout)?,
            endpoint: format!("{}/api/notion-media", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl MediaEndpoint for HttpMediaEndpoint {
    async fn fetch_url(&self, media: &MediaRef) -> Option<String> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&media.query_pairs())
            .header(CACHE_CONTROL, "no-store")
            .send()
            .await
            .map_err(|e| log::debug!("Media request for {} failed: {}", media, e))
            .ok()?;

        if !response.status().is_success() {
            log::debug!("Media request for {} returned {}", media, response.status());
            return None;
        }
        let body: MediaResponse = response.json().await.ok()?;
        body.url.filter(|url| !url.is_empty())
    }
}

type InflightRequest = Shared<BoxFuture<'static, Option<String>>>;

#[derive(Default)]
struct ResolverState {
    memo: Mutex<HashMap<String, String>>,
    inflight: Mutex<HashMap<String, (u64, InflightRequest)>>,
    next_request: AtomicU64,
}

/// Process-local memo of resolved URLs plus in-flight request coalescing.
///
/// Entries are only removed through [`MediaUrlResolver::clear`] or a forced
/// resolution.
#[derive(Clone)]
pub struct MediaUrlResolver {
    endpoint: Arc<dyn MediaEndpoint>,
    state: Arc<ResolverState>,
}

impl MediaUrlResolver {
    pub fn new(endpoint: Arc<dyn MediaEndpoint>) -> Self {
        Self {
            endpoint,
            state: Arc::new(ResolverState::default()),
        }
    }

    /// Current URL for `media`.
    ///
    /// Returns the memoized URL if any, otherwise joins an in-flight request
    /// for the same reference or starts one. `force` skips both. The lookup
    /// and the registration of a new request happen under one lock.
    pub async fn resolve(&self, media: &MediaRef, force: bool) -> Option<String> {
        let key = media.cache_key();

        let request = {
            let mut inflight = self.state.inflight.lock();
            if force {
                self.state.memo.lock().remove(&key);
                inflight.remove(&key);
            } else if let Some(url) = self.state.memo.lock().get(&key).cloned() {
                return Some(url);
            }

            match inflight.get(&key) {
                Some((_, request)) => request.clone(),
                None => self.start_request(&mut inflight, media.clone(), key),
            }
        };

        request.await
    }

    /// Forget the memoized URL and any in-flight request for `media`.
    pub fn clear(&self, media: &MediaRef) {
        let key = media.cache_key();
        self.state.memo.lock().remove(&key);
        self.state.inflight.lock().remove(&key);
    }

    pub fn memoized(&self, media: &MediaRef) -> Option<String> {
        self.state.memo.lock().get(&media.cache_key()).cloned()
    }

    fn start_request(
        &self,
        inflight: &mut HashMap<String, (u64, InflightRequest)>,
        media: MediaRef,
        key: String,
    ) -> InflightRequest {
        let id = self.state.next_request.fetch_add(1, Ordering::SeqCst);
        let endpoint = self.endpoint.clone();
        let state = self.state.clone();
        let request_key = key.clone();

        let request = async move {
            let url = endpoint.fetch_url(&media).await;
            if let Some(url) = &url {
                state.memo.lock().insert(request_key.clone(), url.clone());
            }
            let mut inflight = state.inflight.lock();
            if inflight.get(&request_key).is_some_and(|(current, _)| *current == id) {
                inflight.remove(&request_key);
            }
            url
        }
        .boxed()
        .shared();

        inflight.insert(key, (id, request.clone()));
        request
    }
}
