// src/media/image.rs

//! Self-healing image loading.
//!
//! A [`RetryableImage`] retries a failing URL with linearly growing delays,
//! then asks the [`MediaUrlResolver`] for a fresh URL. When no fresh URL is
//! available it settles in [`ImageState::PermanentError`] and schedules
//! background attempts with exponentially growing, capped delays.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::media::{MediaRef, MediaUrlResolver};

/// Observable loading state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageState {
    Loading,
    Retrying { attempt: u32 },
    RefreshRequested,
    Loaded,
    PermanentError,
}

/// Loads an image URL, reporting whether it rendered.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, url: &str) -> bool;
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Same-URL retries before a refresh
    pub max_retries: u32,
    /// Retry `n` waits `retry_delay * n`
    pub retry_delay: Duration,
    pub max_background_delay: Duration,
    /// Background rounds after which [`RetryableImage::run`] gives up,
    /// unbounded when `None`
    pub max_background_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(450),
            max_background_delay: Duration::from_millis(12_000),
            max_background_retries: None,
        }
    }
}

impl RetryPolicy {
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt)
    }

    /// Delay before background round `round` (1-based).
    pub fn background_delay(&self, round: u32) -> Duration {
        let base = self.retry_delay.saturating_mul(self.max_retries + 1);
        let factor = 2u32.saturating_pow(round.saturating_sub(1));
        base.saturating_mul(factor).min(self.max_background_delay)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    Loaded(String),
    Failed(String),
}

pub struct RetryableImage {
    src: String,
    media: Option<MediaRef>,
    resolver: MediaUrlResolver,
    loader: Arc<dyn ImageLoader>,
    policy: RetryPolicy,
    state: watch::Sender<ImageState>,
}

impl RetryableImage {
    /// `media` identifies the image for refreshes; without it only same-URL
    /// retries happen.
    pub fn new(
        src: impl Into<String>,
        media: Option<MediaRef>,
        resolver: MediaUrlResolver,
        loader: Arc<dyn ImageLoader>,
    ) -> Self {
        let (state, _) = watch::channel(ImageState::Loading);
        Self {
            src: src.into(),
            media,
            resolver,
            loader,
            policy: RetryPolicy::default(),
            state,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn state(&self) -> ImageState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ImageState> {
        self.state.subscribe()
    }

    /// Drive loading until the image renders.
    ///
    /// With the default policy this only returns once a load succeeds; drop
    /// the future to stop retrying.
    pub async fn run(&mut self) -> ImageOutcome {
        let mut retries = 0;
        let mut background = 0;

        loop {
            self.set_state(ImageState::Loading);
            if self.loader.load(&self.src).await {
                self.set_state(ImageState::Loaded);
                return ImageOutcome::Loaded(self.src.clone());
            }

            if retries < self.policy.max_retries {
                retries += 1;
                self.set_state(ImageState::Retrying { attempt: retries });
                tokio::time::sleep(self.policy.retry_delay(retries)).await;
                continue;
            }

            if let Some(url) = self.refresh().await {
                log::debug!("Swapping image source {} -> {}", self.src, url);
                self.src = url;
                retries = 0;
                background = 0;
                continue;
            }

            self.set_state(ImageState::PermanentError);
            if self
                .policy
                .max_background_retries
                .is_some_and(|max| background >= max)
            {
                log::warn!("Giving up on image {}", self.src);
                return ImageOutcome::Failed(self.src.clone());
            }
            background += 1;
            tokio::time::sleep(self.policy.background_delay(background)).await;
        }
    }

    /// A URL different from the current one, if the resolver has it.
    async fn refresh(&self) -> Option<String> {
        let media = self.media.as_ref()?;
        self.set_state(ImageState::RefreshRequested);

        let mut url = self.resolver.resolve(media, false).await;
        if url.as_deref() == Some(self.src.as_str()) {
            url = self.resolver.resolve(media, true).await;
        }
        url.filter(|url| *url != self.src)
    }

    fn set_state(&self, state: ImageState) {
        self.state.send_replace(state);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};

    use parking_lot::Mutex;
    use tokio::time::Instant;

    use super::*;
    use crate::media::resolver::testing::ScriptedEndpoint;

    /// Fails the first `fail_first` loads, then succeeds only for `good` URLs.
    struct FakeLoader {
        good: HashSet<String>,
        fail_first: AtomicU32,
        attempts: Mutex<Vec<String>>,
    }

    impl FakeLoader {
        fn new(good: &[&str], fail_first: u32) -> Arc<Self> {
            Arc::new(Self {
                good: good.iter().map(|s| s.to_string()).collect(),
                fail_first: AtomicU32::new(fail_first),
                attempts: Mutex::new(Vec::new()),
            })
        }

        fn attempts(&self) -> Vec<String> {
            self.attempts.lock().clone()
        }
    }

    #[async_trait]
    impl ImageLoader for FakeLoader {
        async fn load(&self, url: &str) -> bool {
            self.attempts.lock().push(url.to_string());
            let pending = self.fail_first.load(Ordering::SeqCst);
            if pending > 0 {
                self.fail_first.store(pending - 1, Ordering::SeqCst);
                return false;
            }
            self.good.contains(url)
        }
    }

    fn resolver(answers: Vec<Option<&str>>) -> (Arc<ScriptedEndpoint>, MediaUrlResolver) {
        let endpoint = Arc::new(ScriptedEndpoint::new(answers));
        (endpoint.clone(), MediaUrlResolver::new(endpoint))
    }

    #[test]
    fn test_background_delay_is_capped() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=5).map(|n| policy.background_delay(n).as_millis() as u64).collect();
        assert_eq!(delays, vec![1800, 3600, 7200, 12000, 12000]);
        assert_eq!(policy.retry_delay(2), Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loads_without_refresh() {
        let (endpoint, resolver) = resolver(vec![]);
        let loader = FakeLoader::new(&["https://img/a.png"], 0);
        let mut image = RetryableImage::new("https://img/a.png", Some(MediaRef::cover("p1")), resolver, loader);

        assert_eq!(image.run().await, ImageOutcome::Loaded("https://img/a.png".into()));
        assert_eq!(image.state(), ImageState::Loaded);
        assert_eq!(endpoint.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_delays_grow_linearly() {
        let (_, resolver) = resolver(vec![]);
        let loader = FakeLoader::new(&["https://img/a.png"], 2);
        let mut image = RetryableImage::new("https://img/a.png", None, resolver, loader.clone());

        let start = Instant::now();
        assert_eq!(image.run().await, ImageOutcome::Loaded("https://img/a.png".into()));
        assert_eq!(start.elapsed(), Duration::from_millis(450 + 900));
        assert_eq!(loader.attempts().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_swaps_source() {
        let (endpoint, resolver) = resolver(vec![Some("https://img/fresh.png")]);
        let loader = FakeLoader::new(&["https://img/fresh.png"], 0);
        let mut image = RetryableImage::new(
            "https://img/expired.png",
            Some(MediaRef::block_image("p1", "b1")),
            resolver,
            loader.clone(),
        );

        assert_eq!(image.run().await, ImageOutcome::Loaded("https://img/fresh.png".into()));
        assert_eq!(image.src(), "https://img/fresh.png");
        assert_eq!(endpoint.calls(), 1);

        let attempts = loader.attempts();
        assert_eq!(attempts.len(), 5);
        assert!(attempts[..4].iter().all(|url| url == "https://img/expired.png"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_refresh_forces_second_request() {
        let (endpoint, resolver) = resolver(vec![Some("https://img/old.png"), Some("https://img/new.png")]);
        let loader = FakeLoader::new(&["https://img/new.png"], 0);
        let mut image = RetryableImage::new("https://img/old.png", Some(MediaRef::icon("p1")), resolver, loader);

        assert_eq!(image.run().await, ImageOutcome::Loaded("https://img/new.png".into()));
        assert_eq!(endpoint.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_with_background_retries() {
        let (_, resolver) = resolver(vec![]);
        let loader = FakeLoader::new(&[], 0);
        let policy = RetryPolicy {
            max_background_retries: Some(2),
            ..RetryPolicy::default()
        };
        let mut image = RetryableImage::new("https://img/gone.png", None, resolver, loader.clone()).with_policy(policy);
        let states = image.subscribe();

        let start = Instant::now();
        assert_eq!(image.run().await, ImageOutcome::Failed("https://img/gone.png".into()));
        assert_eq!(start.elapsed(), Duration::from_millis(450 + 900 + 1350 + 1800 + 3600));
        assert_eq!(loader.attempts().len(), 6);
        assert_eq!(*states.borrow(), ImageState::PermanentError);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_retries_continue_until_recovery() {
        let (_, resolver) = resolver(vec![]);
        let loader = FakeLoader::new(&["https://img/x.png"], 12);
        let mut image = RetryableImage::new("https://img/x.png", None, resolver, loader.clone());

        let start = Instant::now();
        assert_eq!(image.run().await, ImageOutcome::Loaded("https://img/x.png".into()));
        // nine background rounds: 1.8s, 3.6s, 7.2s, then capped at 12s
        assert_eq!(
            start.elapsed(),
            Duration::from_millis(450 + 900 + 1350 + 1800 + 3600 + 7200 + 6 * 12_000)
        );
        assert_eq!(loader.attempts().len(), 13);
        assert_eq!(image.state(), ImageState::Loaded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_round_refreshes_after_single_attempt() {
        let (endpoint, resolver) = resolver(vec![None, Some("https://img/back.png")]);
        let loader = FakeLoader::new(&["https://img/back.png"], 0);
        let mut image = RetryableImage::new("https://img/down.png", Some(MediaRef::cover("p1")), resolver, loader.clone());

        assert_eq!(image.run().await, ImageOutcome::Loaded("https://img/back.png".into()));
        assert_eq!(endpoint.calls(), 2);
        // four attempts, one background attempt, then the fresh URL
        assert_eq!(loader.attempts().len(), 6);
    }
}
