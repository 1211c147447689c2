//! Request-driven snapshot layer.
//!
//! Every resource is addressed by its key (the request URL). The store keeps
//! the last good payload and the last error per key, shares one in-flight
//! request between concurrent callers, retries failures with exponential
//! backoff and revalidates on demand or when the dashboard regains focus.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::SnapshotSource;
use crate::error::{FetchError, FetchResult};

/// Per-resource request behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOptions {
    pub should_retry_on_error: bool,
    /// Retries after the first failed attempt.
    pub error_retry_count: u32,
    /// Base delay; doubles on every further retry.
    pub error_retry_interval: Duration,
    pub revalidate_on_focus: bool,
    /// A successful response younger than this is served without a request.
    pub dedupe_interval: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            should_retry_on_error: true,
            error_retry_count: 3,
            error_retry_interval: Duration::from_millis(5000),
            revalidate_on_focus: true,
            dedupe_interval: Duration::from_millis(2000),
        }
    }
}

impl FetchOptions {
    /// Campaign list and overview insights.
    pub fn dashboard() -> Self {
        Self::default()
    }

    /// Per-campaign insights rendered in the campaign table.
    pub fn campaign_row() -> Self {
        Self {
            error_retry_count: 2,
            error_retry_interval: Duration::from_millis(3000),
            revalidate_on_focus: false,
            ..Self::default()
        }
    }

    pub fn with_retry(mut self, count: u32, interval: Duration) -> Self {
        self.should_retry_on_error = true;
        self.error_retry_count = count;
        self.error_retry_interval = interval;
        self
    }

    pub fn without_retry(mut self) -> Self {
        self.should_retry_on_error = false;
        self
    }

    pub fn with_revalidate_on_focus(mut self, enabled: bool) -> Self {
        self.revalidate_on_focus = enabled;
        self
    }

    pub fn with_dedupe_interval(mut self, interval: Duration) -> Self {
        self.dedupe_interval = interval;
        self
    }
}

/// What a consumer renders for one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchState<T> {
    pub data: Option<T>,
    pub error: Option<FetchError>,
    /// No data yet and a request is in flight.
    pub is_loading: bool,
    /// A request is in flight, with or without data.
    pub is_validating: bool,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            is_loading: false,
            is_validating: false,
        }
    }
}

impl<T> FetchState<T> {
    /// Transform the payload, keeping error and request flags.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FetchState<U> {
        FetchState {
            data: self.data.map(f),
            error: self.error,
            is_loading: self.is_loading,
            is_validating: self.is_validating,
        }
    }
}

/// Delay before retry number `attempt + 1`: the interval doubled per prior
/// retry (shift capped at 8), never shorter than the server's retry hint.
pub fn retry_delay(interval: Duration, attempt: u32, retry_after: Option<Duration>) -> Duration {
    let backoff = interval.saturating_mul(1u32 << attempt.min(8));
    match retry_after {
        Some(hint) => backoff.max(hint),
        None => backoff,
    }
}

struct Entry {
    data: Option<Value>,
    error: Option<FetchError>,
    fetched_at: Option<Instant>,
    in_flight: bool,
    /// Bumped whenever a request completes.
    generation: u64,
    options: FetchOptions,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl Entry {
    fn new(options: FetchOptions) -> Self {
        Self {
            data: None,
            error: None,
            fetched_at: None,
            in_flight: false,
            generation: 0,
            options,
            gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        self.error.is_none()
            && self
                .fetched_at
                .is_some_and(|at| now.duration_since(at) < self.options.dedupe_interval)
    }
}

struct InFlight<'a> {
    entries: &'a Mutex<HashMap<String, Entry>>,
    key: &'a str,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut map = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = map.get_mut(self.key) {
            entry.in_flight = false;
        }
    }
}

/// Cache of snapshot resources keyed by URL.
pub struct SnapshotStore {
    source: Arc<dyn SnapshotSource>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl SnapshotStore {
    pub fn new(source: Arc<dyn SnapshotSource>) -> Self {
        Self {
            source,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch `key` unless a fresh copy is cached, then return its state.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        key: &str,
        options: &FetchOptions,
    ) -> FetchState<T> {
        self.load(key, Some(options), false).await;
        self.state(key)
    }

    /// Request `key` again regardless of freshness, keeping the options it
    /// was registered with.
    pub async fn revalidate<T: DeserializeOwned>(&self, key: &str) -> FetchState<T> {
        self.load(key, None, true).await;
        self.state(key)
    }

    /// Current state of `key` without issuing a request.
    pub fn state<T: DeserializeOwned>(&self, key: &str) -> FetchState<T> {
        let map = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let Some(entry) = map.get(key) else {
            return FetchState::default();
        };

        let mut error = entry.error.clone();
        let data = match &entry.data {
            Some(value) => match serde_json::from_value::<T>(value.clone()) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    error.get_or_insert(FetchError::Decode(e.to_string()));
                    None
                }
            },
            None => None,
        };

        FetchState {
            is_loading: entry.in_flight && entry.data.is_none(),
            is_validating: entry.in_flight,
            data,
            error,
        }
    }

    /// The dashboard regained focus: revalidate every resource that opted in.
    /// Returns how many resources were revalidated.
    pub async fn focus(&self) -> usize {
        let keys: Vec<String> = {
            let map = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            map.iter()
                .filter(|(_, entry)| entry.options.revalidate_on_focus)
                .map(|(key, _)| key.clone())
                .collect()
        };
        debug!(count = keys.len(), "Revalidating on focus");
        join_all(keys.iter().map(|key| self.load(key, None, true))).await;
        keys.len()
    }

    /// Number of resources the store knows about.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn load(&self, key: &str, options: Option<&FetchOptions>, force: bool) {
        let (gate, generation) = {
            let mut map = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            let entry = map
                .entry(key.to_string())
                .or_insert_with(|| Entry::new(options.cloned().unwrap_or_default()));
            if let Some(options) = options {
                entry.options = options.clone();
            }
            (entry.gate.clone(), entry.generation)
        };

        let _guard = gate.lock().await;

        let options = {
            let mut map = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            let Some(entry) = map.get_mut(key) else {
                return;
            };
            if entry.generation != generation {
                debug!(key, "Shared result of in-flight request");
                return;
            }
            if !force && entry.is_fresh(Instant::now()) {
                debug!(key, "Served from cache");
                return;
            }
            entry.in_flight = true;
            entry.options.clone()
        };

        // Clears `in_flight` even when the caller drops this future mid-request.
        let in_flight = InFlight {
            entries: &self.entries,
            key,
        };
        let result = self.request_with_retry(key, &options).await;
        drop(in_flight);

        let mut map = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = map.get_mut(key) {
            entry.generation += 1;
            match result {
                Ok(value) => {
                    entry.data = Some(value);
                    entry.error = None;
                    entry.fetched_at = Some(Instant::now());
                }
                // Stale data stays visible next to the error.
                Err(e) => entry.error = Some(e),
            }
        }
    }

    async fn request_with_retry(
        &self,
        key: &str,
        options: &FetchOptions,
    ) -> FetchResult<Value> {
        let mut attempt = 0;
        loop {
            match self.source.get_json(key).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let exhausted = !options.should_retry_on_error
                        || !e.is_retryable()
                        || attempt >= options.error_retry_count;
                    if exhausted {
                        warn!(key, attempts = attempt + 1, error = %e, "Snapshot request failed");
                        return Err(e);
                    }
                    let delay = retry_delay(options.error_retry_interval, attempt, e.retry_after());
                    attempt += 1;
                    debug!(
                        key,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying snapshot request"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
