//! Failed-attempt throttling for the login and signup endpoints.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::http::{HeaderMap, StatusCode};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ThrottleConfig;

/// Entries are pruned once the map grows past this many keys.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Error)]
#[error("attempt store unavailable: {0}")]
pub struct AttemptStoreError(String);

/// Counter backend. Errors are treated as "no information" by the limiter.
pub trait AttemptStore: Send + Sync {
    fn get(&self, key: &str) -> Result<u32, AttemptStoreError>;

    /// Increment and push the expiry out to `now + window`.
    fn increment(&self, key: &str, window: Duration) -> Result<u32, AttemptStoreError>;

    fn clear(&self, key: &str) -> Result<(), AttemptStoreError>;
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u32,
    expires_at: Instant,
}

/// Process-local counter map.
#[derive(Default)]
pub struct MemoryAttemptStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryAttemptStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Entry>>, AttemptStoreError> {
        self.entries
            .lock()
            .map_err(|e| AttemptStoreError(e.to_string()))
    }
}

impl AttemptStore for MemoryAttemptStore {
    fn get(&self, key: &str) -> Result<u32, AttemptStoreError> {
        let entries = self.lock()?;
        let now = Instant::now();
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map_or(0, |entry| entry.count))
    }

    fn increment(&self, key: &str, window: Duration) -> Result<u32, AttemptStoreError> {
        let mut entries = self.lock()?;
        let now = Instant::now();

        if entries.len() > PRUNE_THRESHOLD {
            entries.retain(|_, entry| entry.expires_at > now);
        }

        let entry = entries.entry(key.to_string()).or_insert(Entry {
            count: 0,
            expires_at: now,
        });
        if entry.expires_at <= now {
            entry.count = 0;
        }
        entry.count = entry.count.saturating_add(1);
        entry.expires_at = now + window;

        Ok(entry.count)
    }

    fn clear(&self, key: &str) -> Result<(), AttemptStoreError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// Throttle applied to one endpoint.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    /// Metric label and log field.
    pub scope: &'static str,
    pub max_attempts: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    #[must_use]
    pub const fn from_config(scope: &'static str, config: ThrottleConfig) -> Self {
        Self {
            scope,
            max_attempts: config.max_attempts,
            window: Duration::from_secs(config.window_seconds),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

/// What the wrapped handler's status means for the counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    Failed,
    Succeeded,
    Ignored,
}

impl AttemptOutcome {
    #[must_use]
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_client_error() {
            Self::Failed
        } else if status.is_success() {
            Self::Succeeded
        } else {
            Self::Ignored
        }
    }
}

pub struct RateLimiter {
    store: Arc<dyn AttemptStore>,
    trusted_proxies: Vec<IpAddr>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(store: Arc<dyn AttemptStore>, trusted_proxies: Vec<IpAddr>) -> Self {
        Self {
            store,
            trusted_proxies,
        }
    }

    #[must_use]
    pub fn in_memory(trusted_proxies: Vec<IpAddr>) -> Self {
        Self::new(Arc::new(MemoryAttemptStore::new()), trusted_proxies)
    }

    #[must_use]
    pub fn counter_key(client_ip: &str) -> String {
        format!("login_attempts_{client_ip}")
    }

    /// Fails open when the store errors.
    pub fn check(&self, client_ip: &str, policy: &RateLimitPolicy) -> RateLimitDecision {
        let key = Self::counter_key(client_ip);
        match self.store.get(&key) {
            Ok(count) if count >= policy.max_attempts => {
                warn!(client_ip, scope = policy.scope, count, "Rate limit exceeded");
                RateLimitDecision::Limited
            }
            Ok(_) => RateLimitDecision::Allowed,
            Err(e) => {
                warn!(client_ip, error = %e, "Rate limit store unavailable, allowing request");
                RateLimitDecision::Allowed
            }
        }
    }

    pub fn record(&self, client_ip: &str, policy: &RateLimitPolicy, outcome: AttemptOutcome) {
        let key = Self::counter_key(client_ip);
        let result = match outcome {
            AttemptOutcome::Failed => self.store.increment(&key, policy.window).map(|attempt| {
                info!(client_ip, scope = policy.scope, attempt, "Failed attempt recorded");
            }),
            AttemptOutcome::Succeeded => self.store.clear(&key),
            AttemptOutcome::Ignored => Ok(()),
        };

        if let Err(e) = result {
            warn!(client_ip, error = %e, "Failed to update rate limit counter");
        }
    }

    /// Client address used as the counter key.
    ///
    /// `X-Forwarded-For` is only believed when the direct peer is a trusted
    /// proxy; otherwise the peer address itself is used.
    #[must_use]
    pub fn client_ip(&self, headers: &HeaderMap, peer: Option<IpAddr>) -> String {
        if let Some(peer) = peer {
            if self.trusted_proxies.contains(&peer) {
                if let Some(forwarded) = first_forwarded_for(headers) {
                    return forwarded;
                }
            }
            return peer.to_string();
        }
        "unknown".to_string()
    }
}

fn first_forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    struct BrokenStore;

    impl AttemptStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<u32, AttemptStoreError> {
            Err(AttemptStoreError("down".to_string()))
        }

        fn increment(&self, _key: &str, _window: Duration) -> Result<u32, AttemptStoreError> {
            Err(AttemptStoreError("down".to_string()))
        }

        fn clear(&self, _key: &str) -> Result<(), AttemptStoreError> {
            Err(AttemptStoreError("down".to_string()))
        }
    }

    fn policy(max_attempts: u32, window: Duration) -> RateLimitPolicy {
        RateLimitPolicy {
            scope: "login",
            max_attempts,
            window,
        }
    }

    #[test]
    fn blocks_after_max_failures_and_clears_on_success() {
        let limiter = RateLimiter::in_memory(Vec::new());
        let policy = policy(3, Duration::from_secs(60));

        for _ in 0..3 {
            assert_eq!(limiter.check("10.0.0.1", &policy), RateLimitDecision::Allowed);
            limiter.record("10.0.0.1", &policy, AttemptOutcome::Failed);
        }
        assert_eq!(limiter.check("10.0.0.1", &policy), RateLimitDecision::Limited);
        assert_eq!(limiter.check("10.0.0.2", &policy), RateLimitDecision::Allowed);

        limiter.record("10.0.0.1", &policy, AttemptOutcome::Succeeded);
        assert_eq!(limiter.check("10.0.0.1", &policy), RateLimitDecision::Allowed);
    }

    #[test]
    fn entries_expire_after_window() {
        let store = MemoryAttemptStore::new();
        store.increment("k", Duration::from_millis(20)).unwrap();
        assert_eq!(store.get("k").unwrap(), 1);

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(store.get("k").unwrap(), 0);
        assert_eq!(store.increment("k", Duration::from_secs(60)).unwrap(), 1);
    }

    #[test]
    fn every_failure_pushes_expiry_out() {
        let store = MemoryAttemptStore::new();
        store.increment("k", Duration::from_millis(80)).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        store.increment("k", Duration::from_millis(80)).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(store.get("k").unwrap(), 2);
    }

    #[test]
    fn broken_store_fails_open() {
        let limiter = RateLimiter::new(Arc::new(BrokenStore), Vec::new());
        let policy = policy(1, Duration::from_secs(60));
        limiter.record("1.2.3.4", &policy, AttemptOutcome::Failed);
        assert_eq!(limiter.check("1.2.3.4", &policy), RateLimitDecision::Allowed);
    }

    #[test]
    fn outcome_follows_status_class() {
        assert_eq!(
            AttemptOutcome::from_status(StatusCode::BAD_REQUEST),
            AttemptOutcome::Failed
        );
        assert_eq!(AttemptOutcome::from_status(StatusCode::OK), AttemptOutcome::Succeeded);
        assert_eq!(
            AttemptOutcome::from_status(StatusCode::CREATED),
            AttemptOutcome::Succeeded
        );
        assert_eq!(
            AttemptOutcome::from_status(StatusCode::INTERNAL_SERVER_ERROR),
            AttemptOutcome::Ignored
        );
    }

    #[test]
    fn forwarded_for_requires_trusted_peer() {
        let proxy: IpAddr = "10.0.0.254".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.254"),
        );

        let untrusting = RateLimiter::in_memory(Vec::new());
        assert_eq!(untrusting.client_ip(&headers, Some(proxy)), "10.0.0.254");

        let trusting = RateLimiter::in_memory(vec![proxy]);
        assert_eq!(trusting.client_ip(&headers, Some(proxy)), "203.0.113.9");

        let other: IpAddr = "192.168.1.5".parse().unwrap();
        assert_eq!(trusting.client_ip(&headers, Some(other)), "192.168.1.5");
        assert_eq!(trusting.client_ip(&headers, None), "unknown");
    }

    #[test]
    fn counter_key_matches_cache_layout() {
        assert_eq!(RateLimiter::counter_key("1.2.3.4"), "login_attempts_1.2.3.4");
    }
}
