//! One-time admission tokens with time-based retention.
//!
//! [`TokenStore`] issues single-use keys, consumes them on verification and
//! runs a periodic sweep that drops keys older than the TTL. Every operation
//! goes through one [`tokio::sync::Mutex`], so issuance, verification and the
//! sweep are mutually exclusive.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

/// A single-use admission token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Opaque key handed to the client (UUID v4 string).
    pub key: String,
    /// When the token was issued.
    pub issued_at: Instant,
}

impl Token {
    /// Returns `true` once `ttl` has fully elapsed since issuance.
    #[must_use]
    pub fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.issued_at) > ttl
    }
}

/// Concurrent store of pending one-time tokens.
///
/// Cheap to clone; clones share the same map.
#[derive(Debug, Clone)]
pub struct TokenStore {
    tokens: Arc<Mutex<HashMap<String, Token>>>,
    ttl: Duration,
}

impl TokenStore {
    /// Creates an empty store whose tokens live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            tokens: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Issues and stores a fresh token.
    pub async fn issue(&self) -> Token {
        let token = Token {
            key: uuid::Uuid::new_v4().to_string(),
            issued_at: Instant::now(),
        };
        self.tokens
            .lock()
            .await
            .insert(token.key.clone(), token.clone());
        tracing::debug!(ttl = ?self.ttl, "token issued");
        token
    }

    /// Verifies and consumes `key`.
    ///
    /// Unknown keys return `false` without side effects. A known key is
    /// removed whatever the outcome, and is accepted only if it has not
    /// outlived the TTL.
    pub async fn verify(&self, key: &str) -> bool {
        let Some(token) = self.tokens.lock().await.remove(key) else {
            return false;
        };
        if token.is_expired(self.ttl, Instant::now()) {
            tracing::debug!("rejected expired token");
            return false;
        }
        true
    }

    /// Removes every token older than the TTL.
    ///
    /// Returns the number of tokens removed.
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut tokens = self.tokens.lock().await;
        let before = tokens.len();
        tokens.retain(|_, token| !token.is_expired(self.ttl, now));
        before - tokens.len()
    }

    /// Number of pending tokens.
    pub async fn len(&self) -> usize {
        self.tokens.lock().await.len()
    }

    /// Returns `true` if no tokens are pending.
    pub async fn is_empty(&self) -> bool {
        self.tokens.lock().await.is_empty()
    }

    /// Runs the retention sweep every `interval` until `cancel` fires.
    ///
    /// The first sweep happens one full interval after start.
    pub async fn run_sweeper(self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep_expired().await;
                    if removed > 0 {
                        tracing::debug!(removed, "swept expired tokens");
                    }
                }
                () = cancel.cancelled() => {
                    tracing::debug!("token sweeper stopped");
                    return;
                }
            }
        }
    }

    /// Spawns [`TokenStore::run_sweeper`] on the current runtime.
    #[must_use]
    pub fn spawn_sweeper(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.clone().run_sweeper(interval, cancel))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(5);
    const SWEEP: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn token_verifies_exactly_once() {
        let store = TokenStore::new(TTL);
        let token = store.issue().await;

        assert!(store.verify(&token.key).await);
        assert!(!store.verify(&token.key).await);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn unknown_key_is_rejected_without_side_effects() {
        let store = TokenStore::new(TTL);
        let token = store.issue().await;

        assert!(!store.verify("not-a-token").await);
        assert_eq!(store.len().await, 1);
        assert!(store.verify(&token.key).await);
    }

    #[tokio::test]
    async fn issued_keys_are_unique() {
        let store = TokenStore::new(TTL);
        let a = store.issue().await;
        let b = store.issue().await;
        assert_ne!(a.key, b.key);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_token_is_rejected_before_sweep() {
        let store = TokenStore::new(TTL);
        let token = store.issue().await;

        time::advance(Duration::from_secs(6)).await;
        assert!(!store.verify(&token.key).await);
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_only_expired_tokens() {
        let store = TokenStore::new(TTL);
        let old = store.issue().await;
        time::advance(Duration::from_secs(4)).await;
        let fresh = store.issue().await;
        time::advance(Duration::from_secs(2)).await;

        assert_eq!(store.sweep_expired().await, 1);
        assert!(!store.verify(&old.key).await);
        assert!(store.verify(&fresh.key).await);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_tick_evicts_unused_token() {
        let store = TokenStore::new(TTL);
        let cancel = CancellationToken::new();
        let sweeper = store.spawn_sweeper(SWEEP, cancel.clone());
        let token = store.issue().await;

        time::sleep(Duration::from_secs(61)).await;
        assert!(store.is_empty().await);

        time::sleep(Duration::from_secs(1)).await;
        assert!(!store.verify(&token.key).await);

        cancel.cancel();
        assert!(sweeper.await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_does_not_tick_immediately() {
        let store = TokenStore::new(Duration::ZERO);
        let cancel = CancellationToken::new();
        let sweeper = store.spawn_sweeper(SWEEP, cancel.clone());
        let _token = store.issue().await;

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.len().await, 1);

        cancel.cancel();
        assert!(sweeper.await.is_ok());
    }

    #[tokio::test]
    async fn sweeper_stops_on_cancel() {
        let store = TokenStore::new(TTL);
        let cancel = CancellationToken::new();
        let sweeper = store.spawn_sweeper(SWEEP, cancel.clone());

        cancel.cancel();
        let joined = time::timeout(Duration::from_secs(1), sweeper).await;
        assert!(matches!(joined, Ok(Ok(()))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_verify_has_single_winner() {
        let store = TokenStore::new(TTL);
        let token = store.issue().await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let key = token.key.clone();
            handles.push(tokio::spawn(async move { store.verify(&key).await }));
        }

        let mut winners = 0;
        for handle in handles {
            let Ok(accepted) = handle.await else {
                panic!("verify task panicked");
            };
            if accepted {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
