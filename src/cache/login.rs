//! De-duplication of OAuth login exchanges.
//!
//! The callback page may fire the exchange more than once for the same
//! verifier (double render, reload, two tabs). The login service only accepts
//! a verifier once, so the second request would fail with 400. Requests with
//! the same token tuple therefore share one in-flight exchange and successful
//! results are memoized for a few seconds. With Redis configured the lock and
//! the memo are shared between instances.

use dashmap::DashMap;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::cache::CacheService;
use crate::error::AppError;
use crate::models::{CallbackRequest, LoginResult};

const RESULT_TTL: Duration = Duration::from_secs(5);
const LOCK_TTL: Duration = Duration::from_secs(15);
const PEER_POLL_INTERVAL: Duration = Duration::from_millis(250);
const PEER_POLL_ATTEMPTS: u32 = 40;
const LOCK_ROUNDS: u32 = 3;

/// Why an exchange produced no session. Cloneable so every waiter of a
/// shared flight receives the same outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginFailure {
    /// The login service answered 400: the verifier was already used.
    Consumed,
    Upstream { status: u16, details: Value },
    Transport(String),
    /// Another instance holds the exchange lock and did not publish a result.
    Busy,
}

impl From<LoginFailure> for AppError {
    fn from(failure: LoginFailure) -> Self {
        match failure {
            LoginFailure::Consumed => AppError::TokenConsumed,
            LoginFailure::Upstream { status, details } => AppError::Upstream {
                status: axum::http::StatusCode::from_u16(status)
                    .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR),
                message: "Login exchange failed".to_string(),
                details,
            },
            LoginFailure::Transport(message) => {
                AppError::Internal(format!("Login service unreachable: {message}"))
            }
            LoginFailure::Busy => AppError::Upstream {
                status: axum::http::StatusCode::CONFLICT,
                message: "Login already in progress".to_string(),
                details: Value::Null,
            },
        }
    }
}

type Outcome = Result<LoginResult, LoginFailure>;
type Flight = Arc<OnceCell<Outcome>>;

/// What a waiting instance saw while another one held the lock.
enum PeerOutcome {
    Finished(LoginResult),
    /// Lock released without a memo: the holder failed or gave up.
    Abandoned,
    TimedOut,
}

/// Whether this instance should call the login service itself.
enum Turn {
    Exchange { locked: bool },
    Done(Outcome),
}

#[derive(Clone)]
pub struct LoginDedup {
    cache: CacheService,
    inflight: Arc<DashMap<String, Flight>>,
    result_ttl: Duration,
}

impl LoginDedup {
    pub fn new(cache: CacheService) -> Self {
        Self { cache, inflight: Arc::new(DashMap::new()), result_ttl: RESULT_TTL }
    }

    pub fn with_result_ttl(mut self, ttl: Duration) -> Self {
        self.result_ttl = ttl;
        self
    }

    /// Key for a token tuple. Hashed so raw secrets never reach Redis keys.
    pub fn fingerprint(request: &CallbackRequest) -> String {
        let mut hasher = Sha256::new();
        for part in [
            request.oauth_token.as_str(),
            request.oauth_verifier.as_str(),
            request.stored_token.as_deref().unwrap_or_default(),
            request.stored_token_secret.as_deref().unwrap_or_default(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }

    /// Runs `exchange` at most once per key among concurrent callers and
    /// serves the memoized result for `result_ttl` afterwards.
    pub async fn run<F, Fut>(&self, key: &str, exchange: F) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        if let Some(hit) = self.memoized(key).await {
            debug!("Login exchange served from memo");
            return Ok(hit);
        }

        let flight: Flight = self
            .inflight
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let outcome = flight.get_or_init(|| self.execute(key, exchange)).await.clone();

        // Later callers rely on the memo; failures must not stick
        self.inflight.remove_if(key, |_, current| Arc::ptr_eq(current, &flight));
        outcome
    }

    async fn execute<F, Fut>(&self, key: &str, exchange: F) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let lock_key = format!("login:lock:{key}");
        let locked = match self.take_turn(key, &lock_key).await {
            Turn::Exchange { locked } => locked,
            Turn::Done(outcome) => return outcome,
        };

        let outcome = match exchange().await {
            Ok(result) => {
                self.memoize(key, &result).await;
                Ok(result)
            }
            // A peer may have finished the same exchange a moment ago
            Err(LoginFailure::Consumed) => self.memoized(key).await.ok_or(LoginFailure::Consumed),
            Err(failure) => Err(failure),
        };
        if locked {
            self.release(&lock_key).await;
        }
        outcome
    }

    async fn take_turn(&self, key: &str, lock_key: &str) -> Turn {
        if !self.cache.is_shared() {
            return Turn::Exchange { locked: false };
        }
        for _ in 0..LOCK_ROUNDS {
            match self.cache.set_nx_ex(lock_key, "1", LOCK_TTL).await {
                Ok(true) => {
                    // The previous holder may have published just before releasing
                    if let Some(hit) = self.memoized(key).await {
                        self.release(lock_key).await;
                        return Turn::Done(Ok(hit));
                    }
                    return Turn::Exchange { locked: true };
                }
                Ok(false) => match self.wait_for_peer(key, lock_key).await {
                    PeerOutcome::Finished(hit) => return Turn::Done(Ok(hit)),
                    PeerOutcome::Abandoned => debug!("Login lock released without a result, retrying"),
                    PeerOutcome::TimedOut => break,
                },
                Err(e) => {
                    warn!("Login lock unavailable, exchanging without it: {:?}", e);
                    return Turn::Exchange { locked: false };
                }
            }
        }
        Turn::Done(Err(LoginFailure::Busy))
    }

    async fn wait_for_peer(&self, key: &str, lock_key: &str) -> PeerOutcome {
        info!("Login exchange running on another instance, waiting for its result");
        for _ in 0..PEER_POLL_ATTEMPTS {
            tokio::time::sleep(PEER_POLL_INTERVAL).await;
            if let Some(hit) = self.memoized(key).await {
                return PeerOutcome::Finished(hit);
            }
            if let Ok(None) = self.cache.get(lock_key).await {
                return PeerOutcome::Abandoned;
            }
        }
        PeerOutcome::TimedOut
    }

    async fn release(&self, lock_key: &str) {
        if let Err(e) = self.cache.del(lock_key).await {
            warn!("Failed to release login lock: {:?}", e);
        }
    }

    async fn memoized(&self, key: &str) -> Option<LoginResult> {
        let raw = self.cache.get(&format!("login:result:{key}")).await.ok().flatten()?;
        serde_json::from_str(&raw).ok()
    }

    async fn memoize(&self, key: &str, result: &LoginResult) {
        let Ok(raw) = serde_json::to_string(result) else {
            return;
        };
        if let Err(e) = self
            .cache
            .set_ex(&format!("login:result:{key}"), &raw, self.result_ttl)
            .await
        {
            warn!("Failed to memoize login result: {:?}", e);
        }
    }

    /// Periodic cleanup: expired memo entries and settled flights.
    pub fn evict(&self) -> usize {
        let before = self.inflight.len();
        self.inflight.retain(|_, flight| !flight.initialized());
        before.saturating_sub(self.inflight.len()) + self.cache.evict_expired()
    }

    pub fn inflight_len(&self) -> usize {
        self.inflight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn login(token: &str) -> LoginResult {
        LoginResult {
            token: token.to_string(),
            id: 1,
            username: "Alice".to_string(),
            first_login: false,
            extra: Map::new(),
        }
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_exchange() {
        let dedup = LoginDedup::new(CacheService::in_memory());
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let dedup = dedup.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                dedup
                    .run("key", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(login("abc"))
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(login("abc")));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dedup.inflight_len(), 0);
    }

    #[tokio::test]
    async fn memo_expires_after_ttl() {
        let dedup = LoginDedup::new(CacheService::in_memory())
            .with_result_ttl(Duration::from_millis(40));
        let counter = AtomicU32::new(0);
        let calls = &counter;

        for _ in 0..2 {
            let result = dedup
                .run("key", || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(login("abc"))
                })
                .await;
            assert!(result.is_ok());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(80)).await;
        dedup
            .run("key", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(login("def"))
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failures_are_not_memoized() {
        let dedup = LoginDedup::new(CacheService::in_memory());

        let first = dedup
            .run("key", || async { Err(LoginFailure::Transport("timeout".into())) })
            .await;
        assert_eq!(first, Err(LoginFailure::Transport("timeout".into())));

        let second = dedup.run("key", || async { Ok(login("abc")) }).await;
        assert_eq!(second, Ok(login("abc")));
    }

    #[tokio::test]
    async fn consumed_token_without_memo_is_reported() {
        let dedup = LoginDedup::new(CacheService::in_memory());
        let result = dedup.run("key", || async { Err(LoginFailure::Consumed) }).await;
        assert_eq!(result, Err(LoginFailure::Consumed));
        assert!(matches!(AppError::from(LoginFailure::Consumed), AppError::TokenConsumed));
    }

    #[tokio::test]
    async fn evict_drops_expired_memos() {
        let dedup = LoginDedup::new(CacheService::in_memory())
            .with_result_ttl(Duration::from_millis(20));
        dedup.run("key", || async { Ok(login("abc")) }).await.unwrap();
        assert_eq!(dedup.evict(), 0);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(dedup.evict() >= 1);
        assert_eq!(dedup.inflight_len(), 0);
    }

    #[tokio::test]
    async fn lock_is_released_after_success() {
        let cache = CacheService::shared_in_memory();
        let dedup = LoginDedup::new(cache.clone());
        dedup.run("key", || async { Ok(login("abc")) }).await.unwrap();
        assert_eq!(cache.get("login:lock:key").await.unwrap(), None);
        assert!(cache.get("login:result:key").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn late_retry_on_another_instance_reports_consumed_quickly() {
        let cache = CacheService::shared_in_memory();
        let first = LoginDedup::new(cache.clone()).with_result_ttl(Duration::from_millis(20));
        let second = LoginDedup::new(cache.clone());
        first.run("key", || async { Ok(login("abc")) }).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        let started = std::time::Instant::now();
        let retry = second.run("key", || async { Err(LoginFailure::Consumed) }).await;
        assert_eq!(retry, Err(LoginFailure::Consumed));
        assert!(started.elapsed() < PEER_POLL_INTERVAL);
    }

    #[tokio::test]
    async fn abandoned_lock_lets_the_waiter_exchange() {
        let cache = CacheService::shared_in_memory();
        cache.set_nx_ex("login:lock:key", "1", LOCK_TTL).await.unwrap();
        let holder = cache.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            holder.del("login:lock:key").await.unwrap();
        });

        let counter = AtomicU32::new(0);
        let calls = &counter;
        let dedup = LoginDedup::new(cache.clone());
        let result = dedup
            .run("key", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(login("abc"))
            })
            .await;
        assert_eq!(result, Ok(login("abc")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get("login:lock:key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn instances_sharing_a_cache_exchange_once() {
        let cache = CacheService::shared_in_memory();
        let first = LoginDedup::new(cache.clone());
        let second = LoginDedup::new(cache.clone());
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let exchange = || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(login("abc"))
        };

        let (a, b) = tokio::join!(first.run("key", exchange), second.run("key", exchange));
        assert_eq!(a, Ok(login("abc")));
        assert_eq!(b, Ok(login("abc")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fingerprint_depends_on_every_token() {
        let request = CallbackRequest {
            oauth_token: "t".into(),
            oauth_verifier: "v".into(),
            stored_token: None,
            stored_token_secret: None,
        };
        let other = CallbackRequest { oauth_verifier: "w".into(), ..request.clone() };
        assert_ne!(LoginDedup::fingerprint(&request), LoginDedup::fingerprint(&other));
        assert_eq!(LoginDedup::fingerprint(&request).len(), 64);
    }
}
