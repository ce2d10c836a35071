//! Single-flight token refresh.
//!
//! # States
//! - Idle: `refreshing = false`, no waiters
//! - Refreshing: one owner is running the exchange, waiters accumulate
//!
//! # State Transitions
//! ```text
//! Idle → Refreshing:  first 401 of a cycle; that caller owns the exchange
//! Refreshing → Idle:  exchange settled; session written (or cleared) first,
//!                     then the flag resets and waiters are released in order
//! ```
//!
//! A caller whose 401 was caused by a token that is no longer current skips
//! the exchange and replays with the current token.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

use crate::auth::events::{AuthEvent, AuthEvents};
use crate::error::{ApiError, ApiResult};
use crate::observability::metrics;
use crate::session::{CredentialPair, Session, SessionError};

/// New access token, or the reason the cycle failed.
type RefreshOutcome = Result<String, String>;

const NO_REFRESH_TOKEN: &str = "no refresh token";

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

enum Role {
    Owner,
    Waiter(oneshot::Receiver<RefreshOutcome>),
    AlreadyRefreshed(String),
    LoggedOut,
}

/// Coordinates access-token refresh across all concurrent requests.
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    session: Arc<Session>,
    events: AuthEvents,
    timeout: Duration,
}

impl RefreshCoordinator {
    pub fn new(session: Arc<Session>, events: AuthEvents, timeout: Duration) -> Self {
        Self {
            state: Mutex::new(RefreshState::default()),
            session,
            events,
            timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    /// Number of requests parked on the current cycle.
    pub fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Obtain a fresh access token after a 401.
    ///
    /// `stale` is the access token the failed request carried. `exchange` is
    /// only invoked if this caller ends up owning the cycle; it receives the
    /// current refresh token and must return the new pair.
    pub async fn refresh<F, Fut>(&self, stale: Option<&str>, exchange: F) -> ApiResult<String>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = ApiResult<CredentialPair>>,
    {
        let role = {
            let mut state = self.lock();
            if state.refreshing {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Role::Waiter(rx)
            } else {
                match self.session.access_token() {
                    Some(current) if stale != Some(current.as_str()) => {
                        Role::AlreadyRefreshed(current)
                    }
                    // Sent without a token and nothing to refresh with: the
                    // loss was already signalled, or there never was a login.
                    None if stale.is_none() => Role::LoggedOut,
                    _ => {
                        state.refreshing = true;
                        Role::Owner
                    }
                }
            }
        };

        match role {
            Role::AlreadyRefreshed(token) => {
                tracing::debug!("Token already rotated, replaying without refresh");
                Ok(token)
            }
            Role::LoggedOut => Err(ApiError::SessionExpired(NO_REFRESH_TOKEN.into())),
            Role::Waiter(rx) => {
                tracing::debug!("Refresh in flight, waiting");
                match rx.await {
                    Ok(Ok(token)) => Ok(token),
                    Ok(Err(reason)) => Err(ApiError::SessionExpired(reason)),
                    Err(_) => Err(ApiError::SessionExpired("refresh abandoned".into())),
                }
            }
            Role::Owner => self.own_cycle(exchange).await,
        }
    }

    async fn own_cycle<F, Fut>(&self, exchange: F) -> ApiResult<String>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = ApiResult<CredentialPair>>,
    {
        let mut cycle = Cycle {
            coordinator: self,
            settled: false,
        };
        let started = Instant::now();
        tracing::info!("Refreshing access token");

        // Persist before releasing anyone; a failed write is logged by the
        // session and the in-memory pair still rotates.
        let outcome = match self.run_exchange(exchange).await {
            Ok(pair) => {
                let token = pair.access_token.clone();
                match self.session.replace(pair) {
                    Ok(()) | Err(SessionError::Store(_)) => Ok(token),
                    Err(SessionError::Incomplete) => {
                        Err("refresh response missing a token".to_string())
                    }
                }
            }
            Err(reason) => Err(reason),
        };
        if outcome.is_err() {
            let _ = self.session.clear();
        }

        let released = cycle.settle(&outcome);
        metrics::record_refresh(outcome.is_ok(), started.elapsed());

        match outcome {
            Ok(token) => {
                tracing::info!(waiters = released, "Access token refreshed");
                self.events.emit(AuthEvent::Refreshed);
                Ok(token)
            }
            Err(reason) => {
                tracing::warn!(waiters = released, reason = %reason, "Token refresh failed, session cleared");
                self.events.emit(AuthEvent::AuthenticationLost {
                    reason: reason.clone(),
                });
                Err(ApiError::SessionExpired(reason))
            }
        }
    }

    async fn run_exchange<F, Fut>(&self, exchange: F) -> Result<CredentialPair, String>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = ApiResult<CredentialPair>>,
    {
        let Some(refresh_token) = self.session.refresh_token() else {
            return Err(NO_REFRESH_TOKEN.to_string());
        };

        match tokio::time::timeout(self.timeout, exchange(refresh_token)).await {
            Ok(Ok(pair)) => Ok(pair),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "refresh timed out after {}ms",
                self.timeout.as_millis()
            )),
        }
    }

    /// Reset to Idle and complete every waiter, oldest first.
    fn release(&self, outcome: &RefreshOutcome) -> usize {
        let waiters = {
            let mut state = self.lock();
            state.refreshing = false;
            std::mem::take(&mut state.waiters)
        };

        let count = waiters.len();
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
        count
    }
}

/// Owner-side handle on a cycle. Dropping it unsettled (the owner's future
/// was cancelled) still returns the coordinator to Idle.
struct Cycle<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl Cycle<'_> {
    fn settle(&mut self, outcome: &RefreshOutcome) -> usize {
        self.settled = true;
        self.coordinator.release(outcome)
    }
}

impl Drop for Cycle<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!("Refresh owner dropped mid-cycle, releasing waiters");
            self.coordinator
                .release(&Err("refresh abandoned".to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemoryStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    const KEY: &str = "test.session";

    fn setup(timeout_ms: u64) -> (Arc<RefreshCoordinator>, Arc<Session>, AuthEvents) {
        let session = Arc::new(Session::new(Arc::new(MemoryStore::new()), KEY));
        session.replace(CredentialPair::new("T1", "R1")).unwrap();
        let events = AuthEvents::new();
        let coordinator = Arc::new(RefreshCoordinator::new(
            session.clone(),
            events.clone(),
            Duration::from_millis(timeout_ms),
        ));
        (coordinator, session, events)
    }

    #[tokio::test]
    async fn test_single_flight_for_concurrent_callers() {
        let (coordinator, session, _events) = setup(5_000);
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let coordinator = coordinator.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                coordinator
                    .refresh(Some("T1"), |refresh_token| async move {
                        assert_eq!(refresh_token, "R1");
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(CredentialPair::new("T2", "R2"))
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "T2");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.refresh_token().as_deref(), Some("R2"));
        assert!(!coordinator.is_refreshing());
        assert_eq!(coordinator.waiting(), 0);
    }

    #[tokio::test]
    async fn test_failure_clears_session_and_signals_once() {
        let (coordinator, session, events) = setup(5_000);
        let mut rx = events.subscribe();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let coordinator = coordinator.clone();
            handles.push(tokio::spawn(async move {
                coordinator
                    .refresh(Some("T1"), |_| async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err(ApiError::Validation {
                            status: 400,
                            message: "invalid refresh token".into(),
                        })
                    })
                    .await
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap().unwrap_err().is_session_expired());
        }
        assert!(!session.is_authenticated());

        assert!(matches!(
            rx.recv().await.unwrap(),
            AuthEvent::AuthenticationLost { .. }
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_missing_refresh_token_fails_without_exchange() {
        let (coordinator, session, events) = setup(5_000);
        let mut rx = events.subscribe();
        session.clear().unwrap();

        let result = coordinator
            .refresh(None, |_| async {
                panic!("exchange must not run without a refresh token")
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Session expired: no refresh token");
        assert!(!coordinator.is_refreshing());
        // Already logged out; nothing new to announce.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_cleared_under_in_flight_request_still_signals() {
        let (coordinator, session, events) = setup(5_000);
        let mut rx = events.subscribe();
        session.clear().unwrap();

        let err = coordinator
            .refresh(Some("T1"), |_| async { unreachable!() })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Session expired: no refresh token");
        assert!(matches!(
            rx.try_recv().unwrap(),
            AuthEvent::AuthenticationLost { .. }
        ));
    }

    #[tokio::test]
    async fn test_incomplete_pair_fails_cycle() {
        let (coordinator, session, events) = setup(5_000);
        let mut rx = events.subscribe();

        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                coordinator
                    .refresh(Some("T1"), |_| async { unreachable!() })
                    .await
            })
        };

        let err = coordinator
            .refresh(Some("T1"), |_| async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(CredentialPair::new("T2", ""))
            })
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Session expired: refresh response missing a token"
        );
        assert!(waiter.await.unwrap().unwrap_err().is_session_expired());
        assert!(!session.is_authenticated());
        assert!(session.access_token().is_none());
        assert!(matches!(
            rx.recv().await.unwrap(),
            AuthEvent::AuthenticationLost { .. }
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let (coordinator, session, _events) = setup(50);

        let err = coordinator
            .refresh(Some("T1"), |_| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(CredentialPair::new("T2", "R2"))
            })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("timed out"));
        assert!(!session.is_authenticated());
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_rotated_token_skips_exchange() {
        let (coordinator, session, _events) = setup(5_000);
        session.replace(CredentialPair::new("T2", "R2")).unwrap();

        let token = coordinator
            .refresh(Some("T1"), |_| async {
                panic!("token already rotated")
            })
            .await
            .unwrap();
        assert_eq!(token, "T2");
    }

    #[tokio::test]
    async fn test_cancelled_owner_releases_waiters() {
        let (coordinator, _session, _events) = setup(5_000);

        let owner = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .refresh(Some("T1"), |_| async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok(CredentialPair::new("T2", "R2"))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(coordinator.is_refreshing());

        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .refresh(Some("T1"), |_| async { unreachable!() })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(coordinator.waiting(), 1);

        owner.abort();
        let err = waiter.await.unwrap().unwrap_err();
        assert_eq!(err.to_string(), "Session expired: refresh abandoned");
        assert!(!coordinator.is_refreshing());
    }
}
