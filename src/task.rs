//! Cancellation and fan-out helpers for view loaders.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::debug;

use crate::{Error, Result};

/// Shared "the requester is gone" flag.
///
/// Loaders check it before committing results so a torn-down view never
/// receives a stale write.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Replace `slot` with `value` unless cancelled. Returns whether it wrote.
    pub fn commit<T>(&self, slot: &mut T, value: T) -> bool {
        if self.is_cancelled() {
            debug!("Dropping result for cancelled view");
            return false;
        }
        *slot = value;
        true
    }

    /// Guard that cancels the token when dropped.
    pub fn guard(&self) -> CancelGuard {
        CancelGuard {
            token: self.clone(),
        }
    }
}

/// Cancels its token on drop.
#[derive(Debug)]
pub struct CancelGuard {
    token: CancelToken,
}

impl CancelGuard {
    pub fn token(&self) -> &CancelToken {
        &self.token
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Result for one member of a fan-out.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberResult<K, T> {
    pub key: K,
    /// Fetched value or a short error message.
    pub outcome: std::result::Result<T, String>,
}

impl<K, T> MemberResult<K, T> {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Run `task` for every key, at most `limit` at a time, and wait for all.
///
/// A failing member contributes its error message; siblings keep running.
/// Results come back in key order.
pub async fn fan_out<K, T, F, Fut>(keys: Vec<K>, limit: usize, task: F) -> Vec<MemberResult<K, T>>
where
    K: Clone,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let task = &task;
    stream::iter(keys)
        .map(|key| async move {
            let outcome = task(key.clone()).await.map_err(|e| e.user_message());
            MemberResult { key, outcome }
        })
        .buffered(limit.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn commit_writes_until_cancelled() {
        let token = CancelToken::new();
        let mut slot = 1;

        assert!(token.commit(&mut slot, 2));
        assert_eq!(slot, 2);

        token.cancel();
        assert!(!token.commit(&mut slot, 3));
        assert_eq!(slot, 2);
        assert!(matches!(token.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn guard_cancels_on_drop() {
        let token = CancelToken::new();
        {
            let guard = token.guard();
            assert!(!guard.token().is_cancelled());
        }
        assert!(token.is_cancelled());
    }

    #[test]
    fn clones_share_state() {
        let token = CancelToken::new();
        let other = token.clone();
        other.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn fan_out_keeps_order_and_isolates_failures() {
        let keys = vec![1, 2, 3, 4];
        let results = fan_out(keys, 2, |k| async move {
            // later keys finish first
            tokio::time::sleep(Duration::from_millis(40 - k * 10)).await;
            if k == 2 {
                Err(Error::Api {
                    status: 500,
                    message: "boom".into(),
                })
            } else {
                Ok(k * 10)
            }
        })
        .await;

        let keys: Vec<u64> = results.iter().map(|r| r.key).collect();
        assert_eq!(keys, vec![1, 2, 3, 4]);
        assert_eq!(results[0].outcome, Ok(10));
        assert_eq!(results[1].outcome, Err("boom".to_string()));
        assert!(results[2].is_ok() && results[3].is_ok());
    }

    #[tokio::test]
    async fn fan_out_respects_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let results = fan_out((0..10).collect::<Vec<u32>>(), 3, |_| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        assert_eq!(results.len(), 10);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn fan_out_empty_is_empty() {
        let results: Vec<MemberResult<u8, ()>> =
            tokio_test::block_on(fan_out(Vec::new(), 4, |_| async { Ok(()) }));
        assert!(results.is_empty());
    }
}
