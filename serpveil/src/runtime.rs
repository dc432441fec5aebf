//! Runtime helpers: the clock abstraction and cooperative polling.
//!
//! The content script runs on a single-threaded event loop. Waiting for
//! asynchronously rendered DOM state is a timer-driven loop that yields
//! between checks; it never blocks the page.

use async_trait::async_trait;
use std::time::Duration;

/// Source of timer-based suspension.
#[async_trait(?Send)]
pub trait Clock {
    /// Completes after `duration`.
    async fn sleep(&self, duration: Duration);
}

/// A clock backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait(?Send)]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Runs `check` until it yields a value, sleeping `interval` between tries.
///
/// There is no timeout; callers that need one wrap the future.
pub async fn poll_until<C, T>(clock: &C, interval: Duration, mut check: impl FnMut() -> Option<T>) -> T
where
    C: Clock + ?Sized,
{
    loop {
        if let Some(value) = check() {
            return value;
        }
        clock.sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_returns_first_value() {
        let calls = Cell::new(0);
        let started = tokio::time::Instant::now();
        let value = poll_until(&TokioClock, Duration::from_millis(500), || {
            calls.set(calls.get() + 1);
            (calls.get() == 3).then_some("ready")
        })
        .await;
        assert_eq!(value, "ready");
        assert_eq!(calls.get(), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_immediate() {
        let value = poll_until(&TokioClock, Duration::from_secs(60), || Some(7)).await;
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_never_ready() {
        let never = poll_until(&TokioClock, Duration::from_millis(500), || None::<()>);
        let result = tokio::time::timeout(Duration::from_secs(30), never).await;
        assert!(result.is_err());
    }
}
