//! Retry/backoff orchestrator.
//!
//! Wraps a single asynchronous backend call with a bounded attempt budget,
//! exponential delay, a per-attempt timeout and cooperative cancellation.
//! Fatal errors (validation, configuration, cancellation) bypass the loop;
//! everything else is retried until the budget is spent, at which point the
//! last classified error is raised wrapped in `Exhausted`.
//!
//! The orchestrator never touches the failure queue — durability is the
//! pipeline layer's responsibility, keeping this component free of storage
//! side effects.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::backend::TranscribeError;
use crate::protocol::RetryAttempt;

/// Bounds of one orchestrated call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles per subsequent retry.
    pub initial_delay: Duration,
    /// Upper bound on the backoff delay.
    pub max_delay: Duration,
    /// Hard timeout applied to each attempt individually.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            attempt_timeout: Duration::from_secs(90),
        }
    }
}

/// Attempt counter and current delay, owned by a single orchestrated call.
/// Never shared across invocations.
#[derive(Debug, Clone)]
struct RetryState {
    attempt: u32,
    next_delay: Duration,
}

impl RetryState {
    fn new(policy: &RetryPolicy) -> Self {
        Self {
            attempt: 1,
            next_delay: policy.initial_delay,
        }
    }

    /// Move to the next attempt: bump the counter and double the delay up
    /// to the policy cap. The curve is monotonically non-decreasing.
    fn advance(&mut self, policy: &RetryPolicy) {
        self.attempt += 1;
        self.next_delay = std::cmp::min(self.next_delay * 2, policy.max_delay);
    }
}

/// Observer of retry progress, for user-facing status only.
///
/// The infallible signature keeps observers out of control flow: nothing an
/// implementation does can abort or extend the retry loop.
pub trait RetryObserver: Send + Sync {
    fn on_retry(&self, attempt: &RetryAttempt);
}

/// Observer that ignores all progress events.
pub struct NoopObserver;

impl RetryObserver for NoopObserver {
    fn on_retry(&self, _attempt: &RetryAttempt) {}
}

/// Run `operation` under the policy's attempt budget.
///
/// Each attempt is raced against the per-attempt timeout and the
/// cancellation token; the backoff sleep is raced against the token as
/// well, so an abandoned invocation stops retrying immediately instead of
/// completing its budget.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    observer: &dyn RetryObserver,
    mut operation: F,
) -> Result<T, TranscribeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TranscribeError>>,
{
    let mut state = RetryState::new(policy);

    loop {
        if cancel.is_cancelled() {
            return Err(TranscribeError::Cancelled);
        }

        let attempt_result = tokio::select! {
            _ = cancel.cancelled() => return Err(TranscribeError::Cancelled),
            outcome = timeout(policy.attempt_timeout, operation()) => match outcome {
                Ok(result) => result,
                Err(_) => Err(TranscribeError::Timeout(policy.attempt_timeout)),
            },
        };

        let err = match attempt_result {
            Ok(value) => return Ok(value),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => err,
        };

        if state.attempt >= policy.max_attempts {
            return Err(TranscribeError::Exhausted {
                attempts: state.attempt,
                last: Box::new(err),
            });
        }

        warn!(
            attempt = state.attempt,
            max_attempts = policy.max_attempts,
            delay = ?state.next_delay,
            error = %err,
            "Transcription attempt failed, retrying"
        );
        observer.on_retry(&RetryAttempt {
            attempt: state.attempt,
            waited: state.next_delay,
            error: err.to_string(),
        });

        tokio::select! {
            _ = cancel.cancelled() => return Err(TranscribeError::Cancelled),
            _ = sleep(state.next_delay) => {}
        }

        state.advance(policy);
    }
}
