// ABOUTME: Per-call cancellation and deadline context passed to every storage operation.
// ABOUTME: Wraps remote calls so they abort promptly once the token fires or the deadline passes.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::StoreError;

/// Cancellation token plus optional deadline for one unit of caller work.
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl OpContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context cancelled together with `token`.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            cancel: token,
            deadline: None,
        }
    }

    /// Tighten the deadline to `timeout` from now. An earlier existing
    /// deadline is kept.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Tighten the deadline to `at`. An earlier existing deadline is kept.
    pub fn with_deadline(mut self, at: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing <= at => existing,
            _ => at,
        });
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail fast if the context is already done.
    pub fn check(&self) -> Result<(), StoreError> {
        if self.cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        if self.deadline.is_some_and(|at| Instant::now() >= at) {
            return Err(StoreError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the context is cancelled or its
    /// deadline passes first, in which case `fut` is dropped.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        self.check()?;

        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StoreError::Cancelled),
            _ = deadline => Err(StoreError::DeadlineExceeded),
            out = fut => out,
        }
    }
}
