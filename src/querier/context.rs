//! Request context threaded into every store call
//!
//! A [`QueryContext`] combines a cancellation token with an optional
//! deadline. Clones share the same token, so cancelling the request context
//! stops every sub-query worker holding a clone.

use crate::error::QuerierError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation and deadline scope for one composite request
#[derive(Debug, Clone)]
pub struct QueryContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for QueryContext {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryContext {
    /// Context with no deadline that is only cancelled explicitly
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Context that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Child context: cancelled with its parent, may carry a tighter deadline
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        let own = timeout.map(|t| Instant::now() + t);
        let deadline = match (self.deadline, own) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self {
            token: self.token.child_token(),
            deadline,
        }
    }

    /// Cancel this context and all its children
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True once cancelled or past the deadline
    pub fn is_done(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Error describing why the context is done
    pub fn err(&self) -> Option<QuerierError> {
        if self.token.is_cancelled() {
            Some(QuerierError::Cancelled("context cancelled".to_string()))
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(QuerierError::Cancelled("context deadline exceeded".to_string()))
        } else {
            None
        }
    }

    /// Resolves when the context is cancelled or its deadline passes
    pub async fn done(&self) -> QuerierError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {
                        QuerierError::Cancelled("context cancelled".to_string())
                    }
                    _ = tokio::time::sleep_until(deadline) => {
                        QuerierError::Cancelled("context deadline exceeded".to_string())
                    }
                }
            },
            None => {
                self.token.cancelled().await;
                QuerierError::Cancelled("context cancelled".to_string())
            },
        }
    }

    /// Run `fut` unless the context finishes first
    pub async fn run<F, T, E>(&self, fut: F) -> Result<T, QuerierError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<QuerierError>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }

        tokio::select! {
            biased;
            err = self.done() => Err(err),
            res = fut => res.map_err(Into::into),
        }
    }
}
