//! Caller context: cancellation plus an optional absolute deadline.
//!
//! Every network call and every wait in the pipeline is raced against the
//! [`CallContext`] via [`CallContext::run`]. Once cancellation (or deadline
//! expiry) is observed the in-flight future is dropped, which aborts the
//! underlying reqwest request, and no further calls are issued.

use crate::error::Pdf2OcrError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation token plus optional deadline, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that is never cancelled and has no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing token so the caller can cancel from elsewhere.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Set an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set a deadline relative to now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context and every clone of it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Return the error to report if the context is already done.
    pub fn check(&self) -> Result<(), Pdf2OcrError> {
        if self.token.is_cancelled() {
            return Err(Pdf2OcrError::Cancelled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Err(Pdf2OcrError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Resolve once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> Pdf2OcrError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => Pdf2OcrError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => Pdf2OcrError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                Pdf2OcrError::Cancelled
            }
        }
    }

    /// Drive `fut` to completion unless the context finishes first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, Pdf2OcrError>
    where
        F: Future<Output = Result<T, Pdf2OcrError>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            res = fut => res,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_completes_when_not_cancelled() {
        let ctx = CallContext::new();
        let v = ctx.run(async { Ok::<_, Pdf2OcrError>(7) }).await.unwrap();
        assert_eq!(v, 7);
    }

    #[tokio::test]
    async fn cancelled_context_short_circuits() {
        let ctx = CallContext::new();
        ctx.cancel();
        let res = ctx
            .run(async { Ok::<_, Pdf2OcrError>(()) })
            .await;
        assert!(matches!(res, Err(Pdf2OcrError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_interrupts_a_pending_future() {
        let ctx = CallContext::new().with_timeout(Duration::from_secs(2));
        let res = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, Pdf2OcrError>(())
            })
            .await;
        assert!(matches!(res, Err(Pdf2OcrError::DeadlineExceeded)));
    }

    #[tokio::test(start_paused = true)]
    async fn accessors_expose_token_and_deadline() {
        assert!(CallContext::new().deadline().is_none());

        let token = CancellationToken::new();
        let ctx = CallContext::with_token(token.clone()).with_timeout(Duration::from_secs(5));
        assert_eq!(ctx.deadline(), Some(Instant::now() + Duration::from_secs(5)));

        ctx.cancel();
        assert!(ctx.token().is_cancelled());
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn clones_share_cancellation() {
        let ctx = CallContext::new();
        let clone = ctx.clone();
        clone.cancel();
        assert!(matches!(ctx.check(), Err(Pdf2OcrError::Cancelled)));
    }
}
