//! Remote job protocol: submit → poll → fetch, as an explicit state machine.
//!
//! ```text
//!             submit ok              "completed" + fetch ok
//! Submitted ───────────▶ Processing ────────────────────────▶ Completed
//!     │                   │   ▲  │
//!     │ submit rejected   │   └──┘ "processing" / unknown status
//!     ▼                   │
//!   Failed ◀──────────────┤ "error", status/fetch failure
//!                         │
//!   TimedOut ◀────────────┘ deadline passed
//! ```
//!
//! The driver polls on a tokio interval and races every wait and every
//! network call against two independent bounds: the absolute job deadline
//! and the caller's [`CallContext`]. Whichever fires first ends the job.
//! Terminal states are never left, and no request is issued after one is
//! reached.

use crate::context::CallContext;
use crate::error::Pdf2OcrError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Wire operations of a job-based recognition service.
#[async_trait]
pub trait JobTransport: Send + Sync {
    /// Upload the document; returns the service's job identifier.
    async fn submit(&self, file_name: &str, pdf: &[u8]) -> Result<String, Pdf2OcrError>;

    /// Fetch the current status of a job.
    async fn status(&self, job_id: &str) -> Result<PollStatus, Pdf2OcrError>;

    /// Download the finished result body.
    async fn fetch(&self, job_id: &str) -> Result<String, Pdf2OcrError>;
}

/// A status value reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Processing,
    Completed,
    Error(Option<String>),
    Other(String),
}

impl PollStatus {
    pub fn parse(status: &str, error: Option<String>) -> Self {
        match status {
            "processing" => PollStatus::Processing,
            "completed" => PollStatus::Completed,
            "error" => PollStatus::Error(error),
            other => PollStatus::Other(other.to_string()),
        }
    }
}

/// Where a failed job failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Submit,
    Poll,
    Fetch,
}

/// Lifecycle of one remote job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Submitted {
        job_id: String,
    },
    Processing {
        job_id: String,
        polls: u32,
    },
    Completed {
        job_id: String,
        text: String,
        polls: u32,
    },
    Failed {
        job_id: Option<String>,
        stage: FailureStage,
        detail: String,
    },
    TimedOut {
        job_id: String,
        polls: u32,
    },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed { .. } | JobState::Failed { .. } | JobState::TimedOut { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobState::Submitted { .. } => "submitted",
            JobState::Processing { .. } => "processing",
            JobState::Completed { .. } => "completed",
            JobState::Failed { .. } => "failed",
            JobState::TimedOut { .. } => "timed_out",
        }
    }
}

/// Receives job lifecycle events. All methods default to no-ops.
///
/// Implementations must be `Send + Sync`; one observer may watch several
/// concurrent conversions.
pub trait JobObserver: Send + Sync {
    /// Called on every state change, including the final one.
    fn on_transition(&self, from: Option<&JobState>, to: &JobState) {
        let _ = (from, to);
    }

    /// Called after each status response.
    fn on_poll(&self, job_id: &str, polls: u32, status: &PollStatus) {
        let _ = (job_id, polls, status);
    }
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl JobObserver for NoopObserver {}

/// Convenience alias for a shared observer.
pub type SharedObserver = Arc<dyn JobObserver>;

/// Timing and tolerance knobs for the driver.
#[derive(Debug, Clone)]
pub struct JobPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub strict_status: bool,
}

impl Default for JobPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(300),
            strict_status: false,
        }
    }
}

/// Successful job result.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job_id: String,
    pub text: String,
    pub polls: u32,
    pub elapsed: Duration,
}

/// Drives a single job from submission to a terminal state.
pub struct JobDriver<'a> {
    transport: &'a dyn JobTransport,
    policy: &'a JobPolicy,
    observer: &'a dyn JobObserver,
}

impl<'a> JobDriver<'a> {
    pub fn new(
        transport: &'a dyn JobTransport,
        policy: &'a JobPolicy,
        observer: &'a dyn JobObserver,
    ) -> Self {
        Self {
            transport,
            policy,
            observer,
        }
    }

    /// Submit `pdf` and wait for the result.
    ///
    /// Returns the recognised text, or the error matching the terminal
    /// state: [`Pdf2OcrError::Submission`], [`Pdf2OcrError::JobFailed`],
    /// [`Pdf2OcrError::JobTimedOut`], or the caller's
    /// `Cancelled`/`DeadlineExceeded`.
    pub async fn run(
        &self,
        ctx: &CallContext,
        file_name: &str,
        pdf: &[u8],
    ) -> Result<JobOutcome, Pdf2OcrError> {
        let job_id = match ctx.run(self.transport.submit(file_name, pdf)).await {
            Ok(id) => id,
            Err(e @ (Pdf2OcrError::Cancelled | Pdf2OcrError::DeadlineExceeded)) => return Err(e),
            Err(e) => {
                let failed = JobState::Failed {
                    job_id: None,
                    stage: FailureStage::Submit,
                    detail: e.to_string(),
                };
                self.observer.on_transition(None, &failed);
                warn!("Job submission failed: {}", e);
                return Err(e);
            }
        };

        let started = Instant::now();
        let deadline = started + self.policy.timeout;
        info!(
            "Job {} submitted; polling every {:?} for up to {:?}",
            job_id, self.policy.poll_interval, self.policy.timeout
        );

        let mut ticker = interval(self.policy.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut state = JobState::Submitted { job_id };
        self.observer.on_transition(None, &state);

        while !state.is_terminal() {
            let next = self.step(ctx, &state, &mut ticker, deadline).await?;
            debug!("Job state {} → {}", state.name(), next.name());
            self.observer.on_transition(Some(&state), &next);
            state = next;
        }

        let elapsed = started.elapsed();
        match state {
            JobState::Completed {
                job_id,
                text,
                polls,
            } => {
                info!(
                    "Job {} completed after {} polls in {:?}",
                    job_id, polls, elapsed
                );
                Ok(JobOutcome {
                    job_id,
                    text,
                    polls,
                    elapsed,
                })
            }
            JobState::Failed { job_id, detail, .. } => Err(Pdf2OcrError::JobFailed {
                job_id: job_id.unwrap_or_default(),
                detail,
            }),
            JobState::TimedOut { job_id, polls } => {
                warn!("Job {} timed out after {} polls", job_id, polls);
                Err(Pdf2OcrError::JobTimedOut {
                    job_id,
                    budget: self.policy.timeout,
                    polls,
                })
            }
            JobState::Submitted { .. } | JobState::Processing { .. } => Err(
                Pdf2OcrError::Internal("job loop exited in a non-terminal state".into()),
            ),
        }
    }

    /// Compute the successor of a non-terminal state.
    ///
    /// `Err` only for caller cancellation; protocol outcomes are states.
    async fn step(
        &self,
        ctx: &CallContext,
        state: &JobState,
        ticker: &mut tokio::time::Interval,
        deadline: Instant,
    ) -> Result<JobState, Pdf2OcrError> {
        let (job_id, polls) = match state {
            JobState::Submitted { job_id } => {
                return Ok(JobState::Processing {
                    job_id: job_id.clone(),
                    polls: 0,
                })
            }
            JobState::Processing { job_id, polls } => (job_id.clone(), *polls),
            terminal => return Ok(terminal.clone()),
        };
        let timed_out = || JobState::TimedOut {
            job_id: job_id.clone(),
            polls,
        };

        tokio::select! {
            biased;
            err = ctx.done() => return Err(err),
            _ = sleep_until(deadline) => return Ok(timed_out()),
            _ = ticker.tick() => {}
        }

        let status = tokio::select! {
            biased;
            err = ctx.done() => return Err(err),
            _ = sleep_until(deadline) => return Ok(timed_out()),
            res = self.transport.status(&job_id) => res,
        };
        let polls = polls + 1;

        let status = match status {
            Ok(s) => s,
            Err(e) => {
                return Ok(JobState::Failed {
                    job_id: Some(job_id),
                    stage: FailureStage::Poll,
                    detail: format!("status request failed: {e}"),
                })
            }
        };
        self.observer.on_poll(&job_id, polls, &status);

        match status {
            PollStatus::Processing => Ok(JobState::Processing { job_id, polls }),
            PollStatus::Other(s) if !self.policy.strict_status => {
                warn!(
                    "Job {}: unrecognised status '{}', continuing to poll",
                    job_id, s
                );
                Ok(JobState::Processing { job_id, polls })
            }
            PollStatus::Other(s) => Ok(JobState::Failed {
                job_id: Some(job_id),
                stage: FailureStage::Poll,
                detail: format!("unrecognised status '{s}'"),
            }),
            PollStatus::Error(detail) => Ok(JobState::Failed {
                job_id: Some(job_id),
                stage: FailureStage::Poll,
                detail: detail.unwrap_or_else(|| "service reported status 'error'".into()),
            }),
            PollStatus::Completed => {
                match ctx.run(self.transport.fetch(&job_id)).await {
                    Ok(text) => Ok(JobState::Completed {
                        job_id,
                        text,
                        polls,
                    }),
                    Err(e @ (Pdf2OcrError::Cancelled | Pdf2OcrError::DeadlineExceeded)) => Err(e),
                    Err(e) => Ok(JobState::Failed {
                        job_id: Some(job_id),
                        stage: FailureStage::Fetch,
                        detail: format!("result fetch failed: {e}"),
                    }),
                }
            }
        }
    }
}
