//! Error types for the edgequake-pdf2ocr library.
//!
//! A conversion either produces a complete [`crate::output::CombinedResult`]
//! or fails with exactly one [`Pdf2OcrError`]. There is no partial-success
//! path: a page set without OCR text (or OCR text without page images) is not
//! useful to the downstream LLM step.
//!
//! [`Pdf2OcrError::kind`] folds the variants into the three answers a caller
//! usually needs: "fix your input", "try later" or "the system is
//! misconfigured".

use std::time::Duration;
use thiserror::Error;

/// All errors returned by the edgequake-pdf2ocr library.
#[derive(Debug, Error)]
pub enum Pdf2OcrError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The bytes are not a parseable PDF.
    #[error("Input is not a valid PDF: {detail}")]
    Decode { detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired,

    /// A password was provided but it is wrong.
    #[error("Wrong password for encrypted PDF")]
    WrongPassword,

    /// The document source does not know this identifier.
    #[error("Document not found: '{id}'")]
    NotFound { id: String },

    // ── Rendering errors ──────────────────────────────────────────────────
    /// A page could not be rendered or PNG-encoded.
    #[error("Failed to encode page {page}: {detail}")]
    Encode { page: usize, detail: String },

    // ── Remote job errors ─────────────────────────────────────────────────
    /// The recognition service rejected the upload.
    #[error("Recognition service rejected the submission: {detail}")]
    Submission { detail: String },

    /// The recognition service reported the job as failed.
    #[error("Recognition job '{job_id}' failed: {detail}")]
    JobFailed { job_id: String, detail: String },

    /// The job did not reach a terminal state within the time budget.
    #[error("Recognition job '{job_id}' did not finish within {budget:?} ({polls} polls)")]
    JobTimedOut {
        job_id: String,
        budget: Duration,
        polls: u32,
    },

    /// Transport-level HTTP failure outside the job protocol.
    #[error("HTTP request to '{url}' failed: {detail}")]
    Http { url: String, detail: String },

    // ── Caller context ────────────────────────────────────────────────────
    /// The caller cancelled the operation.
    #[error("Operation cancelled by caller")]
    Cancelled,

    /// The caller-supplied deadline passed before the operation finished.
    #[error("Caller deadline exceeded")]
    DeadlineExceeded,

    // ── Config errors ─────────────────────────────────────────────────────
    /// The requested engine is not registered.
    #[error("Recognition engine '{name}' is not registered (available: {available})")]
    EngineUnavailable { name: String, available: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium system-wide or set PDFIUM_LIB_PATH=/path/to/libpdfium.\n\
Pre-built libraries: https://github.com/bblanchon/pdfium-binaries/releases\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`Pdf2OcrError`] for user-facing handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input is at fault (bad PDF, rejected upload, unknown id).
    FixInput,
    /// Transient or slow; a brand-new attempt later may succeed.
    TryLater,
    /// Deployment problem: missing engine, credentials, library.
    Misconfigured,
    /// Bug-class failure.
    Internal,
}

impl Pdf2OcrError {
    /// Classify the error for the caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Pdf2OcrError::Decode { .. }
            | Pdf2OcrError::PasswordRequired
            | Pdf2OcrError::WrongPassword
            | Pdf2OcrError::NotFound { .. }
            | Pdf2OcrError::Submission { .. }
            | Pdf2OcrError::JobFailed { .. } => ErrorKind::FixInput,
            Pdf2OcrError::JobTimedOut { .. }
            | Pdf2OcrError::Http { .. }
            | Pdf2OcrError::Cancelled
            | Pdf2OcrError::DeadlineExceeded => ErrorKind::TryLater,
            Pdf2OcrError::EngineUnavailable { .. }
            | Pdf2OcrError::InvalidConfig(_)
            | Pdf2OcrError::PdfiumBindingFailed(_) => ErrorKind::Misconfigured,
            Pdf2OcrError::Encode { .. } | Pdf2OcrError::Internal(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timed_out_display() {
        let e = Pdf2OcrError::JobTimedOut {
            job_id: "2024_abc".into(),
            budget: Duration::from_secs(300),
            polls: 60,
        };
        let msg = e.to_string();
        assert!(msg.contains("2024_abc"), "got: {msg}");
        assert!(msg.contains("300s"), "got: {msg}");
    }

    #[test]
    fn timed_out_display_keeps_sub_second_budget() {
        let e = Pdf2OcrError::JobTimedOut {
            job_id: "j".into(),
            budget: Duration::from_millis(250),
            polls: 3,
        };
        let msg = e.to_string();
        assert!(msg.contains("250ms"), "got: {msg}");
        assert!(!msg.contains(" 0s"), "got: {msg}");
    }

    #[test]
    fn engine_unavailable_lists_known_engines() {
        let e = Pdf2OcrError::EngineUnavailable {
            name: "mathpix".into(),
            available: "mock".into(),
        };
        assert!(e.to_string().contains("mathpix"));
        assert!(e.to_string().contains("mock"));
    }

    #[test]
    fn timeout_and_failure_are_distinguishable() {
        let failed = Pdf2OcrError::JobFailed {
            job_id: "j".into(),
            detail: "error".into(),
        };
        let timed_out = Pdf2OcrError::JobTimedOut {
            job_id: "j".into(),
            budget: Duration::from_secs(1),
            polls: 1,
        };
        assert_eq!(failed.kind(), ErrorKind::FixInput);
        assert_eq!(timed_out.kind(), ErrorKind::TryLater);
    }

    #[test]
    fn configuration_errors_are_misconfigured() {
        let e = Pdf2OcrError::EngineUnavailable {
            name: "x".into(),
            available: String::new(),
        };
        assert_eq!(e.kind(), ErrorKind::Misconfigured);
        assert_eq!(
            Pdf2OcrError::Decode { detail: "x".into() }.kind(),
            ErrorKind::FixInput
        );
    }
}
