// src/cbt/error.rs

use std::fmt;

/// Everything the lifecycle engine can tell a caller. All of these are
/// recoverable by the caller; storage internals never leak past this enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CbtError {
    /// Test not published, or not targeted at this student's class/school.
    NotEligible,
    /// The test window has not opened yet.
    NotStarted,
    /// The test window has closed.
    Closed,
    /// The attempt's time allowance ran out before resuming.
    TimeExpired,
    /// The attempt was already finalized. Benign to the caller.
    AlreadySubmitted,
    /// The test has no questions configured.
    NoQuestions,
    /// The (test, attempt, student) triple does not line up.
    AttemptMismatch,
    /// Store timeout or conflict. Safe to retry.
    Transient(String),
}

impl fmt::Display for CbtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CbtError::NotEligible => write!(f, "not eligible for this test"),
            CbtError::NotStarted => write!(f, "test window has not opened"),
            CbtError::Closed => write!(f, "test window has closed"),
            CbtError::TimeExpired => write!(f, "time allowance expired"),
            CbtError::AlreadySubmitted => write!(f, "attempt already submitted"),
            CbtError::NoQuestions => write!(f, "test has no questions"),
            CbtError::AttemptMismatch => write!(f, "attempt does not match test and student"),
            CbtError::Transient(msg) => write!(f, "transient store failure: {}", msg),
        }
    }
}

impl std::error::Error for CbtError {}

/// Failures surfaced by store implementations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint fired (e.g. a second attempt row for the
    /// same (test, student) pair). The engine resolves this by re-reading.
    Duplicate,
    /// Timeout, lost connection, corrupt row. Retryable from the caller's
    /// point of view.
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Duplicate => write!(f, "duplicate row"),
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<StoreError> for CbtError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => CbtError::Transient("conflicting write, retry".to_string()),
            StoreError::Unavailable(msg) => CbtError::Transient(msg),
        }
    }
}
