// src/cbt/store.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::OptionLabel;
use super::error::StoreError;

/// Test metadata as the engine sees it. Scope and publication filtering
/// happen inside the catalog store, so a value of this type is always a
/// published test visible to the requesting student.
#[derive(Debug, Clone)]
pub struct CbtTest {
    pub id: i64,
    pub title: String,
    pub duration_minutes: i64,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

/// A question with its answer key. Never serialized to clients as-is.
#[derive(Debug, Clone)]
pub struct CbtQuestion {
    pub id: i64,
    pub test_id: i64,
    pub question_text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub correct_option: OptionLabel,
    pub seq: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    InProgress,
    Submitted,
}

/// One student's single run-through of one test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub id: i64,
    pub test_id: i64,
    pub student_id: i64,
    pub status: AttemptStatus,
    /// Set once at creation. Resumes never rewind it; the server-side timer
    /// is always recomputed from this value.
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub score: Option<i64>,
    pub total_questions: i64,
}

/// An answer row to be written at finalization. `is_correct` is snapshotted
/// against the answer key at submission time and never recomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAnswer {
    pub question_id: i64,
    pub selected_option: OptionLabel,
    pub is_correct: bool,
}

/// Read-only view of the test catalog.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// The test, if it is published and targeted at (school, class).
    async fn published_test(
        &self,
        test_id: i64,
        school_id: i64,
        class_id: i64,
    ) -> Result<Option<CbtTest>, StoreError>;

    /// The test's questions in stored order (seq, then id).
    async fn questions(&self, test_id: i64) -> Result<Vec<CbtQuestion>, StoreError>;
}

/// Durable attempt/answer state. The engine is the only writer.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn find(&self, test_id: i64, student_id: i64)
    -> Result<Option<AttemptRecord>, StoreError>;

    /// Creates the single attempt row for (test, student). Fails with
    /// `StoreError::Duplicate` when a concurrent caller won the race; the
    /// loser must re-read the winner's row.
    async fn create(
        &self,
        test_id: i64,
        student_id: i64,
        started_at: DateTime<Utc>,
        total_questions: i64,
    ) -> Result<AttemptRecord, StoreError>;

    /// Refreshes the question-count snapshot of an in-progress attempt.
    /// Tolerates questions being added or removed after the attempt began.
    async fn refresh_total(&self, attempt_id: i64, total_questions: i64)
    -> Result<(), StoreError>;

    /// Previously recorded selections for the attempt.
    async fn saved_answers(
        &self,
        attempt_id: i64,
    ) -> Result<HashMap<i64, OptionLabel>, StoreError>;

    /// Finalizes the attempt in one atomic unit: compare-and-set the status
    /// from in_progress to submitted, replace all answer rows, record score
    /// and submission time. Returns `false` when the status check fails,
    /// i.e. another submission already won; nothing is written in that case.
    async fn finalize(
        &self,
        attempt_id: i64,
        score: i64,
        total_questions: i64,
        submitted_at: DateTime<Utc>,
        answers: &[NewAnswer],
    ) -> Result<bool, StoreError>;
}
