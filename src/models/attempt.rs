// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use std::collections::HashMap;

/// DTO for handing in a test.
///
/// Values are raw client strings on purpose: anything that does not
/// normalize to one of A-D is treated as unanswered by the engine, never as
/// an error.
#[derive(Debug, Deserialize)]
pub struct SubmitTestRequest {
    pub attempt_id: i64,

    /// Key: question id. Value: selected option as sent by the client.
    pub answers: HashMap<i64, String>,
}

/// Joined row for the results page: one submitted attempt with its test.
#[derive(Debug, FromRow)]
pub struct ResultRow {
    pub attempt_id: i64,
    pub test_title: String,
    pub subject: String,
    pub score: Option<i64>,
    pub total_questions: i64,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Result entry as rendered to the student.
#[derive(Debug, Serialize)]
pub struct ResultEntry {
    pub attempt_id: i64,
    pub test_title: String,
    pub subject: String,
    pub score: i64,
    pub total_questions: i64,
    pub percentage: f64,
    pub passed: bool,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}
