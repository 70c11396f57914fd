// src/cbt/pg.rs
//
// PostgreSQL implementations of the store contracts. Uses the runtime query
// API so the crate builds without a live database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, prelude::FromRow};
use std::collections::HashMap;

use super::OptionLabel;
use super::error::StoreError;
use super::store::{
    AttemptRecord, AttemptStatus, AttemptStore, CatalogStore, CbtQuestion, CbtTest, NewAnswer,
};

fn store_err(e: sqlx::Error) -> StoreError {
    // Postgres error code for unique violation is 23505
    if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
        StoreError::Duplicate
    } else {
        StoreError::Unavailable(e.to_string())
    }
}

#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        PgCatalogStore { pool }
    }
}

/// Helper struct for fetching test metadata.
#[derive(FromRow)]
struct TestRow {
    id: i64,
    title: String,
    duration_minutes: i64,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
}

/// Helper struct for fetching questions with their answer key.
#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    test_id: i64,
    question_text: String,
    option_a: String,
    option_b: String,
    option_c: String,
    option_d: String,
    correct_option: String,
    seq: i64,
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn published_test(
        &self,
        test_id: i64,
        school_id: i64,
        class_id: i64,
    ) -> Result<Option<CbtTest>, StoreError> {
        let row = sqlx::query_as::<_, TestRow>(
            r#"
            SELECT id, title, duration_minutes, starts_at, ends_at
            FROM tests
            WHERE id = $1 AND school_id = $2 AND class_id = $3 AND status = 'published'
            "#,
        )
        .bind(test_id)
        .bind(school_id)
        .bind(class_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.map(|r| CbtTest {
            id: r.id,
            title: r.title,
            duration_minutes: r.duration_minutes,
            starts_at: r.starts_at,
            ends_at: r.ends_at,
        }))
    }

    async fn questions(&self, test_id: i64) -> Result<Vec<CbtQuestion>, StoreError> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, test_id, question_text, option_a, option_b, option_c, option_d,
                   correct_option, seq
            FROM questions
            WHERE test_id = $1
            ORDER BY seq ASC, id ASC
            "#,
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.into_iter()
            .map(|r| {
                let correct_option = OptionLabel::parse(&r.correct_option).ok_or_else(|| {
                    StoreError::Unavailable(format!(
                        "question {} has corrupt correct_option '{}'",
                        r.id, r.correct_option
                    ))
                })?;
                Ok(CbtQuestion {
                    id: r.id,
                    test_id: r.test_id,
                    question_text: r.question_text,
                    option_a: r.option_a,
                    option_b: r.option_b,
                    option_c: r.option_c,
                    option_d: r.option_d,
                    correct_option,
                    seq: r.seq,
                })
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct PgAttemptStore {
    pool: PgPool,
}

impl PgAttemptStore {
    pub fn new(pool: PgPool) -> Self {
        PgAttemptStore { pool }
    }
}

#[derive(FromRow)]
struct AttemptRow {
    id: i64,
    test_id: i64,
    student_id: i64,
    status: String,
    started_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    score: Option<i64>,
    total_questions: i64,
}

impl AttemptRow {
    fn into_record(self) -> Result<AttemptRecord, StoreError> {
        let status = match self.status.as_str() {
            "in_progress" => AttemptStatus::InProgress,
            "submitted" => AttemptStatus::Submitted,
            other => {
                return Err(StoreError::Unavailable(format!(
                    "attempt {} has unexpected status '{}'",
                    self.id, other
                )));
            }
        };
        Ok(AttemptRecord {
            id: self.id,
            test_id: self.test_id,
            student_id: self.student_id,
            status,
            started_at: self.started_at,
            submitted_at: self.submitted_at,
            score: self.score,
            total_questions: self.total_questions,
        })
    }
}

const ATTEMPT_COLUMNS: &str =
    "id, test_id, student_id, status, started_at, submitted_at, score, total_questions";

#[derive(FromRow)]
struct SavedAnswerRow {
    question_id: i64,
    selected_option: String,
}

#[async_trait]
impl AttemptStore for PgAttemptStore {
    async fn find(
        &self,
        test_id: i64,
        student_id: i64,
    ) -> Result<Option<AttemptRecord>, StoreError> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {} FROM attempts WHERE test_id = $1 AND student_id = $2",
            ATTEMPT_COLUMNS
        ))
        .bind(test_id)
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row.map(AttemptRow::into_record).transpose()
    }

    async fn create(
        &self,
        test_id: i64,
        student_id: i64,
        started_at: DateTime<Utc>,
        total_questions: i64,
    ) -> Result<AttemptRecord, StoreError> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            r#"
            INSERT INTO attempts (test_id, student_id, status, started_at, total_questions)
            VALUES ($1, $2, 'in_progress', $3, $4)
            RETURNING {}
            "#,
            ATTEMPT_COLUMNS
        ))
        .bind(test_id)
        .bind(student_id)
        .bind(started_at)
        .bind(total_questions)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        row.into_record()
    }

    async fn refresh_total(
        &self,
        attempt_id: i64,
        total_questions: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE attempts SET total_questions = $1, updated_at = NOW()
             WHERE id = $2 AND status = 'in_progress'",
        )
        .bind(total_questions)
        .bind(attempt_id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }

    async fn saved_answers(
        &self,
        attempt_id: i64,
    ) -> Result<HashMap<i64, OptionLabel>, StoreError> {
        let rows = sqlx::query_as::<_, SavedAnswerRow>(
            "SELECT question_id, selected_option FROM answers WHERE attempt_id = $1",
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows
            .into_iter()
            .filter_map(|r| {
                OptionLabel::parse(&r.selected_option).map(|label| (r.question_id, label))
            })
            .collect())
    }

    async fn finalize(
        &self,
        attempt_id: i64,
        score: i64,
        total_questions: i64,
        submitted_at: DateTime<Utc>,
        answers: &[NewAnswer],
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        // Compare-and-set on status. Losing the race means a concurrent
        // submit already finalized this attempt; nothing else is written.
        let updated = sqlx::query(
            r#"
            UPDATE attempts
            SET status = 'submitted', score = $1, total_questions = $2,
                submitted_at = $3, updated_at = NOW()
            WHERE id = $4 AND status = 'in_progress'
            "#,
        )
        .bind(score)
        .bind(total_questions)
        .bind(submitted_at)
        .bind(attempt_id)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.map_err(store_err)?;
            return Ok(false);
        }

        // Replace, not append: a client retry after a failed commit must not
        // leave duplicate rows behind.
        sqlx::query("DELETE FROM answers WHERE attempt_id = $1")
            .bind(attempt_id)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

        if !answers.is_empty() {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO answers (attempt_id, question_id, selected_option, is_correct) ",
            );
            builder.push_values(answers, |mut b, answer| {
                b.push_bind(attempt_id)
                    .push_bind(answer.question_id)
                    .push_bind(answer.selected_option.as_str())
                    .push_bind(answer.is_correct);
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
        }

        tx.commit().await.map_err(store_err)?;
        Ok(true)
    }
}
