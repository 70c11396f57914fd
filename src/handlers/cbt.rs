// src/handlers/cbt.rs
//
// HTTP boundary of the CBT module. These handlers only translate requests
// into lifecycle engine calls; every rule about windows, deadlines and
// double submission lives in `crate::cbt`.

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;

use crate::{
    cbt::{
        CbtError, LifecycleEngine, StudentRef, percentage,
        pg::{PgAttemptStore, PgCatalogStore},
    },
    error::AppError,
    models::{attempt::SubmitTestRequest, test::TestListEntry},
    utils::jwt::Claims,
};

fn engine(pool: &PgPool) -> LifecycleEngine<PgCatalogStore, PgAttemptStore> {
    LifecycleEngine::new(
        PgCatalogStore::new(pool.clone()),
        PgAttemptStore::new(pool.clone()),
    )
}

/// The caller's identity, taken from the verified token. Accounts without a
/// class (admins) are not eligible to sit tests.
fn student_ref(claims: &Claims) -> Result<StudentRef, AppError> {
    let class_id = claims
        .class_id
        .ok_or_else(|| AppError::from(CbtError::NotEligible))?;
    Ok(StudentRef {
        student_id: claims.sub.parse::<i64>().unwrap_or(0),
        school_id: claims.school_id,
        class_id,
    })
}

/// Lists published tests for the caller's class, with the caller's attempt
/// status joined in so the client can label each entry.
pub async fn list_tests(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student = student_ref(&claims)?;

    let tests = sqlx::query_as::<_, TestListEntry>(
        r#"
        SELECT t.id, t.title, t.subject, t.duration_minutes, t.starts_at, t.ends_at,
               COALESCE(q.cnt, 0) AS question_count,
               a.status AS attempt_status
        FROM tests t
        LEFT JOIN (SELECT test_id, COUNT(*) AS cnt FROM questions GROUP BY test_id) q
            ON q.test_id = t.id
        LEFT JOIN attempts a ON a.test_id = t.id AND a.student_id = $1
        WHERE t.school_id = $2 AND t.class_id = $3 AND t.status = 'published'
        ORDER BY t.created_at DESC
        "#,
    )
    .bind(student.student_id)
    .bind(student.school_id)
    .bind(student.class_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list tests: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(tests))
}

/// Starts a fresh attempt or resumes the existing one.
///
/// Safe to call on every page load: the same attempt row and the original
/// start time are returned each time, with the remaining seconds recomputed
/// on the server.
pub async fn begin_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<i64>,
) -> Result<Response, AppError> {
    let student = student_ref(&claims)?;

    match engine(&pool)
        .begin_or_resume(test_id, student, Utc::now())
        .await
    {
        Ok(outcome) => Ok(Json(outcome).into_response()),
        // Informational, not an error: the student sees their result page.
        Err(CbtError::AlreadySubmitted) => Ok(Json(json!({
            "status": "already_submitted",
            "message": "You have already submitted this test"
        }))
        .into_response()),
        Err(err) => Err(err.into()),
    }
}

/// Hands in an attempt and returns the score.
///
/// Retries are harmless: the engine finalizes at most once, and a repeat
/// call reports the already-submitted state instead of rescoring.
pub async fn submit_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<i64>,
    Json(payload): Json<SubmitTestRequest>,
) -> Result<Response, AppError> {
    let student = student_ref(&claims)?;

    match engine(&pool)
        .submit(
            test_id,
            payload.attempt_id,
            student,
            &payload.answers,
            Utc::now(),
        )
        .await
    {
        Ok(outcome) => Ok(Json(json!({
            "status": "submitted",
            "score": outcome.score,
            "total_questions": outcome.total_questions,
            "percentage": percentage(outcome.score, outcome.total_questions),
            "message": "Test submitted successfully"
        }))
        .into_response()),
        Err(CbtError::AlreadySubmitted) => Ok(Json(json!({
            "status": "already_submitted",
            "message": "This test was already submitted; your recorded score is unchanged"
        }))
        .into_response()),
        Err(err) => Err(err.into()),
    }
}
