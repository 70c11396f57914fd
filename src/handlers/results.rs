// src/handlers/results.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use sqlx::PgPool;

use crate::{
    cbt::percentage,
    config::PASS_MARK_PERCENT,
    error::AppError,
    models::attempt::{ResultEntry, ResultRow},
    utils::jwt::Claims,
};

/// The caller's submitted CBT attempts, newest first.
///
/// Score and total are read from the attempt snapshot; the percentage and
/// pass flag are computed at render time. The pass mark is presentation
/// only, the engine does not know about it.
pub async fn my_results(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.sub.parse::<i64>().unwrap_or(0);

    let rows = sqlx::query_as::<_, ResultRow>(
        r#"
        SELECT a.id AS attempt_id, t.title AS test_title, t.subject,
               a.score, a.total_questions, a.submitted_at
        FROM attempts a
        JOIN tests t ON a.test_id = t.id
        WHERE a.student_id = $1 AND a.status = 'submitted'
        ORDER BY a.submitted_at DESC
        "#,
    )
    .bind(student_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch results: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let entries: Vec<ResultEntry> = rows
        .into_iter()
        .map(|row| {
            let score = row.score.unwrap_or(0);
            let pct = percentage(score, row.total_questions);
            ResultEntry {
                attempt_id: row.attempt_id,
                test_title: row.test_title,
                subject: row.subject,
                score,
                total_questions: row.total_questions,
                percentage: pct,
                passed: pct >= PASS_MARK_PERCENT,
                submitted_at: row.submitted_at,
            }
        })
        .collect();

    Ok(Json(entries))
}
