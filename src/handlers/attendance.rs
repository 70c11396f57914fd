// src/handlers/attendance.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::attendance::{AttendanceRecord, AttendanceSummary},
    utils::jwt::Claims,
};

/// The caller's attendance history plus summary counts.
pub async fn my_attendance(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.sub.parse::<i64>().unwrap_or(0);

    let records = sqlx::query_as::<_, AttendanceRecord>(
        r#"
        SELECT attended_on, status
        FROM attendance_records
        WHERE student_id = $1
        ORDER BY attended_on DESC
        LIMIT 200
        "#,
    )
    .bind(student_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch attendance: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let mut summary = AttendanceSummary::default();
    for record in &records {
        match record.status.as_str() {
            "present" => summary.present += 1,
            "absent" => summary.absent += 1,
            "late" => summary.late += 1,
            _ => {}
        }
        summary.total += 1;
    }

    Ok(Json(json!({
        "summary": summary,
        "records": records
    })))
}
