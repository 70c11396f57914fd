// src/handlers/fees.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use sqlx::PgPool;

use crate::{error::AppError, models::fee::FeeReceipt, utils::jwt::Claims};

/// The caller's fee receipts, most recent payment first.
pub async fn my_receipts(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.sub.parse::<i64>().unwrap_or(0);

    let receipts = sqlx::query_as::<_, FeeReceipt>(
        r#"
        SELECT id, receipt_no, term, amount_cents, paid_at
        FROM fee_receipts
        WHERE student_id = $1
        ORDER BY paid_at DESC
        "#,
    )
    .bind(student_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch fee receipts: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(receipts))
}
