// src/handlers/news.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{error::AppError, models::news::NewsPost, utils::jwt::Claims};

/// Latest published news for the caller's school.
pub async fn list_news(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let posts = sqlx::query_as::<_, NewsPost>(
        r#"
        SELECT id, title, body, image_url, created_at
        FROM news_posts
        WHERE school_id = $1 AND published
        ORDER BY created_at DESC
        LIMIT 50
        "#,
    )
    .bind(claims.school_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch news: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(posts))
}

/// A single news post, school-scoped.
pub async fn get_news(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let post = sqlx::query_as::<_, NewsPost>(
        r#"
        SELECT id, title, body, image_url, created_at
        FROM news_posts
        WHERE id = $1 AND school_id = $2 AND published
        "#,
    )
    .bind(id)
    .bind(claims.school_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("News post not found".to_string()))?;

    Ok(Json(post))
}
