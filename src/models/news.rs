// src/models/news.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use url::Url;
use validator::Validate;

/// Represents the 'news_posts' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct NewsPost {
    pub id: i64,
    pub title: String,

    /// Sanitized HTML body. Cleaned with ammonia before it is stored, so
    /// clients may render it directly.
    pub body: String,

    pub image_url: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for publishing a news post.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateNewsRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 20000))]
    pub body: String,
    #[validate(custom(function = validate_image_url))]
    pub image_url: Option<String>,
}

fn validate_image_url(url: &str) -> Result<(), validator::ValidationError> {
    if Url::parse(url).is_err() {
        return Err(validator::ValidationError::new("invalid_image_url"));
    }
    Ok(())
}
