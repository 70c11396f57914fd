// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use regex::Regex;
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::LazyLock;
use validator::Validate;

use crate::{
    cbt::OptionLabel,
    error::AppError,
    models::{
        news::CreateNewsRequest,
        test::{CreateQuestionRequest, CreateTestRequest, UpdateQuestionRequest, UpdateTestRequest},
    },
    utils::{hash::hash_password, html::clean_html, jwt::Claims},
};

static ADMISSION_NO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9][A-Z0-9/-]{2,19}$").unwrap());

fn validate_admission_no(value: &str) -> Result<(), validator::ValidationError> {
    if !ADMISSION_NO_RE.is_match(value) {
        return Err(validator::ValidationError::new("invalid_admission_no"));
    }
    Ok(())
}

/// DTO for creating a class.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateClassRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
}

/// Creates a class in the admin's school.
pub async fn create_class(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateClassRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO classes (school_id, name) VALUES ($1, $2) RETURNING id",
    )
    .bind(claims.school_id)
    .bind(&payload.name)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
            AppError::Conflict(format!("Class '{}' already exists", payload.name))
        } else {
            tracing::error!("Failed to create class: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// DTO for provisioning a student account.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateStudentRequest {
    /// Admission number; doubles as the login name.
    #[validate(custom(function = validate_admission_no))]
    pub admission_no: String,
    #[validate(length(min = 1, max = 100))]
    pub full_name: String,
    pub class_id: i64,
    #[validate(length(min = 4, max = 128))]
    pub password: String,
}

/// Provisions a student account in the admin's school.
pub async fn create_student(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateStudentRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    // The class must exist in this school; cross-tenant enrolment is not a
    // thing.
    sqlx::query_scalar::<_, i64>("SELECT id FROM classes WHERE id = $1 AND school_id = $2")
        .bind(payload.class_id)
        .bind(claims.school_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Class not found".to_string()))?;

    let hashed_password = hash_password(&payload.password)?;

    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO users (school_id, class_id, username, full_name, password, role)
        VALUES ($1, $2, $3, $4, $5, 'student')
        RETURNING id
        "#,
    )
    .bind(claims.school_id)
    .bind(payload.class_id)
    .bind(&payload.admission_no)
    .bind(&payload.full_name)
    .bind(hashed_password)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
            AppError::Conflict(format!(
                "Admission number '{}' already exists",
                payload.admission_no
            ))
        } else {
            tracing::error!("Failed to create student: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// Creates a test in draft status.
pub async fn create_test(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if let (Some(starts_at), Some(ends_at)) = (payload.starts_at, payload.ends_at) {
        if ends_at <= starts_at {
            return Err(AppError::BadRequest(
                "ends_at must be after starts_at".to_string(),
            ));
        }
    }

    sqlx::query_scalar::<_, i64>("SELECT id FROM classes WHERE id = $1 AND school_id = $2")
        .bind(payload.class_id)
        .bind(claims.school_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Class not found".to_string()))?;

    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO tests (school_id, class_id, title, subject, duration_minutes, starts_at, ends_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(claims.school_id)
    .bind(payload.class_id)
    .bind(&payload.title)
    .bind(&payload.subject)
    .bind(payload.duration_minutes)
    .bind(payload.starts_at)
    .bind(payload.ends_at)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create test: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// Updates test metadata. Fields are applied individually.
pub async fn update_test(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    // Check existence within this school
    sqlx::query_scalar::<_, i64>("SELECT id FROM tests WHERE id = $1 AND school_id = $2")
        .bind(id)
        .bind(claims.school_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Test not found".to_string()))?;

    if let Some(title) = payload.title {
        sqlx::query("UPDATE tests SET title = $1, updated_at = NOW() WHERE id = $2")
            .bind(title)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    if let Some(subject) = payload.subject {
        sqlx::query("UPDATE tests SET subject = $1, updated_at = NOW() WHERE id = $2")
            .bind(subject)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    if let Some(duration_minutes) = payload.duration_minutes {
        sqlx::query("UPDATE tests SET duration_minutes = $1, updated_at = NOW() WHERE id = $2")
            .bind(duration_minutes)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    if let Some(starts_at) = payload.starts_at {
        sqlx::query("UPDATE tests SET starts_at = $1, updated_at = NOW() WHERE id = $2")
            .bind(starts_at)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    if let Some(ends_at) = payload.ends_at {
        sqlx::query("UPDATE tests SET ends_at = $1, updated_at = NOW() WHERE id = $2")
            .bind(ends_at)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    Ok(Json(serde_json::json!({ "message": "Test updated" })))
}

/// Publishes a draft test, making it visible to its class.
pub async fn publish_test(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    // Publishing an empty test would only let students run into the
    // no-questions rejection at begin time.
    let question_count =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM questions WHERE test_id = $1")
            .bind(id)
            .fetch_one(&pool)
            .await?;
    if question_count == 0 {
        return Err(AppError::BadRequest(
            "Add questions before publishing".to_string(),
        ));
    }

    let result = sqlx::query(
        "UPDATE tests SET status = 'published', updated_at = NOW()
         WHERE id = $1 AND school_id = $2 AND status = 'draft'",
    )
    .bind(id)
    .bind(claims.school_id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        sqlx::query_scalar::<_, i64>("SELECT id FROM tests WHERE id = $1 AND school_id = $2")
            .bind(id)
            .bind(claims.school_id)
            .fetch_optional(&pool)
            .await?
            .ok_or(AppError::NotFound("Test not found".to_string()))?;
        return Err(AppError::Conflict(
            "Only draft tests can be published".to_string(),
        ));
    }

    Ok(Json(serde_json::json!({ "status": "published" })))
}

/// Closes a published test. Attempts already in progress can no longer be
/// submitted once the test leaves the published state.
pub async fn close_test(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query(
        "UPDATE tests SET status = 'closed', updated_at = NOW()
         WHERE id = $1 AND school_id = $2 AND status = 'published'",
    )
    .bind(id)
    .bind(claims.school_id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        sqlx::query_scalar::<_, i64>("SELECT id FROM tests WHERE id = $1 AND school_id = $2")
            .bind(id)
            .bind(claims.school_id)
            .fetch_optional(&pool)
            .await?
            .ok_or(AppError::NotFound("Test not found".to_string()))?;
        return Err(AppError::Conflict(
            "Only published tests can be closed".to_string(),
        ));
    }

    Ok(Json(serde_json::json!({ "status": "closed" })))
}

/// Adds a question to a test. Appended at the end of the stored order
/// unless an explicit seq is given.
pub async fn add_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let correct_option = OptionLabel::parse(&payload.correct_option).ok_or(
        AppError::BadRequest("correct_option must be one of A, B, C, D".to_string()),
    )?;

    sqlx::query_scalar::<_, i64>("SELECT id FROM tests WHERE id = $1 AND school_id = $2")
        .bind(test_id)
        .bind(claims.school_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Test not found".to_string()))?;

    let seq = match payload.seq {
        Some(seq) => seq,
        None => {
            sqlx::query_scalar::<_, i64>(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM questions WHERE test_id = $1",
            )
            .bind(test_id)
            .fetch_one(&pool)
            .await?
        }
    };

    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO questions
            (test_id, question_text, option_a, option_b, option_c, option_d, correct_option, seq)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(test_id)
    .bind(&payload.question_text)
    .bind(&payload.option_a)
    .bind(&payload.option_b)
    .bind(&payload.option_c)
    .bind(&payload.option_d)
    .bind(correct_option.as_str())
    .bind(seq)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// Updates a question. Fields are applied individually.
pub async fn update_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT q.id FROM questions q
        JOIN tests t ON q.test_id = t.id
        WHERE q.id = $1 AND t.school_id = $2
        "#,
    )
    .bind(id)
    .bind(claims.school_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Question not found".to_string()))?;

    if let Some(question_text) = payload.question_text {
        sqlx::query("UPDATE questions SET question_text = $1 WHERE id = $2")
            .bind(question_text)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    for (column, value) in [
        ("option_a", payload.option_a),
        ("option_b", payload.option_b),
        ("option_c", payload.option_c),
        ("option_d", payload.option_d),
    ] {
        if let Some(value) = value {
            sqlx::query(&format!("UPDATE questions SET {} = $1 WHERE id = $2", column))
                .bind(value)
                .bind(id)
                .execute(&pool)
                .await?;
        }
    }

    if let Some(raw) = payload.correct_option {
        let correct_option = OptionLabel::parse(&raw).ok_or(AppError::BadRequest(
            "correct_option must be one of A, B, C, D".to_string(),
        ))?;
        sqlx::query("UPDATE questions SET correct_option = $1 WHERE id = $2")
            .bind(correct_option.as_str())
            .bind(id)
            .execute(&pool)
            .await?;
    }

    if let Some(seq) = payload.seq {
        sqlx::query("UPDATE questions SET seq = $1 WHERE id = $2")
            .bind(seq)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    Ok(Json(serde_json::json!({ "message": "Question updated" })))
}

/// Deletes a question.
pub async fn delete_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query(
        "DELETE FROM questions WHERE id = $1
         AND test_id IN (SELECT id FROM tests WHERE school_id = $2)",
    )
    .bind(id)
    .bind(claims.school_id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(Json(serde_json::json!({ "message": "Question deleted" })))
}

/// Publishes a news post to the school's feed. The HTML body is sanitized
/// before storage.
pub async fn create_news(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateNewsRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let body = clean_html(&payload.body);

    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO news_posts (school_id, title, body, image_url)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(claims.school_id)
    .bind(&payload.title)
    .bind(body)
    .bind(&payload.image_url)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create news post: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}
