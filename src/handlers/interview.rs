// src/handlers/interview.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::interview::{CreateInterviewRequest, Interview},
    utils::jwt::Claims,
};

/// Opening question used when the caller does not supply one. The engine
/// normally replaces it from its own question bank on the first turn.
const DEFAULT_FIRST_QUESTION: &str =
    "Tell me about yourself and your background as an engineer.";

/// Starts a new interview for the current user.
///
/// * Consumes one interview credit atomically; responds 402 when none are left.
/// * Creates an 'active' interview row with the opening question.
pub async fn create_interview(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateInterviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user_id = claims.user_id();

    // Decrement and insert must land together: a spent credit with no
    // interview row would be unrecoverable for the user.
    let mut tx = pool.begin().await?;

    // Guarded decrement: the WHERE clause makes credit consumption atomic,
    // so two concurrent starts cannot both spend the last credit.
    let updated = sqlx::query("UPDATE users SET credits = credits - 1 WHERE id = ? AND credits > 0")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::PaymentRequired(
            "You do not have enough credits.".to_string(),
        ));
    }

    let first_question = payload
        .first_question
        .unwrap_or_else(|| DEFAULT_FIRST_QUESTION.to_string());

    let interview = sqlx::query_as::<_, Interview>(
        r#"
        INSERT INTO interviews (user_id, first_question)
        VALUES (?, ?)
        RETURNING id, user_id, status, first_question, created_at
        "#,
    )
    .bind(user_id)
    .bind(&first_question)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create interview: {:?}", e);
        AppError::from(e)
    })?;

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "interview_id": interview.id,
            "first_question": interview.first_question,
            "status": interview.status
        })),
    ))
}

/// Lists the current user's interviews, newest first (dashboard view).
pub async fn list_interviews(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let interviews = sqlx::query_as::<_, Interview>(
        r#"
        SELECT id, user_id, status, first_question, created_at
        FROM interviews
        WHERE user_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(claims.user_id())
    .fetch_all(&pool)
    .await?;

    Ok(Json(interviews))
}

/// Fetches a single interview owned by the current user.
pub async fn get_interview(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let interview = fetch_owned(&pool, id, claims.user_id()).await?;

    Ok(Json(json!({ "interview": interview })))
}

/// Loads an interview, checking ownership. Another user's interview is
/// reported as 404 rather than 403 so IDs cannot be probed.
pub(crate) async fn fetch_owned(
    pool: &SqlitePool,
    interview_id: i64,
    user_id: i64,
) -> Result<Interview, AppError> {
    sqlx::query_as::<_, Interview>(
        r#"
        SELECT id, user_id, status, first_question, created_at
        FROM interviews
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(interview_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Interview not found".to_string()))
}
