// src/handlers/conversation.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    handlers::interview::fetch_owned,
    models::conversation::ConversationRecord,
    transcript,
    utils::jwt::Claims,
};

/// Stores or replaces the conversation record for an interview.
///
/// The interview engine pushes the full nested record here after each turn.
/// The body must deserialize as a ConversationRecord, but the raw JSON is
/// stored verbatim so fields this service does not model survive the
/// round-trip. When the record carries the completion sentinel the
/// interview is marked 'completed'.
pub async fn upsert_conversation(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(interview_id): Path<i64>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, AppError> {
    let interview = fetch_owned(&pool, interview_id, claims.user_id()).await?;

    let record: ConversationRecord = serde_json::from_value(body.clone())?;

    // Payload and status flip land together so a stored finished record is
    // never visible alongside a still-'active' interview.
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO conversations (interview_id, payload, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(interview_id) DO UPDATE SET
            payload = excluded.payload,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(interview.id)
    .bind(body.to_string())
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to upsert conversation: {:?}", e);
        AppError::from(e)
    })?;

    if record.is_finished() && interview.status != "completed" {
        sqlx::query("UPDATE interviews SET status = 'completed' WHERE id = ?")
            .bind(interview.id)
            .execute(&mut *tx)
            .await?;
        tracing::info!("Interview {} completed", interview.id);
    }

    tx.commit().await?;

    Ok(Json(json!({ "conversation": body })))
}

/// Returns the stored conversation record as the engine produced it.
pub async fn get_conversation(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(interview_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let interview = fetch_owned(&pool, interview_id, claims.user_id()).await?;
    let payload = fetch_payload(&pool, interview.id).await?;

    let value: serde_json::Value = serde_json::from_str(&payload)
        .map_err(|e| AppError::InternalServerError(format!("Corrupt stored record: {}", e)))?;

    Ok(Json(json!({ "conversation": value })))
}

/// Returns the flattened, display-ready transcript for an interview.
///
/// This is what both the live chat screen (resuming mid-session) and the
/// read-only past-interview viewer render. The transcript is derived on
/// every call; nothing about it is persisted.
pub async fn get_transcript(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(interview_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let interview = fetch_owned(&pool, interview_id, claims.user_id()).await?;
    let payload = fetch_payload(&pool, interview.id).await?;

    let record: ConversationRecord = serde_json::from_str(&payload)
        .map_err(|e| AppError::InternalServerError(format!("Corrupt stored record: {}", e)))?;

    let entries = transcript::flatten(&record);

    Ok(Json(json!({
        "interview_id": interview.id,
        "status": interview.status,
        "transcript": entries
    })))
}

async fn fetch_payload(pool: &SqlitePool, interview_id: i64) -> Result<String, AppError> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT payload FROM conversations WHERE interview_id = ?")
            .bind(interview_id)
            .fetch_optional(pool)
            .await?;

    row.map(|(payload,)| payload)
        .ok_or(AppError::NotFound("Conversation not found".to_string()))
}
