// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{UpdateCreditsRequest, User},
};

/// Lists all users. Password hashes are skipped by the serializer.
pub async fn list_users(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, role, credits, created_at
        FROM users
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(users))
}

/// Sets a user's credit balance.
///
/// Manual top-up path: there is no payment provider integration, so an
/// operator grants credits here after a purchase is settled elsewhere.
pub async fn update_credits(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCreditsRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let updated = sqlx::query("UPDATE users SET credits = ? WHERE id = ?")
        .bind(payload.credits)
        .bind(id)
        .execute(&pool)
        .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!("Set credits of user {} to {}", id, payload.credits);

    Ok(Json(json!({ "id": id, "credits": payload.credits })))
}
