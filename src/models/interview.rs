// src/models/interview.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'interviews' table in the database.
/// One row per interview session a user has started.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Interview {
    pub id: i64,
    pub user_id: i64,

    /// 'active' while the engine is still asking questions, 'completed'
    /// once the conversation record carries the completion sentinel.
    pub status: String,

    /// Opening question shown before any conversation record exists.
    pub first_question: String,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for starting a new interview. The opening question may be supplied
/// by the caller; otherwise a default is used.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct CreateInterviewRequest {
    #[validate(length(min = 1, max = 1000))]
    pub first_question: Option<String>,
}
