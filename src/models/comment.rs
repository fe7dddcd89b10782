use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A comment attached to one task of a dossier. `user_name` is denormalized
/// at creation time so renames and deactivations do not rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub dao_id: String,
    pub task_id: u32,
    pub user_id: String,
    pub user_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub dao_id: String,
    pub task_id: u32,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCommentRequest {
    pub content: String,
}
