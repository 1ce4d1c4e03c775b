use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::users::UserId;

pub type NoteId = i64;
pub type TagId = i64;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<Tag>,
}

/// Tags are global: one row per distinct name, shared by every user's notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
}

/// Request body of both create and update; an update replaces all three fields.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct NoteBody {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct SearchQuery {
    #[serde(default)]
    pub tags: Vec<String>,
}
