use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type TelegramId = i64;

#[derive(Clone)]
pub struct User {
    pub id: UserId,
    pub email: Option<String>,
    pub hashed_password: Option<String>,
    pub is_active: bool,
    pub telegram_id: Option<TelegramId>,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("telegram_id", &self.telegram_id)
            .field("is_active", &self.is_active)
            .field("hashed_password", &"[redacted]")
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct UserResponse {
    pub id: UserId,
    pub email: Option<String>,
    pub telegram_id: Option<TelegramId>,
    pub is_active: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            telegram_id: user.telegram_id,
            is_active: user.is_active,
        }
    }
}

pub mod handlers;
