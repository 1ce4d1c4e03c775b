use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;

use crate::{
    config::Config,
    errors::{Error, Result},
};

pub type ChatId = i64;
pub type UserId = i64;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: ChatId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BotCommand {
    pub command: String,
    pub description: String,
}

impl BotCommand {
    pub fn new(command: &str, description: &str) -> Self {
        Self {
            command: command.into(),
            description: description.into(),
        }
    }
}

/// Minimal Bot API client: long polling plus the two calls the bot needs.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
    poll_timeout_secs: u64,
}

impl TelegramClient {
    pub fn new(config: &Config) -> Result<Self> {
        // the HTTP timeout has to outlive the long poll itself
        let client = Client::builder()
            .timeout(config.poll_timeout() + config.backend_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}", config.tg_api_url.trim_end_matches('/'), config.tg_api_token),
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }

    async fn call<P, T>(&self, method: &str, params: &P) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .json(params)
            .send()
            .await?
            .json::<ApiResponse<T>>()
            .await?;

        match response {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(Error::Telegram(
                description.unwrap_or_else(|| format!("{method} failed")),
            )),
        }
    }

    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": self.poll_timeout_secs,
                "allowed_updates": ["message"],
            }),
        )
        .await
    }

    pub async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.call::<_, Message>("sendMessage", &json!({ "chat_id": chat_id, "text": text }))
            .await
            .map(|_| ())
    }

    pub async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<()> {
        self.call::<_, bool>("setMyCommands", &json!({ "commands": commands }))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_updates() {
        let body = r#"{
            "ok": true,
            "result": [
                {
                    "update_id": 10,
                    "message": {
                        "message_id": 1,
                        "date": 0,
                        "chat": { "id": 42, "type": "private" },
                        "from": { "id": 42, "is_bot": false, "first_name": "A" },
                        "text": "/start"
                    }
                },
                { "update_id": 11, "edited_message": {} }
            ]
        }"#;

        let response = serde_json::from_str::<ApiResponse<Vec<Update>>>(body).unwrap();
        let updates = response.result.unwrap();

        assert_eq!(updates.len(), 2);
        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, 42);
        assert_eq!(message.from.as_ref().unwrap().id, 42);
        assert_eq!(message.text.as_deref(), Some("/start"));
        assert!(updates[1].message.is_none());
    }

    #[test]
    fn parses_api_errors() {
        let body = r#"{ "ok": false, "error_code": 401, "description": "Unauthorized" }"#;

        let response = serde_json::from_str::<ApiResponse<Vec<Update>>>(body).unwrap();
        assert!(!response.ok);
        assert_eq!(response.description.as_deref(), Some("Unauthorized"));
    }
}
