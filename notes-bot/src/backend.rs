use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    errors::{Error, Result},
    telegram::UserId,
};

pub const TELEGRAM_ID_HEADER: &str = "telegram-id";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Account {
    pub id: i64,
    pub telegram_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tag {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

/// The notes API as seen by one bot user. Every call acts as the given telegram user.
#[async_trait]
pub trait NotesBackend: Send + Sync {
    /// `None` when no account is bound to this telegram id.
    async fn login(&self, telegram_id: UserId) -> Result<Option<Account>>;

    async fn register(&self, telegram_id: UserId) -> Result<Account>;

    async fn list_notes(&self, telegram_id: UserId) -> Result<Vec<Note>>;

    async fn create_note(&self, telegram_id: UserId, note: NewNote) -> Result<Note>;

    async fn search_notes(&self, telegram_id: UserId, tags: &[String]) -> Result<Vec<Note>>;
}

pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder().timeout(config.backend_timeout()).build()?;

        Ok(Self {
            client,
            base_url: config.backend_url(),
        })
    }

    fn request(&self, method: fn(&Client, String) -> RequestBuilder, path: &str, telegram_id: UserId) -> RequestBuilder {
        method(&self.client, format!("{}{path}", self.base_url)).header(TELEGRAM_ID_HEADER, telegram_id.to_string())
    }
}

/// Anything but a 2xx is a failure; its kind does not matter to the bot.
fn success(response: Response) -> Result<Response> {
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Status(status));
    }
    Ok(response)
}

#[async_trait]
impl NotesBackend for HttpBackend {
    async fn login(&self, telegram_id: UserId) -> Result<Option<Account>> {
        let response = self
            .request(Client::post, "/auth/login/telegram", telegram_id)
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::debug!(telegram_id, status = %response.status(), "telegram login refused");
            return Ok(None);
        }
        Ok(Some(response.json().await?))
    }

    async fn register(&self, telegram_id: UserId) -> Result<Account> {
        let response = self
            .request(Client::post, "/auth/register/telegram", telegram_id)
            .send()
            .await?;

        Ok(success(response)?.json().await?)
    }

    async fn list_notes(&self, telegram_id: UserId) -> Result<Vec<Note>> {
        let response = self.request(Client::get, "/notes", telegram_id).send().await?;

        Ok(success(response)?.json().await?)
    }

    async fn create_note(&self, telegram_id: UserId, note: NewNote) -> Result<Note> {
        let response = self
            .request(Client::post, "/notes", telegram_id)
            .json(&note)
            .send()
            .await?;

        Ok(success(response)?.json().await?)
    }

    async fn search_notes(&self, telegram_id: UserId, tags: &[String]) -> Result<Vec<Note>> {
        let query: Vec<(&str, &str)> = tags.iter().map(|tag| ("tags", tag.as_str())).collect();
        let response = self
            .request(Client::get, "/notes/search", telegram_id)
            .query(&query)
            .send()
            .await?;

        Ok(success(response)?.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        matchers::{body_json, header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    fn backend(server: &MockServer) -> HttpBackend {
        let address = server.address();
        let config = Config {
            tg_api_token: "token".into(),
            tg_api_url: "http://127.0.0.1:1".into(),
            backend_host: address.ip().to_string(),
            backend_port: address.port(),
            backend_timeout_secs: 5,
            dialogue_timeout_secs: 600,
            poll_timeout_secs: 30,
            log_format: None,
        };
        HttpBackend::new(&config).unwrap()
    }

    #[tokio::test]
    async fn search_sends_identity_and_repeated_tags() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/notes/search"))
            .and(header(TELEGRAM_ID_HEADER, "7"))
            .and(query_param("tags", "x"))
            .and(query_param("tags", "y"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "title": "T", "content": "C", "user_id": 1, "tags": [{"id": 1, "name": "x"}]}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let notes = backend(&server).search_notes(7, &["x".into(), "y".into()]).await.unwrap();
        assert_eq!(notes[0].tags, [Tag { name: "x".into() }]);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests[0].url.query(), Some("tags=x&tags=y"));
    }

    #[tokio::test]
    async fn create_posts_the_note_as_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notes"))
            .and(header(TELEGRAM_ID_HEADER, "7"))
            .and(body_json(json!({"title": "T", "content": "C", "tags": ["x"]})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!(
                {"id": 3, "title": "T", "content": "C", "user_id": 1, "tags": [{"id": 1, "name": "x"}]}
            )))
            .expect(1)
            .mount(&server)
            .await;

        let note = NewNote {
            title: "T".into(),
            content: "C".into(),
            tags: vec!["x".into()],
        };
        assert_eq!(backend(&server).create_note(7, note).await.unwrap().id, 3);
    }

    #[tokio::test]
    async fn non_success_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/register/telegram"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "conflict"})))
            .mount(&server)
            .await;

        let res = backend(&server).register(7).await;
        assert!(matches!(res, Err(Error::Status(status)) if status == 400));
    }

    #[tokio::test]
    async fn refused_login_means_unknown_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login/telegram"))
            .and(header(TELEGRAM_ID_HEADER, "7"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "bad_credentials"})))
            .mount(&server)
            .await;

        assert_eq!(backend(&server).login(7).await.unwrap(), None);
    }
}
