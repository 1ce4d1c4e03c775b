use std::{sync::OnceLock, time::Duration};

use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub tg_api_token: String,
    #[serde(default = "default_tg_api_url")]
    pub tg_api_url: String,

    // notes api
    #[serde(default = "default_backend_host")]
    pub backend_host: String,
    #[serde(default = "default_backend_port")]
    pub backend_port: u16,
    #[serde(default = "default_backend_timeout")]
    pub backend_timeout_secs: u64,

    #[serde(default = "default_dialogue_timeout")]
    pub dialogue_timeout_secs: u64,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    #[serde(default)]
    pub log_format: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Env(#[from] envy::Error),
    #[error("TG_API_TOKEN must not be empty")]
    MissingToken,
    #[error("configuration already initialized")]
    AlreadyInitialized,
}

fn default_tg_api_url() -> String {
    "https://api.telegram.org".into()
}

fn default_backend_host() -> String {
    "127.0.0.1".into()
}

fn default_backend_port() -> u16 {
    8000
}

fn default_backend_timeout() -> u64 {
    10
}

fn default_dialogue_timeout() -> u64 {
    600
}

fn default_poll_timeout() -> u64 {
    30
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Self>()?;
        if config.tg_api_token.trim().is_empty() {
            return Err(Error::MissingToken);
        }

        Ok(config)
    }

    pub fn backend_url(&self) -> String {
        format!("http://{}:{}", self.backend_host, self.backend_port)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    pub fn dialogue_timeout(&self) -> Duration {
        Duration::from_secs(self.dialogue_timeout_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.as_deref() == Some("json")
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// There is no usable default without a bot token, so the config must be loaded explicitly.
pub fn init() -> Result<&'static Config, Error> {
    let config = Config::from_env()?;
    CONFIG.set(config).map_err(|_| Error::AlreadyInitialized)?;
    CONFIG.get().ok_or(Error::AlreadyInitialized)
}
