use std::sync::OnceLock;

use jsonwebtoken::Algorithm;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(rename = "backend_host", default = "default_host")]
    pub host: String,
    #[serde(rename = "backend_port", default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database_url")]
    pub database_url: String,

    // tokens
    pub secret_key: String,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    #[serde(default = "default_token_lifetime")]
    pub access_token_expire_minutes: i64,

    #[serde(default)]
    pub log_format: Option<String>,

    // build
    #[serde(default = "default_local")]
    pub source: String,
    #[serde(default = "default_local")]
    pub git_commit: String,
    #[serde(default = "default_local")]
    pub pipeline_id: String,
    #[serde(default = "default_local")]
    pub version: String,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Env(#[from] envy::Error),
    #[error("SECRET_KEY must not be empty")]
    EmptySecret,
    #[error("unsupported signing algorithm '{0}', expected one of HS256, HS384, HS512")]
    Algorithm(String),
    #[error("configuration already initialized")]
    AlreadyInitialized,
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    8000
}

fn default_database_url() -> String {
    "notes.db".into()
}

fn default_algorithm() -> String {
    "HS256".into()
}

fn default_token_lifetime() -> i64 {
    30
}

fn default_local() -> String {
    "local".into()
}

#[cfg(test)]
impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_url: default_database_url(),
            secret_key: "test-secret".into(),
            algorithm: default_algorithm(),
            access_token_expire_minutes: default_token_lifetime(),
            log_format: None,
            source: default_local(),
            git_commit: default_local(),
            pipeline_id: default_local(),
            version: default_local(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::from_iter::<_, Self>(vars)?;
        if config.secret_key.trim().is_empty() {
            return Err(Error::EmptySecret);
        }
        config.signing_algorithm()?;

        Ok(config)
    }

    /// Only HMAC algorithms are usable with a shared secret.
    pub fn signing_algorithm(&self) -> Result<Algorithm, Error> {
        match self.algorithm.to_uppercase().as_str() {
            "HS256" => Ok(Algorithm::HS256),
            "HS384" => Ok(Algorithm::HS384),
            "HS512" => Ok(Algorithm::HS512),
            _ => Err(Error::Algorithm(self.algorithm.clone())),
        }
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.as_deref() == Some("json")
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Loads the environment once at start-up; later `config()` calls see the same value.
pub fn init() -> Result<&'static Config, Error> {
    let config = Config::from_env()?;
    CONFIG.set(config).map_err(|_| Error::AlreadyInitialized)?;
    Ok(config())
}

/// `init` has normally run by now. A config that fails to load is fatal here rather
/// than replaced with defaults.
#[cfg(not(test))]
pub fn config() -> &'static Config {
    CONFIG.get_or_init(|| match Config::from_env() {
        Ok(config) => config,
        Err(e) => panic!("invalid configuration: {e}"),
    })
}

#[cfg(test)]
pub fn config() -> &'static Config {
    config_override(|config| config)
}

#[cfg(test)]
pub fn config_override<F>(override_config: F) -> &'static Config
where
    F: FnOnce(Config) -> Config,
{
    CONFIG.get_or_init(|| override_config(Config::default()))
}
