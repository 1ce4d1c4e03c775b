use reqwest::StatusCode;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("telegram: {0}")]
    Telegram(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("notes api responded with {0}")]
    Status(StatusCode),
}
