use chrono::{Duration, Utc};
use jsonwebtoken::{errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::Config;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Token expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
    #[error("Token subject missing")]
    MissingSubject,
    #[error(transparent)]
    Encode(jsonwebtoken::errors::Error),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    pub exp: i64,
}

/// Signs a token for `email` that expires after the configured lifetime.
pub fn issue(config: &Config, email: &str) -> Result<String, Error> {
    let expires_at = Utc::now() + Duration::minutes(config.access_token_expire_minutes);
    encode(
        config,
        &Claims {
            sub: Some(email.to_owned()),
            exp: expires_at.timestamp(),
        },
    )
}

pub fn encode(config: &Config, claims: &Claims) -> Result<String, Error> {
    let algorithm = config.signing_algorithm().map_err(|_| Error::Invalid)?;
    jsonwebtoken::encode(
        &Header::new(algorithm),
        claims,
        &EncodingKey::from_secret(config.secret_key.as_bytes()),
    )
    .map_err(Error::Encode)
}

/// Checks signature and expiry and returns the subject (an email).
pub fn verify(config: &Config, token: &str) -> Result<String, Error> {
    let algorithm = config.signing_algorithm().map_err(|_| Error::Invalid)?;

    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret_key.as_bytes()),
        &Validation::new(algorithm),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => Error::Expired,
        _ => Error::Invalid,
    })?;

    data.claims
        .sub
        .filter(|sub| !sub.is_empty())
        .ok_or(Error::MissingSubject)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            secret_key: "test-secret".into(),
            ..Default::default()
        }
    }

    #[test]
    fn issued_token_verifies() {
        let config = config();
        let token = issue(&config, "a@x.com").unwrap();

        assert_eq!(verify(&config, &token).unwrap(), "a@x.com");
    }

    #[test]
    fn expired_token() {
        let config = config();
        let token = encode(
            &config,
            &Claims {
                sub: Some("a@x.com".into()),
                exp: (Utc::now() - Duration::hours(1)).timestamp(),
            },
        )
        .unwrap();

        assert!(matches!(verify(&config, &token), Err(Error::Expired)));
    }

    #[test]
    fn wrong_secret() {
        let token = issue(&config(), "a@x.com").unwrap();
        let other = Config {
            secret_key: "another-secret".into(),
            ..Default::default()
        };

        assert!(matches!(verify(&other, &token), Err(Error::Invalid)));
        assert!(matches!(verify(&other, "not-a-jwt"), Err(Error::Invalid)));
    }

    #[test]
    fn missing_subject() {
        let config = config();
        let token = encode(
            &config,
            &Claims {
                sub: None,
                exp: (Utc::now() + Duration::hours(1)).timestamp(),
            },
        )
        .unwrap();

        assert!(matches!(verify(&config, &token), Err(Error::MissingSubject)));
    }
}
