use axum::http::{header::AUTHORIZATION, HeaderMap};
use axum_extra::extract::CookieJar;

use crate::{
    config::Config,
    db::{self, DB},
    users::{
        handlers::{find_one_by_email, find_one_by_telegram_id},
        TelegramId, User,
    },
    Error, Result,
};

use super::token;

pub const TELEGRAM_ID_HEADER: &str = "telegram-id";
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// A credential presented by the caller, in resolution order.
#[derive(Debug, Clone, PartialEq)]
pub enum Credentials {
    /// Identity asserted by the bot channel; no secret involved.
    Telegram(TelegramId),
    Bearer(String),
    Cookie(String),
}

impl Credentials {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self> {
        if let Some(value) = headers.get(TELEGRAM_ID_HEADER) {
            return parse_telegram_id(value.to_str().unwrap_or_default()).map(Self::Telegram);
        }

        let bearer = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split_once(' '))
            .filter(|(scheme, token)| scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty())
            .map(|(_, token)| token.trim().to_owned());
        if let Some(token) = bearer {
            return Ok(Self::Bearer(token));
        }

        if let Some(cookie) = CookieJar::from_headers(headers).get(ACCESS_TOKEN_COOKIE) {
            return Ok(Self::Cookie(cookie.value().to_owned()));
        }

        Err(Error::Unauthenticated)
    }
}

pub fn parse_telegram_id(value: &str) -> Result<TelegramId> {
    value
        .trim()
        .parse::<TelegramId>()
        .map_err(|_| Error::InvalidCredentials("Invalid Telegram ID".into()))
}

/// Resolves credentials to an active user. Read-only, runs once per protected request.
pub async fn authenticate(db: DB, config: &Config, credentials: Credentials) -> Result<User> {
    let user = match credentials {
        Credentials::Telegram(telegram_id) => find_one_by_telegram_id(db, telegram_id)
            .await
            .map_err(|e| reject(e, "User not found"))?,
        Credentials::Bearer(token) | Credentials::Cookie(token) => {
            let email = token::verify(config, &token).inspect_err(|e| tracing::warn!("rejected token: {e}"))?;
            find_one_by_email(db, email)
                .await
                .map_err(|e| reject(e, "Invalid credentials"))?
        }
    };

    if !user.is_active {
        tracing::warn!(user_id = user.id, "inactive user rejected");
        return Err(Error::InactiveUser);
    }

    Ok(user)
}

fn reject(error: db::Error, message: &str) -> Error {
    match error {
        db::Error::NotFound(reason) => {
            tracing::warn!("{reason}");
            Error::InvalidCredentials(message.into())
        }
        error => error.into(),
    }
}
