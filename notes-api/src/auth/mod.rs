mod backend;
mod handlers;
pub mod password;
mod routes;
pub mod token;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use backend::{authenticate, parse_telegram_id, Credentials, ACCESS_TOKEN_COOKIE, TELEGRAM_ID_HEADER};
pub use routes::router;

use crate::{Error, Result};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RegisterUser {
    pub email: String,
    pub password: String,
}

impl RegisterUser {
    pub fn validate(self) -> Result<Self> {
        let email = self.email.trim().to_owned();
        let Some((local, domain)) = email.split_once('@') else {
            return Err(Error::Validation("email must be a valid address".into()));
        };
        if local.is_empty() || domain.is_empty() || email.contains(char::is_whitespace) {
            return Err(Error::Validation("email must be a valid address".into()));
        }
        if self.password.is_empty() {
            return Err(Error::Validation("password must not be empty".into()));
        }

        Ok(Self {
            email,
            password: self.password,
        })
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct LoginUser {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".into(),
        }
    }
}
