use axum::{
    extract::{Extension, FromRequestParts},
    http::request::Parts,
};
use axum_macros::FromRequestParts;

use crate::{
    auth::{authenticate, Credentials},
    config::config,
    users::{User, UserId},
    Error, DB,
};

/// Everything a protected handler needs: the authenticated caller and the database.
#[derive(Clone, FromRequestParts)]
pub struct BaseParams {
    pub ctx: Ctx,
    #[from_request(via(Extension))]
    pub db: DB,
}

impl BaseParams {
    pub fn new(db: DB, ctx: Ctx) -> Self {
        Self { db, ctx }
    }
}

#[derive(Clone, Debug)]
pub struct Ctx {
    pub user: User,
}

impl Ctx {
    pub fn new(user: User) -> Self {
        Self { user }
    }

    pub fn user_id(&self) -> UserId {
        self.user.id
    }
}

impl<S> FromRequestParts<S> for Ctx
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let db = parts
            .extensions
            .get::<DB>()
            .cloned()
            .ok_or_else(|| Error::Unexpected("database handle is not installed".into()))?;

        let credentials = Credentials::from_headers(&parts.headers)?;
        let user = authenticate(db, config(), credentials).await?;

        Ok(Self { user })
    }
}
