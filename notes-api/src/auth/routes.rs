use aide::OperationOutput;
use axum::{
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::{
    config::config,
    db::DB,
    openapi::{
        aide::{
            axum::{
                routing::{post, post_with},
                ApiRouter, IntoApiResponse,
            },
            NoApi,
        },
        Json,
    },
    state::AppState,
    users::{TelegramId, UserResponse},
    Error,
};

use super::{handlers, parse_telegram_id, LoginUser, RegisterUser, TokenResponse, ACCESS_TOKEN_COOKIE, TELEGRAM_ID_HEADER};

pub fn router(state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/auth/register",
            post_with(register, |t| t.response::<201, Json<UserResponse>>()),
        )
        .api_route(
            "/auth/register/telegram",
            post_with(register_telegram, |t| t.response::<200, Json<UserResponse>>()),
        )
        .api_route(
            "/auth/login",
            post_with(login, |t| t.response::<200, Json<TokenResponse>>()),
        )
        .api_route("/auth/login/telegram", post(login_telegram))
        .with_state(state)
}

/// The `telegram-id` header of an enrollment request.
pub struct TelegramIdHeader(pub TelegramId);

impl<S> FromRequestParts<S> for TelegramIdHeader
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(TELEGRAM_ID_HEADER)
            .ok_or_else(|| Error::Validation(format!("missing '{TELEGRAM_ID_HEADER}' header")))?;

        let telegram_id = value
            .to_str()
            .map_err(|_| Error::Validation(format!("invalid '{TELEGRAM_ID_HEADER}' header")))
            .and_then(|v| parse_telegram_id(v).map_err(|_| Error::Validation(format!("invalid '{TELEGRAM_ID_HEADER}' header"))))?;

        Ok(Self(telegram_id))
    }
}

/// Token payload plus the httponly `access_token` cookie.
pub struct LoginResponse {
    jar: CookieJar,
    token: TokenResponse,
}

impl IntoResponse for LoginResponse {
    fn into_response(self) -> Response {
        (self.jar, Json(self.token)).into_response()
    }
}

impl OperationOutput for LoginResponse {
    type Inner = TokenResponse;
}

async fn register(State(db): State<DB>, Json(args): Json<RegisterUser>) -> impl IntoApiResponse {
    handlers::register_with_email(db, args)
        .await
        .map(|user| (StatusCode::CREATED, Json(UserResponse::from(user))))
}

async fn register_telegram(
    State(db): State<DB>,
    NoApi(TelegramIdHeader(telegram_id)): NoApi<TelegramIdHeader>,
) -> impl IntoApiResponse {
    handlers::register_with_telegram(db, telegram_id)
        .await
        .map(|user| Json(UserResponse::from(user)))
}

async fn login(State(db): State<DB>, Json(args): Json<LoginUser>) -> Result<LoginResponse, Error> {
    let token = handlers::login(db, config(), args).await?;

    let cookie = Cookie::build((ACCESS_TOKEN_COOKIE, token.access_token.clone()))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax);

    Ok(LoginResponse {
        jar: CookieJar::new().add(cookie),
        token,
    })
}

async fn login_telegram(
    State(db): State<DB>,
    NoApi(TelegramIdHeader(telegram_id)): NoApi<TelegramIdHeader>,
) -> impl IntoApiResponse {
    handlers::login_with_telegram(db, telegram_id)
        .await
        .map(|user| Json(UserResponse::from(user)))
}
