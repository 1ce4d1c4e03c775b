use std::sync::{Arc, OnceLock};

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Request,
    },
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::QueryRejection;
use serde::Serialize;

use crate::{auth::token, db, error_responses};

pub use response::ErrorResponse;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not_found")]
    NotFound(String),

    // auth
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("invalid_credentials: {0}")]
    InvalidCredentials(String),
    #[error("inactive_user")]
    InactiveUser,
    #[error("bad_credentials: {0}")]
    BadCredentials(String),
    #[error("conflict: {0}")]
    Conflict(String),

    // validation
    #[error("validation: {0}")]
    Validation(String),
    #[error("validation")]
    JsonValidation(#[from] JsonRejection),
    #[error("validation")]
    QueryValidation(#[from] QueryRejection),
    #[error("validation")]
    PathValidation(#[from] PathRejection),

    #[error(transparent)]
    DB(db::Error),

    #[error("unexpected: {0}")]
    Unexpected(String),
}

impl From<db::Error> for Error {
    fn from(error: db::Error) -> Self {
        match error {
            db::Error::NotFound(msg) => Self::NotFound(msg),
            db::Error::Conflict(msg) => Self::Conflict(msg),
            error => Self::DB(error),
        }
    }
}

impl From<token::Error> for Error {
    fn from(error: token::Error) -> Self {
        match error {
            token::Error::Encode(err) => Self::Unexpected(err.to_string()),
            error => Self::InvalidCredentials(error.to_string()),
        }
    }
}

/// crate::Error <--> tokio_rusqlite::Error
///
/// Lets domain errors raised inside a `db.call` closure come back out unchanged.
pub mod db_mappers {
    use super::*;
    use crate::db::{rusqlite, tokio_rusqlite};

    impl From<tokio_rusqlite::Error> for Error {
        fn from(error: tokio_rusqlite::Error) -> Self {
            match error {
                tokio_rusqlite::Error::Other(err) => match err.downcast::<Error>() {
                    Ok(error) => *error,
                    Err(err) => Error::DB(tokio_rusqlite::Error::Other(err).into()),
                },
                error => Error::DB(error.into()).normalize(),
            }
        }
    }

    impl From<rusqlite::Error> for Error {
        fn from(error: rusqlite::Error) -> Self {
            Error::DB(error.into()).normalize()
        }
    }

    impl From<Error> for tokio_rusqlite::Error {
        fn from(error: Error) -> Self {
            tokio_rusqlite::Error::Other(error.into())
        }
    }

    impl Error {
        fn normalize(self) -> Self {
            match self {
                Error::DB(db::Error::NotFound(msg)) => Error::NotFound(msg),
                Error::DB(db::Error::Conflict(msg)) => Error::Conflict(msg),
                error => error,
            }
        }
    }
}

// Response

error_responses! {
    not_found: 404,
    validation: 400,
    json_validation: 400,
    query_validation: 400,
    path_validation: 400,
    conflict: 400,
    bad_credentials: 400,
    inactive_user: 400,
    unauthenticated: 401,
    invalid_credentials: 401,
    unexpected: 500
}

impl From<&Error> for ErrorResponse {
    fn from(error: &Error) -> Self {
        let errors = errors();
        match error {
            Error::NotFound(message) => errors.not_found.with_message(message),
            Error::Unauthenticated => errors.unauthenticated.with_message("Not authenticated"),
            Error::InvalidCredentials(message) => errors.invalid_credentials.with_message(message),
            Error::InactiveUser => errors.inactive_user.with_message("Inactive user"),
            Error::BadCredentials(message) => errors.bad_credentials.with_message(message),
            Error::Conflict(message) => errors.conflict.with_message(message),
            Error::Validation(message) => errors.validation.with_message(message),
            Error::JsonValidation(error) => errors.json_validation.with_message(error.body_text()),
            Error::QueryValidation(error) => errors.query_validation.with_message(error.to_string()),
            Error::PathValidation(error) => errors.path_validation.with_message(error.body_text()),
            Error::DB(_) | Error::Unexpected(_) => errors.unexpected.with_message("Unexpected"),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let error = Arc::new(self);

        let error_res = ErrorResponse::from(error.as_ref());
        let status = StatusCode::from_u16(error_res.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut res = axum::Json(error_res).into_response();
        res.extensions_mut().insert(error);

        *res.status_mut() = status;
        if status == StatusCode::UNAUTHORIZED {
            res.headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        res
    }
}

pub async fn on_error(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let error = response.extensions().get::<Arc<Error>>().map(Arc::as_ref);
    if let Some(error) = error {
        match error {
            Error::DB(_) | Error::Unexpected(_) => tracing::error!("{:?}", error),
            error => tracing::debug!("{:?}", error),
        }
    }

    response
}

mod response {
    use schemars::JsonSchema;

    use super::*;

    #[derive(Debug, Serialize, Clone, Default, JsonSchema)]
    pub struct ErrorResponse {
        pub error: String,
        pub message: Option<String>,
        pub status: u16,
    }

    impl ErrorResponse {
        pub fn new(error: impl Into<String>, status: u16) -> Self {
            Self {
                error: error.into(),
                status,
                ..Default::default()
            }
        }

        pub fn with_message(&self, message: impl Into<String>) -> Self {
            let mut res = self.clone();
            res.message = Some(message.into());
            res
        }
    }

    /// Typed responses, one per error code
    /// ```rust
    /// error_responses! {
    ///     not_found: 404,
    ///     unexpected: 500
    /// }
    ///
    /// impl From<&Error> for ErrorResponse {
    ///     fn from(error: &Error) -> Self {
    ///     let errors = errors(); // <- from macro
    ///     match error {
    ///         Error::NotFound(message) => errors.not_found.with_message(message),
    ///         Error::Unexpected(message) => errors.unexpected.with_message(message),
    ///     }
    /// }
    /// ```
    #[macro_export]
    macro_rules! error_responses {
        (
            $($name:ident: $code:expr),* $(,)?
        ) => {
            #[derive(Debug, Clone, Serialize)]
            struct Responses {
                $(
                    $name: ErrorResponse,
                )*
            }

            static ERRORS: OnceLock<Responses> = OnceLock::new();

            fn errors() -> &'static Responses {
                ERRORS.get_or_init(|| Responses {
                    $(
                        $name: ErrorResponse::new(stringify!($name), $code),
                    )*
                })
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_and_statuses() {
        let res = ErrorResponse::from(&Error::NotFound("Note not found".into()));
        assert_eq!(res.error, "not_found");
        assert_eq!(res.status, 404);
        assert_eq!(res.message.as_deref(), Some("Note not found"));

        let res = ErrorResponse::from(&Error::Unauthenticated);
        assert_eq!((res.error.as_str(), res.status), ("unauthenticated", 401));

        let res = ErrorResponse::from(&Error::Conflict("User already exists".into()));
        assert_eq!((res.error.as_str(), res.status), ("conflict", 400));
    }

    #[test]
    fn unauthorized_carries_challenge() {
        let res = Error::InvalidCredentials("Token expired".into()).into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.headers().get(WWW_AUTHENTICATE).unwrap(), "Bearer");
    }

    #[test]
    fn domain_errors_survive_db_calls() {
        let wrapped = db::tokio_rusqlite::Error::from(Error::NotFound("Note not found".into()));
        assert!(matches!(Error::from(wrapped), Error::NotFound(msg) if msg == "Note not found"));

        let missing = db::tokio_rusqlite::Error::Rusqlite(db::rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(Error::from(missing), Error::NotFound(_)));
    }
}
