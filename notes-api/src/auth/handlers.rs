use crate::{
    config::Config,
    db::{self, DB},
    users::{
        handlers::{create, find_one_by_email, find_one_by_telegram_id, CreateUserParameters},
        TelegramId, User,
    },
    Error, Result,
};

use super::{password, token, LoginUser, RegisterUser, TokenResponse};

pub async fn register_with_email(db: DB, args: RegisterUser) -> Result<User> {
    let RegisterUser { email, password } = args.validate()?;
    let hashed_password = password::hash(password).await?;

    let user = create(
        db,
        CreateUserParameters {
            email: Some(email.clone()),
            hashed_password: Some(hashed_password),
            telegram_id: None,
        },
    )
    .await
    .map_err(|e| e.conflict_message("User already exists"))?;

    tracing::info!(user_id = user.id, email = %email, "user registered");
    Ok(user)
}

pub async fn register_with_telegram(db: DB, telegram_id: TelegramId) -> Result<User> {
    let user = create(
        db,
        CreateUserParameters {
            email: None,
            hashed_password: None,
            telegram_id: Some(telegram_id),
        },
    )
    .await
    .map_err(|e| e.conflict_message("User with this Telegram ID already exists"))?;

    tracing::info!(user_id = user.id, telegram_id, "user registered via telegram");
    Ok(user)
}

pub async fn login(db: DB, config: &Config, LoginUser { email, password }: LoginUser) -> Result<TokenResponse> {
    let bad_credentials = || Error::BadCredentials("Invalid email or password".into());

    let user = find_one_by_email(db, email.trim().to_owned())
        .await
        .map_err(|e| match e {
            db::Error::NotFound(_) => bad_credentials(),
            e => e.into(),
        })?;

    let hashed_password = user.hashed_password.clone().ok_or_else(bad_credentials)?;
    if !password::verify(password, hashed_password).await? {
        tracing::warn!(user_id = user.id, "wrong password");
        return Err(bad_credentials());
    }
    if !user.is_active {
        return Err(Error::InactiveUser);
    }

    let email = user.email.as_deref().ok_or_else(bad_credentials)?;
    let access_token = token::issue(config, email)?;

    tracing::info!(user_id = user.id, "user logged in");
    Ok(TokenResponse::bearer(access_token))
}

/// The telegram path issues no token; it only confirms the id is bound to a user.
pub async fn login_with_telegram(db: DB, telegram_id: TelegramId) -> Result<User> {
    find_one_by_telegram_id(db, telegram_id).await.map_err(|e| match e {
        db::Error::NotFound(_) => Error::BadCredentials("Invalid Telegram ID".into()),
        e => e.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_test_db;

    fn register_args(email: &str, password: &str) -> RegisterUser {
        RegisterUser {
            email: email.into(),
            password: password.into(),
        }
    }

    fn login_args(email: &str, password: &str) -> LoginUser {
        LoginUser {
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn register_twice_conflicts() {
        let db = init_test_db().await.unwrap();

        let user = register_with_email(db.clone(), register_args("a@x.com", "p")).await.unwrap();
        assert_eq!(user.email.as_deref(), Some("a@x.com"));
        assert_ne!(user.hashed_password.as_deref(), Some("p"));

        let dup = register_with_email(db, register_args("a@x.com", "other")).await;
        assert!(matches!(dup, Err(Error::Conflict(msg)) if msg == "User already exists"));
    }

    #[tokio::test]
    async fn register_validates_input() {
        let db = init_test_db().await.unwrap();

        let res = register_with_email(db.clone(), register_args("not-an-email", "p")).await;
        assert!(matches!(res, Err(Error::Validation(_))));

        let res = register_with_email(db, register_args("a@x.com", "")).await;
        assert!(matches!(res, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn login_issues_token_for_email() {
        let db = init_test_db().await.unwrap();
        let config = Config::default();
        register_with_email(db.clone(), register_args("a@x.com", "p")).await.unwrap();

        let res = login(db.clone(), &config, login_args("a@x.com", "p")).await.unwrap();
        assert_eq!(res.token_type, "bearer");
        assert_eq!(token::verify(&config, &res.access_token).unwrap(), "a@x.com");

        let wrong = login(db.clone(), &config, login_args("a@x.com", "nope")).await;
        assert!(matches!(wrong, Err(Error::BadCredentials(_))));

        let unknown = login(db, &config, login_args("b@x.com", "p")).await;
        assert!(matches!(unknown, Err(Error::BadCredentials(_))));
    }

    #[tokio::test]
    async fn telegram_registration_and_login() {
        let db = init_test_db().await.unwrap();

        let missing = login_with_telegram(db.clone(), 42).await;
        assert!(matches!(missing, Err(Error::BadCredentials(_))));

        let user = register_with_telegram(db.clone(), 42).await.unwrap();
        assert_eq!(user.telegram_id, Some(42));
        assert_eq!(user.email, None);

        let dup = register_with_telegram(db.clone(), 42).await;
        assert!(matches!(dup, Err(Error::Conflict(_))));

        let found = login_with_telegram(db, 42).await.unwrap();
        assert_eq!(found.id, user.id);
    }
}
