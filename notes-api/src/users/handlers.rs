use rusqlite::{named_params, Row};

use crate::db::{self, DB};

use super::*;

const USER_COLUMNS: &str = "id, email, hashed_password, is_active, telegram_id";

impl<'a> TryFrom<&Row<'a>> for User {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'a>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            hashed_password: row.get(2)?,
            is_active: row.get(3)?,
            telegram_id: row.get(4)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CreateUserParameters {
    pub email: Option<String>,
    pub hashed_password: Option<String>,
    pub telegram_id: Option<TelegramId>,
}

/// Fails with `db::Error::Conflict` when the email or telegram id is already bound.
pub async fn create(db: DB, args: CreateUserParameters) -> db::Result<User> {
    db.call(move |conn| {
        conn.query_row(
            &format!(
                r#"INSERT INTO users (email, hashed_password, telegram_id)
                VALUES (:email, :hashed_password, :telegram_id)
                RETURNING {USER_COLUMNS}"#
            ),
            named_params! {
                ":email": args.email,
                ":hashed_password": args.hashed_password,
                ":telegram_id": args.telegram_id,
            },
            |r| User::try_from(r),
        )
        .map_err(|e| e.into())
    })
    .await
    .map_err(db::Error::from)
    .map_err(|e| e.conflict_message("User already exists"))
}

pub async fn find_one_by_email(db: DB, email: String) -> db::Result<User> {
    let user_email = email.clone();
    db.call(move |conn| {
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"),
            [email],
            |r| User::try_from(r),
        )
        .map_err(|e| e.into())
    })
    .await
    .map_err(db::Error::from)
    .map_err(|e| e.not_found_message(format!("User '{user_email}' not found")))
}

pub async fn find_one_by_telegram_id(db: DB, telegram_id: TelegramId) -> db::Result<User> {
    db.call(move |conn| {
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE telegram_id = ?"),
            [telegram_id],
            |r| User::try_from(r),
        )
        .map_err(|e| e.into())
    })
    .await
    .map_err(db::Error::from)
    .map_err(|e| e.not_found_message(format!("User with telegram id {telegram_id} not found")))
}

pub async fn set_active(db: DB, user_id: UserId, is_active: bool) -> db::Result<User> {
    db.call(move |conn| {
        conn.query_row(
            &format!("UPDATE users SET is_active = ? WHERE id = ? RETURNING {USER_COLUMNS}"),
            rusqlite::params![is_active, user_id],
            |r| User::try_from(r),
        )
        .map_err(|e| e.into())
    })
    .await
    .map_err(db::Error::from)
    .map_err(|e| e.not_found_message(format!("User '{user_id}' not found")))
}

#[cfg(test)]
mod tests {
    use crate::db::init_test_db;

    use super::*;

    fn email_user(email: &str) -> CreateUserParameters {
        CreateUserParameters {
            email: Some(email.into()),
            hashed_password: Some("hash".into()),
            telegram_id: None,
        }
    }

    fn telegram_user(telegram_id: TelegramId) -> CreateUserParameters {
        CreateUserParameters {
            email: None,
            hashed_password: None,
            telegram_id: Some(telegram_id),
        }
    }

    #[tokio::test]
    async fn create_and_find_by_email() {
        let db = init_test_db().await.unwrap();
        let created = create(db.clone(), email_user("a@x.com")).await.unwrap();

        assert!(created.is_active);
        assert_eq!(created.telegram_id, None);

        let user = find_one_by_email(db, "a@x.com".into()).await.unwrap();
        assert_eq!(user.id, created.id);
        assert_eq!(user.hashed_password.as_deref(), Some("hash"));
    }

    #[tokio::test]
    async fn create_and_find_by_telegram_id() {
        let db = init_test_db().await.unwrap();
        let created = create(db.clone(), telegram_user(42)).await.unwrap();

        assert_eq!(created.email, None);
        assert_eq!(created.hashed_password, None);

        let user = find_one_by_telegram_id(db, 42).await.unwrap();
        assert_eq!(user.id, created.id);
    }

    #[tokio::test]
    async fn duplicate_identity_conflicts() {
        let db = init_test_db().await.unwrap();

        create(db.clone(), email_user("a@x.com")).await.unwrap();
        let dup = create(db.clone(), email_user("a@x.com")).await;
        assert!(matches!(dup, Err(db::Error::Conflict(_))));

        create(db.clone(), telegram_user(42)).await.unwrap();
        let dup = create(db, telegram_user(42)).await;
        assert!(matches!(dup, Err(db::Error::Conflict(_))));
    }

    #[tokio::test]
    async fn not_found() {
        let db = init_test_db().await.unwrap();

        let user = find_one_by_email(db.clone(), "a@x.com".into()).await;
        assert!(matches!(user, Err(db::Error::NotFound(_))));

        let user = find_one_by_telegram_id(db, 42).await;
        assert!(matches!(user, Err(db::Error::NotFound(_))));
    }

    #[tokio::test]
    async fn deactivate() {
        let db = init_test_db().await.unwrap();
        let user = create(db.clone(), telegram_user(42)).await.unwrap();

        let user = set_active(db, user.id, false).await.unwrap();
        assert!(!user.is_active);
    }
}
