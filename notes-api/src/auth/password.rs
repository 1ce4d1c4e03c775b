//! Argon2id password hashing for the email registration path.
//!
//! Hashes are stored as PHC strings (`$argon2id$v=19$...`), salt included.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::Error;

pub fn hash_password(password: &str) -> crate::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Unexpected(format!("Failed to hash password: {e}")))
}

/// `false` on mismatch; a malformed stored hash is an error.
pub fn verify_password(password: &str, hash: &str) -> crate::Result<bool> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| Error::Unexpected(format!("Invalid password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// [`hash_password`] on the blocking pool, off the request workers.
pub async fn hash(password: String) -> crate::Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| Error::Unexpected(e.to_string()))?
}

/// [`verify_password`] on the blocking pool.
pub async fn verify(password: String, hash: String) -> crate::Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| Error::Unexpected(e.to_string()))?
}
