//! User records, the credential-store seam, and password hashing.

use anyhow::{Context, Result, anyhow};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Argon2, password_hash::rand_core::OsRng};
use async_trait::async_trait;
use regex::Regex;
use uuid::Uuid;

use super::roles::RoleSet;

/// A durable user record. Owned by the credential store; this core mutates
/// only the role set and never deletes users.
#[derive(Clone, Debug)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub mobile: Option<String>,
    pub roles: RoleSet,
}

/// Fields required to register a user. `email` must already be normalized.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub mobile: Option<String>,
    pub roles: RoleSet,
}

/// Outcome when persisting a new user; email uniqueness is decided by the
/// store so concurrent registrations cannot both win.
#[derive(Debug)]
pub enum InsertUserOutcome {
    Created(User),
    EmailTaken,
}

/// Credential store consumed by this core.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn insert(&self, user: NewUser) -> Result<InsertUserOutcome>;
    /// Replace the role set. Returns `false` when the user does not exist.
    async fn update_roles(&self, id: Uuid, roles: RoleSet) -> Result<bool>;
}

/// Normalize an email for lookup/uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
#[must_use]
pub fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Hash a password with argon2id and a fresh random salt.
///
/// # Errors
///
/// Returns an error if hashing fails.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored argon2 hash. Any parse or verify
/// failure is a mismatch.
#[must_use]
pub fn verify_password(stored_hash: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// A throwaway hash verified against when the email is unknown, so that
/// login latency does not reveal whether an account exists.
///
/// # Errors
///
/// Returns an error if hashing fails.
pub fn dummy_password_hash() -> Result<String> {
    hash_password("sesio-dummy-credential").context("failed to prepare dummy hash")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_normalization_lowers_and_trims() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn email_validation_rejects_garbage() {
        assert!(valid_email("alice@example.com"));
        assert!(!valid_email("alice@example"));
        assert!(!valid_email("not an email"));
        assert!(!valid_email(""));
    }

    #[test]
    fn password_round_trip() {
        let hash = hash_password("hunter2hunter2").expect("hash");
        assert!(verify_password(&hash, "hunter2hunter2"));
        assert!(!verify_password(&hash, "hunter3hunter3"));
    }

    #[test]
    fn corrupt_stored_hash_is_a_mismatch() {
        assert!(!verify_password("not-a-phc-string", "anything"));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let first = hash_password("same-password").expect("hash");
        let second = hash_password("same-password").expect("hash");
        assert_ne!(first, second);
    }
}
