//! The refresh-token ledger: record types, token generation, and the
//! storage seam with its atomic rotation guard.
//!
//! Raw token strings are 128-bit random values handed to the client once;
//! the ledger persists only a SHA-256 hash. A revoked row is never
//! reactivated or rewritten: it stays behind as a tombstone so a later
//! presentation of the same token is recognizable as reuse.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::origin::OriginFingerprint;

/// A persisted refresh-token row.
#[derive(Clone, Debug)]
pub struct RefreshTokenRecord {
    pub token_hash: Vec<u8>,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub origin: OriginFingerprint,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A row about to be inserted (always active).
#[derive(Clone, Debug)]
pub struct NewRefreshToken {
    pub token_hash: Vec<u8>,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub origin: OriginFingerprint,
    pub created_at: DateTime<Utc>,
}

/// Outcome of inserting a new row; collisions on the token hash are
/// surfaced so the caller can retry with a fresh token.
#[derive(Debug)]
pub enum InsertTokenOutcome {
    Inserted,
    DuplicateToken,
}

/// Durable ledger of refresh credentials.
///
/// `rotate` is the concurrency-critical operation: it must revoke the old
/// row and insert the replacement atomically, and only if the old row is
/// still active. Two concurrent exchanges of one token must therefore see
/// exactly one `true` result.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert(&self, token: NewRefreshToken) -> Result<InsertTokenOutcome>;

    async fn find(&self, token_hash: &[u8]) -> Result<Option<RefreshTokenRecord>>;

    /// Compare-and-set rotation: mark `token_hash` revoked if and only if
    /// it is still active, inserting `replacement` in the same transaction.
    /// Returns `false` (and inserts nothing) when the row was already
    /// revoked or missing.
    async fn rotate(&self, token_hash: &[u8], replacement: NewRefreshToken) -> Result<bool>;

    /// Idempotent single revoke; unknown or already-revoked tokens are a
    /// no-op.
    async fn revoke(&self, token_hash: &[u8]) -> Result<()>;

    /// Revoke every active token owned by `user_id`, returning how many
    /// rows changed.
    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64>;

    /// Delete rows whose expiry has passed, revoked or not. Safe to run
    /// concurrently with everything else: it only removes rows that can no
    /// longer win a verify or rotate.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Generate a raw refresh token: 128 bits from the OS RNG, base64url.
///
/// # Errors
///
/// Returns an error if the OS RNG fails.
pub fn generate_refresh_token() -> Result<String> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate refresh token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a refresh token so raw values never touch the database.
#[must_use]
pub fn hash_refresh_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}
