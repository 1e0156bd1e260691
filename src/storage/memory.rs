//! In-memory collaborator implementations.
//!
//! Used by the integration tests and for running the service without a
//! database. The rotation compare-and-set holds one lock across the
//! revoke-and-insert pair, which is the whole point: only one concurrent
//! exchange of a given token can observe it active.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth::ledger::{
    InsertTokenOutcome, NewRefreshToken, RefreshTokenRecord, RefreshTokenStore,
};
use crate::auth::roles::RoleSet;
use crate::auth::users::{InsertUserOutcome, NewUser, User, UserStore};

#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.lock().await;
        Ok(users.values().find(|user| user.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let users = self.users.lock().await;
        Ok(users.get(&id).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<InsertUserOutcome> {
        let mut users = self.users.lock().await;
        if users.values().any(|existing| existing.email == user.email) {
            return Ok(InsertUserOutcome::EmailTaken);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            mobile: user.mobile,
            roles: user.roles,
        };
        users.insert(user.id, user.clone());
        Ok(InsertUserOutcome::Created(user))
    }

    async fn update_roles(&self, id: Uuid, roles: RoleSet) -> Result<bool> {
        let mut users = self.users.lock().await;
        match users.get_mut(&id) {
            Some(user) => {
                user.roles = roles;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryRefreshTokenStore {
    records: Mutex<HashMap<Vec<u8>, RefreshTokenRecord>>,
}

impl MemoryRefreshTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count rows currently active for a user (test observability).
    pub async fn active_count(&self, user_id: Uuid) -> usize {
        let records = self.records.lock().await;
        records
            .values()
            .filter(|record| record.user_id == user_id && !record.revoked)
            .count()
    }

    /// Total row count, tombstones included (test observability).
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

fn activate(token: NewRefreshToken) -> RefreshTokenRecord {
    RefreshTokenRecord {
        token_hash: token.token_hash,
        user_id: token.user_id,
        expires_at: token.expires_at,
        revoked: false,
        origin: token.origin,
        created_at: token.created_at,
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn insert(&self, token: NewRefreshToken) -> Result<InsertTokenOutcome> {
        let mut records = self.records.lock().await;
        if records.contains_key(&token.token_hash) {
            return Ok(InsertTokenOutcome::DuplicateToken);
        }
        records.insert(token.token_hash.clone(), activate(token));
        Ok(InsertTokenOutcome::Inserted)
    }

    async fn find(&self, token_hash: &[u8]) -> Result<Option<RefreshTokenRecord>> {
        let records = self.records.lock().await;
        Ok(records.get(token_hash).cloned())
    }

    async fn rotate(&self, token_hash: &[u8], replacement: NewRefreshToken) -> Result<bool> {
        let mut records = self.records.lock().await;
        match records.get_mut(token_hash) {
            Some(record) if !record.revoked => {
                record.revoked = true;
            }
            _ => return Ok(false),
        }
        records.insert(replacement.token_hash.clone(), activate(replacement));
        Ok(true)
    }

    async fn revoke(&self, token_hash: &[u8]) -> Result<()> {
        let mut records = self.records.lock().await;
        if let Some(record) = records.get_mut(token_hash) {
            record.revoked = true;
        }
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64> {
        let mut records = self.records.lock().await;
        let mut revoked = 0;
        for record in records.values_mut() {
            if record.user_id == user_id && !record.revoked {
                record.revoked = true;
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| record.expires_at > now);
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::origin::OriginFingerprint;

    fn new_token(user_id: Uuid, hash: &[u8], ttl_seconds: i64) -> NewRefreshToken {
        let now = Utc::now();
        NewRefreshToken {
            token_hash: hash.to_vec(),
            user_id,
            expires_at: now + chrono::Duration::seconds(ttl_seconds),
            origin: OriginFingerprint::default(),
            created_at: now,
        }
    }

    #[tokio::test]
    async fn rotate_succeeds_once_per_token() {
        let store = MemoryRefreshTokenStore::new();
        let user = Uuid::new_v4();
        store.insert(new_token(user, b"old", 60)).await.unwrap();

        assert!(store.rotate(b"old", new_token(user, b"next-a", 60)).await.unwrap());
        assert!(!store.rotate(b"old", new_token(user, b"next-b", 60)).await.unwrap());

        // Loser's replacement was never inserted.
        assert!(store.find(b"next-b").await.unwrap().is_none());
        assert_eq!(store.active_count(user).await, 1);
    }

    #[tokio::test]
    async fn revoke_is_idempotent_and_tolerates_unknown_tokens() {
        let store = MemoryRefreshTokenStore::new();
        let user = Uuid::new_v4();
        store.insert(new_token(user, b"tok", 60)).await.unwrap();

        store.revoke(b"tok").await.unwrap();
        store.revoke(b"tok").await.unwrap();
        store.revoke(b"never-existed").await.unwrap();

        assert!(store.find(b"tok").await.unwrap().unwrap().revoked);
    }

    #[tokio::test]
    async fn revoked_rows_survive_as_tombstones_until_swept() {
        let store = MemoryRefreshTokenStore::new();
        let user = Uuid::new_v4();
        store.insert(new_token(user, b"tok", -1)).await.unwrap();
        store.revoke(b"tok").await.unwrap();

        // Still findable: reuse detection depends on the tombstone.
        assert!(store.find(b"tok").await.unwrap().is_some());

        let swept = store.sweep_expired(Utc::now()).await.unwrap();
        assert_eq!(swept, 1);
        assert!(store.find(b"tok").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sweep_removes_expired_regardless_of_revoked_state() {
        let store = MemoryRefreshTokenStore::new();
        let user = Uuid::new_v4();
        store.insert(new_token(user, b"expired", -10)).await.unwrap();
        store.insert(new_token(user, b"live", 600)).await.unwrap();

        assert_eq!(store.sweep_expired(Utc::now()).await.unwrap(), 1);
        assert_eq!(store.len().await, 1);
        assert!(store.find(b"live").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_token_hash_is_reported() {
        let store = MemoryRefreshTokenStore::new();
        let user = Uuid::new_v4();
        store.insert(new_token(user, b"tok", 60)).await.unwrap();
        assert!(matches!(
            store.insert(new_token(user, b"tok", 60)).await.unwrap(),
            InsertTokenOutcome::DuplicateToken
        ));
    }

    #[tokio::test]
    async fn user_store_enforces_email_uniqueness() {
        let store = MemoryUserStore::new();
        let user = NewUser {
            email: "a@example.com".to_string(),
            password_hash: "hash".to_string(),
            mobile: None,
            roles: crate::auth::roles::initial_roles(),
        };
        assert!(matches!(
            store.insert(user.clone()).await.unwrap(),
            InsertUserOutcome::Created(_)
        ));
        assert!(matches!(
            store.insert(user).await.unwrap(),
            InsertUserOutcome::EmailTaken
        ));
    }
}
