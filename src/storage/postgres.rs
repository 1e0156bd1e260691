//! Postgres-backed collaborator implementations.
//!
//! Plain `sqlx::query` with binds; every statement runs under a `db.query`
//! span. The rotation compare-and-set is a conditional `UPDATE ... AND
//! revoked = FALSE` plus the replacement insert inside one transaction, so
//! concurrent exchanges of the same token serialize on the row and only
//! one commits the revoke-then-create transition.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::auth::ledger::{
    InsertTokenOutcome, NewRefreshToken, RefreshTokenRecord, RefreshTokenStore,
};
use crate::auth::origin::OriginFingerprint;
use crate::auth::roles::{Role, RoleSet};
use crate::auth::users::{InsertUserOutcome, NewUser, User, UserStore};

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn parse_roles(names: Vec<String>) -> Result<RoleSet> {
    names
        .iter()
        .map(|name| Role::parse(name).ok_or_else(|| anyhow!("unknown role in store: {name}")))
        .collect()
}

fn role_names(roles: &RoleSet) -> Vec<String> {
    roles.iter().map(|role| role.as_str().to_string()).collect()
}

#[derive(Clone, Debug)]
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> Result<User> {
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        mobile: row.get("mobile"),
        roles: parse_roles(row.get("roles"))?,
    })
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = "SELECT id, email, password_hash, mobile, roles FROM users WHERE email = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by email")?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let query = "SELECT id, email, password_hash, mobile, roles FROM users WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by id")?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn insert(&self, user: NewUser) -> Result<InsertUserOutcome> {
        let query = r"
            INSERT INTO users (email, password_hash, mobile, roles)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, password_hash, mobile, roles
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.mobile)
            .bind(role_names(&user.roles))
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(row) => Ok(InsertUserOutcome::Created(user_from_row(&row)?)),
            Err(err) if is_unique_violation(&err) => Ok(InsertUserOutcome::EmailTaken),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    async fn update_roles(&self, id: Uuid, roles: RoleSet) -> Result<bool> {
        let query = "UPDATE users SET roles = $2 WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .bind(role_names(&roles))
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update roles")?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Clone, Debug)]
pub struct PostgresRefreshTokenStore {
    pool: PgPool,
}

impl PostgresRefreshTokenStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record_from_row(row: &sqlx::postgres::PgRow) -> RefreshTokenRecord {
    RefreshTokenRecord {
        token_hash: row.get("token_hash"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
        revoked: row.get("revoked"),
        origin: OriginFingerprint::new(row.get("origin_address"), row.get("origin_agent")),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl RefreshTokenStore for PostgresRefreshTokenStore {
    async fn insert(&self, token: NewRefreshToken) -> Result<InsertTokenOutcome> {
        let query = r"
            INSERT INTO refresh_tokens
                (token_hash, user_id, expires_at, revoked, origin_address, origin_agent, created_at)
            VALUES ($1, $2, $3, FALSE, $4, $5, $6)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(&token.token_hash)
            .bind(token.user_id)
            .bind(token.expires_at)
            .bind(&token.origin.address)
            .bind(&token.origin.agent)
            .bind(token.created_at)
            .execute(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(_) => Ok(InsertTokenOutcome::Inserted),
            Err(err) if is_unique_violation(&err) => Ok(InsertTokenOutcome::DuplicateToken),
            Err(err) => Err(err).context("failed to insert refresh token"),
        }
    }

    async fn find(&self, token_hash: &[u8]) -> Result<Option<RefreshTokenRecord>> {
        let query = r"
            SELECT token_hash, user_id, expires_at, revoked, origin_address, origin_agent, created_at
            FROM refresh_tokens
            WHERE token_hash = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup refresh token")?;
        Ok(row.as_ref().map(record_from_row))
    }

    async fn rotate(&self, token_hash: &[u8], replacement: NewRefreshToken) -> Result<bool> {
        let mut tx = self.pool.begin().await.context("begin rotate transaction")?;

        // Conditional revoke: succeeds only if the row was still active.
        let query = r"
            UPDATE refresh_tokens
            SET revoked = TRUE
            WHERE token_hash = $1 AND revoked = FALSE
            RETURNING token_hash
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let won = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&mut *tx)
            .instrument(span)
            .await
            .context("failed to revoke refresh token for rotation")?
            .is_some();

        if !won {
            tx.rollback().await.context("rollback lost rotation")?;
            return Ok(false);
        }

        let query = r"
            INSERT INTO refresh_tokens
                (token_hash, user_id, expires_at, revoked, origin_address, origin_agent, created_at)
            VALUES ($1, $2, $3, FALSE, $4, $5, $6)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(&replacement.token_hash)
            .bind(replacement.user_id)
            .bind(replacement.expires_at)
            .bind(&replacement.origin.address)
            .bind(&replacement.origin.agent)
            .bind(replacement.created_at)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to insert rotated refresh token")?;

        tx.commit().await.context("commit rotate transaction")?;
        Ok(true)
    }

    async fn revoke(&self, token_hash: &[u8]) -> Result<()> {
        // Idempotent: zero rows affected is fine.
        let query = "UPDATE refresh_tokens SET revoked = TRUE WHERE token_hash = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(token_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to revoke refresh token")?;
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64> {
        let query = r"
            UPDATE refresh_tokens
            SET revoked = TRUE
            WHERE user_id = $1 AND revoked = FALSE
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to revoke all refresh tokens")?;
        Ok(result.rows_affected())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let query = "DELETE FROM refresh_tokens WHERE expires_at <= $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(now)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to sweep expired refresh tokens")?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_round_trip() {
        let roles = RoleSet::from([Role::User, Role::Manager]);
        let names = role_names(&roles);
        assert_eq!(names, vec!["user".to_string(), "manager".to_string()]);
        assert_eq!(parse_roles(names).unwrap(), roles);
    }

    #[test]
    fn unknown_role_names_are_rejected() {
        assert!(parse_roles(vec!["superuser".to_string()]).is_err());
    }
}
