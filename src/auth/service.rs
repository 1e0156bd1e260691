//! Session rotation service: login, refresh exchange, logout, and the
//! theft response.
//!
//! Refresh tokens are single-use. A successful exchange revokes the
//! presented token and issues a replacement in one atomic store operation;
//! any later presentation of the old token is treated as an incident, not
//! a retry, and revokes every session the owner has.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::access_token::AccessTokenIssuer;
use super::clock::Clock;
use super::config::AuthConfig;
use super::error::AuthError;
use super::ledger::{
    InsertTokenOutcome, NewRefreshToken, RefreshTokenRecord, RefreshTokenStore,
    generate_refresh_token, hash_refresh_token,
};
use super::notify::{IncidentNotifier, spawn_replay_notification, spawn_revocation_notification};
use super::origin::{self, OriginFingerprint, OriginPolicy};
use super::role_service::{Principal, RoleCache};
use super::roles::{RoleSet, initial_roles};
use super::users::{
    InsertUserOutcome, NewUser, User, UserStore, dummy_password_hash, hash_password,
    normalize_email, valid_email, verify_password,
};

const TOKEN_INSERT_ATTEMPTS: usize = 3;

/// What a successful login or refresh returns: both credentials plus the
/// access-token TTL so clients know when to come back.
#[derive(Clone, Debug)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in_seconds: i64,
}

pub struct SessionService {
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn RefreshTokenStore>,
    notifier: Arc<dyn IncidentNotifier>,
    clock: Arc<dyn Clock>,
    role_cache: Arc<RoleCache>,
    issuer: Arc<AccessTokenIssuer>,
    config: AuthConfig,
    dummy_hash: String,
}

impl SessionService {
    /// # Errors
    ///
    /// Returns an error if the dummy credential hash cannot be prepared.
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn RefreshTokenStore>,
        notifier: Arc<dyn IncidentNotifier>,
        clock: Arc<dyn Clock>,
        role_cache: Arc<RoleCache>,
        issuer: Arc<AccessTokenIssuer>,
        config: AuthConfig,
    ) -> Result<Self> {
        let dummy_hash = dummy_password_hash()?;
        Ok(Self {
            users,
            tokens,
            notifier,
            clock,
            role_cache,
            issuer,
            config,
            dummy_hash,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Register a new user. The initial role set is always exactly `User`.
    ///
    /// # Errors
    ///
    /// `InvalidEmail` on a malformed address, `EmailTaken` on a duplicate
    /// (case-insensitive), `Storage` on store failure.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        mobile: Option<String>,
    ) -> Result<User, AuthError> {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(AuthError::InvalidEmail);
        }
        let password_hash = hash_password(password)?;
        let outcome = self
            .users
            .insert(NewUser {
                email,
                password_hash,
                mobile,
                roles: initial_roles(),
            })
            .await?;
        match outcome {
            InsertUserOutcome::Created(user) => {
                info!(user_id = %user.id, "user registered");
                Ok(user)
            }
            InsertUserOutcome::EmailTaken => Err(AuthError::EmailTaken),
        }
    }

    /// Authenticate credentials and open a session.
    ///
    /// The failure is opaque: unknown email and wrong password produce the
    /// same `BadCredentials`, and an unknown email still burns one argon2
    /// verification so latency does not reveal account existence.
    ///
    /// # Errors
    ///
    /// `BadCredentials` or `Storage`.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        origin: OriginFingerprint,
    ) -> Result<SessionTokens, AuthError> {
        let email = normalize_email(email);
        let user = match self.users.find_by_email(&email).await? {
            Some(user) => user,
            None => {
                let _ = verify_password(&self.dummy_hash, password);
                return Err(AuthError::BadCredentials);
            }
        };

        if !verify_password(&user.password_hash, password) {
            return Err(AuthError::BadCredentials);
        }

        self.role_cache.put(user.id, user.roles.clone()).await;
        let tokens = self.open_session(user.id, user.roles, origin).await?;
        info!(user_id = %user.id, "login succeeded");
        Ok(tokens)
    }

    /// Exchange a refresh token for a fresh pair, rotating the presented
    /// token away.
    ///
    /// # Errors
    ///
    /// - `TokenNotFound` — no ledger row for the presented token.
    /// - `TokenReplayDetected` — the token was already rotated away (or
    ///   lost a concurrent rotation race); every session of the owner has
    ///   been revoked and an incident notification dispatched.
    /// - `TokenExpired` — benign, the holder must log in again.
    /// - `OriginMismatch` — strict origin policy only.
    /// - `Storage` on store failure.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        origin: OriginFingerprint,
    ) -> Result<SessionTokens, AuthError> {
        let token_hash = hash_refresh_token(refresh_token);
        let record = self
            .tokens
            .find(&token_hash)
            .await?
            .ok_or(AuthError::TokenNotFound)?;

        // Ordered checks: revocation before expiry, so a rotated-then-aged
        // token still counts as reuse evidence.
        if record.revoked {
            return Err(self.handle_replay(&record, &origin).await?);
        }
        if record.is_expired(self.clock.now()) {
            return Err(AuthError::TokenExpired);
        }

        if !origin::matches(&record.origin, &origin, self.config.origin_policy()) {
            warn!(
                user_id = %record.user_id,
                recorded = %record.origin,
                presented = %origin,
                "refresh origin fingerprint diverged"
            );
            if self.config.origin_policy() == OriginPolicy::Strict {
                return Err(AuthError::OriginMismatch);
            }
        }

        let (replacement_raw, replacement) = self.prepare_replacement(record.user_id, &origin)?;
        if !self.tokens.rotate(&token_hash, replacement).await? {
            // Lost the race: someone else rotated this token first. From
            // the ledger's point of view this presentation is a reuse.
            return Err(self.handle_replay(&record, &origin).await?);
        }

        let roles = self.role_snapshot(record.user_id).await?;
        let access_token = self
            .issuer
            .issue(record.user_id, roles, self.clock.now())
            .context("failed to sign access token")?;

        Ok(SessionTokens {
            access_token,
            refresh_token: replacement_raw,
            expires_in_seconds: self.issuer.ttl_seconds(),
        })
    }

    /// Revoke the presented token. Idempotent: unknown, expired, and
    /// already-revoked tokens all succeed.
    ///
    /// # Errors
    ///
    /// `Storage` only.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let token_hash = hash_refresh_token(refresh_token);
        self.tokens.revoke(&token_hash).await?;
        Ok(())
    }

    /// Revoke every session of `user_id`, returning how many tokens were
    /// still active.
    ///
    /// # Errors
    ///
    /// `Storage` only.
    pub async fn revoke_all_sessions(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let revoked = self.tokens.revoke_all_for_user(user_id).await?;
        if revoked > 0 {
            spawn_revocation_notification(self.notifier.clone(), user_id, "requested");
        }
        info!(%user_id, revoked, "revoked all sessions");
        Ok(revoked)
    }

    /// Resolve a bearer access token into an acting principal.
    ///
    /// # Errors
    ///
    /// `TokenExpired` for an aged token, `BadCredentials` for anything
    /// else wrong with it.
    pub fn authenticate_access_token(&self, token: &str) -> Result<Principal, AuthError> {
        use super::access_token::Error as TokenError;
        match self.issuer.verify(token, self.clock.now()) {
            Ok(claims) => Ok(Principal {
                user_id: claims.sub,
                roles: claims.roles,
            }),
            Err(TokenError::Expired) => Err(AuthError::TokenExpired),
            Err(_) => Err(AuthError::BadCredentials),
        }
    }

    /// The theft response: mass-revoke the owner's sessions, then fail the
    /// request. Notifications are dispatched fire-and-forget after the
    /// revocation has committed, so a broken notifier cannot undo it.
    async fn handle_replay(
        &self,
        record: &RefreshTokenRecord,
        presented: &OriginFingerprint,
    ) -> Result<AuthError, AuthError> {
        warn!(
            user_id = %record.user_id,
            recorded = %record.origin,
            presented = %presented,
            "revoked refresh token presented again; revoking all sessions"
        );
        self.tokens.revoke_all_for_user(record.user_id).await?;
        spawn_replay_notification(self.notifier.clone(), record.user_id, presented.clone());
        spawn_revocation_notification(
            self.notifier.clone(),
            record.user_id,
            "refresh token replay",
        );
        Ok(AuthError::TokenReplayDetected)
    }

    /// Mint one refresh record + access token for a fresh session.
    async fn open_session(
        &self,
        user_id: Uuid,
        roles: RoleSet,
        origin: OriginFingerprint,
    ) -> Result<SessionTokens, AuthError> {
        let mut last_raw = None;
        for _ in 0..TOKEN_INSERT_ATTEMPTS {
            let (raw, record) = self.prepare_replacement(user_id, &origin)?;
            match self.tokens.insert(record).await? {
                InsertTokenOutcome::Inserted => {
                    last_raw = Some(raw);
                    break;
                }
                InsertTokenOutcome::DuplicateToken => {}
            }
        }
        let refresh_token = last_raw
            .ok_or_else(|| anyhow::anyhow!("failed to generate a unique refresh token"))?;

        let access_token = self
            .issuer
            .issue(user_id, roles, self.clock.now())
            .context("failed to sign access token")?;

        Ok(SessionTokens {
            access_token,
            refresh_token,
            expires_in_seconds: self.issuer.ttl_seconds(),
        })
    }

    /// Build a fresh active record bound to the request's fingerprint.
    fn prepare_replacement(
        &self,
        user_id: Uuid,
        origin: &OriginFingerprint,
    ) -> Result<(String, NewRefreshToken), AuthError> {
        let raw = generate_refresh_token()?;
        let now = self.clock.now();
        let record = NewRefreshToken {
            token_hash: hash_refresh_token(&raw),
            user_id,
            expires_at: now + chrono::Duration::seconds(self.config.refresh_token_ttl_seconds()),
            origin: origin.clone(),
            created_at: now,
        };
        Ok((raw, record))
    }

    /// Current role snapshot, read through the cache.
    async fn role_snapshot(&self, user_id: Uuid) -> Result<RoleSet, AuthError> {
        if let Some(roles) = self.role_cache.get(user_id).await {
            return Ok(roles);
        }
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        self.role_cache.put(user_id, user.roles.clone()).await;
        Ok(user.roles)
    }
}

impl std::fmt::Debug for SessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
