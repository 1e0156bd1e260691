//! Role management: the hierarchy enforcer applied to the credential
//! store, plus the externally-invalidated role cache.
//!
//! Every operation takes an explicit acting [`Principal`] resolved at the
//! request boundary; there is no ambient "current caller" state. Role
//! mutations invalidate the cache synchronously before returning, since a
//! stale role-set read is a privilege-escalation risk (unlike the accepted
//! staleness of claims in already-issued access tokens).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use super::error::AuthError;
use super::roles::{self, Role, RoleSet};
use super::users::UserStore;

/// The authenticated caller, resolved once from a verified access token
/// and threaded through as a parameter.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: Uuid,
    pub roles: RoleSet,
}

impl Principal {
    #[must_use]
    pub fn holds(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// TTL'd cache of role sets keyed by user id.
///
/// Reads that miss or find a stale entry fall back to the store; any role
/// mutation must call [`RoleCache::invalidate`] before its operation
/// returns.
#[derive(Debug)]
pub struct RoleCache {
    entries: Mutex<HashMap<Uuid, (RoleSet, Instant)>>,
    ttl: Duration,
}

impl RoleCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn get(&self, user_id: Uuid) -> Option<RoleSet> {
        let entries = self.entries.lock().await;
        let (roles, cached_at) = entries.get(&user_id)?;
        if cached_at.elapsed() >= self.ttl {
            return None;
        }
        Some(roles.clone())
    }

    pub async fn put(&self, user_id: Uuid, roles: RoleSet) {
        let mut entries = self.entries.lock().await;
        entries.insert(user_id, (roles, Instant::now()));
    }

    pub async fn invalidate(&self, user_id: Uuid) {
        let mut entries = self.entries.lock().await;
        entries.remove(&user_id);
    }
}

/// Applies grant/revoke requests against the ladder rules and persists the
/// outcome.
pub struct RoleService {
    users: Arc<dyn UserStore>,
    cache: Arc<RoleCache>,
}

impl RoleService {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>, cache: Arc<RoleCache>) -> Self {
        Self { users, cache }
    }

    /// Read a role snapshot through the cache.
    ///
    /// # Errors
    ///
    /// `UserNotFound` if the user does not exist, `Storage` on store
    /// failure.
    pub async fn roles_snapshot(&self, user_id: Uuid) -> Result<RoleSet, AuthError> {
        if let Some(roles) = self.cache.get(user_id).await {
            return Ok(roles);
        }
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        self.cache.put(user_id, user.roles.clone()).await;
        Ok(user.roles)
    }

    /// Grant `role` to `target_id` on behalf of `actor`.
    ///
    /// # Errors
    ///
    /// `Forbidden` unless the actor holds `Admin`; otherwise the ladder
    /// violations from [`roles::check_grant`], `UserNotFound`, or
    /// `Storage`.
    pub async fn grant(
        &self,
        actor: &Principal,
        target_id: Uuid,
        role: Role,
    ) -> Result<RoleSet, AuthError> {
        self.apply(actor, target_id, role, RoleChange::Grant).await
    }

    /// Revoke `role` from `target_id` on behalf of `actor`.
    ///
    /// A revoke of a never-held role fails with `RoleNotHeld` instead of
    /// silently succeeding.
    ///
    /// # Errors
    ///
    /// As [`RoleService::grant`], with [`roles::check_revoke`] violations.
    pub async fn revoke(
        &self,
        actor: &Principal,
        target_id: Uuid,
        role: Role,
    ) -> Result<RoleSet, AuthError> {
        self.apply(actor, target_id, role, RoleChange::Revoke).await
    }

    /// Convenience wrapper: grant `Admin`. Fails with `RoleAlreadyHeld`
    /// when the target already is one.
    ///
    /// # Errors
    ///
    /// As [`RoleService::grant`].
    pub async fn promote_to_admin(
        &self,
        actor: &Principal,
        target_id: Uuid,
    ) -> Result<RoleSet, AuthError> {
        self.grant(actor, target_id, Role::Admin).await
    }

    /// Convenience wrapper: revoke `Admin`.
    ///
    /// # Errors
    ///
    /// As [`RoleService::revoke`].
    pub async fn demote_from_admin(
        &self,
        actor: &Principal,
        target_id: Uuid,
    ) -> Result<RoleSet, AuthError> {
        self.revoke(actor, target_id, Role::Admin).await
    }

    async fn apply(
        &self,
        actor: &Principal,
        target_id: Uuid,
        role: Role,
        change: RoleChange,
    ) -> Result<RoleSet, AuthError> {
        if !actor.holds(Role::Admin) {
            return Err(AuthError::Forbidden);
        }

        let target = self
            .users
            .find_by_id(target_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let mut roles = target.roles;
        match change {
            RoleChange::Grant => {
                roles::check_grant(&roles, role)?;
                roles.insert(role);
            }
            RoleChange::Revoke => {
                roles::check_revoke(&roles, role)?;
                roles.remove(&role);
            }
        }

        if !self.users.update_roles(target_id, roles.clone()).await? {
            return Err(AuthError::UserNotFound);
        }
        // Invalidate before returning: the next snapshot read must see the
        // new set.
        self.cache.invalidate(target_id).await;

        info!(
            actor = %actor.user_id,
            target = %target_id,
            role = %role,
            change = change.as_str(),
            "role set updated"
        );
        Ok(roles)
    }
}

#[derive(Clone, Copy, Debug)]
enum RoleChange {
    Grant,
    Revoke,
}

impl RoleChange {
    fn as_str(self) -> &'static str {
        match self {
            Self::Grant => "grant",
            Self::Revoke => "revoke",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cache_returns_fresh_entries_only() {
        let cache = RoleCache::new(Duration::from_secs(60));
        let user = Uuid::new_v4();
        assert!(cache.get(user).await.is_none());

        cache.put(user, RoleSet::from([Role::User])).await;
        assert_eq!(cache.get(user).await, Some(RoleSet::from([Role::User])));

        cache.invalidate(user).await;
        assert!(cache.get(user).await.is_none());
    }

    #[tokio::test]
    async fn zero_ttl_cache_never_hits() {
        let cache = RoleCache::new(Duration::ZERO);
        let user = Uuid::new_v4();
        cache.put(user, RoleSet::from([Role::User])).await;
        assert!(cache.get(user).await.is_none());
    }
}
