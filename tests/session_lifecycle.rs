//! Integration tests for the session lifecycle.
//!
//! This suite drives the real `SessionService` and `RoleService` over the
//! in-memory stores with a manually advanced clock:
//! 1. Register and log in, then verify the issued pair.
//! 2. Rotate refresh tokens and replay retired ones.
//! 3. Race concurrent exchanges of a single token.
//! 4. Age tokens past their expiry.
//! 5. Walk the role ladder end to end.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use secrecy::SecretString;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;
use uuid::Uuid;

use sesio::auth::{
    AccessTokenIssuer, AuthConfig, AuthError, Clock, IncidentNotifier, ManualClock,
    OriginFingerprint, OriginPolicy, Principal, RefreshTokenStore, Role, RoleCache, RoleService,
    RoleSet, SessionService, SessionTokens,
};
use sesio::storage::{MemoryRefreshTokenStore, MemoryUserStore};

const TEST_SECRET: &str = "0123456789abcdef0123456789abcdef";
const PASSWORD: &str = "correct horse battery staple";

/// Counts deliveries instead of delivering.
#[derive(Debug, Default)]
struct RecordingNotifier {
    replays: AtomicUsize,
    revocations: AtomicUsize,
}

#[async_trait]
impl IncidentNotifier for RecordingNotifier {
    async fn replay_detected(&self, _user_id: Uuid, _origin: &OriginFingerprint) -> Result<()> {
        self.replays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn all_sessions_revoked(&self, _user_id: Uuid, _reason: &str) -> Result<()> {
        self.revocations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    sessions: Arc<SessionService>,
    roles: RoleService,
    tokens: Arc<MemoryRefreshTokenStore>,
    clock: Arc<ManualClock>,
    notifier: Arc<RecordingNotifier>,
}

impl Harness {
    fn new(policy: OriginPolicy) -> Self {
        let config = AuthConfig::new()
            .with_access_token_ttl_seconds(900)
            .with_refresh_token_ttl_seconds(3600)
            .with_origin_policy(policy);

        let users = Arc::new(MemoryUserStore::new());
        let tokens = Arc::new(MemoryRefreshTokenStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let role_cache = Arc::new(RoleCache::new(Duration::from_secs(60)));
        let issuer = Arc::new(
            AccessTokenIssuer::new(
                SecretString::from(TEST_SECRET),
                config.token_issuer().to_string(),
                config.access_token_ttl_seconds(),
            )
            .expect("test secret is long enough"),
        );

        let sessions = Arc::new(
            SessionService::new(
                users.clone(),
                tokens.clone(),
                notifier.clone(),
                clock.clone(),
                role_cache.clone(),
                issuer,
                config,
            )
            .expect("service construction"),
        );
        let roles = RoleService::new(users, role_cache);

        Self {
            sessions,
            roles,
            tokens,
            clock,
            notifier,
        }
    }

    async fn signed_up(&self, email: &str) -> Uuid {
        self.sessions
            .register(email, PASSWORD, None)
            .await
            .expect("registration")
            .id
    }

    async fn logged_in(&self, email: &str) -> (Uuid, SessionTokens) {
        let id = self.signed_up(email).await;
        let tokens = self
            .sessions
            .login(email, PASSWORD, origin_a())
            .await
            .expect("login");
        (id, tokens)
    }

    /// Let fire-and-forget notification tasks run.
    async fn drain_notifications(&self) {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }
}

fn origin_a() -> OriginFingerprint {
    OriginFingerprint::new(Some("10.0.0.1".to_string()), Some("app/1.0".to_string()))
}

fn origin_b() -> OriginFingerprint {
    OriginFingerprint::new(Some("203.0.113.9".to_string()), Some("curl/8.5".to_string()))
}

fn admin_principal() -> Principal {
    Principal {
        user_id: Uuid::new_v4(),
        roles: RoleSet::from([Role::User, Role::Admin]),
    }
}

#[tokio::test]
async fn login_issues_a_verifiable_pair() {
    let h = Harness::new(OriginPolicy::Flexible);
    let (user_id, tokens) = h.logged_in("ada@example.com").await;

    assert_eq!(tokens.expires_in_seconds, 900);
    assert!(!tokens.refresh_token.is_empty());

    let principal = h
        .sessions
        .authenticate_access_token(&tokens.access_token)
        .expect("fresh access token verifies");
    assert_eq!(principal.user_id, user_id);
    assert!(principal.holds(Role::User));
    assert!(!principal.holds(Role::Admin));

    assert_eq!(h.tokens.active_count(user_id).await, 1);
}

#[tokio::test]
async fn login_failures_are_opaque() {
    let h = Harness::new(OriginPolicy::Flexible);
    h.signed_up("ada@example.com").await;

    let wrong_password = h
        .sessions
        .login("ada@example.com", "not the password", origin_a())
        .await;
    let unknown_email = h
        .sessions
        .login("nobody@example.com", PASSWORD, origin_a())
        .await;

    assert!(matches!(wrong_password, Err(AuthError::BadCredentials)));
    assert!(matches!(unknown_email, Err(AuthError::BadCredentials)));
}

#[tokio::test]
async fn duplicate_registration_is_rejected_case_insensitively() {
    let h = Harness::new(OriginPolicy::Flexible);
    h.signed_up("ada@example.com").await;

    let outcome = h.sessions.register("Ada@Example.COM", PASSWORD, None).await;
    assert!(matches!(outcome, Err(AuthError::EmailTaken)));
}

#[tokio::test]
async fn refresh_rotates_the_presented_token() {
    let h = Harness::new(OriginPolicy::Flexible);
    let (user_id, first) = h.logged_in("ada@example.com").await;

    let second = h
        .sessions
        .refresh(&first.refresh_token, origin_a())
        .await
        .expect("first exchange");
    assert_ne!(first.refresh_token, second.refresh_token);

    // One live session throughout: rotation retires, never accumulates.
    assert_eq!(h.tokens.active_count(user_id).await, 1);
}

#[tokio::test]
async fn replaying_a_rotated_token_revokes_everything() {
    let h = Harness::new(OriginPolicy::Flexible);
    let (user_id, first) = h.logged_in("ada@example.com").await;
    let second = h
        .sessions
        .refresh(&first.refresh_token, origin_a())
        .await
        .expect("first exchange");

    // The retired token comes back, possibly from a thief.
    let replay = h.sessions.refresh(&first.refresh_token, origin_b()).await;
    assert!(matches!(replay, Err(AuthError::TokenReplayDetected)));

    // Mass revocation took the legitimate replacement down with it.
    assert_eq!(h.tokens.active_count(user_id).await, 0);
    let follow_up = h.sessions.refresh(&second.refresh_token, origin_a()).await;
    assert!(matches!(follow_up, Err(AuthError::TokenReplayDetected)));

    h.drain_notifications().await;
    assert!(h.notifier.replays.load(Ordering::SeqCst) >= 1);
    assert!(h.notifier.revocations.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn concurrent_exchanges_produce_exactly_one_winner() {
    let h = Harness::new(OriginPolicy::Flexible);
    let (user_id, tokens) = h.logged_in("ada@example.com").await;
    let refresh_token = Arc::new(tokens.refresh_token);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let sessions = h.sessions.clone();
        let token = refresh_token.clone();
        tasks.push(tokio::spawn(async move {
            sessions.refresh(&token, origin_a()).await
        }));
    }

    let mut winners = 0;
    for task in tasks {
        match task.await.expect("task completion") {
            Ok(_) => winners += 1,
            Err(AuthError::TokenReplayDetected) => {}
            Err(other) => panic!("unexpected refresh failure: {other}"),
        }
    }
    assert_eq!(winners, 1);

    // Losers counted as reuse, so the whole account was revoked.
    assert_eq!(h.tokens.active_count(user_id).await, 0);
}

#[tokio::test]
async fn expired_refresh_is_benign() {
    let h = Harness::new(OriginPolicy::Flexible);
    let (user_id, aged) = h.logged_in("ada@example.com").await;
    let (_, fresh_user_tokens) = h.logged_in("bob@example.com").await;

    h.clock.advance_seconds(3601);
    let result = h.sessions.refresh(&aged.refresh_token, origin_a()).await;
    assert!(matches!(result, Err(AuthError::TokenExpired)));

    // Expiry is not an incident. Nothing else was revoked and nobody was
    // notified.
    assert_eq!(h.tokens.active_count(user_id).await, 1);
    h.drain_notifications().await;
    assert_eq!(h.notifier.replays.load(Ordering::SeqCst), 0);
    assert_eq!(h.notifier.revocations.load(Ordering::SeqCst), 0);

    // The other account is on the same clock, so its token aged out too.
    let other = h
        .sessions
        .refresh(&fresh_user_tokens.refresh_token, origin_b())
        .await;
    assert!(matches!(other, Err(AuthError::TokenExpired)));
}

#[tokio::test]
async fn access_tokens_expire_on_their_own_schedule() {
    let h = Harness::new(OriginPolicy::Flexible);
    let (_, tokens) = h.logged_in("ada@example.com").await;

    h.clock.advance_seconds(901);
    let result = h.sessions.authenticate_access_token(&tokens.access_token);
    assert!(matches!(result, Err(AuthError::TokenExpired)));
}

#[tokio::test]
async fn logout_is_idempotent() {
    let h = Harness::new(OriginPolicy::Flexible);
    let (user_id, tokens) = h.logged_in("ada@example.com").await;

    h.sessions.logout(&tokens.refresh_token).await.expect("logout");
    h.sessions.logout(&tokens.refresh_token).await.expect("repeat logout");
    h.sessions.logout("never-issued-token").await.expect("unknown token");

    assert_eq!(h.tokens.active_count(user_id).await, 0);
}

#[tokio::test]
async fn flexible_policy_tolerates_origin_drift() {
    let h = Harness::new(OriginPolicy::Flexible);
    let (_, tokens) = h.logged_in("ada@example.com").await;

    // Same agent from a new address: logged, not rejected.
    let drifted = OriginFingerprint::new(Some("10.9.9.9".to_string()), origin_a().agent);
    assert!(h.sessions.refresh(&tokens.refresh_token, drifted).await.is_ok());
}

#[tokio::test]
async fn strict_policy_rejects_origin_drift_without_revoking() {
    let h = Harness::new(OriginPolicy::Strict);
    let (user_id, tokens) = h.logged_in("ada@example.com").await;

    let result = h.sessions.refresh(&tokens.refresh_token, origin_b()).await;
    assert!(matches!(result, Err(AuthError::OriginMismatch)));

    // The token survives: a VPN hop should not brick the session, and the
    // next attempt from the recorded origin still works.
    assert_eq!(h.tokens.active_count(user_id).await, 1);
    assert!(h.sessions.refresh(&tokens.refresh_token, origin_a()).await.is_ok());
}

#[tokio::test]
async fn revoke_all_sessions_counts_only_active_tokens() {
    let h = Harness::new(OriginPolicy::Flexible);
    let (user_id, first) = h.logged_in("ada@example.com").await;
    let _second = h
        .sessions
        .login("ada@example.com", PASSWORD, origin_b())
        .await
        .expect("second login");
    h.sessions.logout(&first.refresh_token).await.expect("logout");

    let revoked = h
        .sessions
        .revoke_all_sessions(user_id)
        .await
        .expect("mass revoke");
    assert_eq!(revoked, 1);
    assert_eq!(h.tokens.active_count(user_id).await, 0);
}

#[tokio::test]
async fn role_ladder_is_enforced_rung_by_rung() {
    let h = Harness::new(OriginPolicy::Flexible);
    let target = h.signed_up("ada@example.com").await;
    let admin = admin_principal();

    // Manager requires employee (or manager) first.
    let skipped = h.roles.grant(&admin, target, Role::Manager).await;
    assert!(matches!(skipped, Err(AuthError::HierarchyViolation(Role::Manager))));

    let roles = h.roles.grant(&admin, target, Role::Employee).await.expect("grant employee");
    assert!(roles.contains(&Role::Employee));
    let roles = h.roles.grant(&admin, target, Role::Manager).await.expect("grant manager");
    assert!(roles.contains(&Role::Manager));

    let roles = h.roles.promote_to_admin(&admin, target).await.expect("promote");
    assert!(roles.contains(&Role::Admin));
    let again = h.roles.promote_to_admin(&admin, target).await;
    assert!(matches!(again, Err(AuthError::RoleAlreadyHeld(Role::Admin))));

    let roles = h.roles.demote_from_admin(&admin, target).await.expect("demote");
    assert!(!roles.contains(&Role::Admin));
}

#[tokio::test]
async fn user_role_is_protected_and_mutations_need_an_admin() {
    let h = Harness::new(OriginPolicy::Flexible);
    let target = h.signed_up("ada@example.com").await;
    let admin = admin_principal();

    let grant = h.roles.grant(&admin, target, Role::User).await;
    assert!(matches!(grant, Err(AuthError::ProtectedRole)));
    let revoke = h.roles.revoke(&admin, target, Role::User).await;
    assert!(matches!(revoke, Err(AuthError::ProtectedRole)));

    let peasant = Principal {
        user_id: Uuid::new_v4(),
        roles: RoleSet::from([Role::User, Role::Manager]),
    };
    let forbidden = h.roles.grant(&peasant, target, Role::Employee).await;
    assert!(matches!(forbidden, Err(AuthError::Forbidden)));
}

#[tokio::test]
async fn role_changes_reach_the_next_refresh() {
    let h = Harness::new(OriginPolicy::Flexible);
    let (user_id, tokens) = h.logged_in("ada@example.com").await;
    let admin = admin_principal();

    h.roles.grant(&admin, user_id, Role::Employee).await.expect("grant");

    // The old access token still carries the stale claims by design; the
    // next exchange picks up the new set.
    let rotated = h
        .sessions
        .refresh(&tokens.refresh_token, origin_a())
        .await
        .expect("exchange");
    let principal = h
        .sessions
        .authenticate_access_token(&rotated.access_token)
        .expect("verify");
    assert!(principal.holds(Role::Employee));
}

#[tokio::test]
async fn sweep_clears_tombstones_only_after_expiry() {
    let h = Harness::new(OriginPolicy::Flexible);
    let (_, first) = h.logged_in("ada@example.com").await;
    let _second = h
        .sessions
        .refresh(&first.refresh_token, origin_a())
        .await
        .expect("exchange");

    // Retired token is still a tombstone, so nothing sweeps yet.
    assert_eq!(h.tokens.len().await, 2);
    assert_eq!(h.tokens.sweep_expired(h.clock.now()).await.expect("sweep"), 0);

    h.clock.advance_seconds(3601);
    assert_eq!(h.tokens.sweep_expired(h.clock.now()).await.expect("sweep"), 2);
    assert!(h.tokens.is_empty().await);
}
