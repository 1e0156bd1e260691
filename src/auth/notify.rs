//! Security incident notification.
//!
//! Dispatch is fire-and-forget: the notifier runs on a spawned task and a
//! failure is logged, never propagated. A slow or broken notifier must not
//! delay or fail the refresh/login/logout response that triggered it.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use super::origin::OriginFingerprint;

/// Outbound sink for security-relevant events. Implementations decide how
/// to deliver (email, pager, audit bus); the core consumes no return value.
#[async_trait]
pub trait IncidentNotifier: Send + Sync {
    async fn replay_detected(&self, user_id: Uuid, origin: &OriginFingerprint) -> Result<()>;
    async fn all_sessions_revoked(&self, user_id: Uuid, reason: &str) -> Result<()>;
}

/// Default sink for local dev: logs the incident and reports success.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogIncidentNotifier;

#[async_trait]
impl IncidentNotifier for LogIncidentNotifier {
    async fn replay_detected(&self, user_id: Uuid, origin: &OriginFingerprint) -> Result<()> {
        info!(%user_id, %origin, "incident notifier stub: refresh token replay detected");
        Ok(())
    }

    async fn all_sessions_revoked(&self, user_id: Uuid, reason: &str) -> Result<()> {
        info!(%user_id, reason, "incident notifier stub: all sessions revoked");
        Ok(())
    }
}

/// Dispatch a replay incident without waiting for delivery.
pub fn spawn_replay_notification(
    notifier: Arc<dyn IncidentNotifier>,
    user_id: Uuid,
    origin: OriginFingerprint,
) {
    tokio::spawn(async move {
        if let Err(err) = notifier.replay_detected(user_id, &origin).await {
            error!(%user_id, "failed to deliver replay incident notification: {err:#}");
        }
    });
}

/// Dispatch a mass-revocation notice without waiting for delivery.
pub fn spawn_revocation_notification(
    notifier: Arc<dyn IncidentNotifier>,
    user_id: Uuid,
    reason: &'static str,
) {
    tokio::spawn(async move {
        if let Err(err) = notifier.all_sessions_revoked(user_id, reason).await {
            error!(%user_id, "failed to deliver revocation notification: {err:#}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_notifier_reports_success() {
        let notifier = LogIncidentNotifier;
        let user = Uuid::new_v4();
        assert!(notifier
            .replay_detected(user, &OriginFingerprint::default())
            .await
            .is_ok());
        assert!(notifier.all_sessions_revoked(user, "test").await.is_ok());
    }
}
