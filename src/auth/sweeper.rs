//! Background garbage collection of expired refresh tokens.
//!
//! The sweep deletes rows whose expiry has passed, revoked or not. It has
//! no ordering requirement relative to verify/rotate: a row swept between
//! a lookup and its use simply surfaces as not-found on the next access.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

use super::clock::Clock;
use super::ledger::RefreshTokenStore;

/// Spawn the periodic sweep task. Errors are logged and the loop keeps
/// going; a failed sweep only delays reclamation.
pub fn spawn_expiry_sweeper(
    tokens: Arc<dyn RefreshTokenStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
) {
    tokio::spawn(async move {
        loop {
            sleep(interval).await;
            match tokens.sweep_expired(clock.now()).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "swept expired refresh tokens"),
                Err(err) => error!("refresh token sweep failed: {err:#}"),
            }
        }
    });
}
