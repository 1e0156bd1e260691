//! Session and authorization lifecycle core.
//!
//! Short-lived self-verifying access tokens, long-lived rotating refresh
//! tokens with replay detection, and a fixed role-promotion ladder. The
//! durable stores, clock, and incident sink are collaborator traits;
//! implementations live in [`crate::storage`].

pub mod access_token;
pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod origin;
pub mod role_service;
pub mod roles;
pub mod service;
pub mod sweeper;
pub mod users;

pub use access_token::AccessTokenIssuer;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AuthConfig;
pub use error::AuthError;
pub use ledger::RefreshTokenStore;
pub use notify::{IncidentNotifier, LogIncidentNotifier};
pub use origin::{OriginFingerprint, OriginPolicy};
pub use role_service::{Principal, RoleCache, RoleService};
pub use roles::{Role, RoleSet};
pub use service::{SessionService, SessionTokens};
pub use users::UserStore;
