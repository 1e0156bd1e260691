//! # Sesio (Session & Authorization Lifecycle)
//!
//! `sesio` issues short-lived access tokens against long-lived, rotating
//! refresh tokens, and enforces a strict role hierarchy on top.
//!
//! ## Session Model
//!
//! A login opens a session: one signed access token (HS256, minutes of
//! life) plus one opaque refresh token (a week of life, single use). A
//! refresh exchange retires the presented token and issues a replacement
//! in the same atomic store operation.
//!
//! - **Replay response:** presenting an already-rotated refresh token is
//!   treated as credential theft. Every session the owner has is revoked
//!   and an incident notification is dispatched.
//! - **Origin fingerprinting:** each refresh token remembers the address
//!   and user agent that created it. A mismatch on exchange is logged;
//!   under the strict policy it also rejects the exchange.
//! - **Hashes at rest:** the database only ever stores SHA-256 digests of
//!   refresh tokens, never the raw strings.
//!
//! ## Roles
//!
//! Roles form a ladder (`user` < `employee` < `manager` < `admin`). Grants
//! require the rung below, `user` is automatic and cannot be granted or
//! revoked, and every role mutation must be performed by an admin.

pub mod api;
pub mod auth;
pub mod cli;
pub mod storage;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
