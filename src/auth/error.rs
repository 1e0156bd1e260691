//! Error taxonomy for the session and role services.
//!
//! Storage and crypto failures are wrapped before they reach a caller; the
//! HTTP layer maps these variants to responses and deliberately collapses
//! the security-sensitive ones into a generic "session invalid" body.

use thiserror::Error;

use super::roles::Role;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Opaque credential failure; identical whether the email is unknown
    /// or the password is wrong.
    #[error("invalid credentials")]
    BadCredentials,

    #[error("refresh token not found")]
    TokenNotFound,

    /// Benign: the holder simply has to log in again.
    #[error("refresh token expired")]
    TokenExpired,

    /// A token that was already rotated away (or lost a rotation race) was
    /// presented again. Mass revocation has been triggered for the owner.
    #[error("refresh token replay detected")]
    TokenReplayDetected,

    /// Strict origin policy only: the request fingerprint diverged from the
    /// one recorded at issuance.
    #[error("origin fingerprint mismatch")]
    OriginMismatch,

    #[error("role {0} requires a lower rung of the ladder first")]
    HierarchyViolation(Role),

    #[error("the user role is managed automatically and cannot be changed")]
    ProtectedRole,

    #[error("role {0} is already held")]
    RoleAlreadyHeld(Role),

    #[error("role {0} is not held")]
    RoleNotHeld(Role),

    #[error("user not found")]
    UserNotFound,

    #[error("email is already registered")]
    EmailTaken,

    #[error("email address is not valid")]
    InvalidEmail,

    /// The acting principal lacks the privilege for the operation.
    #[error("insufficient privileges")]
    Forbidden,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_do_not_leak_internals() {
        assert_eq!(AuthError::BadCredentials.to_string(), "invalid credentials");
        assert_eq!(
            AuthError::TokenReplayDetected.to_string(),
            "refresh token replay detected"
        );
    }

    #[test]
    fn storage_errors_wrap_with_context() {
        let err = AuthError::from(anyhow::anyhow!("pool exhausted"));
        assert!(matches!(err, AuthError::Storage(_)));
    }
}
