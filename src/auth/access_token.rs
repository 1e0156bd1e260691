//! Stateless access token issuance and verification.
//!
//! Access tokens are compact HS256 JWTs. Validity is a pure function of the
//! shared signing secret plus the encoded expiry; no durable state is
//! consulted. Role claims are a snapshot taken at issuance and are allowed
//! to go stale for the lifetime of the token (a short TTL bounds the
//! staleness).

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use super::roles::RoleSet;

type HmacSha256 = Hmac<Sha256>;

/// Secrets shorter than this are refused at startup.
const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessTokenHeader {
    pub alg: String,
    pub typ: String,
}

impl AccessTokenHeader {
    fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessTokenClaims {
    pub iss: String,
    pub sub: Uuid,
    pub roles: RoleSet,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("signing secret must be at least {MIN_SECRET_BYTES} bytes")]
    WeakSecret,
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("invalid issuer")]
    InvalidIssuer,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Issues and verifies access tokens against one shared secret.
///
/// Construction fails on a weak secret; a missing key is therefore a
/// startup error, never a per-request condition.
pub struct AccessTokenIssuer {
    secret: SecretString,
    issuer: String,
    ttl_seconds: i64,
}

impl AccessTokenIssuer {
    /// # Errors
    ///
    /// Returns `WeakSecret` when the secret is shorter than 32 bytes.
    pub fn new(secret: SecretString, issuer: String, ttl_seconds: i64) -> Result<Self, Error> {
        if secret.expose_secret().len() < MIN_SECRET_BYTES {
            return Err(Error::WeakSecret);
        }
        Ok(Self {
            secret,
            issuer,
            ttl_seconds,
        })
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    fn mac(&self) -> HmacSha256 {
        // Length was validated in the constructor; HMAC accepts any key size.
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .unwrap_or_else(|_| unreachable!("hmac accepts keys of any length"))
    }

    /// Mint a token for `subject` carrying a snapshot of its roles.
    ///
    /// # Errors
    ///
    /// Returns an error if header or claims fail to encode.
    pub fn issue(
        &self,
        subject: Uuid,
        roles: RoleSet,
        now: DateTime<Utc>,
    ) -> Result<String, Error> {
        let claims = AccessTokenClaims {
            iss: self.issuer.clone(),
            sub: subject,
            roles,
            iat: now.timestamp(),
            exp: now.timestamp() + self.ttl_seconds,
            jti: Uuid::new_v4(),
        };

        let header_b64 = b64e_json(&AccessTokenHeader::hs256())?;
        let claims_b64 = b64e_json(&claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");

        let mut mac = self.mac();
        mac.update(signing_input.as_bytes());
        let signature_b64 = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature_b64}"))
    }

    /// Verify a token and return its decoded claims.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the token is malformed or contains invalid base64/json,
    /// - the algorithm is not HS256,
    /// - the signature does not verify,
    /// - the issuer differs or the expiry has passed.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<AccessTokenClaims, Error> {
        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
        let claims_b64 = parts.next().ok_or(Error::TokenFormat)?;
        let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
        if parts.next().is_some() {
            return Err(Error::TokenFormat);
        }

        let header: AccessTokenHeader = b64d_json(header_b64)?;
        if header.alg != "HS256" {
            return Err(Error::UnsupportedAlg(header.alg));
        }

        let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
        let mut mac = self.mac();
        mac.update(format!("{header_b64}.{claims_b64}").as_bytes());
        // verify_slice is constant-time over the MAC bytes.
        mac.verify_slice(&signature)
            .map_err(|_| Error::InvalidSignature)?;

        let claims: AccessTokenClaims = b64d_json(claims_b64)?;
        if claims.iss != self.issuer {
            return Err(Error::InvalidIssuer);
        }
        if claims.exp <= now.timestamp() {
            return Err(Error::Expired);
        }

        Ok(claims)
    }
}

impl std::fmt::Debug for AccessTokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenIssuer")
            .field("issuer", &self.issuer)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish_non_exhaustive()
    }
}
