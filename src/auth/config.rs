//! Session lifecycle configuration.

use super::origin::OriginPolicy;

const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 15 * 60;
const DEFAULT_ROLE_CACHE_TTL_SECONDS: u64 = 60;
const DEFAULT_TOKEN_ISSUER: &str = "sesio";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
    sweep_interval_seconds: u64,
    role_cache_ttl_seconds: u64,
    token_issuer: String,
    origin_policy: OriginPolicy,
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            access_token_ttl_seconds: DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
            refresh_token_ttl_seconds: DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
            sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL_SECONDS,
            role_cache_ttl_seconds: DEFAULT_ROLE_CACHE_TTL_SECONDS,
            token_issuer: DEFAULT_TOKEN_ISSUER.to_string(),
            origin_policy: OriginPolicy::Flexible,
        }
    }

    #[must_use]
    pub fn with_access_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_sweep_interval_seconds(mut self, seconds: u64) -> Self {
        self.sweep_interval_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_role_cache_ttl_seconds(mut self, seconds: u64) -> Self {
        self.role_cache_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_token_issuer(mut self, issuer: String) -> Self {
        self.token_issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_origin_policy(mut self, policy: OriginPolicy) -> Self {
        self.origin_policy = policy;
        self
    }

    /// Clamp nonsensical values to safe minimums.
    #[must_use]
    pub fn normalize(mut self) -> Self {
        if self.access_token_ttl_seconds <= 0 {
            self.access_token_ttl_seconds = DEFAULT_ACCESS_TOKEN_TTL_SECONDS;
        }
        if self.refresh_token_ttl_seconds <= 0 {
            self.refresh_token_ttl_seconds = DEFAULT_REFRESH_TOKEN_TTL_SECONDS;
        }
        if self.sweep_interval_seconds == 0 {
            self.sweep_interval_seconds = 1;
        }
        self
    }

    #[must_use]
    pub fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_seconds
    }

    #[must_use]
    pub fn refresh_token_ttl_seconds(&self) -> i64 {
        self.refresh_token_ttl_seconds
    }

    #[must_use]
    pub fn sweep_interval_seconds(&self) -> u64 {
        self.sweep_interval_seconds
    }

    #[must_use]
    pub fn role_cache_ttl_seconds(&self) -> u64 {
        self.role_cache_ttl_seconds
    }

    #[must_use]
    pub fn token_issuer(&self) -> &str {
        &self.token_issuer
    }

    #[must_use]
    pub fn origin_policy(&self) -> OriginPolicy {
        self.origin_policy
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_ttls() {
        let config = AuthConfig::new();
        assert_eq!(config.access_token_ttl_seconds(), 900);
        assert_eq!(config.refresh_token_ttl_seconds(), 7 * 24 * 60 * 60);
        assert_eq!(config.origin_policy(), OriginPolicy::Flexible);
    }

    #[test]
    fn normalize_rejects_zero_ttls() {
        let config = AuthConfig::new()
            .with_access_token_ttl_seconds(0)
            .with_refresh_token_ttl_seconds(-5)
            .with_sweep_interval_seconds(0)
            .normalize();
        assert_eq!(config.access_token_ttl_seconds(), 900);
        assert_eq!(config.refresh_token_ttl_seconds(), 7 * 24 * 60 * 60);
        assert_eq!(config.sweep_interval_seconds(), 1);
    }

    #[test]
    fn builders_override_defaults() {
        let config = AuthConfig::new()
            .with_access_token_ttl_seconds(60)
            .with_origin_policy(OriginPolicy::Strict)
            .with_token_issuer("test".to_string());
        assert_eq!(config.access_token_ttl_seconds(), 60);
        assert_eq!(config.origin_policy(), OriginPolicy::Strict);
        assert_eq!(config.token_issuer(), "test");
    }
}
