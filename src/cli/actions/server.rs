use crate::{api, auth::AuthConfig, auth::OriginPolicy};
use anyhow::Result;
use secrecy::SecretString;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub access_token_secret: SecretString,
    pub token_issuer: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub sweep_interval_seconds: u64,
    pub role_cache_ttl_seconds: u64,
    pub strict_origin: bool,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let policy = if args.strict_origin {
        OriginPolicy::Strict
    } else {
        OriginPolicy::Flexible
    };

    let config = AuthConfig::new()
        .with_token_issuer(args.token_issuer)
        .with_access_token_ttl_seconds(args.access_token_ttl_seconds)
        .with_refresh_token_ttl_seconds(args.refresh_token_ttl_seconds)
        .with_sweep_interval_seconds(args.sweep_interval_seconds)
        .with_role_cache_ttl_seconds(args.role_cache_ttl_seconds)
        .with_origin_policy(policy);

    api::new(args.port, args.dsn, args.access_token_secret, config).await
}
