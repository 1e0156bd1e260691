use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_ACCESS_TOKEN_SECRET: &str = "access-token-secret";
pub const ARG_TOKEN_ISSUER: &str = "token-issuer";
pub const ARG_ACCESS_TOKEN_TTL: &str = "access-token-ttl";
pub const ARG_REFRESH_TOKEN_TTL: &str = "refresh-token-ttl";
pub const ARG_SWEEP_INTERVAL: &str = "sweep-interval";
pub const ARG_ROLE_CACHE_TTL: &str = "role-cache-ttl";
pub const ARG_STRICT_ORIGIN: &str = "strict-origin";

/// Token and session lifecycle arguments.
#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_SECRET)
                .long(ARG_ACCESS_TOKEN_SECRET)
                .help("HMAC secret used to sign access tokens (minimum 32 bytes)")
                .env("SESIO_ACCESS_TOKEN_SECRET")
                .required(true),
        )
        .arg(
            Arg::new(ARG_TOKEN_ISSUER)
                .long(ARG_TOKEN_ISSUER)
                .help("Issuer claim stamped into access tokens")
                .default_value("sesio")
                .env("SESIO_TOKEN_ISSUER"),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL)
                .long(ARG_ACCESS_TOKEN_TTL)
                .help("Access token lifetime in seconds")
                .default_value("900")
                .env("SESIO_ACCESS_TOKEN_TTL")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL)
                .long(ARG_REFRESH_TOKEN_TTL)
                .help("Refresh token lifetime in seconds")
                .default_value("604800")
                .env("SESIO_REFRESH_TOKEN_TTL")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_SWEEP_INTERVAL)
                .long(ARG_SWEEP_INTERVAL)
                .help("Seconds between expired refresh token sweeps")
                .default_value("900")
                .env("SESIO_SWEEP_INTERVAL")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_ROLE_CACHE_TTL)
                .long(ARG_ROLE_CACHE_TTL)
                .help("Seconds a cached role snapshot stays fresh")
                .default_value("60")
                .env("SESIO_ROLE_CACHE_TTL")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_STRICT_ORIGIN)
                .long(ARG_STRICT_ORIGIN)
                .help("Reject refresh attempts whose origin fingerprint differs from login")
                .env("SESIO_STRICT_ORIGIN")
                .action(ArgAction::SetTrue),
        )
}

#[derive(Debug)]
pub struct Options {
    pub access_token_secret: SecretString,
    pub token_issuer: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub sweep_interval_seconds: u64,
    pub role_cache_ttl_seconds: u64,
    pub strict_origin: bool,
}

impl Options {
    /// Collect token arguments from validated matches.
    ///
    /// # Errors
    /// Returns an error if the signing secret is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let secret = matches
            .get_one::<String>(ARG_ACCESS_TOKEN_SECRET)
            .cloned()
            .with_context(|| format!("missing required argument: --{ARG_ACCESS_TOKEN_SECRET}"))?;

        Ok(Self {
            access_token_secret: SecretString::from(secret),
            token_issuer: matches
                .get_one::<String>(ARG_TOKEN_ISSUER)
                .cloned()
                .unwrap_or_else(|| "sesio".to_string()),
            access_token_ttl_seconds: matches
                .get_one::<i64>(ARG_ACCESS_TOKEN_TTL)
                .copied()
                .unwrap_or(900),
            refresh_token_ttl_seconds: matches
                .get_one::<i64>(ARG_REFRESH_TOKEN_TTL)
                .copied()
                .unwrap_or(604_800),
            sweep_interval_seconds: matches
                .get_one::<u64>(ARG_SWEEP_INTERVAL)
                .copied()
                .unwrap_or(900),
            role_cache_ttl_seconds: matches
                .get_one::<u64>(ARG_ROLE_CACHE_TTL)
                .copied()
                .unwrap_or(60),
            strict_origin: matches.get_flag(ARG_STRICT_ORIGIN),
        })
    }
}
