//! Command-line argument dispatch.
//!
//! This module parses validated CLI arguments and maps them to the
//! appropriate action, such as starting the API server with its full
//! configuration state.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::tokens;
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let token_opts = tokens::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        access_token_secret: token_opts.access_token_secret,
        token_issuer: token_opts.token_issuer,
        access_token_ttl_seconds: token_opts.access_token_ttl_seconds,
        refresh_token_ttl_seconds: token_opts.refresh_token_ttl_seconds,
        sweep_interval_seconds: token_opts.sweep_interval_seconds,
        role_cache_ttl_seconds: token_opts.role_cache_ttl_seconds,
        strict_origin: token_opts.strict_origin,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_secret_required() {
        temp_env::with_vars(
            [
                ("SESIO_ACCESS_TOKEN_SECRET", None::<&str>),
                ("SESIO_DSN", Some("postgres://user@localhost:5432/sesio")),
            ],
            || {
                let command = crate::cli::commands::new();
                let result = command.try_get_matches_from(vec!["sesio"]);
                // clap enforces the secret before dispatch runs
                assert!(result.is_err());
            },
        );
    }

    #[test]
    fn server_args_collected() {
        temp_env::with_vars(
            [
                (
                    "SESIO_ACCESS_TOKEN_SECRET",
                    Some("0123456789abcdef0123456789abcdef"),
                ),
                ("SESIO_DSN", Some("postgres://user@localhost:5432/sesio")),
                ("SESIO_STRICT_ORIGIN", None::<&str>),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["sesio", "--strict-origin"]);
                let action = handler(&matches);
                assert!(action.is_ok());
                if let Ok(Action::Server(args)) = action {
                    assert_eq!(args.port, 8080);
                    assert!(args.strict_origin);
                    assert_eq!(args.token_issuer, "sesio");
                }
            },
        );
    }
}
