use crate::auth::{
    AccessTokenIssuer, AuthConfig, LogIncidentNotifier, RoleCache, RoleService, SessionService,
    SystemClock, sweeper::spawn_expiry_sweeper,
};
use crate::storage::{PostgresRefreshTokenStore, PostgresUserStore};
use anyhow::{Context, Result};
use axum::{
    Extension,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::get,
};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use utoipa_axum::router::OpenApiRouter;

pub mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use handlers::{AppState, SharedState};
pub use openapi::openapi;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Start the server.
///
/// # Errors
///
/// Returns an error if the signing secret is unusable, the database is
/// unreachable, or the listener fails to bind.
pub async fn new(
    port: u16,
    dsn: String,
    access_token_secret: SecretString,
    config: AuthConfig,
) -> Result<()> {
    let config = config.normalize();

    // A weak or missing signing secret is fatal here, at startup.
    let issuer = Arc::new(
        AccessTokenIssuer::new(
            access_token_secret,
            config.token_issuer().to_string(),
            config.access_token_ttl_seconds(),
        )
        .context("unusable access token signing secret")?,
    );

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let users = Arc::new(PostgresUserStore::new(pool.clone()));
    let tokens = Arc::new(PostgresRefreshTokenStore::new(pool.clone()));
    let notifier = Arc::new(LogIncidentNotifier);
    let clock = Arc::new(SystemClock);
    let role_cache = Arc::new(RoleCache::new(Duration::from_secs(
        config.role_cache_ttl_seconds(),
    )));

    let sessions = SessionService::new(
        users.clone(),
        tokens.clone(),
        notifier,
        clock.clone(),
        role_cache.clone(),
        issuer,
        config.clone(),
    )?;
    let roles = RoleService::new(users, role_cache);
    let state: SharedState = Arc::new(AppState { sessions, roles });

    // Background task reclaims expired ledger rows; tombstones for reuse
    // detection live until their natural expiry passes.
    spawn_expiry_sweeper(
        tokens,
        clock,
        Duration::from_secs(config.sweep_interval_seconds()),
    );

    let (router, _openapi) = router().split_for_parts();
    let app = router.route("/", get(handlers::root::root)).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &Request<Body>| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(Extension(state))
            .layer(Extension(pool)),
    );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = path,
        request_id = request_id
    )
}
