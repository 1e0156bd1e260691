use super::handlers::{health, register, roles, session};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` spec.
/// Routes added outside (like `/`) are intentionally not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    let mut session_tag = Tag::new("session");
    session_tag.description =
        Some("Login, refresh rotation, logout, and session revocation".to_string());

    let mut roles_tag = Tag::new("roles");
    roles_tag.description = Some("Role ladder management".to_string());

    let mut openapi = cargo_openapi();
    openapi.tags = Some(vec![session_tag, roles_tag]);

    // `routes!` reads #[utoipa::path] to bind HTTP method + path and add the route to OpenAPI.
    OpenApiRouter::with_openapi(openapi)
        .routes(routes!(health::health))
        .routes(routes!(register::register))
        .routes(routes!(session::login))
        .routes(routes!(session::refresh))
        .routes(routes!(session::logout))
        .routes(routes!(session::revoke_all))
        .routes(routes!(roles::grant_role))
        .routes(routes!(roles::revoke_role))
        .routes(routes!(roles::promote_admin))
        .routes(routes!(roles::demote_admin))
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Split `Name <email>` into its parts; either may be absent.
fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match (author.find('<'), author.rfind('>')) {
        (Some(start), Some(end)) if start < end => {
            let name = author[..start].trim();
            let email = author[start + 1..end].trim();
            (
                if name.is_empty() { None } else { Some(name) },
                if email.is_empty() { None } else { Some(email) },
            )
        }
        _ => {
            let name = author.trim();
            if name.is_empty() {
                (None, None)
            } else {
                (Some(name), None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_all_session_routes() {
        let spec = openapi();
        let paths = &spec.paths.paths;
        for path in [
            "/health",
            "/v1/auth/register",
            "/v1/auth/login",
            "/v1/auth/refresh",
            "/v1/auth/logout",
            "/v1/auth/sessions/revoke-all",
            "/v1/users/{user_id}/roles",
            "/v1/users/{user_id}/roles/{role}",
            "/v1/users/{user_id}/promote-admin",
            "/v1/users/{user_id}/demote-admin",
        ] {
            assert!(paths.contains_key(path), "missing path: {path}");
        }
    }

    #[test]
    fn author_parsing_handles_both_shapes() {
        assert_eq!(
            parse_author("Team Sesio <team@sesio.dev>"),
            (Some("Team Sesio"), Some("team@sesio.dev"))
        );
        assert_eq!(parse_author("Just A Name"), (Some("Just A Name"), None));
    }
}
