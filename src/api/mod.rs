//! HTTP surface.
//!
//! Routes are registered here; every handler reaches the engine through
//! `Extension<Arc<AuthService>>` so the API layer stays a thin mapping
//! between wire types and the service facade.

use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post, put},
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

use crate::auth::AuthService;

pub mod error;
pub mod handlers;
mod openapi;
pub mod types;

pub use openapi::ApiDoc;

/// Build the router with all routes and the middleware stack.
#[must_use]
pub fn router(service: Arc<AuthService>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/openapi.json", get(openapi::openapi_json))
        .route("/v1/auth/register", post(handlers::auth::register))
        .route("/v1/auth/login", post(handlers::auth::login))
        .route("/v1/auth/refresh", post(handlers::auth::refresh))
        .route("/v1/auth/logout", post(handlers::auth::logout))
        .route("/v1/auth/password", post(handlers::auth::change_password))
        .route("/v1/sessions", get(handlers::session::list_sessions))
        .route(
            "/v1/sessions/revoke_all",
            post(handlers::session::revoke_all),
        )
        .route(
            "/v1/sessions/:chain_id",
            axum::routing::delete(handlers::session::revoke_session),
        )
        .route(
            "/v1/apikeys",
            post(handlers::apikey::create_api_key).get(handlers::apikey::list_api_keys),
        )
        .route(
            "/v1/apikeys/:key_id",
            axum::routing::delete(handlers::apikey::revoke_api_key),
        )
        .route("/v1/me/permissions", get(handlers::me::permissions))
        .route(
            "/v1/me/permissions/check",
            post(handlers::me::check_permission),
        )
        .route("/v1/admin/roles", get(handlers::admin::list_roles))
        .route(
            "/v1/admin/users/:user_id/role",
            put(handlers::admin::assign_role),
        )
        .route(
            "/v1/admin/users/:user_id/unlock",
            post(handlers::admin::unlock_user),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(service)),
        )
}

/// Start the server.
/// # Errors
/// Return error if failed to bind or serve.
pub async fn serve(port: u16, service: Arc<AuthService>) -> Result<()> {
    let app = router(service);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
