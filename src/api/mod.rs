//! HTTP API built on Axum.
//!
//! Serves the read endpoints, the client mutation endpoints (primary only),
//! the replication endpoints the primary forwards to, and a status endpoint.

/// API error types mapped to HTTP status codes.
pub mod errors;
/// HTTP request handlers and application state.
pub mod handlers;
/// Response data transfer objects.
pub mod models;

use axum::extract::Request;
use axum::http::{header, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use handlers::AppState;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Answers any `OPTIONS` request with an empty 200.
///
/// Browser preflights are answered by the CORS layer before reaching this.
async fn options_middleware(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    next.run(req).await
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE])
}

/// Builds the Axum router with all routes and middleware layers.
///
/// Query-parameter endpoints accept GET and POST, body endpoints POST and PUT.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/is-master", get(handlers::is_master))
        .route("/select", get(handlers::select).post(handlers::select))
        .route("/replication/status", get(handlers::replication_status))
        .route(
            "/createdb",
            get(handlers::client_create_database).post(handlers::client_create_database),
        )
        .route(
            "/dropdb",
            get(handlers::client_drop_database).post(handlers::client_drop_database),
        )
        .route(
            "/createtable",
            get(handlers::client_create_table).post(handlers::client_create_table),
        )
        .route(
            "/insert",
            post(handlers::client_insert).put(handlers::client_insert),
        )
        .route(
            "/update",
            post(handlers::client_update).put(handlers::client_update),
        )
        .route(
            "/delete",
            post(handlers::client_delete).put(handlers::client_delete),
        )
        .route(
            "/replicate/db",
            get(handlers::replicate_database).post(handlers::replicate_database),
        )
        .route(
            "/replicate/dropdb",
            get(handlers::replicate_drop_database).post(handlers::replicate_drop_database),
        )
        .route(
            "/replicate/table",
            get(handlers::replicate_table).post(handlers::replicate_table),
        )
        .route(
            "/replicate/insert",
            post(handlers::replicate_insert).put(handlers::replicate_insert),
        )
        .route(
            "/replicate/update",
            post(handlers::replicate_update).put(handlers::replicate_update),
        )
        .route(
            "/replicate/delete",
            post(handlers::replicate_delete).put(handlers::replicate_delete),
        )
        .layer(middleware::from_fn(options_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}
