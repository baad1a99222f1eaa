//! API error types mapped to HTTP status codes.
//!
//! Each [`ApiError`] variant maps to a specific HTTP status code and produces
//! a JSON response body `{"error": "message"}`.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::database;

/// Application-level error type that implements `IntoResponse`.
///
/// - `BadRequest` → 400
/// - `Redirect` → 307 (with `Location` header)
/// - `Internal` → 500
#[derive(Debug)]
pub enum ApiError {
    /// Missing fields, unreadable body or rejected input (400).
    BadRequest(String),
    /// Mutation sent to a node that is not primary (307 with `Location` header).
    Redirect(String),
    /// Engine failure (500).
    Internal(String),
}

impl ApiError {
    /// Maps an engine error, prefixing engine failures with `context`
    pub fn from_database(context: &str, err: database::Error) -> Self {
        if err.is_client_error() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::Internal(format!("{}: {}", context, err))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Redirect(location) => {
                return match HeaderValue::from_str(&location) {
                    Ok(val) => {
                        let mut resp = (
                            StatusCode::TEMPORARY_REDIRECT,
                            axum::Json(json!({ "redirect": location })),
                        )
                            .into_response();
                        resp.headers_mut().insert(header::LOCATION, val);
                        resp
                    }
                    Err(_) => {
                        let body = axum::Json(json!({ "error": "Invalid redirect location" }));
                        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
                    }
                };
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            tracing::warn!(%status, error = %message, "request failed");
        } else {
            tracing::debug!(%status, error = %message, "request rejected");
        }
        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}
