//! API-key authentication middleware.
//!
//! Keys are compared in constant time to mitigate timing attacks.

use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use subtle::ConstantTimeEq;

use crate::errors::{codes, ErrorDetails, ErrorResponse};

/// Header name for the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Authentication layer; `expected_key = None` lets every request through.
pub async fn api_key_layer(
    expected_key: Option<String>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = expected_key else {
        return next.run(request).await;
    };

    match provided_key(request.headers()) {
        Some(key) if constant_time_compare(&key, &expected) => next.run(request).await,
        Some(_) => {
            tracing::debug!(path = %request.uri().path(), "Rejected request with wrong API key");
            unauthorized_response("Invalid API key")
        }
        None => unauthorized_response("Missing or invalid API key"),
    }
}

/// Key from `x-api-key`, else from an `Authorization: Bearer` header.
fn provided_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
        })
        .map(str::to_string)
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorResponse {
        success: false,
        error: ErrorDetails {
            code: codes::UNAUTHORIZED.to_string(),
            message: message.to_string(),
            details: None,
        },
        revision_id: 0,
    };

    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
