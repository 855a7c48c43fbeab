//! Service authentication and caller identity.
//!
//! The PSK check implements constant-time comparison to mitigate timing
//! attacks. Per-user authorization happens upstream; this service only learns
//! who submitted a record through the `x-user-id` header.

use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use subtle::ConstantTimeEq;

use crate::errors::{codes, AppError, AppErrorWithRevision, ErrorDetails, ErrorResponse};

/// Header name for the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header carrying the authenticated user's id, set by the identity service.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Identifier of the user making the request, recorded as `createdBy`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for CallerId {
    type Rejection = AppErrorWithRevision;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| CallerId(id.to_string()))
            .ok_or_else(|| AppErrorWithRevision {
                error: AppError::Unauthorized(format!("Missing {} header", USER_ID_HEADER)),
                revision_id: 0,
            })
    }
}

/// Reject requests that do not present the configured pre-shared key.
///
/// The key is read from `x-api-key`, falling back to `Authorization: Bearer`.
/// With no key configured every request passes (dev mode).
pub async fn psk_auth_layer(
    expected_psk: Option<String>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = expected_psk else {
        return next.run(request).await;
    };

    let matches = presented_key(&request).map(|key| constant_time_compare(key, &expected));
    match matches {
        Some(true) => next.run(request).await,
        Some(false) => unauthorized_response("Invalid API key"),
        None => unauthorized_response("Missing API key"),
    }
}

fn presented_key(request: &Request) -> Option<&str> {
    let headers = request.headers();
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
        })
}

/// Perform constant-time string comparison.
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
