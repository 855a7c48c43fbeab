//! REST API module.
//!
//! Contains all API routes and handlers following the mobile client's contract.

mod attendance;
mod statistics;

pub use attendance::*;
pub use statistics::*;

use std::time::Duration;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::db::Repository;
use crate::errors::{AppError, AppErrorWithRevision};
use crate::AppState;

/// Header a caller may use to shorten the store timeout for one request.
pub const STORE_TIMEOUT_HEADER: &str = "x-store-timeout-ms";

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub revision_id: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, revision_id: i64) -> Self {
        Self {
            success: true,
            data,
            revision_id,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppErrorWithRevision>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T, revision_id: i64) -> ApiResult<T> {
    Ok(ApiResponse::new(data, revision_id))
}

/// Create an error API response.
pub fn error<T: Serialize>(err: AppError, revision_id: i64) -> ApiResult<T> {
    Err(AppErrorWithRevision {
        error: err,
        revision_id,
    })
}

/// Reject input before the store is consulted; no revision is known yet.
pub fn invalid<T: Serialize>(message: impl Into<String>) -> ApiResult<T> {
    error(AppError::Validation(message.into()), 0)
}

/// The server's current local calendar date.
pub fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

/// Current revision, or `fallback` when it cannot be read.
pub async fn revision_or(repo: &Repository, fallback: i64) -> i64 {
    match repo.get_revision_id().await {
        Ok(revision_id) => revision_id,
        Err(e) => {
            tracing::warn!(error = %e.message(), fallback, "Could not read revision id");
            fallback
        }
    }
}

/// Store timeout for this request: the `x-store-timeout-ms` header when
/// present, never longer than the configured timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreTimeout(pub Duration);

impl StoreTimeout {
    /// The shared repository, bounded by this timeout.
    pub fn repo(self, state: &AppState) -> Repository {
        state.repo.with_timeout(self.0)
    }
}

impl FromRequestParts<AppState> for StoreTimeout {
    type Rejection = AppErrorWithRevision;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ceiling = state.config.store_timeout;
        let Some(raw) = parts.headers.get(STORE_TIMEOUT_HEADER) else {
            return Ok(StoreTimeout(ceiling));
        };

        raw.to_str()
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(|ms| StoreTimeout(Duration::from_millis(ms).min(ceiling)))
            .ok_or_else(|| AppErrorWithRevision {
                error: AppError::Validation(format!(
                    "{} must be a positive number of milliseconds",
                    STORE_TIMEOUT_HEADER
                )),
                revision_id: 0,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::init_database;
    use axum::http::Request as HttpRequest;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn state(store_timeout: Duration) -> (AppState, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.sqlite");
        let pool = init_database(&db_path).await.unwrap();
        let config = Config {
            api_psk: None,
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            store_timeout,
            trend_days: 30,
            week_start: crate::aggregation::WeekStart::Monday,
        };
        let state = AppState {
            repo: Arc::new(Repository::new(pool, store_timeout)),
            config: Arc::new(config),
        };
        (state, temp_dir)
    }

    async fn extract(
        state: &AppState,
        header: Option<&str>,
    ) -> Result<StoreTimeout, AppErrorWithRevision> {
        let mut builder = HttpRequest::builder().uri("/api/attendance");
        if let Some(value) = header {
            builder = builder.header(STORE_TIMEOUT_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        StoreTimeout::from_request_parts(&mut parts, state).await
    }

    #[tokio::test]
    async fn test_store_timeout_defaults_and_is_capped() {
        let (state, _dir) = state(Duration::from_millis(5000)).await;

        let default = extract(&state, None).await.unwrap();
        assert_eq!(default.0, Duration::from_millis(5000));

        let shorter = extract(&state, Some("250")).await.unwrap();
        assert_eq!(shorter.0, Duration::from_millis(250));

        let longer = extract(&state, Some("60000")).await.unwrap();
        assert_eq!(longer.0, Duration::from_millis(5000));
    }

    #[tokio::test]
    async fn test_store_timeout_rejects_bad_values() {
        let (state, _dir) = state(Duration::from_millis(5000)).await;
        for value in ["0", "-5", "soon"] {
            let rejection = extract(&state, Some(value)).await.unwrap_err();
            assert!(matches!(rejection.error, AppError::Validation(_)), "{}", value);
            assert_eq!(rejection.revision_id, 0);
        }
    }

    #[tokio::test]
    async fn test_revision_or_falls_back_when_store_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .unwrap();
        let repo = Repository::new(pool.clone(), Duration::from_millis(5000));
        assert_eq!(revision_or(&repo, 7).await, 0);

        pool.close().await;
        assert_eq!(revision_or(&repo, 7).await, 7);
    }
}
