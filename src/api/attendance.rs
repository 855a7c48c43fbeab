//! Attendance record endpoints.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};

use super::{error, invalid, revision_or, success, today, ApiResult, StoreTimeout};
use crate::auth::CallerId;
use crate::db::RecordFilter;
use crate::errors::AppError;
use crate::models::{
    AttendancePage, AttendanceRecord, DeleteAttendanceResponse, ListAttendanceQuery, ScopeCatalog,
    SubmitAttendanceRequest, SubmitAttendanceResponse, Submission,
};
use crate::AppState;

/// Largest page the list endpoint will return.
const MAX_PAGE_LIMIT: i64 = 500;

/// POST /api/attendance - Record a headcount.
///
/// District and small-group submissions replace the previous report for the
/// same date, meeting type and scope; full-congregation submissions are
/// always kept alongside earlier ones.
pub async fn submit_attendance(
    State(state): State<AppState>,
    CallerId(created_by): CallerId,
    timeout: StoreTimeout,
    payload: Result<Json<SubmitAttendanceRequest>, JsonRejection>,
) -> ApiResult<SubmitAttendanceResponse> {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return invalid(rejection.body_text()),
    };

    let submission = match Submission::validate(request, &created_by, today()) {
        Ok(submission) => submission,
        Err(e) => return error(e, 0),
    };

    let repo = timeout.repo(&state);
    let revision_id = revision_or(&repo, 0).await;

    match repo.record_attendance(&submission).await {
        Ok((record, was_overwrite)) => {
            let new_revision = revision_or(&repo, revision_id).await;
            success(
                SubmitAttendanceResponse {
                    record,
                    was_overwrite,
                },
                new_revision,
            )
        }
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/attendance - List records, most recent date first.
pub async fn list_attendance(
    State(state): State<AppState>,
    timeout: StoreTimeout,
    query: Result<Query<ListAttendanceQuery>, QueryRejection>,
) -> ApiResult<AttendancePage> {
    let Query(params) = match query {
        Ok(query) => query,
        Err(rejection) => return invalid(rejection.body_text()),
    };

    if !(1..=MAX_PAGE_LIMIT).contains(&params.limit) {
        return invalid(format!("limit must be between 1 and {}", MAX_PAGE_LIMIT));
    }
    if params.offset < 0 {
        return invalid("offset must be non-negative");
    }

    let repo = timeout.repo(&state);
    let revision_id = revision_or(&repo, 0).await;

    let filter = RecordFilter {
        limit: params.limit,
        offset: params.offset,
        meeting_type: params.meeting_type,
        created_by: params.created_by,
    };

    match repo.list_attendance(&filter).await {
        Ok(records) => success(
            AttendancePage {
                count: records.len(),
                records,
            },
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/attendance/{id} - Get a single record.
pub async fn get_attendance(
    State(state): State<AppState>,
    timeout: StoreTimeout,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<AttendanceRecord> {
    let Ok(Path(id)) = id else {
        return invalid("Invalid record id");
    };

    let repo = timeout.repo(&state);
    let revision_id = revision_or(&repo, 0).await;

    match repo.get_attendance(id).await {
        Ok(Some(record)) => success(record, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Attendance record {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/attendance/{id} - Delete a record. Deleting a missing id succeeds.
pub async fn delete_attendance(
    State(state): State<AppState>,
    timeout: StoreTimeout,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<DeleteAttendanceResponse> {
    let Ok(Path(id)) = id else {
        return invalid("Invalid record id");
    };

    let repo = timeout.repo(&state);
    let revision_id = revision_or(&repo, 0).await;

    match repo.delete_attendance(id).await {
        Ok(deleted) => {
            let new_revision = revision_or(&repo, revision_id).await;
            success(
                DeleteAttendanceResponse {
                    success: true,
                    deleted,
                },
                new_revision,
            )
        }
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/attendance/scopes - Districts and small groups that have reported.
pub async fn list_scopes(
    State(state): State<AppState>,
    timeout: StoreTimeout,
) -> ApiResult<ScopeCatalog> {
    let repo = timeout.repo(&state);
    let revision_id = revision_or(&repo, 0).await;

    match repo.scope_catalog().await {
        Ok(catalog) => success(catalog, revision_id),
        Err(e) => error(e, revision_id),
    }
}
