//! Statistics endpoints.

use axum::extract::{rejection::QueryRejection, Query, State};

use super::{error, invalid, revision_or, success, today, ApiResult, StoreTimeout};
use crate::models::{AttendanceStatistics, ScopeGroup, ScopeGroupsQuery, StatisticsQuery};
use crate::AppState;

/// Longest trend a caller may request.
const MAX_TREND_DAYS: u32 = 366;

/// GET /api/attendance/statistics - Rollups, breakdowns and the daily trend.
///
/// `asOf` defaults to today's local date; `days` to the configured trend length.
pub async fn get_statistics(
    State(state): State<AppState>,
    timeout: StoreTimeout,
    query: Result<Query<StatisticsQuery>, QueryRejection>,
) -> ApiResult<AttendanceStatistics> {
    let Query(params) = match query {
        Ok(query) => query,
        Err(rejection) => return invalid(rejection.body_text()),
    };

    let days = params.days.unwrap_or(state.config.trend_days);
    if !(1..=MAX_TREND_DAYS).contains(&days) {
        return invalid(format!("days must be between 1 and {}", MAX_TREND_DAYS));
    }
    let as_of = params.as_of.unwrap_or_else(today);
    let repo = timeout.repo(&state);

    // The revision comes from the same snapshot as the aggregates.
    match repo.statistics(as_of, days, state.config.week_start).await {
        Ok((stats, revision_id)) => success(stats, revision_id),
        Err(e) => {
            let revision_id = revision_or(&repo, 0).await;
            error(e, revision_id)
        }
    }
}

/// GET /api/attendance/by-scope - Per district / small group chart data.
pub async fn get_scope_groups(
    State(state): State<AppState>,
    timeout: StoreTimeout,
    query: Result<Query<ScopeGroupsQuery>, QueryRejection>,
) -> ApiResult<Vec<ScopeGroup>> {
    let Query(params) = match query {
        Ok(query) => query,
        Err(rejection) => return invalid(rejection.body_text()),
    };

    let repo = timeout.repo(&state);
    let revision_id = revision_or(&repo, 0).await;

    match repo.scope_groups(params.meeting_type).await {
        Ok(groups) => success(groups, revision_id),
        Err(e) => error(e, revision_id),
    }
}
