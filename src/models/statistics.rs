//! Aggregate shapes served by the statistics endpoints.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{MeetingType, ScopeKind};

/// Summed headcount over a time window.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Rollup {
    pub records: i64,
    pub adults: i64,
    pub youth_children: i64,
    pub total_people: i64,
}

impl Rollup {
    pub fn new(records: i64, adults: i64, youth_children: i64) -> Self {
        Self {
            records,
            adults,
            youth_children,
            total_people: adults + youth_children,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MeetingTypeBreakdown {
    pub meeting_type: MeetingType,
    pub count: i64,
    pub adults: i64,
    pub youth_children: i64,
    pub total_people: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DistrictBreakdown {
    pub district: String,
    pub count: i64,
    pub adults: i64,
    pub youth_children: i64,
    pub total_people: i64,
}

/// One day of the trend series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub record_count: i64,
    pub adults: i64,
    pub youth_children: i64,
    pub total_people: i64,
}

/// Dashboard payload: every aggregate in one response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStatistics {
    pub as_of: NaiveDate,
    pub total: Rollup,
    pub today: Rollup,
    pub this_week: Rollup,
    pub this_month: Rollup,
    pub by_meeting_type: Vec<MeetingTypeBreakdown>,
    pub by_district: Vec<DistrictBreakdown>,
    pub daily_trend: Vec<TrendPoint>,
}

/// Per-date point within one scope group's chart series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub adults: i64,
    pub youth_children: i64,
    pub total_people: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScopeGroupStatistics {
    /// Rows in the group, not distinct dates.
    pub record_count: i64,
    pub total_adults: i64,
    pub total_youth_children: i64,
    pub total_people: i64,
    /// `total_people / distinct dates`, rounded half-up to one decimal.
    pub average_people: f64,
    pub max_people: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScopeGroup {
    pub scope: ScopeKind,
    pub scope_value: String,
    pub chart_series: Vec<ChartPoint>,
    pub statistics: ScopeGroupStatistics,
}

/// Query parameters for the statistics endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsQuery {
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
    #[serde(default)]
    pub days: Option<u32>,
}

/// Query parameters for the per-scope breakdown.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeGroupsQuery {
    pub meeting_type: MeetingType,
}
