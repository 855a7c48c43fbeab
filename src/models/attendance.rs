//! Attendance record model and the submission it is written from.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Kind of meeting a headcount belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum MeetingType {
    /// Main congregational meeting
    Table,
    /// Small-group meeting
    HomeMeeting,
    Prayer,
}

impl MeetingType {
    pub const ALL: [MeetingType; 3] = [
        MeetingType::Table,
        MeetingType::HomeMeeting,
        MeetingType::Prayer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingType::Table => "table",
            MeetingType::HomeMeeting => "homeMeeting",
            MeetingType::Prayer => "prayer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

/// Organizational breadth a submission claims to represent, without its value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    FullCongregation,
    District,
    SmallGroup,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::FullCongregation => "full_congregation",
            ScopeKind::District => "district",
            ScopeKind::SmallGroup => "small_group",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "full_congregation" => Some(ScopeKind::FullCongregation),
            "district" => Some(ScopeKind::District),
            "small_group" => Some(ScopeKind::SmallGroup),
            _ => None,
        }
    }
}

/// A validated scope: district and small-group scopes always name their target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    FullCongregation,
    District(String),
    SmallGroup(String),
}

impl Scope {
    pub fn kind(&self) -> ScopeKind {
        match self {
            Scope::FullCongregation => ScopeKind::FullCongregation,
            Scope::District(_) => ScopeKind::District,
            Scope::SmallGroup(_) => ScopeKind::SmallGroup,
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Scope::FullCongregation => None,
            Scope::District(v) | Scope::SmallGroup(v) => Some(v),
        }
    }
}

/// A stored attendance submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: i64,
    pub date: NaiveDate,
    pub meeting_type: MeetingType,
    pub scope: ScopeKind,
    pub scope_value: Option<String>,
    pub adult_count: i64,
    pub youth_child_count: i64,
    /// Always `adult_count + youth_child_count`; never stored.
    pub total_people: i64,
    pub district: Option<String>,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Request body for submitting a headcount.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAttendanceRequest {
    pub date: String,
    pub meeting_type: MeetingType,
    pub scope: ScopeKind,
    #[serde(default)]
    pub scope_value: Option<String>,
    pub adult_count: i64,
    pub youth_child_count: i64,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Largest count accepted for either headcount field. The `attendance` table
/// carries the same bound, which keeps every SQL and in-memory sum far below
/// `i64::MAX`.
pub const MAX_HEADCOUNT: i64 = 1_000_000;

/// A submission that has passed validation and can be handed to the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub date: NaiveDate,
    pub meeting_type: MeetingType,
    pub scope: Scope,
    pub adult_count: i64,
    pub youth_child_count: i64,
    pub district: Option<String>,
    pub notes: Option<String>,
    pub created_by: String,
}

impl Submission {
    /// Validate a request against the submitting user and the current local date.
    pub fn validate(
        request: SubmitAttendanceRequest,
        created_by: &str,
        today: NaiveDate,
    ) -> Result<Self, AppError> {
        let date = NaiveDate::parse_from_str(request.date.trim(), "%Y-%m-%d").map_err(|_| {
            AppError::Validation(format!(
                "Invalid date {:?}, expected YYYY-MM-DD",
                request.date
            ))
        })?;
        if date > today {
            return Err(AppError::Validation(format!(
                "Date {} is in the future",
                date
            )));
        }

        check_headcount("adultCount", request.adult_count)?;
        check_headcount("youthChildCount", request.youth_child_count)?;

        let scope_value = non_blank(request.scope_value);
        let scope = match (request.scope, scope_value) {
            (ScopeKind::FullCongregation, _) => Scope::FullCongregation,
            (ScopeKind::District, Some(v)) => Scope::District(v),
            (ScopeKind::SmallGroup, Some(v)) => Scope::SmallGroup(v),
            (kind, None) => {
                return Err(AppError::Validation(format!(
                    "scopeValue is required when scope is {}",
                    kind.as_str()
                )))
            }
        };

        Ok(Self {
            date,
            meeting_type: request.meeting_type,
            scope,
            adult_count: request.adult_count,
            youth_child_count: request.youth_child_count,
            district: non_blank(request.district),
            notes: non_blank(request.notes),
            created_by: created_by.to_string(),
        })
    }
}

fn check_headcount(field: &str, value: i64) -> Result<(), AppError> {
    if (0..=MAX_HEADCOUNT).contains(&value) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{} must be an integer between 0 and {}",
            field, MAX_HEADCOUNT
        )))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Response body for a submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAttendanceResponse {
    pub record: AttendanceRecord,
    pub was_overwrite: bool,
}

/// Query parameters for the paginated record list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAttendanceQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub meeting_type: Option<MeetingType>,
    #[serde(default)]
    pub created_by: Option<String>,
}

fn default_limit() -> i64 {
    50
}

/// A page of records. `count` is the page length; a page shorter than the
/// requested limit means the listing is exhausted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendancePage {
    pub records: Vec<AttendanceRecord>,
    pub count: usize,
}

/// Response body for a delete.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAttendanceResponse {
    pub success: bool,
    /// False when no record with that id existed.
    pub deleted: bool,
}

/// Distinct scope values that have reported at least once.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScopeCatalog {
    pub districts: Vec<String>,
    pub small_groups: Vec<String>,
}
