//! Read-side aggregation over the attendance table.
//!
//! Every query here is read-only and takes an explicit `as_of` date instead of
//! consulting the clock, so results depend only on the store snapshot and the
//! arguments. Callers that need several aggregates from one snapshot run them
//! on the same transaction.

mod scope_groups;

pub use scope_groups::*;

use chrono::{Datelike, Duration, NaiveDate};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};

use crate::errors::AppError;
use crate::models::{
    AttendanceStatistics, DistrictBreakdown, MeetingType, MeetingTypeBreakdown, Rollup,
    ScopeGroup, TrendPoint,
};

/// First day of a calendar week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekStart {
    Monday,
    Sunday,
}

impl WeekStart {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "monday" | "mon" => Some(WeekStart::Monday),
            "sunday" | "sun" => Some(WeekStart::Sunday),
            _ => None,
        }
    }

    /// Days elapsed since the start of the week containing `date`.
    fn offset(&self, date: NaiveDate) -> i64 {
        let weekday = date.weekday();
        match self {
            WeekStart::Monday => i64::from(weekday.num_days_from_monday()),
            WeekStart::Sunday => i64::from(weekday.num_days_from_sunday()),
        }
    }
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Rollup windows, all ending on `as_of`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Today,
    ThisWeek,
    ThisMonth,
    AllTime,
}

impl Window {
    /// Date range covered by the window, or `None` for no date filter.
    pub fn range(&self, as_of: NaiveDate, week_start: WeekStart) -> Option<DateRange> {
        let start = match self {
            Window::Today => as_of,
            Window::ThisWeek => as_of - Duration::days(week_start.offset(as_of)),
            Window::ThisMonth => as_of.with_day(1)?,
            Window::AllTime => return None,
        };
        Some(DateRange { start, end: as_of })
    }
}

/// The `days` most recent calendar days ending on `as_of`.
pub fn trend_range(as_of: NaiveDate, days: u32) -> DateRange {
    let span = i64::from(days.max(1)) - 1;
    DateRange {
        start: as_of - Duration::days(span),
        end: as_of,
    }
}

/// Sum records, adults and youth/children over `range` (whole store if `None`).
pub async fn rollup(
    conn: &mut SqliteConnection,
    range: Option<DateRange>,
) -> Result<Rollup, AppError> {
    let row = match range {
        Some(range) => {
            sqlx::query(
                r#"SELECT COUNT(*) AS records,
                          COALESCE(SUM(adult_count), 0) AS adults,
                          COALESCE(SUM(youth_child_count), 0) AS youth_children
                   FROM attendance WHERE date >= ? AND date <= ?"#,
            )
            .bind(range.start)
            .bind(range.end)
            .fetch_one(&mut *conn)
            .await?
        }
        None => {
            sqlx::query(
                r#"SELECT COUNT(*) AS records,
                          COALESCE(SUM(adult_count), 0) AS adults,
                          COALESCE(SUM(youth_child_count), 0) AS youth_children
                   FROM attendance"#,
            )
            .fetch_one(&mut *conn)
            .await?
        }
    };

    let (records, adults, youth_children) = sums_from_row(&row, "records")?;
    Ok(Rollup::new(records, adults, youth_children))
}

/// Totals per meeting type across all scopes and dates, in enum order.
pub async fn by_meeting_type(
    conn: &mut SqliteConnection,
) -> Result<Vec<MeetingTypeBreakdown>, AppError> {
    let rows = sqlx::query(
        r#"SELECT meeting_type, COUNT(*) AS count,
                  SUM(adult_count) AS adults, SUM(youth_child_count) AS youth_children
           FROM attendance GROUP BY meeting_type"#,
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut breakdown = rows
        .iter()
        .map(|row| -> Result<MeetingTypeBreakdown, AppError> {
            let raw: String = row.try_get("meeting_type")?;
            let meeting_type = MeetingType::parse(&raw).ok_or_else(|| {
                AppError::Internal(format!("Unknown meeting type {:?} in store", raw))
            })?;
            let (count, adults, youth_children) = sums_from_row(row, "count")?;
            Ok(MeetingTypeBreakdown {
                meeting_type,
                count,
                adults,
                youth_children,
                total_people: adults + youth_children,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    breakdown.sort_by_key(|b| b.meeting_type);
    Ok(breakdown)
}

/// Totals per `district` field, skipping records without one.
pub async fn by_district(conn: &mut SqliteConnection) -> Result<Vec<DistrictBreakdown>, AppError> {
    let rows = sqlx::query(
        r#"SELECT district, COUNT(*) AS count,
                  SUM(adult_count) AS adults, SUM(youth_child_count) AS youth_children
           FROM attendance WHERE district IS NOT NULL
           GROUP BY district ORDER BY district ASC"#,
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> Result<DistrictBreakdown, AppError> {
            let (count, adults, youth_children) = sums_from_row(row, "count")?;
            Ok(DistrictBreakdown {
                district: row.try_get("district")?,
                count,
                adults,
                youth_children,
                total_people: adults + youth_children,
            })
        })
        .collect()
}

/// Per-date totals over the trend range, ascending. Dates without records are
/// omitted rather than zero-filled.
pub async fn daily_trend(
    conn: &mut SqliteConnection,
    as_of: NaiveDate,
    days: u32,
) -> Result<Vec<TrendPoint>, AppError> {
    let range = trend_range(as_of, days);
    let rows = sqlx::query(
        r#"SELECT date, COUNT(*) AS record_count,
                  SUM(adult_count) AS adults, SUM(youth_child_count) AS youth_children
           FROM attendance WHERE date >= ? AND date <= ?
           GROUP BY date ORDER BY date ASC"#,
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> Result<TrendPoint, AppError> {
            let (record_count, adults, youth_children) = sums_from_row(row, "record_count")?;
            Ok(TrendPoint {
                date: row.try_get("date")?,
                record_count,
                adults,
                youth_children,
                total_people: adults + youth_children,
            })
        })
        .collect()
}

/// Every aggregate for the dashboard, read from a single connection.
pub async fn statistics(
    conn: &mut SqliteConnection,
    as_of: NaiveDate,
    trend_days: u32,
    week_start: WeekStart,
) -> Result<AttendanceStatistics, AppError> {
    let total = rollup(conn, Window::AllTime.range(as_of, week_start)).await?;
    let today = rollup(conn, Window::Today.range(as_of, week_start)).await?;
    let this_week = rollup(conn, Window::ThisWeek.range(as_of, week_start)).await?;
    let this_month = rollup(conn, Window::ThisMonth.range(as_of, week_start)).await?;

    Ok(AttendanceStatistics {
        as_of,
        total,
        today,
        this_week,
        this_month,
        by_meeting_type: by_meeting_type(conn).await?,
        by_district: by_district(conn).await?,
        daily_trend: daily_trend(conn, as_of, trend_days).await?,
    })
}

/// Per-scope chart series and statistics for one meeting type.
pub async fn scope_groups(
    conn: &mut SqliteConnection,
    meeting_type: MeetingType,
) -> Result<Vec<ScopeGroup>, AppError> {
    let rows = sqlx::query(
        r#"SELECT id, date, meeting_type, scope, scope_value, adult_count, youth_child_count,
                  district, notes, created_by, created_at, updated_at
           FROM attendance
           WHERE meeting_type = ? AND scope != 'full_congregation'"#,
    )
    .bind(meeting_type.as_str())
    .fetch_all(&mut *conn)
    .await?;

    let records = rows
        .iter()
        .map(crate::db::record_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(group_by_scope_value(&records))
}

fn sums_from_row(row: &SqliteRow, count_column: &str) -> Result<(i64, i64, i64), AppError> {
    Ok((
        row.try_get(count_column)?,
        row.try_get("adults")?,
        row.try_get("youth_children")?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_week_window_monday_start() {
        // 2025-09-07 is a Sunday.
        let range = Window::ThisWeek
            .range(date(2025, 9, 7), WeekStart::Monday)
            .unwrap();
        assert_eq!(range.start, date(2025, 9, 1));
        assert_eq!(range.end, date(2025, 9, 7));
    }

    #[test]
    fn test_week_window_sunday_start() {
        let range = Window::ThisWeek
            .range(date(2025, 9, 7), WeekStart::Sunday)
            .unwrap();
        assert_eq!(range.start, date(2025, 9, 7));

        let range = Window::ThisWeek
            .range(date(2025, 9, 10), WeekStart::Sunday)
            .unwrap();
        assert_eq!(range.start, date(2025, 9, 7));
    }

    #[test]
    fn test_month_and_today_windows() {
        let as_of = date(2024, 2, 29);
        assert_eq!(
            Window::ThisMonth.range(as_of, WeekStart::Monday),
            Some(DateRange {
                start: date(2024, 2, 1),
                end: as_of
            })
        );
        assert_eq!(
            Window::Today.range(as_of, WeekStart::Monday),
            Some(DateRange {
                start: as_of,
                end: as_of
            })
        );
        assert_eq!(Window::AllTime.range(as_of, WeekStart::Monday), None);
    }

    #[test]
    fn test_trend_range_spans_requested_days() {
        let range = trend_range(date(2025, 9, 30), 30);
        assert_eq!(range.start, date(2025, 9, 1));
        assert_eq!(range.end, date(2025, 9, 30));

        let single = trend_range(date(2025, 9, 30), 1);
        assert_eq!(single.start, single.end);
    }

    #[test]
    fn test_week_start_parse() {
        assert_eq!(WeekStart::parse("Monday"), Some(WeekStart::Monday));
        assert_eq!(WeekStart::parse("sun"), Some(WeekStart::Sunday));
        assert_eq!(WeekStart::parse("friday"), None);
    }
}
