use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::{AttendanceRecord, ChartPoint, ScopeGroup, ScopeGroupStatistics, ScopeKind};

/// Group records by `(scope, scope_value)`.
///
/// Each group gets one chart point per distinct date (rows sharing a date are
/// summed) and statistics over all of its rows. Full-congregation records carry
/// no scope value and are skipped. Groups come out district first, then small
/// group, each ordered by scope value.
pub fn group_by_scope_value(records: &[AttendanceRecord]) -> Vec<ScopeGroup> {
    let mut groups: BTreeMap<(ScopeKind, &str), Vec<&AttendanceRecord>> = BTreeMap::new();
    for record in records {
        if record.scope == ScopeKind::FullCongregation {
            continue;
        }
        if let Some(value) = record.scope_value.as_deref() {
            groups.entry((record.scope, value)).or_default().push(record);
        }
    }

    // ScopeKind orders District before SmallGroup, so the map is already sorted.
    groups
        .into_iter()
        .map(|((scope, scope_value), rows)| build_group(scope, scope_value, &rows))
        .collect()
}

fn build_group(scope: ScopeKind, scope_value: &str, rows: &[&AttendanceRecord]) -> ScopeGroup {
    let mut by_date: BTreeMap<NaiveDate, (i64, i64)> = BTreeMap::new();
    for row in rows {
        let entry = by_date.entry(row.date).or_default();
        entry.0 = entry.0.saturating_add(row.adult_count);
        entry.1 = entry.1.saturating_add(row.youth_child_count);
    }

    let chart_series: Vec<ChartPoint> = by_date
        .into_iter()
        .map(|(date, (adults, youth_children))| ChartPoint {
            date,
            adults,
            youth_children,
            total_people: adults.saturating_add(youth_children),
        })
        .collect();

    let total_adults = saturating_sum(rows.iter().map(|r| r.adult_count));
    let total_youth_children = saturating_sum(rows.iter().map(|r| r.youth_child_count));
    let total_people = total_adults.saturating_add(total_youth_children);
    let max_people = chart_series
        .iter()
        .map(|p| p.total_people)
        .max()
        .unwrap_or(0);

    ScopeGroup {
        scope,
        scope_value: scope_value.to_string(),
        statistics: ScopeGroupStatistics {
            record_count: rows.len() as i64,
            total_adults,
            total_youth_children,
            total_people,
            average_people: average_tenths(total_people, chart_series.len() as i64),
            max_people,
        },
        chart_series,
    }
}

fn saturating_sum(values: impl Iterator<Item = i64>) -> i64 {
    values.fold(0, i64::saturating_add)
}

/// `total / count` rounded half-up to one decimal place. The integer division
/// runs in `i128` so `20 * total` cannot overflow.
pub fn average_tenths(total: i64, count: i64) -> f64 {
    if count <= 0 {
        return 0.0;
    }
    let (total, count) = (i128::from(total), i128::from(count));
    let tenths = (20 * total + count) / (2 * count);
    tenths as f64 / 10.0
}
