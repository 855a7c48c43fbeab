//! Database repository for attendance records.
//!
//! Writes run in transactions so each submission touches exactly one row, and
//! every call is bounded by the configured store timeout.

use std::future::Future;
use std::time::Duration;

use chrono::{NaiveDate, SecondsFormat, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};

use crate::aggregation::{self, WeekStart};
use crate::errors::AppError;
use crate::models::{
    AttendanceRecord, AttendanceStatistics, MeetingType, ScopeCatalog, ScopeGroup, ScopeKind,
    Submission,
};
use crate::resolver;

macro_rules! select_records {
    ($tail:literal) => {
        concat!(
            "SELECT id, date, meeting_type, scope, scope_value, adult_count, youth_child_count, ",
            "district, notes, created_by, created_at, updated_at FROM attendance ",
            $tail
        )
    };
}

/// Filter and window for the record listing.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub limit: i64,
    pub offset: i64,
    pub meeting_type: Option<MeetingType>,
    pub created_by: Option<String>,
}

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    store_timeout: Duration,
}

impl Repository {
    pub fn new(pool: SqlitePool, store_timeout: Duration) -> Self {
        Self {
            pool,
            store_timeout,
        }
    }

    /// A handle on the same pool whose calls are bounded by `store_timeout`.
    pub fn with_timeout(&self, store_timeout: Duration) -> Self {
        Self {
            pool: self.pool.clone(),
            store_timeout,
        }
    }

    /// Run a store call under the configured timeout. Dropping an unfinished
    /// transaction rolls it back, so a timed-out write leaves nothing behind.
    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = self.store_timeout.as_millis() as u64;
                tracing::warn!(operation, timeout_ms, "Store call timed out");
                Err(AppError::Timeout(format!(
                    "{} timed out after {} ms",
                    operation, timeout_ms
                )))
            }
        }
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        self.bounded("get_revision_id", async {
            let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
                .fetch_one(&self.pool)
                .await?;
            Ok(row.try_get("revision_id")?)
        })
        .await
    }

    // ==================== WRITE OPERATIONS ====================

    /// Insert or overwrite a record for `submission`.
    ///
    /// Returns the stored record and whether an existing row was overwritten.
    /// `BEGIN IMMEDIATE` takes the write lock before the resolver's lookup, so
    /// two identical submissions racing each other are serialized.
    pub async fn record_attendance(
        &self,
        submission: &Submission,
    ) -> Result<(AttendanceRecord, bool), AppError> {
        self.bounded("record_attendance", async {
            let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

            let resolution = resolver::resolve(&mut tx, submission).await?;
            let now = timestamp_now();
            let id = resolver::apply(&mut tx, submission, &resolution, &now).await?;
            bump_revision(&mut tx, &now).await?;

            let row = sqlx::query(select_records!("WHERE id = ?"))
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
            let record = record_from_row(&row)?;

            tx.commit().await?;

            tracing::info!(
                id,
                overwrite = resolution.is_overwrite(),
                scope = record.scope.as_str(),
                "Recorded attendance"
            );
            Ok((record, resolution.is_overwrite()))
        })
        .await
    }

    /// Delete a record. Returns `false` when no record had that id.
    pub async fn delete_attendance(&self, id: i64) -> Result<bool, AppError> {
        self.bounded("delete_attendance", async {
            let mut tx = self.pool.begin().await?;

            let result = sqlx::query("DELETE FROM attendance WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            let deleted = result.rows_affected() > 0;

            if deleted {
                bump_revision(&mut tx, &timestamp_now()).await?;
            }
            tx.commit().await?;

            tracing::info!(id, deleted, "Deleted attendance");
            Ok(deleted)
        })
        .await
    }

    // ==================== READ OPERATIONS ====================

    /// Get a record by ID.
    pub async fn get_attendance(&self, id: i64) -> Result<Option<AttendanceRecord>, AppError> {
        self.bounded("get_attendance", async {
            let row = sqlx::query(select_records!("WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

            row.as_ref().map(record_from_row).transpose()
        })
        .await
    }

    /// List records, most recent meeting date first, then newest id first.
    pub async fn list_attendance(
        &self,
        filter: &RecordFilter,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        self.bounded("list_attendance", async {
            let rows = sqlx::query(select_records!(
                "WHERE (?1 IS NULL OR meeting_type = ?1) AND (?2 IS NULL OR created_by = ?2) \
                 ORDER BY date DESC, id DESC LIMIT ?3 OFFSET ?4"
            ))
            .bind(filter.meeting_type.map(|t| t.as_str()))
            .bind(filter.created_by.as_deref())
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await?;

            rows.iter().map(record_from_row).collect()
        })
        .await
    }

    /// Distinct district and small-group names that have reported.
    pub async fn scope_catalog(&self) -> Result<ScopeCatalog, AppError> {
        self.bounded("scope_catalog", async {
            let rows = sqlx::query(
                r#"SELECT DISTINCT scope, scope_value FROM attendance
                   WHERE scope != 'full_congregation' AND scope_value IS NOT NULL
                   ORDER BY scope_value ASC"#,
            )
            .fetch_all(&self.pool)
            .await?;

            let mut catalog = ScopeCatalog::default();
            for row in &rows {
                let scope: String = row.try_get("scope")?;
                let value: String = row.try_get("scope_value")?;
                match ScopeKind::parse(&scope) {
                    Some(ScopeKind::District) => catalog.districts.push(value),
                    Some(ScopeKind::SmallGroup) => catalog.small_groups.push(value),
                    _ => {}
                }
            }
            Ok(catalog)
        })
        .await
    }

    /// All dashboard aggregates and the revision they reflect, read within one
    /// transaction so they agree.
    pub async fn statistics(
        &self,
        as_of: NaiveDate,
        trend_days: u32,
        week_start: WeekStart,
    ) -> Result<(AttendanceStatistics, i64), AppError> {
        self.bounded("statistics", async {
            let mut tx = self.pool.begin().await?;
            let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
                .fetch_one(&mut *tx)
                .await?;
            let revision_id: i64 = row.try_get("revision_id")?;
            let stats = aggregation::statistics(&mut tx, as_of, trend_days, week_start).await?;
            tx.commit().await?;
            Ok((stats, revision_id))
        })
        .await
    }

    /// Per-scope breakdown for one meeting type.
    pub async fn scope_groups(&self, meeting_type: MeetingType) -> Result<Vec<ScopeGroup>, AppError> {
        self.bounded("scope_groups", async {
            let mut conn = self.pool.acquire().await?;
            aggregation::scope_groups(&mut conn, meeting_type).await
        })
        .await
    }
}

/// Current time as fixed-width RFC 3339 UTC, so string order is time order.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

async fn bump_revision(conn: &mut SqliteConnection, now: &str) -> Result<(), AppError> {
    sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
        .bind(now)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Decode an `attendance` row.
pub fn record_from_row(row: &SqliteRow) -> Result<AttendanceRecord, AppError> {
    let meeting_type: String = row.try_get("meeting_type")?;
    let scope: String = row.try_get("scope")?;
    let id: i64 = row.try_get("id")?;
    let adult_count: i64 = row.try_get("adult_count")?;
    let youth_child_count: i64 = row.try_get("youth_child_count")?;
    let total_people = adult_count
        .checked_add(youth_child_count)
        .ok_or_else(|| AppError::Internal(format!("Headcount overflow in record {}", id)))?;

    Ok(AttendanceRecord {
        id,
        date: row.try_get("date")?,
        meeting_type: MeetingType::parse(&meeting_type).ok_or_else(|| {
            AppError::Internal(format!("Unknown meeting type {:?} in store", meeting_type))
        })?,
        scope: ScopeKind::parse(&scope)
            .ok_or_else(|| AppError::Internal(format!("Unknown scope {:?} in store", scope)))?,
        scope_value: row.try_get("scope_value")?,
        adult_count,
        youth_child_count,
        total_people,
        district: row.try_get("district")?,
        notes: row.try_get("notes")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
