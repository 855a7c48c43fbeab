//! Upsert resolution for attendance submissions.
//!
//! Full-congregation headcounts are always appended: several ushers may count
//! the same meeting and every count is kept. District and small-group
//! submissions replace whatever was previously reported for the same
//! `(date, meeting_type, scope, scope_value)` tuple.
//!
//! Both functions take a connection that is already inside a write
//! transaction; the caller owns begin/commit so the lookup and the write are
//! one atomic step.

use sqlx::{Row, SqliteConnection};

use crate::errors::AppError;
use crate::models::Submission;

/// What to do with an incoming submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Insert,
    /// Overwrite `existing_id` in place. `surplus` lists older rows that share
    /// the tuple; they are left untouched.
    Overwrite { existing_id: i64, surplus: Vec<i64> },
}

impl Resolution {
    /// Pick the canonical row from candidates ordered most recently updated first.
    pub fn from_candidates(candidates: Vec<i64>) -> Self {
        let mut candidates = candidates.into_iter();
        match candidates.next() {
            None => Resolution::Insert,
            Some(existing_id) => Resolution::Overwrite {
                existing_id,
                surplus: candidates.collect(),
            },
        }
    }

    pub fn is_overwrite(&self) -> bool {
        matches!(self, Resolution::Overwrite { .. })
    }
}

/// Decide between insert and overwrite for `submission`.
pub async fn resolve(
    conn: &mut SqliteConnection,
    submission: &Submission,
) -> Result<Resolution, AppError> {
    let Some(scope_value) = submission.scope.value() else {
        return Ok(Resolution::Insert);
    };

    let rows = sqlx::query(
        r#"SELECT id FROM attendance
           WHERE date = ? AND meeting_type = ? AND scope = ? AND scope_value = ?
           ORDER BY updated_at DESC, id DESC"#,
    )
    .bind(submission.date)
    .bind(submission.meeting_type.as_str())
    .bind(submission.scope.kind().as_str())
    .bind(scope_value)
    .fetch_all(&mut *conn)
    .await?;

    let candidates = rows
        .iter()
        .map(|row| row.try_get::<i64, _>("id"))
        .collect::<Result<Vec<_>, _>>()?;

    let resolution = Resolution::from_candidates(candidates);
    if let Resolution::Overwrite {
        existing_id,
        surplus,
    } = &resolution
    {
        if !surplus.is_empty() {
            tracing::warn!(
                date = %submission.date,
                meeting_type = submission.meeting_type.as_str(),
                scope = submission.scope.kind().as_str(),
                scope_value,
                canonical_id = existing_id,
                ?surplus,
                "Duplicate attendance rows for a unique tuple; overwriting the most recent"
            );
        }
    }

    Ok(resolution)
}

/// Carry out `resolution`, returning the id of the written row.
pub async fn apply(
    conn: &mut SqliteConnection,
    submission: &Submission,
    resolution: &Resolution,
    now: &str,
) -> Result<i64, AppError> {
    match resolution {
        Resolution::Insert => {
            let result = sqlx::query(
                r#"INSERT INTO attendance (
                    date, meeting_type, scope, scope_value, adult_count, youth_child_count,
                    district, notes, created_by, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(submission.date)
            .bind(submission.meeting_type.as_str())
            .bind(submission.scope.kind().as_str())
            .bind(submission.scope.value())
            .bind(submission.adult_count)
            .bind(submission.youth_child_count)
            .bind(&submission.district)
            .bind(&submission.notes)
            .bind(&submission.created_by)
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await?;

            Ok(result.last_insert_rowid())
        }
        Resolution::Overwrite { existing_id, .. } => {
            let result = sqlx::query(
                r#"UPDATE attendance
                   SET adult_count = ?, youth_child_count = ?, district = ?, notes = ?, updated_at = ?
                   WHERE id = ?"#,
            )
            .bind(submission.adult_count)
            .bind(submission.youth_child_count)
            .bind(&submission.district)
            .bind(&submission.notes)
            .bind(now)
            .bind(*existing_id)
            .execute(&mut *conn)
            .await?;

            if result.rows_affected() == 0 {
                // The row was found under the same write lock, so this cannot
                // happen unless the lock is not held.
                return Err(AppError::Internal(format!(
                    "Attendance record {} vanished during overwrite",
                    existing_id
                )));
            }

            Ok(*existing_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_candidates_inserts() {
        assert_eq!(Resolution::from_candidates(vec![]), Resolution::Insert);
    }

    #[test]
    fn test_single_candidate_is_overwritten() {
        let resolution = Resolution::from_candidates(vec![12]);
        assert_eq!(
            resolution,
            Resolution::Overwrite {
                existing_id: 12,
                surplus: vec![]
            }
        );
        assert!(resolution.is_overwrite());
    }

    #[test]
    fn test_first_of_many_candidates_is_canonical() {
        assert_eq!(
            Resolution::from_candidates(vec![9, 4, 2]),
            Resolution::Overwrite {
                existing_id: 9,
                surplus: vec![4, 2]
            }
        );
    }
}
