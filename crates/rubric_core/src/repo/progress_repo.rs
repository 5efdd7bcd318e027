//! Leaf progress repository.
//!
//! # Invariants
//! - At most one row per `(subject, objective_code)`; writes upsert.
//! - Stored percentages are always within `0..=100`.

use super::{ensure_connection_ready, RepoError, RepoResult, TableSpec};
use crate::model::progress::{CompletionPercentage, ProgressRecord, ProgressSubject};
use crate::progress::LeafValues;
use rusqlite::{params, Connection, OptionalExtension};

const REQUIRED_TABLES: &[TableSpec] = &[(
    "progress_records",
    &["subject_kind", "subject_uuid", "objective_code", "percentage"],
)];

pub trait ProgressRepository {
    /// Inserts or replaces the value for one leaf.
    fn set_percentage(
        &self,
        subject: ProgressSubject,
        objective_code: &str,
        percentage: CompletionPercentage,
    ) -> RepoResult<()>;
    fn get_percentage(
        &self,
        subject: ProgressSubject,
        objective_code: &str,
    ) -> RepoResult<Option<CompletionPercentage>>;
    /// Removes one stored value; returns whether a row existed.
    fn clear_percentage(&self, subject: ProgressSubject, objective_code: &str)
        -> RepoResult<bool>;
    fn list_records(&self, subject: ProgressSubject) -> RepoResult<Vec<ProgressRecord>>;
    /// All stored values of a subject keyed by objective code.
    fn leaf_values(&self, subject: ProgressSubject) -> RepoResult<LeafValues> {
        Ok(self
            .list_records(subject)?
            .into_iter()
            .map(|record| (record.objective_code, record.percentage.value()))
            .collect())
    }
}

pub struct SqliteProgressRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProgressRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl ProgressRepository for SqliteProgressRepository<'_> {
    fn set_percentage(
        &self,
        subject: ProgressSubject,
        objective_code: &str,
        percentage: CompletionPercentage,
    ) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO progress_records (subject_kind, subject_uuid, objective_code, percentage)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (subject_kind, subject_uuid, objective_code)
             DO UPDATE SET
                percentage = excluded.percentage,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                subject.kind_str(),
                subject.id().to_string(),
                objective_code,
                i64::from(percentage),
            ],
        )?;
        Ok(())
    }

    fn get_percentage(
        &self,
        subject: ProgressSubject,
        objective_code: &str,
    ) -> RepoResult<Option<CompletionPercentage>> {
        let value: Option<i64> = self
            .conn
            .query_row(
                "SELECT percentage
                 FROM progress_records
                 WHERE subject_kind = ?1
                   AND subject_uuid = ?2
                   AND objective_code = ?3;",
                params![subject.kind_str(), subject.id().to_string(), objective_code],
                |row| row.get(0),
            )
            .optional()?;
        value.map(parse_percentage).transpose()
    }

    fn clear_percentage(
        &self,
        subject: ProgressSubject,
        objective_code: &str,
    ) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM progress_records
             WHERE subject_kind = ?1
               AND subject_uuid = ?2
               AND objective_code = ?3;",
            params![subject.kind_str(), subject.id().to_string(), objective_code],
        )?;
        Ok(changed > 0)
    }

    fn list_records(&self, subject: ProgressSubject) -> RepoResult<Vec<ProgressRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT objective_code, percentage
             FROM progress_records
             WHERE subject_kind = ?1
               AND subject_uuid = ?2
             ORDER BY objective_code ASC;",
        )?;
        let mut rows = stmt.query(params![subject.kind_str(), subject.id().to_string()])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(ProgressRecord {
                subject,
                objective_code: row.get(0)?,
                percentage: parse_percentage(row.get(1)?)?,
            });
        }
        Ok(records)
    }
}

fn parse_percentage(value: i64) -> RepoResult<CompletionPercentage> {
    CompletionPercentage::new(value).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid percentage `{value}` in progress_records.percentage"
        ))
    })
}
