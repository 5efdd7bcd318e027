//! Learning objective repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist rubric nodes as a flat parent-pointer table.
//! - Keep code renames and progress keys consistent.
//!
//! # Invariants
//! - At most one of `parent_uuid` / `parent_code` is set per row.
//! - Listing order is deterministic: `sort_order ASC, code ASC`.
//! - Renaming a code rewrites progress records keyed by the old code in the
//!   same transaction.
//! - Progress keyed by a code never outlives the last active objective that
//!   holds it; archived codes can be reused without inheriting values.

use super::{
    bool_to_int, ensure_connection_ready, parse_flag, parse_uuid, RepoError, RepoResult,
    TableSpec,
};
use crate::model::objective::{LearningObjective, ObjectiveId, ParentRef};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

const OBJECTIVE_SELECT_SQL: &str = "SELECT
    objective_uuid,
    code,
    title,
    description,
    is_quantitative,
    parent_uuid,
    parent_code,
    sort_order,
    is_archived
FROM learning_objectives";

const REQUIRED_TABLES: &[TableSpec] = &[(
    "learning_objectives",
    &[
        "objective_uuid",
        "code",
        "title",
        "description",
        "is_quantitative",
        "parent_uuid",
        "parent_code",
        "sort_order",
        "is_archived",
    ],
)];

/// Repository interface for rubric nodes.
pub trait ObjectiveRepository {
    fn create_objective(&self, objective: &LearningObjective) -> RepoResult<ObjectiveId>;
    /// Replaces all fields of an existing objective.
    fn update_objective(&self, objective: &LearningObjective) -> RepoResult<()>;
    fn get_objective(
        &self,
        id: ObjectiveId,
        include_archived: bool,
    ) -> RepoResult<Option<LearningObjective>>;
    /// Finds the active objective holding `code`.
    fn get_by_code(&self, code: &str) -> RepoResult<Option<LearningObjective>>;
    fn list_objectives(&self, include_archived: bool) -> RepoResult<Vec<LearningObjective>>;
    /// Soft-archives the given objectives in one transaction.
    fn archive_objectives(&self, ids: &[ObjectiveId]) -> RepoResult<()>;
    /// Whether an active objective other than `excluding` already uses `code`.
    fn code_in_use(&self, code: &str, excluding: Option<ObjectiveId>) -> RepoResult<bool>;
}

/// SQLite-backed objective repository.
pub struct SqliteObjectiveRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteObjectiveRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl ObjectiveRepository for SqliteObjectiveRepository<'_> {
    fn create_objective(&self, objective: &LearningObjective) -> RepoResult<ObjectiveId> {
        objective.validate()?;
        let (parent_uuid, parent_code) = parent_columns(objective.parent.as_ref());

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO learning_objectives (
                objective_uuid,
                code,
                title,
                description,
                is_quantitative,
                parent_uuid,
                parent_code,
                sort_order,
                is_archived
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                objective.id.to_string(),
                objective.code.as_str(),
                objective.title.as_str(),
                objective.description.as_deref(),
                bool_to_int(objective.is_quantitative),
                parent_uuid,
                parent_code,
                objective.sort_order,
                bool_to_int(objective.is_archived),
            ],
        )?;
        // A fresh objective starts without progress, even on a reused code.
        clear_progress_for_code(&tx, &objective.code)?;
        tx.commit()?;
        Ok(objective.id)
    }

    fn update_objective(&self, objective: &LearningObjective) -> RepoResult<()> {
        objective.validate()?;
        let (parent_uuid, parent_code) = parent_columns(objective.parent.as_ref());

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let previous_code: Option<String> = tx
            .query_row(
                "SELECT code FROM learning_objectives WHERE objective_uuid = ?1;",
                [objective.id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(previous_code) = previous_code else {
            return Err(RepoError::not_found("objective", objective.id));
        };

        tx.execute(
            "UPDATE learning_objectives
             SET
                code = ?2,
                title = ?3,
                description = ?4,
                is_quantitative = ?5,
                parent_uuid = ?6,
                parent_code = ?7,
                sort_order = ?8,
                is_archived = ?9,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE objective_uuid = ?1;",
            params![
                objective.id.to_string(),
                objective.code.as_str(),
                objective.title.as_str(),
                objective.description.as_deref(),
                bool_to_int(objective.is_quantitative),
                parent_uuid,
                parent_code,
                objective.sort_order,
                bool_to_int(objective.is_archived),
            ],
        )?;

        if previous_code != objective.code {
            clear_progress_for_code(&tx, &objective.code)?;
            let moved = tx.execute(
                "UPDATE progress_records
                 SET objective_code = ?2,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE objective_code = ?1;",
                params![previous_code.as_str(), objective.code.as_str()],
            )?;
            tx.execute(
                "UPDATE learning_objectives
                 SET parent_code = ?2
                 WHERE parent_code = ?1;",
                params![previous_code.as_str(), objective.code.as_str()],
            )?;
            info!(
                "event=objective_recode module=repo status=ok objective_id={} progress_rows={}",
                objective.id, moved
            );
        }

        tx.commit()?;
        Ok(())
    }

    fn get_objective(
        &self,
        id: ObjectiveId,
        include_archived: bool,
    ) -> RepoResult<Option<LearningObjective>> {
        let mut stmt = self.conn.prepare(&format!(
            "{OBJECTIVE_SELECT_SQL}
             WHERE objective_uuid = ?1
               AND (?2 = 1 OR is_archived = 0);"
        ))?;
        let mut rows = stmt.query(params![id.to_string(), bool_to_int(include_archived)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_objective_row(row)?));
        }
        Ok(None)
    }

    fn get_by_code(&self, code: &str) -> RepoResult<Option<LearningObjective>> {
        let mut stmt = self.conn.prepare(&format!(
            "{OBJECTIVE_SELECT_SQL}
             WHERE code = ?1
               AND is_archived = 0;"
        ))?;
        let mut rows = stmt.query([code])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_objective_row(row)?));
        }
        Ok(None)
    }

    fn list_objectives(&self, include_archived: bool) -> RepoResult<Vec<LearningObjective>> {
        let mut stmt = self.conn.prepare(&format!(
            "{OBJECTIVE_SELECT_SQL}
             WHERE (?1 = 1 OR is_archived = 0)
             ORDER BY sort_order ASC, code ASC;"
        ))?;
        let mut rows = stmt.query([bool_to_int(include_archived)])?;
        let mut objectives = Vec::new();
        while let Some(row) = rows.next()? {
            objectives.push(parse_objective_row(row)?);
        }
        Ok(objectives)
    }

    fn archive_objectives(&self, ids: &[ObjectiveId]) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for id in ids {
            let changed = tx.execute(
                "UPDATE learning_objectives
                 SET is_archived = 1,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE objective_uuid = ?1
                   AND is_archived = 0;",
                [id.to_string()],
            )?;
            if changed == 0 {
                return Err(RepoError::not_found("objective", id));
            }
            let cleared = tx.execute(
                "DELETE FROM progress_records
                 WHERE objective_code = (
                        SELECT code FROM learning_objectives WHERE objective_uuid = ?1
                     )
                   AND NOT EXISTS (
                        SELECT 1
                        FROM learning_objectives
                        WHERE code = progress_records.objective_code
                          AND is_archived = 0
                     );",
                [id.to_string()],
            )?;
            if cleared > 0 {
                info!(
                    "event=objective_archive module=repo status=ok objective_id={} progress_rows_cleared={}",
                    id, cleared
                );
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn code_in_use(&self, code: &str, excluding: Option<ObjectiveId>) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM learning_objectives
                WHERE code = ?1
                  AND is_archived = 0
                  AND (?2 IS NULL OR objective_uuid <> ?2)
            );",
            params![code, excluding.map(|id| id.to_string())],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

/// Drops progress rows left behind under `code` by archived objectives.
fn clear_progress_for_code(conn: &Connection, code: &str) -> RepoResult<usize> {
    Ok(conn.execute(
        "DELETE FROM progress_records WHERE objective_code = ?1;",
        [code],
    )?)
}

fn parent_columns(parent: Option<&ParentRef>) -> (Option<String>, Option<String>) {
    match parent {
        Some(ParentRef::Id(id)) => (Some(id.to_string()), None),
        Some(ParentRef::Code(code)) => (None, Some(code.clone())),
        None => (None, None),
    }
}

fn parse_objective_row(row: &Row<'_>) -> RepoResult<LearningObjective> {
    let id_text: String = row.get("objective_uuid")?;
    let id = parse_uuid(&id_text, "learning_objectives.objective_uuid")?;

    let parent_uuid = row
        .get::<_, Option<String>>("parent_uuid")?
        .map(|value| parse_uuid(&value, "learning_objectives.parent_uuid"))
        .transpose()?;
    let parent_code: Option<String> = row.get("parent_code")?;
    let parent = match (parent_uuid, parent_code) {
        (Some(parent_id), None) => Some(ParentRef::Id(parent_id)),
        (None, Some(code)) => Some(ParentRef::Code(code)),
        (None, None) => None,
        (Some(_), Some(_)) => {
            return Err(RepoError::InvalidData(format!(
                "objective {id} has both parent_uuid and parent_code"
            )));
        }
    };

    Ok(LearningObjective {
        id,
        code: row.get("code")?,
        title: row.get("title")?,
        description: row.get("description")?,
        is_quantitative: parse_flag(
            row.get("is_quantitative")?,
            "learning_objectives.is_quantitative",
        )?,
        parent,
        sort_order: row.get("sort_order")?,
        is_archived: parse_flag(row.get("is_archived")?, "learning_objectives.is_archived")?,
    })
}
