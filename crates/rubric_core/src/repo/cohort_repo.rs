//! Cohort group and domain repository.
//!
//! # Invariants
//! - Listing order is `name COLLATE NOCASE ASC, uuid ASC`.
//! - Name lookups compare by `model::name_key` and only match active rows.

use super::{
    bool_to_int, ensure_connection_ready, parse_flag, parse_uuid, RepoError, RepoResult,
    TableSpec,
};
use crate::model::cohort::{AggregationMode, CohortGroup, Domain, DomainId, GroupId};
use crate::model::name_key;
use rusqlite::{params, Connection, Row};

const GROUP_SELECT_SQL: &str = "SELECT group_uuid, name, color, is_archived FROM cohort_groups";
const DOMAIN_SELECT_SQL: &str =
    "SELECT domain_uuid, name, color, aggregation_mode, is_archived FROM domains";

const REQUIRED_TABLES: &[TableSpec] = &[
    ("cohort_groups", &["group_uuid", "name", "color", "is_archived"]),
    (
        "domains",
        &["domain_uuid", "name", "color", "aggregation_mode", "is_archived"],
    ),
];

/// Repository interface for groups and domains.
pub trait CohortRepository {
    fn create_group(&self, group: &CohortGroup) -> RepoResult<GroupId>;
    fn update_group(&self, group: &CohortGroup) -> RepoResult<()>;
    fn get_group(&self, id: GroupId) -> RepoResult<Option<CohortGroup>>;
    fn find_group_by_name(&self, name: &str) -> RepoResult<Option<CohortGroup>>;
    fn list_groups(&self, include_archived: bool) -> RepoResult<Vec<CohortGroup>>;

    fn create_domain(&self, domain: &Domain) -> RepoResult<DomainId>;
    fn update_domain(&self, domain: &Domain) -> RepoResult<()>;
    fn get_domain(&self, id: DomainId) -> RepoResult<Option<Domain>>;
    fn find_domain_by_name(&self, name: &str) -> RepoResult<Option<Domain>>;
    fn list_domains(&self, include_archived: bool) -> RepoResult<Vec<Domain>>;
}

pub struct SqliteCohortRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCohortRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }

    fn query_groups(&self, sql: &str, params: impl rusqlite::Params) -> RepoResult<Vec<CohortGroup>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut groups = Vec::new();
        while let Some(row) = rows.next()? {
            groups.push(parse_group_row(row)?);
        }
        Ok(groups)
    }

    fn query_domains(&self, sql: &str, params: impl rusqlite::Params) -> RepoResult<Vec<Domain>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut domains = Vec::new();
        while let Some(row) = rows.next()? {
            domains.push(parse_domain_row(row)?);
        }
        Ok(domains)
    }
}

impl CohortRepository for SqliteCohortRepository<'_> {
    fn create_group(&self, group: &CohortGroup) -> RepoResult<GroupId> {
        group.validate()?;
        self.conn.execute(
            "INSERT INTO cohort_groups (group_uuid, name, color, is_archived)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                group.id.to_string(),
                group.name.as_str(),
                group.color.as_deref(),
                bool_to_int(group.is_archived),
            ],
        )?;
        Ok(group.id)
    }

    fn update_group(&self, group: &CohortGroup) -> RepoResult<()> {
        group.validate()?;
        let changed = self.conn.execute(
            "UPDATE cohort_groups
             SET name = ?2,
                 color = ?3,
                 is_archived = ?4,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE group_uuid = ?1;",
            params![
                group.id.to_string(),
                group.name.as_str(),
                group.color.as_deref(),
                bool_to_int(group.is_archived),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("group", group.id));
        }
        Ok(())
    }

    fn get_group(&self, id: GroupId) -> RepoResult<Option<CohortGroup>> {
        let sql = format!("{GROUP_SELECT_SQL} WHERE group_uuid = ?1;");
        Ok(self.query_groups(&sql, [id.to_string()])?.into_iter().next())
    }

    fn find_group_by_name(&self, name: &str) -> RepoResult<Option<CohortGroup>> {
        let wanted = name_key(name);
        let sql = format!("{GROUP_SELECT_SQL} WHERE is_archived = 0 ORDER BY group_uuid ASC;");
        Ok(self
            .query_groups(&sql, params![])?
            .into_iter()
            .find(|group| name_key(&group.name) == wanted))
    }

    fn list_groups(&self, include_archived: bool) -> RepoResult<Vec<CohortGroup>> {
        let sql = format!(
            "{GROUP_SELECT_SQL}
             WHERE (?1 = 1 OR is_archived = 0)
             ORDER BY name COLLATE NOCASE ASC, group_uuid ASC;"
        );
        self.query_groups(&sql, [bool_to_int(include_archived)])
    }

    fn create_domain(&self, domain: &Domain) -> RepoResult<DomainId> {
        domain.validate()?;
        self.conn.execute(
            "INSERT INTO domains (domain_uuid, name, color, aggregation_mode, is_archived)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                domain.id.to_string(),
                domain.name.as_str(),
                domain.color.as_deref(),
                domain.aggregation_mode.as_db(),
                bool_to_int(domain.is_archived),
            ],
        )?;
        Ok(domain.id)
    }

    fn update_domain(&self, domain: &Domain) -> RepoResult<()> {
        domain.validate()?;
        let changed = self.conn.execute(
            "UPDATE domains
             SET name = ?2,
                 color = ?3,
                 aggregation_mode = ?4,
                 is_archived = ?5,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE domain_uuid = ?1;",
            params![
                domain.id.to_string(),
                domain.name.as_str(),
                domain.color.as_deref(),
                domain.aggregation_mode.as_db(),
                bool_to_int(domain.is_archived),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("domain", domain.id));
        }
        Ok(())
    }

    fn get_domain(&self, id: DomainId) -> RepoResult<Option<Domain>> {
        let sql = format!("{DOMAIN_SELECT_SQL} WHERE domain_uuid = ?1;");
        Ok(self.query_domains(&sql, [id.to_string()])?.into_iter().next())
    }

    fn find_domain_by_name(&self, name: &str) -> RepoResult<Option<Domain>> {
        let wanted = name_key(name);
        let sql = format!("{DOMAIN_SELECT_SQL} WHERE is_archived = 0 ORDER BY domain_uuid ASC;");
        Ok(self
            .query_domains(&sql, params![])?
            .into_iter()
            .find(|domain| name_key(&domain.name) == wanted))
    }

    fn list_domains(&self, include_archived: bool) -> RepoResult<Vec<Domain>> {
        let sql = format!(
            "{DOMAIN_SELECT_SQL}
             WHERE (?1 = 1 OR is_archived = 0)
             ORDER BY name COLLATE NOCASE ASC, domain_uuid ASC;"
        );
        self.query_domains(&sql, [bool_to_int(include_archived)])
    }
}

fn parse_group_row(row: &Row<'_>) -> RepoResult<CohortGroup> {
    let id_text: String = row.get("group_uuid")?;
    Ok(CohortGroup {
        id: parse_uuid(&id_text, "cohort_groups.group_uuid")?,
        name: row.get("name")?,
        color: row.get("color")?,
        is_archived: parse_flag(row.get("is_archived")?, "cohort_groups.is_archived")?,
    })
}

fn parse_domain_row(row: &Row<'_>) -> RepoResult<Domain> {
    let id_text: String = row.get("domain_uuid")?;
    let mode_text: String = row.get("aggregation_mode")?;
    let aggregation_mode = AggregationMode::parse_db(&mode_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid aggregation mode `{mode_text}` in domains.aggregation_mode"
        ))
    })?;
    Ok(Domain {
        id: parse_uuid(&id_text, "domains.domain_uuid")?,
        name: row.get("name")?,
        color: row.get("color")?,
        aggregation_mode,
        is_archived: parse_flag(row.get("is_archived")?, "domains.is_archived")?,
    })
}
