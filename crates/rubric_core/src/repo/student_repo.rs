//! Student repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist students with their group memberships and custom properties.
//!
//! # Invariants
//! - Student row, memberships and properties are written in one transaction.
//! - Membership and property order is preserved via `position`.
//! - Listing order is `name COLLATE NOCASE ASC, student_uuid ASC`.

use super::{
    bool_to_int, ensure_connection_ready, parse_flag, parse_uuid, RepoError, RepoResult,
    TableSpec,
};
use crate::model::cohort::GroupId;
use crate::model::name_key;
use crate::model::student::{CustomProperty, Session, Student, StudentId};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};

const STUDENT_SELECT_SQL: &str = "SELECT
    student_uuid,
    name,
    domain_uuid,
    session,
    is_archived
FROM students";

const REQUIRED_TABLES: &[TableSpec] = &[
    (
        "students",
        &["student_uuid", "name", "domain_uuid", "session", "is_archived"],
    ),
    ("student_groups", &["student_uuid", "group_uuid", "position"]),
    (
        "student_properties",
        &["student_uuid", "key_normalized", "key", "value", "position"],
    ),
];

/// Repository interface for student persistence.
pub trait StudentRepository {
    fn create_student(&self, student: &Student) -> RepoResult<StudentId>;
    /// Replaces the row, memberships and properties of an existing student.
    fn update_student(&self, student: &Student) -> RepoResult<()>;
    fn get_student(&self, id: StudentId, include_archived: bool) -> RepoResult<Option<Student>>;
    fn list_students(&self, include_archived: bool) -> RepoResult<Vec<Student>>;
    /// Removes the student and everything keyed by it.
    fn delete_student(&self, id: StudentId) -> RepoResult<()>;
}

pub struct SqliteStudentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStudentRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl StudentRepository for SqliteStudentRepository<'_> {
    fn create_student(&self, student: &Student) -> RepoResult<StudentId> {
        student.validate()?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO students (student_uuid, name, domain_uuid, session, is_archived)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                student.id.to_string(),
                student.name.as_str(),
                student.domain_id.map(|id| id.to_string()),
                student.session.as_db(),
                bool_to_int(student.is_archived),
            ],
        )?;
        write_memberships(&tx, student)?;
        write_properties(&tx, student)?;
        tx.commit()?;
        Ok(student.id)
    }

    fn update_student(&self, student: &Student) -> RepoResult<()> {
        student.validate()?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE students
             SET name = ?2,
                 domain_uuid = ?3,
                 session = ?4,
                 is_archived = ?5,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE student_uuid = ?1;",
            params![
                student.id.to_string(),
                student.name.as_str(),
                student.domain_id.map(|id| id.to_string()),
                student.session.as_db(),
                bool_to_int(student.is_archived),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("student", student.id));
        }

        tx.execute(
            "DELETE FROM student_groups WHERE student_uuid = ?1;",
            [student.id.to_string()],
        )?;
        tx.execute(
            "DELETE FROM student_properties WHERE student_uuid = ?1;",
            [student.id.to_string()],
        )?;
        write_memberships(&tx, student)?;
        write_properties(&tx, student)?;
        tx.commit()?;
        Ok(())
    }

    fn get_student(&self, id: StudentId, include_archived: bool) -> RepoResult<Option<Student>> {
        let mut stmt = self.conn.prepare(&format!(
            "{STUDENT_SELECT_SQL}
             WHERE student_uuid = ?1
               AND (?2 = 1 OR is_archived = 0);"
        ))?;
        let mut rows = stmt.query(params![id.to_string(), bool_to_int(include_archived)])?;
        match rows.next()? {
            Some(row) => {
                let mut student = parse_student_row(row)?;
                load_relations(self.conn, &mut student)?;
                Ok(Some(student))
            }
            None => Ok(None),
        }
    }

    fn list_students(&self, include_archived: bool) -> RepoResult<Vec<Student>> {
        let mut stmt = self.conn.prepare(&format!(
            "{STUDENT_SELECT_SQL}
             WHERE (?1 = 1 OR is_archived = 0)
             ORDER BY name COLLATE NOCASE ASC, student_uuid ASC;"
        ))?;
        let mut rows = stmt.query([bool_to_int(include_archived)])?;
        let mut students = Vec::new();
        while let Some(row) = rows.next()? {
            students.push(parse_student_row(row)?);
        }
        for student in &mut students {
            load_relations(self.conn, student)?;
        }
        Ok(students)
    }

    fn delete_student(&self, id: StudentId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM students WHERE student_uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("student", id));
        }
        Ok(())
    }
}

fn write_memberships(conn: &Connection, student: &Student) -> RepoResult<()> {
    for (position, group_id) in student.group_ids.iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO student_groups (student_uuid, group_uuid, position)
             VALUES (?1, ?2, ?3);",
            params![student.id.to_string(), group_id.to_string(), position as i64],
        )?;
    }
    Ok(())
}

fn write_properties(conn: &Connection, student: &Student) -> RepoResult<()> {
    for (position, property) in student.properties.iter().enumerate() {
        conn.execute(
            "INSERT INTO student_properties (student_uuid, key_normalized, key, value, position)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                student.id.to_string(),
                name_key(&property.key),
                property.key.trim(),
                property.value.as_str(),
                position as i64,
            ],
        )?;
    }
    Ok(())
}

fn load_relations(conn: &Connection, student: &mut Student) -> RepoResult<()> {
    let student_uuid = student.id.to_string();

    let mut stmt = conn.prepare(
        "SELECT group_uuid
         FROM student_groups
         WHERE student_uuid = ?1
         ORDER BY position ASC, group_uuid ASC;",
    )?;
    let mut rows = stmt.query([student_uuid.as_str()])?;
    let mut group_ids: Vec<GroupId> = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        group_ids.push(parse_uuid(&value, "student_groups.group_uuid")?);
    }

    let mut stmt = conn.prepare(
        "SELECT key, value
         FROM student_properties
         WHERE student_uuid = ?1
         ORDER BY position ASC, key_normalized ASC;",
    )?;
    let mut rows = stmt.query([student_uuid.as_str()])?;
    let mut properties = Vec::new();
    while let Some(row) = rows.next()? {
        properties.push(CustomProperty::new(
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
        ));
    }

    student.group_ids = group_ids;
    student.properties = properties;
    Ok(())
}

fn parse_student_row(row: &Row<'_>) -> RepoResult<Student> {
    let id_text: String = row.get("student_uuid")?;
    let domain_id = row
        .get::<_, Option<String>>("domain_uuid")?
        .map(|value| parse_uuid(&value, "students.domain_uuid"))
        .transpose()?;
    let session_text: String = row.get("session")?;
    let session = Session::parse_db(&session_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid session `{session_text}` in students.session"))
    })?;

    Ok(Student {
        id: parse_uuid(&id_text, "students.student_uuid")?,
        name: row.get("name")?,
        group_ids: Vec::new(),
        domain_id,
        session,
        properties: Vec::new(),
        is_archived: parse_flag(row.get("is_archived")?, "students.is_archived")?,
    })
}
