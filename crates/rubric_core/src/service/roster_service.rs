//! Roster use-case service: students, cohort groups and domains.
//!
//! # Invariants
//! - Student, group and domain names are trimmed and non-blank.
//! - Group and domain names are unique among active rows by `name_key`.
//! - Students only reference active groups/domains at assignment time.

use crate::model::cohort::{AggregationMode, CohortGroup, Domain, DomainId, GroupId};
use crate::model::student::{CustomProperty, Session, Student, StudentId};
use crate::model::{name_key, ModelValidationError};
use crate::repo::cohort_repo::CohortRepository;
use crate::repo::student_repo::StudentRepository;
use crate::repo::RepoError;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum RosterServiceError {
    Validation(ModelValidationError),
    StudentNotFound(StudentId),
    GroupNotFound(GroupId),
    DomainNotFound(DomainId),
    DuplicateGroupName(String),
    DuplicateDomainName(String),
    Repo(RepoError),
}

impl Display for RosterServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::StudentNotFound(id) => write!(f, "student not found: {id}"),
            Self::GroupNotFound(id) => write!(f, "group not found: {id}"),
            Self::DomainNotFound(id) => write!(f, "domain not found: {id}"),
            Self::DuplicateGroupName(name) => write!(f, "group name already in use: {name}"),
            Self::DuplicateDomainName(name) => write!(f, "domain name already in use: {name}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RosterServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for RosterServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<ModelValidationError> for RosterServiceError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

pub struct RosterService<S: StudentRepository, C: CohortRepository> {
    students: S,
    cohorts: C,
}

impl<S: StudentRepository, C: CohortRepository> RosterService<S, C> {
    pub fn new(students: S, cohorts: C) -> Self {
        Self { students, cohorts }
    }

    pub fn create_student(
        &self,
        name: impl Into<String>,
    ) -> Result<Student, RosterServiceError> {
        let student = Student::new(normalize_name(name.into(), "student name")?);
        self.students.create_student(&student)?;
        info!(
            "event=student_create module=service status=ok student_id={}",
            student.id
        );
        Ok(student)
    }

    /// Creates a student with domain and session in a single write.
    pub fn enroll(
        &self,
        name: impl Into<String>,
        domain_id: Option<DomainId>,
        session: Session,
    ) -> Result<Student, RosterServiceError> {
        if let Some(domain_id) = domain_id {
            self.active_domain(domain_id)?;
        }
        let mut student = Student::new(normalize_name(name.into(), "student name")?);
        student.domain_id = domain_id;
        student.session = session;
        self.students.create_student(&student)?;
        info!(
            "event=student_create module=service status=ok student_id={} has_domain={}",
            student.id,
            domain_id.is_some()
        );
        Ok(student)
    }

    pub fn get_student(&self, id: StudentId) -> Result<Student, RosterServiceError> {
        self.students
            .get_student(id, false)?
            .ok_or(RosterServiceError::StudentNotFound(id))
    }

    /// Active students ordered by name.
    pub fn list_students(&self) -> Result<Vec<Student>, RosterServiceError> {
        Ok(self.students.list_students(false)?)
    }

    /// Active student whose name has the same [`name_key`].
    pub fn find_student_by_name(&self, name: &str) -> Result<Option<Student>, RosterServiceError> {
        let wanted = name_key(name);
        Ok(self
            .students
            .list_students(false)?
            .into_iter()
            .find(|student| name_key(&student.name) == wanted))
    }

    pub fn rename_student(
        &self,
        id: StudentId,
        name: impl Into<String>,
    ) -> Result<Student, RosterServiceError> {
        let name = normalize_name(name.into(), "student name")?;
        self.modify_student(id, |student| student.name = name)
    }

    pub fn set_session(
        &self,
        id: StudentId,
        session: Session,
    ) -> Result<Student, RosterServiceError> {
        self.modify_student(id, |student| student.session = session)
    }

    /// Replaces group memberships, dropping duplicate ids.
    pub fn set_groups(
        &self,
        id: StudentId,
        group_ids: &[GroupId],
    ) -> Result<Student, RosterServiceError> {
        let mut unique = Vec::with_capacity(group_ids.len());
        for group_id in group_ids {
            self.active_group(*group_id)?;
            if !unique.contains(group_id) {
                unique.push(*group_id);
            }
        }
        self.modify_student(id, |student| student.group_ids = unique)
    }

    pub fn set_domain(
        &self,
        id: StudentId,
        domain_id: Option<DomainId>,
    ) -> Result<Student, RosterServiceError> {
        if let Some(domain_id) = domain_id {
            self.active_domain(domain_id)?;
        }
        self.modify_student(id, |student| student.domain_id = domain_id)
    }

    /// Replaces custom properties; keys are trimmed and must be unique.
    pub fn set_properties(
        &self,
        id: StudentId,
        properties: Vec<CustomProperty>,
    ) -> Result<Student, RosterServiceError> {
        let properties: Vec<CustomProperty> = properties
            .into_iter()
            .map(|property| CustomProperty::new(property.key.trim(), property.value))
            .collect();
        crate::model::student::validate_properties(&properties)?;
        self.modify_student(id, |student| student.properties = properties)
    }

    pub fn archive_student(&self, id: StudentId) -> Result<(), RosterServiceError> {
        self.modify_student(id, |student| student.is_archived = true)?;
        Ok(())
    }

    /// Permanently removes a student and their progress.
    pub fn delete_student(&self, id: StudentId) -> Result<(), RosterServiceError> {
        self.students.delete_student(id).map_err(|err| match err {
            RepoError::NotFound { .. } => RosterServiceError::StudentNotFound(id),
            other => other.into(),
        })?;
        info!("event=student_delete module=service status=ok student_id={id}");
        Ok(())
    }

    pub fn create_group(
        &self,
        name: impl Into<String>,
        color: Option<String>,
    ) -> Result<CohortGroup, RosterServiceError> {
        let name = normalize_name(name.into(), "group name")?;
        if self.cohorts.find_group_by_name(&name)?.is_some() {
            return Err(RosterServiceError::DuplicateGroupName(name));
        }
        let mut group = CohortGroup::new(name);
        group.color = color;
        self.cohorts.create_group(&group)?;
        Ok(group)
    }

    pub fn rename_group(
        &self,
        id: GroupId,
        name: impl Into<String>,
    ) -> Result<CohortGroup, RosterServiceError> {
        let name = normalize_name(name.into(), "group name")?;
        if let Some(existing) = self.cohorts.find_group_by_name(&name)? {
            if existing.id != id {
                return Err(RosterServiceError::DuplicateGroupName(name));
            }
        }
        let mut group = self.active_group(id)?;
        group.name = name;
        self.cohorts.update_group(&group)?;
        Ok(group)
    }

    pub fn archive_group(&self, id: GroupId) -> Result<(), RosterServiceError> {
        let mut group = self.active_group(id)?;
        group.is_archived = true;
        self.cohorts.update_group(&group)?;
        Ok(())
    }

    pub fn list_groups(&self) -> Result<Vec<CohortGroup>, RosterServiceError> {
        Ok(self.cohorts.list_groups(false)?)
    }

    pub fn find_group_by_name(&self, name: &str) -> Result<Option<CohortGroup>, RosterServiceError> {
        Ok(self.cohorts.find_group_by_name(name)?)
    }

    pub fn create_domain(
        &self,
        name: impl Into<String>,
        color: Option<String>,
    ) -> Result<Domain, RosterServiceError> {
        let name = normalize_name(name.into(), "domain name")?;
        if self.cohorts.find_domain_by_name(&name)?.is_some() {
            return Err(RosterServiceError::DuplicateDomainName(name));
        }
        let mut domain = Domain::new(name);
        domain.color = color;
        self.cohorts.create_domain(&domain)?;
        info!(
            "event=domain_create module=service status=ok domain_id={}",
            domain.id
        );
        Ok(domain)
    }

    pub fn set_domain_mode(
        &self,
        id: DomainId,
        mode: AggregationMode,
    ) -> Result<Domain, RosterServiceError> {
        let mut domain = self.active_domain(id)?;
        domain.aggregation_mode = mode;
        self.cohorts.update_domain(&domain)?;
        Ok(domain)
    }

    pub fn archive_domain(&self, id: DomainId) -> Result<(), RosterServiceError> {
        let mut domain = self.active_domain(id)?;
        domain.is_archived = true;
        self.cohorts.update_domain(&domain)?;
        Ok(())
    }

    pub fn list_domains(&self) -> Result<Vec<Domain>, RosterServiceError> {
        Ok(self.cohorts.list_domains(false)?)
    }

    pub fn find_domain_by_name(&self, name: &str) -> Result<Option<Domain>, RosterServiceError> {
        Ok(self.cohorts.find_domain_by_name(name)?)
    }

    fn modify_student<F>(&self, id: StudentId, change: F) -> Result<Student, RosterServiceError>
    where
        F: FnOnce(&mut Student),
    {
        let mut student = self.get_student(id)?;
        change(&mut student);
        self.students.update_student(&student)?;
        Ok(student)
    }

    fn active_group(&self, id: GroupId) -> Result<CohortGroup, RosterServiceError> {
        self.cohorts
            .get_group(id)?
            .filter(|group| !group.is_archived)
            .ok_or(RosterServiceError::GroupNotFound(id))
    }

    fn active_domain(&self, id: DomainId) -> Result<Domain, RosterServiceError> {
        self.cohorts
            .get_domain(id)?
            .filter(|domain| !domain.is_archived)
            .ok_or(RosterServiceError::DomainNotFound(id))
    }
}

fn normalize_name(value: String, field: &'static str) -> Result<String, RosterServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RosterServiceError::Validation(
            ModelValidationError::BlankField(field),
        ));
    }
    Ok(trimmed.to_string())
}
