//! Progress entry and report use-cases.
//!
//! # Responsibility
//! - Validate and persist leaf percentages for students and domain reviews.
//! - Snapshot the store and run the aggregation engine for reports.
//!
//! # Invariants
//! - Only active leaf objectives accept direct values; categories are derived.
//! - Reports never mutate state.

use crate::model::cohort::{CohortGroup, Domain, DomainId, GroupId};
use crate::model::objective::LearningObjective;
use crate::model::progress::{CompletionPercentage, ProgressStatus, ProgressSubject};
use crate::model::student::{Student, StudentId};
use crate::model::ModelValidationError;
use crate::progress::{
    cohort_average, cohort_overall, domain_members, domain_objective_percentage, domain_overall,
    group_overall, objective_rows, CohortReport, DomainReport, GroupReport, LeafValues,
    ObjectiveIndex, StudentProgress, StudentReport, StudentSummary, SubjectProgress,
};
use crate::repo::cohort_repo::CohortRepository;
use crate::repo::objective_repo::ObjectiveRepository;
use crate::repo::progress_repo::ProgressRepository;
use crate::repo::student_repo::StudentRepository;
use crate::repo::RepoError;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum ProgressServiceError {
    Validation(ModelValidationError),
    /// No active objective holds the code.
    UnknownObjective(String),
    /// The objective has children; its value is always derived.
    NotALeaf(String),
    StudentNotFound(StudentId),
    GroupNotFound(GroupId),
    DomainNotFound(DomainId),
    Repo(RepoError),
}

impl Display for ProgressServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::UnknownObjective(code) => write!(f, "unknown objective code: {code}"),
            Self::NotALeaf(code) => write!(
                f,
                "objective {code} has children; its percentage is derived"
            ),
            Self::StudentNotFound(id) => write!(f, "student not found: {id}"),
            Self::GroupNotFound(id) => write!(f, "group not found: {id}"),
            Self::DomainNotFound(id) => write!(f, "domain not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ProgressServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ProgressServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<ModelValidationError> for ProgressServiceError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Immutable view of everything the engine needs.
#[derive(Debug, Clone)]
pub struct CohortSnapshot {
    pub index: ObjectiveIndex,
    /// Active students with their leaf values.
    pub students: Vec<StudentProgress>,
}

pub struct ProgressService<O, S, C, P>
where
    O: ObjectiveRepository,
    S: StudentRepository,
    C: CohortRepository,
    P: ProgressRepository,
{
    objectives: O,
    students: S,
    cohorts: C,
    progress: P,
}

impl<O, S, C, P> ProgressService<O, S, C, P>
where
    O: ObjectiveRepository,
    S: StudentRepository,
    C: CohortRepository,
    P: ProgressRepository,
{
    pub fn new(objectives: O, students: S, cohorts: C, progress: P) -> Self {
        Self {
            objectives,
            students,
            cohorts,
            progress,
        }
    }

    /// Records a student's completion of one leaf objective.
    pub fn set_leaf_percentage(
        &self,
        student_id: StudentId,
        code: &str,
        value: i64,
    ) -> Result<CompletionPercentage, ProgressServiceError> {
        let percentage = CompletionPercentage::new(value)?;
        self.active_student(student_id)?;
        let code = self.ensure_leaf(code)?;
        self.progress
            .set_percentage(ProgressSubject::Student(student_id), &code, percentage)?;
        info!(
            "event=progress_set module=service status=ok subject=student subject_id={} percentage={}",
            student_id,
            percentage.value()
        );
        Ok(percentage)
    }

    /// Stored leaf value for a student; 0 when nothing was recorded.
    pub fn leaf_percentage(
        &self,
        student_id: StudentId,
        code: &str,
    ) -> Result<u8, ProgressServiceError> {
        Ok(self
            .progress
            .get_percentage(ProgressSubject::Student(student_id), code.trim())?
            .map_or(0, CompletionPercentage::value))
    }

    /// Removes a student's value for a leaf so it reads as 0 again.
    pub fn clear_leaf_percentage(
        &self,
        student_id: StudentId,
        code: &str,
    ) -> Result<bool, ProgressServiceError> {
        Ok(self
            .progress
            .clear_percentage(ProgressSubject::Student(student_id), code.trim())?)
    }

    /// Records a reviewer score for a domain expertise check.
    pub fn set_review_score(
        &self,
        domain_id: DomainId,
        code: &str,
        value: i64,
    ) -> Result<CompletionPercentage, ProgressServiceError> {
        let percentage = CompletionPercentage::new(value)?;
        self.active_domain(domain_id)?;
        let code = self.ensure_leaf(code)?;
        self.progress.set_percentage(
            ProgressSubject::ExpertiseReview(domain_id),
            &code,
            percentage,
        )?;
        info!(
            "event=progress_set module=service status=ok subject=expertise_review subject_id={} percentage={}",
            domain_id,
            percentage.value()
        );
        Ok(percentage)
    }

    /// Loads active objectives and active students with their leaf values.
    pub fn snapshot(&self) -> Result<CohortSnapshot, ProgressServiceError> {
        let objectives = self.objectives.list_objectives(false)?;
        let index = ObjectiveIndex::build(&objectives);
        let mut students = Vec::new();
        for student in self.students.list_students(false)? {
            let leaves = self
                .progress
                .leaf_values(ProgressSubject::Student(student.id))?;
            students.push(StudentProgress::new(student, leaves));
        }
        Ok(CohortSnapshot { index, students })
    }

    pub fn student_report(
        &self,
        student_id: StudentId,
    ) -> Result<StudentReport, ProgressServiceError> {
        let student = self.active_student(student_id)?;
        let objectives = self.objectives.list_objectives(false)?;
        let index = ObjectiveIndex::build(&objectives);
        let leaves = self
            .progress
            .leaf_values(ProgressSubject::Student(student_id))?;

        let progress = SubjectProgress::compute(&index, &leaves);
        let rows = objective_rows(&index, |objective| progress.percentage_of(objective.id));
        let overall = progress.overall();
        Ok(StudentReport {
            student,
            overall,
            status: ProgressStatus::from_percentage(overall),
            rows,
        })
    }

    pub fn group_report(&self, group_id: GroupId) -> Result<GroupReport, ProgressServiceError> {
        let group = self.active_group(group_id)?;
        let snapshot = self.snapshot()?;
        let members: Vec<StudentProgress> = snapshot
            .students
            .iter()
            .filter(|entry| entry.student.in_group(group_id))
            .cloned()
            .collect();

        let rows = objective_rows(&snapshot.index, |objective| {
            cohort_average(objective, &members, &snapshot.index)
        });
        Ok(GroupReport {
            overall: group_overall(group_id, &snapshot.students, &snapshot.index),
            members: summarize(&members, &snapshot.index),
            group,
            rows,
        })
    }

    pub fn cohort_report(&self) -> Result<CohortReport, ProgressServiceError> {
        let snapshot = self.snapshot()?;
        let rows = objective_rows(&snapshot.index, |objective| {
            cohort_average(objective, &snapshot.students, &snapshot.index)
        });
        Ok(CohortReport {
            overall: cohort_overall(&snapshot.students, &snapshot.index),
            students: summarize(&snapshot.students, &snapshot.index),
            rows,
        })
    }

    /// Expertise-check report for a domain, dispatched on its mode.
    pub fn domain_report(&self, domain_id: DomainId) -> Result<DomainReport, ProgressServiceError> {
        let domain = self.active_domain(domain_id)?;
        let snapshot = self.snapshot()?;
        let review_scores = self
            .progress
            .leaf_values(ProgressSubject::ExpertiseReview(domain_id))?;

        let rows = objective_rows(&snapshot.index, |objective| {
            domain_objective_percentage(
                &domain,
                objective,
                &snapshot.index,
                &snapshot.students,
                &review_scores,
            )
        });
        Ok(DomainReport {
            mode: domain.aggregation_mode,
            overall: domain_overall(&domain, &snapshot.index, &snapshot.students, &review_scores),
            member_count: domain_members(&domain, &snapshot.students).len(),
            domain,
            rows,
        })
    }

    /// Reviewer scores stored for a domain.
    pub fn review_scores(&self, domain_id: DomainId) -> Result<LeafValues, ProgressServiceError> {
        Ok(self
            .progress
            .leaf_values(ProgressSubject::ExpertiseReview(domain_id))?)
    }

    fn ensure_leaf(&self, code: &str) -> Result<String, ProgressServiceError> {
        let code = code.trim();
        let objectives = self.objectives.list_objectives(false)?;
        let index = ObjectiveIndex::build(&objectives);
        let objective: &LearningObjective = index
            .by_code(code)
            .ok_or_else(|| ProgressServiceError::UnknownObjective(code.to_string()))?;
        if !index.is_leaf(objective.id) {
            return Err(ProgressServiceError::NotALeaf(code.to_string()));
        }
        Ok(objective.code.clone())
    }

    fn active_student(&self, id: StudentId) -> Result<Student, ProgressServiceError> {
        self.students
            .get_student(id, false)?
            .ok_or(ProgressServiceError::StudentNotFound(id))
    }

    fn active_group(&self, id: GroupId) -> Result<CohortGroup, ProgressServiceError> {
        self.cohorts
            .get_group(id)?
            .filter(|group| !group.is_archived)
            .ok_or(ProgressServiceError::GroupNotFound(id))
    }

    fn active_domain(&self, id: DomainId) -> Result<Domain, ProgressServiceError> {
        self.cohorts
            .get_domain(id)?
            .filter(|domain| !domain.is_archived)
            .ok_or(ProgressServiceError::DomainNotFound(id))
    }
}

fn summarize(students: &[StudentProgress], index: &ObjectiveIndex) -> Vec<StudentSummary> {
    students
        .iter()
        .map(|entry| {
            let overall = SubjectProgress::compute(index, &entry.leaves).overall();
            StudentSummary {
                student_id: entry.student.id,
                name: entry.student.name.clone(),
                overall,
                status: ProgressStatus::from_percentage(overall),
            }
        })
        .collect()
}

