//! Read models for rendering aggregated progress.

use super::index::ObjectiveIndex;
use crate::model::cohort::{AggregationMode, CohortGroup, Domain};
use crate::model::objective::{LearningObjective, ObjectiveId};
use crate::model::progress::ProgressStatus;
use crate::model::student::{Student, StudentId};
use serde::Serialize;

/// One rubric line of a report, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectiveRow {
    pub objective_id: ObjectiveId,
    pub code: String,
    pub title: String,
    /// 0 for roots.
    pub depth: usize,
    pub is_leaf: bool,
    pub percentage: u8,
    pub status: ProgressStatus,
}

/// Builds rows for every reachable objective, scoring each with `score`.
pub fn objective_rows<F>(index: &ObjectiveIndex, mut score: F) -> Vec<ObjectiveRow>
where
    F: FnMut(&LearningObjective) -> u8,
{
    index
        .depth_first()
        .into_iter()
        .map(|objective| {
            let percentage = score(objective);
            ObjectiveRow {
                objective_id: objective.id,
                code: objective.code.clone(),
                title: objective.title.clone(),
                depth: index.depth(objective.id),
                is_leaf: index.is_leaf(objective.id),
                percentage,
                status: ProgressStatus::from_percentage(percentage),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentReport {
    pub student: Student,
    pub overall: u8,
    pub status: ProgressStatus,
    pub rows: Vec<ObjectiveRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentSummary {
    pub student_id: StudentId,
    pub name: String,
    pub overall: u8,
    pub status: ProgressStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    pub group: CohortGroup,
    pub overall: u8,
    pub members: Vec<StudentSummary>,
    /// Per-objective averages over the members.
    pub rows: Vec<ObjectiveRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CohortReport {
    pub overall: u8,
    pub students: Vec<StudentSummary>,
    /// Per-objective averages over all active students.
    pub rows: Vec<ObjectiveRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainReport {
    pub domain: Domain,
    pub mode: AggregationMode,
    pub overall: u8,
    pub member_count: usize,
    pub rows: Vec<ObjectiveRow>,
}
