//! Recursive completion aggregation over the objective tree.
//!
//! # Responsibility
//! - Compute node percentages from leaf values for one subject.
//! - Roll subject results up across students, groups, the cohort and
//!   domain expertise checks.
//!
//! # Invariants
//! - Leaf percentage is the looked-up value, 0 when absent, capped at 100.
//! - Category percentage is `floor(sum(children) / child_count)`; each
//!   immediate child weighs the same regardless of its subtree size.
//! - Every result is in `0..=100`.
//! - Re-entering a node already on the recursion path contributes 0.
//! - All functions are pure and never fail.

use super::index::ObjectiveIndex;
use crate::model::cohort::{AggregationMode, Domain, GroupId};
use crate::model::objective::{LearningObjective, ObjectiveId};
use crate::model::student::Student;
use log::warn;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::BuildHasher;

/// Leaf values keyed by objective code.
pub type LeafValues = HashMap<String, u8>;

/// Source of directly recorded leaf percentages for one subject.
pub trait LeafLookup {
    /// Returns the recorded value for a leaf code, if any.
    fn leaf_percentage(&self, code: &str) -> Option<u8>;
}

impl<S: BuildHasher> LeafLookup for HashMap<String, u8, S> {
    fn leaf_percentage(&self, code: &str) -> Option<u8> {
        self.get(code).copied()
    }
}

impl LeafLookup for BTreeMap<String, u8> {
    fn leaf_percentage(&self, code: &str) -> Option<u8> {
        self.get(code).copied()
    }
}

impl<T: LeafLookup + ?Sized> LeafLookup for &T {
    fn leaf_percentage(&self, code: &str) -> Option<u8> {
        (**self).leaf_percentage(code)
    }
}

/// Adapts a closure into a [`LeafLookup`].
pub struct FnLookup<F>(pub F);

impl<F> LeafLookup for FnLookup<F>
where
    F: Fn(&str) -> Option<u8>,
{
    fn leaf_percentage(&self, code: &str) -> Option<u8> {
        (self.0)(code)
    }
}

/// A student paired with their own leaf values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentProgress {
    pub student: Student,
    pub leaves: LeafValues,
}

impl StudentProgress {
    pub fn new(student: Student, leaves: LeafValues) -> Self {
        Self { student, leaves }
    }
}

/// Completion of one objective for one subject.
pub fn percentage<L: LeafLookup + ?Sized>(
    objective: &LearningObjective,
    index: &ObjectiveIndex,
    lookup: &L,
) -> u8 {
    let mut memo = HashMap::new();
    let mut path = HashSet::new();
    evaluate(objective.id, &objective.code, index, lookup, &mut memo, &mut path)
}

/// Completion of the objective with `code`; 0 when the code is unknown.
pub fn percentage_by_code<L: LeafLookup + ?Sized>(
    code: &str,
    index: &ObjectiveIndex,
    lookup: &L,
) -> u8 {
    match index.by_code(code) {
        Some(objective) => percentage(objective, index, lookup),
        None => 0,
    }
}

/// Floor of the arithmetic mean; 0 for an empty input.
pub fn floor_mean<I: IntoIterator<Item = u8>>(values: I) -> u8 {
    let (sum, count) = values
        .into_iter()
        .fold((0u64, 0u64), |(sum, count), value| {
            (sum + u64::from(value), count + 1)
        });
    if count == 0 {
        return 0;
    }
    // Mean of u8 values never exceeds u8::MAX.
    (sum / count) as u8
}

/// Mean of one objective across the given students, each with their own
/// leaf values. Empty input yields 0.
pub fn cohort_average(
    objective: &LearningObjective,
    students: &[StudentProgress],
    index: &ObjectiveIndex,
) -> u8 {
    floor_mean(
        students
            .iter()
            .map(|entry| percentage(objective, index, &entry.leaves)),
    )
}

/// Mean of the student's root objective percentages.
pub fn student_overall(student: &StudentProgress, index: &ObjectiveIndex) -> u8 {
    SubjectProgress::compute(index, &student.leaves).overall()
}

/// Mean of `student_overall` over active members of one group.
pub fn group_overall(
    group_id: GroupId,
    students: &[StudentProgress],
    index: &ObjectiveIndex,
) -> u8 {
    floor_mean(
        students
            .iter()
            .filter(|entry| entry.student.is_active() && entry.student.in_group(group_id))
            .map(|entry| student_overall(entry, index)),
    )
}

/// Mean of `student_overall` over all active students.
pub fn cohort_overall(students: &[StudentProgress], index: &ObjectiveIndex) -> u8 {
    floor_mean(
        students
            .iter()
            .filter(|entry| entry.student.is_active())
            .map(|entry| student_overall(entry, index)),
    )
}

/// Active students specializing in `domain`.
pub fn domain_members<'a>(
    domain: &Domain,
    students: &'a [StudentProgress],
) -> Vec<&'a StudentProgress> {
    students
        .iter()
        .filter(|entry| entry.student.is_active() && entry.student.domain_id == Some(domain.id))
        .collect()
}

/// Expertise-check percentage of one objective for a domain.
///
/// `ComputedCohortAverage` averages the domain's active students;
/// `ExpertReviewScore` runs the tree over the reviewer's scores.
pub fn domain_objective_percentage<L: LeafLookup + ?Sized>(
    domain: &Domain,
    objective: &LearningObjective,
    index: &ObjectiveIndex,
    students: &[StudentProgress],
    review_scores: &L,
) -> u8 {
    match domain.aggregation_mode {
        AggregationMode::ComputedCohortAverage => floor_mean(
            domain_members(domain, students)
                .into_iter()
                .map(|entry| percentage(objective, index, &entry.leaves)),
        ),
        AggregationMode::ExpertReviewScore => percentage(objective, index, review_scores),
    }
}

/// Expertise-check overall for a domain, dispatched like
/// [`domain_objective_percentage`].
pub fn domain_overall<L: LeafLookup + ?Sized>(
    domain: &Domain,
    index: &ObjectiveIndex,
    students: &[StudentProgress],
    review_scores: &L,
) -> u8 {
    match domain.aggregation_mode {
        AggregationMode::ComputedCohortAverage => floor_mean(
            domain_members(domain, students)
                .into_iter()
                .map(|entry| student_overall(entry, index)),
        ),
        AggregationMode::ExpertReviewScore => {
            SubjectProgress::compute(index, review_scores).overall()
        }
    }
}

/// Memoized percentages of every indexed node for one subject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectProgress {
    values: HashMap<ObjectiveId, u8>,
    by_code: HashMap<String, u8>,
    root_values: Vec<u8>,
}

impl SubjectProgress {
    /// Evaluates every node once, children before parents.
    pub fn compute<L: LeafLookup + ?Sized>(index: &ObjectiveIndex, lookup: &L) -> Self {
        let mut memo = HashMap::with_capacity(index.len());
        let mut path = HashSet::new();

        let root_values = index
            .roots()
            .into_iter()
            .map(|root| evaluate(root.id, &root.code, index, lookup, &mut memo, &mut path))
            .collect();

        // Nodes stuck in a parent cycle are not reachable from any root.
        // Each one is evaluated on its own, so its value matches `percentage`
        // and does not depend on which cycle member was visited first.
        let mut stranded: Vec<&LearningObjective> = index
            .iter()
            .filter(|objective| !memo.contains_key(&objective.id))
            .collect();
        stranded.sort_by(|left, right| left.code.cmp(&right.code));
        let stranded_values: Vec<(ObjectiveId, u8)> = stranded
            .into_iter()
            .map(|objective| {
                let mut local = HashMap::new();
                let value = evaluate(
                    objective.id,
                    &objective.code,
                    index,
                    lookup,
                    &mut local,
                    &mut path,
                );
                (objective.id, value)
            })
            .collect();
        memo.extend(stranded_values);

        let by_code = index
            .iter()
            .filter_map(|objective| {
                memo.get(&objective.id)
                    .map(|value| (objective.code.clone(), *value))
            })
            .collect();

        Self {
            values: memo,
            by_code,
            root_values,
        }
    }

    pub fn percentage_of(&self, id: ObjectiveId) -> u8 {
        self.values.get(&id).copied().unwrap_or(0)
    }

    pub fn by_code(&self, code: &str) -> u8 {
        self.by_code.get(code).copied().unwrap_or(0)
    }

    /// Mean over root objectives; 0 when the rubric is empty.
    pub fn overall(&self) -> u8 {
        floor_mean(self.root_values.iter().copied())
    }
}

fn evaluate<L: LeafLookup + ?Sized>(
    id: ObjectiveId,
    code: &str,
    index: &ObjectiveIndex,
    lookup: &L,
    memo: &mut HashMap<ObjectiveId, u8>,
    path: &mut HashSet<ObjectiveId>,
) -> u8 {
    if let Some(value) = memo.get(&id) {
        return *value;
    }
    if !path.insert(id) {
        warn!(
            "event=objective_cycle module=progress status=error objective_id={}",
            id
        );
        return 0;
    }

    let child_ids = index.child_ids(id);
    let value = if child_ids.is_empty() {
        lookup.leaf_percentage(code).unwrap_or(0).min(100)
    } else {
        let child_values: Vec<u8> = child_ids
            .iter()
            .filter_map(|child_id| index.get(*child_id))
            .map(|child| evaluate(child.id, &child.code, index, lookup, memo, path))
            .collect();
        floor_mean(child_values)
    };

    path.remove(&id);
    memo.insert(id, value);
    value
}
