//! Objective-tree progress aggregation engine.
//!
//! # Responsibility
//! - Index a flat objective snapshot into an ordered tree.
//! - Derive category, student, group, cohort and domain percentages.
//!
//! # Invariants
//! - Computation is synchronous, side-effect free and idempotent.
//! - Inputs are immutable snapshots passed explicitly by callers.

pub mod aggregate;
pub mod index;
pub mod report;

pub use aggregate::{
    cohort_average, cohort_overall, domain_members, domain_objective_percentage, domain_overall,
    floor_mean, group_overall, percentage, percentage_by_code, student_overall, FnLookup,
    LeafLookup, LeafValues, StudentProgress, SubjectProgress,
};
pub use index::{children_of, ObjectiveIndex};
pub use report::{
    objective_rows, CohortReport, DomainReport, GroupReport, ObjectiveRow, StudentReport,
    StudentSummary,
};
