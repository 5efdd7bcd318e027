//! Leaf-level progress values and display status.
//!
//! # Invariants
//! - One record per (subject, leaf objective code).
//! - A missing record reads as 0%.
//! - Status boundaries are exact integers: 0, 1..=99, 100.

use super::ModelValidationError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Validated completion percentage in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct CompletionPercentage(u8);

impl CompletionPercentage {
    pub const ZERO: Self = Self(0);
    pub const FULL: Self = Self(100);

    pub fn new(value: i64) -> Result<Self, ModelValidationError> {
        if !(0..=100).contains(&value) {
            return Err(ModelValidationError::PercentageOutOfRange(value));
        }
        Ok(Self(value as u8))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn status(self) -> ProgressStatus {
        ProgressStatus::from_percentage(self.0)
    }
}

impl TryFrom<i64> for CompletionPercentage {
    type Error = ModelValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CompletionPercentage> for i64 {
    fn from(value: CompletionPercentage) -> Self {
        i64::from(value.0)
    }
}

impl Display for CompletionPercentage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Display classification derived from a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Complete,
}

impl ProgressStatus {
    /// Classifies a percentage. Values above 100 are treated as complete.
    pub fn from_percentage(percentage: u8) -> Self {
        match percentage {
            0 => Self::NotStarted,
            1..=99 => Self::InProgress,
            _ => Self::Complete,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::NotStarted => "not started",
            Self::InProgress => "in progress",
            Self::Complete => "complete",
        }
    }
}

/// Owner of a set of leaf values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ProgressSubject {
    /// Per-student progress.
    Student(Uuid),
    /// Reviewer-authored scores for a domain expertise check.
    ExpertiseReview(Uuid),
}

impl ProgressSubject {
    pub(crate) fn kind_str(self) -> &'static str {
        match self {
            Self::Student(_) => "student",
            Self::ExpertiseReview(_) => "expertise_review",
        }
    }

    pub(crate) fn id(self) -> Uuid {
        match self {
            Self::Student(id) | Self::ExpertiseReview(id) => id,
        }
    }
}

/// Stored leaf value for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub subject: ProgressSubject,
    pub objective_code: String,
    pub percentage: CompletionPercentage,
}

#[cfg(test)]
mod tests {
    use super::{CompletionPercentage, ProgressStatus};

    #[test]
    fn status_boundaries_are_exact() {
        assert_eq!(ProgressStatus::from_percentage(0), ProgressStatus::NotStarted);
        for value in 1..=99 {
            assert_eq!(
                ProgressStatus::from_percentage(value),
                ProgressStatus::InProgress
            );
        }
        assert_eq!(ProgressStatus::from_percentage(100), ProgressStatus::Complete);
    }

    #[test]
    fn percentage_rejects_out_of_range() {
        assert!(CompletionPercentage::new(-1).is_err());
        assert!(CompletionPercentage::new(101).is_err());
        assert_eq!(CompletionPercentage::new(100).unwrap(), CompletionPercentage::FULL);
    }

    #[test]
    fn percentage_deserializes_through_validation() {
        let ok: CompletionPercentage = serde_json::from_str("75").unwrap();
        assert_eq!(ok.value(), 75);
        assert!(serde_json::from_str::<CompletionPercentage>("150").is_err());
    }
}
