//! Domain model for rubric objectives, roster entities and progress values.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Own field-level validation shared by repository write paths.
//!
//! # Invariants
//! - Every entity is identified by a stable UUID.
//! - Archival is a soft flag; archived rows are filtered, not removed.
//! - Percentages are integers in `0..=100`.

pub mod cohort;
pub mod objective;
pub mod progress;
pub mod student;

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Field-level validation failures for model records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    /// Objective code is blank or contains unsupported characters.
    InvalidObjectiveCode(String),
    /// A required display name or title is blank after trim.
    BlankField(&'static str),
    /// Percentage value is outside `0..=100`.
    PercentageOutOfRange(i64),
    /// Color string is not `#RRGGBB`.
    InvalidColor(String),
    /// Objective references itself as parent.
    SelfParent(String),
    /// Custom property keys collide (case-insensitive).
    DuplicatePropertyKey(String),
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidObjectiveCode(code) => write!(f, "invalid objective code `{code}`"),
            Self::BlankField(field) => write!(f, "{field} must not be blank"),
            Self::PercentageOutOfRange(value) => {
                write!(f, "percentage {value} is outside 0..=100")
            }
            Self::InvalidColor(value) => write!(f, "color `{value}` must be #RRGGBB"),
            Self::SelfParent(code) => write!(f, "objective `{code}` cannot be its own parent"),
            Self::DuplicatePropertyKey(key) => write!(f, "duplicate property key `{key}`"),
        }
    }
}

impl Error for ModelValidationError {}

/// Comparison key for display names: whitespace runs collapse to one space,
/// letters fold with Unicode lowercasing.
pub fn name_key(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub(crate) fn require_non_blank(
    value: &str,
    field: &'static str,
) -> Result<(), ModelValidationError> {
    if value.trim().is_empty() {
        return Err(ModelValidationError::BlankField(field));
    }
    Ok(())
}
