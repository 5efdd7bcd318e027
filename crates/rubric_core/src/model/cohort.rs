//! Cohort groups and expertise domains.
//!
//! Both are tagging entities: a name, an optional display color and a soft
//! archive flag. Domains additionally pick how their expertise-check
//! percentages are produced.

use super::{require_non_blank, ModelValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("valid hex color regex"));

pub type GroupId = Uuid;
pub type DomainId = Uuid;

/// How a domain's objective percentages are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// Average of the domain's students, computed from their progress.
    #[default]
    ComputedCohortAverage,
    /// Scores authored by a reviewer for the domain as a whole.
    ExpertReviewScore,
}

impl AggregationMode {
    pub(crate) fn as_db(self) -> &'static str {
        match self {
            Self::ComputedCohortAverage => "computed_cohort_average",
            Self::ExpertReviewScore => "expert_review_score",
        }
    }

    pub(crate) fn parse_db(value: &str) -> Option<Self> {
        match value {
            "computed_cohort_average" => Some(Self::ComputedCohortAverage),
            "expert_review_score" => Some(Self::ExpertReviewScore),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ComputedCohortAverage => "cohort average",
            Self::ExpertReviewScore => "expert review",
        }
    }
}

/// Named group of students.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortGroup {
    pub id: GroupId,
    pub name: String,
    pub color: Option<String>,
    pub is_archived: bool,
}

impl CohortGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            color: None,
            is_archived: false,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_non_blank(&self.name, "group name")?;
        validate_color(self.color.as_deref())
    }
}

/// Expertise domain a student specializes in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub id: DomainId,
    pub name: String,
    pub color: Option<String>,
    pub aggregation_mode: AggregationMode,
    pub is_archived: bool,
}

impl Domain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            color: None,
            aggregation_mode: AggregationMode::default(),
            is_archived: false,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_non_blank(&self.name, "domain name")?;
        validate_color(self.color.as_deref())
    }
}

/// Accepts `None` or a `#RRGGBB` string.
pub fn validate_color(color: Option<&str>) -> Result<(), ModelValidationError> {
    match color {
        Some(value) if !HEX_COLOR_RE.is_match(value) => {
            Err(ModelValidationError::InvalidColor(value.to_string()))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_color, AggregationMode, Domain};

    #[test]
    fn color_must_be_six_hex_digits() {
        assert!(validate_color(None).is_ok());
        assert!(validate_color(Some("#1A2b3C")).is_ok());
        assert!(validate_color(Some("#123")).is_err());
        assert!(validate_color(Some("red")).is_err());
    }

    #[test]
    fn domain_defaults_to_computed_average() {
        let domain = Domain::new("Design");
        assert_eq!(domain.aggregation_mode, AggregationMode::ComputedCohortAverage);
    }

    #[test]
    fn aggregation_mode_db_names_roundtrip() {
        for mode in [
            AggregationMode::ComputedCohortAverage,
            AggregationMode::ExpertReviewScore,
        ] {
            assert_eq!(AggregationMode::parse_db(mode.as_db()), Some(mode));
        }
        assert_eq!(AggregationMode::parse_db("weighted"), None);
    }
}
