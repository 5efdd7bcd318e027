//! Student model.
//!
//! # Invariants
//! - `name` is non-blank.
//! - `group_ids` holds no duplicates.
//! - Custom property keys are non-blank and unique case-insensitively.

use super::cohort::{DomainId, GroupId};
use super::{name_key, require_non_blank, ModelValidationError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

pub type StudentId = Uuid;

/// Learning session a student attends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Session {
    Morning,
    Afternoon,
    #[default]
    Unassigned,
}

impl Session {
    /// Parses free-form session labels such as `AM`, `Morning`, `pm`.
    ///
    /// Blank input maps to `Unassigned`; unknown labels return `None`.
    pub fn parse_label(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "unassigned" | "none" => Some(Self::Unassigned),
            "am" | "morning" => Some(Self::Morning),
            "pm" | "afternoon" => Some(Self::Afternoon),
            _ => None,
        }
    }

    pub(crate) fn as_db(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Unassigned => "unassigned",
        }
    }

    pub(crate) fn parse_db(value: &str) -> Option<Self> {
        match value {
            "morning" => Some(Self::Morning),
            "afternoon" => Some(Self::Afternoon),
            "unassigned" => Some(Self::Unassigned),
            _ => None,
        }
    }
}

/// User-defined key/value attribute on a student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomProperty {
    pub key: String,
    pub value: String,
}

impl CustomProperty {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub group_ids: Vec<GroupId>,
    pub domain_id: Option<DomainId>,
    pub session: Session,
    pub properties: Vec<CustomProperty>,
    pub is_archived: bool,
}

impl Student {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            group_ids: Vec::new(),
            domain_id: None,
            session: Session::Unassigned,
            properties: Vec::new(),
            is_archived: false,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.is_archived
    }

    pub fn in_group(&self, group_id: GroupId) -> bool {
        self.group_ids.contains(&group_id)
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        let wanted = name_key(key);
        self.properties
            .iter()
            .find(|property| name_key(&property.key) == wanted)
            .map(|property| property.value.as_str())
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_non_blank(&self.name, "student name")?;
        validate_properties(&self.properties)
    }
}

/// Checks property keys are non-blank and unique by [`name_key`].
pub fn validate_properties(properties: &[CustomProperty]) -> Result<(), ModelValidationError> {
    let mut seen = HashSet::new();
    for property in properties {
        require_non_blank(&property.key, "property key")?;
        if !seen.insert(name_key(&property.key)) {
            return Err(ModelValidationError::DuplicatePropertyKey(
                property.key.clone(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{validate_properties, CustomProperty, Session, Student};
    use crate::model::ModelValidationError;

    #[test]
    fn session_labels_parse_loosely() {
        assert_eq!(Session::parse_label(" AM "), Some(Session::Morning));
        assert_eq!(Session::parse_label("Afternoon"), Some(Session::Afternoon));
        assert_eq!(Session::parse_label(""), Some(Session::Unassigned));
        assert_eq!(Session::parse_label("evening"), None);
    }

    #[test]
    fn duplicate_property_keys_are_rejected_case_insensitively() {
        let properties = vec![
            CustomProperty::new("GitHub", "octo"),
            CustomProperty::new("github", "cat"),
        ];
        assert_eq!(
            validate_properties(&properties),
            Err(ModelValidationError::DuplicatePropertyKey("github".to_string()))
        );
    }

    #[test]
    fn property_lookup_ignores_case() {
        let mut student = Student::new("Ada");
        student.properties.push(CustomProperty::new("Pronouns", "she/her"));
        assert_eq!(student.property("pronouns"), Some("she/her"));
        assert_eq!(student.property("missing"), None);
    }
}
