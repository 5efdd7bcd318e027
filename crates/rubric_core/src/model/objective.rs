//! Learning objective model.
//!
//! # Responsibility
//! - Define rubric tree nodes stored as a flat parent-pointer list.
//! - Validate code/title shape before persistence.
//!
//! # Invariants
//! - `code` is unique among active objectives (enforced by the service layer).
//! - A node never names itself as parent.
//! - Nodes without children are leaves; all others are categories.

use super::{require_non_blank, ModelValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

static OBJECTIVE_CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9]+([.\-][A-Za-z0-9]+)*$").expect("valid objective code regex")
});

/// Stable objective identifier.
pub type ObjectiveId = Uuid;

/// Parent reference in either of the two addressing schemes found in
/// stored data: generated id, or objective code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum ParentRef {
    Id(ObjectiveId),
    Code(String),
}

/// One node of the rubric tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningObjective {
    pub id: ObjectiveId,
    /// Hierarchical code such as `A`, `A.1`, `A.1.2`.
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    /// Whether the objective is measured numerically rather than by judgement.
    pub is_quantitative: bool,
    /// `None` means root ("success criterion").
    pub parent: Option<ParentRef>,
    /// Sibling order key, ascending.
    pub sort_order: i64,
    pub is_archived: bool,
}

impl LearningObjective {
    /// Creates an active root objective with a generated id.
    pub fn new(code: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            title: title.into(),
            description: None,
            is_quantitative: false,
            parent: None,
            sort_order: 0,
            is_archived: false,
        }
    }

    /// Builder-style helper attaching a parent by id.
    pub fn with_parent_id(mut self, parent_id: ObjectiveId) -> Self {
        self.parent = Some(ParentRef::Id(parent_id));
        self
    }

    /// Builder-style helper attaching a parent by code.
    pub fn with_parent_code(mut self, parent_code: impl Into<String>) -> Self {
        self.parent = Some(ParentRef::Code(parent_code.into()));
        self
    }

    pub fn with_sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn is_active(&self) -> bool {
        !self.is_archived
    }

    pub fn archive(&mut self) {
        self.is_archived = true;
    }

    /// Validates field shape.
    ///
    /// Does not check code uniqueness or parent existence; those need the
    /// full objective set and live in the service layer.
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        validate_objective_code(&self.code)?;
        require_non_blank(&self.title, "objective title")?;
        match &self.parent {
            Some(ParentRef::Id(parent_id)) if *parent_id == self.id => {
                Err(ModelValidationError::SelfParent(self.code.clone()))
            }
            Some(ParentRef::Code(parent_code)) if parent_code == &self.code => {
                Err(ModelValidationError::SelfParent(self.code.clone()))
            }
            _ => Ok(()),
        }
    }
}

/// Checks that a code is non-blank and uses `.`/`-` separated segments.
pub fn validate_objective_code(code: &str) -> Result<(), ModelValidationError> {
    if !OBJECTIVE_CODE_RE.is_match(code) {
        return Err(ModelValidationError::InvalidObjectiveCode(code.to_string()));
    }
    Ok(())
}
