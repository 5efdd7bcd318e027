//! Rubric objective use-case service.
//!
//! # Responsibility
//! - Enforce tree invariants above the repository layer.
//! - Provide create, update, re-parent, archive and snapshot operations.
//!
//! # Invariants
//! - Codes are unique among active objectives.
//! - A parent reference must resolve to an active objective.
//! - Re-parenting never creates a cycle.
//! - New objectives are appended after their active siblings.

use crate::model::objective::{LearningObjective, ObjectiveId, ParentRef};
use crate::model::ModelValidationError;
use crate::progress::ObjectiveIndex;
use crate::repo::objective_repo::ObjectiveRepository;
use crate::repo::RepoError;
use log::info;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// How archiving treats descendants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveMode {
    /// Archive the node only; its children aggregate as roots afterwards.
    NodeOnly,
    /// Archive the node and every active descendant.
    Subtree,
}

/// Input for creating an objective.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewObjective {
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub is_quantitative: bool,
    pub parent: Option<ParentRef>,
}

impl NewObjective {
    pub fn new(code: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn under(mut self, parent: ParentRef) -> Self {
        self.parent = Some(parent);
        self
    }
}

#[derive(Debug)]
pub enum ObjectiveServiceError {
    Validation(ModelValidationError),
    /// Another active objective already uses the code.
    DuplicateCode(String),
    ObjectiveNotFound(ObjectiveId),
    /// Parent reference does not resolve to an active objective.
    ParentNotFound(ParentRef),
    CycleDetected {
        objective_id: ObjectiveId,
        parent_id: ObjectiveId,
    },
    Repo(RepoError),
}

impl Display for ObjectiveServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::DuplicateCode(code) => write!(f, "objective code already in use: {code}"),
            Self::ObjectiveNotFound(id) => write!(f, "objective not found: {id}"),
            Self::ParentNotFound(ParentRef::Id(id)) => write!(f, "parent objective not found: {id}"),
            Self::ParentNotFound(ParentRef::Code(code)) => {
                write!(f, "parent objective not found: {code}")
            }
            Self::CycleDetected {
                objective_id,
                parent_id,
            } => write!(
                f,
                "re-parenting would create cycle: objective {objective_id} under {parent_id}"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ObjectiveServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ObjectiveServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<ModelValidationError> for ObjectiveServiceError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

pub struct ObjectiveService<R: ObjectiveRepository> {
    repo: R,
}

impl<R: ObjectiveRepository> ObjectiveService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Index over all active objectives.
    pub fn active_index(&self) -> Result<ObjectiveIndex, ObjectiveServiceError> {
        let objectives = self.repo.list_objectives(false)?;
        Ok(ObjectiveIndex::build(&objectives))
    }

    pub fn get(&self, id: ObjectiveId) -> Result<LearningObjective, ObjectiveServiceError> {
        self.repo
            .get_objective(id, false)?
            .ok_or(ObjectiveServiceError::ObjectiveNotFound(id))
    }

    pub fn get_by_code(&self, code: &str) -> Result<Option<LearningObjective>, ObjectiveServiceError> {
        Ok(self.repo.get_by_code(code.trim())?)
    }

    /// Ordered children of `parent`, or the roots when `None`.
    pub fn list_children(
        &self,
        parent: Option<ObjectiveId>,
    ) -> Result<Vec<LearningObjective>, ObjectiveServiceError> {
        let index = self.active_index()?;
        let children = match parent {
            Some(parent_id) => {
                if index.get(parent_id).is_none() {
                    return Err(ObjectiveServiceError::ObjectiveNotFound(parent_id));
                }
                index.children_of(parent_id)
            }
            None => index.roots(),
        };
        Ok(children.into_iter().cloned().collect())
    }

    /// Creates an objective appended after its siblings.
    pub fn create(&self, input: NewObjective) -> Result<LearningObjective, ObjectiveServiceError> {
        let index = self.active_index()?;
        let mut objective = LearningObjective::new(input.code.trim(), input.title.trim());
        objective.description = input
            .description
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        objective.is_quantitative = input.is_quantitative;
        objective.parent = input.parent;
        objective.validate()?;

        self.ensure_code_available(&objective.code, None)?;
        let parent_id = match &objective.parent {
            Some(parent) => Some(resolve_parent(&index, parent)?),
            None => None,
        };
        objective.sort_order = next_sort_order(&index, parent_id);

        self.repo.create_objective(&objective)?;
        info!(
            "event=objective_create module=service status=ok objective_id={} has_parent={}",
            objective.id,
            parent_id.is_some()
        );
        Ok(objective)
    }

    /// Persists edits to an existing objective.
    ///
    /// Code changes are re-checked for uniqueness; changed parents are
    /// re-checked for existence and cycles.
    pub fn update(&self, objective: &LearningObjective) -> Result<(), ObjectiveServiceError> {
        objective.validate()?;
        let stored = self.get(objective.id)?;
        self.ensure_code_available(&objective.code, Some(objective.id))?;

        // An unchanged link may point at an archived parent; the node is a root then.
        if objective.parent == stored.parent {
            return self.repo.update_objective(objective).map_err(Into::into);
        }
        if let Some(parent) = &objective.parent {
            let index = self.active_index()?;
            let parent_id = resolve_parent(&index, parent)?;
            if would_create_cycle(&index, objective.id, parent_id) {
                return Err(ObjectiveServiceError::CycleDetected {
                    objective_id: objective.id,
                    parent_id,
                });
            }
        }

        self.repo.update_objective(objective).map_err(Into::into)
    }

    /// Moves an objective under a new parent (or to the roots) at the end
    /// of the sibling list.
    pub fn reparent(
        &self,
        id: ObjectiveId,
        new_parent: Option<ParentRef>,
    ) -> Result<LearningObjective, ObjectiveServiceError> {
        let index = self.active_index()?;
        let mut objective = self.get(id)?;
        let parent_id = match &new_parent {
            Some(parent) => Some(resolve_parent(&index, parent)?),
            None => None,
        };
        objective.parent = new_parent;
        objective.sort_order = next_sort_order(&index, parent_id);
        self.update(&objective)?;
        Ok(objective)
    }

    /// Archives an objective per `mode`; returns the archived ids.
    pub fn archive(
        &self,
        id: ObjectiveId,
        mode: ArchiveMode,
    ) -> Result<Vec<ObjectiveId>, ObjectiveServiceError> {
        let index = self.active_index()?;
        if index.get(id).is_none() {
            return Err(ObjectiveServiceError::ObjectiveNotFound(id));
        }

        let ids = match mode {
            ArchiveMode::NodeOnly => vec![id],
            ArchiveMode::Subtree => collect_subtree(&index, id),
        };
        self.repo.archive_objectives(&ids)?;
        info!(
            "event=objective_archive module=service status=ok objective_id={} archived={}",
            id,
            ids.len()
        );
        Ok(ids)
    }

    fn ensure_code_available(
        &self,
        code: &str,
        excluding: Option<ObjectiveId>,
    ) -> Result<(), ObjectiveServiceError> {
        if self.repo.code_in_use(code, excluding)? {
            return Err(ObjectiveServiceError::DuplicateCode(code.to_string()));
        }
        Ok(())
    }
}

fn resolve_parent(
    index: &ObjectiveIndex,
    parent: &ParentRef,
) -> Result<ObjectiveId, ObjectiveServiceError> {
    let resolved = match parent {
        ParentRef::Id(id) => index.get(*id).map(|objective| objective.id),
        ParentRef::Code(code) => index.by_code(code).map(|objective| objective.id),
    };
    resolved.ok_or_else(|| ObjectiveServiceError::ParentNotFound(parent.clone()))
}

fn next_sort_order(index: &ObjectiveIndex, parent_id: Option<ObjectiveId>) -> i64 {
    let siblings = match parent_id {
        Some(parent_id) => index.children_of(parent_id),
        None => index.roots(),
    };
    siblings
        .iter()
        .map(|sibling| sibling.sort_order)
        .max()
        .map_or(0, |max| max + 1)
}

fn would_create_cycle(
    index: &ObjectiveIndex,
    objective_id: ObjectiveId,
    candidate_parent_id: ObjectiveId,
) -> bool {
    let mut visited = HashSet::new();
    let mut cursor = Some(candidate_parent_id);
    while let Some(current) = cursor {
        if current == objective_id || !visited.insert(current) {
            return true;
        }
        cursor = index.parent_of(current);
    }
    false
}

fn collect_subtree(index: &ObjectiveIndex, root_id: ObjectiveId) -> Vec<ObjectiveId> {
    let mut ids = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![root_id];
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        ids.push(id);
        stack.extend(index.child_ids(id).iter().rev().copied());
    }
    ids
}
