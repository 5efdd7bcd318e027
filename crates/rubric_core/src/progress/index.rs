//! Parent-to-children index over a flat objective list.
//!
//! # Responsibility
//! - Resolve both parent addressing schemes (id, code) to one key.
//! - Build ordered child lists once per snapshot instead of rescanning.
//!
//! # Invariants
//! - Archived objectives are never indexed.
//! - A parent reference that does not resolve to an active node makes the
//!   objective a root.
//! - Siblings are ordered by `sort_order ASC, code ASC`.
//! - Codes are assumed unique; on collision the first objective wins code
//!   lookups.

use crate::model::objective::{LearningObjective, ObjectiveId, ParentRef};
use std::collections::HashMap;

/// Immutable lookup structure for one objective snapshot.
#[derive(Debug, Clone, Default)]
pub struct ObjectiveIndex {
    nodes: HashMap<ObjectiveId, LearningObjective>,
    code_to_id: HashMap<String, ObjectiveId>,
    children: HashMap<ObjectiveId, Vec<ObjectiveId>>,
    parent_of: HashMap<ObjectiveId, ObjectiveId>,
    roots: Vec<ObjectiveId>,
}

impl ObjectiveIndex {
    /// Builds an index from all objectives, dropping archived ones.
    pub fn build<'a, I>(objectives: I) -> Self
    where
        I: IntoIterator<Item = &'a LearningObjective>,
    {
        let mut nodes = HashMap::new();
        let mut code_to_id = HashMap::new();
        for objective in objectives.into_iter().filter(|item| item.is_active()) {
            code_to_id
                .entry(objective.code.clone())
                .or_insert(objective.id);
            nodes.insert(objective.id, objective.clone());
        }

        let mut children: HashMap<ObjectiveId, Vec<ObjectiveId>> = HashMap::new();
        let mut parent_of = HashMap::new();
        let mut roots = Vec::new();
        for objective in nodes.values() {
            let parent_id = objective
                .parent
                .as_ref()
                .and_then(|parent| resolve_parent(parent, &nodes, &code_to_id))
                .filter(|parent_id| *parent_id != objective.id);
            match parent_id {
                Some(parent_id) => {
                    parent_of.insert(objective.id, parent_id);
                    children.entry(parent_id).or_default().push(objective.id);
                }
                None => roots.push(objective.id),
            }
        }

        for siblings in children.values_mut() {
            sort_siblings(siblings, &nodes);
        }
        sort_siblings(&mut roots, &nodes);

        Self {
            nodes,
            code_to_id,
            children,
            parent_of,
            roots,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: ObjectiveId) -> Option<&LearningObjective> {
        self.nodes.get(&id)
    }

    pub fn by_code(&self, code: &str) -> Option<&LearningObjective> {
        self.code_to_id.get(code).and_then(|id| self.nodes.get(id))
    }

    /// Ordered child ids; empty for leaves and unknown ids.
    pub fn child_ids(&self, id: ObjectiveId) -> &[ObjectiveId] {
        self.children.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Ordered children of one node.
    pub fn children_of(&self, id: ObjectiveId) -> Vec<&LearningObjective> {
        self.child_ids(id)
            .iter()
            .filter_map(|child_id| self.nodes.get(child_id))
            .collect()
    }

    /// Resolved parent id, `None` for roots and orphans.
    pub fn parent_of(&self, id: ObjectiveId) -> Option<ObjectiveId> {
        self.parent_of.get(&id).copied()
    }

    pub fn root_ids(&self) -> &[ObjectiveId] {
        &self.roots
    }

    /// Ordered root objectives ("success criteria").
    pub fn roots(&self) -> Vec<&LearningObjective> {
        self.roots
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .collect()
    }

    pub fn is_leaf(&self, id: ObjectiveId) -> bool {
        self.child_ids(id).is_empty()
    }

    /// All active leaves in depth-first display order.
    pub fn leaves(&self) -> Vec<&LearningObjective> {
        self.depth_first()
            .into_iter()
            .filter(|objective| self.is_leaf(objective.id))
            .collect()
    }

    /// Nodes reachable from the roots in display order (pre-order).
    ///
    /// Nodes caught in a parent cycle are unreachable from any root and are
    /// not returned.
    pub fn depth_first(&self) -> Vec<&LearningObjective> {
        let mut ordered = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<ObjectiveId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if let Some(objective) = self.nodes.get(&id) {
                ordered.push(objective);
            }
            stack.extend(self.child_ids(id).iter().rev().copied());
        }
        ordered
    }

    /// Number of ancestors above the node, bounded by the index size.
    pub fn depth(&self, id: ObjectiveId) -> usize {
        let mut depth = 0;
        let mut cursor = self.parent_of(id);
        while let Some(parent_id) = cursor {
            depth += 1;
            if depth > self.nodes.len() {
                break;
            }
            cursor = self.parent_of(parent_id);
        }
        depth
    }

    pub fn iter(&self) -> impl Iterator<Item = &LearningObjective> {
        self.nodes.values()
    }
}

/// Returns active children of `objective` ordered by `sort_order`, then `code`.
///
/// Scans the full list; prefer [`ObjectiveIndex`] for repeated queries.
pub fn children_of<'a>(
    objective: &LearningObjective,
    all_objectives: &'a [LearningObjective],
) -> Vec<&'a LearningObjective> {
    let mut children: Vec<&LearningObjective> = all_objectives
        .iter()
        .filter(|candidate| candidate.is_active() && candidate.id != objective.id)
        .filter(|candidate| match &candidate.parent {
            Some(ParentRef::Id(parent_id)) => *parent_id == objective.id,
            Some(ParentRef::Code(parent_code)) => *parent_code == objective.code,
            None => false,
        })
        .collect();
    children.sort_by(|left, right| {
        left.sort_order
            .cmp(&right.sort_order)
            .then_with(|| left.code.cmp(&right.code))
    });
    children
}

fn resolve_parent(
    parent: &ParentRef,
    nodes: &HashMap<ObjectiveId, LearningObjective>,
    code_to_id: &HashMap<String, ObjectiveId>,
) -> Option<ObjectiveId> {
    match parent {
        ParentRef::Id(parent_id) => nodes.contains_key(parent_id).then_some(*parent_id),
        ParentRef::Code(parent_code) => code_to_id.get(parent_code).copied(),
    }
}

fn sort_siblings(ids: &mut [ObjectiveId], nodes: &HashMap<ObjectiveId, LearningObjective>) {
    ids.sort_by(|left, right| match (nodes.get(left), nodes.get(right)) {
        (Some(left), Some(right)) => left
            .sort_order
            .cmp(&right.sort_order)
            .then_with(|| left.code.cmp(&right.code)),
        _ => left.cmp(right),
    });
}
