//! Deferred mutation engine.
//!
//! Action expressions never edit the document directly. Evaluation queues
//! `(node identity, operation)` pairs; after the expression finishes, one
//! traversal of the document applies them. This is what lets an expression
//! like `list | @ = "X"` work: the assignment has no path, only a value
//! whose node id is found again inside the tree and replaced in place.

use crate::value::{NodeId, Value};

/// The operation queued against one node identity.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Replace the node's value in its parent
    Set(Value),
    /// Remove the mapping key or sequence element holding the node
    Unset,
    /// Replace one sequence element with all elements of the replacement
    Splice(Vec<Value>),
}

/// One queued mutation, produced while evaluating an action expression.
#[derive(Debug, Clone)]
pub struct MutationTarget {
    pub id: NodeId,
    pub op: Operation,
}

/// Failures of the apply pass.
#[derive(Debug, Clone)]
pub enum MutateError {
    /// A `Splice` target was not an element of a sequence
    SpliceOutsideSequence,
    /// The document root cannot be unset or spliced away
    RootTarget,
}

impl std::fmt::Display for MutateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutateError::SpliceOutsideSequence => {
                write!(f, "splice target is not an element of a sequence")
            }
            MutateError::RootTarget => {
                write!(f, "the document root cannot be unset or spliced")
            }
        }
    }
}

impl std::error::Error for MutateError {}

/// First queued target matching `id`, if any. Registration order decides
/// ties: when two targets share an identity the earliest wins and the
/// later one is silently ignored (kept for compatibility; arguably a
/// latent bug rather than a policy).
fn find_target(targets: &[MutationTarget], id: NodeId) -> Option<&MutationTarget> {
    targets.iter().find(|t| t.id == id)
}

/// Apply all queued targets in one pass over `root`, rewriting it in
/// place. Each node is matched at most once; nodes without a target are
/// left untouched, and replacement values are not traversed again.
pub fn apply(root: &mut Value, targets: &[MutationTarget]) -> Result<(), MutateError> {
    if targets.is_empty() {
        return Ok(());
    }

    // Root-level replacement is normally short-circuited by the assignment
    // operator, but a queued target can still name the root.
    if let Some(target) = find_target(targets, root.id()) {
        match &target.op {
            Operation::Set(value) => {
                *root = value.clone();
                return Ok(());
            }
            Operation::Unset | Operation::Splice(_) => return Err(MutateError::RootTarget),
        }
    }

    apply_children(root, targets)
}

fn apply_children(node: &mut Value, targets: &[MutationTarget]) -> Result<(), MutateError> {
    // The traversal owns parent/slot context, so each operation rewrites
    // the matched node's position in its parent container.
    if let Some(map) = node.as_mapping_mut() {
        let keys: Vec<String> = map.keys().cloned().collect();
        for key in keys {
            let child_id = map[&key].id();
            match find_target(targets, child_id).map(|t| t.op.clone()) {
                Some(Operation::Set(value)) => {
                    map.insert(key, value);
                }
                Some(Operation::Unset) => {
                    map.remove(&key);
                }
                Some(Operation::Splice(_)) => return Err(MutateError::SpliceOutsideSequence),
                None => {
                    if let Some(child) = map.get_mut(&key) {
                        apply_children(child, targets)?;
                    }
                }
            }
        }
        return Ok(());
    }

    if let Some(items) = node.as_sequence_mut() {
        let mut i = 0;
        while i < items.len() {
            match find_target(targets, items[i].id()).map(|t| t.op.clone()) {
                Some(Operation::Set(value)) => {
                    items[i] = value;
                    i += 1;
                }
                Some(Operation::Unset) => {
                    items.remove(i);
                }
                Some(Operation::Splice(replacement)) => {
                    let inserted = replacement.len();
                    items.splice(i..i + 1, replacement);
                    i += inserted;
                }
                None => {
                    apply_children(&mut items[i], targets)?;
                    i += 1;
                }
            }
        }
    }

    Ok(())
}
