use crate::mutate::MutationTarget;
use crate::value::Value;

/// Controls what happens when a reference path does not resolve.
///
/// `Get` reads a missing path as nil without error; `Set` creates the
/// missing path (intermediate mappings plus an empty placeholder scalar)
/// so it can serve as an assignment target. The assignment operator flips
/// to `Set` only while resolving its left-hand side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingKeyMode {
    Get,
    Set,
}

/// Per-document mutable evaluation state.
///
/// One context is constructed per decoded document, owned by the pipeline
/// for that document's lifetime, threaded through every resolver, operator
/// and function, and discarded after emit/drop. Nothing survives across
/// documents.
#[derive(Debug)]
pub struct EvalContext {
    /// The document being processed
    pub root: Value,
    /// The current pipeline item; the root outside any pipe
    pub current_item: Value,
    /// The current pipeline key; set only inside a pipe iteration
    pub current_key: Option<Value>,
    pub missing_key_mode: MissingKeyMode,
    /// Externally supplied parameter bundle, read-only
    pub params: Value,
    /// Mutations queued by the current action expression
    pub targets: Vec<MutationTarget>,
    /// Set by the `drop` function; suppresses emission of this document
    pub drop: bool,
}

impl EvalContext {
    pub fn new(root: Value, params: Value) -> Self {
        let current_item = root.clone();
        EvalContext {
            root,
            current_item,
            current_key: None,
            missing_key_mode: MissingKeyMode::Get,
            params,
            targets: Vec::new(),
            drop: false,
        }
    }

    /// Re-anchor the current item on the (possibly rewritten) root.
    /// Called after merges and after every mutation-engine pass, since the
    /// item clone taken earlier may reference nodes that no longer exist.
    pub fn refresh_current_item(&mut self) {
        self.current_item = self.root.clone();
    }
}
