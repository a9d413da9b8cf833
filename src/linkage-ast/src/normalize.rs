//! Parenthetical-group normalization.
//!
//! Parsing leaves behind `And`/`Or` wrappers that only exist because the
//! user wrote parentheses. Rolling them up exposes sibling expansions to the
//! merger and is part of the optimizer's fixed-point loop.

use common_error::LinkageResult;
use log::trace;

use crate::node::NodeId;
use crate::tree::QueryTree;

/// Removes redundant grouping nodes without changing evaluation semantics.
///
/// Implementations must be idempotent and must never increase the number of
/// nodes reachable from the root.
pub trait TreeNormalizer: Send + Sync {
    /// Roll up redundant groups, returning how many nodes were removed.
    fn rollup_parenthetical_groups(&self, tree: &mut QueryTree) -> LinkageResult<usize>;
}

/// Default normalizer.
///
/// - An `And`/`Or` with a single child is replaced by that child.
/// - An `And` directly under an `And` (or `Or` under `Or`) is flattened
///   into its parent, keeping child order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParentheticalRollup;

impl TreeNormalizer for ParentheticalRollup {
    fn rollup_parenthetical_groups(&self, tree: &mut QueryTree) -> LinkageResult<usize> {
        let root = tree.root();
        let removed = rollup(tree, root)?;
        if removed > 0 {
            trace!("Rollup removed {removed} grouping nodes");
        }
        Ok(removed)
    }
}

fn rollup(tree: &mut QueryTree, id: NodeId) -> LinkageResult<usize> {
    let mut removed = 0;

    for child in tree.children(id).to_vec() {
        removed += rollup(tree, child)?;
    }

    let mut i = 0;
    while i < tree.children(id).len() {
        let child = tree.children(id)[i];
        let is_group = tree.kind(child).is_group();
        let same_kind = tree.kind(child) == tree.kind(id);

        if is_group && tree.children(child).len() == 1 {
            let only = tree.children(child)[0];
            tree.set_child(id, i, only)?;
            removed += 1;
            // `only` now sits at `i` and may itself be flattenable
            continue;
        }

        if is_group && same_kind {
            let grandchildren = tree.children(child).to_vec();
            tree.remove_child(id, child)?;
            for (offset, grandchild) in grandchildren.iter().enumerate() {
                tree.insert_child(id, i + offset, *grandchild)?;
            }
            removed += 1;
            i += grandchildren.len();
            continue;
        }

        i += 1;
    }

    Ok(removed)
}
