//! Sibling expansion merging.

use common_error::{LinkageError, LinkageResult};
use linkage_ast::{LinkRef, NodeId, NodeKind, QueryTree};
use log::trace;

use super::{OptimizationPass, PassContext, PassOutcome};

/// Fuses sibling expansions that share one link instance.
///
/// Under an `Or` the grouped payloads are combined with `Or`; under `And`
/// and `Not` they are combined with `And`. Grouping is by link identity, so
/// two equal but independently resolved joins are never fused.
pub struct ExpansionMerge;

impl OptimizationPass for ExpansionMerge {
    fn name(&self) -> &'static str {
        "ExpansionMerge"
    }

    fn description(&self) -> &'static str {
        "Merge sibling expansions over the same link"
    }

    fn apply(&self, tree: &mut QueryTree, _ctx: &mut PassContext<'_>) -> LinkageResult<PassOutcome> {
        let root = tree.root();
        let merges = merge(tree, root)?;
        Ok(PassOutcome::from_events(merges))
    }
}

fn merge(tree: &mut QueryTree, id: NodeId) -> LinkageResult<usize> {
    let mut merges = 0;
    for child in tree.children(id).to_vec() {
        merges += merge(tree, child)?;
    }

    let mut groups: Vec<(LinkRef, Vec<NodeId>)> = Vec::new();
    for &child in tree.children(id) {
        if !tree.kind(child).is_expansion() {
            continue;
        }
        let link = tree
            .index_link(child)
            .ok_or_else(|| LinkageError::invalid_query(format!("expansion {child} has no link")))?;
        match groups.iter_mut().find(|(key, _)| key == link) {
            Some((_, members)) => members.push(child),
            None => groups.push((link.clone(), vec![child])),
        }
    }

    for (link, members) in groups {
        if members.len() < 2 {
            continue;
        }
        let combine_with_or = match tree.kind(id) {
            NodeKind::And | NodeKind::Not => false,
            NodeKind::Or => true,
            other => return Err(LinkageError::unsupported_container(other.name())),
        };
        let combiner = if combine_with_or {
            tree.or(Vec::new())
        } else {
            tree.and(Vec::new())
        };

        let first = members[0];
        let generated = tree.kind(first).is_generated_expansion();
        for &member in &members {
            let query = tree.expansion_query(member).ok_or_else(|| {
                LinkageError::invalid_query(format!("expansion {member} has no query"))
            })?;
            tree.append_child(combiner, query)?;
        }

        let merged = tree.expansion(link.clone(), combiner, generated);
        tree.replace_child(id, first, merged)?;
        for &member in &members[1..] {
            tree.remove_child(id, member)?;
        }

        trace!(
            "Merged {} expansions over {link} under {}",
            members.len(),
            tree.kind(id).name()
        );
        merges += 1;
    }

    Ok(merges)
}
