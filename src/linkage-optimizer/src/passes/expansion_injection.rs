//! Expansion injection.
//!
//! Subtrees whose fields all live in one foreign index are wrapped in a
//! chain of generated expansions that joins that index back to the home
//! index, one expansion per hop.

use common_error::{LinkageError, LinkageResult};
use linkage_ast::{IndexLink, LinkRef, NodeId, NodeKind, QueryTree};
use linkage_metadata::path::{is_field_hop, split_hop};
use log::trace;

use super::path_strip::strip_path;
use super::{OptimizationPass, PassContext, PassOutcome};

/// Wraps single-foreign-index subtrees with explicit join chains.
pub struct ExpansionInjection;

impl OptimizationPass for ExpansionInjection {
    fn name(&self) -> &'static str {
        "ExpansionInjection"
    }

    fn description(&self) -> &'static str {
        "Wrap subtrees that reference a single foreign index in join expansions"
    }

    fn apply(&self, tree: &mut QueryTree, ctx: &mut PassContext<'_>) -> LinkageResult<PassOutcome> {
        let root = tree.root();
        let mut injected = 0;
        for child in tree.children(root).to_vec() {
            if matches!(
                tree.kind(child),
                NodeKind::Options | NodeKind::FieldLists | NodeKind::Aggregate | NodeKind::Suggest
            ) {
                continue;
            }
            injected += inject(tree, child, ctx)?;
        }
        Ok(PassOutcome::from_events(injected))
    }
}

fn inject(tree: &mut QueryTree, node: NodeId, ctx: &mut PassContext<'_>) -> LinkageResult<usize> {
    // The index reached by the innermost expansion we unwrap scopes the payload.
    let mut scope: Option<LinkRef> = None;
    let mut root = node;
    while tree.kind(root).is_expansion() {
        scope = tree.index_link(root).cloned();
        root = tree
            .expansion_query(root)
            .ok_or_else(|| LinkageError::invalid_query(format!("expansion {root} has no query")))?;
    }

    let links = distinct_links(tree, root);
    match links.as_slice() {
        [] => Ok(0),
        [link] => {
            if *link == ctx.metadata.home_index() {
                return Ok(0);
            }
            if let Some(scope) = &scope {
                if reaches_same_index(scope, link, ctx)? {
                    return Ok(0);
                }
            }
            wrap(tree, root, link, ctx)?;
            Ok(1)
        }
        _ => {
            let mut injected = 0;
            for child in tree.children(root).to_vec() {
                injected += inject(tree, child, ctx)?;
            }
            Ok(injected)
        }
    }
}

/// Links referenced beneath `root`, by identity, in pre-order.
fn distinct_links(tree: &QueryTree, root: NodeId) -> Vec<LinkRef> {
    let mut links: Vec<LinkRef> = Vec::new();
    for node in tree.descendants(root) {
        if let Some(link) = tree.link(node) {
            if !links.contains(link) {
                links.push(link.clone());
            }
        }
    }
    links
}

fn reaches_same_index(a: &LinkRef, b: &LinkRef, ctx: &PassContext<'_>) -> LinkageResult<bool> {
    if a == b {
        return Ok(true);
    }
    Ok(ctx.metadata.resolve_index_name(a)? == ctx.metadata.resolve_index_name(b)?)
}

/// Replace `root` with the expansion chain that joins `link` back home.
fn wrap(
    tree: &mut QueryTree,
    root: NodeId,
    link: &LinkRef,
    ctx: &mut PassContext<'_>,
) -> LinkageResult<()> {
    let home = ctx.metadata.home_index();
    let path = ctx.metadata.compute_join_path(link, &home)?;

    if let Some(prefix) = &link.fieldname {
        strip_path(tree, root, prefix);
    }

    let (parent, position) = tree
        .detach(root)
        .ok_or_else(|| LinkageError::internal(format!("{root} has no parent to splice into")))?;

    let wrapper = match build_chain(tree, root, link, &home, path, ctx)? {
        Some(outermost) => outermost,
        None => tree.expansion(link.clone(), root, true),
    };
    ctx.used.insert(link.clone());
    tree.insert_child(parent, position, wrapper)?;

    trace!("Injected {wrapper} over {root} for {link}");
    Ok(())
}

/// Build nested expansions from a nearest-target-first hop list.
///
/// Returns the outermost expansion, or `None` when the first hop is
/// already a zero-length join.
fn build_chain(
    tree: &mut QueryTree,
    payload: NodeId,
    link: &LinkRef,
    home: &LinkRef,
    path: Vec<String>,
    ctx: &mut PassContext<'_>,
) -> LinkageResult<Option<NodeId>> {
    let malformed = |why: &str| {
        LinkageError::malformed_path(format!("join path from {link} to {home} {why}"))
    };

    let mut stack: Vec<String> = path.into_iter().rev().collect();
    let mut last: Option<NodeId> = None;
    let mut previous_left: Option<String> = None;

    while let Some(mut current) = stack.pop() {
        let mut next = stack.last().cloned();
        if next.as_deref().is_some_and(|hop| !is_field_hop(hop)) {
            stack.pop();
            loop {
                current = stack
                    .pop()
                    .ok_or_else(|| malformed("ends in an index separator"))?;
                next = stack.last().cloned();
                if !next.as_deref().is_some_and(|hop| !is_field_hop(hop)) {
                    break;
                }
            }
        }

        let (current_index, current_field) =
            split_hop(&current).ok_or_else(|| malformed("has a hop without a field"))?;

        let (index_name, left, right) = match next.as_deref() {
            Some(next) => {
                let (_, next_field) =
                    split_hop(next).ok_or_else(|| malformed("has a hop without a field"))?;
                (
                    current_index.to_string(),
                    next_field.to_string(),
                    current_field.to_string(),
                )
            }
            None => {
                let Some(prev) = last else {
                    return Err(malformed("has no hop to join from"));
                };
                let index_name = tree
                    .index_link(prev)
                    .and_then(|l| l.index_name())
                    .ok_or_else(|| malformed("lost the index of its previous hop"))?
                    .to_string();
                let right = previous_left
                    .clone()
                    .ok_or_else(|| malformed("lost the field of its previous hop"))?;
                (index_name, current_field.to_string(), right)
            }
        };

        if left == right {
            trace!("Dropping zero-length join on '{left}' into {index_name}");
            break;
        }

        if !ctx.conventions.is_deferred_index(&index_name) {
            let reached = ctx.metadata.resolve_index_by_name(&index_name)?;
            ctx.used.insert(reached);
        }

        let hop = ctx.hop_link(
            IndexLink::new(left.clone(), index_name, right)
                .with_optional_fieldname(link.fieldname.clone()),
        );
        let inner = last.unwrap_or(payload);
        last = Some(tree.expansion(hop, inner, true));
        previous_left = Some(left);
    }

    Ok(last)
}
