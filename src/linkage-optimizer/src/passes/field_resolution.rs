//! Field-to-link resolution.

use common_error::{LinkageError, LinkageResult};
use linkage_ast::{LinkRef, NodeId, NodeKind, QueryTree};
use log::trace;

use super::{OptimizationPass, PassContext, PassOutcome};

/// Assigns every named field the link of the index that owns it.
///
/// Wildcard fields are replaced by one copy per concrete field (grouped
/// under an `Or` when there is more than one). Meta fields are left
/// without a link. User-written expansions are opaque: their payload keeps
/// whatever links it already has, but the index they reach is recorded.
pub struct FieldLinkResolution;

impl OptimizationPass for FieldLinkResolution {
    fn name(&self) -> &'static str {
        "FieldLinkResolution"
    }

    fn description(&self) -> &'static str {
        "Assign index links to fields and expand wildcard fields"
    }

    fn apply(&self, tree: &mut QueryTree, ctx: &mut PassContext<'_>) -> LinkageResult<PassOutcome> {
        let home = ctx.metadata.home_index();
        let root = tree.root();
        let assigned = resolve(tree, root, &home, None, ctx)?;
        Ok(PassOutcome::from_events(assigned))
    }
}

/// `prefix` is the contextual field name of the innermost generated
/// expansion above `id`; fields beneath it were stripped of that prefix.
fn resolve(
    tree: &mut QueryTree,
    id: NodeId,
    current: &LinkRef,
    prefix: Option<&str>,
    ctx: &mut PassContext<'_>,
) -> LinkageResult<usize> {
    let kind = tree.kind(id);
    if kind.is_expansion() && !kind.is_generated_expansion() {
        record_user_expansion(tree, id, ctx)?;
        return Ok(0);
    }

    let mut assigned = 0;
    for position in 0..tree.children(id).len() {
        let Some(child) = tree.child(id, position) else {
            break;
        };
        let kind = tree.kind(child);
        if matches!(
            kind,
            NodeKind::IndexLink | NodeKind::Aggregate | NodeKind::Suggest
        ) {
            continue;
        }
        let is_expansion = kind.is_expansion();
        let is_array = matches!(kind, NodeKind::Array { .. });

        if !is_expansion {
            if let Some(field) = tree.fieldname(child).map(str::to_string) {
                if ctx.conventions.is_wildcard(&field) {
                    expand_wildcard(tree, id, position, child, current, ctx)?;
                    assigned += 1;
                    continue;
                }
                if !ctx.conventions.is_meta_field(&field) {
                    let link = ctx.metadata.resolve_field_owner(&qualify(&field, prefix))?;
                    trace!("Field '{field}' on {child} resolved to {link}");
                    tree.set_link(child, link.clone());
                    ctx.used.insert(link);
                    assigned += 1;
                }
            }
        }

        if is_array {
            continue;
        }

        let (next, next_prefix) = if tree.kind(child).is_generated_expansion() {
            let link = tree
                .index_link(child)
                .ok_or_else(|| LinkageError::invalid_query(format!("expansion {child} has no link")))?;
            (
                ctx.metadata.resolve_field_owner(&link.left_fieldname)?,
                link.fieldname.clone(),
            )
        } else {
            (current.clone(), prefix.map(str::to_string))
        };
        assigned += resolve(tree, child, &next, next_prefix.as_deref(), ctx)?;
    }

    if tree.kind(id).is_generated_expansion() {
        record_generated_expansion(tree, id, ctx)?;
    }
    Ok(assigned)
}

/// Restore the contextual prefix a field lost when it was wrapped.
fn qualify(field: &str, prefix: Option<&str>) -> String {
    match prefix {
        Some(prefix) if !field.starts_with(&format!("{prefix}.")) => format!("{prefix}.{field}"),
        _ => field.to_string(),
    }
}

/// A user expansion reaches the index its link names; the sentinel name
/// defers to the owner of the left field, which must exist either way.
fn record_user_expansion(
    tree: &QueryTree,
    id: NodeId,
    ctx: &mut PassContext<'_>,
) -> LinkageResult<()> {
    let link = tree
        .index_link(id)
        .ok_or_else(|| LinkageError::invalid_query(format!("expansion {id} has no link")))?;
    let left_owner = ctx.metadata.resolve_field_owner(&link.left_fieldname)?;
    let reached = match link.index_name() {
        Some(name) if !ctx.conventions.is_deferred_index(name) => {
            ctx.metadata.resolve_index_by_name(name)?
        }
        _ => left_owner,
    };
    ctx.used.insert(reached);
    Ok(())
}

/// A generated expansion touches the owners of both join fields.
fn record_generated_expansion(
    tree: &QueryTree,
    id: NodeId,
    ctx: &mut PassContext<'_>,
) -> LinkageResult<()> {
    let link = tree
        .index_link(id)
        .ok_or_else(|| LinkageError::invalid_query(format!("expansion {id} has no link")))?;
    let left = ctx.metadata.resolve_field_owner(&link.left_fieldname)?;
    let right = ctx.metadata.resolve_field_owner(&link.right_fieldname)?;
    ctx.used.insert(left);
    ctx.used.insert(right);
    Ok(())
}

/// Replace a wildcard node with one copy per concrete field.
///
/// The replacement is not descended into.
fn expand_wildcard(
    tree: &mut QueryTree,
    parent: NodeId,
    position: usize,
    wildcard: NodeId,
    current: &LinkRef,
    ctx: &mut PassContext<'_>,
) -> LinkageResult<()> {
    let pairs = ctx.metadata.resolve_wildcard_fields()?;
    let mut copies = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let link = pair.link.unwrap_or_else(|| current.clone());
        let copy = tree.copy_subtree(wildcard);
        tree.set_fieldname(copy, pair.fieldname);
        tree.set_link(copy, link.clone());
        ctx.used.insert(link);
        copies.push(copy);
    }

    trace!("Wildcard {wildcard} expanded into {} fields", copies.len());
    let replacement = if copies.len() == 1 {
        copies[0]
    } else {
        tree.or(copies)
    };
    tree.set_child(parent, position, replacement)?;
    Ok(())
}
