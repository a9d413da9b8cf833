//! Deferred link rewriting.

use common_error::LinkageResult;
use linkage_ast::{IndexLink, LinkRef, NodeId, QueryTree};
use log::trace;

use super::{OptimizationPass, PassContext, PassOutcome};

/// Replaces sentinel-named links on generated expansions with deferred ones.
///
/// A hop whose index is the deferred sentinel cannot be routed until field
/// ownership is known; its link becomes [`IndexLink::deferred`], which
/// reaches whichever index owns its left field at read time.
pub struct IndirectLinkRewrite;

impl OptimizationPass for IndirectLinkRewrite {
    fn name(&self) -> &'static str {
        "IndirectLinkRewrite"
    }

    fn description(&self) -> &'static str {
        "Defer resolution of sentinel-named expansion links"
    }

    fn apply(&self, tree: &mut QueryTree, ctx: &mut PassContext<'_>) -> LinkageResult<PassOutcome> {
        let root = tree.root();
        let rewritten = rewrite(tree, root, ctx)?;
        Ok(PassOutcome::from_events(rewritten))
    }
}

fn rewrite(tree: &mut QueryTree, id: NodeId, ctx: &PassContext<'_>) -> LinkageResult<usize> {
    let mut rewritten = 0;

    if tree.kind(id).is_generated_expansion() {
        let deferred = tree
            .index_link(id)
            .filter(|link| {
                link.index_name()
                    .is_some_and(|name| ctx.conventions.is_deferred_index(name))
            })
            .map(|link| {
                LinkRef::new(
                    IndexLink::deferred(link.left_fieldname.clone(), link.right_fieldname.clone())
                        .with_optional_fieldname(link.fieldname.clone()),
                )
            });
        if let Some(link) = deferred {
            trace!("Deferring {link} on {id}");
            let node = tree.link_node(link);
            tree.set_child(id, 0, node)?;
            rewritten += 1;
        }
    }

    for child in tree.children(id).to_vec() {
        rewritten += rewrite(tree, child, ctx)?;
    }
    Ok(rewritten)
}
