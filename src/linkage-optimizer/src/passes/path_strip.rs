//! Contextual field prefix removal.

use linkage_ast::{NodeId, QueryTree};

/// Drop a leading `"<prefix>."` from every field name in a subtree.
///
/// Once a subtree is wrapped in an expansion for the link that owns the
/// prefix, its fields are addressed relative to the joined index. Returns
/// the number of renamed nodes.
pub fn strip_path(tree: &mut QueryTree, id: NodeId, prefix: &str) -> usize {
    let dotted = format!("{prefix}.");
    let mut renamed = 0;
    for node in tree.descendants(id) {
        let stripped = tree
            .fieldname(node)
            .and_then(|field| field.strip_prefix(&dotted))
            .map(str::to_string);
        if let Some(field) = stripped {
            tree.set_fieldname(node, field);
            renamed += 1;
        }
    }
    renamed
}
