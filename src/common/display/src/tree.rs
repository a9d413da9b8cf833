//! Tree display utilities for query trees.

use std::fmt;

/// A node in a display tree.
///
/// Implementors are usually lightweight views (a handle plus a borrow of
/// the owning arena), so children are produced by value.
pub trait TreeNode: Sized {
    /// Get the display name of this node.
    fn name(&self) -> String;

    /// Get child nodes.
    fn children(&self) -> Vec<Self>;

    /// Get additional details to display.
    fn details(&self) -> Option<String> {
        None
    }
}

/// Helper for displaying tree structures.
pub struct DisplayTree<N> {
    root: N,
}

impl<N: TreeNode> DisplayTree<N> {
    /// Create a new display tree.
    pub fn new(root: N) -> Self {
        Self { root }
    }

    fn fmt_node(f: &mut fmt::Formatter<'_>, node: &N, prefix: &str, is_last: bool) -> fmt::Result {
        let connector = if is_last { "└─ " } else { "├─ " };

        write!(f, "{prefix}{connector}{}", node.name())?;

        if let Some(details) = node.details() {
            write!(f, " ({details})")?;
        }
        writeln!(f)?;

        let children = node.children();
        let child_prefix = format!("{prefix}{}", if is_last { "   " } else { "│  " });

        for (i, child) in children.iter().enumerate() {
            let is_last_child = i == children.len() - 1;
            Self::fmt_node(f, child, &child_prefix, is_last_child)?;
        }

        Ok(())
    }
}

impl<N: TreeNode> fmt::Display for DisplayTree<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root.name())?;
        if let Some(details) = self.root.details() {
            write!(f, " ({details})")?;
        }
        writeln!(f)?;

        let children = self.root.children();
        for (i, child) in children.iter().enumerate() {
            let is_last = i == children.len() - 1;
            Self::fmt_node(f, child, "", is_last)?;
        }

        Ok(())
    }
}
