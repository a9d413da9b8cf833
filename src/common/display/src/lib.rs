//! Display utilities for linkage.
//!
//! Renders query trees as box-drawn outlines for `explain()` output and
//! optimizer traces.

mod tree;

pub use tree::{DisplayTree, TreeNode};

/// Indent a multi-line string.
pub fn indent(s: &str, prefix: &str) -> String {
    s.lines()
        .map(|line| format!("{prefix}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
