//! Query AST for linked search indices.
//!
//! `linkage-ast` holds the data model the index link optimizer rewrites:
//!
//! - [`QueryTree`]: an arena of [`Node`]s addressed by [`NodeId`], with
//!   parent pointers kept consistent by every mutation primitive
//! - [`IndexLink`] / [`LinkRef`]: join descriptors, compared by identity
//! - [`TreeNormalizer`]: the parenthetical-group rollup collaborator
//!
//! # Example
//!
//! ```rust
//! use linkage_ast::{IndexLink, LinkRef, QueryTree};
//!
//! let mut tree = QueryTree::new();
//! let title = tree.term("title", "rust");
//! let year = tree.term("year", "2015");
//! let and = tree.and([title, year]);
//! tree.push(and).unwrap();
//!
//! let volumes = LinkRef::new(IndexLink::new("vol_id", "volumes", "id"));
//! let expansion = tree.expansion(volumes, year, false);
//! tree.append_child(and, expansion).unwrap();
//!
//! assert_eq!(tree.count_nodes(), 6);
//! println!("{}", tree.explain());
//! ```

mod link;
mod node;
mod normalize;
mod tree;

pub use link::{IndexLink, LinkRef, LinkTarget, UsedIndexes};
pub use node::{Node, NodeId, NodeKind, Operator};
pub use normalize::{ParentheticalRollup, TreeNormalizer};
pub use tree::QueryTree;
