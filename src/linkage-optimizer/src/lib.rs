//! Query optimizer for linked-index query trees.
//!
//! Resolves which index every field lives in, wraps subtrees that read a
//! foreign index in explicit join expansions, and merges sibling joins over
//! the same link.
//!
//! ```
//! use linkage_ast::QueryTree;
//! use linkage_metadata::testing::library_catalog;
//!
//! let catalog = library_catalog();
//! let mut session = catalog.session();
//!
//! let mut tree = QueryTree::new();
//! let title = tree.term("vol.title", "rust");
//! tree.push(title).unwrap();
//!
//! let result = linkage_optimizer::optimize(&mut tree, &mut session).unwrap();
//! assert_eq!(result.used_indexes.index_names(), vec!["volumes"]);
//! assert_eq!(tree.fieldname(title), Some("title"));
//! ```

mod passes;

pub use passes::{
    AggregateLinks, ExpansionInjection, ExpansionMerge, FieldLinkResolution, IndirectLinkRewrite,
    OptimizationPass, OptimizedQuery, Optimizer, OptimizerConfig, OptimizerState, PassContext,
    PassOutcome, PassTrace, strip_path,
};

use common_error::LinkageResult;
use linkage_ast::QueryTree;
use linkage_metadata::IndexMetadata;

/// Optimize a query tree in place using the default optimizer.
pub fn optimize(
    tree: &mut QueryTree,
    metadata: &mut dyn IndexMetadata,
) -> LinkageResult<OptimizedQuery> {
    Optimizer::default().optimize(tree, metadata)
}
