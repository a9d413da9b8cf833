//! Rewrite passes for linked-index query trees.
//!
//! Passes run in a fixed order driven by [`Optimizer`]:
//!
//! - **Field resolution**: assign each field the link of its owning index
//! - **Expansion injection**: wrap single-foreign-index subtrees in joins
//! - **Expansion merge**: fuse sibling expansions over one link
//! - **Indirect links**: defer sentinel-named hops to read time
//! - **Aggregate links**: record the indices aggregates read from
//!
//! # Rewrite Safety
//!
//! Every pass keeps parent pointers consistent and never increases the
//! node count during the merge/rollup cycle, so the driver terminates.

mod aggregate_links;
mod expansion_injection;
mod expansion_merge;
mod field_resolution;
mod indirect_links;
mod optimizer;
mod pass;
mod path_strip;

pub use aggregate_links::AggregateLinks;
pub use expansion_injection::ExpansionInjection;
pub use expansion_merge::ExpansionMerge;
pub use field_resolution::FieldLinkResolution;
pub use indirect_links::IndirectLinkRewrite;
pub use optimizer::{Optimizer, OptimizerConfig, OptimizerState};
pub use pass::{OptimizationPass, OptimizedQuery, PassContext, PassOutcome, PassTrace};
pub use path_strip::strip_path;
