//! Linkage - index link optimizer for linked search indices
//!
//! Linkage rewrites a parsed query tree so that every field knows which
//! index it lives in, and every subtree that reads a foreign index is
//! wrapped in the chain of joins that reaches it from the home index.

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

// Re-export member crates
pub use common_config as config;
pub use common_error as error;
pub use linkage_ast as ast;
pub use linkage_metadata as metadata;
pub use linkage_optimizer as optimizer;

pub use linkage_optimizer::optimize;

/// Linkage version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
