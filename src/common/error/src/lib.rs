//! Error types and result aliases for linkage.
//!
//! Every pass of the optimizer reports failures through [`LinkageError`];
//! a raised error aborts the whole run for that query.

mod error;

pub use error::{LinkageError, LinkageResult};
