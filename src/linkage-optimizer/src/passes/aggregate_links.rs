//! Aggregate chain link collection.

use common_error::{LinkageError, LinkageResult};
use linkage_ast::QueryTree;
use log::trace;

use super::{OptimizationPass, PassContext, PassOutcome};

/// Records the owning link of every aggregate in the chain off the root.
///
/// Leaves the tree untouched.
pub struct AggregateLinks;

impl OptimizationPass for AggregateLinks {
    fn name(&self) -> &'static str {
        "AggregateLinks"
    }

    fn description(&self) -> &'static str {
        "Record the indices used by aggregate fields"
    }

    fn apply(&self, tree: &mut QueryTree, ctx: &mut PassContext<'_>) -> LinkageResult<PassOutcome> {
        let mut resolved = 0;
        let mut next = tree.aggregate();
        while let Some(aggregate) = next {
            let field = tree.fieldname(aggregate).ok_or_else(|| {
                LinkageError::invalid_query(format!("aggregate {aggregate} has no field"))
            })?;
            let link = ctx.metadata.resolve_field_owner(field)?;
            trace!("Aggregate on '{field}' uses {link}");
            ctx.used.insert(link);
            resolved += 1;
            next = tree.sub_aggregate(aggregate);
        }
        Ok(PassOutcome {
            changed: false,
            events: resolved,
        })
    }
}
