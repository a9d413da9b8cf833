//! The metadata collaborator consumed by the optimizer.

use common_error::{LinkageError, LinkageResult};
use linkage_ast::{IndexLink, LinkRef, LinkTarget, UsedIndexes};

/// A field produced by wildcard resolution, with the link that owns it.
///
/// `link` is `None` for fields of the index the wildcard was written
/// against; the optimizer substitutes its current context index.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldAndIndexPair {
    /// Concrete field name.
    pub fieldname: String,
    /// Owning link, if not the current index.
    pub link: Option<LinkRef>,
}

impl FieldAndIndexPair {
    /// Create a new pair.
    pub fn new(fieldname: impl Into<String>, link: Option<LinkRef>) -> Self {
        Self {
            fieldname: fieldname.into(),
            link,
        }
    }
}

/// Index metadata service.
///
/// Lookups hand out canonical [`LinkRef`]s: resolving the same logical join
/// twice must return the same instance. Lookups take `&self` and may run
/// concurrently across optimizer runs; [`record_used_indexes`] is the only
/// write and belongs to a single run.
///
/// [`record_used_indexes`]: IndexMetadata::record_used_indexes
pub trait IndexMetadata {
    /// The index the query is written against.
    fn home_index(&self) -> LinkRef;

    /// The canonical link owning `fieldname`.
    ///
    /// Fails with `UnknownField` if no index declares the field.
    fn resolve_field_owner(&self, fieldname: &str) -> LinkageResult<LinkRef>;

    /// The canonical link reaching the index called `name`.
    fn resolve_index_by_name(&self, name: &str) -> LinkageResult<LinkRef>;

    /// The fields the wildcard field expands to, in a stable order.
    fn resolve_wildcard_fields(&self) -> LinkageResult<Vec<FieldAndIndexPair>>;

    /// Hops from the index reached by `from` back to the index reached by
    /// `to`, nearest-`from` first.
    ///
    /// Fails with `UnreachablePath` if no chain of links connects them.
    fn compute_join_path(&self, from: &LinkRef, to: &LinkRef) -> LinkageResult<Vec<String>>;

    /// Receive the final set of links an optimizer run touched.
    fn record_used_indexes(&mut self, used: &UsedIndexes);

    /// The index a link points at, resolving deferred targets now.
    ///
    /// A deferred link reaches whichever index owns its left field.
    fn resolve_index_name(&self, link: &IndexLink) -> LinkageResult<String> {
        match &link.target {
            LinkTarget::Named(name) => Ok(name.clone()),
            LinkTarget::Deferred => {
                let owner = self.resolve_field_owner(&link.left_fieldname)?;
                owner.index_name().map(str::to_string).ok_or_else(|| {
                    LinkageError::internal(format!(
                        "owner of '{}' is itself deferred",
                        link.left_fieldname
                    ))
                })
            }
        }
    }
}
