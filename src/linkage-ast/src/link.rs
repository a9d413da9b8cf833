//! Index links: the join descriptors that expansions are evaluated against.
//!
//! The metadata collaborator hands out canonical [`LinkRef`]s. Two lookups of
//! the same logical join return the same allocation, and equality on
//! `LinkRef` is pointer identity. Grouping by `LinkRef` therefore only fuses
//! expansions that share one resolution, never two joins that merely look
//! alike.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Where an index link points.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkTarget {
    /// A concrete index name.
    Named(String),
    /// The index owning the link's left field, looked up when read.
    Deferred,
}

impl LinkTarget {
    /// The concrete index name, if already known.
    pub fn as_named(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            Self::Deferred => None,
        }
    }

    /// Check if resolution of this target is deferred.
    pub const fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred)
    }
}

/// A join from a field in one index to a field in another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexLink {
    /// Field in the source index.
    pub left_fieldname: String,
    /// The index this link reaches.
    pub target: LinkTarget,
    /// Field in the target index mirroring the left field.
    pub right_fieldname: String,
    /// Contextual field name (dotted prefix) the link was declared under.
    pub fieldname: Option<String>,
}

impl IndexLink {
    /// Create a link to a named index.
    pub fn new(
        left_fieldname: impl Into<String>,
        index_name: impl Into<String>,
        right_fieldname: impl Into<String>,
    ) -> Self {
        Self {
            left_fieldname: left_fieldname.into(),
            target: LinkTarget::Named(index_name.into()),
            right_fieldname: right_fieldname.into(),
            fieldname: None,
        }
    }

    /// Create a link whose index is resolved from its left field on read.
    pub fn deferred(left_fieldname: impl Into<String>, right_fieldname: impl Into<String>) -> Self {
        Self {
            left_fieldname: left_fieldname.into(),
            target: LinkTarget::Deferred,
            right_fieldname: right_fieldname.into(),
            fieldname: None,
        }
    }

    /// Set the contextual field name.
    pub fn with_fieldname(mut self, fieldname: impl Into<String>) -> Self {
        self.fieldname = Some(fieldname.into());
        self
    }

    /// Set or clear the contextual field name.
    pub fn with_optional_fieldname(mut self, fieldname: Option<String>) -> Self {
        self.fieldname = fieldname;
        self
    }

    /// The target index name when it is not deferred.
    pub fn index_name(&self) -> Option<&str> {
        self.target.as_named()
    }

    /// Check if this link carries a contextual field name.
    pub fn has_fieldname(&self) -> bool {
        self.fieldname.is_some()
    }
}

impl fmt::Display for IndexLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(fieldname) = &self.fieldname {
            write!(f, "{fieldname}:(")?;
        }
        match &self.target {
            LinkTarget::Named(index) => write!(
                f,
                "{}=<{}>{}",
                self.left_fieldname, index, self.right_fieldname
            )?,
            LinkTarget::Deferred => {
                write!(f, "{}=<?>{}", self.left_fieldname, self.right_fieldname)?
            }
        }
        if self.fieldname.is_some() {
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// Shared handle to an index link, compared by identity.
#[derive(Debug, Clone)]
pub struct LinkRef(Arc<IndexLink>);

impl LinkRef {
    /// Allocate a fresh link with its own identity.
    pub fn new(link: IndexLink) -> Self {
        Self(Arc::new(link))
    }

    /// Check if both handles describe the same join, regardless of identity.
    pub fn same_join(&self, other: &Self) -> bool {
        *self.0 == *other.0
    }

    /// Check if both handles point at the same canonical instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::ops::Deref for LinkRef {
    type Target = IndexLink;

    fn deref(&self) -> &IndexLink {
        &self.0
    }
}

impl PartialEq for LinkRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for LinkRef {}

impl Hash for LinkRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0), state);
    }
}

impl fmt::Display for LinkRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<IndexLink> for LinkRef {
    fn from(link: IndexLink) -> Self {
        Self::new(link)
    }
}

/// Identity-keyed set of links used by one optimizer run.
///
/// Iteration follows first insertion so results are deterministic.
#[derive(Debug, Clone, Default)]
pub struct UsedIndexes {
    seen: HashSet<LinkRef>,
    order: Vec<LinkRef>,
}

impl UsedIndexes {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a link. Returns `true` if it was not present.
    pub fn insert(&mut self, link: LinkRef) -> bool {
        if self.seen.insert(link.clone()) {
            self.order.push(link);
            true
        } else {
            false
        }
    }

    /// Check if the exact link instance was recorded.
    pub fn contains(&self, link: &LinkRef) -> bool {
        self.seen.contains(link)
    }

    /// Number of distinct links.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if no link was recorded.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterate links in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &LinkRef> {
        self.order.iter()
    }

    /// Names of the recorded indices, skipping deferred links.
    pub fn index_names(&self) -> Vec<&str> {
        self.order.iter().filter_map(|l| l.index_name()).collect()
    }
}

impl Extend<LinkRef> for UsedIndexes {
    fn extend<T: IntoIterator<Item = LinkRef>>(&mut self, iter: T) {
        for link in iter {
            self.insert(link);
        }
    }
}

impl IntoIterator for UsedIndexes {
    type Item = LinkRef;
    type IntoIter = std::vec::IntoIter<LinkRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.order.into_iter()
    }
}
