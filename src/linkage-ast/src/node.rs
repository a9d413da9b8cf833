//! Query node kinds and per-node data.

use serde::{Deserialize, Serialize};

use crate::link::LinkRef;

/// Handle to a node in a [`QueryTree`](crate::QueryTree) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of the node in its arena.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Comparison applied by a leaf predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Operator {
    /// Full-text containment (`:`).
    #[default]
    Contains,
    /// Exact match (`=`).
    Equals,
    /// Negated exact match (`!=`).
    NotEquals,
    /// Negated containment (`<>`).
    DoesNotContain,
    /// Regular expression match (`:~`).
    Regex,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
}

impl Operator {
    /// Get the symbol for display.
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Contains => ":",
            Self::Equals => "=",
            Self::NotEquals => "!=",
            Self::DoesNotContain => "<>",
            Self::Regex => ":~",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// The variant of a query node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The root of a query.
    QueryTree,
    /// Conjunction of the children.
    And,
    /// Disjunction of the children.
    Or,
    /// Negation of the children.
    Not,
    /// Evaluate child 1 against the index reached by the link in child 0.
    Expansion {
        /// Synthesized by the optimizer rather than written by the user.
        generated: bool,
    },
    /// A join descriptor; the link itself is held in the node's link slot.
    IndexLink,
    /// Atomic literal list; never expanded.
    Array {
        /// Comparison applied to each value.
        operator: Operator,
        /// The literal values.
        values: Vec<String>,
    },
    /// One aggregation request; a nested `Aggregate` child is its sub-aggregate.
    Aggregate,
    /// Term suggestion request.
    Suggest,
    /// Query-level options.
    Options,
    /// Named field lists.
    FieldLists,
    /// Single-term predicate.
    Term {
        /// Comparison applied to the value.
        operator: Operator,
        /// The term.
        value: String,
    },
    /// Phrase predicate.
    Phrase {
        /// Comparison applied to the value.
        operator: Operator,
        /// The phrase text.
        value: String,
    },
}

impl NodeKind {
    /// Get the name for display.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::QueryTree => "QueryTree",
            Self::And => "And",
            Self::Or => "Or",
            Self::Not => "Not",
            Self::Expansion { .. } => "Expansion",
            Self::IndexLink => "IndexLink",
            Self::Array { .. } => "Array",
            Self::Aggregate => "Aggregate",
            Self::Suggest => "Suggest",
            Self::Options => "Options",
            Self::FieldLists => "FieldLists",
            Self::Term { .. } => "Term",
            Self::Phrase { .. } => "Phrase",
        }
    }

    /// Check if this is an `Expansion`.
    pub const fn is_expansion(&self) -> bool {
        matches!(self, Self::Expansion { .. })
    }

    /// Check if this is an `Expansion` synthesized by the optimizer.
    pub const fn is_generated_expansion(&self) -> bool {
        matches!(self, Self::Expansion { generated: true })
    }

    /// Check if this is an `And` or `Or` grouping.
    pub const fn is_group(&self) -> bool {
        matches!(self, Self::And | Self::Or)
    }
}

/// A node stored in the arena.
#[derive(Debug, Clone)]
pub struct Node {
    /// Node variant.
    pub kind: NodeKind,
    /// Field the node refers to, if any.
    pub fieldname: Option<String>,
    /// Assigned index link (for `IndexLink` nodes: the link itself).
    pub link: Option<LinkRef>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    /// Create a detached node with no field.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            fieldname: None,
            link: None,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Set the field name.
    pub fn with_fieldname(mut self, fieldname: impl Into<String>) -> Self {
        self.fieldname = Some(fieldname.into());
        self
    }

    /// Set the index link.
    pub fn with_link(mut self, link: LinkRef) -> Self {
        self.link = Some(link);
        self
    }

    /// The containing node, if attached.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Ordered children.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}
