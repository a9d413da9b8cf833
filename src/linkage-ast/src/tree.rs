//! Arena-backed query tree.
//!
//! Nodes live in a single `Vec` and refer to each other through [`NodeId`]
//! handles. Every structural primitive keeps the parent pointer of the
//! affected nodes in step with actual containment: attaching a node that
//! already has a parent detaches it first. Nodes removed from the tree stay
//! in the arena but are no longer reachable from the root.

use common_display::{DisplayTree, TreeNode};
use common_error::{LinkageResult, ensure, internal_err};

use crate::link::LinkRef;
use crate::node::{Node, NodeId, NodeKind, Operator};

/// A parsed query, owned as an arena of nodes.
#[derive(Debug, Clone)]
pub struct QueryTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for QueryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryTree {
    /// Create a tree holding only its root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeKind::QueryTree)],
            root: NodeId(0),
        }
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Borrow a node.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Mutably borrow a node.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// The variant of a node.
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    /// The field name of a node.
    pub fn fieldname(&self, id: NodeId) -> Option<&str> {
        self.node(id).fieldname.as_deref()
    }

    /// Overwrite the field name of a node.
    pub fn set_fieldname(&mut self, id: NodeId, fieldname: impl Into<String>) {
        self.node_mut(id).fieldname = Some(fieldname.into());
    }

    /// The link slot of a node.
    pub fn link(&self, id: NodeId) -> Option<&LinkRef> {
        self.node(id).link.as_ref()
    }

    /// Assign a link to a node.
    pub fn set_link(&mut self, id: NodeId, link: LinkRef) {
        self.node_mut(id).link = Some(link);
    }

    /// Ordered children of a node.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// The child at `index`, if present.
    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.node(id).children.get(index).copied()
    }

    /// The containing node, if attached.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Position of `child` among the children of `parent`.
    pub fn position(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.children(parent).iter().position(|c| *c == child)
    }

    /// Add a detached node to the arena.
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        node.parent = None;
        node.children.clear();
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Remove a node from its parent.
    ///
    /// Returns the former parent and position, or `None` if already detached.
    pub fn detach(&mut self, id: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.node(id).parent?;
        let position = self.position(parent, id)?;
        self.node_mut(parent).children.remove(position);
        self.node_mut(id).parent = None;
        Some((parent, position))
    }

    /// Append `child` as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> LinkageResult<()> {
        self.check_acyclic(parent, child)?;
        self.detach(child);
        self.attach(parent, child);
        Ok(())
    }

    /// Insert `child` at `index` among the children of `parent`.
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        mut index: usize,
        child: NodeId,
    ) -> LinkageResult<()> {
        self.check_acyclic(parent, child)?;
        if let Some((old_parent, old_position)) = self.detach(child) {
            if old_parent == parent && old_position < index {
                index -= 1;
            }
        }
        let len = self.children(parent).len();
        ensure!(
            index <= len,
            format!("insert position {index} out of bounds for {parent} with {len} children")
        );
        self.node_mut(parent).children.insert(index, child);
        self.node_mut(child).parent = Some(parent);
        Ok(())
    }

    /// Replace the child at `index` with `child`, returning the displaced node.
    pub fn set_child(
        &mut self,
        parent: NodeId,
        mut index: usize,
        child: NodeId,
    ) -> LinkageResult<NodeId> {
        self.check_acyclic(parent, child)?;
        if let Some((old_parent, old_position)) = self.detach(child) {
            if old_parent == parent && old_position < index {
                index -= 1;
            }
        }
        let Some(&displaced) = self.children(parent).get(index) else {
            internal_err!("no child at position {index} of {parent}");
        };
        self.node_mut(parent).children[index] = child;
        self.node_mut(child).parent = Some(parent);
        self.node_mut(displaced).parent = None;
        Ok(displaced)
    }

    /// Put `new` where `old` sits among the children of `parent`.
    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) -> LinkageResult<()> {
        if old == new {
            return Ok(());
        }
        let Some(index) = self.position(parent, old) else {
            internal_err!("{old} is not a child of {parent}");
        };
        self.set_child(parent, index, new)?;
        Ok(())
    }

    /// Remove `child` from `parent`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> LinkageResult<()> {
        ensure!(
            self.parent(child) == Some(parent),
            format!("{child} is not a child of {parent}")
        );
        self.detach(child);
        Ok(())
    }

    /// Deep copy a subtree. The copy is detached; links are shared.
    pub fn copy_subtree(&mut self, id: NodeId) -> NodeId {
        let source = self.node(id);
        let copy = Node {
            kind: source.kind.clone(),
            fieldname: source.fieldname.clone(),
            link: source.link.clone(),
            parent: None,
            children: Vec::new(),
        };
        let children = source.children.clone();
        let new_id = self.add_node(copy);
        for child in children {
            let child_copy = self.copy_subtree(child);
            self.attach(new_id, child_copy);
        }
        new_id
    }

    /// All nodes of the subtree rooted at `id`, in pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev());
        }
        out
    }

    /// Number of nodes reachable from the root.
    pub fn count_nodes(&self) -> usize {
        self.descendants(self.root).len()
    }

    /// The link governing a node.
    ///
    /// For an `Expansion` this is the link held in its first slot; for any
    /// other node it is the assigned link.
    pub fn index_link(&self, id: NodeId) -> Option<&LinkRef> {
        if self.kind(id).is_expansion() {
            self.expansion_link_node(id).and_then(|l| self.link(l))
        } else {
            self.link(id)
        }
    }

    /// The `IndexLink` node in the first slot of an expansion.
    pub fn expansion_link_node(&self, id: NodeId) -> Option<NodeId> {
        self.child(id, 0)
            .filter(|c| matches!(self.kind(*c), NodeKind::IndexLink))
    }

    /// The query wrapped by an expansion.
    pub fn expansion_query(&self, id: NodeId) -> Option<NodeId> {
        if self.kind(id).is_expansion() {
            self.child(id, 1)
        } else {
            None
        }
    }

    /// Head of the aggregate chain hanging off the root.
    pub fn aggregate(&self) -> Option<NodeId> {
        self.first_child_of_kind(self.root, |k| matches!(k, NodeKind::Aggregate))
    }

    /// The aggregate nested under `id`.
    pub fn sub_aggregate(&self, id: NodeId) -> Option<NodeId> {
        self.first_child_of_kind(id, |k| matches!(k, NodeKind::Aggregate))
    }

    fn first_child_of_kind(&self, id: NodeId, f: impl Fn(&NodeKind) -> bool) -> Option<NodeId> {
        self.children(id).iter().copied().find(|c| f(self.kind(*c)))
    }

    /// Check that every parent pointer matches actual containment.
    pub fn validate(&self) -> LinkageResult<()> {
        ensure!(self.parent(self.root).is_none(), "root has a parent");
        let mut seen = vec![false; self.nodes.len()];
        for id in self.descendants(self.root) {
            if std::mem::replace(&mut seen[id.0], true) {
                internal_err!("{id} reachable twice");
            }
            for &child in self.children(id) {
                ensure!(
                    self.parent(child) == Some(id),
                    format!("{child} is held by {id} but points at {:?}", self.parent(child))
                );
            }
        }
        Ok(())
    }

    /// Generate a tree-formatted explanation of the query.
    pub fn explain(&self) -> String {
        self.explain_subtree(self.root)
    }

    /// Generate a tree-formatted explanation of one subtree.
    pub fn explain_subtree(&self, id: NodeId) -> String {
        DisplayTree::new(NodeView { tree: self, id }).to_string()
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.node_mut(parent).children.push(child);
        self.node_mut(child).parent = Some(parent);
    }

    fn check_acyclic(&self, parent: NodeId, child: NodeId) -> LinkageResult<()> {
        let mut current = Some(parent);
        while let Some(id) = current {
            ensure!(
                id != child,
                format!("attaching {child} under {parent} would create a cycle")
            );
            current = self.parent(id);
        }
        Ok(())
    }

    fn group(&mut self, kind: NodeKind, children: impl IntoIterator<Item = NodeId>) -> NodeId {
        let id = self.add_node(Node::new(kind));
        for child in children {
            self.detach(child);
            self.attach(id, child);
        }
        id
    }

    // ==================== Constructors ====================

    /// Create a `field:value` term.
    pub fn term(&mut self, field: impl Into<String>, value: impl Into<String>) -> NodeId {
        self.term_with(field, Operator::Contains, value)
    }

    /// Create a term with an explicit operator.
    pub fn term_with(
        &mut self,
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<String>,
    ) -> NodeId {
        let kind = NodeKind::Term {
            operator,
            value: value.into(),
        };
        self.add_node(Node::new(kind).with_fieldname(field))
    }

    /// Create a phrase predicate.
    pub fn phrase(&mut self, field: impl Into<String>, value: impl Into<String>) -> NodeId {
        let kind = NodeKind::Phrase {
            operator: Operator::Contains,
            value: value.into(),
        };
        self.add_node(Node::new(kind).with_fieldname(field))
    }

    /// Create an array literal predicate.
    pub fn array<I, S>(&mut self, field: impl Into<String>, values: I) -> NodeId
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let kind = NodeKind::Array {
            operator: Operator::Equals,
            values: values.into_iter().map(Into::into).collect(),
        };
        self.add_node(Node::new(kind).with_fieldname(field))
    }

    /// Create a conjunction.
    pub fn and(&mut self, children: impl IntoIterator<Item = NodeId>) -> NodeId {
        self.group(NodeKind::And, children)
    }

    /// Create a disjunction.
    pub fn or(&mut self, children: impl IntoIterator<Item = NodeId>) -> NodeId {
        self.group(NodeKind::Or, children)
    }

    /// Create a negation.
    pub fn not(&mut self, children: impl IntoIterator<Item = NodeId>) -> NodeId {
        self.group(NodeKind::Not, children)
    }

    /// Create an `IndexLink` node holding `link`.
    pub fn link_node(&mut self, link: LinkRef) -> NodeId {
        self.add_node(Node::new(NodeKind::IndexLink).with_link(link))
    }

    /// Create an expansion binding `query` to `link`.
    pub fn expansion(&mut self, link: LinkRef, query: NodeId, generated: bool) -> NodeId {
        let link_node = self.link_node(link);
        self.group(NodeKind::Expansion { generated }, [link_node, query])
    }

    /// Create an aggregate over `field`.
    pub fn aggregate_node(&mut self, field: impl Into<String>) -> NodeId {
        self.add_node(Node::new(NodeKind::Aggregate).with_fieldname(field))
    }

    /// Create a suggest request over `field`.
    pub fn suggest(&mut self, field: impl Into<String>) -> NodeId {
        self.add_node(Node::new(NodeKind::Suggest).with_fieldname(field))
    }

    /// Create an options node.
    pub fn options(&mut self, children: impl IntoIterator<Item = NodeId>) -> NodeId {
        self.group(NodeKind::Options, children)
    }

    /// Create a field-lists node.
    pub fn field_lists(&mut self) -> NodeId {
        self.add_node(Node::new(NodeKind::FieldLists))
    }

    /// Append a top-level child to the root.
    pub fn push(&mut self, child: NodeId) -> LinkageResult<()> {
        self.append_child(self.root, child)
    }
}

impl std::fmt::Display for QueryTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.explain())
    }
}

/// Borrowed view of one node used for rendering.
#[derive(Clone, Copy)]
struct NodeView<'a> {
    tree: &'a QueryTree,
    id: NodeId,
}

impl TreeNode for NodeView<'_> {
    fn name(&self) -> String {
        self.tree.kind(self.id).name().to_string()
    }

    fn children(&self) -> Vec<Self> {
        self.tree
            .children(self.id)
            .iter()
            .map(|&id| NodeView {
                tree: self.tree,
                id,
            })
            .collect()
    }

    fn details(&self) -> Option<String> {
        let node = self.tree.node(self.id);
        let mut parts = Vec::new();

        if node.kind.is_generated_expansion() {
            parts.push("generated".to_string());
        }

        let field = node.fieldname.as_deref().unwrap_or("");
        match &node.kind {
            NodeKind::Term { operator, value } => parts.push(format!("{field}{operator}{value}")),
            NodeKind::Phrase { operator, value } => {
                parts.push(format!("{field}{operator}\"{value}\""));
            }
            NodeKind::Array { operator, values } => {
                parts.push(format!("{field}{operator}[{}]", values.join(",")));
            }
            _ => {
                if !field.is_empty() {
                    parts.push(field.to_string());
                }
            }
        }

        if let Some(link) = &node.link {
            if matches!(node.kind, NodeKind::IndexLink) {
                parts.push(link.to_string());
            } else {
                parts.push(format!("@{link}"));
            }
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}
