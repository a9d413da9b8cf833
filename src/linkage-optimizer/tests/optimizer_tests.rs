//! End-to-end tests for the optimizer driver.

use common_config::FieldConventions;
use common_error::{LinkageError, LinkageResult};
use linkage_ast::{
    IndexLink, LinkRef, LinkTarget, NodeId, NodeKind, ParentheticalRollup, QueryTree,
    TreeNormalizer, UsedIndexes,
};
use linkage_metadata::testing::library_catalog;
use linkage_metadata::{FieldAndIndexPair, IndexMetadata};
use linkage_optimizer::{
    ExpansionInjection, ExpansionMerge, FieldLinkResolution, OptimizationPass, Optimizer,
    PassContext, optimize,
};
use proptest::prelude::*;

// =========================================================================
// Scripted metadata
// =========================================================================

/// A two-index schema (`main` and `other`) with a scripted join path.
struct Scripted {
    home: LinkRef,
    other: LinkRef,
    wildcard: Vec<FieldAndIndexPair>,
    path: Option<Vec<String>>,
    recorded: Option<UsedIndexes>,
}

impl Scripted {
    fn new() -> Self {
        Self {
            home: LinkRef::new(IndexLink::new("id", "main", "id")),
            other: LinkRef::new(IndexLink::new("fk", "other", "id").with_fieldname("o")),
            wildcard: Vec::new(),
            path: Some(vec!["other:id".to_string(), "main:fk".to_string()]),
            recorded: None,
        }
    }

    fn with_path(mut self, path: &[&str]) -> Self {
        self.path = Some(path.iter().map(|s| s.to_string()).collect());
        self
    }

    fn unreachable(mut self) -> Self {
        self.path = None;
        self
    }

    fn with_wildcard(mut self, fields: &[&str]) -> Self {
        self.wildcard = fields
            .iter()
            .map(|f| FieldAndIndexPair::new(*f, None))
            .collect();
        self
    }
}

impl IndexMetadata for Scripted {
    fn home_index(&self) -> LinkRef {
        self.home.clone()
    }

    fn resolve_field_owner(&self, fieldname: &str) -> LinkageResult<LinkRef> {
        match fieldname {
            "id" | "fk" | "a" | "b" | "c" => Ok(self.home.clone()),
            "o.name" | "name" => Ok(self.other.clone()),
            _ => Err(LinkageError::unknown_field(fieldname)),
        }
    }

    fn resolve_index_by_name(&self, name: &str) -> LinkageResult<LinkRef> {
        match name {
            "main" => Ok(self.home.clone()),
            "other" => Ok(self.other.clone()),
            _ => Err(LinkageError::unknown_index(name)),
        }
    }

    fn resolve_wildcard_fields(&self) -> LinkageResult<Vec<FieldAndIndexPair>> {
        Ok(self.wildcard.clone())
    }

    fn compute_join_path(&self, from: &LinkRef, to: &LinkRef) -> LinkageResult<Vec<String>> {
        match &self.path {
            Some(path) if *from == self.other => Ok(path.clone()),
            _ => Err(LinkageError::unreachable(from.to_string(), to.to_string())),
        }
    }

    fn record_used_indexes(&mut self, used: &UsedIndexes) {
        self.recorded = Some(used.clone());
    }
}

fn single_term(field: &str) -> (QueryTree, NodeId) {
    let mut tree = QueryTree::new();
    let term = tree.term(field, "x");
    tree.push(term).unwrap();
    (tree, term)
}

fn top(tree: &QueryTree) -> NodeId {
    tree.children(tree.root())[0]
}

// =========================================================================
// Wildcards
// =========================================================================

#[test]
fn test_wildcard_with_three_pairs_becomes_or() {
    let mut metadata = Scripted::new().with_wildcard(&["a", "b", "c"]);
    let (mut tree, _) = single_term("_all");

    optimize(&mut tree, &mut metadata).unwrap();

    let or = top(&tree);
    assert!(matches!(tree.kind(or), NodeKind::Or));
    let fields: Vec<_> = tree
        .children(or)
        .iter()
        .map(|c| tree.fieldname(*c).unwrap())
        .collect();
    assert_eq!(fields, vec!["a", "b", "c"]);
    for copy in tree.children(or) {
        assert!(tree.link(*copy).unwrap().ptr_eq(&metadata.home));
    }
}

#[test]
fn test_wildcard_with_one_pair_is_spliced() {
    let mut metadata = Scripted::new().with_wildcard(&["a"]);
    let (mut tree, wildcard) = single_term("_all");

    optimize(&mut tree, &mut metadata).unwrap();

    let copy = top(&tree);
    assert_ne!(copy, wildcard);
    assert!(matches!(tree.kind(copy), NodeKind::Term { .. }));
    assert_eq!(tree.fieldname(copy), Some("a"));
    assert_eq!(tree.count_nodes(), 2);
}

#[test]
fn test_custom_wildcard_convention() {
    let mut metadata = Scripted::new().with_wildcard(&["a", "b"]);
    let (mut tree, _) = single_term("*");

    let conventions = FieldConventions {
        wildcard_field: "*".to_string(),
        ..FieldConventions::default()
    };
    let optimizer = Optimizer::with_config(
        linkage_optimizer::OptimizerConfig::default().with_conventions(conventions),
    );
    optimizer.optimize(&mut tree, &mut metadata).unwrap();

    assert!(matches!(tree.kind(top(&tree)), NodeKind::Or));
}

// =========================================================================
// Joins
// =========================================================================

#[test]
fn test_trailing_degenerate_hop_is_dropped() {
    let mut metadata = Scripted::new();
    let (mut tree, term) = single_term("o.name");

    optimize(&mut tree, &mut metadata).unwrap();

    let expansion = top(&tree);
    assert_eq!(
        tree.index_link(expansion).unwrap().to_string(),
        "o:(fk=<other>id)"
    );
    assert_eq!(tree.expansion_query(expansion), Some(term));
    assert_eq!(tree.fieldname(term), Some("name"));
}

#[test]
fn test_degenerate_first_hop_wraps_with_owning_link() {
    let mut metadata = Scripted::new().with_path(&["other:fk", "main:fk"]);
    let (mut tree, term) = single_term("name");

    optimize(&mut tree, &mut metadata).unwrap();

    let expansion = top(&tree);
    assert!(tree.kind(expansion).is_generated_expansion());
    assert!(tree.index_link(expansion).unwrap().ptr_eq(&metadata.other));
    assert_eq!(tree.expansion_query(expansion), Some(term));
}

#[test]
fn test_empty_path_wraps_with_owning_link() {
    let mut metadata = Scripted::new().with_path(&[]);
    let (mut tree, term) = single_term("name");

    optimize(&mut tree, &mut metadata).unwrap();

    let expansion = top(&tree);
    assert!(tree.index_link(expansion).unwrap().ptr_eq(&metadata.other));
    assert_eq!(tree.expansion_query(expansion), Some(term));
}

#[test]
fn test_multi_hop_chain_nests_innermost_first() {
    let catalog = library_catalog();
    let mut session = catalog.session();
    let (mut tree, term) = single_term("publisher_name");

    let result = optimize(&mut tree, &mut session).unwrap();

    let outer = top(&tree);
    let inner = tree.expansion_query(outer).unwrap();
    assert_eq!(tree.index_link(outer).unwrap().index_name(), Some("volumes"));
    assert_eq!(tree.index_link(inner).unwrap().index_name(), Some("publishers"));
    assert_eq!(tree.expansion_query(inner), Some(term));
    assert_eq!(
        result.used_indexes.index_names(),
        vec!["publishers", "volumes"]
    );
}

#[test]
fn test_deferred_hop_is_rewritten() {
    let mut metadata = Scripted::new().with_path(&["this.index:id", "main:fk"]);
    let (mut tree, _) = single_term("name");

    optimize(&mut tree, &mut metadata).unwrap();

    let link = tree.index_link(top(&tree)).unwrap().clone();
    assert_eq!(link.target, LinkTarget::Deferred);
    assert_eq!(link.left_fieldname, "fk");
    assert_eq!(metadata.resolve_index_name(&link).unwrap(), "main");
}

// =========================================================================
// Merging
// =========================================================================

#[test]
fn test_or_siblings_merge_into_one_expansion() {
    let catalog = library_catalog();
    let mut session = catalog.session();

    let mut tree = QueryTree::new();
    let subject = tree.term("subject", "rust");
    let title = tree.term("title", "guide");
    let year = tree.term("year", "2020");
    let or = tree.or([subject, title, year]);
    tree.push(or).unwrap();

    let result = optimize(&mut tree, &mut session).unwrap();
    assert_eq!(result.merges, 1);

    let merged = tree.children(or)[1];
    let combiner = tree.expansion_query(merged).unwrap();
    assert!(matches!(tree.kind(combiner), NodeKind::Or));
    assert_eq!(tree.children(combiner), &[title, year]);
}

#[test]
fn test_not_siblings_merge_under_and() {
    let catalog = library_catalog();
    let mut session = catalog.session();

    let mut tree = QueryTree::new();
    let subject = tree.term("subject", "rust");
    let title = tree.term("title", "guide");
    let year = tree.term("year", "2020");
    let not = tree.not([subject, title, year]);
    tree.push(not).unwrap();

    optimize(&mut tree, &mut session).unwrap();

    assert_eq!(tree.children(not).len(), 2);
    let merged = tree.children(not)[1];
    let combiner = tree.expansion_query(merged).unwrap();
    assert!(matches!(tree.kind(combiner), NodeKind::And));
    assert_eq!(tree.children(combiner), &[title, year]);
}

#[test]
fn test_user_expansions_over_one_link_merge() {
    let catalog = library_catalog();
    let mut session = catalog.session();
    let authors = catalog.resolve_index_by_name("authors").unwrap();

    let mut tree = QueryTree::new();
    let a = tree.term("author_name", "knuth");
    let b = tree.term("author_name", "ritchie");
    let ea = tree.expansion(authors.clone(), a, false);
    let eb = tree.expansion(authors.clone(), b, false);
    let or = tree.or([ea, eb]);
    tree.push(or).unwrap();

    let result = optimize(&mut tree, &mut session).unwrap();
    assert_eq!(result.merges, 1);

    // The user expansions are themselves joined in from the home index;
    // after merging, the rollup collapses the single-child Or.
    let outer = top(&tree);
    assert!(tree.kind(outer).is_generated_expansion());
    assert_eq!(tree.index_link(outer).unwrap().index_name(), Some("authors"));

    let merged = tree.expansion_query(outer).unwrap();
    assert!(!tree.kind(merged).is_generated_expansion());
    assert!(tree.index_link(merged).unwrap().ptr_eq(&authors));
    let combiner = tree.expansion_query(merged).unwrap();
    assert_eq!(tree.children(combiner), &[a, b]);
    assert_eq!(result.used_indexes.index_names(), vec!["authors"]);
}

// =========================================================================
// Used indexes and rejection
// =========================================================================

#[test]
fn test_used_indexes_cover_fields_joins_and_aggregates() {
    let catalog = library_catalog();
    let mut session = catalog.session();

    let mut tree = QueryTree::new();
    let subject = tree.term("subject", "rust");
    let title = tree.term("vol.title", "guide");
    let and = tree.and([subject, title]);
    tree.push(and).unwrap();
    let aggregate = tree.aggregate_node("author.author_name");
    tree.push(aggregate).unwrap();

    let result = optimize(&mut tree, &mut session).unwrap();

    let recorded = session.into_used_indexes().unwrap();
    assert_eq!(recorded.index_names(), vec!["main", "volumes", "authors"]);
    assert_eq!(result.used_indexes.index_names(), recorded.index_names());
    assert!(!recorded.index_names().contains(&"publishers"));
}

#[test]
fn test_non_predicate_children_are_left_alone() {
    let catalog = library_catalog();
    let mut session = catalog.session();

    let mut tree = QueryTree::new();
    let options = tree.options(Vec::<NodeId>::new());
    let title = tree.term("title", "guide");
    let suggest = tree.suggest("title");
    tree.push(options).unwrap();
    tree.push(title).unwrap();
    tree.push(suggest).unwrap();

    optimize(&mut tree, &mut session).unwrap();

    let children = tree.children(tree.root()).to_vec();
    assert_eq!(children[0], options);
    assert!(tree.kind(children[1]).is_expansion());
    assert_eq!(children[2], suggest);
    assert!(tree.link(suggest).is_none());
}

#[test]
fn test_unknown_field_rejects_query() {
    let catalog = library_catalog();
    let mut session = catalog.session();
    let (mut tree, _) = single_term("isbn");

    let err = optimize(&mut tree, &mut session).unwrap_err();
    assert!(matches!(err, LinkageError::UnknownField(_)));
    assert!(err.is_rejection());
    assert!(session.used_indexes().is_none());
}

#[test]
fn test_unreachable_index_rejects_query() {
    let mut metadata = Scripted::new().unreachable();
    let (mut tree, _) = single_term("name");

    let err = optimize(&mut tree, &mut metadata).unwrap_err();
    assert!(matches!(err, LinkageError::UnreachablePath { .. }));
    assert!(err.is_rejection());
    assert!(metadata.recorded.is_none());
}

#[test]
fn test_malformed_path_is_fatal() {
    let mut metadata = Scripted::new().with_path(&["other:id", "main"]);
    let (mut tree, _) = single_term("name");

    let err = optimize(&mut tree, &mut metadata).unwrap_err();
    assert!(matches!(err, LinkageError::MalformedPath(_)));
    assert!(!err.is_rejection());
}

#[test]
fn test_runs_share_one_optimizer_across_threads() {
    let catalog = library_catalog();
    let optimizer = Optimizer::new();

    std::thread::scope(|scope| {
        for field in ["title", "publisher_name", "author_name"] {
            let catalog = &catalog;
            let optimizer = &optimizer;
            scope.spawn(move || {
                let mut session = catalog.session();
                let (mut tree, _) = single_term(field);
                let result = optimizer.optimize(&mut tree, &mut session).unwrap();
                assert!(!result.used_indexes.is_empty());
                tree.validate().unwrap();
            });
        }
    });
}

#[test]
fn test_prefixed_field_shadowing_home_field_is_stable() {
    let catalog = library_catalog();
    let volumes = catalog.resolve_index_by_name("volumes").unwrap();
    let (mut tree, term) = single_term("vol.id");

    optimize(&mut tree, &mut catalog.session()).unwrap();
    let first = tree.explain();
    assert_eq!(tree.fieldname(term), Some("id"));
    assert!(tree.link(term).unwrap().ptr_eq(&volumes));

    let again = optimize(&mut tree, &mut catalog.session()).unwrap();
    assert_eq!(again.merges, 0);
    assert!(tree.link(term).unwrap().ptr_eq(&volumes));
    assert_eq!(tree.explain(), first);
}

// =========================================================================
// Properties
// =========================================================================

const FIELDS: &[&str] = &[
    "subject",
    "id",
    "title",
    "year",
    "vol.title",
    "vol.id",
    "author.id",
    "publisher_name",
    "author_name",
    "author.author_name",
    "_score",
];

#[derive(Debug, Clone)]
enum Shape {
    Field(&'static str),
    Array(&'static str),
    And(Vec<Shape>),
    Or(Vec<Shape>),
    Not(Vec<Shape>),
}

fn arb_shape() -> impl Strategy<Value = Shape> {
    let leaf = prop_oneof![
        4 => prop::sample::select(FIELDS).prop_map(Shape::Field),
        1 => prop::sample::select(FIELDS).prop_map(Shape::Array),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(Shape::And),
            prop::collection::vec(inner.clone(), 1..4).prop_map(Shape::Or),
            prop::collection::vec(inner, 1..3).prop_map(Shape::Not),
        ]
    })
}

fn build(tree: &mut QueryTree, shape: &Shape) -> NodeId {
    match shape {
        Shape::Field(field) => tree.term(*field, "v"),
        Shape::Array(field) => tree.array(*field, ["1", "2"]),
        Shape::And(children) => {
            let ids: Vec<_> = children.iter().map(|c| build(tree, c)).collect();
            tree.and(ids)
        }
        Shape::Or(children) => {
            let ids: Vec<_> = children.iter().map(|c| build(tree, c)).collect();
            tree.or(ids)
        }
        Shape::Not(children) => {
            let ids: Vec<_> = children.iter().map(|c| build(tree, c)).collect();
            tree.not(ids)
        }
    }
}

fn tree_of(shape: &Shape) -> QueryTree {
    let mut tree = QueryTree::new();
    let predicate = build(&mut tree, shape);
    tree.push(predicate).unwrap();
    tree
}

proptest! {
    #[test]
    fn prop_pipeline_is_idempotent(shape in arb_shape()) {
        let catalog = library_catalog();
        let mut tree = tree_of(&shape);

        optimize(&mut tree, &mut catalog.session()).unwrap();
        prop_assert!(tree.validate().is_ok());
        let first = tree.explain();

        let again = optimize(&mut tree, &mut catalog.session()).unwrap();
        prop_assert_eq!(again.merges, 0);
        prop_assert_eq!(tree.explain(), first);
    }

    #[test]
    fn prop_every_field_is_resolved_and_recorded(shape in arb_shape()) {
        let catalog = library_catalog();
        let conventions = FieldConventions::default();
        let mut tree = tree_of(&shape);

        let result = optimize(&mut tree, &mut catalog.session()).unwrap();
        let used = &result.used_indexes;

        for node in tree.descendants(tree.root()) {
            let kind = tree.kind(node);
            if matches!(kind, NodeKind::IndexLink) {
                let hop = tree.link(node).unwrap();
                let name = hop.index_name().unwrap();
                prop_assert!(used.index_names().contains(&name));
                continue;
            }
            if kind.is_expansion() {
                continue;
            }
            if let Some(field) = tree.fieldname(node) {
                if conventions.is_meta_field(field) {
                    prop_assert!(tree.link(node).is_none());
                } else {
                    let link = tree.link(node).unwrap();
                    prop_assert!(used.contains(link));
                }
            }
        }
    }

    #[test]
    fn prop_merge_rollup_never_grows_tree(shape in arb_shape()) {
        let catalog = library_catalog();
        let session = catalog.session();
        let conventions = FieldConventions::default();
        let mut used = UsedIndexes::new();
        let mut ctx = PassContext::new(&session, &conventions, &mut used);
        let mut tree = tree_of(&shape);

        FieldLinkResolution.apply(&mut tree, &mut ctx).unwrap();
        ParentheticalRollup.rollup_parenthetical_groups(&mut tree).unwrap();
        ExpansionInjection.apply(&mut tree, &mut ctx).unwrap();

        let mut previous = tree.count_nodes();
        for _ in 0..previous {
            let merged = ExpansionMerge.apply(&mut tree, &mut ctx).unwrap().events;
            let after_merge = tree.count_nodes();
            prop_assert!(after_merge <= previous);
            if merged > 0 {
                prop_assert!(after_merge < previous);
            }

            let removed = ParentheticalRollup.rollup_parenthetical_groups(&mut tree).unwrap();
            let after_rollup = tree.count_nodes();
            prop_assert!(after_rollup <= after_merge);
            prop_assert!(tree.validate().is_ok());

            if merged == 0 && removed == 0 {
                break;
            }
            previous = after_rollup;
        }
    }
}
