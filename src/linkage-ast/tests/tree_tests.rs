//! Integration tests for the query tree arena.

use linkage_ast::*;
use proptest::prelude::*;

fn volumes() -> LinkRef {
    LinkRef::new(IndexLink::new("vol_id", "volumes", "id").with_fieldname("vol"))
}

#[test]
fn test_new_tree_has_only_root() {
    let tree = QueryTree::new();
    assert_eq!(tree.count_nodes(), 1);
    assert_eq!(*tree.kind(tree.root()), NodeKind::QueryTree);
    assert!(tree.parent(tree.root()).is_none());
}

#[test]
fn test_constructors_set_parents() {
    let mut tree = QueryTree::new();
    let a = tree.term("title", "rust");
    let b = tree.phrase("body", "linked indices");
    let or = tree.or([a, b]);
    tree.push(or).unwrap();

    assert_eq!(tree.children(or), &[a, b]);
    assert_eq!(tree.parent(a), Some(or));
    assert_eq!(tree.parent(or), Some(tree.root()));
    tree.validate().unwrap();
}

#[test]
fn test_set_child_detaches_displaced_node() {
    let mut tree = QueryTree::new();
    let a = tree.term("a", "1");
    let b = tree.term("b", "2");
    let c = tree.term("c", "3");
    let and = tree.and([a, b]);
    tree.push(and).unwrap();

    let displaced = tree.set_child(and, 1, c).unwrap();

    assert_eq!(displaced, b);
    assert_eq!(tree.children(and), &[a, c]);
    assert!(tree.parent(b).is_none());
    assert_eq!(tree.parent(c), Some(and));
    tree.validate().unwrap();
}

#[test]
fn test_moving_within_same_parent_keeps_order_meaningful() {
    let mut tree = QueryTree::new();
    let a = tree.term("a", "1");
    let b = tree.term("b", "2");
    let c = tree.term("c", "3");
    let and = tree.and([a, b, c]);
    tree.push(and).unwrap();

    tree.insert_child(and, 3, a).unwrap();
    assert_eq!(tree.children(and), &[b, c, a]);

    tree.insert_child(and, 0, c).unwrap();
    assert_eq!(tree.children(and), &[c, b, a]);
    tree.validate().unwrap();
}

#[test]
fn test_replace_and_remove_child() {
    let mut tree = QueryTree::new();
    let a = tree.term("a", "1");
    let b = tree.term("b", "2");
    let or = tree.or([a, b]);
    tree.push(or).unwrap();

    let wrapped = tree.not(Vec::<NodeId>::new());
    tree.replace_child(or, a, wrapped).unwrap();
    tree.append_child(wrapped, a).unwrap();
    assert_eq!(tree.children(or), &[wrapped, b]);
    assert_eq!(tree.parent(a), Some(wrapped));

    tree.remove_child(or, b).unwrap();
    assert_eq!(tree.children(or), &[wrapped]);
    assert!(tree.remove_child(or, b).is_err());
    tree.validate().unwrap();
}

#[test]
fn test_cycle_rejected() {
    let mut tree = QueryTree::new();
    let a = tree.term("a", "1");
    let inner = tree.and([a]);
    let outer = tree.or([inner]);
    tree.push(outer).unwrap();

    let err = tree.append_child(inner, outer).unwrap_err();
    assert!(err.to_string().contains("cycle"));
    tree.validate().unwrap();
}

#[test]
fn test_bad_positions_are_internal_errors() {
    let mut tree = QueryTree::new();
    let a = tree.term("a", "1");
    let b = tree.term("b", "2");
    let stray = tree.term("c", "3");
    let and = tree.and([a]);
    tree.push(and).unwrap();

    let err = tree.insert_child(and, 5, b).unwrap_err();
    assert!(matches!(err, common_error::LinkageError::Internal(_)));
    assert!(err.to_string().contains("out of bounds"));

    let err = tree.set_child(and, 3, b).unwrap_err();
    assert!(matches!(err, common_error::LinkageError::Internal(_)));

    let err = tree.replace_child(and, stray, b).unwrap_err();
    assert!(err.to_string().contains("is not a child of"));
    tree.validate().unwrap();
}

#[test]
fn test_copy_subtree_shares_links() {
    let mut tree = QueryTree::new();
    let link = volumes();
    let title = tree.term("vol.title", "rust");
    tree.set_link(title, link.clone());
    let not = tree.not([title]);
    tree.push(not).unwrap();

    let copy = tree.copy_subtree(not);

    assert_ne!(copy, not);
    assert!(tree.parent(copy).is_none());
    let copied_title = tree.children(copy)[0];
    assert_ne!(copied_title, title);
    assert_eq!(tree.fieldname(copied_title), Some("vol.title"));
    assert_eq!(tree.link(copied_title), Some(&link));
    assert_eq!(tree.count_nodes(), 3);
}

#[test]
fn test_expansion_accessors() {
    let mut tree = QueryTree::new();
    let link = volumes();
    let query = tree.term("title", "rust");
    let expansion = tree.expansion(link.clone(), query, true);
    tree.push(expansion).unwrap();

    assert!(tree.kind(expansion).is_generated_expansion());
    assert_eq!(tree.expansion_query(expansion), Some(query));
    assert_eq!(tree.index_link(expansion), Some(&link));
    assert!(tree.index_link(query).is_none());
    assert!(tree.expansion_query(query).is_none());
}

#[test]
fn test_aggregate_chain() {
    let mut tree = QueryTree::new();
    let top = tree.aggregate_node("author");
    let sub = tree.aggregate_node("vol.year");
    tree.append_child(top, sub).unwrap();
    tree.push(top).unwrap();

    assert_eq!(tree.aggregate(), Some(top));
    assert_eq!(tree.sub_aggregate(top), Some(sub));
    assert_eq!(tree.sub_aggregate(sub), None);
}

#[test]
fn test_explain_output() {
    let mut tree = QueryTree::new();
    let link = volumes();
    let title = tree.term("title", "rust");
    let ids = tree.array("id", ["1", "2"]);
    let and = tree.and([title, ids]);
    let expansion = tree.expansion(link, and, true);
    tree.push(expansion).unwrap();

    let explain = tree.explain();
    assert!(explain.starts_with("QueryTree\n"));
    assert!(explain.contains("Expansion (generated)"));
    assert!(explain.contains("IndexLink (vol:(vol_id=<volumes>id))"));
    assert!(explain.contains("Term (title:rust)"));
    assert!(explain.contains("Array (id=[1,2])"));
}

fn arb_shape() -> impl Strategy<Value = Vec<(u8, usize)>> {
    prop::collection::vec((0u8..4, 0usize..16), 1..24)
}

proptest! {
    #[test]
    fn prop_random_mutations_keep_parents_consistent(ops in arb_shape()) {
        let mut tree = QueryTree::new();
        let mut nodes = vec![tree.root()];

        for (op, pick) in ops {
            let target = nodes[pick % nodes.len()];
            match op {
                0 => {
                    let leaf = tree.term("f", "v");
                    tree.append_child(target, leaf).unwrap();
                    nodes.push(leaf);
                }
                1 => {
                    let group = tree.and(Vec::<NodeId>::new());
                    tree.append_child(target, group).unwrap();
                    nodes.push(group);
                }
                2 => {
                    if target != tree.root() {
                        let copy = tree.copy_subtree(target);
                        tree.push(copy).unwrap();
                        nodes.extend(tree.descendants(copy));
                    }
                }
                _ => {
                    if let Some(parent) = tree.parent(target) {
                        tree.remove_child(parent, target).unwrap();
                        let reachable = tree.descendants(tree.root());
                        nodes.retain(|n| reachable.contains(n));
                    }
                }
            }
            prop_assert!(tree.validate().is_ok());
        }

        prop_assert_eq!(tree.count_nodes(), tree.descendants(tree.root()).len());
    }
}
