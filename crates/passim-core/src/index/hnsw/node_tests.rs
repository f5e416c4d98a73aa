//! Tests for `node` module

use super::node::{Neighbor, Node};

#[test]
fn test_new_node_has_empty_lists_on_every_level() {
    let node = Node::new(vec![1.0, 2.0], 3);

    assert_eq!(node.level(), 3);
    for level in 0..=3 {
        assert!(node.neighbors(level).is_empty());
    }
}

#[test]
fn test_neighbors_above_top_level_are_empty() {
    let node = Node::new(vec![0.0], 0);
    assert!(node.neighbors(5).is_empty());
}

#[test]
fn test_neighbor_ids_preserve_order() {
    let mut node = Node::new(vec![0.0], 1);
    node.links[1] = vec![
        Neighbor {
            id: 4,
            distance: 0.1,
        },
        Neighbor {
            id: 2,
            distance: 0.3,
        },
    ];

    assert_eq!(node.neighbor_ids(1), vec![4, 2]);
    assert!(node.neighbor_ids(0).is_empty());
}

#[test]
fn test_vector_accessor() {
    let node = Node::new(vec![0.5, -0.5], 0);
    assert_eq!(node.vector(), &[0.5, -0.5]);
}
