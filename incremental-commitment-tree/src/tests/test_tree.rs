use assert_matches::assert_matches;
use proptest::prelude::*;

use crate::{
    Blake3Node, CommitmentTree, CommitmentTreeError, Hashable, NoteCommitmentTree,
    TestingCommitmentTree,
    test_utils::{reference_path, reference_root, test_leaf},
};

/// Append every leaf up to capacity, comparing root and latest-leaf path
/// against the recursive reference after each append.
fn check_against_reference<const DEPTH: u8>() {
    let depth = DEPTH as usize;
    let mut tree = CommitmentTree::<Blake3Node, DEPTH>::new();
    let mut leaves = Vec::new();
    assert_eq!(tree.root(), reference_root(&leaves, depth));
    assert_eq!(tree.root(), CommitmentTree::<Blake3Node, DEPTH>::empty_root());

    for i in 0..(1u64 << DEPTH) {
        let leaf = test_leaf(i);
        tree.append(leaf).unwrap();
        leaves.push(leaf);
        assert_eq!(
            tree.root(),
            reference_root(&leaves, depth),
            "depth {} size {}",
            DEPTH,
            leaves.len()
        );
        assert_eq!(tree.size(), leaves.len() as u64);
        assert_eq!(tree.last(), Some(&leaf));
        let path = tree.path().unwrap();
        assert_eq!(path, reference_path(&leaves, depth, leaves.len() - 1));
        assert_eq!(path.position(), i);
        assert!(path.verify(&leaf, &tree.root()));
    }

    assert!(tree.is_complete(depth));
    let full_root = tree.root();
    assert_matches!(
        tree.append(test_leaf(u64::MAX)),
        Err(CommitmentTreeError::CapacityExceeded { capacity }) if capacity == 1u64 << DEPTH
    );
    assert_eq!(tree.root(), full_root);
}

#[test]
fn test_root_matches_reference_depth_1() {
    check_against_reference::<1>();
}

#[test]
fn test_root_matches_reference_depth_2() {
    check_against_reference::<2>();
}

#[test]
fn test_root_matches_reference_depth_3() {
    check_against_reference::<3>();
}

#[test]
fn test_root_matches_reference_depth_4() {
    check_against_reference::<4>();
}

#[test]
fn test_root_matches_reference_depth_5() {
    check_against_reference::<5>();
}

#[test]
fn test_depth_2_scenario() {
    let [h0, h1, h2, h3] = [0, 1, 2, 3].map(test_leaf);
    let e0 = Blake3Node::empty_leaf();
    let e1 = Blake3Node::combine(&e0, &e0);
    let mut tree = CommitmentTree::<Blake3Node, 2>::new();

    assert!(tree.is_empty());
    assert_eq!(tree.root(), Blake3Node::combine(&e1, &e1));
    assert_eq!(tree.encode().unwrap(), vec![0x00, 0x00, 0x00]);

    tree.append(h0).unwrap();
    assert_eq!(
        tree.root(),
        Blake3Node::combine(&Blake3Node::combine(&h0, &e0), &e1)
    );
    let mut witness = tree.witness().unwrap();
    for leaf in [h1, h2, h3] {
        witness.append(leaf).unwrap();
    }

    tree.append(h1).unwrap();
    let h01 = Blake3Node::combine(&h0, &h1);
    assert_eq!(tree.root(), Blake3Node::combine(&h01, &e1));

    tree.append(h2).unwrap();
    assert_eq!(
        tree.root(),
        Blake3Node::combine(&h01, &Blake3Node::combine(&h2, &e0))
    );
    // pair was carried into the parent slot
    let mut expected = vec![0x01];
    expected.extend_from_slice(h2.as_bytes());
    expected.push(0x00);
    expected.push(0x01);
    expected.extend_from_slice(h01.as_bytes());
    assert_eq!(tree.encode().unwrap(), expected);

    tree.append(h3).unwrap();
    let full_root = Blake3Node::combine(&h01, &Blake3Node::combine(&h2, &h3));
    assert_eq!(tree.root(), full_root);
    assert_eq!(witness.root(), full_root);
    assert!(witness.path().unwrap().verify(&h0, &full_root));
    assert!(tree.is_complete(2));
    assert_eq!(tree.size(), 4);

    let encoded = tree.encode().unwrap();
    assert_matches!(
        tree.append(test_leaf(4)),
        Err(CommitmentTreeError::CapacityExceeded { capacity: 4 })
    );
    assert_eq!(tree.root(), full_root);
    assert_eq!(tree.encode().unwrap(), encoded);
}

#[test]
fn test_is_complete_and_next_depth() {
    let mut tree = TestingCommitmentTree::new();
    assert!(!tree.is_complete(1));
    assert_eq!(tree.next_depth(0), 0);
    assert_eq!(tree.next_depth(1), 0);
    assert_eq!(tree.next_depth(2), 1);

    tree.append(test_leaf(0)).unwrap();
    tree.append(test_leaf(1)).unwrap();
    assert!(tree.is_complete(1));
    assert!(!tree.is_complete(2));
    assert!(!tree.is_complete(0));
    assert_eq!(tree.next_depth(0), 1);
    assert_eq!(tree.next_depth(2), 3);

    tree.append(test_leaf(2)).unwrap();
    // right slot and levels 2, 3 are empty
    assert_eq!(tree.next_depth(0), 0);
    assert_eq!(tree.next_depth(1), 2);
    assert_eq!(tree.next_depth(2), 3);
    assert_eq!(tree.next_depth(3), 4);
}

#[test]
fn test_path_errors() {
    let mut tree = TestingCommitmentTree::new();
    assert_matches!(tree.path(), Err(CommitmentTreeError::EmptyTree));
    assert_matches!(tree.path_for(0), Err(CommitmentTreeError::EmptyTree));
    assert_matches!(tree.witness(), Err(CommitmentTreeError::EmptyTree));

    for i in 0..5 {
        tree.append(test_leaf(i)).unwrap();
    }
    assert_eq!(tree.path_for(4).unwrap(), tree.path().unwrap());
    assert_matches!(
        tree.path_for(2),
        Err(CommitmentTreeError::PositionNotWitnessable { position: 2, size: 5 })
    );
    assert_matches!(
        tree.path_for(7),
        Err(CommitmentTreeError::PositionNotWitnessable { position: 7, size: 5 })
    );
}

#[test]
fn test_codec_roundtrip_every_size() {
    let mut tree = TestingCommitmentTree::new();
    for i in 0..=16 {
        let bytes = tree.encode().unwrap();
        let decoded = TestingCommitmentTree::decode(&bytes).unwrap();
        assert_eq!(decoded, tree);
        assert_eq!(decoded.root(), tree.root());
        assert_eq!(decoded.encode().unwrap(), bytes);
        if i < 16 {
            tree.append(test_leaf(i)).unwrap();
        }
    }
}

#[test]
fn test_decode_rejects_malformed_input() {
    // 2 + 3 slot flags for depth 4
    let empty = TestingCommitmentTree::new().encode().unwrap();
    assert_eq!(empty, vec![0u8; 5]);

    let mut bad_flag = empty.clone();
    bad_flag[0] = 0x02;
    assert_matches!(
        TestingCommitmentTree::decode(&bad_flag),
        Err(CommitmentTreeError::MalformedTree(_))
    );

    // right without left
    let mut right_only = vec![0x00, 0x01];
    right_only.extend_from_slice(test_leaf(0).as_bytes());
    right_only.extend_from_slice(&[0x00, 0x00, 0x00]);
    assert_matches!(
        TestingCommitmentTree::decode(&right_only),
        Err(CommitmentTreeError::MalformedTree(_))
    );

    // parent without left
    let mut parent_only = vec![0x00, 0x00, 0x00, 0x01];
    parent_only.extend_from_slice(test_leaf(0).as_bytes());
    parent_only.push(0x00);
    assert_matches!(
        TestingCommitmentTree::decode(&parent_only),
        Err(CommitmentTreeError::MalformedTree(_))
    );

    let mut tree = TestingCommitmentTree::new();
    for i in 0..3 {
        tree.append(test_leaf(i)).unwrap();
    }
    let bytes = tree.encode().unwrap();
    assert_matches!(
        TestingCommitmentTree::decode(&bytes[..bytes.len() - 1]),
        Err(CommitmentTreeError::MalformedTree(_))
    );
    assert_matches!(
        TestingCommitmentTree::decode(&bytes[..20]),
        Err(CommitmentTreeError::MalformedTree(_))
    );
    let mut trailing = bytes.clone();
    trailing.push(0x00);
    assert_matches!(
        TestingCommitmentTree::decode(&trailing),
        Err(CommitmentTreeError::MalformedTree(_))
    );
    assert_matches!(
        TestingCommitmentTree::decode(&[]),
        Err(CommitmentTreeError::MalformedTree(_))
    );
}

#[test]
fn test_from_parts_canonical_form() {
    let leaf = test_leaf(0);
    let parent = test_leaf(1);

    // trailing absent parents are trimmed
    let tree =
        TestingCommitmentTree::from_parts(Some(leaf), None, vec![Some(parent), None, None])
            .unwrap();
    let expected =
        TestingCommitmentTree::from_parts(Some(leaf), None, vec![Some(parent)]).unwrap();
    assert_eq!(tree, expected);
    assert_eq!(tree.size(), 3);

    assert_matches!(
        TestingCommitmentTree::from_parts(Some(leaf), None, vec![None, None, None, Some(parent)]),
        Err(CommitmentTreeError::MalformedTree(_))
    );
    assert_matches!(
        TestingCommitmentTree::from_parts(None, Some(leaf), vec![]),
        Err(CommitmentTreeError::MalformedTree(_))
    );
    assert_matches!(
        TestingCommitmentTree::from_parts(None, None, vec![Some(parent)]),
        Err(CommitmentTreeError::MalformedTree(_))
    );
}

#[test]
fn test_size_reads_binary_counter() {
    let leaf = Some(test_leaf(0));
    let parent = Some(test_leaf(1));
    // 2 in the pair + 4 at level 1 of parents + 8 at level 2
    let tree =
        TestingCommitmentTree::from_parts(leaf, leaf, vec![None, parent, parent]).unwrap();
    assert_eq!(tree.size(), 14);
    assert!(!tree.is_complete(4));
}

proptest! {
    #[test]
    fn test_decode_preserves_root_and_next_append(count in 0u64..600) {
        let mut tree = NoteCommitmentTree::new();
        for i in 0..count {
            tree.append(test_leaf(i)).unwrap();
        }
        let bytes = tree.encode().unwrap();
        // the pair holds one or two leaves, the rest are spelled in binary by
        // the parents
        let pair = match count {
            0 => 0,
            n if n % 2 == 0 => 2,
            _ => 1,
        };
        let present = pair + u64::from(((count - pair) / 2).count_ones());
        prop_assert_eq!(bytes.len() as u64, 21 + 32 * present);

        let mut decoded = NoteCommitmentTree::decode(&bytes).unwrap();
        prop_assert_eq!(&decoded, &tree);
        prop_assert_eq!(decoded.size(), count);
        prop_assert_eq!(decoded.root(), tree.root());

        tree.append(test_leaf(count)).unwrap();
        decoded.append(test_leaf(count)).unwrap();
        prop_assert_eq!(decoded.root(), tree.root());
    }
}
