//! Taptree construction.
//!
//! # Shape
//!
//! [`TapTree::build`] pairs adjacent nodes left to right, one level at a
//! time. An odd node at the end of a level is carried up unchanged. The
//! builder never reorders or rebalances, so callers decide depths by the
//! order they pass leaves in:
//!
//! ```text
//! [A, B]       ->  (A B)
//! [A, B, C]    ->  ((A B) C)
//! [A, B, C, D] ->  ((A B) (C D))
//! ```
//!
//! Arbitrary shapes can be assembled directly with [`TapNode::branch`] and
//! [`TapTree::from_root`].

use crate::error::{Result, SpendError};
use crate::hash::tap_branch_hash;

pub use crate::script::Leaf;

/// Deepest merkle path a control block may carry (BIP-341).
pub const TAPROOT_CONTROL_MAX_NODE_COUNT: usize = 128;

/// A node of the commitment tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapNode {
    Leaf(Leaf),
    Branch {
        left: Box<TapNode>,
        right: Box<TapNode>,
        hash: [u8; 32],
        leaf_count: usize,
    },
}

impl TapNode {
    pub fn leaf(leaf: Leaf) -> Self {
        TapNode::Leaf(leaf)
    }

    /// Join two subtrees, caching the canonical branch hash.
    pub fn branch(left: TapNode, right: TapNode) -> Self {
        let hash = tap_branch_hash(&left.hash(), &right.hash());
        let leaf_count = left.leaf_count() + right.leaf_count();
        TapNode::Branch {
            left: Box::new(left),
            right: Box::new(right),
            hash,
            leaf_count,
        }
    }

    pub fn hash(&self) -> [u8; 32] {
        match self {
            TapNode::Leaf(leaf) => leaf.leaf_hash(),
            TapNode::Branch { hash, .. } => *hash,
        }
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            TapNode::Leaf(_) => 1,
            TapNode::Branch { leaf_count, .. } => *leaf_count,
        }
    }

    fn max_depth(&self) -> usize {
        match self {
            TapNode::Leaf(_) => 0,
            TapNode::Branch { left, right, .. } => 1 + left.max_depth().max(right.max_depth()),
        }
    }

    /// Recompute every cached branch hash and leaf count below this node.
    fn check_cached(&self) -> Result<()> {
        if let TapNode::Branch {
            left,
            right,
            hash,
            leaf_count,
        } = self
        {
            left.check_cached()?;
            right.check_cached()?;
            let expected = tap_branch_hash(&left.hash(), &right.hash());
            if *hash != expected {
                return Err(SpendError::Tree(format!(
                    "branch hash {} does not match its children ({})",
                    hex::encode(hash),
                    hex::encode(expected)
                )));
            }
            let expected_count = left.leaf_count() + right.leaf_count();
            if *leaf_count != expected_count {
                return Err(SpendError::Tree(format!(
                    "branch leaf count {} does not match its children ({})",
                    leaf_count, expected_count
                )));
            }
        }
        Ok(())
    }

    fn collect_leaves(&self, out: &mut Vec<Leaf>) {
        match self {
            TapNode::Leaf(leaf) => out.push(leaf.clone()),
            TapNode::Branch { left, right, .. } => {
                left.collect_leaves(out);
                right.collect_leaves(out);
            }
        }
    }

    /// Sibling hashes from the `index`-th leaf (in-order) up to this node.
    fn path_to(&self, index: usize, path: &mut Vec<[u8; 32]>) {
        if let TapNode::Branch { left, right, .. } = self {
            let left_count = left.leaf_count();
            if index < left_count {
                left.path_to(index, path);
                path.push(right.hash());
            } else {
                right.path_to(index - left_count, path);
                path.push(left.hash());
            }
        }
    }
}

/// Binary commitment tree over one or more leaves. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapTree {
    root: TapNode,
    leaves: Vec<Leaf>,
}

impl TapTree {
    /// Build a tree by pairing leaves bottom-up in the order given.
    pub fn build(leaves: Vec<Leaf>) -> Result<Self> {
        if leaves.is_empty() {
            return Err(SpendError::Tree("at least one leaf is required".into()));
        }

        let mut level: Vec<TapNode> = leaves.iter().cloned().map(TapNode::Leaf).collect();
        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len().div_ceil(2));
            let mut nodes = level.into_iter();
            while let Some(left) = nodes.next() {
                match nodes.next() {
                    Some(right) => next.push(TapNode::branch(left, right)),
                    None => next.push(left),
                }
            }
            level = next;
        }

        let root = level
            .pop()
            .ok_or_else(|| SpendError::Tree("tree reduced to nothing".into()))?;
        let tree = Self { root, leaves };
        log::debug!(
            "built taptree with {} leaves, root {}",
            tree.leaves.len(),
            hex::encode(tree.merkle_root())
        );
        Ok(tree)
    }

    /// Wrap an explicitly shaped tree.
    ///
    /// Leaves are indexed in left-to-right order. Branches assembled by hand
    /// must carry the hash and leaf count [`TapNode::branch`] would give them.
    pub fn from_root(root: TapNode) -> Result<Self> {
        let depth = root.max_depth();
        if depth > TAPROOT_CONTROL_MAX_NODE_COUNT {
            return Err(SpendError::Tree(format!(
                "depth {} exceeds the maximum of {}",
                depth, TAPROOT_CONTROL_MAX_NODE_COUNT
            )));
        }
        root.check_cached()?;
        let mut leaves = Vec::with_capacity(root.leaf_count());
        root.collect_leaves(&mut leaves);
        Ok(Self { root, leaves })
    }

    pub fn root(&self) -> &TapNode {
        &self.root
    }

    pub fn merkle_root(&self) -> [u8; 32] {
        self.root.hash()
    }

    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    pub fn leaf(&self, index: usize) -> Result<&Leaf> {
        self.leaves.get(index).ok_or(SpendError::Index {
            index,
            leaves: self.leaves.len(),
        })
    }

    /// Sibling hashes from the leaf up to the root.
    pub fn merkle_path(&self, index: usize) -> Result<Vec<[u8; 32]>> {
        self.leaf(index)?;
        let mut path = Vec::new();
        self.root.path_to(index, &mut path);
        Ok(path)
    }

    pub fn depth(&self, index: usize) -> Result<usize> {
        Ok(self.merkle_path(index)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::Curve;
    use crate::hash::tap_leaf_hash;
    use crate::test_utils::hash_lock_leaves;
    use bitcoin::ScriptBuf;

    fn raw_leaf(hex_script: &str) -> Leaf {
        Leaf::from_script(ScriptBuf::from_bytes(hex::decode(hex_script).unwrap()))
    }

    fn numbered_leaves(n: u8) -> Vec<Leaf> {
        (0..n)
            .map(|i| Leaf::from_script(ScriptBuf::from_bytes(vec![0x51, i])))
            .collect()
    }

    #[test]
    fn test_empty_tree_rejected() {
        assert!(matches!(TapTree::build(vec![]), Err(SpendError::Tree(_))));
    }

    #[test]
    fn test_single_leaf_root_is_leaf_hash() {
        let leaf = raw_leaf("20b617298552a72ade070667e86ca63b8f5789a9fe8731ef91202a91c9f3459007ac");
        let tree = TapTree::build(vec![leaf.clone()]).unwrap();
        assert_eq!(tree.merkle_root(), leaf.leaf_hash());
        assert!(matches!(tree.root(), TapNode::Leaf(_)));
        assert_eq!(tree.depth(0).unwrap(), 0);
    }

    #[test]
    fn test_btcdeb_two_leaf_root() {
        let tree = TapTree::build(vec![
            raw_leaf("029000b275209997a497d964fc1a62885b05a51166a65a90df00492c8d7cf61d6accf54803beac"),
            raw_leaf("a8206c60f404f8167a38fc70eaf8aa17ac351023bef86bcb9d1086a19afe95bd533388204edfcf9dfe6c0b5c83d1ab3f78d1b39a46ebac6798e08e19761f5ed89ec83c10ac"),
        ])
        .unwrap();
        assert_eq!(
            hex::encode(tree.merkle_root()),
            "41646f8c1fe2a96ddad7f5471bc4fee7da98794ef8c45a4f4fc6a559d60c9f6b"
        );
    }

    #[test]
    fn test_sibling_order_does_not_change_root() {
        let curve = Curve::new();
        let leaves = hash_lock_leaves(&curve);
        let forward = TapTree::build(leaves.clone()).unwrap();
        let reversed = TapTree::build(leaves.into_iter().rev().collect()).unwrap();
        assert_eq!(forward.merkle_root(), reversed.merkle_root());
    }

    #[test]
    fn test_two_leaf_depths_and_paths() {
        let curve = Curve::new();
        let leaves = hash_lock_leaves(&curve);
        let tree = TapTree::build(leaves.clone()).unwrap();

        assert_eq!(tree.depth(0).unwrap(), 1);
        assert_eq!(tree.depth(1).unwrap(), 1);
        assert_eq!(tree.merkle_path(0).unwrap(), vec![leaves[1].leaf_hash()]);
        assert_eq!(tree.merkle_path(1).unwrap(), vec![leaves[0].leaf_hash()]);
    }

    #[test]
    fn test_odd_leaf_is_promoted() {
        let leaves = numbered_leaves(3);
        let tree = TapTree::build(leaves.clone()).unwrap();

        assert_eq!(tree.depth(0).unwrap(), 2);
        assert_eq!(tree.depth(1).unwrap(), 2);
        assert_eq!(tree.depth(2).unwrap(), 1);

        let ab = tap_branch_hash(&leaves[0].leaf_hash(), &leaves[1].leaf_hash());
        let root = tap_branch_hash(&ab, &leaves[2].leaf_hash());
        assert_eq!(tree.merkle_root(), root);
        // leaf-to-root order
        assert_eq!(
            tree.merkle_path(0).unwrap(),
            vec![leaves[1].leaf_hash(), leaves[2].leaf_hash()]
        );
        assert_eq!(tree.merkle_path(2).unwrap(), vec![ab]);
    }

    #[test]
    fn test_leaf_order_preserved() {
        let leaves = numbered_leaves(5);
        let tree = TapTree::build(leaves.clone()).unwrap();
        assert_eq!(tree.leaves(), &leaves[..]);
        // ((0 1) (2 3)) 4
        assert_eq!(tree.depth(4).unwrap(), 1);
        assert_eq!(tree.depth(3).unwrap(), 3);
    }

    #[test]
    fn test_paths_fold_to_root() {
        let tree = TapTree::build(numbered_leaves(7)).unwrap();
        for (i, leaf) in tree.leaves().iter().enumerate() {
            let folded = tree
                .merkle_path(i)
                .unwrap()
                .iter()
                .fold(leaf.leaf_hash(), |acc, sibling| tap_branch_hash(&acc, sibling));
            assert_eq!(folded, tree.merkle_root(), "leaf {}", i);
        }
    }

    #[test]
    fn test_index_out_of_range() {
        let tree = TapTree::build(numbered_leaves(2)).unwrap();
        assert_eq!(
            tree.merkle_path(2).unwrap_err(),
            SpendError::Index {
                index: 2,
                leaves: 2
            }
        );
    }

    #[test]
    fn test_from_root_explicit_shape() {
        let leaves = numbered_leaves(3);
        // A ((B C))
        let root = TapNode::branch(
            TapNode::leaf(leaves[0].clone()),
            TapNode::branch(TapNode::leaf(leaves[1].clone()), TapNode::leaf(leaves[2].clone())),
        );
        let tree = TapTree::from_root(root).unwrap();
        assert_eq!(tree.leaves(), &leaves[..]);
        assert_eq!(tree.depth(0).unwrap(), 1);
        assert_eq!(tree.depth(2).unwrap(), 2);

        // same commitment as building [B, C, A]
        let built =
            TapTree::build(vec![leaves[1].clone(), leaves[2].clone(), leaves[0].clone()]).unwrap();
        assert_eq!(tree.merkle_root(), built.merkle_root());
    }

    #[test]
    fn test_from_root_rejects_excessive_depth() {
        let mut node = TapNode::leaf(Leaf::from_script(ScriptBuf::from_bytes(vec![0x51])));
        for i in 0..=TAPROOT_CONTROL_MAX_NODE_COUNT {
            let sibling = Leaf::from_script(ScriptBuf::from_bytes(vec![0x52, i as u8]));
            node = TapNode::branch(node, TapNode::leaf(sibling));
        }
        assert!(matches!(TapTree::from_root(node), Err(SpendError::Tree(_))));
    }

    #[test]
    fn test_from_root_rejects_forged_branch_hash() {
        let leaves = numbered_leaves(2);
        let forged = TapNode::Branch {
            left: Box::new(TapNode::leaf(leaves[0].clone())),
            right: Box::new(TapNode::leaf(leaves[1].clone())),
            hash: [0u8; 32],
            leaf_count: 2,
        };
        assert!(matches!(TapTree::from_root(forged), Err(SpendError::Tree(_))));
    }

    #[test]
    fn test_from_root_rejects_wrong_leaf_count() {
        let leaves = numbered_leaves(3);
        let inner = TapNode::branch(
            TapNode::leaf(leaves[1].clone()),
            TapNode::leaf(leaves[2].clone()),
        );
        let hash = tap_branch_hash(&leaves[0].leaf_hash(), &inner.hash());
        let miscounted = TapNode::Branch {
            left: Box::new(TapNode::leaf(leaves[0].clone())),
            right: Box::new(inner),
            hash,
            leaf_count: 0,
        };
        assert!(matches!(TapTree::from_root(miscounted), Err(SpendError::Tree(_))));
    }

    #[test]
    fn test_from_root_checks_nested_branches() {
        let leaves = numbered_leaves(3);
        let forged_inner = TapNode::Branch {
            left: Box::new(TapNode::leaf(leaves[1].clone())),
            right: Box::new(TapNode::leaf(leaves[2].clone())),
            hash: [0u8; 32],
            leaf_count: 2,
        };
        // outer hash is consistent with the forged child
        let root = TapNode::branch(TapNode::leaf(leaves[0].clone()), forged_inner);
        assert!(matches!(TapTree::from_root(root), Err(SpendError::Tree(_))));
    }

    #[test]
    fn test_leaf_hash_used_for_leaves() {
        let leaf = raw_leaf("51");
        assert_eq!(TapNode::leaf(leaf.clone()).hash(), tap_leaf_hash(0xc0, &[0x51]));
    }
}
