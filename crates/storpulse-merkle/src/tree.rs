//! Static Merkle tree with branch proofs.
//!
//! Node numbering over the flat array:
//!
//! ```text
//! nodes                                   0
//!                         1                               2
//!                 3               4               5               6
//!             7       8       9      10      11      12      13      14
//! leaves:     0       1       2       3       4       5       6       7
//! ```
//!
//! `parent(i) = (i+1)/2 - 1`, `left(i) = 2(i+1) - 1`, `right(i) = 2(i+1)`;
//! leaf ordinal `j` sits at `j + 2^order - 1`. Positions past the last
//! real leaf hold the empty byte string, and an empty side is simply
//! omitted from its parent's hash input.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use storpulse_core::codec;

/// A tree leaf: the seeded chunk HMAC plus its ordinal.
///
/// The leaf hash binds both: `SHA256(blob || decimal_ascii(index))`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MerkleLeaf {
    /// Leaf ordinal (also the challenge index it answers).
    pub index: u64,
    /// Seeded HMAC of the spot-checked chunk.
    #[serde(with = "codec::b64")]
    pub blob: Vec<u8>,
}

impl MerkleLeaf {
    /// Construct a leaf.
    #[must_use]
    pub fn new(index: u64, blob: Vec<u8>) -> Self {
        Self { index, blob }
    }

    /// The leaf's node hash.
    #[must_use]
    pub fn hash(&self) -> Vec<u8> {
        let mut h = Sha256::new();
        h.update(&self.blob);
        h.update(self.index.to_string().as_bytes());
        h.finalize().to_vec()
    }
}

/// One branch level: the (left, right) node pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRow(
    /// Left node hash, or empty where the slot holds no subtree.
    #[serde(with = "codec::b64")]
    pub Vec<u8>,
    /// Right node hash, or empty where the slot holds no subtree.
    #[serde(with = "codec::b64")]
    pub Vec<u8>,
);

/// An ordered list of node pairs from the leaf level up to just below the
/// root.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MerkleBranch {
    /// Rows bottom-up; row `k` holds the pair at level `k`.
    pub rows: Vec<BranchRow>,
}

impl MerkleBranch {
    /// Number of levels in the branch.
    #[must_use]
    pub fn order(&self) -> usize {
        self.rows.len()
    }
}

/// Static, write-then-build Merkle tree stored as a flat node array.
///
/// Add leaves with [`MerkleTree::add_leaf`], then call
/// [`MerkleTree::build`]. A built tree serves branches and the root; a
/// stripped tree (leaves cleared, nodes kept) is what travels to the
/// prover inside a tag.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MerkleTree {
    /// Flat node array of `2 * 2^order` hashes; node 0 is the root.
    #[serde(with = "codec::b64_list")]
    pub nodes: Vec<Vec<u8>>,
    /// Height of the tree: `ceil(log2(n_leaves))`.
    pub order: u32,
    /// Leaves in ordinal order; empty after [`MerkleTree::strip_leaves`].
    pub leaves: Vec<MerkleLeaf>,
}

impl MerkleTree {
    /// An empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a leaf; its ordinal is the current leaf count.
    pub fn add_leaf(&mut self, blob: Vec<u8>) {
        let index = self.leaves.len() as u64;
        self.leaves.push(MerkleLeaf::new(index, blob));
    }

    /// Number of leaves added.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Build all internal nodes from the added leaves.
    pub fn build(&mut self) {
        self.order = order_for(self.leaves.len());
        let width = 1usize << self.order;
        self.nodes = vec![Vec::new(); 2 * width];

        for (j, leaf) in self.leaves.iter().enumerate() {
            self.nodes[j + width - 1] = leaf.hash();
        }

        for level in 1..=self.order {
            let row = 1usize << (self.order - level);
            for j in 0..row {
                let k = row + j - 1;
                let mut h = Sha256::new();
                let left = &self.nodes[left_child(k)];
                if !left.is_empty() {
                    h.update(left);
                }
                let right = &self.nodes[right_child(k)];
                if !right.is_empty() {
                    h.update(right);
                }
                self.nodes[k] = h.finalize().to_vec();
            }
        }
    }

    /// The branch for leaf ordinal `i`: `order` rows bottom-up. The pair at
    /// each level contains the node on the path, so the branch itself
    /// identifies which side the running hash occupies.
    ///
    /// Call only on a built tree with `i < 2^order`.
    #[must_use]
    pub fn branch(&self, i: u64) -> MerkleBranch {
        let mut rows = Vec::with_capacity(self.order as usize);
        let mut j = i as usize + (1usize << self.order) - 1;
        for _ in 0..self.order {
            if j % 2 != 0 {
                rows.push(BranchRow(self.nodes[j].clone(), self.nodes[j + 1].clone()));
            } else {
                rows.push(BranchRow(self.nodes[j - 1].clone(), self.nodes[j].clone()));
            }
            j = parent(j);
        }
        MerkleBranch { rows }
    }

    /// The Merkle root (node 0); empty for an unbuilt tree.
    #[must_use]
    pub fn root(&self) -> Vec<u8> {
        self.nodes.first().cloned().unwrap_or_default()
    }

    /// Drop the leaves, keeping every node hash. The result is the
    /// prover-side tag body: enough to serve branches, nothing to forge
    /// leaves from.
    pub fn strip_leaves(&mut self) {
        self.leaves.clear();
    }

    /// Check `leaf` against `branch` and `root`.
    ///
    /// Walks the branch bottom-up: each row must contain the running hash
    /// on one side, and the next running hash is the digest of the row's
    /// non-empty sides. A zero-length branch (single-leaf tree) verifies
    /// iff the leaf hash equals the root.
    #[must_use]
    pub fn verify_branch(leaf: &MerkleLeaf, branch: &MerkleBranch, root: &[u8]) -> bool {
        let mut running = leaf.hash();
        for row in &branch.rows {
            if row.0 != running && row.1 != running {
                return false;
            }
            let mut h = Sha256::new();
            if !row.0.is_empty() {
                h.update(&row.0);
            }
            if !row.1.is_empty() {
                h.update(&row.1);
            }
            running = h.finalize().to_vec();
        }
        running == root
    }
}

/// `ceil(log2(n))` for `n >= 1`; 0 for an empty or single-leaf tree.
#[inline]
#[must_use]
pub fn order_for(n: usize) -> u32 {
    if n <= 1 {
        0
    } else {
        usize::BITS - (n - 1).leading_zeros()
    }
}

#[inline]
const fn parent(i: usize) -> usize {
    (i + 1) / 2 - 1
}

#[inline]
const fn left_child(i: usize) -> usize {
    (i + 1) * 2 - 1
}

#[inline]
const fn right_child(i: usize) -> usize {
    (i + 1) * 2
}

#[cfg(test)]
mod tests {
    use super::{order_for, MerkleBranch, MerkleLeaf, MerkleTree};
    use sha2::{Digest, Sha256};

    fn tree_of(n: u64) -> MerkleTree {
        let mut t = MerkleTree::new();
        for i in 0..n {
            t.add_leaf(format!("leaf-{i}").into_bytes());
        }
        t.build();
        t
    }

    #[test]
    fn order_matches_leaf_counts() {
        for (n, order) in [(1, 0), (2, 1), (3, 2), (4, 2), (9, 4), (256, 8), (257, 9)] {
            assert_eq!(order_for(n), order, "n = {n}");
        }
    }

    #[test]
    fn single_leaf_root_is_leaf_hash() {
        let t = tree_of(1);
        assert_eq!(t.order, 0);
        let leaf = t.leaves[0].clone();
        assert_eq!(t.root(), leaf.hash());

        let branch = t.branch(0);
        assert_eq!(branch.order(), 0);
        assert!(MerkleTree::verify_branch(&leaf, &branch, &t.root()));
    }

    #[test]
    fn two_leaf_root_is_pair_hash() {
        let t = tree_of(2);
        let mut h = Sha256::new();
        h.update(t.leaves[0].hash());
        h.update(t.leaves[1].hash());
        assert_eq!(t.root(), h.finalize().to_vec());
    }

    #[test]
    fn every_branch_verifies_for_awkward_shapes() {
        for n in [1u64, 2, 3, 5, 8, 9, 16, 17, 31] {
            let t = tree_of(n);
            let root = t.root();
            for i in 0..n {
                let leaf = t.leaves[i as usize].clone();
                let branch = t.branch(i);
                assert!(
                    MerkleTree::verify_branch(&leaf, &branch, &root),
                    "n = {n}, leaf = {i}"
                );
            }
        }
    }

    #[test]
    fn stripped_tree_still_serves_branches() {
        let mut t = tree_of(9);
        let root = t.root();
        let leaves = t.leaves.clone();
        t.strip_leaves();
        assert!(t.leaves.is_empty());
        for (i, leaf) in leaves.iter().enumerate() {
            assert!(MerkleTree::verify_branch(leaf, &t.branch(i as u64), &root));
        }
    }

    #[test]
    fn wrong_root_and_wrong_leaf_fail() {
        let t = tree_of(9);
        let bogus_root = vec![0xAB; 32];
        for i in 0..9 {
            let leaf = t.leaves[i as usize].clone();
            let branch = t.branch(i);
            assert!(!MerkleTree::verify_branch(&leaf, &branch, &bogus_root));
        }

        let mut wrong = t.leaves[3].clone();
        wrong.blob[0] ^= 1;
        assert!(!MerkleTree::verify_branch(&wrong, &t.branch(3), &t.root()));

        // Right blob under the wrong ordinal also fails: the hash binds both.
        let relabeled = MerkleLeaf::new(4, t.leaves[3].blob.clone());
        assert!(!MerkleTree::verify_branch(
            &relabeled,
            &t.branch(3),
            &t.root()
        ));
    }

    #[test]
    fn empty_branch_rejects_non_root_leaf() {
        let t = tree_of(2);
        let leaf = t.leaves[0].clone();
        assert!(!MerkleTree::verify_branch(
            &leaf,
            &MerkleBranch::default(),
            &t.root()
        ));
    }

    #[test]
    fn roots_depend_only_on_leaf_blobs() {
        let a = tree_of(5);
        let b = tree_of(5);
        assert_eq!(a.root(), b.root());
        let mut c = MerkleTree::new();
        for i in 0..5 {
            c.add_leaf(format!("leaf-{}", i + 1).into_bytes());
        }
        c.build();
        assert_ne!(a.root(), c.root());
    }
}
