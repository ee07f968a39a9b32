//! Merkle root computation over ordered record hashes.
//!
//! Adjacent nodes are combined by hashing their concatenation with SHA-256.
//! An odd level duplicates its last node before pairing. The root is
//! rebuilt in full from the current leaf set on every verification; there
//! is no persisted intermediate tree. The duplication rule must not change
//! or previously published roots stop verifying.

use sha2::{Digest, Sha256};

/// Combines two nodes into their parent hash.
pub fn combine(left: &[u8], right: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Computes the Merkle root of an ordered leaf sequence.
///
/// A single leaf is its own root; an empty sequence hashes to the digest
/// of the empty string.
pub fn compute_root<L: AsRef<[u8]>>(leaves: &[L]) -> Vec<u8> {
    if leaves.is_empty() {
        return Sha256::digest([]).to_vec();
    }

    let mut level: Vec<Vec<u8>> = leaves.iter().map(|l| l.as_ref().to_vec()).collect();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            // Odd count: the last node pairs with itself
            let right = pair.get(1).unwrap_or(&pair[0]);
            next.push(combine(&pair[0], right).to_vec());
        }
        level = next;
    }
    level.remove(0)
}

/// Checks the current leaf set against a previously published root.
pub fn verify<L: AsRef<[u8]>>(leaves: &[L], published_root: &[u8]) -> bool {
    compute_root(leaves) == published_root
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_leaf_duplication_is_deterministic() {
        let root = compute_root(&["a", "b", "c"]);
        let expected = combine(&combine(b"a", b"b"), &combine(b"c", b"c"));
        assert_eq!(root, expected.to_vec());
    }

    #[test]
    fn single_leaf_is_its_own_root() {
        assert_eq!(compute_root(&["only"]), b"only".to_vec());
    }

    #[test]
    fn changing_any_leaf_changes_the_root() {
        let leaves = vec!["h1", "h2", "h3", "h4", "h5"];
        let root = compute_root(&leaves);
        for i in 0..leaves.len() {
            let mut tampered: Vec<String> =
                leaves.iter().map(|l| (*l).to_string()).collect();
            tampered[i] = "hX".to_string();
            assert_ne!(compute_root(&tampered), root, "leaf {i} change not detected");
        }
    }

    #[test]
    fn order_matters() {
        assert_ne!(compute_root(&["a", "b"]), compute_root(&["b", "a"]));
    }

    #[test]
    fn verify_matches_compute() {
        let leaves = vec!["x", "y", "z"];
        let root = compute_root(&leaves);
        assert!(verify(&leaves, &root));
        assert!(!verify(&["x", "y"], &root));
    }
}
