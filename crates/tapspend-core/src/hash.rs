//! BIP-340 tagged hashes used by the taproot commitment.
//!
//! `H_tag(m) = SHA256(SHA256(tag) || SHA256(tag) || m)`

use bitcoin::hashes::{sha256, Hash, HashEngine};

use crate::compact_size;

pub const TAP_LEAF_TAG: &str = "TapLeaf";
pub const TAP_BRANCH_TAG: &str = "TapBranch";
pub const TAP_TWEAK_TAG: &str = "TapTweak";

/// Start a SHA-256 engine primed with the tag prefix.
fn tagged_engine(tag: &str) -> sha256::HashEngine {
    let tag_hash = sha256::Hash::hash(tag.as_bytes());
    let mut engine = sha256::Hash::engine();
    engine.input(tag_hash.as_byte_array());
    engine.input(tag_hash.as_byte_array());
    engine
}

/// Tagged hash over the concatenation of `parts`.
pub fn tagged_hash(tag: &str, parts: &[&[u8]]) -> [u8; 32] {
    let mut engine = tagged_engine(tag);
    for part in parts {
        engine.input(part);
    }
    sha256::Hash::from_engine(engine).to_byte_array()
}

/// `H_TapLeaf(version || compact_size(len) || script)`
pub fn tap_leaf_hash(leaf_version: u8, script: &[u8]) -> [u8; 32] {
    let mut prefix = Vec::with_capacity(1 + compact_size::encoded_len(script.len() as u64));
    prefix.push(leaf_version);
    compact_size::write(&mut prefix, script.len() as u64);
    tagged_hash(TAP_LEAF_TAG, &[&prefix[..], script])
}

/// `H_TapBranch(min(a, b) || max(a, b))`
///
/// The children are sorted, so the result does not depend on which side
/// of the branch each one sits.
pub fn tap_branch_hash(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    tagged_hash(TAP_BRANCH_TAG, &[&lo[..], &hi[..]])
}

/// `H_TapTweak(internal_key || merkle_root)`, root omitted for key-only outputs.
pub fn tap_tweak_hash(internal_key: &[u8; 32], merkle_root: Option<&[u8; 32]>) -> [u8; 32] {
    match merkle_root {
        Some(root) => tagged_hash(TAP_TWEAK_TAG, &[&internal_key[..], &root[..]]),
        None => tagged_hash(TAP_TWEAK_TAG, &[&internal_key[..]]),
    }
}
