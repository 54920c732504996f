//! Shared test utilities for tapspend-core tests.
//!
//! Deterministic keypairs and the two-leaf hash-lock tree used across test
//! modules.

use bitcoin::hashes::{sha256, Hash};
use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey, XOnlyPublicKey};

use crate::curve::Curve;
use crate::script::{build_leaf, Leaf, LeafPolicy};
use crate::tree::TapTree;

/// Generate a deterministic keypair from a seed byte.
///
/// The secret key is `[0x01, 0x00, ..., 0x00, seed]` (32 bytes).
pub fn test_keypair(seed_byte: u8) -> (SecretKey, PublicKey) {
    let secp = Secp256k1::new();
    let mut secret_bytes = [0u8; 32];
    secret_bytes[31] = seed_byte;
    secret_bytes[0] = 0x01;
    let sk = SecretKey::from_slice(&secret_bytes).unwrap();
    let pk = sk.public_key(&secp);
    (sk, pk)
}

pub fn test_xonly(seed_byte: u8) -> XOnlyPublicKey {
    test_keypair(seed_byte).1.x_only_public_key().0
}

pub fn test_preimage() -> Vec<u8> {
    hex::decode("00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff").unwrap()
}

/// `[hash-then-key(sha256(preimage), alice), key-only(bob)]`
/// with alice = seed 1 and bob = seed 2.
pub fn hash_lock_leaves(curve: &Curve) -> Vec<Leaf> {
    let hash = sha256::Hash::hash(&test_preimage()).to_byte_array();
    vec![
        build_leaf(
            curve,
            &LeafPolicy::HashThenKey {
                hash,
                pubkey: test_xonly(1).serialize().to_vec(),
            },
        )
        .unwrap(),
        build_leaf(
            curve,
            &LeafPolicy::KeyOnly {
                pubkey: test_xonly(2).serialize().to_vec(),
            },
        )
        .unwrap(),
    ]
}

pub fn hash_lock_tree(curve: &Curve) -> TapTree {
    TapTree::build(hash_lock_leaves(curve)).unwrap()
}
