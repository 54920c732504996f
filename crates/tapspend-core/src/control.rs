//! Control blocks: the proof that a revealed leaf is committed to by the
//! output key.
//!
//! ```text
//! (leaf_version | parity) || internal_key (32) || path[0] (32) || ... || path[d-1] (32)
//! ```
//!
//! `path` runs from the leaf's sibling up to the child of the root.

use bitcoin::secp256k1::{Parity, XOnlyPublicKey};

use crate::curve::Curve;
use crate::error::{Result, SpendError};
use crate::hash::tap_branch_hash;
use crate::script::{Leaf, ANNEX_TAG};
use crate::tree::{TapTree, TAPROOT_CONTROL_MAX_NODE_COUNT};
use crate::tweak::{tweak_key, OutputKey};

const BASE_SIZE: usize = 33;
const NODE_SIZE: usize = 32;

/// Authentication data for spending one leaf of a taptree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlBlock {
    pub leaf_version: u8,
    pub internal_key: XOnlyPublicKey,
    pub output_parity: Parity,
    /// Sibling hashes, leaf to root.
    pub merkle_path: Vec<[u8; 32]>,
}

impl ControlBlock {
    /// Control block for `tree.leaves()[leaf_index]`.
    ///
    /// `output_key` must be the tweak of `internal_key` by this tree's root;
    /// its parity is what the block records.
    pub fn compute(
        tree: &TapTree,
        internal_key: &XOnlyPublicKey,
        output_key: &OutputKey,
        leaf_index: usize,
    ) -> Result<Self> {
        let leaf = tree.leaf(leaf_index)?;
        let merkle_path = tree.merkle_path(leaf_index)?;
        Ok(Self {
            leaf_version: leaf.version(),
            internal_key: *internal_key,
            output_parity: output_key.parity,
            merkle_path,
        })
    }

    pub fn depth(&self) -> usize {
        self.merkle_path.len()
    }

    pub fn size(&self) -> usize {
        BASE_SIZE + NODE_SIZE * self.merkle_path.len()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size());
        out.push(self.leaf_version | self.output_parity.to_u8());
        out.extend_from_slice(&self.internal_key.serialize());
        for node in &self.merkle_path {
            out.extend_from_slice(node);
        }
        out
    }

    /// Parse a serialized control block.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < BASE_SIZE || (bytes.len() - BASE_SIZE) % NODE_SIZE != 0 {
            return Err(SpendError::Serialization(format!(
                "control block length {} is not 33 + 32k",
                bytes.len()
            )));
        }
        let depth = (bytes.len() - BASE_SIZE) / NODE_SIZE;
        if depth > TAPROOT_CONTROL_MAX_NODE_COUNT {
            return Err(SpendError::Serialization(format!(
                "control block depth {} exceeds {}",
                depth, TAPROOT_CONTROL_MAX_NODE_COUNT
            )));
        }

        let leaf_version = bytes[0] & 0xfe;
        if leaf_version == ANNEX_TAG {
            return Err(SpendError::Serialization(format!(
                "control block leaf version 0x{:02x} is the annex tag",
                leaf_version
            )));
        }
        let output_parity = if bytes[0] & 0x01 == 1 {
            Parity::Odd
        } else {
            Parity::Even
        };
        let internal_key = XOnlyPublicKey::from_slice(&bytes[1..BASE_SIZE])
            .map_err(|e| SpendError::Crypto(format!("control block internal key: {}", e)))?;
        let merkle_path = bytes[BASE_SIZE..]
            .chunks_exact(NODE_SIZE)
            .map(|chunk| {
                let mut node = [0u8; 32];
                node.copy_from_slice(chunk);
                node
            })
            .collect();

        Ok(Self {
            leaf_version,
            internal_key,
            output_parity,
            merkle_path,
        })
    }

    /// Check that `leaf` under this block reproduces `output_key`.
    pub fn verify(
        &self,
        curve: &Curve,
        output_key: &XOnlyPublicKey,
        leaf: &Leaf,
    ) -> Result<bool> {
        if leaf.version() != self.leaf_version {
            return Ok(false);
        }
        let root = self
            .merkle_path
            .iter()
            .fold(leaf.leaf_hash(), |acc, sibling| tap_branch_hash(&acc, sibling));
        let derived = tweak_key(curve, &self.internal_key, Some(root))?;
        Ok(derived.key == *output_key && derived.parity == self.output_parity)
    }
}
