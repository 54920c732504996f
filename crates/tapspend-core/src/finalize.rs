//! Witness assembly for a script-path spend.
//!
//! The stack is ordered bottom to top:
//!
//! ```text
//! hash-then-key:  [signature, preimage, script, control_block]
//! key-only:       [signature, script, control_block]
//! ```

use std::collections::BTreeMap;

use bitcoin::hashes::{sha256, Hash};
use bitcoin::secp256k1::XOnlyPublicKey;
use bitcoin::taproot;

use crate::control::ControlBlock;
use crate::error::{Result, SpendError};
use crate::script::{Leaf, LeafKind};
use crate::witness::WitnessStack;

/// Signatures collected for a spend, keyed by the signing x-only key.
pub type SignatureSet = BTreeMap<XOnlyPublicKey, taproot::Signature>;

/// Non-signature satisfaction data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuxData {
    pub preimage: Option<Vec<u8>>,
}

/// Build the witness that satisfies `leaf`.
pub fn finalize(
    leaf: &Leaf,
    control_block: &ControlBlock,
    signatures: &SignatureSet,
    aux: &AuxData,
) -> Result<WitnessStack> {
    if control_block.leaf_version != leaf.version() {
        return Err(SpendError::Policy(format!(
            "control block leaf version 0x{:02x} does not match leaf 0x{:02x}",
            control_block.leaf_version,
            leaf.version()
        )));
    }

    let mut stack = WitnessStack::default();
    match leaf.kind() {
        LeafKind::HashThenKey { hash, key } => {
            let preimage = aux
                .preimage
                .as_ref()
                .ok_or_else(|| SpendError::MissingData("hash-lock preimage".into()))?;
            if sha256::Hash::hash(preimage).to_byte_array() != *hash {
                return Err(SpendError::Policy(
                    "preimage does not hash to the leaf's committed hash".into(),
                ));
            }
            stack.push(signature_for(signatures, key)?);
            stack.push(preimage.clone());
        }
        LeafKind::KeyOnly { key } => {
            stack.push(signature_for(signatures, key)?);
        }
        LeafKind::Opaque => {
            return Err(SpendError::Policy(
                "leaf has no known witness template".into(),
            ));
        }
    }
    stack.push(leaf.script().to_bytes());
    stack.push(control_block.serialize());

    log::debug!("finalized witness with {} items", stack.len());
    Ok(stack)
}

fn signature_for(signatures: &SignatureSet, key: &XOnlyPublicKey) -> Result<Vec<u8>> {
    signatures
        .get(key)
        .map(|sig| sig.to_vec())
        .ok_or_else(|| SpendError::MissingData(format!("signature for key {}", key)))
}
