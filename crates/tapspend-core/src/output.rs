//! Taproot outputs: internal key + script tree -> output key, scriptPubKey,
//! address and per-leaf control blocks.

use bitcoin::key::TweakedPublicKey;
use bitcoin::secp256k1::XOnlyPublicKey;
use bitcoin::{Address, Network, ScriptBuf};

use crate::control::ControlBlock;
use crate::curve::Curve;
use crate::error::{Result, SpendError};
use crate::script::{p2tr_script_pubkey, Leaf};
use crate::tree::TapTree;
use crate::tweak::{tweak_key, OutputKey};

/// A committed taproot output and everything needed to spend from it.
#[derive(Debug, Clone)]
pub struct TaprootOutput {
    internal_key: XOnlyPublicKey,
    tree: TapTree,
    output_key: OutputKey,
}

impl TaprootOutput {
    /// Commit `tree` to `internal_key`.
    pub fn new(curve: &Curve, internal_key: XOnlyPublicKey, tree: TapTree) -> Result<Self> {
        let output_key = tweak_key(curve, &internal_key, Some(tree.merkle_root()))?;
        log::info!(
            "taproot output key {} ({} leaves)",
            output_key.key,
            tree.leaves().len()
        );
        Ok(Self {
            internal_key,
            tree,
            output_key,
        })
    }

    pub fn internal_key(&self) -> &XOnlyPublicKey {
        &self.internal_key
    }

    pub fn tree(&self) -> &TapTree {
        &self.tree
    }

    pub fn output_key(&self) -> &OutputKey {
        &self.output_key
    }

    pub fn merkle_root(&self) -> [u8; 32] {
        self.tree.merkle_root()
    }

    pub fn leaf(&self, index: usize) -> Result<&Leaf> {
        self.tree.leaf(index)
    }

    /// `OP_1 <output key>`
    pub fn script_pubkey(&self) -> ScriptBuf {
        p2tr_script_pubkey(&self.output_key.key)
    }

    /// Bech32m address on `network`.
    pub fn address(&self, network: Network) -> Address {
        let tweaked = TweakedPublicKey::dangerous_assume_tweaked(self.output_key.key);
        Address::p2tr_tweaked(tweaked, network)
    }

    pub fn control_block(&self, leaf_index: usize) -> Result<ControlBlock> {
        ControlBlock::compute(
            &self.tree,
            &self.internal_key,
            &self.output_key,
            leaf_index,
        )
    }
}

/// Collects an internal key and leaves, then commits them.
///
/// ```ignore
/// let output = TaprootOutputBuilder::new()
///     .internal_key(bob)
///     .leaf(hash_lock)
///     .leaf(refund)
///     .finalize(&curve)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct TaprootOutputBuilder {
    internal_key: Option<XOnlyPublicKey>,
    leaves: Vec<Leaf>,
}

impl TaprootOutputBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn internal_key(mut self, key: XOnlyPublicKey) -> Self {
        self.internal_key = Some(key);
        self
    }

    pub fn leaf(mut self, leaf: Leaf) -> Self {
        self.leaves.push(leaf);
        self
    }

    pub fn leaves(mut self, leaves: impl IntoIterator<Item = Leaf>) -> Self {
        self.leaves.extend(leaves);
        self
    }

    /// Build the tree from the collected leaves and commit it.
    pub fn finalize(self, curve: &Curve) -> Result<TaprootOutput> {
        let internal_key = self
            .internal_key
            .ok_or_else(|| SpendError::MissingData("internal key".into()))?;
        let tree = TapTree::build(self.leaves)?;
        TaprootOutput::new(curve, internal_key, tree)
    }

    /// Shortcut for `finalize(curve)?.address(network)`.
    pub fn address(self, curve: &Curve, network: Network) -> Result<Address> {
        Ok(self.finalize(curve)?.address(network))
    }
}
