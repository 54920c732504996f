//! tapspend core
//!
//! Build a Taproot output from an internal key and a tree of tapscript
//! leaves, then spend it through one of those leaves.
//!
//! # Pipeline
//!
//! ```text
//! LeafPolicy --build_leaf--> Leaf --TapTree::build--> merkle root
//!   internal key + root --tweak--> output key --> P2TR address
//!   tree + leaf index --ControlBlock::compute--> control block
//!   sighash --TapSigner--> signature
//!   [sig, (preimage), script, control block] --> witness --> raw tx
//! ```
//!
//! # Example leaves
//!
//! ```text
//! hash-then-key:  OP_SHA256 <h> OP_EQUALVERIFY <alice> OP_CHECKSIG
//! key-only:       <bob> OP_CHECKSIG
//! ```

pub mod compact_size;
pub mod control;
pub mod curve;
pub mod error;
pub mod finalize;
pub mod hash;
pub mod output;
pub mod script;
pub mod signer;
pub mod spend;
pub mod tree;
pub mod tweak;
pub mod witness;

#[cfg(test)]
mod test_utils;

pub use control::ControlBlock;
pub use curve::Curve;
pub use error::{Result, SpendError};
pub use finalize::{finalize, AuxData, SignatureSet};
pub use output::{TaprootOutput, TaprootOutputBuilder};
pub use script::{build_leaf, p2tr_script_pubkey, Leaf, LeafKind, LeafPolicy};
pub use signer::{KeypairSigner, TapSigner};
pub use spend::{sweep_output, FundingUtxo, SignedTransaction, UnsignedSpend};
pub use tree::{TapNode, TapTree};
pub use tweak::{tweak, OutputKey};
pub use witness::WitnessStack;
