//! Tapscript leaves and the spending policies that produce them.
//!
//! # Policies
//!
//! ```text
//! hash-then-key:  OP_SHA256 <hash> OP_EQUALVERIFY <key> OP_CHECKSIG
//! key-only:       <key> OP_CHECKSIG
//! ```
//!
//! A hash-then-key leaf is satisfied by `[signature, preimage]`: the preimage
//! sits on top of the stack, is hashed and compared first, and the signature
//! left underneath is consumed by `OP_CHECKSIG`.

use bitcoin::opcodes::all::{OP_CHECKSIG, OP_EQUALVERIFY, OP_PUSHNUM_1, OP_SHA256};
use bitcoin::script::Builder;
use bitcoin::secp256k1::XOnlyPublicKey;
use bitcoin::ScriptBuf;

use crate::curve::Curve;
use crate::error::{Result, SpendError};
use crate::hash::tap_leaf_hash;

/// Leaf version for BIP-342 tapscript.
pub const TAPSCRIPT_LEAF_VERSION: u8 = 0xc0;

/// Annex tag; never valid as a leaf version.
pub(crate) const ANNEX_TAG: u8 = 0x50;

/// Declarative description of a spending path, before key validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafPolicy {
    /// Reveal a SHA-256 preimage of `hash`, then sign with `pubkey`.
    HashThenKey { hash: [u8; 32], pubkey: Vec<u8> },
    /// Sign with `pubkey`.
    KeyOnly { pubkey: Vec<u8> },
}

/// Which policy a leaf script was built from.
///
/// Finalization dispatches on this, so every variant must say how its
/// witness is formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafKind {
    HashThenKey { hash: [u8; 32], key: XOnlyPublicKey },
    KeyOnly { key: XOnlyPublicKey },
    /// Caller-supplied script with no known witness template.
    Opaque,
}

impl LeafKind {
    /// The key whose signature the leaf requires, if any.
    pub fn signing_key(&self) -> Option<&XOnlyPublicKey> {
        match self {
            LeafKind::HashThenKey { key, .. } | LeafKind::KeyOnly { key } => Some(key),
            LeafKind::Opaque => None,
        }
    }
}

/// One alternative spending path committed to by the taptree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    script: ScriptBuf,
    version: u8,
    kind: LeafKind,
}

impl Leaf {
    /// Raw tapscript leaf at the default leaf version.
    pub fn from_script(script: ScriptBuf) -> Self {
        Self {
            script,
            version: TAPSCRIPT_LEAF_VERSION,
            kind: LeafKind::Opaque,
        }
    }

    /// Raw leaf at an explicit version.
    ///
    /// BIP-341 leaf versions are even and `0x50` is reserved for the annex.
    pub fn with_version(script: ScriptBuf, version: u8) -> Result<Self> {
        if version & 0x01 != 0 || version == ANNEX_TAG {
            return Err(SpendError::Policy(format!(
                "invalid leaf version 0x{:02x}",
                version
            )));
        }
        Ok(Self {
            script,
            version,
            kind: LeafKind::Opaque,
        })
    }

    pub fn script(&self) -> &ScriptBuf {
        &self.script
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn kind(&self) -> &LeafKind {
        &self.kind
    }

    /// `H_TapLeaf(version || compact_size(len) || script)`
    pub fn leaf_hash(&self) -> [u8; 32] {
        tap_leaf_hash(self.version, self.script.as_bytes())
    }
}

/// Build the tapscript leaf for a policy.
///
/// Fails with [`SpendError::Policy`] if a public key is not a valid 32-byte
/// x-only point.
pub fn build_leaf(curve: &Curve, policy: &LeafPolicy) -> Result<Leaf> {
    let (script, kind) = match policy {
        LeafPolicy::HashThenKey { hash, pubkey } => {
            let key = parse_policy_key(curve, pubkey)?;
            let script = Builder::new()
                .push_opcode(OP_SHA256)
                .push_slice(hash)
                .push_opcode(OP_EQUALVERIFY)
                .push_x_only_key(&key)
                .push_opcode(OP_CHECKSIG)
                .into_script();
            (script, LeafKind::HashThenKey { hash: *hash, key })
        }
        LeafPolicy::KeyOnly { pubkey } => {
            let key = parse_policy_key(curve, pubkey)?;
            let script = Builder::new()
                .push_x_only_key(&key)
                .push_opcode(OP_CHECKSIG)
                .into_script();
            (script, LeafKind::KeyOnly { key })
        }
    };

    log::debug!("built leaf {}", script.to_asm_string());

    Ok(Leaf {
        script,
        version: TAPSCRIPT_LEAF_VERSION,
        kind,
    })
}

fn parse_policy_key(curve: &Curve, pubkey: &[u8]) -> Result<XOnlyPublicKey> {
    curve
        .lift_x(pubkey)
        .map_err(|e| SpendError::Policy(format!("public key {}: {}", hex::encode(pubkey), e)))
}

/// `OP_1 <32-byte output key>`
pub fn p2tr_script_pubkey(output_key: &XOnlyPublicKey) -> ScriptBuf {
    Builder::new()
        .push_opcode(OP_PUSHNUM_1)
        .push_x_only_key(output_key)
        .into_script()
}
