//! Signing seam for script-path spends.
//!
//! Spend construction only needs "a key that can sign a sighash"; where the
//! secret lives (in memory, hardware wallet, remote co-signer) is up to the
//! implementation.

use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{schnorr, Keypair, SecretKey, XOnlyPublicKey};
use bitcoin::sighash::TapSighash;

use crate::curve::Curve;
use crate::error::Result;

/// Produces BIP-340 signatures for one x-only key.
pub trait TapSigner {
    fn x_only_public_key(&self) -> XOnlyPublicKey;

    fn sign(&self, sighash: &TapSighash) -> Result<schnorr::Signature>;
}

/// Signer backed by an in-memory keypair.
pub struct KeypairSigner<'a> {
    curve: &'a Curve,
    keypair: Keypair,
}

impl<'a> KeypairSigner<'a> {
    pub fn new(curve: &'a Curve, secret: &SecretKey) -> Self {
        Self {
            curve,
            keypair: curve.keypair(secret),
        }
    }
}

impl std::fmt::Debug for KeypairSigner<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeypairSigner")
            .field("key", &self.x_only_public_key())
            .finish_non_exhaustive()
    }
}

impl TapSigner for KeypairSigner<'_> {
    fn x_only_public_key(&self) -> XOnlyPublicKey {
        self.keypair.x_only_public_key().0
    }

    fn sign(&self, sighash: &TapSighash) -> Result<schnorr::Signature> {
        Ok(self
            .curve
            .sign_schnorr(sighash.to_byte_array(), &self.keypair))
    }
}
