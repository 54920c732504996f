//! secp256k1 operations needed by taproot construction.
//!
//! A single [`Curve`] is created by the caller and borrowed by every
//! component that touches curve points, instead of relying on a
//! process-wide context.

use secp256k1::{
    schnorr, All, Keypair, Message, Parity, Scalar, Secp256k1, SecretKey, XOnlyPublicKey,
};

use crate::error::{Result, SpendError};

/// Curve-operations capability (wraps a full-capability secp256k1 context).
#[derive(Clone, Debug)]
pub struct Curve {
    secp: Secp256k1<All>,
}

impl Default for Curve {
    fn default() -> Self {
        Self::new()
    }
}

impl Curve {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }

    /// Underlying context, for APIs of the `bitcoin` crate that take one.
    pub fn secp(&self) -> &Secp256k1<All> {
        &self.secp
    }

    /// Parse a 32-byte x-only key, lifting it to the even-y curve point.
    ///
    /// Fails if the bytes are not 32 long or no curve point has this x.
    pub fn lift_x(&self, bytes: &[u8]) -> Result<XOnlyPublicKey> {
        if bytes.len() != 32 {
            return Err(SpendError::Crypto(format!(
                "x-only key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        XOnlyPublicKey::from_slice(bytes)
            .map_err(|e| SpendError::Crypto(format!("invalid x-only key: {}", e)))
    }

    /// `Q = P + t*G` for the even-y lift `P` of `key`.
    ///
    /// Fails if `t` is not below the curve order or `Q` is the point at
    /// infinity.
    pub fn tweak_add(
        &self,
        key: &XOnlyPublicKey,
        tweak: [u8; 32],
    ) -> Result<(XOnlyPublicKey, Parity)> {
        let scalar = Scalar::from_be_bytes(tweak)
            .map_err(|_| SpendError::Crypto("tweak is not below the curve order".into()))?;
        key.add_tweak(&self.secp, &scalar)
            .map_err(|e| SpendError::Crypto(format!("tweaked key is invalid: {}", e)))
    }

    pub fn keypair(&self, secret: &SecretKey) -> Keypair {
        Keypair::from_secret_key(&self.secp, secret)
    }

    /// BIP-340 signature over a 32-byte digest.
    ///
    /// No auxiliary randomness is mixed in, so signing the same sighash
    /// twice yields the same transaction.
    pub fn sign_schnorr(&self, digest: [u8; 32], keypair: &Keypair) -> schnorr::Signature {
        let msg = Message::from_digest(digest);
        self.secp.sign_schnorr_no_aux_rand(&msg, keypair)
    }

    pub fn verify_schnorr(
        &self,
        signature: &schnorr::Signature,
        digest: [u8; 32],
        key: &XOnlyPublicKey,
    ) -> bool {
        let msg = Message::from_digest(digest);
        self.secp.verify_schnorr(signature, &msg, key).is_ok()
    }
}
