//! Output key derivation: `Q = P + H_TapTweak(P || root) * G`.

use bitcoin::secp256k1::{Parity, XOnlyPublicKey};

use crate::curve::Curve;
use crate::error::Result;
use crate::hash::tap_tweak_hash;

/// Tweaked taproot output key and the parity of its full point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputKey {
    pub key: XOnlyPublicKey,
    pub parity: Parity,
}

/// Tweak `internal_key` by `merkle_root`.
///
/// `internal_key` is lifted to its even-y point first. Passing no root
/// gives the key-path-only tweak of BIP-86.
pub fn tweak(
    curve: &Curve,
    internal_key: &[u8],
    merkle_root: Option<[u8; 32]>,
) -> Result<OutputKey> {
    let internal = curve.lift_x(internal_key)?;
    tweak_key(curve, &internal, merkle_root)
}

/// As [`tweak`], for an already-parsed internal key.
pub fn tweak_key(
    curve: &Curve,
    internal_key: &XOnlyPublicKey,
    merkle_root: Option<[u8; 32]>,
) -> Result<OutputKey> {
    let t = tap_tweak_hash(&internal_key.serialize(), merkle_root.as_ref());
    let (key, parity) = curve.tweak_add(internal_key, t)?;
    log::debug!(
        "tweaked {} -> {} (parity {})",
        internal_key,
        key,
        parity.to_u8()
    );
    Ok(OutputKey { key, parity })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SpendError;
    use crate::test_utils::{hash_lock_tree, test_xonly};
    use bitcoin::hashes::Hash;
    use bitcoin::key::TapTweak;
    use bitcoin::taproot::TapNodeHash;

    #[test]
    fn test_btcdeb_two_leaf_output_key() {
        let curve = Curve::new();
        let internal =
            hex::decode("5bf08d58a430f8c222bffaf9127249c5cdff70a2d68b2b45637eb662b6b88eb5").unwrap();
        let root: [u8; 32] =
            hex::decode("41646f8c1fe2a96ddad7f5471bc4fee7da98794ef8c45a4f4fc6a559d60c9f6b")
                .unwrap()
                .try_into()
                .unwrap();

        let output = tweak(&curve, &internal, Some(root)).unwrap();
        assert_eq!(
            output.key.to_string(),
            "f128a8a8a636e19f00a80169550fedfc26b6f5dd04d935ec452894aad938ef0c"
        );
    }

    #[test]
    fn test_matches_bitcoin_tap_tweak() {
        let curve = Curve::new();
        let internal = test_xonly(2);
        let root = hash_lock_tree(&curve).merkle_root();

        let ours = tweak_key(&curve, &internal, Some(root)).unwrap();
        let (theirs, parity) =
            internal.tap_tweak(curve.secp(), Some(TapNodeHash::from_byte_array(root)));

        assert_eq!(ours.key, theirs.to_inner());
        assert_eq!(ours.parity, parity);
    }

    #[test]
    fn test_key_path_only_tweak_matches_bitcoin() {
        let curve = Curve::new();
        let internal = test_xonly(5);
        let ours = tweak_key(&curve, &internal, None).unwrap();
        let (theirs, parity) = internal.tap_tweak(curve.secp(), None);
        assert_eq!(ours.key, theirs.to_inner());
        assert_eq!(ours.parity, parity);
    }

    #[test]
    fn test_root_changes_output_key() {
        let curve = Curve::new();
        let internal = test_xonly(2);
        let a = tweak_key(&curve, &internal, Some([1u8; 32])).unwrap();
        let b = tweak_key(&curve, &internal, Some([2u8; 32])).unwrap();
        assert_ne!(a.key, b.key);
        assert_ne!(a.key, internal);
    }

    #[test]
    fn test_invalid_internal_key() {
        let curve = Curve::new();
        assert!(matches!(
            tweak(&curve, &[0u8; 31], Some([0u8; 32])),
            Err(SpendError::Crypto(_))
        ));
    }
}
