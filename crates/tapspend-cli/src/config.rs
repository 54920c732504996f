//! Spend configuration, parsed from a TOML file plus environment overrides.
//!
//! Priority: environment variables > config file > defaults.
//!
//! Key references (`tree.internal_key`, leaf `key`, `spend.signer`) are either
//! a name from `[keys]` or a raw 32-byte x-only public key in hex. Only named
//! keys can sign.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use bitcoin::hashes::{sha256, Hash};
use bitcoin::secp256k1::{SecretKey, XOnlyPublicKey};
use bitcoin::{Address, Amount, Network, OutPoint, Txid};
use serde::{Deserialize, Serialize};
use tapspend_core::{Curve, LeafPolicy};
use zeroize::Zeroizing;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendConfig {
    #[serde(default)]
    pub general: GeneralSection,

    #[serde(default)]
    pub bitcoin: BitcoinSection,

    /// Named secret keys (hex)
    #[serde(default)]
    pub keys: BTreeMap<String, String>,

    pub tree: TreeSection,

    pub spend: SpendSection,

    /// Output being spent; without it only the address is derived
    pub funding: Option<FundingSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralSection {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitcoinSection {
    /// "bitcoin", "testnet", "signet", "regtest"
    #[serde(default = "default_network")]
    pub network: String,
}

impl Default for BitcoinSection {
    fn default() -> Self {
        Self {
            network: default_network(),
        }
    }
}

/// Internal key and leaves, in tree order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeSection {
    pub internal_key: String,

    #[serde(default)]
    pub leaves: Vec<LeafEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LeafEntry {
    /// `OP_SHA256 <hash> OP_EQUALVERIFY <key> OP_CHECKSIG`.
    /// `hash` defaults to the SHA-256 of `spend.preimage`.
    HashLock {
        key: String,
        #[serde(default)]
        hash: Option<String>,
    },
    /// `<key> OP_CHECKSIG`
    KeyOnly { key: String },
}

impl LeafEntry {
    fn key(&self) -> &str {
        match self {
            LeafEntry::HashLock { key, .. } | LeafEntry::KeyOnly { key } => key,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendSection {
    /// Index into `tree.leaves`
    #[serde(default)]
    pub leaf: usize,

    /// Name in `[keys]` that signs for the leaf
    pub signer: String,

    /// Hash-lock preimage (hex)
    pub preimage: Option<String>,

    pub destination: String,

    #[serde(default = "default_fee_sat")]
    pub fee_sat: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingSection {
    pub txid: String,
    pub vout: u32,
    pub amount_sat: u64,
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_log_level() -> String {
    "info".to_string()
}

fn default_network() -> String {
    "regtest".to_string()
}

fn default_fee_sat() -> u64 {
    330
}

// ============================================================================
// Loading & environment override
// ============================================================================

impl SpendConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: SpendConfig =
            toml::from_str(&contents).with_context(|| "Failed to parse TOML config")?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `TAPSPEND_LOG_LEVEL`
    /// - `TAPSPEND_NETWORK`
    /// - `TAPSPEND_PREIMAGE`
    /// - `TAPSPEND_FEE_SAT`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("TAPSPEND_LOG_LEVEL") {
            self.general.log_level = v;
        }
        if let Ok(v) = std::env::var("TAPSPEND_NETWORK") {
            self.bitcoin.network = v;
        }
        if let Ok(v) = std::env::var("TAPSPEND_PREIMAGE") {
            self.spend.preimage = Some(v);
        }
        if let Ok(v) = std::env::var("TAPSPEND_FEE_SAT") {
            if let Ok(fee) = v.parse::<u64>() {
                self.spend.fee_sat = fee;
            }
        }
    }

    pub fn network(&self) -> Result<Network> {
        match self.bitcoin.network.as_str() {
            "bitcoin" | "mainnet" => Ok(Network::Bitcoin),
            "testnet" | "testnet3" => Ok(Network::Testnet),
            "signet" => Ok(Network::Signet),
            "regtest" => Ok(Network::Regtest),
            other => anyhow::bail!("unknown bitcoin.network \"{}\"", other),
        }
    }

    /// Validate that the configuration describes a buildable spend.
    pub fn validate(&self) -> Result<()> {
        let curve = Curve::new();
        self.network()?;

        anyhow::ensure!(
            !self.tree.leaves.is_empty(),
            "tree.leaves must not be empty"
        );
        anyhow::ensure!(
            self.spend.leaf < self.tree.leaves.len(),
            "spend.leaf {} out of range ({} leaves)",
            self.spend.leaf,
            self.tree.leaves.len()
        );

        for name in self.keys.keys() {
            self.secret_key(name)?;
        }
        self.x_only_key(&curve, &self.tree.internal_key)
            .context("tree.internal_key")?;
        self.leaf_policies(&curve)?;

        anyhow::ensure!(
            self.keys.contains_key(&self.spend.signer),
            "spend.signer \"{}\" is not a name in [keys]",
            self.spend.signer
        );
        self.preimage()?;
        self.destination()?;
        self.funding_outpoint()?;

        Ok(())
    }

    // ========================================================================
    // Resolution into library types
    // ========================================================================

    pub fn secret_key(&self, name: &str) -> Result<SecretKey> {
        let hex_key = self
            .keys
            .get(name)
            .with_context(|| format!("no key named \"{}\" in [keys]", name))?;
        let bytes = Zeroizing::new(
            hex::decode(hex_key).with_context(|| format!("keys.{} is not valid hex", name))?,
        );
        SecretKey::from_slice(&bytes)
            .with_context(|| format!("keys.{} is not a valid secret key", name))
    }

    /// Resolve a key reference: a `[keys]` name, else x-only hex.
    pub fn x_only_key(&self, curve: &Curve, reference: &str) -> Result<XOnlyPublicKey> {
        if self.keys.contains_key(reference) {
            let secret = self.secret_key(reference)?;
            return Ok(secret.x_only_public_key(curve.secp()).0);
        }
        let bytes = hex::decode(reference)
            .with_context(|| format!("\"{}\" is neither a key name nor hex", reference))?;
        Ok(curve.lift_x(&bytes)?)
    }

    pub fn leaf_policies(&self, curve: &Curve) -> Result<Vec<LeafPolicy>> {
        self.tree
            .leaves
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let pubkey = self
                    .x_only_key(curve, entry.key())
                    .with_context(|| format!("tree.leaves[{}].key", i))?
                    .serialize()
                    .to_vec();
                Ok(match entry {
                    LeafEntry::HashLock { hash, .. } => LeafPolicy::HashThenKey {
                        hash: self
                            .lock_hash(hash.as_deref())
                            .with_context(|| format!("tree.leaves[{}].hash", i))?,
                        pubkey,
                    },
                    LeafEntry::KeyOnly { .. } => LeafPolicy::KeyOnly { pubkey },
                })
            })
            .collect()
    }

    fn lock_hash(&self, hash: Option<&str>) -> Result<[u8; 32]> {
        match hash {
            Some(hex_hash) => {
                let bytes = hex::decode(hex_hash).context("not valid hex")?;
                bytes
                    .try_into()
                    .map_err(|_| anyhow::anyhow!("hash must be 32 bytes"))
            }
            None => {
                let preimage = self
                    .preimage()?
                    .context("no hash given and spend.preimage is unset")?;
                Ok(sha256::Hash::hash(&preimage).to_byte_array())
            }
        }
    }

    pub fn preimage(&self) -> Result<Option<Vec<u8>>> {
        self.spend
            .preimage
            .as_deref()
            .map(|p| hex::decode(p).context("spend.preimage is not valid hex"))
            .transpose()
    }

    pub fn destination(&self) -> Result<Address> {
        let network = self.network()?;
        Address::from_str(&self.spend.destination)
            .context("spend.destination is not a valid address")?
            .require_network(network)
            .with_context(|| format!("spend.destination is not a {} address", network))
    }

    pub fn fee(&self) -> Amount {
        Amount::from_sat(self.spend.fee_sat)
    }

    pub fn funding_outpoint(&self) -> Result<Option<(OutPoint, Amount)>> {
        let Some(funding) = &self.funding else {
            return Ok(None);
        };
        let txid = Txid::from_str(&funding.txid).context("funding.txid is not a valid txid")?;
        Ok(Some((
            OutPoint {
                txid,
                vout: funding.vout,
            },
            Amount::from_sat(funding.amount_sat),
        )))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn demo_toml() -> &'static str {
        r#"
[bitcoin]
network = "regtest"

[keys]
alice = "00112233445566778899aabbccddee0000112233445566778899aabbccddee00"
bob = "00112233445566778899aabbccddee0100112233445566778899aabbccddee01"

[tree]
internal_key = "bob"

[[tree.leaves]]
type = "hash_lock"
key = "alice"

[[tree.leaves]]
type = "key_only"
key = "bob"

[spend]
leaf = 0
signer = "alice"
preimage = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff"
destination = "bcrt1quqqccct6wqpq9tp7qqw0j74cy4wkmrc5mt3d3t"

[funding]
txid = "cc6bbc55755d2b3fc3a55bcb3fc9505804960a239abc0db9098c752aabd11003"
vout = 1
amount_sat = 10000
"#
    }

    fn load(toml: &str) -> SpendConfig {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", toml).unwrap();
        SpendConfig::from_file(file.path()).unwrap()
    }

    #[test]
    fn test_parse_demo_config() {
        let config = load(demo_toml());
        assert_eq!(config.general.log_level, "info"); // default
        assert_eq!(config.network().unwrap(), Network::Regtest);
        assert_eq!(config.keys.len(), 2);
        assert_eq!(config.tree.leaves.len(), 2);
        assert_eq!(
            config.tree.leaves[1],
            LeafEntry::KeyOnly { key: "bob".into() }
        );
        assert_eq!(config.spend.fee_sat, 330); // default
        assert_eq!(config.funding.as_ref().unwrap().amount_sat, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_hash_defaults_to_preimage_hash() {
        let config = load(demo_toml());
        let curve = Curve::new();
        let policies = config.leaf_policies(&curve).unwrap();

        let preimage = config.preimage().unwrap().unwrap();
        let expected = sha256::Hash::hash(&preimage).to_byte_array();
        match &policies[0] {
            LeafPolicy::HashThenKey { hash, pubkey } => {
                assert_eq!(*hash, expected);
                let alice = config.x_only_key(&curve, "alice").unwrap();
                assert_eq!(pubkey, &alice.serialize().to_vec());
            }
            other => panic!("unexpected policy {:?}", other),
        }
    }

    #[test]
    fn test_raw_hex_key_reference() {
        let curve = Curve::new();
        let config = load(demo_toml());
        let bob = config.x_only_key(&curve, "bob").unwrap();
        let by_hex = config
            .x_only_key(&curve, &hex::encode(bob.serialize()))
            .unwrap();
        assert_eq!(bob, by_hex);
        assert!(config.x_only_key(&curve, "carol").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = load(demo_toml());

        std::env::set_var("TAPSPEND_NETWORK", "signet");
        std::env::set_var("TAPSPEND_FEE_SAT", "500");
        std::env::set_var("TAPSPEND_LOG_LEVEL", "debug");

        config.apply_env_overrides();

        assert_eq!(config.bitcoin.network, "signet");
        assert_eq!(config.spend.fee_sat, 500);
        assert_eq!(config.general.log_level, "debug");

        std::env::remove_var("TAPSPEND_NETWORK");
        std::env::remove_var("TAPSPEND_FEE_SAT");
        std::env::remove_var("TAPSPEND_LOG_LEVEL");
    }

    #[test]
    fn test_validation_empty_leaves() {
        let mut config = load(demo_toml());
        config.tree.leaves.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_leaf_index_out_of_range() {
        let mut config = load(demo_toml());
        config.spend.leaf = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_unknown_signer() {
        let mut config = load(demo_toml());
        config.spend.signer = "carol".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_bad_hex() {
        let mut config = load(demo_toml());
        config.spend.preimage = Some("zz".into());
        assert!(config.validate().is_err());

        let mut config = load(demo_toml());
        config.keys.insert("mallory".into(), "0011".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_hash_lock_needs_hash_or_preimage() {
        let mut config = load(demo_toml());
        config.spend.preimage = None;
        assert!(config.validate().is_err());

        config.tree.leaves[0] = LeafEntry::HashLock {
            key: "alice".into(),
            hash: Some(hex::encode([0x11u8; 32])),
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_destination_network() {
        let mut config = load(demo_toml());
        config.bitcoin.network = "bitcoin".into();
        assert!(config.validate().is_err());

        config.bitcoin.network = "moonnet".into();
        assert!(config.network().is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = load(demo_toml());
        let serialized = toml::to_string_pretty(&config).unwrap();
        let reparsed: SpendConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(reparsed.tree.leaves, config.tree.leaves);
        assert_eq!(reparsed.spend.destination, config.spend.destination);
    }
}
