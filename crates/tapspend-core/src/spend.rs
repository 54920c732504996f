//! Single-input script-path spend: unsigned transaction -> sighash ->
//! signature -> finalized witness -> raw transaction.

use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode::serialize;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::XOnlyPublicKey;
use bitcoin::sighash::{Prevouts, SighashCache, TapSighash, TapSighashType};
use bitcoin::taproot::{self, TapLeafHash};
use bitcoin::transaction::Version;
use bitcoin::{
    Address, Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
};

use crate::control::ControlBlock;
use crate::error::{Result, SpendError};
use crate::finalize::{self, AuxData, SignatureSet};
use crate::output::TaprootOutput;
use crate::script::Leaf;
use crate::signer::TapSigner;
use crate::witness::WitnessStack;

/// Outputs below this value are non-standard.
pub const DUST_LIMIT_SAT: u64 = 546;

/// The taproot output being spent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingUtxo {
    pub outpoint: OutPoint,
    pub txout: TxOut,
}

/// Single output sending `funding_value - fee` to `destination`.
pub fn sweep_output(destination: &Address, funding_value: Amount, fee: Amount) -> Result<TxOut> {
    let value = funding_value
        .checked_sub(fee)
        .ok_or_else(|| SpendError::Transaction("fee exceeds funding value".into()))?;
    if value.to_sat() < DUST_LIMIT_SAT {
        return Err(SpendError::Transaction(format!(
            "output {} sat is below dust limit ({} sat)",
            value.to_sat(),
            DUST_LIMIT_SAT
        )));
    }
    Ok(TxOut {
        value,
        script_pubkey: destination.script_pubkey(),
    })
}

/// A spend of one leaf that still needs its signature and aux data.
#[derive(Debug, Clone)]
pub struct UnsignedSpend {
    tx: Transaction,
    funding: FundingUtxo,
    leaf: Leaf,
    control_block: ControlBlock,
    signatures: SignatureSet,
    aux: AuxData,
}

impl UnsignedSpend {
    /// Spend `funding` through leaf `leaf_index` of `output`.
    pub fn new(
        output: &TaprootOutput,
        leaf_index: usize,
        funding: FundingUtxo,
        outputs: Vec<TxOut>,
    ) -> Result<Self> {
        if funding.txout.script_pubkey != output.script_pubkey() {
            return Err(SpendError::Transaction(
                "funding output is not locked to this taproot output".into(),
            ));
        }
        if outputs.is_empty() {
            return Err(SpendError::Transaction("no outputs".into()));
        }
        let total_out = outputs
            .iter()
            .try_fold(Amount::ZERO, |acc, o| acc.checked_add(o.value))
            .ok_or_else(|| SpendError::Transaction("output value overflow".into()))?;
        if total_out > funding.txout.value {
            return Err(SpendError::Transaction(format!(
                "outputs ({} sat) exceed funding value ({} sat)",
                total_out.to_sat(),
                funding.txout.value.to_sat()
            )));
        }

        let leaf = output.leaf(leaf_index)?.clone();
        let control_block = output.control_block(leaf_index)?;

        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: funding.outpoint,
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: outputs,
        };

        log::debug!(
            "spending {} via leaf {} (depth {})",
            funding.outpoint,
            leaf_index,
            control_block.depth()
        );

        Ok(Self {
            tx,
            funding,
            leaf,
            control_block,
            signatures: SignatureSet::new(),
            aux: AuxData::default(),
        })
    }

    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    pub fn leaf(&self) -> &Leaf {
        &self.leaf
    }

    pub fn control_block(&self) -> &ControlBlock {
        &self.control_block
    }

    pub fn signatures(&self) -> &SignatureSet {
        &self.signatures
    }

    /// BIP-341 script-path sighash for the spent leaf, `SIGHASH_DEFAULT`.
    pub fn sighash(&self) -> Result<TapSighash> {
        let prevouts = [&self.funding.txout];
        let leaf_hash = TapLeafHash::from_byte_array(self.leaf.leaf_hash());
        SighashCache::new(&self.tx)
            .taproot_script_spend_signature_hash(
                0,
                &Prevouts::All(&prevouts),
                leaf_hash,
                TapSighashType::Default,
            )
            .map_err(|e| SpendError::Transaction(format!("sighash: {}", e)))
    }

    /// Ask `signer` for the signature the leaf requires.
    pub fn sign(&mut self, signer: &dyn TapSigner) -> Result<()> {
        let key = *self
            .leaf
            .kind()
            .signing_key()
            .ok_or_else(|| SpendError::Policy("leaf does not take a signature".into()))?;
        if signer.x_only_public_key() != key {
            return Err(SpendError::Signer(format!(
                "signer key {} does not match leaf key {}",
                signer.x_only_public_key(),
                key
            )));
        }

        let sighash = self.sighash()?;
        let signature = signer.sign(&sighash)?;
        self.signatures.insert(
            key,
            taproot::Signature {
                signature,
                sighash_type: TapSighashType::Default,
            },
        );
        log::debug!("signed sighash {} with {}", sighash, key);
        Ok(())
    }

    /// Add a signature produced outside this process.
    pub fn add_signature(&mut self, key: XOnlyPublicKey, signature: taproot::Signature) {
        self.signatures.insert(key, signature);
    }

    pub fn set_preimage(&mut self, preimage: Vec<u8>) {
        self.aux.preimage = Some(preimage);
    }

    /// Assemble the witness and the final transaction.
    pub fn finalize(self) -> Result<SignedTransaction> {
        let witness = finalize::finalize(
            &self.leaf,
            &self.control_block,
            &self.signatures,
            &self.aux,
        )?;
        let witness_bytes = witness.serialize()?;

        // version || marker || flag || inputs || outputs || witness || locktime
        let base = serialize(&self.tx);
        let (version, rest) = base.split_at(4);
        let (body, lock_time) = rest.split_at(rest.len() - 4);
        let mut raw = Vec::with_capacity(base.len() + 2 + witness_bytes.len());
        raw.extend_from_slice(version);
        raw.extend_from_slice(&[0x00, 0x01]);
        raw.extend_from_slice(body);
        raw.extend_from_slice(&witness_bytes);
        raw.extend_from_slice(lock_time);

        let mut tx = self.tx;
        tx.input[0].witness = Witness::from(&witness);

        let signed = SignedTransaction { tx, raw, witness };
        log::info!(
            "finalized spend {} ({} vbytes, {} witness items)",
            signed.txid(),
            signed.vsize(),
            signed.witness.len()
        );
        Ok(signed)
    }
}

/// A fully witnessed transaction, ready to broadcast.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    tx: Transaction,
    raw: Vec<u8>,
    witness: WitnessStack,
}

impl SignedTransaction {
    pub fn txid(&self) -> Txid {
        self.tx.compute_txid()
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn raw_hex(&self) -> String {
        hex::encode(&self.raw)
    }

    pub fn witness(&self) -> &WitnessStack {
        &self.witness
    }

    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    pub fn vsize(&self) -> usize {
        self.tx.vsize()
    }
}
