use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode;
use bitcoin::hashes::Hash;
use bitcoin::script::ScriptBuf;
use bitcoin::secp256k1::{Message, Secp256k1, SecretKey};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{Amount, CompressedPublicKey, OutPoint, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use serde::{Deserialize, Serialize};

use crate::address::parse_address;
use crate::error::BtcError;
use crate::network::BtcNetwork;
use crate::utxo::Utxo;

/// Estimated virtual size of a P2WPKH input (in vbytes).
/// Breakdown: 41 bytes non-witness + ~27 witness bytes / 4 = ~68 vbytes per input.
const P2WPKH_INPUT_VBYTES: u64 = 68;

/// Estimated virtual size of any output (in vbytes).
const OUTPUT_VBYTES: u64 = 31;

/// Fixed transaction overhead (in vbytes): version + locktime + segwit marker/flag + counts.
const TX_OVERHEAD_VBYTES: u64 = 11;

/// Outputs below this value are non-standard.
pub const DUST_THRESHOLD_SAT: u64 = 546;

/// An unsigned Bitcoin transaction ready for signing.
#[derive(Debug, Clone)]
pub struct UnsignedBtcTx {
    /// The bitcoin transaction with empty witnesses.
    pub tx: Transaction,
    /// The UTXOs being spent (in the same order as the transaction inputs).
    /// Needed for computing sighashes during signing.
    pub prevouts: Vec<TxOut>,
    /// Absolute fee paid, dust change included.
    pub fee_sat: u64,
}

/// Serialized form of [`UnsignedBtcTx`] handed between propose and sign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BtcPayload {
    pub network: BtcNetwork,
    /// Consensus-encoded unsigned transaction, hex.
    pub tx: String,
    pub prevouts: Vec<PrevoutRecord>,
    pub fee_sat: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrevoutRecord {
    pub value_sat: u64,
    #[serde(with = "hex::serde")]
    pub script_pubkey: Vec<u8>,
}

impl UnsignedBtcTx {
    pub fn to_payload(&self, network: BtcNetwork) -> Result<Vec<u8>, BtcError> {
        let payload = BtcPayload {
            network,
            tx: encode::serialize_hex(&self.tx),
            prevouts: self
                .prevouts
                .iter()
                .map(|out| PrevoutRecord {
                    value_sat: out.value.to_sat(),
                    script_pubkey: out.script_pubkey.to_bytes(),
                })
                .collect(),
            fee_sat: self.fee_sat,
        };
        serde_json::to_vec(&payload).map_err(|e| BtcError::InvalidPayload(e.to_string()))
    }

    pub fn from_payload(bytes: &[u8]) -> Result<(Self, BtcNetwork), BtcError> {
        let payload: BtcPayload =
            serde_json::from_slice(bytes).map_err(|e| BtcError::InvalidPayload(e.to_string()))?;
        let raw = hex::decode(&payload.tx).map_err(|e| BtcError::InvalidPayload(e.to_string()))?;
        let tx: Transaction =
            encode::deserialize(&raw).map_err(|e| BtcError::InvalidPayload(e.to_string()))?;
        if tx.input.len() != payload.prevouts.len() {
            return Err(BtcError::InvalidPayload(format!(
                "{} inputs but {} prevouts",
                tx.input.len(),
                payload.prevouts.len()
            )));
        }
        let prevouts = payload
            .prevouts
            .into_iter()
            .map(|p| TxOut {
                value: Amount::from_sat(p.value_sat),
                script_pubkey: ScriptBuf::from(p.script_pubkey),
            })
            .collect();
        Ok((
            UnsignedBtcTx {
                tx,
                prevouts,
                fee_sat: payload.fee_sat,
            },
            payload.network,
        ))
    }
}

/// Estimate the fee for a P2WPKH transaction.
///
/// Computes `estimated_vsize * fee_rate_sat_vbyte` where the vsize is derived
/// from the number of inputs and outputs using P2WPKH weight estimates.
pub fn estimate_fee(num_inputs: usize, num_outputs: usize, fee_rate_sat_vbyte: u64) -> u64 {
    let vsize =
        TX_OVERHEAD_VBYTES + (num_inputs as u64 * P2WPKH_INPUT_VBYTES) + (num_outputs as u64 * OUTPUT_VBYTES);
    vsize * fee_rate_sat_vbyte
}

/// Build an unsigned P2WPKH Bitcoin transaction.
///
/// Selects UTXOs, constructs inputs/outputs, and returns an `UnsignedBtcTx`
/// ready for signing. A change output is added if the change exceeds the dust
/// threshold.
pub fn build_p2wpkh_transaction(
    utxos: &[Utxo],
    recipient: &str,
    amount_sat: u64,
    change_address: &str,
    fee_rate_sat_vbyte: u64,
    network: BtcNetwork,
) -> Result<UnsignedBtcTx, BtcError> {
    if amount_sat < DUST_THRESHOLD_SAT {
        return Err(BtcError::InvalidAmount(format!(
            "{amount_sat} sat is below the dust threshold of {DUST_THRESHOLD_SAT}"
        )));
    }
    let recipient_addr = parse_address(recipient, network)?;
    let change_addr = parse_address(change_address, network)?;

    let selection = crate::utxo::select_utxos(utxos, amount_sat, fee_rate_sat_vbyte)?;

    let mut inputs = Vec::with_capacity(selection.selected.len());
    let mut prevouts = Vec::with_capacity(selection.selected.len());

    for utxo in &selection.selected {
        let txid: Txid = utxo
            .txid
            .parse()
            .map_err(|e| BtcError::TransactionBuildError(format!("invalid txid: {e}")))?;

        inputs.push(TxIn {
            previous_output: OutPoint::new(txid, utxo.vout),
            script_sig: ScriptBuf::new(), // Empty for segwit.
            sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
            witness: Witness::default(),
        });

        prevouts.push(TxOut {
            value: Amount::from_sat(utxo.amount_sat),
            script_pubkey: ScriptBuf::from(utxo.script_pubkey.clone()),
        });
    }

    // Determine number of outputs (1 or 2) to compute the fee accurately.
    let fee_2_outputs = estimate_fee(selection.selected.len(), 2, fee_rate_sat_vbyte);
    let fee_1_output = estimate_fee(selection.selected.len(), 1, fee_rate_sat_vbyte);

    let change_sat = selection.total_sat.saturating_sub(amount_sat + fee_2_outputs);

    let (outputs, fee_sat) = if change_sat > DUST_THRESHOLD_SAT {
        let outs = vec![
            TxOut {
                value: Amount::from_sat(amount_sat),
                script_pubkey: recipient_addr.script_pubkey(),
            },
            TxOut {
                value: Amount::from_sat(change_sat),
                script_pubkey: change_addr.script_pubkey(),
            },
        ];
        (outs, fee_2_outputs)
    } else {
        // Dust change goes to the fee.
        let outs = vec![TxOut {
            value: Amount::from_sat(amount_sat),
            script_pubkey: recipient_addr.script_pubkey(),
        }];
        (outs, selection.total_sat - amount_sat)
    };
    debug_assert!(fee_sat >= fee_1_output);

    let tx = Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: inputs,
        output: outputs,
    };

    Ok(UnsignedBtcTx { tx, prevouts, fee_sat })
}

/// Sign an unsigned P2WPKH transaction with the given private key.
///
/// Every input must pay to the P2WPKH script of `private_key`. Returns the
/// serialized signed transaction ready for broadcast.
pub fn sign_transaction(unsigned_tx: &UnsignedBtcTx, private_key: &[u8]) -> Result<Vec<u8>, BtcError> {
    let secp = Secp256k1::new();
    let secret_key = SecretKey::from_slice(private_key)
        .map_err(|e| BtcError::InvalidPrivateKey(format!("invalid secret key: {e}")))?;
    let public_key = bitcoin::secp256k1::PublicKey::from_secret_key(&secp, &secret_key);
    let compressed_pk = CompressedPublicKey(public_key);
    let script_code = ScriptBuf::new_p2wpkh(&compressed_pk.wpubkey_hash());

    if let Some(index) = unsigned_tx
        .prevouts
        .iter()
        .position(|out| out.script_pubkey != script_code)
    {
        return Err(BtcError::SigningError(format!(
            "input {index} is not controlled by the signing key"
        )));
    }

    let mut signed_tx = unsigned_tx.tx.clone();
    let mut sighash_cache = SighashCache::new(&unsigned_tx.tx);

    for input_index in 0..signed_tx.input.len() {
        let sighash = sighash_cache
            .p2wpkh_signature_hash(
                input_index,
                &script_code,
                unsigned_tx.prevouts[input_index].value,
                EcdsaSighashType::All,
            )
            .map_err(|e| BtcError::SigningError(format!("sighash computation failed: {e}")))?;

        let msg = Message::from_digest(sighash.to_byte_array());
        let signature = secp.sign_ecdsa(&msg, &secret_key);

        // DER signature + sighash type byte.
        let mut sig_bytes = signature.serialize_der().to_vec();
        sig_bytes.push(EcdsaSighashType::All as u8);

        let mut witness = Witness::new();
        witness.push(&sig_bytes);
        witness.push(public_key.serialize());

        signed_tx.input[input_index].witness = witness;
    }

    Ok(encode::serialize(&signed_tx))
}

/// Txid of a serialized transaction, display order.
pub fn txid_of(raw_tx: &[u8]) -> Result<String, BtcError> {
    let tx: Transaction =
        encode::deserialize(raw_tx).map_err(|e| BtcError::InvalidPayload(e.to_string()))?;
    Ok(tx.compute_txid().to_string())
}
