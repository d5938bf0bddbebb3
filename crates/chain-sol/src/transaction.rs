//! Solana legacy transaction wire format and signing.
//!
//! ```text
//! Transaction:
//!   num_signatures          compact-u16
//!   signatures              64 bytes * num_signatures
//!   message:
//!     num_required_sigs     u8
//!     num_readonly_signed   u8
//!     num_readonly_unsigned u8
//!     num_accounts          compact-u16
//!     account_keys          32 bytes * num_accounts
//!     recent_blockhash      32 bytes
//!     num_instructions      compact-u16
//!     instructions[]
//!
//! Instruction:
//!   program_id_index        u8
//!   num_accounts            compact-u16
//!   account_indices         u8 * num_accounts
//!   data_len                compact-u16
//!   data                    u8 * data_len
//! ```
//!
//! Proposals are encoded with zeroed signature slots; signing fills the slot
//! that belongs to the key.

use ed25519_dalek::Signer;

use crate::address::signing_key;
use crate::error::SolError;

/// System Program: 32 zero bytes, `11111111111111111111111111111111`.
pub const SYSTEM_PROGRAM_ID: [u8; 32] = [0u8; 32];

/// System Program `Transfer` instruction index (little-endian u32).
const SYSTEM_TRANSFER_IX_INDEX: u32 = 2;

const SIGNATURE_LEN: usize = 64;

/// Encode a `u16` in Solana's compact-u16 (7 bits per byte) format.
pub fn encode_compact_u16(value: u16) -> Vec<u8> {
    let mut val = u32::from(value);
    let mut out = Vec::with_capacity(3);
    loop {
        let mut byte = (val & 0x7f) as u8;
        val >>= 7;
        if val > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if val == 0 {
            return out;
        }
    }
}

/// Decode a compact-u16, returning `(value, bytes_consumed)`.
pub fn decode_compact_u16(data: &[u8]) -> Result<(u16, usize), SolError> {
    let mut value: u32 = 0;
    for (i, byte) in data.iter().take(3).enumerate() {
        value |= u32::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            let value = u16::try_from(value)
                .map_err(|_| SolError::SerializationError("compact-u16 value overflow".into()))?;
            return Ok((value, i + 1));
        }
    }
    Err(SolError::SerializationError(
        "unexpected end of data while decoding compact-u16".into(),
    ))
}

fn compact_len(len: usize, what: &str) -> Result<Vec<u8>, SolError> {
    let len = u16::try_from(len)
        .map_err(|_| SolError::SerializationError(format!("too many {what}: {len}")))?;
    Ok(encode_compact_u16(len))
}

#[derive(Debug, Clone)]
pub struct SolAccountMeta {
    pub pubkey: [u8; 32],
    pub is_signer: bool,
    pub is_writable: bool,
}

impl SolAccountMeta {
    pub fn signer(pubkey: [u8; 32], is_writable: bool) -> Self {
        Self { pubkey, is_signer: true, is_writable }
    }

    pub fn writable(pubkey: [u8; 32]) -> Self {
        Self { pubkey, is_signer: false, is_writable: true }
    }

    pub fn readonly(pubkey: [u8; 32]) -> Self {
        Self { pubkey, is_signer: false, is_writable: false }
    }
}

/// An instruction before compilation into a message.
#[derive(Debug, Clone)]
pub struct SolInstruction {
    pub program_id: [u8; 32],
    pub accounts: Vec<SolAccountMeta>,
    pub data: Vec<u8>,
}

/// A compiled legacy message.
#[derive(Debug, Clone)]
pub struct SolTransaction {
    /// Writable signers (fee payer first), read-only signers, writable
    /// non-signers, then read-only non-signers.
    pub account_keys: Vec<[u8; 32]>,
    pub num_required_signatures: u8,
    pub num_readonly_signed: u8,
    pub num_readonly_unsigned: u8,
    pub recent_blockhash: [u8; 32],
    pub compiled_instructions: Vec<CompiledInstruction>,
}

#[derive(Debug, Clone)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub account_indices: Vec<u8>,
    pub data: Vec<u8>,
}

/// Build a native SOL transfer from `from_pubkey`, who also pays the fee.
pub fn build_sol_transfer(
    from_pubkey: &[u8; 32],
    to_pubkey: &[u8; 32],
    lamports: u64,
    recent_blockhash: &[u8; 32],
) -> Result<SolTransaction, SolError> {
    if lamports == 0 {
        return Err(SolError::InvalidAmount("lamports must be > 0".into()));
    }
    let instruction = system_transfer_instruction(from_pubkey, to_pubkey, lamports);
    compile_transaction(&[instruction], from_pubkey, recent_blockhash)
}

/// Compile instructions into a message with a single fee payer at index 0.
pub fn compile_transaction(
    instructions: &[SolInstruction],
    fee_payer: &[u8; 32],
    recent_blockhash: &[u8; 32],
) -> Result<SolTransaction, SolError> {
    // Instruction account lists are tiny; a Vec keeps first-seen order.
    let mut entries: Vec<SolAccountMeta> = Vec::new();
    let mut upsert = |meta: SolAccountMeta| {
        if let Some(entry) = entries.iter_mut().find(|e| e.pubkey == meta.pubkey) {
            entry.is_signer |= meta.is_signer;
            entry.is_writable |= meta.is_writable;
        } else {
            entries.push(meta);
        }
    };

    upsert(SolAccountMeta::signer(*fee_payer, true));
    for ix in instructions {
        for meta in &ix.accounts {
            upsert(meta.clone());
        }
        upsert(SolAccountMeta::readonly(ix.program_id));
    }

    // Stable sort keeps the fee payer first among writable signers.
    entries.sort_by_key(|e| match (e.is_signer, e.is_writable) {
        (true, true) => 0u8,
        (true, false) => 1,
        (false, true) => 2,
        (false, false) => 3,
    });

    let count = |pred: fn(&SolAccountMeta) -> bool| -> Result<u8, SolError> {
        u8::try_from(entries.iter().filter(|e| pred(e)).count())
            .map_err(|_| SolError::TransactionBuildError("too many accounts".into()))
    };
    let num_required_signatures = count(|e| e.is_signer)?;
    let num_readonly_signed = count(|e| e.is_signer && !e.is_writable)?;
    let num_readonly_unsigned = count(|e| !e.is_signer && !e.is_writable)?;

    let account_keys: Vec<[u8; 32]> = entries.iter().map(|e| e.pubkey).collect();
    let index_of = |key: &[u8; 32]| -> Result<u8, SolError> {
        let pos = account_keys
            .iter()
            .position(|k| k == key)
            .ok_or_else(|| SolError::TransactionBuildError("account not in account keys".into()))?;
        u8::try_from(pos).map_err(|_| SolError::TransactionBuildError("too many accounts".into()))
    };

    let compiled = instructions
        .iter()
        .map(|ix| {
            Ok(CompiledInstruction {
                program_id_index: index_of(&ix.program_id)?,
                account_indices: ix
                    .accounts
                    .iter()
                    .map(|meta| index_of(&meta.pubkey))
                    .collect::<Result<_, SolError>>()?,
                data: ix.data.clone(),
            })
        })
        .collect::<Result<Vec<_>, SolError>>()?;

    Ok(SolTransaction {
        account_keys,
        num_required_signatures,
        num_readonly_signed,
        num_readonly_unsigned,
        recent_blockhash: *recent_blockhash,
        compiled_instructions: compiled,
    })
}

/// Serialize the message, the bytes that get signed.
pub fn serialize_message(tx: &SolTransaction) -> Result<Vec<u8>, SolError> {
    let mut buf = Vec::with_capacity(256);
    buf.push(tx.num_required_signatures);
    buf.push(tx.num_readonly_signed);
    buf.push(tx.num_readonly_unsigned);

    buf.extend_from_slice(&compact_len(tx.account_keys.len(), "accounts")?);
    for key in &tx.account_keys {
        buf.extend_from_slice(key);
    }
    buf.extend_from_slice(&tx.recent_blockhash);

    buf.extend_from_slice(&compact_len(tx.compiled_instructions.len(), "instructions")?);
    for ix in &tx.compiled_instructions {
        buf.push(ix.program_id_index);
        buf.extend_from_slice(&compact_len(ix.account_indices.len(), "instruction accounts")?);
        buf.extend_from_slice(&ix.account_indices);
        buf.extend_from_slice(&compact_len(ix.data.len(), "instruction data bytes")?);
        buf.extend_from_slice(&ix.data);
    }
    Ok(buf)
}

/// Wire transaction with every signature slot zeroed.
pub fn unsigned_wire(tx: &SolTransaction) -> Result<Vec<u8>, SolError> {
    let message = serialize_message(tx)?;
    let slots = usize::from(tx.num_required_signatures);
    let mut wire = Vec::with_capacity(3 + slots * SIGNATURE_LEN + message.len());
    wire.extend_from_slice(&encode_compact_u16(u16::from(tx.num_required_signatures)));
    wire.resize(wire.len() + slots * SIGNATURE_LEN, 0);
    wire.extend_from_slice(&message);
    Ok(wire)
}

/// Sign a message for which the key is the only signer.
pub fn sign_transaction(tx: &SolTransaction, private_key: &[u8]) -> Result<Vec<u8>, SolError> {
    sign_wire_transaction(private_key, &unsigned_wire(tx)?)
}

struct WireLayout<'a> {
    sigs_start: usize,
    num_sigs: usize,
    message: &'a [u8],
}

fn parse_wire(raw_tx: &[u8]) -> Result<WireLayout<'_>, SolError> {
    let (num_sigs, prefix) = decode_compact_u16(raw_tx)?;
    if num_sigs == 0 {
        return Err(SolError::TransactionBuildError("transaction has zero signatures".into()));
    }
    let num_sigs = usize::from(num_sigs);
    let sigs_end = prefix + num_sigs * SIGNATURE_LEN;
    let message = raw_tx.get(sigs_end..).ok_or_else(|| {
        SolError::SerializationError("transaction too short: signature slots exceed length".into())
    })?;
    if message.len() < 4 {
        return Err(SolError::SerializationError("transaction message too short".into()));
    }
    Ok(WireLayout {
        sigs_start: prefix,
        num_sigs,
        message,
    })
}

/// Fill the signature slot belonging to `private_key` in a wire transaction.
///
/// Works for any transaction in which the key is one of the required
/// signers, including multi-signer transactions built elsewhere.
pub fn sign_wire_transaction(private_key: &[u8], raw_tx: &[u8]) -> Result<Vec<u8>, SolError> {
    let key = signing_key(private_key)?;
    let our_pubkey = key.verifying_key().to_bytes();
    let layout = parse_wire(raw_tx)?;
    let message = layout.message;

    let required = usize::from(message[0]);
    let (num_accounts, accounts_prefix) = decode_compact_u16(&message[3..])?;
    let accounts_start = 3 + accounts_prefix;
    let accounts_end = accounts_start + usize::from(num_accounts) * 32;
    let accounts = message.get(accounts_start..accounts_end).ok_or_else(|| {
        SolError::SerializationError("transaction message too short for account keys".into())
    })?;

    let signer_idx = accounts
        .chunks_exact(32)
        .take(required.min(layout.num_sigs))
        .position(|k| k == our_pubkey)
        .ok_or_else(|| SolError::SigningError("wallet pubkey not found in transaction signers".into()))?;

    let signature = key.sign(message);
    let mut signed_tx = raw_tx.to_vec();
    let offset = layout.sigs_start + signer_idx * SIGNATURE_LEN;
    signed_tx[offset..offset + SIGNATURE_LEN].copy_from_slice(&signature.to_bytes());
    Ok(signed_tx)
}

/// First signature of a wire transaction, Base58. This is the transaction id.
pub fn transaction_id(raw_tx: &[u8]) -> Result<String, SolError> {
    let layout = parse_wire(raw_tx)?;
    let first = &raw_tx[layout.sigs_start..layout.sigs_start + SIGNATURE_LEN];
    if first.iter().all(|b| *b == 0) {
        return Err(SolError::SigningError("fee payer signature is missing".into()));
    }
    Ok(bs58::encode(first).into_string())
}

fn system_transfer_instruction(from: &[u8; 32], to: &[u8; 32], lamports: u64) -> SolInstruction {
    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER_IX_INDEX.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());

    SolInstruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![SolAccountMeta::signer(*from, true), SolAccountMeta::writable(*to)],
        data,
    }
}
