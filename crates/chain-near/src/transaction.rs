//! Borsh encoding of NEAR transactions.
//!
//! Only the pieces a wallet needs are modelled: ed25519 keys, `Transfer`
//! and `FunctionCall` actions, and the signed envelope. The layout follows
//! the protocol's borsh schema field for field.

use ed25519_dalek::Signer;
use sha2::{Digest, Sha256};

use crate::account::{signing_key, validate_account_id};
use crate::error::NearError;

/// Borsh enum tag of an ed25519 key or signature.
const KEY_TYPE_ED25519: u8 = 0;

const ACTION_FUNCTION_CALL: u8 = 2;
const ACTION_TRANSFER: u8 = 3;

/// Gas attached to token contract calls (30 Tgas).
pub const TOKEN_CALL_GAS: u64 = 30_000_000_000_000;

/// Deposit NEP-141/171/245 transfer methods require to prove full-access intent.
pub const ONE_YOCTO: u128 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    FunctionCall {
        method_name: String,
        args: Vec<u8>,
        gas: u64,
        deposit: u128,
    },
    Transfer {
        deposit: u128,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NearTransaction {
    pub signer_id: String,
    pub public_key: [u8; 32],
    pub nonce: u64,
    pub receiver_id: String,
    pub block_hash: [u8; 32],
    pub actions: Vec<Action>,
}

#[derive(Default)]
struct BorshWriter {
    buf: Vec<u8>,
}

impl BorshWriter {
    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u128(&mut self, v: u128) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn fixed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn bytes(&mut self, bytes: &[u8]) -> Result<(), NearError> {
        let len = u32::try_from(bytes.len())
            .map_err(|_| NearError::SerializationError("field longer than u32::MAX".into()))?;
        self.u32(len);
        self.fixed(bytes);
        Ok(())
    }

    fn string(&mut self, s: &str) -> Result<(), NearError> {
        self.bytes(s.as_bytes())
    }
}

struct BorshReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BorshReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], NearError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| NearError::SerializationError(format!("truncated at byte {}", self.pos)))?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], NearError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, NearError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, NearError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, NearError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn u128(&mut self) -> Result<u128, NearError> {
        Ok(u128::from_le_bytes(self.array()?))
    }

    fn bytes(&mut self) -> Result<Vec<u8>, NearError> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn string(&mut self) -> Result<String, NearError> {
        String::from_utf8(self.bytes()?).map_err(|e| NearError::SerializationError(e.to_string()))
    }

    fn ed25519_tag(&mut self) -> Result<(), NearError> {
        match self.u8()? {
            KEY_TYPE_ED25519 => Ok(()),
            other => Err(NearError::SerializationError(format!("unsupported key type {other}"))),
        }
    }

    fn finish(&self) -> Result<(), NearError> {
        if self.pos == self.data.len() {
            Ok(())
        } else {
            Err(NearError::SerializationError(format!(
                "{} trailing bytes",
                self.data.len() - self.pos
            )))
        }
    }
}

impl NearTransaction {
    pub fn transfer(
        signer_id: &str,
        public_key: [u8; 32],
        nonce: u64,
        receiver_id: &str,
        block_hash: [u8; 32],
        deposit: u128,
    ) -> Result<Self, NearError> {
        if deposit == 0 {
            return Err(NearError::InvalidAmount("transfer amount must be positive".into()));
        }
        Self::new(signer_id, public_key, nonce, receiver_id, block_hash, vec![Action::Transfer { deposit }])
    }

    pub fn new(
        signer_id: &str,
        public_key: [u8; 32],
        nonce: u64,
        receiver_id: &str,
        block_hash: [u8; 32],
        actions: Vec<Action>,
    ) -> Result<Self, NearError> {
        validate_account_id(signer_id)?;
        validate_account_id(receiver_id)?;
        Ok(Self {
            signer_id: signer_id.to_string(),
            public_key,
            nonce,
            receiver_id: receiver_id.to_string(),
            block_hash,
            actions,
        })
    }

    pub fn to_borsh(&self) -> Result<Vec<u8>, NearError> {
        let mut w = BorshWriter::default();
        w.string(&self.signer_id)?;
        w.u8(KEY_TYPE_ED25519);
        w.fixed(&self.public_key);
        w.u64(self.nonce);
        w.string(&self.receiver_id)?;
        w.fixed(&self.block_hash);
        w.u32(self.actions.len() as u32);
        for action in &self.actions {
            match action {
                Action::FunctionCall {
                    method_name,
                    args,
                    gas,
                    deposit,
                } => {
                    w.u8(ACTION_FUNCTION_CALL);
                    w.string(method_name)?;
                    w.bytes(args)?;
                    w.u64(*gas);
                    w.u128(*deposit);
                }
                Action::Transfer { deposit } => {
                    w.u8(ACTION_TRANSFER);
                    w.u128(*deposit);
                }
            }
        }
        Ok(w.buf)
    }

    pub fn from_borsh(data: &[u8]) -> Result<Self, NearError> {
        let mut r = BorshReader::new(data);
        let tx = Self::read(&mut r)?;
        r.finish()?;
        Ok(tx)
    }

    fn read(r: &mut BorshReader<'_>) -> Result<Self, NearError> {
        let signer_id = r.string()?;
        r.ed25519_tag()?;
        let public_key = r.array()?;
        let nonce = r.u64()?;
        let receiver_id = r.string()?;
        let block_hash = r.array()?;
        let count = r.u32()?;
        let mut actions = Vec::new();
        for _ in 0..count {
            let action = match r.u8()? {
                ACTION_FUNCTION_CALL => Action::FunctionCall {
                    method_name: r.string()?,
                    args: r.bytes()?,
                    gas: r.u64()?,
                    deposit: r.u128()?,
                },
                ACTION_TRANSFER => Action::Transfer { deposit: r.u128()? },
                other => {
                    return Err(NearError::SerializationError(format!("unsupported action {other}")))
                }
            };
            actions.push(action);
        }
        Ok(Self {
            signer_id,
            public_key,
            nonce,
            receiver_id,
            block_hash,
            actions,
        })
    }

    /// SHA-256 of the borsh bytes; signed, and base58-encoded as the tx hash.
    pub fn hash(&self) -> Result<[u8; 32], NearError> {
        Ok(Sha256::digest(self.to_borsh()?).into())
    }
}

/// Signs a borsh transaction and returns the borsh `SignedTransaction`.
pub fn sign_transaction(payload: &[u8], private_key: &[u8]) -> Result<Vec<u8>, NearError> {
    let tx = NearTransaction::from_borsh(payload)?;
    let key = signing_key(private_key)?;
    if key.verifying_key().to_bytes() != tx.public_key {
        return Err(NearError::SigningError(format!(
            "key does not match the access key of {}",
            tx.signer_id
        )));
    }
    let signature = key.sign(&tx.hash()?);

    let mut out = tx.to_borsh()?;
    out.push(KEY_TYPE_ED25519);
    out.extend_from_slice(&signature.to_bytes());
    Ok(out)
}

/// Splits a signed transaction and returns it with its base58 hash.
pub fn decode_signed(signed: &[u8]) -> Result<(NearTransaction, [u8; 64], String), NearError> {
    let mut r = BorshReader::new(signed);
    let tx = NearTransaction::read(&mut r)?;
    r.ed25519_tag()?;
    let signature: [u8; 64] = r.array()?;
    r.finish()?;
    let hash = bs58::encode(tx.hash()?).into_string();
    Ok((tx, signature, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::public_key_from_private;
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    const KEY: [u8; 32] = [9u8; 32];

    fn transfer() -> NearTransaction {
        let pk = public_key_from_private(&KEY).unwrap();
        NearTransaction::transfer("alice.near", pk, 42, "bob.near", [1u8; 32], 10u128.pow(24)).unwrap()
    }

    #[test]
    fn transfer_layout() {
        let tx = transfer();
        let bytes = tx.to_borsh().unwrap();
        assert_eq!(&bytes[..4], &10u32.to_le_bytes());
        assert_eq!(&bytes[4..14], b"alice.near");
        assert_eq!(bytes[14], KEY_TYPE_ED25519);
        assert_eq!(&bytes[47..55], &42u64.to_le_bytes());
        // receiver, block hash, one action tagged Transfer, u128 deposit
        let tail = &bytes[bytes.len() - 21..];
        assert_eq!(&tail[..4], &1u32.to_le_bytes());
        assert_eq!(tail[4], ACTION_TRANSFER);
        assert_eq!(&tail[5..], &10u128.pow(24).to_le_bytes());
        assert_eq!(NearTransaction::from_borsh(&bytes).unwrap(), tx);
    }

    #[test]
    fn function_call_decodes() {
        let pk = public_key_from_private(&KEY).unwrap();
        let tx = NearTransaction::new(
            "alice.near",
            pk,
            1,
            "usdt.tether-token.near",
            [2u8; 32],
            vec![Action::FunctionCall {
                method_name: "ft_transfer".into(),
                args: br#"{"receiver_id":"bob.near","amount":"5"}"#.to_vec(),
                gas: TOKEN_CALL_GAS,
                deposit: ONE_YOCTO,
            }],
        )
        .unwrap();
        assert_eq!(NearTransaction::from_borsh(&tx.to_borsh().unwrap()).unwrap(), tx);
    }

    #[test]
    fn zero_transfer_rejected() {
        let pk = public_key_from_private(&KEY).unwrap();
        let err = NearTransaction::transfer("alice.near", pk, 1, "bob.near", [0; 32], 0).unwrap_err();
        assert!(matches!(err, NearError::InvalidAmount(_)));
    }

    #[test]
    fn signature_covers_sha256_of_transaction() {
        let tx = transfer();
        let signed = sign_transaction(&tx.to_borsh().unwrap(), &KEY).unwrap();
        let (decoded, sig, hash) = decode_signed(&signed).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(hash, bs58::encode(tx.hash().unwrap()).into_string());

        let vk = VerifyingKey::from_bytes(&tx.public_key).unwrap();
        vk.verify(&tx.hash().unwrap(), &Signature::from_bytes(&sig)).unwrap();
    }

    #[test]
    fn wrong_key_cannot_sign() {
        let payload = transfer().to_borsh().unwrap();
        assert!(matches!(sign_transaction(&payload, &[8u8; 32]), Err(NearError::SigningError(_))));
    }

    #[test]
    fn unsigned_payload_is_not_a_signed_transaction() {
        let payload = transfer().to_borsh().unwrap();
        assert!(decode_signed(&payload).is_err());
        let mut trailing = payload.clone();
        trailing.push(0);
        assert!(NearTransaction::from_borsh(&trailing).is_err());
    }
}
