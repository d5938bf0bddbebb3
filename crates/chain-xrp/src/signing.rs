use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, VerifyingKey};
use sha2::{Digest, Sha512};

use crate::address::{account_id_from_public_key, public_key_from_private, signing_key};
use crate::codec::{Payment, PREFIX_TX_ID};
use crate::error::XrpError;

/// First 32 bytes of SHA-512.
pub fn sha512_half(data: &[u8]) -> [u8; 32] {
    let full = Sha512::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&full[..32]);
    out
}

/// Signs an unsigned Payment blob, filling `SigningPubKey` and a DER,
/// low-S `TxnSignature`. Returns the submit-ready blob.
pub fn sign_payment(payload: &[u8], private_key: &[u8]) -> Result<Vec<u8>, XrpError> {
    let mut tx = Payment::from_bytes(payload)?;
    let public_key = public_key_from_private(private_key)?;
    if account_id_from_public_key(&public_key)? != tx.account {
        return Err(XrpError::SigningError("key does not control the sending account".into()));
    }
    tx.signing_pub_key = Some(public_key);
    tx.txn_signature = None;

    let digest = sha512_half(&tx.signing_bytes()?);
    let signature: Signature = signing_key(private_key)?
        .sign_prehash(&digest)
        .map_err(|e| XrpError::SigningError(e.to_string()))?;
    let signature = signature.normalize_s().unwrap_or(signature);
    tx.txn_signature = Some(signature.to_der().as_bytes().to_vec());
    tx.to_bytes()
}

/// Decodes a signed blob, checks its signature and returns the uppercase
/// hex transaction id.
pub fn verify_signed(blob: &[u8]) -> Result<(Payment, String), XrpError> {
    let tx = Payment::from_bytes(blob)?;
    let (Some(public_key), Some(signature)) = (&tx.signing_pub_key, &tx.txn_signature) else {
        return Err(XrpError::SigningError("transaction is not signed".into()));
    };
    let key = VerifyingKey::from_sec1_bytes(public_key)
        .map_err(|e| XrpError::InvalidPublicKey(e.to_string()))?;
    let signature =
        Signature::from_der(signature).map_err(|e| XrpError::SigningError(e.to_string()))?;
    let digest = sha512_half(&tx.signing_bytes()?);
    key.verify_prehash(&digest, &signature)
        .map_err(|_| XrpError::SigningError("signature does not match".into()))?;
    if account_id_from_public_key(public_key)? != tx.account {
        return Err(XrpError::SigningError("signing key does not own the account".into()));
    }
    Ok((tx, transaction_id(blob)))
}

pub fn transaction_id(blob: &[u8]) -> String {
    let mut data = PREFIX_TX_ID.to_vec();
    data.extend_from_slice(blob);
    hex::encode_upper(sha512_half(&data))
}
