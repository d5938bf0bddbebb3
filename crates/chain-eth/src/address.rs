use alloy_primitives::Address;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::ecdsa::SigningKey;
use k256::PublicKey;
use sha3::{Digest, Keccak256};

use crate::error::EthError;

/// Derives the address of a secp256k1 public key, compressed (33 bytes) or
/// uncompressed (65 bytes).
///
/// The address is the last 20 bytes of keccak256 over the 64-byte point.
pub fn address_from_public_key(public_key: &[u8]) -> Result<Address, EthError> {
    let pubkey = PublicKey::from_sec1_bytes(public_key)
        .map_err(|e| EthError::InvalidPublicKey(format!("invalid sec1 encoding: {e}")))?;
    let uncompressed = pubkey.to_encoded_point(false);
    let hash = Keccak256::digest(&uncompressed.as_bytes()[1..]);
    Ok(Address::from_slice(&hash[12..]))
}

/// Compressed public key for a raw private key.
pub fn public_key_from_private(private_key: &[u8]) -> Result<Vec<u8>, EthError> {
    let signing_key = SigningKey::from_slice(private_key)
        .map_err(|e| EthError::InvalidPrivateKey(e.to_string()))?;
    Ok(signing_key
        .verifying_key()
        .to_encoded_point(true)
        .as_bytes()
        .to_vec())
}

pub fn address_from_private_key(private_key: &[u8]) -> Result<Address, EthError> {
    address_from_public_key(&public_key_from_private(private_key)?)
}

/// EIP-55 mixed-case form.
pub fn checksum(address: &Address) -> String {
    address.to_checksum(None)
}

/// Parses `0x` + 40 hex characters. All-lowercase and all-uppercase forms
/// are accepted as-is; mixed case must carry a valid EIP-55 checksum.
pub fn parse_address(address: &str) -> Result<Address, EthError> {
    let hex_part = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(|| EthError::InvalidAddress("address must start with 0x".into()))?;

    if hex_part.len() != 40 {
        return Err(EthError::InvalidAddress(format!(
            "expected 40 hex characters, got {}",
            hex_part.len()
        )));
    }

    let bytes = hex::decode(hex_part)
        .map_err(|_| EthError::InvalidAddress("address contains non-hex characters".into()))?;
    let parsed = Address::from_slice(&bytes);

    let is_all_lower = hex_part.chars().all(|c| !c.is_ascii_uppercase());
    let is_all_upper = hex_part.chars().all(|c| !c.is_ascii_lowercase());
    if is_all_lower || is_all_upper {
        return Ok(parsed);
    }

    if checksum(&parsed)[2..] != *hex_part {
        return Err(EthError::InvalidAddress(format!(
            "bad EIP-55 checksum: {address}"
        )));
    }
    Ok(parsed)
}

pub fn is_valid_address(address: &str) -> bool {
    parse_address(address).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_one() -> [u8; 32] {
        let mut key = [0u8; 32];
        key[31] = 1;
        key
    }

    #[test]
    fn eip55_checksum_known_addresses() {
        let cases = [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ];
        for expected in cases {
            let parsed = parse_address(&expected.to_lowercase()).unwrap();
            assert_eq!(checksum(&parsed), expected);
        }
    }

    #[test]
    fn accepts_single_case_forms() {
        assert!(is_valid_address("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"));
        assert!(is_valid_address("0x5AAEB6053F3E94C9B9A09F33669435E7EF1BEAED"));
        assert!(is_valid_address("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"));
    }

    #[test]
    fn rejects_bad_checksum() {
        let err = parse_address("0x5AAEB6053F3E94C9b9A09f33669435E7Ef1BeAed").unwrap_err();
        assert!(matches!(err, EthError::InvalidAddress(ref m) if m.contains("checksum")));
    }

    #[test]
    fn rejects_malformed() {
        assert!(!is_valid_address("0x5aAeb6053F"));
        assert!(!is_valid_address("5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"));
        assert!(!is_valid_address("0xGGGGb6053F3E94C9b9A09f33669435E7Ef1BeAed"));
        assert!(!is_valid_address(""));
    }

    #[test]
    fn private_key_one_known_vector() {
        let address = address_from_private_key(&key_one()).unwrap();
        assert_eq!(checksum(&address), "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf");
    }

    #[test]
    fn compressed_and_uncompressed_agree() {
        let secret = k256::SecretKey::from_slice(&key_one()).unwrap();
        let public = secret.public_key();
        let compressed = public.to_encoded_point(true);
        let uncompressed = public.to_encoded_point(false);
        assert_eq!(
            address_from_public_key(compressed.as_bytes()).unwrap(),
            address_from_public_key(uncompressed.as_bytes()).unwrap()
        );
    }

    #[test]
    fn garbage_public_key_is_rejected() {
        assert!(matches!(
            address_from_public_key(&[0x05; 33]),
            Err(EthError::InvalidPublicKey(_))
        ));
        assert!(address_from_public_key(&[]).is_err());
    }

    #[test]
    fn zero_private_key_is_rejected() {
        assert!(matches!(
            public_key_from_private(&[0u8; 32]),
            Err(EthError::InvalidPrivateKey(_))
        ));
    }
}
