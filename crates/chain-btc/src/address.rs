use bitcoin::address::{Address, NetworkUnchecked};
use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
use bitcoin::{CompressedPublicKey, ScriptBuf};

use crate::error::BtcError;
use crate::network::BtcNetwork;

/// Derive a P2WPKH (native SegWit bech32) address from a compressed public key.
///
/// Takes a 33-byte compressed secp256k1 public key and returns a bech32 address
/// string: `bc1...` for mainnet, `tb1...` for testnet.
pub fn pubkey_to_p2wpkh_address(pubkey_bytes: &[u8], network: BtcNetwork) -> Result<String, BtcError> {
    let compressed_pk = CompressedPublicKey::from_slice(pubkey_bytes).map_err(|e| {
        BtcError::InvalidPublicKey(format!("failed to parse compressed public key: {e}"))
    })?;

    let address = Address::p2wpkh(&compressed_pk, network.to_bitcoin_network());

    Ok(address.to_string())
}

/// Compressed secp256k1 public key for a 32-byte private key.
pub fn public_key_from_private(private_key: &[u8]) -> Result<[u8; 33], BtcError> {
    let secret_key = SecretKey::from_slice(private_key)
        .map_err(|e| BtcError::InvalidPrivateKey(format!("invalid secret key: {e}")))?;
    Ok(PublicKey::from_secret_key(&Secp256k1::signing_only(), &secret_key).serialize())
}

/// Parse an address and require it to belong to `network`.
pub fn parse_address(address: &str, network: BtcNetwork) -> Result<Address, BtcError> {
    address
        .parse::<Address<NetworkUnchecked>>()
        .map_err(|e| BtcError::InvalidAddress(format!("failed to parse address: {e}")))?
        .require_network(network.to_bitcoin_network())
        .map_err(|e| BtcError::InvalidAddress(format!("{address} is not a {network} address: {e}")))
}

/// Locking script for an address on `network`.
pub fn script_pubkey(address: &str, network: BtcNetwork) -> Result<ScriptBuf, BtcError> {
    Ok(parse_address(address, network)?.script_pubkey())
}

/// Validate a Bitcoin address string for the given network.
///
/// Supports P2PKH, P2SH, P2WPKH, P2WSH, and P2TR address formats.
/// Returns `true` if the address is valid for the specified network,
/// `false` if it is valid but for a different network.
pub fn validate_address(address: &str, network: BtcNetwork) -> Result<bool, BtcError> {
    let parsed = address
        .parse::<Address<NetworkUnchecked>>()
        .map_err(|e| BtcError::InvalidAddress(format!("failed to parse address: {e}")))?;

    Ok(parsed.is_valid_for_network(network.to_bitcoin_network()))
}
