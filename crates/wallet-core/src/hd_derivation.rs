use bip32::{DerivationPath, XPrv};
use chain_api::{Chain, ChainFamily, CurveType};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::error::WalletError;

type HmacSha512 = Hmac<Sha512>;

const HARDENED: u32 = 0x8000_0000;

/// Derivation path per family:
///
/// - Bitcoin: m/84'/coin'/account'/0/index (BIP-84, native SegWit)
/// - EVM:     m/44'/60'/account'/0/index (same key on every EVM chain)
/// - Ripple:  m/44'/144'/account'/0/index
/// - Solana:  m/44'/501'/account'/0' (SLIP-0010, hardened only)
/// - NEAR:    m/44'/397'/account' (SLIP-0010, hardened only)
pub fn derivation_path(chain: Chain, account: u32, index: u32) -> String {
    let coin = chain.coin_type();
    match chain.family() {
        ChainFamily::Bitcoin => format!("m/84'/{coin}'/{account}'/0/{index}"),
        ChainFamily::Evm | ChainFamily::Ripple => format!("m/44'/{coin}'/{account}'/0/{index}"),
        ChainFamily::Solana => format!("m/44'/{coin}'/{account}'/0'"),
        ChainFamily::Near => format!("m/44'/{coin}'/{account}'"),
    }
}

/// A derived private key; the bytes are wiped on drop.
pub struct DerivedKey {
    pub private_key: Zeroizing<[u8; 32]>,
    pub derivation_path: String,
}

/// Derives the private key for `chain` from a BIP-39 seed.
pub fn derive_private_key(
    seed: &[u8],
    chain: Chain,
    account: u32,
    index: u32,
) -> Result<DerivedKey, WalletError> {
    let path = derivation_path(chain, account, index);
    let private_key = match chain.curve() {
        CurveType::Secp256k1 => derive_secp256k1(seed, &path)?,
        CurveType::Ed25519 => derive_ed25519(seed, &path)?,
    };
    Ok(DerivedKey {
        private_key,
        derivation_path: path,
    })
}

fn derive_secp256k1(seed: &[u8], path: &str) -> Result<Zeroizing<[u8; 32]>, WalletError> {
    let path: DerivationPath = path
        .parse()
        .map_err(|e: bip32::Error| WalletError::DerivationFailed(e.to_string()))?;
    let xprv = XPrv::derive_from_path(seed, &path)
        .map_err(|e| WalletError::DerivationFailed(e.to_string()))?;
    Ok(Zeroizing::new(xprv.to_bytes().into()))
}

/// SLIP-0010 ed25519: every level hardened.
fn derive_ed25519(seed: &[u8], path: &str) -> Result<Zeroizing<[u8; 32]>, WalletError> {
    let (mut key, mut chain_code) = hmac_split(b"ed25519 seed", &[seed])?;

    for child in parse_derivation_path(path)? {
        let index = (child | HARDENED).to_be_bytes();
        let (k, c) = hmac_split(&chain_code[..], &[&[0x00u8][..], &key[..], &index[..]])?;
        key = k;
        chain_code = c;
    }
    Ok(key)
}

fn hmac_split(
    key: &[u8],
    parts: &[&[u8]],
) -> Result<(Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>), WalletError> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| WalletError::DerivationFailed(e.to_string()))?;
    for part in parts {
        mac.update(part);
    }
    let out = Zeroizing::new(mac.finalize().into_bytes().to_vec());
    let mut left = Zeroizing::new([0u8; 32]);
    let mut right = Zeroizing::new([0u8; 32]);
    left.copy_from_slice(&out[..32]);
    right.copy_from_slice(&out[32..]);
    Ok((left, right))
}

/// Parse "m/44'/501'/0'/0'" into [44, 501, 0, 0]
fn parse_derivation_path(path: &str) -> Result<Vec<u32>, WalletError> {
    let path = path
        .strip_prefix("m/")
        .ok_or_else(|| WalletError::DerivationFailed("path must start with m/".into()))?;

    path.split('/')
        .map(|component| {
            let digits = component.trim_end_matches(['\'', 'h']);
            digits
                .parse::<u32>()
                .ok()
                .filter(|n| *n < HARDENED)
                .ok_or_else(|| {
                    WalletError::DerivationFailed(format!("invalid path component {component:?}"))
                })
        })
        .collect()
}
