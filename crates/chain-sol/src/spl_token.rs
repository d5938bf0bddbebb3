//! SPL Token instructions and associated token account (ATA) derivation.

use sha2::{Digest, Sha256};

use crate::error::SolError;
use crate::transaction::{SolAccountMeta, SolInstruction, SYSTEM_PROGRAM_ID};

/// SPL Token Program: `TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA`
pub const TOKEN_PROGRAM_ID: [u8; 32] = [
    0x06, 0xdd, 0xf6, 0xe1, 0xd7, 0x65, 0xa1, 0x93, 0xd9, 0xcb, 0xe1, 0x46, 0xce, 0xeb, 0x79, 0xac,
    0x1c, 0xb4, 0x85, 0xed, 0x5f, 0x5b, 0x37, 0x91, 0x3a, 0x8c, 0xf5, 0x85, 0x7e, 0xff, 0x00, 0xa9,
];

/// Associated Token Account Program: `ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL`
pub const ASSOCIATED_TOKEN_PROGRAM_ID: [u8; 32] = [
    0x8c, 0x97, 0x25, 0x8f, 0x4e, 0x24, 0x89, 0xf1, 0xbb, 0x3d, 0x10, 0x29, 0x14, 0x8e, 0x0d, 0x83,
    0x0b, 0x5a, 0x13, 0x99, 0xda, 0xff, 0x10, 0x84, 0x04, 0x8e, 0x7b, 0xd8, 0xdb, 0xe9, 0xf8, 0x59,
];

const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

const TOKEN_TRANSFER_IX: u8 = 3;
const ATA_CREATE_IDEMPOTENT_IX: u8 = 1;

/// SPL Token `Transfer`: `[3] ++ amount (u64 LE)`.
pub fn build_spl_transfer(
    from_token_account: &[u8; 32],
    to_token_account: &[u8; 32],
    owner: &[u8; 32],
    amount: u64,
) -> Result<SolInstruction, SolError> {
    if amount == 0 {
        return Err(SolError::InvalidAmount("SPL transfer amount must be > 0".into()));
    }

    let mut data = Vec::with_capacity(9);
    data.push(TOKEN_TRANSFER_IX);
    data.extend_from_slice(&amount.to_le_bytes());

    Ok(SolInstruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![
            SolAccountMeta::writable(*from_token_account),
            SolAccountMeta::writable(*to_token_account),
            SolAccountMeta::signer(*owner, false),
        ],
        data,
    })
}

/// ATA program `CreateIdempotent`; a no-op when the account already exists.
pub fn build_create_associated_account(
    payer: &[u8; 32],
    owner: &[u8; 32],
    mint: &[u8; 32],
) -> Result<SolInstruction, SolError> {
    let ata = derive_associated_token_address(owner, mint)?;
    Ok(SolInstruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
        accounts: vec![
            SolAccountMeta::signer(*payer, true),
            SolAccountMeta::writable(ata),
            SolAccountMeta::readonly(*owner),
            SolAccountMeta::readonly(*mint),
            SolAccountMeta::readonly(SYSTEM_PROGRAM_ID),
            SolAccountMeta::readonly(TOKEN_PROGRAM_ID),
        ],
        data: vec![ATA_CREATE_IDEMPOTENT_IX],
    })
}

/// Associated token account for a wallet + mint pair.
///
/// Seeds are `[wallet, token_program_id, mint]` under the ATA program.
pub fn derive_associated_token_address(
    wallet: &[u8; 32],
    mint: &[u8; 32],
) -> Result<[u8; 32], SolError> {
    find_program_address(
        &[wallet.as_ref(), &TOKEN_PROGRAM_ID, mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .map(|(address, _bump)| address)
}

/// Searches bumps 255..=0 for `sha256(seeds ++ bump ++ program ++ marker)`
/// that is off the Ed25519 curve.
fn find_program_address(seeds: &[&[u8]], program_id: &[u8; 32]) -> Result<([u8; 32], u8), SolError> {
    (0u8..=255)
        .rev()
        .find_map(|bump| {
            let mut hasher = Sha256::new();
            for seed in seeds {
                hasher.update(seed);
            }
            hasher.update([bump]);
            hasher.update(program_id);
            hasher.update(PDA_MARKER);
            let hash: [u8; 32] = hasher.finalize().into();
            (!is_on_curve(&hash)).then_some((hash, bump))
        })
        .ok_or_else(|| SolError::InvalidAddress("could not find valid PDA bump seed".into()))
}

fn is_on_curve(bytes: &[u8; 32]) -> bool {
    curve25519_dalek::edwards::CompressedEdwardsY(*bytes)
        .decompress()
        .is_some()
}
