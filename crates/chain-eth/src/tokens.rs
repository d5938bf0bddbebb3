//! Calldata encoders for the token standards the wallet can move.

use alloy_primitives::{Address, U256};
use chain_api::{ChainError, TokenStandard, TokenTransfer};

use crate::abi::{encode_call, AbiParam};
use crate::address::parse_address;
use crate::error::EthError;

/// Parses a decimal base-unit amount into a uint256.
pub fn parse_amount(value: &str) -> Result<U256, EthError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(EthError::InvalidAmount(format!(
            "expected a decimal integer, got {value:?}"
        )));
    }
    U256::from_str_radix(trimmed, 10).map_err(|e| EthError::InvalidAmount(format!("{value}: {e}")))
}

/// ERC-20 `transfer(address,uint256)`.
pub fn encode_erc20_transfer(to: Address, amount: U256) -> Vec<u8> {
    encode_call(
        "transfer(address,uint256)",
        &[AbiParam::Address(to), AbiParam::Uint(amount)],
    )
}

/// ERC-20 / ERC-721 `balanceOf(address)`.
pub fn encode_balance_of(owner: Address) -> Vec<u8> {
    encode_call("balanceOf(address)", &[AbiParam::Address(owner)])
}

/// ERC-721 `safeTransferFrom(address,address,uint256)`.
pub fn encode_erc721_transfer(from: Address, to: Address, token_id: U256) -> Vec<u8> {
    encode_call(
        "safeTransferFrom(address,address,uint256)",
        &[
            AbiParam::Address(from),
            AbiParam::Address(to),
            AbiParam::Uint(token_id),
        ],
    )
}

/// ERC-1155 `safeTransferFrom(address,address,uint256,uint256,bytes)`.
pub fn encode_erc1155_transfer(
    from: Address,
    to: Address,
    id: U256,
    amount: U256,
    data: Vec<u8>,
) -> Vec<u8> {
    encode_call(
        "safeTransferFrom(address,address,uint256,uint256,bytes)",
        &[
            AbiParam::Address(from),
            AbiParam::Address(to),
            AbiParam::Uint(id),
            AbiParam::Uint(amount),
            AbiParam::Bytes(data),
        ],
    )
}

/// ERC-1400 `transferByPartition(bytes32,address,uint256,bytes)`.
pub fn encode_partition_transfer(
    partition: [u8; 32],
    to: Address,
    amount: U256,
    data: Vec<u8>,
) -> Vec<u8> {
    encode_call(
        "transferByPartition(bytes32,address,uint256,bytes)",
        &[
            AbiParam::FixedBytes(partition.to_vec()),
            AbiParam::Address(to),
            AbiParam::Uint(amount),
            AbiParam::Bytes(data),
        ],
    )
}

/// Partition ids are given as 32-byte hex, or as a short ASCII label that
/// is right-padded (the usual `bytes32("default")` convention).
pub fn parse_partition(partition: &str) -> Result<[u8; 32], EthError> {
    let stripped = partition.strip_prefix("0x").unwrap_or(partition);
    if stripped.len() == 64 {
        let bytes = hex::decode(stripped)
            .map_err(|e| EthError::EncodingError(format!("partition: {e}")))?;
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        return Ok(out);
    }
    if partition.is_empty() || partition.len() > 32 || !partition.is_ascii() {
        return Err(EthError::EncodingError(format!(
            "partition must be 32-byte hex or a short ascii label: {partition:?}"
        )));
    }
    let mut out = [0u8; 32];
    out[..partition.len()].copy_from_slice(partition.as_bytes());
    Ok(out)
}

/// Returns `(contract, calldata)` for a token transfer sent from `from`.
pub fn encode_token_transfer(
    from: Address,
    transfer: &TokenTransfer,
) -> Result<(Address, Vec<u8>), ChainError> {
    transfer.validate()?;
    let contract = parse_address(&transfer.token)?;
    let to = parse_address(&transfer.to)?;
    let amount = || parse_amount(transfer.amount.as_deref().unwrap_or_default());
    let token_id = || {
        transfer
            .token_id
            .as_deref()
            .ok_or(ChainError::MissingTokenId)
            .and_then(|id| parse_amount(id).map_err(ChainError::from))
    };

    let calldata = match transfer.standard {
        TokenStandard::Fungible => encode_erc20_transfer(to, amount()?),
        TokenStandard::NonFungible => encode_erc721_transfer(from, to, token_id()?),
        TokenStandard::SemiFungible => {
            encode_erc1155_transfer(from, to, token_id()?, amount()?, Vec::new())
        }
        TokenStandard::Partitioned => {
            let partition = transfer
                .partition
                .as_deref()
                .ok_or(ChainError::MissingPartition)?;
            encode_partition_transfer(parse_partition(partition)?, to, amount()?, Vec::new())
        }
    };
    Ok((contract, calldata))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";
    const BOB: &str = "0x000000000000000000000000000000000000b0b0";

    fn alice() -> Address {
        Address::repeat_byte(0xaa)
    }

    #[test]
    fn erc20_transfer_layout() {
        let data = encode_erc20_transfer(parse_address(BOB).unwrap(), U256::from(1_000_000u64));
        assert_eq!(hex::encode(&data[..4]), "a9059cbb");
        assert_eq!(data.len(), 68);
        assert_eq!(&data[34..36], &[0xb0, 0xb0]);
    }

    #[test]
    fn erc721_uses_three_argument_safe_transfer() {
        let mut t = TokenTransfer::fungible(TOKEN, BOB, "0");
        t.standard = TokenStandard::NonFungible;
        t.amount = None;
        t.token_id = Some("42".into());
        let (contract, data) = encode_token_transfer(alice(), &t).unwrap();
        assert_eq!(contract, parse_address(TOKEN).unwrap());
        assert_eq!(hex::encode(&data[..4]), "42842e0e");
        assert_eq!(data.len(), 4 + 96);
        assert_eq!(data[4 + 95], 42);
    }

    #[test]
    fn erc1155_carries_id_amount_and_empty_data() {
        let mut t = TokenTransfer::fungible(TOKEN, BOB, "5");
        t.standard = TokenStandard::SemiFungible;
        t.token_id = Some("7".into());
        let (_, data) = encode_token_transfer(alice(), &t).unwrap();
        assert_eq!(hex::encode(&data[..4]), "f242432a");
        // 5 head words + empty bytes length word
        assert_eq!(data.len(), 4 + 6 * 32);
    }

    #[test]
    fn missing_token_id_is_an_error_not_a_zero_transfer() {
        let mut t = TokenTransfer::fungible(TOKEN, BOB, "5");
        t.standard = TokenStandard::SemiFungible;
        assert!(matches!(
            encode_token_transfer(alice(), &t),
            Err(ChainError::MissingTokenId)
        ));
    }

    #[test]
    fn partition_transfer_selector_and_label() {
        let mut t = TokenTransfer::fungible(TOKEN, BOB, "100");
        t.standard = TokenStandard::Partitioned;
        t.partition = Some("locked".into());
        let (_, data) = encode_token_transfer(alice(), &t).unwrap();
        assert_eq!(hex::encode(&data[..4]), "f3d490db");
        assert_eq!(&data[4..10], b"locked");
    }

    #[test]
    fn partition_hex_form() {
        let hex_id = format!("0x{}", "11".repeat(32));
        assert_eq!(parse_partition(&hex_id).unwrap(), [0x11; 32]);
        assert!(parse_partition("").is_err());
        assert!(parse_partition(&"x".repeat(33)).is_err());
    }

    #[test]
    fn bad_recipient_is_invalid_address() {
        let t = TokenTransfer::fungible(TOKEN, "bob", "1");
        assert!(matches!(
            encode_token_transfer(alice(), &t),
            Err(ChainError::InvalidAddress(_))
        ));
    }

    #[test]
    fn parse_amount_handles_uint256_range() {
        let max = "115792089237316195423570985008687907853269984665640564039457584007913129639935";
        assert_eq!(parse_amount(max).unwrap(), U256::MAX);
        assert!(parse_amount("-1").is_err());
        assert!(parse_amount("1e18").is_err());
    }
}
