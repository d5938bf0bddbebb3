use serde::{Deserialize, Serialize};

use crate::error::ChainError;

/// Transaction lifecycle as observed on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

impl TxStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxStatus::Pending)
    }
}

/// Token standards the adapters know how to encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStandard {
    /// ERC-20, SPL, NEP-141, XRPL issued currency.
    Fungible,
    /// ERC-721.
    NonFungible,
    /// ERC-1155.
    SemiFungible,
    /// ERC-1400 style regulated token.
    Partitioned,
}

/// A token transfer request.
///
/// `token` is the contract address (EVM), mint (Solana), token contract
/// account (NEAR) or `CURRENCY.issuer` (Ripple).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransfer {
    pub standard: TokenStandard,
    pub token: String,
    pub to: String,
    /// Base-unit amount. Ignored for non-fungible transfers.
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub token_id: Option<String>,
    /// Partition identifier, hex-encoded 32 bytes.
    #[serde(default)]
    pub partition: Option<String>,
}

impl TokenTransfer {
    pub fn fungible(token: impl Into<String>, to: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            standard: TokenStandard::Fungible,
            token: token.into(),
            to: to.into(),
            amount: Some(amount.into()),
            token_id: None,
            partition: None,
        }
    }

    /// Checks that every argument the standard requires is present.
    pub fn validate(&self) -> Result<(), ChainError> {
        let needs_amount = !matches!(self.standard, TokenStandard::NonFungible);
        let needs_token_id = matches!(
            self.standard,
            TokenStandard::NonFungible | TokenStandard::SemiFungible
        );

        if needs_token_id && self.token_id.as_deref().map_or(true, str::is_empty) {
            return Err(ChainError::MissingTokenId);
        }
        if self.standard == TokenStandard::Partitioned
            && self.partition.as_deref().map_or(true, str::is_empty)
        {
            return Err(ChainError::MissingPartition);
        }
        if needs_amount {
            let amount = self
                .amount
                .as_deref()
                .ok_or_else(|| ChainError::InvalidAmount("amount is required".into()))?;
            parse_base_units(amount)?;
        }
        Ok(())
    }

    /// The amount as base units, or zero when none was given.
    pub fn amount_u128(&self) -> Result<u128, ChainError> {
        match self.amount.as_deref() {
            Some(a) => parse_base_units(a),
            None => Ok(0),
        }
    }
}

/// Parses a non-negative decimal integer amount in base units.
pub fn parse_base_units(value: &str) -> Result<u128, ChainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ChainError::InvalidAmount(format!(
            "expected a decimal integer in base units, got {value:?}"
        )));
    }
    trimmed
        .parse::<u128>()
        .map_err(|e| ChainError::InvalidAmount(format!("{value}: {e}")))
}

/// Signer set and threshold of an on-chain multisig account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisigConfig {
    pub signers: Vec<String>,
    pub threshold: u32,
}

/// One signer's approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureWithSigner {
    pub signer: String,
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
}

/// How an application message is hashed before signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageEncoding {
    /// Domain-separated prefix (EIP-191 on EVM).
    Personal,
    /// 32-byte digest signed as-is.
    RawDigest,
    /// EIP-712 typed data.
    StructuredTypedData,
}

/// A message to sign, either raw bytes or EIP-712 JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum SignableMessage {
    Bytes(#[serde(with = "hex::serde")] Vec<u8>),
    TypedData(serde_json::Value),
}

impl SignableMessage {
    pub fn text(text: &str) -> Self {
        SignableMessage::Bytes(text.as_bytes().to_vec())
    }
}

/// What multisig signers must sign to approve a proposal payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub encoding: MessageEncoding,
    pub message: SignableMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(standard: TokenStandard) -> TokenTransfer {
        TokenTransfer {
            standard,
            token: "0x0000000000000000000000000000000000000001".into(),
            to: "0x0000000000000000000000000000000000000002".into(),
            amount: None,
            token_id: None,
            partition: None,
        }
    }

    #[test]
    fn nft_without_token_id_is_missing_token_id() {
        let t = transfer(TokenStandard::NonFungible);
        assert!(matches!(t.validate(), Err(ChainError::MissingTokenId)));
    }

    #[test]
    fn semi_fungible_without_token_id_is_missing_token_id() {
        let mut t = transfer(TokenStandard::SemiFungible);
        t.amount = Some("5".into());
        assert!(matches!(t.validate(), Err(ChainError::MissingTokenId)));

        t.token_id = Some(String::new());
        assert!(matches!(t.validate(), Err(ChainError::MissingTokenId)));
    }

    #[test]
    fn semi_fungible_needs_amount_too() {
        let mut t = transfer(TokenStandard::SemiFungible);
        t.token_id = Some("7".into());
        assert!(matches!(t.validate(), Err(ChainError::InvalidAmount(_))));
        t.amount = Some("2".into());
        assert!(t.validate().is_ok());
    }

    #[test]
    fn partitioned_requires_partition() {
        let mut t = transfer(TokenStandard::Partitioned);
        t.amount = Some("100".into());
        assert!(matches!(t.validate(), Err(ChainError::MissingPartition)));
    }

    #[test]
    fn nft_needs_no_amount() {
        let mut t = transfer(TokenStandard::NonFungible);
        t.token_id = Some("42".into());
        assert!(t.validate().is_ok());
        assert_eq!(t.amount_u128().unwrap(), 0);
    }

    #[test]
    fn parse_base_units_rejects_garbage() {
        assert_eq!(parse_base_units("1000").unwrap(), 1000);
        assert_eq!(parse_base_units(" 7 ").unwrap(), 7);
        assert!(parse_base_units("").is_err());
        assert!(parse_base_units("-1").is_err());
        assert!(parse_base_units("1.5").is_err());
        assert!(parse_base_units("0x10").is_err());
        assert!(parse_base_units("340282366920938463463374607431768211456").is_err());
    }

    #[test]
    fn signature_with_signer_serializes_as_hex() {
        let sig = SignatureWithSigner {
            signer: "alice".into(),
            signature: vec![0xab, 0xcd],
        };
        let json = serde_json::to_value(&sig).unwrap();
        assert_eq!(json["signature"], "abcd");
        let back: SignatureWithSigner = serde_json::from_value(json).unwrap();
        assert_eq!(back, sig);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!TxStatus::Pending.is_terminal());
        assert!(TxStatus::Confirmed.is_terminal());
        assert!(TxStatus::Failed.is_terminal());
    }
}
