use chain_api::{Chain, ChainFamily, TxStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::keystore::SealedKey;
use crate::multisig::Proposal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletKind {
    /// Controlled by one locally sealed private key.
    SingleKey,
    /// An on-chain account requiring a threshold of signer approvals.
    MultiSignature,
    /// A contract account tracked read-only.
    SmartContract,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub owner: String,
    pub chain: Chain,
    pub address: String,
    pub kind: WalletKind,
    pub name: String,
    /// Present only for [`WalletKind::SingleKey`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sealed_key: Option<SealedKey>,
    /// Signer set of a Multi-Signature wallet, fixed at connection time.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(owner: &str, chain: Chain, address: String, kind: WalletKind, name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            chain,
            address,
            kind,
            name: name.to_string(),
            sealed_key: None,
            signers: Vec::new(),
            threshold: None,
            is_default: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_address(&self, address: &str) -> bool {
        same_address(self.chain, &self.address, address)
    }
}

/// EVM addresses compare case-insensitively (EIP-55 is only a checksum);
/// every other family's encoding is case-sensitive.
pub fn same_address(chain: Chain, a: &str, b: &str) -> bool {
    match chain.family() {
        ChainFamily::Evm => a.eq_ignore_ascii_case(b),
        _ => a == b,
    }
}

/// Canonical form of an address for set membership.
pub fn normalize_address(chain: Chain, address: &str) -> String {
    match chain.family() {
        ChainFamily::Evm => address.to_ascii_lowercase(),
        _ => address.to_string(),
    }
}

/// A send requested through the Wallet Manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    pub to: String,
    /// Base units of the chain's native asset.
    pub value: String,
    #[serde(default, with = "optional_hex", skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
}

impl SendRequest {
    pub fn new(to: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            value: value.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub chain: Chain,
    pub from: String,
    pub to: String,
    pub value: String,
    #[serde(default, with = "optional_hex", skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
    /// Token reference for token transfers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub status: TxStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn pending(wallet: &Wallet, to: &str, value: &str, data: Option<Vec<u8>>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            wallet_id: wallet.id,
            chain: wallet.chain,
            from: wallet.address.clone(),
            to: to.to_string(),
            value: value.to_string(),
            data,
            token: None,
            status: TxStatus::Pending,
            tx_hash: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the record to `status`. Terminal records never change; returns
    /// whether anything was updated.
    pub fn apply_status(&mut self, status: TxStatus) -> bool {
        if self.status.is_terminal() || self.status == status {
            return false;
        }
        self.status = status;
        self.updated_at = Utc::now();
        true
    }

    pub fn fail(&mut self, reason: String) {
        if self.apply_status(TxStatus::Failed) {
            self.error = Some(reason);
        }
    }
}

/// Result of a send: an on-chain submission, or a proposal for a
/// Multi-Signature wallet.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    Submitted(TransactionRecord),
    Proposed(Proposal),
}

impl SendOutcome {
    pub fn transaction(&self) -> Option<&TransactionRecord> {
        match self {
            SendOutcome::Submitted(record) => Some(record),
            SendOutcome::Proposed(_) => None,
        }
    }

    pub fn proposal(&self) -> Option<&Proposal> {
        match self {
            SendOutcome::Proposed(proposal) => Some(proposal),
            SendOutcome::Submitted(_) => None,
        }
    }
}

mod optional_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => s.serialize_str(&hex::encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|s| hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet() -> Wallet {
        Wallet::new(
            "alice",
            Chain::Ethereum,
            "0x9858EfFD232B4033E47d90003D41EC34EcaEda94".into(),
            WalletKind::SingleKey,
            "main",
        )
    }

    #[test]
    fn terminal_records_are_immutable() {
        let mut record = TransactionRecord::pending(&wallet(), "0xdead", "1", None);
        assert!(record.apply_status(TxStatus::Confirmed));
        assert!(!record.apply_status(TxStatus::Failed));
        assert_eq!(record.status, TxStatus::Confirmed);

        record.fail("late".into());
        assert_eq!(record.status, TxStatus::Confirmed);
        assert!(record.error.is_none());
    }

    #[test]
    fn evm_addresses_compare_case_insensitively() {
        let w = wallet();
        assert!(w.has_address("0x9858effd232b4033e47d90003d41ec34ecaeda94"));
        assert!(!same_address(Chain::Solana, "AbC", "abc"));
        assert_eq!(normalize_address(Chain::Polygon, "0xAbC"), "0xabc");
        assert_eq!(normalize_address(Chain::Ripple, "rAbC"), "rAbC");
    }

    #[test]
    fn record_data_serializes_as_hex() {
        let record = TransactionRecord::pending(&wallet(), "0xdead", "1", Some(vec![0xa9, 0x05]));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["data"], "a905");
        assert_eq!(json["status"], "pending");
        let back: TransactionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn wallet_without_key_omits_sealed_key() {
        let mut w = wallet();
        w.kind = WalletKind::SmartContract;
        let json = serde_json::to_value(&w).unwrap();
        assert!(json.get("sealed_key").is_none());
        assert_eq!(json["kind"], "smart_contract");
    }
}
