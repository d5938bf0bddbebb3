use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::WalletError;
use crate::types::{TransactionRecord, Wallet};

/// Persistence for wallet records.
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Inserts or replaces by id.
    async fn save(&self, wallet: Wallet) -> Result<(), WalletError>;

    async fn get(&self, id: Uuid) -> Result<Option<Wallet>, WalletError>;

    /// Every wallet of `owner`, oldest first.
    async fn list(&self, owner: &str) -> Result<Vec<Wallet>, WalletError>;

    /// Returns whether a record was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, WalletError>;
}

/// Persistence for transaction records.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn save(&self, record: TransactionRecord) -> Result<(), WalletError>;

    async fn get(&self, id: Uuid) -> Result<Option<TransactionRecord>, WalletError>;

    /// Newest first.
    async fn list_by_wallet(&self, wallet_id: Uuid) -> Result<Vec<TransactionRecord>, WalletError>;

    /// Replaces an existing record; fails if it was never saved.
    async fn update(&self, record: TransactionRecord) -> Result<(), WalletError>;
}

#[derive(Debug, Default)]
pub struct MemoryWalletStore {
    wallets: RwLock<HashMap<Uuid, Wallet>>,
}

impl MemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletStore for MemoryWalletStore {
    async fn save(&self, wallet: Wallet) -> Result<(), WalletError> {
        self.wallets.write().await.insert(wallet.id, wallet);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Wallet>, WalletError> {
        Ok(self.wallets.read().await.get(&id).cloned())
    }

    async fn list(&self, owner: &str) -> Result<Vec<Wallet>, WalletError> {
        let mut wallets: Vec<Wallet> = self
            .wallets
            .read()
            .await
            .values()
            .filter(|w| w.owner == owner)
            .cloned()
            .collect();
        wallets.sort_by_key(|w| (w.created_at, w.id));
        Ok(wallets)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, WalletError> {
        Ok(self.wallets.write().await.remove(&id).is_some())
    }
}

#[derive(Debug, Default)]
pub struct MemoryTransactionStore {
    records: RwLock<HashMap<Uuid, TransactionRecord>>,
}

impl MemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for MemoryTransactionStore {
    async fn save(&self, record: TransactionRecord) -> Result<(), WalletError> {
        self.records.write().await.insert(record.id, record);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<TransactionRecord>, WalletError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn list_by_wallet(&self, wallet_id: Uuid) -> Result<Vec<TransactionRecord>, WalletError> {
        let mut records: Vec<TransactionRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.wallet_id == wallet_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn update(&self, record: TransactionRecord) -> Result<(), WalletError> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.id) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(WalletError::Store(format!("transaction {} not found", record.id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WalletKind;
    use chain_api::{Chain, TxStatus};

    fn wallet(owner: &str) -> Wallet {
        Wallet::new(owner, Chain::Solana, format!("{owner}-addr"), WalletKind::SingleKey, "w")
    }

    #[tokio::test]
    async fn wallets_are_listed_per_owner() {
        let store = MemoryWalletStore::new();
        let a = wallet("alice");
        let b = wallet("bob");
        store.save(a.clone()).await.unwrap();
        store.save(b.clone()).await.unwrap();

        let listed = store.list("alice").await.unwrap();
        assert_eq!(listed, vec![a.clone()]);
        assert!(store.delete(a.id).await.unwrap());
        assert!(!store.delete(a.id).await.unwrap());
        assert!(store.get(a.id).await.unwrap().is_none());
        assert_eq!(store.get(b.id).await.unwrap(), Some(b));
    }

    #[tokio::test]
    async fn update_requires_existing_record() {
        let store = MemoryTransactionStore::new();
        let w = wallet("alice");
        let mut record = TransactionRecord::pending(&w, "dest", "5", None);
        assert!(matches!(
            store.update(record.clone()).await,
            Err(WalletError::Store(_))
        ));

        store.save(record.clone()).await.unwrap();
        record.apply_status(TxStatus::Confirmed);
        store.update(record.clone()).await.unwrap();

        let listed = store.list_by_wallet(w.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, TxStatus::Confirmed);
    }
}
