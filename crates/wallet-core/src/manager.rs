//! Top-level wallet façade.
//!
//! Every public operation runs an inner step and then reports its outcome
//! to the audit sink, so failures are recorded before they reach the caller.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chain_api::{
    await_confirmation, Chain, ChainAdapter, ChainError, ChainFamily, ConfirmationPolicy,
    FeePriority, FeeSuggestion, MessageEncoding, SignableMessage, SignatureWithSigner,
    TokenTransfer, TxStatus,
};
use serde_json::{json, Value};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::audit::{AuditEvent, AuditSink, TracingAuditSink};
use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::hd_derivation::derive_private_key;
use crate::keystore::{KeyCustody, LocalKeystore};
use crate::mnemonic::{generate_mnemonic, mnemonic_to_seed};
use crate::multisig::{MultisigCoordinator, Proposal};
use crate::registry::HandlerRegistry;
use crate::signer::{MessageSigner, Verification};
use crate::store::{MemoryTransactionStore, MemoryWalletStore, TransactionStore, WalletStore};
use crate::types::{same_address, SendOutcome, SendRequest, TransactionRecord, Wallet, WalletKind};

/// A freshly generated wallet and the mnemonic that backs it.
///
/// The mnemonic is handed out once and never stored.
pub struct CreatedWallet {
    pub wallet: Wallet,
    pub mnemonic: Zeroizing<String>,
}

impl fmt::Debug for CreatedWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatedWallet")
            .field("wallet", &self.wallet)
            .field("mnemonic", &"<redacted>")
            .finish()
    }
}

pub struct WalletManager {
    registry: Arc<HandlerRegistry>,
    wallets: Arc<dyn WalletStore>,
    transactions: Arc<dyn TransactionStore>,
    audit: Arc<dyn AuditSink>,
    custody: Arc<dyn KeyCustody>,
    multisig: Arc<MultisigCoordinator>,
    signer: MessageSigner,
    confirmation: ConfirmationPolicy,
    proposal_ttl_secs: Option<u64>,
    /// Serializes changes to one owner's wallet set.
    owner_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl WalletManager {
    /// In-memory stores, tracing audit, local keystore with default KDF.
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
        Self {
            multisig: Arc::new(MultisigCoordinator::new(registry.clone(), audit.clone())),
            registry,
            wallets: Arc::new(MemoryWalletStore::new()),
            transactions: Arc::new(MemoryTransactionStore::new()),
            audit,
            custody: Arc::new(LocalKeystore::default()),
            signer: MessageSigner,
            confirmation: ConfirmationPolicy::default(),
            proposal_ttl_secs: None,
            owner_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &WalletConfig) -> Result<Self, WalletError> {
        let registry = Arc::new(HandlerRegistry::from_config(config)?);
        Ok(Self::new(registry)
            .with_custody(Arc::new(LocalKeystore::new(config.keystore)?))
            .with_confirmation(config.confirmation)
            .with_proposal_ttl(config.multisig.proposal_ttl_secs))
    }

    pub fn with_wallet_store(mut self, store: Arc<dyn WalletStore>) -> Self {
        self.wallets = store;
        self
    }

    pub fn with_transaction_store(mut self, store: Arc<dyn TransactionStore>) -> Self {
        self.transactions = store;
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self.rebuild_coordinator();
        self
    }

    pub fn with_custody(mut self, custody: Arc<dyn KeyCustody>) -> Self {
        self.custody = custody;
        self
    }

    pub fn with_confirmation(mut self, confirmation: ConfirmationPolicy) -> Self {
        self.confirmation = confirmation;
        self
    }

    pub fn with_proposal_ttl(mut self, ttl_secs: Option<u64>) -> Self {
        self.proposal_ttl_secs = ttl_secs;
        self.rebuild_coordinator();
        self
    }

    fn rebuild_coordinator(&mut self) {
        self.multisig = Arc::new(
            MultisigCoordinator::new(self.registry.clone(), self.audit.clone())
                .with_proposal_ttl(self.proposal_ttl_secs),
        );
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    async fn audited<T>(
        &self,
        action: &str,
        entity_type: &str,
        entity_id: String,
        details: Value,
        result: Result<T, WalletError>,
    ) -> Result<T, WalletError> {
        match &result {
            Ok(_) => {
                self.audit
                    .record(AuditEvent::success(action, entity_type, entity_id).with_details(details))
                    .await
            }
            Err(err) => self.record_failure(action, entity_type, entity_id, details, err).await,
        }
        result
    }

    /// Like [`Self::audited`] for reads: only failures are recorded.
    async fn audited_read<T>(
        &self,
        action: &str,
        entity_type: &str,
        entity_id: String,
        details: Value,
        result: Result<T, WalletError>,
    ) -> Result<T, WalletError> {
        if let Err(err) = &result {
            self.record_failure(action, entity_type, entity_id, details, err).await;
        }
        result
    }

    async fn record_failure(
        &self,
        action: &str,
        entity_type: &str,
        entity_id: String,
        details: Value,
        err: &WalletError,
    ) {
        warn!(action, entity = %entity_id, code = err.code(), error = %err, "operation failed");
        self.audit
            .record(
                AuditEvent::failed(action, entity_type, entity_id)
                    .with_details(details)
                    .with_error(err),
            )
            .await;
    }

    async fn lock_owner(&self, owner: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .owner_locks
            .lock()
            .await
            .entry(owner.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    async fn load_wallet(&self, owner: &str, id: Uuid) -> Result<Wallet, WalletError> {
        self.wallets
            .get(id)
            .await?
            .filter(|w| w.owner == owner)
            .ok_or_else(|| WalletError::WalletNotFound(id.to_string()))
    }

    /// Runs `f` on a blocking thread with the wallet's decrypted key. The key
    /// is wiped when `f` returns.
    async fn with_private_key<T, F>(
        &self,
        wallet: &Wallet,
        passphrase: &str,
        f: F,
    ) -> Result<T, WalletError>
    where
        T: Send + 'static,
        F: FnOnce(&[u8]) -> Result<T, WalletError> + Send + 'static,
    {
        let sealed = wallet.sealed_key.clone().ok_or_else(|| {
            WalletError::UnsupportedOperation(format!("wallet {} holds no key", wallet.id))
        })?;
        let custody = self.custody.clone();
        let passphrase = Zeroizing::new(passphrase.to_string());
        tokio::task::spawn_blocking(move || {
            let key = custody.open(&sealed, &passphrase)?;
            f(key.expose())
        })
        .await
        .map_err(|e| WalletError::Internal(format!("key task: {e}")))?
    }

    /// Duplicate check and save run under the owner's lock.
    async fn insert_wallet(&self, mut wallet: Wallet) -> Result<Wallet, WalletError> {
        let _guard = self.lock_owner(&wallet.owner).await;
        let existing = self.wallets.list(&wallet.owner).await?;
        if existing
            .iter()
            .any(|w| w.chain == wallet.chain && same_address(w.chain, &w.address, &wallet.address))
        {
            return Err(WalletError::DuplicateWallet(wallet.address));
        }
        wallet.is_default = !existing.iter().any(|w| w.chain == wallet.chain);
        self.wallets.save(wallet.clone()).await?;
        info!(wallet = %wallet.id, chain = %wallet.chain, kind = ?wallet.kind, "wallet stored");
        Ok(wallet)
    }

    async fn insert_single_key(
        &self,
        owner: &str,
        chain: Chain,
        name: &str,
        private_key: Zeroizing<Vec<u8>>,
        passphrase: &str,
    ) -> Result<Wallet, WalletError> {
        let adapter = self.registry.adapter(chain)?;
        let public_key = adapter.public_key_from_private(&private_key)?;
        let address = adapter.generate_address(&public_key)?;

        // Fails fast before the seal; `insert_wallet` checks again under the lock.
        let existing = self.wallets.list(owner).await?;
        if existing
            .iter()
            .any(|w| w.chain == chain && same_address(chain, &w.address, &address))
        {
            return Err(WalletError::DuplicateWallet(address));
        }

        let custody = self.custody.clone();
        let passphrase = Zeroizing::new(passphrase.to_string());
        let sealed = tokio::task::spawn_blocking(move || custody.seal(&private_key, &passphrase))
            .await
            .map_err(|e| WalletError::Internal(format!("seal task: {e}")))??;

        let mut wallet = Wallet::new(owner, chain, address, WalletKind::SingleKey, name);
        wallet.sealed_key = Some(sealed);
        self.insert_wallet(wallet).await
    }

    /// Generates a Single-Key wallet from a new 24-word mnemonic.
    pub async fn create_wallet(
        &self,
        owner: &str,
        chain: Chain,
        name: &str,
        passphrase: &str,
    ) -> Result<CreatedWallet, WalletError> {
        let result = async {
            let mnemonic = generate_mnemonic()?;
            let seed = mnemonic_to_seed(&mnemonic, "")?;
            let derived = derive_private_key(&seed[..], chain, 0, 0)?;
            let key = Zeroizing::new(derived.private_key.to_vec());
            let wallet = self.insert_single_key(owner, chain, name, key, passphrase).await?;
            info!(wallet = %wallet.id, path = %derived.derivation_path, "wallet created");
            Ok::<_, WalletError>(CreatedWallet { wallet, mnemonic })
        }
        .await;
        let id = result
            .as_ref()
            .map(|c| c.wallet.id.to_string())
            .unwrap_or_else(|_| owner.to_string());
        self.audited("wallet.create", "wallet", id, json!({ "chain": chain }), result)
            .await
    }

    /// Imports a raw 32-byte hex private key, with or without `0x`.
    pub async fn import_wallet(
        &self,
        owner: &str,
        chain: Chain,
        name: &str,
        private_key_hex: &str,
        passphrase: &str,
    ) -> Result<Wallet, WalletError> {
        let result = async {
            let trimmed = private_key_hex.trim();
            let digits = trimmed
                .strip_prefix("0x")
                .or_else(|| trimmed.strip_prefix("0X"))
                .unwrap_or(trimmed);
            let key = Zeroizing::new(
                hex::decode(digits)
                    .map_err(|_| WalletError::InvalidKeyEncoding("private key is not hex".into()))?,
            );
            if key.len() != 32 {
                return Err(WalletError::InvalidKeyEncoding(format!(
                    "expected 32 bytes, got {}",
                    key.len()
                )));
            }
            self.insert_single_key(owner, chain, name, key, passphrase).await
        }
        .await;
        let id = entity_id(&result, owner);
        self.audited("wallet.import", "wallet", id, json!({ "chain": chain }), result)
            .await
    }

    /// Connects an on-chain multisig account and records its signer set.
    pub async fn connect_multisig_wallet(
        &self,
        owner: &str,
        chain: Chain,
        name: &str,
        reference: &str,
    ) -> Result<Wallet, WalletError> {
        let result = async {
            let adapter = self.registry.adapter(chain)?;
            if !adapter.is_valid_address(reference) {
                return Err(WalletError::InvalidAddress(reference.to_string()));
            }
            let config = adapter.fetch_multisig_config(reference).await?;
            let signers = config.signers.len();
            if config.threshold == 0 || config.threshold as usize > signers {
                return Err(WalletError::ThresholdNotMet {
                    have: signers,
                    need: config.threshold,
                });
            }
            let mut wallet = Wallet::new(
                owner,
                chain,
                reference.to_string(),
                WalletKind::MultiSignature,
                name,
            );
            wallet.signers = config.signers;
            wallet.threshold = Some(config.threshold);
            self.insert_wallet(wallet).await
        }
        .await;
        let id = entity_id(&result, owner);
        self.audited(
            "wallet.connect",
            "wallet",
            id,
            json!({ "chain": chain, "reference": reference }),
            result,
        )
        .await
    }

    /// Adds a watch-only Smart-Contract wallet.
    pub async fn watch_wallet(
        &self,
        owner: &str,
        chain: Chain,
        name: &str,
        address: &str,
    ) -> Result<Wallet, WalletError> {
        let result = async {
            let adapter = self.registry.adapter(chain)?;
            if !adapter.is_valid_address(address) {
                return Err(WalletError::InvalidAddress(address.to_string()));
            }
            let wallet = Wallet::new(
                owner,
                chain,
                address.to_string(),
                WalletKind::SmartContract,
                name,
            );
            self.insert_wallet(wallet).await
        }
        .await;
        let id = entity_id(&result, owner);
        self.audited("wallet.watch", "wallet", id, json!({ "chain": chain }), result)
            .await
    }

    pub async fn list_wallets(&self, owner: &str) -> Result<Vec<Wallet>, WalletError> {
        self.wallets.list(owner).await
    }

    pub async fn get_wallet(&self, owner: &str, id: Uuid) -> Result<Wallet, WalletError> {
        self.load_wallet(owner, id).await
    }

    pub async fn rename_wallet(
        &self,
        owner: &str,
        id: Uuid,
        name: &str,
    ) -> Result<Wallet, WalletError> {
        let result = async {
            let mut wallet = self.load_wallet(owner, id).await?;
            wallet.name = name.to_string();
            wallet.updated_at = chrono::Utc::now();
            self.wallets.save(wallet.clone()).await?;
            Ok::<_, WalletError>(wallet)
        }
        .await;
        self.audited("wallet.rename", "wallet", id.to_string(), json!({ "name": name }), result)
            .await
    }

    /// Makes `id` the default for its chain.
    pub async fn set_default_wallet(&self, owner: &str, id: Uuid) -> Result<Wallet, WalletError> {
        let result = async {
            let _guard = self.lock_owner(owner).await;
            let target = self.load_wallet(owner, id).await?;
            let mut selected = target.clone();
            for mut wallet in self.wallets.list(owner).await? {
                if wallet.chain != target.chain {
                    continue;
                }
                let is_default = wallet.id == id;
                if wallet.is_default != is_default {
                    wallet.is_default = is_default;
                    wallet.updated_at = chrono::Utc::now();
                    self.wallets.save(wallet.clone()).await?;
                }
                if is_default {
                    selected = wallet;
                }
            }
            Ok::<_, WalletError>(selected)
        }
        .await;
        self.audited("wallet.set_default", "wallet", id.to_string(), Value::Null, result)
            .await
    }

    /// Removes a wallet. Deleting the default promotes the oldest remaining
    /// wallet on that chain.
    pub async fn delete_wallet(&self, owner: &str, id: Uuid) -> Result<(), WalletError> {
        let result = async {
            let _guard = self.lock_owner(owner).await;
            let wallet = self.load_wallet(owner, id).await?;
            self.wallets.delete(id).await?;
            if wallet.is_default {
                let next = self
                    .wallets
                    .list(owner)
                    .await?
                    .into_iter()
                    .find(|w| w.chain == wallet.chain);
                if let Some(mut next) = next {
                    next.is_default = true;
                    next.updated_at = chrono::Utc::now();
                    self.wallets.save(next).await?;
                }
            }
            info!(wallet = %id, chain = %wallet.chain, "wallet deleted");
            Ok::<_, WalletError>(())
        }
        .await;
        self.audited("wallet.delete", "wallet", id.to_string(), Value::Null, result)
            .await
    }

    pub async fn get_balance(&self, owner: &str, id: Uuid) -> Result<String, WalletError> {
        let result = async {
            let wallet = self.load_wallet(owner, id).await?;
            let adapter = self.registry.adapter(wallet.chain)?;
            Ok::<_, WalletError>(adapter.get_balance(&wallet.address).await?)
        }
        .await;
        self.audited_read("wallet.balance", "wallet", id.to_string(), Value::Null, result)
            .await
    }

    pub async fn get_token_balance(
        &self,
        owner: &str,
        id: Uuid,
        token: &str,
    ) -> Result<String, WalletError> {
        let result = async {
            let wallet = self.load_wallet(owner, id).await?;
            let adapter = self.registry.adapter(wallet.chain)?;
            Ok::<_, WalletError>(adapter.get_token_balance(&wallet.address, token).await?)
        }
        .await;
        self.audited_read(
            "wallet.token_balance",
            "wallet",
            id.to_string(),
            json!({ "token": token }),
            result,
        )
        .await
    }

    /// Sends native value.
    ///
    /// Single-Key wallets sign and broadcast, then wait for one confirmation.
    /// Multi-Signature wallets always produce a proposal.
    pub async fn send_transaction(
        &self,
        owner: &str,
        id: Uuid,
        request: SendRequest,
        passphrase: &str,
    ) -> Result<SendOutcome, WalletError> {
        let details = json!({ "to": request.to, "value": request.value });
        let result = self.send_inner(owner, id, request, passphrase).await;
        self.audited("wallet.send", "wallet", id.to_string(), details, result)
            .await
    }

    async fn send_inner(
        &self,
        owner: &str,
        id: Uuid,
        request: SendRequest,
        passphrase: &str,
    ) -> Result<SendOutcome, WalletError> {
        let wallet = self.load_wallet(owner, id).await?;
        let adapter = self.registry.adapter(wallet.chain)?;
        if !adapter.is_valid_address(&request.to) {
            return Err(WalletError::InvalidAddress(request.to));
        }

        match wallet.kind {
            WalletKind::SmartContract => Err(watch_only(&wallet)),
            WalletKind::MultiSignature => {
                let payload = adapter
                    .propose_multisig_transaction(
                        &wallet.address,
                        &request.to,
                        &request.value,
                        request.data.as_deref(),
                    )
                    .await?;
                let proposal = self.multisig.create(&wallet, payload).await?;
                Ok(SendOutcome::Proposed(proposal))
            }
            WalletKind::SingleKey => {
                let payload = adapter
                    .propose_transaction(
                        &wallet.address,
                        &request.to,
                        &request.value,
                        request.data.as_deref(),
                    )
                    .await?;
                let signed = self.sign_payload(&wallet, adapter.clone(), payload, passphrase).await?;
                let record =
                    TransactionRecord::pending(&wallet, &request.to, &request.value, request.data);
                let record = self.submit(adapter, record, signed).await?;
                Ok(SendOutcome::Submitted(record))
            }
        }
    }

    /// Sends a token per its declared standard.
    ///
    /// Multi-Signature token transfers are proposed as contract calls, which
    /// only EVM Safe accounts support.
    pub async fn transfer_token(
        &self,
        owner: &str,
        id: Uuid,
        transfer: TokenTransfer,
        passphrase: &str,
    ) -> Result<SendOutcome, WalletError> {
        let details = json!({
            "token": transfer.token,
            "standard": transfer.standard,
            "to": transfer.to,
        });
        let result = self.transfer_inner(owner, id, transfer, passphrase).await;
        self.audited("wallet.transfer_token", "wallet", id.to_string(), details, result)
            .await
    }

    async fn transfer_inner(
        &self,
        owner: &str,
        id: Uuid,
        transfer: TokenTransfer,
        passphrase: &str,
    ) -> Result<SendOutcome, WalletError> {
        transfer.validate()?;
        let wallet = self.load_wallet(owner, id).await?;
        let adapter = self.registry.adapter(wallet.chain)?;
        if !adapter.is_valid_address(&transfer.to) {
            return Err(WalletError::InvalidAddress(transfer.to));
        }

        match wallet.kind {
            WalletKind::SmartContract => Err(watch_only(&wallet)),
            WalletKind::MultiSignature => {
                if wallet.chain.family() != ChainFamily::Evm {
                    return Err(WalletError::UnsupportedOperation(format!(
                        "multisig token transfers on {}",
                        wallet.chain
                    )));
                }
                let from = chain_eth::address::parse_address(&wallet.address)
                    .map_err(ChainError::from)?;
                let (contract, calldata) = chain_eth::tokens::encode_token_transfer(from, &transfer)?;
                let payload = adapter
                    .propose_multisig_transaction(
                        &wallet.address,
                        &chain_eth::address::checksum(&contract),
                        "0",
                        Some(&calldata),
                    )
                    .await?;
                let proposal = self.multisig.create(&wallet, payload).await?;
                Ok(SendOutcome::Proposed(proposal))
            }
            WalletKind::SingleKey => {
                let payload = adapter.propose_token_transfer(&wallet.address, &transfer).await?;
                let signed = self.sign_payload(&wallet, adapter.clone(), payload, passphrase).await?;
                let value = transfer.amount.clone().unwrap_or_else(|| "0".into());
                let mut record = TransactionRecord::pending(&wallet, &transfer.to, &value, None);
                record.token = Some(transfer.token);
                let record = self.submit(adapter, record, signed).await?;
                Ok(SendOutcome::Submitted(record))
            }
        }
    }

    async fn sign_payload(
        &self,
        wallet: &Wallet,
        adapter: Arc<dyn ChainAdapter>,
        payload: Vec<u8>,
        passphrase: &str,
    ) -> Result<Vec<u8>, WalletError> {
        self.with_private_key(wallet, passphrase, move |key| {
            Ok(adapter.sign_transaction(&payload, key)?)
        })
        .await
    }

    /// Broadcasts on a spawned task that also persists the record, so the
    /// submission completes even if the caller is cancelled. Then waits for
    /// one confirmation.
    async fn submit(
        &self,
        adapter: Arc<dyn ChainAdapter>,
        mut record: TransactionRecord,
        signed: Vec<u8>,
    ) -> Result<TransactionRecord, WalletError> {
        let transactions = self.transactions.clone();
        let audit = self.audit.clone();
        let broadcaster = adapter.clone();

        let task = tokio::spawn(async move {
            let result = broadcaster
                .execute_transaction(&record.from, &signed, &[])
                .await;
            let event = match &result {
                Ok(hash) => {
                    record.tx_hash = Some(hash.clone());
                    info!(record = %record.id, chain = %record.chain, tx_hash = %hash, bytes = signed.len(), "transaction broadcast");
                    AuditEvent::success("transaction.broadcast", "transaction", record.id)
                        .with_details(json!({ "tx_hash": hash, "chain": record.chain }))
                }
                Err(err) => {
                    record.fail(err.to_string());
                    error!(record = %record.id, chain = %record.chain, error = %err, "broadcast failed");
                    AuditEvent::failed("transaction.broadcast", "transaction", record.id)
                        .with_details(json!({ "chain": record.chain, "error": err.to_string() }))
                }
            };
            let saved = transactions.save(record.clone()).await;
            audit.record(event).await;
            saved.map(|_| (record, result))
        });

        let (mut record, result) = task
            .await
            .map_err(|e| WalletError::Internal(format!("broadcast task: {e}")))??;
        let tx_hash = result?;

        match await_confirmation(adapter.as_ref(), &tx_hash, &self.confirmation).await {
            Ok(status) => {
                if record.apply_status(status) {
                    self.transactions.update(record.clone()).await?;
                }
            }
            Err(err) => warn!(record = %record.id, %tx_hash, error = %err, "confirmation poll failed"),
        }
        Ok(record)
    }

    /// Fee suggestion for `priority`, reused briefly across callers.
    pub async fn estimate_fee(
        &self,
        chain: Chain,
        priority: FeePriority,
    ) -> Result<FeeSuggestion, WalletError> {
        let result = self.registry.estimate_fee(chain, priority).await;
        self.audited_read(
            "fee.estimate",
            "chain",
            chain.to_string(),
            json!({ "priority": priority }),
            result,
        )
        .await
    }

    /// Signs an application message with a Single-Key wallet.
    pub async fn sign_message(
        &self,
        owner: &str,
        id: Uuid,
        message: SignableMessage,
        encoding: MessageEncoding,
        passphrase: &str,
    ) -> Result<Vec<u8>, WalletError> {
        let result = async {
            let wallet = self.load_wallet(owner, id).await?;
            if wallet.kind != WalletKind::SingleKey {
                return Err(WalletError::UnsupportedOperation(format!(
                    "wallet {} cannot sign messages",
                    wallet.id
                )));
            }
            let signer = self.signer;
            let chain = wallet.chain;
            self.with_private_key(&wallet, passphrase, move |key| {
                signer.sign(chain, &message, encoding, key)
            })
            .await
        }
        .await;
        self.audited(
            "wallet.sign_message",
            "wallet",
            id.to_string(),
            json!({ "encoding": encoding }),
            result,
        )
        .await
    }

    pub fn verify_message(
        &self,
        chain: Chain,
        message: &SignableMessage,
        signature: &[u8],
        expected_address: &str,
        encoding: MessageEncoding,
    ) -> Result<Verification, WalletError> {
        self.signer
            .verify(chain, message, signature, expected_address, encoding)
    }

    async fn owned_proposal(&self, owner: &str, id: Uuid) -> Result<Proposal, WalletError> {
        let proposal = self.multisig.get(id).await?;
        match self.load_wallet(owner, proposal.wallet_id).await {
            Ok(_) => Ok(proposal),
            Err(WalletError::WalletNotFound(_)) => Err(WalletError::ProposalNotFound(id.to_string())),
            Err(err) => Err(err),
        }
    }

    pub async fn get_proposal(&self, owner: &str, id: Uuid) -> Result<Proposal, WalletError> {
        self.owned_proposal(owner, id).await
    }

    pub async fn list_proposals(
        &self,
        owner: &str,
        wallet_id: Uuid,
    ) -> Result<Vec<Proposal>, WalletError> {
        let wallet = self.load_wallet(owner, wallet_id).await?;
        self.multisig.list_for_wallet(wallet.id).await
    }

    /// Approves a proposal with one of the caller's Single-Key wallets.
    pub async fn approve_proposal(
        &self,
        owner: &str,
        signing_wallet: Uuid,
        proposal_id: Uuid,
        passphrase: &str,
    ) -> Result<Proposal, WalletError> {
        let result = self
            .approve_inner(owner, signing_wallet, proposal_id, passphrase)
            .await;
        self.audited(
            "wallet.approve",
            "proposal",
            proposal_id.to_string(),
            json!({ "signing_wallet": signing_wallet }),
            result,
        )
        .await
    }

    async fn approve_inner(
        &self,
        owner: &str,
        signing_wallet: Uuid,
        proposal_id: Uuid,
        passphrase: &str,
    ) -> Result<Proposal, WalletError> {
        let wallet = self.load_wallet(owner, signing_wallet).await?;
        let proposal = self.multisig.get(proposal_id).await?;
        if wallet.kind != WalletKind::SingleKey || wallet.chain != proposal.chain {
            return Err(WalletError::UnsupportedOperation(format!(
                "wallet {} cannot approve a {} proposal",
                wallet.id, proposal.chain
            )));
        }
        let signer = self.signer;
        let chain = proposal.chain;
        let approval = proposal.approval.clone();
        let signature = self
            .with_private_key(&wallet, passphrase, move |key| {
                signer.sign(chain, &approval.message, approval.encoding, key)
            })
            .await?;
        self.multisig
            .add_signature(
                proposal_id,
                SignatureWithSigner {
                    signer: wallet.address,
                    signature,
                },
            )
            .await
    }

    /// Adds a signature produced outside this wallet.
    pub async fn submit_signature(
        &self,
        proposal_id: Uuid,
        signature: SignatureWithSigner,
    ) -> Result<Proposal, WalletError> {
        self.multisig.add_signature(proposal_id, signature).await
    }

    pub async fn execute_proposal(&self, owner: &str, id: Uuid) -> Result<Proposal, WalletError> {
        let owned = self.owned_proposal(owner, id).await;
        self.audited_read("multisig.execute", "proposal", id.to_string(), Value::Null, owned)
            .await?;
        self.multisig.execute(id).await
    }

    pub async fn reject_proposal(
        &self,
        owner: &str,
        id: Uuid,
        signer: &str,
    ) -> Result<Proposal, WalletError> {
        let owned = self.owned_proposal(owner, id).await;
        self.audited_read(
            "multisig.reject",
            "proposal",
            id.to_string(),
            json!({ "signer": signer }),
            owned,
        )
        .await?;
        self.multisig.reject(id, signer).await
    }

    /// Polls the chain once for a non-terminal record.
    pub async fn refresh_transaction_status(
        &self,
        owner: &str,
        id: Uuid,
    ) -> Result<TransactionRecord, WalletError> {
        let result = self.refresh_inner(owner, id).await;
        self.audited_read("transaction.refresh", "transaction", id.to_string(), Value::Null, result)
            .await
    }

    async fn refresh_inner(&self, owner: &str, id: Uuid) -> Result<TransactionRecord, WalletError> {
        let mut record = self
            .transactions
            .get(id)
            .await?
            .ok_or_else(|| WalletError::Store(format!("transaction {id} not found")))?;
        let wallet = self.load_wallet(owner, record.wallet_id).await?;
        let Some(tx_hash) = record.tx_hash.clone() else {
            return Ok(record);
        };
        if record.status.is_terminal() {
            return Ok(record);
        }
        let adapter = self.registry.adapter(wallet.chain)?;
        let status = adapter.transaction_status(&tx_hash).await?;
        if record.apply_status(status) {
            self.transactions.update(record.clone()).await?;
            if status == TxStatus::Failed {
                warn!(record = %id, %tx_hash, "transaction failed on chain");
            }
        }
        Ok(record)
    }

    /// Newest first.
    pub async fn list_transactions(
        &self,
        owner: &str,
        wallet_id: Uuid,
    ) -> Result<Vec<TransactionRecord>, WalletError> {
        let wallet = self.load_wallet(owner, wallet_id).await?;
        self.transactions.list_by_wallet(wallet.id).await
    }
}

fn entity_id(result: &Result<Wallet, WalletError>, owner: &str) -> String {
    result
        .as_ref()
        .map(|w| w.id.to_string())
        .unwrap_or_else(|_| owner.to_string())
}

fn watch_only(wallet: &Wallet) -> WalletError {
    WalletError::UnsupportedOperation(format!("wallet {} is watch-only", wallet.id))
}
