//! Proposal lifecycle for Multi-Signature wallets.
//!
//! ```text
//! Created ─▶ Collecting ─▶ ThresholdReached ─▶ Executed
//!    │            │               │
//!    └────────────┴───────────────┴─▶ Expired | Rejected
//! ```
//!
//! Each proposal sits behind its own async mutex, so concurrent signature
//! submissions on one proposal are serialized while different proposals
//! proceed in parallel. The `executed` flag is flipped under that lock
//! before the broadcast, which makes execution happen at most once.

use std::collections::HashMap;
use std::sync::Arc;

use chain_api::{ApprovalRequest, Chain, ChainError, SignatureWithSigner};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditSink};
use crate::error::WalletError;
use crate::registry::HandlerRegistry;
use crate::signer::MessageSigner;
use crate::types::{normalize_address, Wallet, WalletKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalState {
    Created,
    Collecting,
    ThresholdReached,
    Executed,
    Expired,
    Rejected,
}

impl ProposalState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProposalState::Executed | ProposalState::Expired | ProposalState::Rejected
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub chain: Chain,
    pub wallet_address: String,
    /// Adapter payload executed once approved.
    #[serde(with = "hex::serde")]
    pub payload: Vec<u8>,
    /// What each signer signs.
    pub approval: ApprovalRequest,
    pub signers: Vec<String>,
    pub threshold: u32,
    /// Accepted signatures, one per signer, ordered by normalized address.
    pub signatures: Vec<SignatureWithSigner>,
    pub state: ProposalState,
    pub executed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Proposal {
    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    /// Signatures in signer order, as handed to the adapter.
    pub fn signature_list(&self) -> Vec<SignatureWithSigner> {
        self.signatures.clone()
    }

    fn signature_slot(&self, signer: &str) -> Result<usize, usize> {
        let key = normalize_address(self.chain, signer);
        self.signatures
            .binary_search_by(|s| normalize_address(self.chain, &s.signer).cmp(&key))
    }

    pub fn has_signed(&self, signer: &str) -> bool {
        self.signature_slot(signer).is_ok()
    }

    pub fn is_authorized(&self, signer: &str) -> bool {
        let key = normalize_address(self.chain, signer);
        self.signers
            .iter()
            .any(|s| normalize_address(self.chain, s) == key)
    }

    /// Moves an open proposal past its deadline to `Expired`.
    fn expire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        let due = self.expires_at.is_some_and(|at| now >= at);
        if due && !self.executed && !self.state.is_terminal() {
            self.state = ProposalState::Expired;
            return true;
        }
        false
    }

    fn closed(&self) -> Option<WalletError> {
        matches!(self.state, ProposalState::Expired | ProposalState::Rejected)
            .then(|| WalletError::ProposalClosed(format!("{} ({:?})", self.id, self.state)))
    }

    /// What a caller arriving after execution gets back. A broadcast that
    /// failed without a chain verdict may still land, so it surfaces as a
    /// timeout the caller can poll on.
    fn execution_result(&self) -> Result<Proposal, WalletError> {
        match (&self.tx_hash, &self.failure) {
            (None, Some(failure)) => Err(WalletError::NetworkTimeout(format!(
                "proposal {} execution outcome unknown: {failure}",
                self.id
            ))),
            _ => Ok(self.clone()),
        }
    }
}

enum Execution {
    Run(OwnedMutexGuard<Proposal>),
    Done(Proposal),
}

pub struct MultisigCoordinator {
    registry: Arc<HandlerRegistry>,
    audit: Arc<dyn AuditSink>,
    signer: MessageSigner,
    proposal_ttl: Option<Duration>,
    proposals: RwLock<HashMap<Uuid, Arc<Mutex<Proposal>>>>,
}

impl MultisigCoordinator {
    pub fn new(registry: Arc<HandlerRegistry>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            registry,
            audit,
            signer: MessageSigner,
            proposal_ttl: None,
            proposals: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_proposal_ttl(mut self, ttl_secs: Option<u64>) -> Self {
        self.proposal_ttl = ttl_secs
            .map(|s| Duration::seconds(i64::try_from(s).unwrap_or(i64::MAX).min(i64::MAX / 1000)));
        self
    }

    /// Opens a proposal for `payload` on a Multi-Signature wallet.
    pub async fn create(&self, wallet: &Wallet, payload: Vec<u8>) -> Result<Proposal, WalletError> {
        let threshold = match (wallet.kind, wallet.threshold) {
            (WalletKind::MultiSignature, Some(t)) => t,
            _ => {
                return Err(WalletError::UnsupportedOperation(format!(
                    "wallet {} is not a multi-signature wallet",
                    wallet.id
                )))
            }
        };
        let adapter = self.registry.adapter(wallet.chain)?;
        let approval = adapter.approval_message(&payload)?;
        let now = Utc::now();

        let proposal = Proposal {
            id: Uuid::new_v4(),
            wallet_id: wallet.id,
            chain: wallet.chain,
            wallet_address: wallet.address.clone(),
            payload,
            approval,
            signers: wallet.signers.clone(),
            threshold,
            signatures: Vec::new(),
            state: ProposalState::Created,
            executed: false,
            tx_hash: None,
            failure: None,
            rejected_by: None,
            created_at: now,
            expires_at: self.proposal_ttl.and_then(|ttl| now.checked_add_signed(ttl)),
        };
        self.proposals
            .write()
            .await
            .insert(proposal.id, Arc::new(Mutex::new(proposal.clone())));

        info!(proposal = %proposal.id, wallet = %wallet.id, chain = %wallet.chain, threshold, "proposal created");
        self.audit
            .record(
                AuditEvent::success("multisig.propose", "proposal", proposal.id).with_details(json!({
                    "wallet_id": wallet.id,
                    "chain": wallet.chain,
                    "threshold": threshold,
                })),
            )
            .await;
        Ok(proposal)
    }

    async fn entry(&self, id: Uuid) -> Result<Arc<Mutex<Proposal>>, WalletError> {
        self.proposals
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| WalletError::ProposalNotFound(id.to_string()))
    }

    pub async fn get(&self, id: Uuid) -> Result<Proposal, WalletError> {
        let entry = self.entry(id).await?;
        let mut proposal = entry.lock().await;
        proposal.expire_if_due(Utc::now());
        Ok(proposal.clone())
    }

    /// Proposals of one wallet, oldest first.
    pub async fn list_for_wallet(&self, wallet_id: Uuid) -> Result<Vec<Proposal>, WalletError> {
        let entries: Vec<_> = self.proposals.read().await.values().cloned().collect();
        let now = Utc::now();
        let mut out = Vec::new();
        for entry in entries {
            let mut proposal = entry.lock().await;
            if proposal.wallet_id == wallet_id {
                proposal.expire_if_due(now);
                out.push(proposal.clone());
            }
        }
        out.sort_by_key(|p| (p.created_at, p.id));
        Ok(out)
    }

    /// Adds one signer's approval; executes once the threshold is reached.
    ///
    /// Checks run in a fixed order: closed, authorized, duplicate, already
    /// executed (returns the stored result), cryptographic validity.
    pub async fn add_signature(
        &self,
        id: Uuid,
        signature: SignatureWithSigner,
    ) -> Result<Proposal, WalletError> {
        let result = self.add_signature_locked(id, signature.clone()).await;
        match &result {
            Ok(proposal) => debug!(proposal = %id, state = ?proposal.state, "signature processed"),
            Err(err) => {
                self.record_failure("multisig.sign", id, json!({ "signer": signature.signer }), err)
                    .await;
            }
        }
        result
    }

    async fn add_signature_locked(
        &self,
        id: Uuid,
        signature: SignatureWithSigner,
    ) -> Result<Proposal, WalletError> {
        let entry = self.entry(id).await?;
        let mut proposal = entry.lock_owned().await;

        if proposal.expire_if_due(Utc::now()) {
            self.audit
                .record(AuditEvent::success("multisig.expire", "proposal", id))
                .await;
        }
        if let Some(err) = proposal.closed() {
            return Err(err);
        }
        if !proposal.is_authorized(&signature.signer) {
            return Err(WalletError::UnauthorizedSigner(signature.signer));
        }
        let slot = match proposal.signature_slot(&signature.signer) {
            Ok(_) => return Err(WalletError::DuplicateSignature(signature.signer)),
            Err(slot) => slot,
        };
        if proposal.executed {
            return proposal.execution_result();
        }

        let verification = self.signer.verify(
            proposal.chain,
            &proposal.approval.message,
            &signature.signature,
            &signature.signer,
            proposal.approval.encoding,
        )?;
        if !verification.valid {
            return Err(WalletError::InvalidSignature(format!(
                "signature does not match {}",
                signature.signer
            )));
        }

        proposal.signatures.insert(slot, signature.clone());
        let count = proposal.signature_count();
        self.audit
            .record(
                AuditEvent::success("multisig.sign", "proposal", id).with_details(json!({
                    "signer": signature.signer,
                    "signatures": count,
                    "threshold": proposal.threshold,
                })),
            )
            .await;

        if count < proposal.threshold as usize {
            proposal.state = ProposalState::Collecting;
            return Ok(proposal.clone());
        }

        proposal.state = ProposalState::ThresholdReached;
        info!(proposal = %id, signatures = count, "threshold reached");
        self.audit
            .record(AuditEvent::success("multisig.threshold_reached", "proposal", id))
            .await;
        self.execute_locked(proposal).await
    }

    /// Executes a proposal that already holds enough signatures.
    pub async fn execute(&self, id: Uuid) -> Result<Proposal, WalletError> {
        match self.prepare_execution(id).await {
            Ok(Execution::Run(proposal)) => self.execute_locked(proposal).await,
            Ok(Execution::Done(proposal)) => Ok(proposal),
            Err(err) => {
                self.record_failure("multisig.execute", id, json!({}), &err).await;
                Err(err)
            }
        }
    }

    async fn prepare_execution(&self, id: Uuid) -> Result<Execution, WalletError> {
        let entry = self.entry(id).await?;
        let mut proposal = entry.lock_owned().await;
        proposal.expire_if_due(Utc::now());
        if let Some(err) = proposal.closed() {
            return Err(err);
        }
        if proposal.executed {
            return proposal.execution_result().map(Execution::Done);
        }
        let have = proposal.signature_count();
        if have < proposal.threshold as usize {
            return Err(WalletError::ThresholdNotMet {
                have,
                need: proposal.threshold,
            });
        }
        proposal.state = ProposalState::ThresholdReached;
        Ok(Execution::Run(proposal))
    }

    async fn record_failure(
        &self,
        action: &str,
        id: Uuid,
        details: serde_json::Value,
        err: &WalletError,
    ) {
        warn!(proposal = %id, action, error = %err, "proposal operation refused");
        self.audit
            .record(
                AuditEvent::failed(action, "proposal", id)
                    .with_details(details)
                    .with_error(err),
            )
            .await;
    }

    /// Flips `executed` and broadcasts on a spawned task that owns the lock,
    /// so the submission completes even if the caller goes away.
    async fn execute_locked(
        &self,
        mut proposal: OwnedMutexGuard<Proposal>,
    ) -> Result<Proposal, WalletError> {
        let adapter = self.registry.adapter(proposal.chain)?;
        let audit = self.audit.clone();
        proposal.executed = true;

        let task = tokio::spawn(async move {
            let signatures = proposal.signature_list();
            let result = adapter
                .execute_transaction(&proposal.wallet_address, &proposal.payload, &signatures)
                .await;
            let event = match &result {
                Ok(hash) => {
                    proposal.state = ProposalState::Executed;
                    proposal.tx_hash = Some(hash.clone());
                    info!(proposal = %proposal.id, tx_hash = %hash, "proposal executed");
                    AuditEvent::success("multisig.execute", "proposal", proposal.id)
                        .with_details(json!({ "tx_hash": hash, "chain": proposal.chain }))
                }
                Err(err) => {
                    if matches!(
                        err,
                        ChainError::BroadcastRejected(_) | ChainError::InsufficientFunds(_)
                    ) {
                        proposal.state = ProposalState::Rejected;
                    }
                    proposal.failure = Some(err.to_string());
                    error!(proposal = %proposal.id, error = %err, "proposal execution failed");
                    AuditEvent::failed("multisig.execute", "proposal", proposal.id)
                        .with_details(json!({ "chain": proposal.chain, "error": err.to_string() }))
                }
            };
            audit.record(event).await;
            (proposal.clone(), result)
        });

        let (snapshot, result) = task
            .await
            .map_err(|e| WalletError::Internal(format!("execution task: {e}")))?;
        result.map(|_| snapshot).map_err(WalletError::from)
    }

    /// Closes a proposal on behalf of an authorized signer.
    pub async fn reject(&self, id: Uuid, signer: &str) -> Result<Proposal, WalletError> {
        let result = self.reject_locked(id, signer).await;
        if let Err(err) = &result {
            self.record_failure("multisig.reject", id, json!({ "signer": signer }), err)
                .await;
        }
        result
    }

    async fn reject_locked(&self, id: Uuid, signer: &str) -> Result<Proposal, WalletError> {
        let entry = self.entry(id).await?;
        let mut proposal = entry.lock().await;
        proposal.expire_if_due(Utc::now());
        if let Some(err) = proposal.closed() {
            return Err(err);
        }
        if !proposal.is_authorized(signer) {
            return Err(WalletError::UnauthorizedSigner(signer.to_string()));
        }
        if proposal.executed {
            return Err(WalletError::ProposalClosed(format!("{id} already executed")));
        }
        proposal.state = ProposalState::Rejected;
        proposal.rejected_by = Some(signer.to_string());
        info!(proposal = %id, signer, "proposal rejected");
        self.audit
            .record(
                AuditEvent::success("multisig.reject", "proposal", id)
                    .with_details(json!({ "signer": signer })),
            )
            .await;
        Ok(proposal.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use chain_api::mock::{MockAdapter, MockFeeEstimator};
    use chain_api::{FeeEstimator, MessageEncoding, SignableMessage};

    fn key(n: u8) -> [u8; 32] {
        let mut k = [0u8; 32];
        k[31] = n;
        k
    }

    fn address(n: u8) -> String {
        chain_eth::address::checksum(&chain_eth::address::address_from_private_key(&key(n)).unwrap())
    }

    fn sign(proposal: &Proposal, n: u8) -> SignatureWithSigner {
        SignatureWithSigner {
            signer: address(n),
            signature: MessageSigner
                .sign(
                    proposal.chain,
                    &proposal.approval.message,
                    proposal.approval.encoding,
                    &key(n),
                )
                .unwrap(),
        }
    }

    struct Fixture {
        adapter: Arc<MockAdapter>,
        audit: Arc<MemoryAuditSink>,
        coordinator: MultisigCoordinator,
        wallet: Wallet,
    }

    fn fixture(signers: &[u8], threshold: u32) -> Fixture {
        let adapter = Arc::new(MockAdapter::new(Chain::Ethereum));
        let fees: Arc<dyn FeeEstimator> = Arc::new(MockFeeEstimator::new(Chain::Ethereum));
        let registry = Arc::new(
            HandlerRegistry::new()
                .with_handler(adapter.clone(), fees)
                .unwrap(),
        );
        let audit = Arc::new(MemoryAuditSink::new());
        let coordinator = MultisigCoordinator::new(registry, audit.clone());

        let mut wallet = Wallet::new(
            "alice",
            Chain::Ethereum,
            "mock:5afe".into(),
            WalletKind::MultiSignature,
            "treasury",
        );
        wallet.signers = signers.iter().map(|n| address(*n)).collect();
        wallet.threshold = Some(threshold);
        Fixture {
            adapter,
            audit,
            coordinator,
            wallet,
        }
    }

    #[tokio::test]
    async fn create_requires_multisig_wallet() {
        let f = fixture(&[1, 2], 2);
        let mut single = f.wallet.clone();
        single.kind = WalletKind::SingleKey;
        let err = f.coordinator.create(&single, b"p".to_vec()).await.unwrap_err();
        assert!(matches!(err, WalletError::UnsupportedOperation(_)));
    }

    #[tokio::test]
    async fn approval_message_comes_from_the_adapter() {
        let f = fixture(&[1, 2], 2);
        let p = f.coordinator.create(&f.wallet, b"payload".to_vec()).await.unwrap();
        assert_eq!(p.state, ProposalState::Created);
        assert_eq!(p.approval.encoding, MessageEncoding::Personal);
        assert_eq!(p.approval.message, SignableMessage::Bytes(b"payload".to_vec()));
    }

    #[tokio::test]
    async fn unauthorized_signer_leaves_state_unchanged() {
        let f = fixture(&[1, 2, 3], 2);
        let p = f.coordinator.create(&f.wallet, b"p".to_vec()).await.unwrap();
        f.coordinator.add_signature(p.id, sign(&p, 1)).await.unwrap();

        let err = f.coordinator.add_signature(p.id, sign(&p, 4)).await.unwrap_err();
        assert!(matches!(err, WalletError::UnauthorizedSigner(_)));
        let p = f.coordinator.get(p.id).await.unwrap();
        assert_eq!(p.state, ProposalState::Collecting);
        assert_eq!(p.signature_count(), 1);
    }

    #[tokio::test]
    async fn invalid_signature_is_refused() {
        let f = fixture(&[1, 2], 2);
        let p = f.coordinator.create(&f.wallet, b"p".to_vec()).await.unwrap();
        let mut forged = sign(&p, 3);
        forged.signer = address(1);
        let err = f.coordinator.add_signature(p.id, forged).await.unwrap_err();
        assert!(matches!(err, WalletError::InvalidSignature(_)));
        assert_eq!(f.coordinator.get(p.id).await.unwrap().signature_count(), 0);
    }

    #[tokio::test]
    async fn threshold_executes_once_and_keeps_result() {
        let f = fixture(&[1, 2, 3], 2);
        let p = f.coordinator.create(&f.wallet, b"p".to_vec()).await.unwrap();

        let after_a = f.coordinator.add_signature(p.id, sign(&p, 1)).await.unwrap();
        assert_eq!(after_a.state, ProposalState::Collecting);
        assert!(!after_a.executed);

        let after_b = f.coordinator.add_signature(p.id, sign(&p, 2)).await.unwrap();
        assert_eq!(after_b.state, ProposalState::Executed);
        assert!(after_b.executed);
        assert_eq!(after_b.tx_hash.as_deref(), Some("0xmockhash0001"));
        assert_eq!(f.adapter.execute_count(), 1);
        assert_eq!(f.adapter.executed()[0].signatures.len(), 2);

        let late = f.coordinator.add_signature(p.id, sign(&p, 3)).await.unwrap();
        assert_eq!(late.tx_hash.as_deref(), Some("0xmockhash0001"));
        assert_eq!(late.signature_count(), 2);
        assert_eq!(f.adapter.execute_count(), 1);

        let dup = f.coordinator.add_signature(p.id, sign(&p, 1)).await.unwrap_err();
        assert!(matches!(dup, WalletError::DuplicateSignature(_)));

        let actions: Vec<String> = f.audit.actions().await.into_iter().map(|(a, _)| a).collect();
        assert!(actions.contains(&"multisig.threshold_reached".to_string()));
        assert!(actions.contains(&"multisig.execute".to_string()));
    }

    #[tokio::test]
    async fn chain_rejection_is_recorded() {
        let f = fixture(&[1, 2], 1);
        f.adapter.reject_broadcasts("GS026: invalid owner provided");
        let p = f.coordinator.create(&f.wallet, b"p".to_vec()).await.unwrap();

        let err = f.coordinator.add_signature(p.id, sign(&p, 1)).await.unwrap_err();
        assert!(matches!(err, WalletError::BroadcastRejected(ref r) if r.contains("GS026")));

        let p = f.coordinator.get(p.id).await.unwrap();
        assert_eq!(p.state, ProposalState::Rejected);
        assert!(p.executed);
        assert!(p.failure.unwrap().contains("GS026"));
        assert_eq!(f.adapter.execute_count(), 1);
    }

    #[tokio::test]
    async fn execute_before_threshold_fails() {
        let f = fixture(&[1, 2], 2);
        let p = f.coordinator.create(&f.wallet, b"p".to_vec()).await.unwrap();
        f.coordinator.add_signature(p.id, sign(&p, 1)).await.unwrap();
        let err = f.coordinator.execute(p.id).await.unwrap_err();
        assert!(matches!(err, WalletError::ThresholdNotMet { have: 1, need: 2 }));
        assert_eq!(f.adapter.execute_count(), 0);
    }

    #[tokio::test]
    async fn rejected_proposal_is_closed() {
        let f = fixture(&[1, 2], 2);
        let p = f.coordinator.create(&f.wallet, b"p".to_vec()).await.unwrap();
        assert!(matches!(
            f.coordinator.reject(p.id, &address(9)).await,
            Err(WalletError::UnauthorizedSigner(_))
        ));
        let rejected = f.coordinator.reject(p.id, &address(2)).await.unwrap();
        assert_eq!(rejected.state, ProposalState::Rejected);
        assert_eq!(rejected.rejected_by, Some(address(2)));

        let err = f.coordinator.add_signature(p.id, sign(&p, 1)).await.unwrap_err();
        assert!(matches!(err, WalletError::ProposalClosed(_)));
    }

    #[tokio::test]
    async fn expired_proposal_refuses_signatures() {
        let f = fixture(&[1, 2], 2);
        let coordinator = f.coordinator.with_proposal_ttl(Some(0));
        let p = coordinator.create(&f.wallet, b"p".to_vec()).await.unwrap();

        let err = coordinator.add_signature(p.id, sign(&p, 1)).await.unwrap_err();
        assert!(matches!(err, WalletError::ProposalClosed(_)));
        assert_eq!(coordinator.get(p.id).await.unwrap().state, ProposalState::Expired);
    }

    #[tokio::test]
    async fn unknown_proposal() {
        let f = fixture(&[1], 1);
        let err = f.coordinator.get(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, WalletError::ProposalNotFound(_)));
    }

    #[tokio::test]
    async fn list_for_wallet_filters() {
        let f = fixture(&[1, 2], 2);
        let first = f.coordinator.create(&f.wallet, b"a".to_vec()).await.unwrap();
        let mut other = f.wallet.clone();
        other.id = Uuid::new_v4();
        f.coordinator.create(&other, b"b".to_vec()).await.unwrap();

        let listed = f.coordinator.list_for_wallet(f.wallet.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, first.id);
    }

    #[tokio::test]
    async fn unknown_broadcast_outcome_is_not_reported_as_success() {
        let f = fixture(&[1, 2, 3], 2);
        f.adapter.time_out_broadcasts("relayer did not answer");
        let p = f.coordinator.create(&f.wallet, b"p".to_vec()).await.unwrap();
        f.coordinator.add_signature(p.id, sign(&p, 1)).await.unwrap();

        let err = f.coordinator.add_signature(p.id, sign(&p, 2)).await.unwrap_err();
        assert!(matches!(err, WalletError::NetworkTimeout(_)));

        let stored = f.coordinator.get(p.id).await.unwrap();
        assert!(stored.executed);
        assert_eq!(stored.state, ProposalState::ThresholdReached);
        assert!(stored.tx_hash.is_none());

        let late = f.coordinator.add_signature(p.id, sign(&p, 3)).await.unwrap_err();
        assert!(matches!(late, WalletError::NetworkTimeout(ref m) if m.contains("relayer did not answer")));
        let again = f.coordinator.execute(p.id).await.unwrap_err();
        assert!(matches!(again, WalletError::NetworkTimeout(_)));
        assert_eq!(f.adapter.execute_count(), 1);
    }

    #[tokio::test]
    async fn refused_execute_and_reject_are_audited() {
        let f = fixture(&[1, 2], 2);
        let p = f.coordinator.create(&f.wallet, b"p".to_vec()).await.unwrap();

        f.coordinator.execute(p.id).await.unwrap_err();
        f.coordinator.reject(p.id, &address(7)).await.unwrap_err();

        let failed: Vec<String> = f
            .audit
            .actions()
            .await
            .into_iter()
            .filter(|(_, status)| *status == crate::audit::AuditStatus::Failed)
            .map(|(action, _)| action)
            .collect();
        assert_eq!(failed, vec!["multisig.execute", "multisig.reject"]);
    }

    #[tokio::test]
    async fn wire_form_is_a_signature_list() {
        let f = fixture(&[1, 2, 3], 3);
        let p = f.coordinator.create(&f.wallet, b"p".to_vec()).await.unwrap();
        f.coordinator.add_signature(p.id, sign(&p, 2)).await.unwrap();
        let p = f.coordinator.add_signature(p.id, sign(&p, 1)).await.unwrap();

        let json = serde_json::to_value(&p).unwrap();
        let list = json["signatures"].as_array().unwrap();
        assert_eq!(list.len(), 2);
        let mut signers: Vec<String> = vec![address(1), address(2)];
        signers.sort_by_key(|a| a.to_ascii_lowercase());
        assert_eq!(list[0]["signer"], signers[0]);
        assert_eq!(list[1]["signer"], signers[1]);
        assert!(list[0]["signature"].is_string());

        let back: Proposal = serde_json::from_value(json).unwrap();
        assert_eq!(back, p);
        assert!(back.has_signed(&address(1).to_ascii_lowercase()));
    }
}
