//! Cross-crate behaviour of the wallet core: adapters, fee estimators,
//! signing, the multisig coordinator and the manager working together.

use std::sync::Arc;
use std::time::Duration;

use chain_api::mock::{MockAdapter, MockFeeEstimator, MockTransport};
use chain_api::{
    ChainAdapter, ConfirmationPolicy, FeeEstimator, FeeSchedule, MultisigConfig, NodeTransport,
    RetryPolicy,
};
use chain_btc::BtcAdapter;
use chain_eth::{EvmAdapter, EvmFeeEstimator};
use chain_near::NearAdapter;
use chain_sol::SolAdapter;
use chain_xrp::XrpAdapter;
use crypto_utils::KdfParams;
use serde_json::json;
use wallet_core::*;

fn key(n: u8) -> [u8; 32] {
    let mut k = [0u8; 32];
    k[31] = n;
    k
}

fn eth_address(n: u8) -> String {
    chain_eth::address::checksum(&chain_eth::address::address_from_private_key(&key(n)).unwrap())
}

fn approve(proposal: &Proposal, n: u8) -> SignatureWithSigner {
    SignatureWithSigner {
        signer: eth_address(n),
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

fn fast_keystore() -> Arc<LocalKeystore> {
    Arc::new(LocalKeystore::new(KdfParams::insecure_fast()).unwrap())
}

fn mock_registry(adapter: Arc<MockAdapter>) -> Arc<HandlerRegistry> {
    let chain = adapter.chain();
    Arc::new(
        HandlerRegistry::new()
            .with_handler(adapter, Arc::new(MockFeeEstimator::new(chain)))
            .unwrap(),
    )
}

fn mock_manager(adapter: Arc<MockAdapter>, audit: Arc<MemoryAuditSink>) -> WalletManager {
    WalletManager::new(mock_registry(adapter))
        .with_custody(fast_keystore())
        .with_audit_sink(audit)
        .with_confirmation(ConfirmationPolicy::no_wait())
}

fn multisig_wallet(signers: &[u8], threshold: u32) -> Wallet {
    let mut wallet = Wallet::new(
        "treasury-team",
        Chain::Ethereum,
        format!("mock:{}", "5a".repeat(20)),
        WalletKind::MultiSignature,
        "treasury",
    );
    wallet.signers = signers.iter().map(|n| eth_address(*n)).collect();
    wallet.threshold = Some(threshold);
    wallet
}

fn permutations(items: &[u8]) -> Vec<Vec<u8>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut out = Vec::new();
    for (i, first) in items.iter().enumerate() {
        let mut rest = items.to_vec();
        rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, *first);
            out.push(tail);
        }
    }
    out
}

#[test]
fn generated_addresses_validate_on_every_adapter() {
    let transport: Arc<dyn NodeTransport> = Arc::new(MockTransport::new());
    let retry = RetryPolicy::none();
    let adapters: Vec<Arc<dyn ChainAdapter>> = vec![
        Arc::new(EvmAdapter::new(Chain::Ethereum, transport.clone(), retry).unwrap()),
        Arc::new(EvmAdapter::new(Chain::Polygon, transport.clone(), retry).unwrap()),
        Arc::new(BtcAdapter::new(Chain::Bitcoin, transport.clone(), retry).unwrap()),
        Arc::new(BtcAdapter::new(Chain::BitcoinTestnet, transport.clone(), retry).unwrap()),
        Arc::new(SolAdapter::new(Chain::Solana, transport.clone(), retry).unwrap()),
        Arc::new(NearAdapter::new(Chain::Near, transport.clone(), retry).unwrap()),
        Arc::new(XrpAdapter::new(Chain::Ripple, transport, retry).unwrap()),
    ];

    for adapter in adapters {
        for _ in 0..16 {
            let private_key: [u8; 32] = rand::random();
            let public_key = adapter.public_key_from_private(&private_key).unwrap();
            let address = adapter.generate_address(&public_key).unwrap();
            assert!(
                adapter.is_valid_address(&address),
                "{} rejected its own address {address}",
                adapter.chain()
            );
        }
        assert!(!adapter.is_valid_address(""));
        assert!(adapter.generate_address(&[0x01, 0x02]).is_err());
    }
}

#[tokio::test]
async fn threshold_is_reached_exactly_at_t_in_any_order() {
    let adapter = Arc::new(MockAdapter::new(Chain::Ethereum));
    let coordinator =
        MultisigCoordinator::new(mock_registry(adapter.clone()), Arc::new(MemoryAuditSink::new()));
    let mut executions = 0;

    for threshold in 1..=3u32 {
        let wallet = multisig_wallet(&[1, 2, 3], threshold);
        // signer 4 is outside the set
        for order in permutations(&[1, 2, 3, 4]) {
            let proposal = coordinator.create(&wallet, b"transfer".to_vec()).await.unwrap();
            let mut accepted = 0u32;

            for n in order {
                let result = coordinator.add_signature(proposal.id, approve(&proposal, n)).await;
                if n == 4 {
                    assert!(matches!(result, Err(WalletError::UnauthorizedSigner(_))));
                    continue;
                }
                let state = result.unwrap();
                if accepted < threshold {
                    accepted += 1;
                }
                if accepted < threshold {
                    assert_eq!(state.state, ProposalState::Collecting);
                    assert!(!state.executed);
                } else {
                    assert_eq!(state.state, ProposalState::Executed);
                    assert!(state.executed);
                    assert_eq!(state.signature_count(), threshold as usize);
                }
            }
            executions += 1;
            assert_eq!(adapter.execute_count(), executions);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_last_signatures_execute_once() {
    let adapter = Arc::new(MockAdapter::new(Chain::Ethereum).with_execute_delay(Duration::from_millis(50)));
    let coordinator = Arc::new(MultisigCoordinator::new(
        mock_registry(adapter.clone()),
        Arc::new(MemoryAuditSink::new()),
    ));
    let wallet = multisig_wallet(&[1, 2, 3], 2);

    for round in 1..=5 {
        let proposal = coordinator.create(&wallet, b"sweep".to_vec()).await.unwrap();
        coordinator
            .add_signature(proposal.id, approve(&proposal, 1))
            .await
            .unwrap();

        let id = proposal.id;
        let tasks: Vec<_> = [2u8, 3]
            .into_iter()
            .map(|n| {
                let coordinator = coordinator.clone();
                let signature = approve(&proposal, n);
                tokio::spawn(async move { coordinator.add_signature(id, signature).await })
            })
            .collect();
        for task in tasks {
            let result = task.await.unwrap().unwrap();
            assert!(result.executed);
            assert_eq!(result.signature_count(), 2);
        }

        assert_eq!(adapter.execute_count(), round);
        let stored = coordinator.get(proposal.id).await.unwrap();
        assert_eq!(stored.state, ProposalState::Executed);
    }
}

#[test]
fn every_fee_schedule_orders_by_priority() {
    let schedules: [(Chain, FeeSchedule); 5] = [
        (Chain::Ethereum, chain_eth::fees::default_schedule()),
        (Chain::Bitcoin, chain_btc::fees::default_schedule()),
        (Chain::Solana, chain_sol::fees::default_schedule()),
        (Chain::Near, chain_near::fees::default_schedule()),
        (Chain::Ripple, chain_xrp::fees::default_schedule()),
    ];
    for (chain, schedule) in schedules {
        schedule.validate().unwrap();
        for congestion in Congestion::ALL {
            let quotes: Vec<FeeSuggestion> = FeePriority::ALL
                .iter()
                .map(|p| schedule.suggest(chain, *p, congestion, 1_000))
                .collect();
            for pair in quotes.windows(2) {
                assert!(pair[0].fee_per_unit <= pair[1].fee_per_unit, "{chain} {congestion:?}");
                assert!(
                    pair[0].estimated_confirmation_secs >= pair[1].estimated_confirmation_secs,
                    "{chain} {congestion:?}"
                );
            }
        }
    }
}

#[tokio::test]
async fn near_quotes_keep_order_as_gas_price_rises() {
    let transport = Arc::new(MockTransport::new());
    let estimator =
        chain_near::NearFeeEstimator::new(Chain::Near, transport.clone(), RetryPolicy::none());

    for price in ["100000000", "120000000", "200000000", "400000000"] {
        transport.push("gas_price", json!({ "gas_price": price }));
        let mut quotes = Vec::new();
        for priority in FeePriority::ALL {
            quotes.push(estimator.estimate_fee(priority).await.unwrap());
        }
        for pair in quotes.windows(2) {
            assert!(pair[0].fee_per_unit <= pair[1].fee_per_unit);
            assert!(pair[0].estimated_confirmation_secs >= pair[1].estimated_confirmation_secs);
        }
    }
}

#[test]
fn flipped_signature_bytes_never_verify() {
    let signer = MessageSigner;
    let message = SignableMessage::Bytes(b"approve invoice 1182".to_vec());

    let evm = signer
        .sign(Chain::Ethereum, &message, MessageEncoding::Personal, &key(7))
        .unwrap();
    assert!(signer
        .verify(Chain::Ethereum, &message, &evm, &eth_address(7), MessageEncoding::Personal)
        .unwrap()
        .valid);
    for i in 0..evm.len() {
        let mut tampered = evm.clone();
        tampered[i] ^= 0x01;
        let result = signer
            .verify(Chain::Ethereum, &message, &tampered, &eth_address(7), MessageEncoding::Personal)
            .unwrap();
        assert!(!result.valid, "byte {i}");
    }

    let sol_key = [9u8; 32];
    let sol_address = chain_sol::address::public_key_to_address(
        &chain_sol::address::public_key_from_private(&sol_key).unwrap(),
    )
    .unwrap();
    let sol = signer
        .sign(Chain::Solana, &message, MessageEncoding::Personal, &sol_key)
        .unwrap();
    assert!(signer
        .verify(Chain::Solana, &message, &sol, &sol_address, MessageEncoding::Personal)
        .unwrap()
        .valid);
    for i in 0..sol.len() {
        let mut tampered = sol.clone();
        tampered[i] ^= 0x01;
        assert!(!signer
            .verify(Chain::Solana, &message, &tampered, &sol_address, MessageEncoding::Personal)
            .unwrap()
            .valid);
    }
}

#[tokio::test]
async fn scenario_a_wrong_passphrase_leaves_no_record() {
    let adapter = Arc::new(MockAdapter::new(Chain::Ethereum));
    let audit = Arc::new(MemoryAuditSink::new());
    let manager = mock_manager(adapter.clone(), audit.clone());

    let created = manager
        .create_wallet("alice", Chain::Ethereum, "spending", "P@ssw0rd1")
        .await
        .unwrap();
    let request = SendRequest::new(format!("mock:{}", "22".repeat(32)), "1000");

    let err = manager
        .send_transaction("alice", created.wallet.id, request.clone(), "wrong")
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::InvalidPassphrase));
    assert!(manager
        .list_transactions("alice", created.wallet.id)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(adapter.execute_count(), 0);

    let events = audit.events().await;
    let failed = events.last().unwrap();
    assert_eq!(failed.action, "wallet.send");
    assert_eq!(failed.status, AuditStatus::Failed);
    assert_eq!(failed.details["error_code"], "invalid_passphrase");

    // the right passphrase still works afterwards
    let outcome = manager
        .send_transaction("alice", created.wallet.id, request, "P@ssw0rd1")
        .await
        .unwrap();
    assert_eq!(outcome.transaction().unwrap().status, TxStatus::Confirmed);
    assert_eq!(adapter.execute_count(), 1);
}

async fn connected_treasury(
    adapter: &Arc<MockAdapter>,
    manager: &WalletManager,
) -> (Wallet, Proposal) {
    let reference = format!("mock:{}", "5a".repeat(20));
    adapter.set_multisig(
        &reference,
        MultisigConfig {
            signers: vec![eth_address(1), eth_address(2), eth_address(3)],
            threshold: 2,
        },
    );
    let wallet = manager
        .connect_multisig_wallet("alice", Chain::Ethereum, "treasury", &reference)
        .await
        .unwrap();
    let outcome = manager
        .send_transaction(
            "alice",
            wallet.id,
            SendRequest::new(format!("mock:{}", "33".repeat(32)), "500"),
            "",
        )
        .await
        .unwrap();
    let proposal = outcome.proposal().unwrap().clone();
    assert_eq!(proposal.state, ProposalState::Created);
    (wallet, proposal)
}

#[tokio::test]
async fn scenario_b_outsider_signature_is_unauthorized() {
    let adapter = Arc::new(MockAdapter::new(Chain::Ethereum));
    let manager = mock_manager(adapter.clone(), Arc::new(MemoryAuditSink::new()));
    let (_, proposal) = connected_treasury(&adapter, &manager).await;

    let after_a = manager
        .submit_signature(proposal.id, approve(&proposal, 1))
        .await
        .unwrap();
    assert_eq!(after_a.state, ProposalState::Collecting);

    let err = manager
        .submit_signature(proposal.id, approve(&proposal, 4))
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::UnauthorizedSigner(_)));

    let current = manager.get_proposal("alice", proposal.id).await.unwrap();
    assert_eq!(current.state, ProposalState::Collecting);
    assert_eq!(current.signature_count(), 1);
    assert_eq!(adapter.execute_count(), 0);
}

#[tokio::test]
async fn scenario_c_second_signature_executes_once() {
    let adapter = Arc::new(MockAdapter::new(Chain::Ethereum));
    let audit = Arc::new(MemoryAuditSink::new());
    let manager = mock_manager(adapter.clone(), audit.clone());
    let (wallet, proposal) = connected_treasury(&adapter, &manager).await;

    manager
        .submit_signature(proposal.id, approve(&proposal, 1))
        .await
        .unwrap();
    let executed = manager
        .submit_signature(proposal.id, approve(&proposal, 2))
        .await
        .unwrap();
    assert_eq!(executed.state, ProposalState::Executed);
    assert_eq!(adapter.execute_count(), 1);

    let call = &adapter.executed()[0];
    assert_eq!(call.wallet, wallet.address);
    assert_eq!(call.payload, proposal.payload);
    assert_eq!(call.signatures.len(), 2);

    let actions: Vec<String> = audit.actions().await.into_iter().map(|(a, _)| a).collect();
    let reached = actions.iter().position(|a| a == "multisig.threshold_reached").unwrap();
    let execute = actions.iter().position(|a| a == "multisig.execute").unwrap();
    assert!(reached < execute);

    let err = manager
        .submit_signature(proposal.id, approve(&proposal, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::DuplicateSignature(_)));
    assert_eq!(adapter.execute_count(), 1);
}

#[tokio::test]
async fn scenario_d_very_high_congestion_quotes() {
    let transport = Arc::new(MockTransport::new());
    transport.push("gas_price", json!({ "gas_price": "400000000" }));
    let near = NearAdapter::new(Chain::Near, transport.clone(), RetryPolicy::none()).unwrap();
    let estimator = near.fee_estimator();
    assert_eq!(estimator.congestion().await, Congestion::VeryHigh);

    let registry = Arc::new(
        HandlerRegistry::new()
            .with_handler(Arc::new(near), Arc::new(estimator))
            .unwrap(),
    );
    let manager = WalletManager::new(registry);
    let low = manager.estimate_fee(Chain::Near, FeePriority::Low).await.unwrap();
    let urgent = manager.estimate_fee(Chain::Near, FeePriority::Urgent).await.unwrap();

    assert_eq!(low.congestion, Congestion::VeryHigh);
    assert_eq!(urgent.congestion, Congestion::VeryHigh);
    assert!(urgent.fee_per_unit > low.fee_per_unit);
    assert!(urgent.estimated_confirmation_secs < low.estimated_confirmation_secs);
    assert_eq!(low.unit, "yocto/gas");
}

#[tokio::test]
async fn safe_proposal_approved_by_local_wallets() {
    const SAFE: &str = "0x1111111111111111111111111111111111111111";
    const RELAYER: &str = "0x000000000000000000000000000000000000b0b0";

    let word = |n: u64| format!("{:064x}", n);
    let owner = |n: u8| {
        format!(
            "{:0>64}",
            hex::encode(chain_eth::address::address_from_private_key(&key(n)).unwrap())
        )
    };

    let transport = Arc::new(MockTransport::new());
    transport.push(
        "eth_call",
        json!(format!("0x{}{}{}{}{}", word(32), word(3), owner(1), owner(2), owner(3))),
    );
    transport.push("eth_call", json!(format!("0x{}", word(2))));
    transport.push("eth_call", json!(format!("0x{}", word(5))));
    transport.push("eth_sendTransaction", json!("0xsafe"));

    let adapter = EvmAdapter::new(Chain::Sepolia, transport.clone(), RetryPolicy::none())
        .unwrap()
        .with_relayer(RELAYER)
        .unwrap();
    let fees = EvmFeeEstimator::new(Chain::Sepolia, transport.clone(), RetryPolicy::none());
    let registry = Arc::new(
        HandlerRegistry::new()
            .with_handler(Arc::new(adapter), Arc::new(fees))
            .unwrap(),
    );
    let manager = WalletManager::new(registry)
        .with_custody(fast_keystore())
        .with_confirmation(ConfirmationPolicy::no_wait());

    let safe = manager
        .connect_multisig_wallet("alice", Chain::Sepolia, "ops safe", SAFE)
        .await
        .unwrap();
    assert_eq!(safe.threshold, Some(2));
    assert_eq!(safe.signers, vec![eth_address(1), eth_address(2), eth_address(3)]);

    let first = manager
        .import_wallet("alice", Chain::Sepolia, "signer 1", &hex::encode(key(1)), "pw-1")
        .await
        .unwrap();
    let second = manager
        .import_wallet("alice", Chain::Sepolia, "signer 2", &hex::encode(key(2)), "pw-2")
        .await
        .unwrap();
    assert_eq!(first.address, eth_address(1));

    let outcome = manager
        .send_transaction("alice", safe.id, SendRequest::new(RELAYER, "10"), "")
        .await
        .unwrap();
    let proposal = outcome.proposal().unwrap();
    assert_eq!(proposal.approval.encoding, MessageEncoding::StructuredTypedData);

    let err = manager
        .approve_proposal("alice", first.id, proposal.id, "pw-2")
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::InvalidPassphrase));

    let collecting = manager
        .approve_proposal("alice", first.id, proposal.id, "pw-1")
        .await
        .unwrap();
    assert_eq!(collecting.state, ProposalState::Collecting);

    let executed = manager
        .approve_proposal("alice", second.id, proposal.id, "pw-2")
        .await
        .unwrap();
    assert_eq!(executed.state, ProposalState::Executed);
    assert_eq!(executed.tx_hash.as_deref(), Some("0xsafe"));
    assert_eq!(transport.call_count("eth_sendTransaction"), 1);

    let call = transport.last_params("eth_sendTransaction").unwrap();
    assert_eq!(call[0]["to"].as_str().unwrap().to_lowercase(), SAFE);
    assert!(call[0]["data"].as_str().unwrap().starts_with("0x6a761202"));
}

#[test]
fn config_drives_the_registry() {
    let config = WalletConfig::from_toml_str(
        r#"
        [[networks]]
        chain = "sepolia"
        rpc_url = "http://127.0.0.1:8545"
        relayer = "0x000000000000000000000000000000000000dEaD"

        [[networks]]
        chain = "solana-devnet"

        [keystore]
        memory_kib = 1024
        iterations = 1
        parallelism = 1
        "#,
    )
    .unwrap();
    let manager = WalletManager::from_config(&config).unwrap();
    assert_eq!(manager.registry().chains(), vec![Chain::Sepolia, Chain::SolanaDevnet]);
}
