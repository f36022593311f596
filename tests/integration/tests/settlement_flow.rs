//! Integration test: deposits settled end to end on the in-memory chain.
//!
//! Drives the gateway, the engine and the constant-product pools together:
//! codec selection, fee funding, main swap, and outbound or local delivery.

use std::sync::Arc;
use std::time::Duration;

use xswap_core::{DeliveryState, Recipient, SlippagePolicy};
use xswap_integration_tests::*;
use xswap_settlement::{Delivery, EngineEvent, SettlementError};

// =========================================================================
// Outbound delivery
// =========================================================================

#[tokio::test]
async fn test_bitcoin_deposit_withdraws_outbound() {
    let net = TestNet::new();
    let mut events = net.engine.subscribe();

    let receipt = net
        .chain
        .deposit_and_call(&net.engine, bitcoin_deposit(100_000, eth(), bob()))
        .await
        .expect("deposit should settle");

    // The 40-byte message carries no flag byte, so it withdraws.
    assert!(!receipt.instruction.deliver_locally);
    assert_eq!(receipt.instruction.recipient, Recipient::from_address(bob()));
    assert_eq!(receipt.input_amount, 100_000);
    assert_eq!(receipt.outcome.fee_amount, 50);
    assert_eq!(receipt.gas_plan.total_input(), 100_000);
    assert!(receipt.gas_plan.amount_reserved_for_fee > 0);

    let id = receipt.delivery.delivery_id().expect("outbound delivery");
    let request = net.chain.delivery(id).expect("request recorded");
    assert_eq!(request.asset, eth());
    assert_eq!(request.amount, receipt.outcome.output_amount);
    assert_eq!(request.state, DeliveryState::Pending);
    assert!(request.policy.call_on_revert);
    assert_eq!(net.engine_holdings(), 0);

    match events.try_recv().expect("one event") {
        EngineEvent::TokenSwap {
            input_amount,
            input_asset,
            target_asset,
            ..
        } => {
            assert_eq!(input_amount, 100_000);
            assert_eq!(input_asset, btc());
            assert_eq!(target_asset, eth());
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_fee_asset_equals_input_and_target() {
    let net = TestNet::new();

    let receipt = net
        .chain
        .deposit_and_call(
            &net.engine,
            evm_deposit(eth(), 1_000, eth(), Recipient::from_address(bob()), false),
        )
        .await
        .unwrap();

    assert_eq!(receipt.gas_plan.amount_available_for_swap, 950);
    assert_eq!(receipt.outcome.output_amount, 950);
    assert_eq!(receipt.delivery.authorized(eth()), 1_000);
    // The conversion into the same asset never touched a pool.
    assert_eq!(net.chain.pool_reserves(eth(), bridge()), Some((RESERVE, RESERVE)));
}

#[tokio::test]
async fn test_fee_in_other_asset_authorizes_two_debits() {
    let net = TestNet::new();

    let receipt = net
        .chain
        .deposit_and_call(
            &net.engine,
            evm_deposit(eth(), 100_000, usdc(), Recipient::from_address(bob()), false),
        )
        .await
        .unwrap();

    assert_eq!(receipt.outcome.fee_asset, Some(bridge()));
    let Delivery::Outbound {
        authorized_debits, ..
    } = &receipt.delivery
    else {
        panic!("expected outbound delivery");
    };
    assert_eq!(authorized_debits.len(), 2);
    assert_eq!(receipt.delivery.authorized(bridge()), 20);
    assert_eq!(
        receipt.delivery.authorized(usdc()),
        receipt.outcome.output_amount
    );
}

#[tokio::test]
async fn test_long_recipient_passes_through_outbound() {
    let net = TestNet::new();
    let recipient = Recipient::new(b"tb1qy9pqmk2pd9sv63g27jt8r657wy0d9uee4x2dt2".to_vec());

    let receipt = net
        .chain
        .deposit_and_call(
            &net.engine,
            evm_deposit(eth(), 50_000, btc(), recipient.clone(), false),
        )
        .await
        .unwrap();

    let id = receipt.delivery.delivery_id().unwrap();
    assert_eq!(net.chain.delivery(id).unwrap().recipient, recipient);
}

#[tokio::test]
async fn test_no_leakage_when_input_pays_fee() {
    for amount in [50u128, 51, 999, 123_456] {
        let net = TestNet::new();
        let receipt = net
            .chain
            .deposit_and_call(
                &net.engine,
                evm_deposit(eth(), amount, eth(), Recipient::from_address(bob()), false),
            )
            .await
            .unwrap();
        assert_eq!(receipt.gas_plan.amount_available_for_swap + 50, amount);
    }
}

// =========================================================================
// Rejections leave no trace
// =========================================================================

#[tokio::test]
async fn test_below_min_input_changes_nothing() {
    let net = TestNet::new();
    let mut events = net.engine.subscribe();
    assert_eq!(net.engine.quote_min_input(sol(), sol()).await.unwrap(), 500);

    let result = net
        .chain
        .deposit_and_call(
            &net.engine,
            evm_deposit(sol(), 10, sol(), Recipient::from_address(bob()), false),
        )
        .await;

    assert!(matches!(
        result,
        Err(SettlementError::InsufficientAmount {
            available: 10,
            required: 500
        })
    ));
    assert_eq!(net.engine_holdings(), 0);
    assert!(net.chain.deliveries().is_empty());
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_one_below_quoted_min_input_always_rejected() {
    let net = TestNet::new();
    for (input, target) in [(usdc(), eth()), (btc(), usdc()), (eth(), btc())] {
        let min = net.engine.quote_min_input(input, target).await.unwrap();
        let result = net
            .chain
            .deposit_and_call(
                &net.engine,
                evm_deposit(input, min - 1, target, Recipient::from_address(bob()), false),
            )
            .await;
        assert!(
            matches!(result, Err(SettlementError::InsufficientAmount { .. })),
            "{input} -> {target} with {} should be rejected",
            min - 1
        );
    }
    assert_eq!(net.engine_holdings(), 0);
    for asset in [btc(), usdc(), eth()] {
        assert_eq!(net.chain.pool_reserves(asset, bridge()), Some((RESERVE, RESERVE)));
    }
}

#[tokio::test]
async fn test_deposit_from_non_gateway_rejected() {
    let net = TestNet::new();
    let result = net
        .engine
        .on_deposit(
            alice(),
            evm_deposit(eth(), 1_000, eth(), Recipient::from_address(bob()), true),
        )
        .await;
    assert!(matches!(result, Err(SettlementError::Unauthorized { .. })));
}

// =========================================================================
// Local delivery
// =========================================================================

#[tokio::test]
async fn test_local_delivery_transfers_on_settlement_chain() {
    let net = TestNet::new();

    let receipt = net
        .chain
        .deposit_and_call(
            &net.engine,
            evm_deposit(eth(), 1_000, usdc(), Recipient::from_address(bob()), true),
        )
        .await
        .unwrap();

    assert_eq!(receipt.delivery, Delivery::Local { to: bob() });
    assert_eq!(receipt.gas_plan.fee_asset, None);
    assert_eq!(net.chain.balance(usdc(), bob()), receipt.outcome.output_amount);
    assert!(net.chain.deliveries().is_empty());
    assert_eq!(net.engine_holdings(), 0);
}

#[tokio::test]
async fn test_local_delivery_failure_rolls_back() {
    let net = TestNet::new();
    net.chain.refuse_transfers(usdc());

    let result = net
        .chain
        .deposit_and_call(
            &net.engine,
            evm_deposit(eth(), 1_000, usdc(), Recipient::from_address(bob()), true),
        )
        .await;

    assert!(matches!(result, Err(SettlementError::TransferFailed(_))));
    assert_eq!(net.chain.balance(usdc(), bob()), 0);
    assert_eq!(net.engine_holdings(), 0);
    assert_eq!(net.chain.pool_reserves(eth(), bridge()), Some((RESERVE, RESERVE)));
    assert_eq!(net.chain.pool_reserves(usdc(), bridge()), Some((RESERVE, RESERVE)));
    assert!(net.chain.deliveries().is_empty());
}

#[tokio::test]
async fn test_balance_overflow_rejected_and_chain_stays_usable() {
    let net = TestNet::new();

    net.chain
        .deposit_and_call(
            &net.engine,
            evm_deposit(eth(), u128::MAX, eth(), Recipient::from_address(bob()), true),
        )
        .await
        .unwrap();
    assert_eq!(net.chain.balance(eth(), bob()), u128::MAX);

    let result = net
        .chain
        .deposit_and_call(
            &net.engine,
            evm_deposit(eth(), 1, eth(), Recipient::from_address(bob()), true),
        )
        .await;
    assert!(matches!(result, Err(SettlementError::BalanceOverflow { .. })));
    assert_eq!(net.chain.balance(eth(), bob()), u128::MAX);
    assert_eq!(net.engine_holdings(), 0);

    let receipt = tokio::time::timeout(
        Duration::from_secs(3),
        net.chain.deposit_and_call(
            &net.engine,
            evm_deposit(eth(), 1_000, eth(), Recipient::from_address(alice()), true),
        ),
    )
    .await
    .expect("chain accepts further deposits")
    .unwrap();
    assert_eq!(receipt.outcome.output_amount, 1_000);
    assert_eq!(net.chain.balance(eth(), alice()), 1_000);
}

// =========================================================================
// Configuration
// =========================================================================

#[tokio::test]
async fn test_bounded_slippage_accepts_quoted_execution() {
    let net = TestNet::with_config(|config| config.slippage = SlippagePolicy::bounded(30));

    let receipt = net
        .chain
        .deposit_and_call(
            &net.engine,
            evm_deposit(eth(), 10_000, usdc(), Recipient::from_address(bob()), true),
        )
        .await
        .unwrap();
    assert!(receipt.outcome.output_amount > 0);
}

// =========================================================================
// Concurrency
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_deposits_are_serialized() {
    let net = Arc::new(TestNet::new());

    let mut handles = Vec::new();
    for _ in 0..16 {
        let net = net.clone();
        handles.push(tokio::spawn(async move {
            net.chain
                .deposit_and_call(
                    &net.engine,
                    evm_deposit(eth(), 1_000, usdc(), Recipient::from_address(bob()), true),
                )
                .await
        }));
    }

    let mut delivered = 0u128;
    for handle in handles {
        let receipt = handle.await.expect("task").expect("deposit should settle");
        delivered += receipt.outcome.output_amount;
    }

    assert_eq!(net.chain.balance(usdc(), bob()), delivered);
    assert_eq!(net.engine_holdings(), 0);
    let (eth_reserve, _) = net.chain.pool_reserves(eth(), bridge()).unwrap();
    assert_eq!(eth_reserve, RESERVE + 16_000);
}
