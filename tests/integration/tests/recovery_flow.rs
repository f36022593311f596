//! Integration test: failed outbound deliveries and their recovery.
//!
//! A delivery that reverts comes back to the engine with the recovery token
//! it was sent with; the engine swaps the funds back into the original asset
//! and makes one final, non-recoverable withdrawal to the original sender.

use alloy_primitives::Bytes;
use xswap_core::{CoreError, DeliveryState, Recipient, RevertContext};
use xswap_integration_tests::*;
use xswap_settlement::{EngineEvent, RevertResolution, SettlementError, SettlementReceipt};

async fn outbound_usdc_to_eth(net: &TestNet) -> SettlementReceipt {
    net.chain
        .deposit_and_call(
            &net.engine,
            evm_deposit(usdc(), 100_000, eth(), Recipient::from_address(bob()), false),
        )
        .await
        .expect("deposit should settle")
}

#[tokio::test]
async fn test_reverted_delivery_returns_to_sender() {
    let net = TestNet::new();
    let receipt = outbound_usdc_to_eth(&net).await;
    let id = receipt.delivery.delivery_id().unwrap();
    let reverted_amount = receipt.outcome.output_amount;

    let mut events = net.engine.subscribe();
    let resolution = net.chain.fail_delivery(id, &net.engine).await.unwrap();

    let RevertResolution::Recovered(recovery) = resolution else {
        panic!("expected recovery, got {resolution:?}");
    };
    assert_eq!(recovery.original_sender, alice());
    assert_eq!(recovery.original_asset, usdc());
    assert_eq!(recovery.reverted_asset, eth());
    assert_eq!(recovery.reverted_amount, reverted_amount);
    assert_eq!(recovery.outcome.delivered_asset, usdc());
    assert_eq!(recovery.gas_plan.total_input(), reverted_amount);

    assert_eq!(net.chain.delivery(id).unwrap().state, DeliveryState::Recovered);

    let final_id = recovery.delivery.delivery_id().unwrap();
    let last = net.chain.delivery(final_id).unwrap();
    assert_eq!(last.recipient, Recipient::from_address(alice()));
    assert_eq!(last.asset, usdc());
    assert_eq!(last.amount, recovery.outcome.output_amount);
    assert!(!last.policy.call_on_revert);
    assert!(last.policy.revert_message.is_empty());
    assert_eq!(net.engine_holdings(), 0);

    match events.try_recv().expect("recovery event") {
        EngineEvent::RecoveryWithdrawal {
            original_sender,
            reverted_amount: amount,
            ..
        } => {
            assert_eq!(original_sender, alice());
            assert_eq!(amount, reverted_amount);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_final_attempt_refunds_locally() {
    let net = TestNet::new();
    let receipt = outbound_usdc_to_eth(&net).await;
    let id = receipt.delivery.delivery_id().unwrap();

    let RevertResolution::Recovered(recovery) = net.chain.fail_delivery(id, &net.engine).await.unwrap()
    else {
        panic!("expected recovery");
    };
    let final_id = recovery.delivery.delivery_id().unwrap();

    let resolution = net.chain.fail_delivery(final_id, &net.engine).await.unwrap();
    match resolution {
        RevertResolution::Refunded { to, asset, amount } => {
            assert_eq!(to, alice());
            assert_eq!(asset, usdc());
            assert_eq!(amount, recovery.outcome.output_amount);
        }
        other => panic!("expected local refund, got {other:?}"),
    }
    assert_eq!(
        net.chain.balance(usdc(), alice()),
        recovery.outcome.output_amount
    );
    assert_eq!(
        net.chain.delivery(final_id).unwrap().state,
        DeliveryState::LocallyDelivered
    );
}

#[tokio::test]
async fn test_recovery_runs_at_most_once() {
    let net = TestNet::new();
    let receipt = outbound_usdc_to_eth(&net).await;
    let id = receipt.delivery.delivery_id().unwrap();

    net.chain.fail_delivery(id, &net.engine).await.unwrap();
    let again = net.chain.fail_delivery(id, &net.engine).await;
    assert!(matches!(
        again,
        Err(SettlementError::Core(CoreError::InvalidStateTransition { .. }))
    ));
    // Only the original request and one recovery withdrawal exist.
    assert_eq!(net.chain.deliveries().len(), 2);
}

#[tokio::test]
async fn test_failed_callback_rolls_back_recovery() {
    let net = TestNet::new();
    let receipt = outbound_usdc_to_eth(&net).await;
    let id = receipt.delivery.delivery_id().unwrap();
    let reverted_amount = receipt.outcome.output_amount;
    let pools_before = net.chain.pool_reserves(eth(), bridge());

    net.chain.refuse_approvals(usdc());
    let resolution = net.chain.fail_delivery(id, &net.engine).await.unwrap();

    let RevertResolution::CallbackFailed { holder, error } = resolution else {
        panic!("expected callback failure");
    };
    assert_eq!(holder, net.engine_address());
    assert!(matches!(error, SettlementError::ApprovalFailed { .. }));
    // The recovery swaps were undone; the reverted funds sit with the engine.
    assert_eq!(net.chain.pool_reserves(eth(), bridge()), pools_before);
    assert_eq!(net.chain.balance(eth(), net.engine_address()), reverted_amount);
    assert_eq!(net.chain.allowance(usdc(), net.engine_address(), gateway()), 0);
    assert_eq!(
        net.chain.delivery(id).unwrap().state,
        DeliveryState::LocallyDelivered
    );
    assert_eq!(net.chain.deliveries().len(), 1);
}

#[tokio::test]
async fn test_revert_callback_only_from_gateway() {
    let net = TestNet::new();
    let context = RevertContext {
        asset: eth(),
        amount: 1_000,
        revert_message: Bytes::new(),
    };
    let result = net.engine.on_delivery_reverted(bob(), context).await;
    assert!(matches!(result, Err(SettlementError::Unauthorized { .. })));
}

#[tokio::test]
async fn test_malformed_revert_message_rejected() {
    let net = TestNet::new();
    let context = RevertContext {
        asset: eth(),
        amount: 1_000,
        revert_message: Bytes::from_static(b"not a token"),
    };
    let result = net.engine.on_delivery_reverted(gateway(), context).await;
    assert!(matches!(
        result,
        Err(SettlementError::Core(CoreError::AbiDecode(_)))
    ));
}
