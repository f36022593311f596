use std::sync::Arc;

use chrono::Utc;
use xswap_core::{Recipient, RecoveryToken, RevertContext, RevertPolicy};

use crate::dispatcher::SettlementDispatcher;
use crate::error::SettlementError;
use crate::events::EngineEvent;
use crate::pipeline::SwapPipeline;
use crate::types::RecoveryReceipt;

/// Routes reverted funds back to the original sender in the original asset.
///
/// The final withdrawal is sent without a revert callback: if it fails too,
/// the transport refunds the original sender on the settlement chain, so
/// recovery runs at most once per original request.
pub struct RecoveryHandler {
    pipeline: Arc<SwapPipeline>,
    dispatcher: Arc<SettlementDispatcher>,
}

impl RecoveryHandler {
    pub fn new(pipeline: Arc<SwapPipeline>, dispatcher: Arc<SettlementDispatcher>) -> Self {
        Self {
            pipeline,
            dispatcher,
        }
    }

    pub async fn recover(
        &self,
        context: &RevertContext,
    ) -> Result<(RecoveryReceipt, EngineEvent), SettlementError> {
        let token = RecoveryToken::decode(&context.revert_message)?;
        if context.amount == 0 {
            return Err(SettlementError::ZeroAmount);
        }

        tracing::info!(
            original_sender = %token.original_sender,
            original_asset = %token.original_asset,
            reverted_asset = %context.asset,
            reverted_amount = context.amount,
            "recovering reverted delivery"
        );

        let (gas_plan, outcome) = self
            .pipeline
            .run(context.asset, context.amount, token.original_asset, true)
            .await?;

        let delivery = self
            .dispatcher
            .withdraw(
                &Recipient::from_address(token.original_sender),
                &outcome,
                RevertPolicy::final_attempt(token.original_sender),
            )
            .await?;

        let event = EngineEvent::RecoveryWithdrawal {
            original_sender: token.original_sender,
            reverted_asset: context.asset,
            reverted_amount: context.amount,
            original_asset: token.original_asset,
            output_amount: outcome.output_amount,
            emitted_at: Utc::now(),
        };
        let receipt = RecoveryReceipt {
            original_sender: token.original_sender,
            original_asset: token.original_asset,
            reverted_asset: context.asset,
            reverted_amount: context.amount,
            gas_plan,
            outcome,
            delivery,
        };
        Ok((receipt, event))
    }
}
