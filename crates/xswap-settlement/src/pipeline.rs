use std::sync::Arc;

use alloy_primitives::Address;
use xswap_core::{Amount, AssetId, GasPlan, SettlementOutcome};
use xswap_routing::SwapRouter;

use crate::error::SettlementError;
use crate::gas::GasResolver;

/// Fee resolution followed by the main exact-input swap.
///
/// Shared by first deliveries and recovery.
pub struct SwapPipeline {
    gas: GasResolver,
    router: Arc<SwapRouter>,
    engine: Address,
}

impl SwapPipeline {
    pub fn new(gas: GasResolver, router: Arc<SwapRouter>, engine: Address) -> Self {
        Self {
            gas,
            router,
            engine,
        }
    }

    pub fn gas(&self) -> &GasResolver {
        &self.gas
    }

    /// Convert `amount` of `input` into `target`, first funding the
    /// withdrawal fee when `withdraw` is set.
    pub async fn run(
        &self,
        input: AssetId,
        amount: Amount,
        target: AssetId,
        withdraw: bool,
    ) -> Result<(GasPlan, SettlementOutcome), SettlementError> {
        let plan = self.gas.resolve(input, amount, target, withdraw).await?;
        let output_amount = self
            .router
            .convert(self.engine, input, plan.amount_available_for_swap, target)
            .await?;

        let outcome = SettlementOutcome {
            output_amount,
            fee_asset: plan.fee_asset,
            fee_amount: plan.fee_amount,
            delivered_asset: target,
        };
        tracing::debug!(
            %input,
            %target,
            amount,
            swapped = plan.amount_available_for_swap,
            output_amount,
            "swap pipeline complete"
        );
        Ok((plan, outcome))
    }
}
