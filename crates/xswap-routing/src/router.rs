use std::sync::Arc;

use alloy_primitives::Address;
use xswap_core::{Amount, AssetId, SlippagePolicy};

use crate::error::RoutingError;
use crate::path::route;
use crate::traits::LiquidityRouter;

/// Converts assets through a [`LiquidityRouter`], choosing the path and
/// enforcing the configured minimum-output floor.
pub struct SwapRouter {
    liquidity: Arc<dyn LiquidityRouter>,
    slippage: SlippagePolicy,
}

impl SwapRouter {
    pub fn new(liquidity: Arc<dyn LiquidityRouter>, slippage: SlippagePolicy) -> Self {
        Self {
            liquidity,
            slippage,
        }
    }

    /// A router that accepts any output on exact-input swaps.
    pub fn permissive(liquidity: Arc<dyn LiquidityRouter>) -> Self {
        Self::new(liquidity, SlippagePolicy::permissive())
    }

    pub fn bridge_asset(&self) -> AssetId {
        self.liquidity.bridge_asset()
    }

    pub fn slippage(&self) -> SlippagePolicy {
        self.slippage
    }

    pub fn path(&self, input: AssetId, output: AssetId) -> Result<Vec<AssetId>, RoutingError> {
        route(input, output, self.bridge_asset())
    }

    /// Amount of `input` needed to obtain exactly `exact_output` of `output`.
    pub async fn required_input_for(
        &self,
        input: AssetId,
        output: AssetId,
        exact_output: Amount,
    ) -> Result<Amount, RoutingError> {
        if input == output {
            return Ok(exact_output);
        }
        let path = self.path(input, output)?;
        let amounts = self.liquidity.get_amounts_in(exact_output, &path).await?;
        let needed = first(&amounts)?;

        tracing::debug!(
            %input,
            %output,
            exact_output,
            needed,
            hops = path.len() - 1,
            "quoted required input"
        );
        Ok(needed)
    }

    /// Spend at most `max_input` of `input` to obtain exactly `exact_output`
    /// of `output`. Returns the amount spent.
    pub async fn swap_for_exact_output(
        &self,
        caller: Address,
        input: AssetId,
        max_input: Amount,
        output: AssetId,
        exact_output: Amount,
    ) -> Result<Amount, RoutingError> {
        let path = self.path(input, output)?;
        let amounts = self
            .liquidity
            .swap_tokens_for_exact_tokens(caller, exact_output, max_input, &path, caller)
            .await?;

        let spent = first(&amounts)?;
        if spent > max_input {
            return Err(RoutingError::ExcessiveInputAmount {
                required: spent,
                maximum: max_input,
            });
        }
        let received = last(&amounts)?;
        if received < exact_output {
            return Err(RoutingError::InsufficientOutputAmount {
                received,
                minimum: exact_output,
            });
        }

        tracing::debug!(%input, %output, spent, received, "exact-output swap");
        Ok(spent)
    }

    /// Spend exactly `exact_input` of `input`, requiring at least
    /// `min_output` of `output`. Returns the amount received.
    pub async fn swap_exact_input(
        &self,
        caller: Address,
        input: AssetId,
        exact_input: Amount,
        output: AssetId,
        min_output: Amount,
    ) -> Result<Amount, RoutingError> {
        let path = self.path(input, output)?;
        let amounts = self
            .liquidity
            .swap_exact_tokens_for_tokens(caller, exact_input, min_output, &path, caller)
            .await?;

        let received = last(&amounts)?;
        if received < min_output {
            return Err(RoutingError::InsufficientOutputAmount {
                received,
                minimum: min_output,
            });
        }

        tracing::debug!(%input, %output, exact_input, received, min_output, "exact-input swap");
        Ok(received)
    }

    /// Convert all of `amount` into `output` under the slippage policy.
    ///
    /// Converting an asset into itself is a no-op that returns `amount`.
    pub async fn convert(
        &self,
        caller: Address,
        input: AssetId,
        amount: Amount,
        output: AssetId,
    ) -> Result<Amount, RoutingError> {
        if input == output {
            return Ok(amount);
        }

        let min_output = if self.slippage.is_bounded() {
            let path = self.path(input, output)?;
            let quoted = last(&self.liquidity.get_amounts_out(amount, &path).await?)?;
            self.slippage.min_output(quoted)
        } else {
            0
        };

        self.swap_exact_input(caller, input, amount, output, min_output)
            .await
    }
}

fn first(amounts: &[Amount]) -> Result<Amount, RoutingError> {
    amounts.first().copied().ok_or_else(|| RoutingError::InvalidPath {
        reason: "router returned no amounts".into(),
    })
}

fn last(amounts: &[Amount]) -> Result<Amount, RoutingError> {
    amounts.last().copied().ok_or_else(|| RoutingError::InvalidPath {
        reason: "router returned no amounts".into(),
    })
}
