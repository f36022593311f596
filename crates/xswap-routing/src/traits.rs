use alloy_primitives::Address;
use async_trait::async_trait;
use xswap_core::{Amount, AssetId};

use crate::error::RoutingError;

/// Liquidity-pool collaborator.
///
/// Shaped after a UniswapV2 router: every amount vector has one entry per
/// path element, the first being the input and the last the output. Swaps
/// pull the input from `caller` and pay the output to `to`.
#[async_trait]
pub trait LiquidityRouter: Send + Sync {
    /// Canonical intermediate asset used when neither side of a pair is it.
    fn bridge_asset(&self) -> AssetId;

    /// Inputs required along `path` to receive exactly `amount_out`.
    async fn get_amounts_in(
        &self,
        amount_out: Amount,
        path: &[AssetId],
    ) -> Result<Vec<Amount>, RoutingError>;

    /// Outputs produced along `path` by spending exactly `amount_in`.
    async fn get_amounts_out(
        &self,
        amount_in: Amount,
        path: &[AssetId],
    ) -> Result<Vec<Amount>, RoutingError>;

    /// Spend at most `amount_in_max` to receive exactly `amount_out`.
    async fn swap_tokens_for_exact_tokens(
        &self,
        caller: Address,
        amount_out: Amount,
        amount_in_max: Amount,
        path: &[AssetId],
        to: Address,
    ) -> Result<Vec<Amount>, RoutingError>;

    /// Spend exactly `amount_in`, receiving at least `amount_out_min`.
    async fn swap_exact_tokens_for_tokens(
        &self,
        caller: Address,
        amount_in: Amount,
        amount_out_min: Amount,
        path: &[AssetId],
        to: Address,
    ) -> Result<Vec<Amount>, RoutingError>;
}
