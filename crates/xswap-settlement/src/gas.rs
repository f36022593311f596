use std::sync::Arc;

use alloy_primitives::Address;
use xswap_core::{Amount, AssetId, FeeQuote, GasPlan};
use xswap_routing::SwapRouter;

use crate::error::SettlementError;
use crate::traits::AssetLedger;

/// Funds the outbound network fee out of the inbound asset.
///
/// The fee is quoted by the target asset's contract and may be payable in a
/// different asset; in that case part of the input is swapped for exactly the
/// fee before the main swap.
pub struct GasResolver {
    assets: Arc<dyn AssetLedger>,
    router: Arc<SwapRouter>,
    engine: Address,
}

impl GasResolver {
    pub fn new(assets: Arc<dyn AssetLedger>, router: Arc<SwapRouter>, engine: Address) -> Self {
        Self {
            assets,
            router,
            engine,
        }
    }

    /// Smallest input amount that can pay for withdrawing `target`.
    pub async fn quote_min_input(
        &self,
        input: AssetId,
        target: AssetId,
    ) -> Result<Amount, SettlementError> {
        let quote = self.assets.withdraw_fee_quote(target).await?;
        self.min_input_for(input, &quote).await
    }

    /// Split `amount` of `input` between the fee for withdrawing `target`
    /// and the main swap.
    ///
    /// Without `withdraw` nothing is reserved. Otherwise the fee is either
    /// set aside directly (input is the fee asset) or bought with an
    /// exact-output swap.
    pub async fn resolve(
        &self,
        input: AssetId,
        amount: Amount,
        target: AssetId,
        withdraw: bool,
    ) -> Result<GasPlan, SettlementError> {
        if !withdraw {
            return Ok(GasPlan::without_fee(amount));
        }

        let quote = self.assets.withdraw_fee_quote(target).await?;
        let min_input = self.min_input_for(input, &quote).await?;
        if amount < min_input {
            tracing::warn!(
                %input,
                %target,
                amount,
                min_input,
                "input does not cover the withdrawal fee"
            );
            return Err(SettlementError::InsufficientAmount {
                available: amount,
                required: min_input,
            });
        }

        let reserved = if input == quote.fee_asset || quote.fee_amount == 0 {
            quote.fee_amount
        } else {
            self.router
                .swap_for_exact_output(self.engine, input, amount, quote.fee_asset, quote.fee_amount)
                .await?
        };

        let available = amount
            .checked_sub(reserved)
            .ok_or(SettlementError::InsufficientAmount {
                available: amount,
                required: reserved,
            })?;

        let plan = GasPlan {
            fee_asset: Some(quote.fee_asset),
            fee_amount: quote.fee_amount,
            amount_reserved_for_fee: reserved,
            amount_available_for_swap: available,
        };
        tracing::debug!(
            %input,
            fee_asset = %quote.fee_asset,
            fee_amount = quote.fee_amount,
            reserved,
            available,
            "gas plan resolved"
        );
        Ok(plan)
    }

    async fn min_input_for(&self, input: AssetId, quote: &FeeQuote) -> Result<Amount, SettlementError> {
        if input == quote.fee_asset || quote.fee_amount == 0 {
            return Ok(quote.fee_amount);
        }
        Ok(self
            .router
            .required_input_for(input, quote.fee_asset, quote.fee_amount)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;

    fn resolver() -> (Arc<crate::InternalChain>, GasResolver) {
        let chain = chain();
        let router = Arc::new(SwapRouter::permissive(chain.clone()));
        let resolver = GasResolver::new(chain.clone(), router, engine());
        (chain, resolver)
    }

    #[tokio::test]
    async fn test_local_delivery_reserves_nothing() {
        let (_, resolver) = resolver();
        let plan = resolver.resolve(usdc(), 1_000, eth(), false).await.unwrap();
        assert_eq!(plan, GasPlan::without_fee(1_000));
    }

    #[tokio::test]
    async fn test_fee_in_input_asset_is_set_aside() {
        let (chain, resolver) = resolver();
        chain.mint(eth(), engine(), 1_000).unwrap();

        let plan = resolver.resolve(eth(), 1_000, eth(), true).await.unwrap();
        assert_eq!(plan.fee_asset, Some(eth()));
        assert_eq!(plan.amount_reserved_for_fee, 10);
        assert_eq!(plan.amount_available_for_swap, 990);
        // Nothing was swapped.
        assert_eq!(chain.balance(eth(), engine()), 1_000);
    }

    #[tokio::test]
    async fn test_min_input_two_hops() {
        let (_, resolver) = resolver();
        // 10 eth costs 11 bridge, which costs 12 usdc.
        assert_eq!(resolver.quote_min_input(usdc(), eth()).await.unwrap(), 12);
        assert_eq!(resolver.quote_min_input(eth(), eth()).await.unwrap(), 10);
        // 20 bridge straight from one pool.
        assert_eq!(resolver.quote_min_input(eth(), usdc()).await.unwrap(), 21);
    }

    #[tokio::test]
    async fn test_fee_bought_with_exact_output_swap() {
        let (chain, resolver) = resolver();
        chain.mint(usdc(), engine(), 1_000).unwrap();

        let plan = resolver.resolve(usdc(), 1_000, eth(), true).await.unwrap();
        assert_eq!(plan.amount_reserved_for_fee, 12);
        assert_eq!(plan.amount_available_for_swap, 988);
        assert_eq!(plan.total_input(), 1_000);
        assert_eq!(chain.balance(eth(), engine()), 10);
        assert_eq!(chain.balance(usdc(), engine()), 988);
    }

    #[tokio::test]
    async fn test_below_min_input_rejected() {
        let (chain, resolver) = resolver();
        chain.mint(usdc(), engine(), 11).unwrap();

        let result = resolver.resolve(usdc(), 11, eth(), true).await;
        assert!(matches!(
            result,
            Err(SettlementError::InsufficientAmount {
                available: 11,
                required: 12
            })
        ));
        assert_eq!(chain.balance(usdc(), engine()), 11);
    }

    #[tokio::test]
    async fn test_exact_fee_leaves_nothing_to_swap() {
        let (chain, resolver) = resolver();
        chain.mint(eth(), engine(), 10).unwrap();
        let plan = resolver.resolve(eth(), 10, eth(), true).await.unwrap();
        assert_eq!(plan.amount_available_for_swap, 0);
    }

    #[tokio::test]
    async fn test_unknown_target_asset() {
        let (_, resolver) = resolver();
        let unknown = AssetId::repeat_byte(0x44);
        assert!(matches!(
            resolver.resolve(usdc(), 100, unknown, true).await,
            Err(SettlementError::UnknownAsset(_))
        ));
    }
}
