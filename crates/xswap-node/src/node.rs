//! The settlement node: one engine wired to an in-memory chain.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::broadcast;
use xswap_core::{Amount, AssetId, FeeQuote, InboundDeposit};
use xswap_settlement::{
    Collaborators, EngineEvent, InternalChain, RecoveryReceipt, RevertResolution,
    SettlementReceipt, SwapEngine,
};

use crate::config::{ChainSeed, NodeConfig};

/// What happened to one replayed deposit.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReplayOutcome {
    Settled {
        receipt: SettlementReceipt,
    },
    /// The outbound delivery was failed on purpose and recovered.
    Recovered {
        receipt: SettlementReceipt,
        recovery: RecoveryReceipt,
    },
    /// The outbound delivery was failed on purpose and the recovery did not
    /// go through.
    RecoveryFailed {
        receipt: SettlementReceipt,
        error: String,
    },
    Rejected {
        error: String,
    },
}

pub struct SettlementNode {
    chain: Arc<InternalChain>,
    engine: SwapEngine,
}

impl SettlementNode {
    pub fn new(config: &NodeConfig) -> Result<Self> {
        config.validate()?;
        let chain = Arc::new(seed_chain(config.engine.gateway, &config.chain)?);
        let engine = SwapEngine::new(
            config.engine.clone(),
            Collaborators::from_chain(chain.clone()),
        )?;
        Ok(Self { chain, engine })
    }

    pub fn chain(&self) -> &InternalChain {
        &self.chain
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.engine.subscribe()
    }

    pub async fn quote_min_input(&self, input: AssetId, target: AssetId) -> Result<Amount> {
        Ok(self.engine.quote_min_input(input, target).await?)
    }

    /// Forward each deposit through the gateway. With `fail_deliveries`,
    /// every outbound delivery is failed to exercise recovery; otherwise it
    /// is confirmed.
    pub async fn replay(
        &self,
        deposits: Vec<InboundDeposit>,
        fail_deliveries: bool,
    ) -> Result<Vec<ReplayOutcome>> {
        let mut outcomes = Vec::with_capacity(deposits.len());
        for deposit in deposits {
            let receipt = match self.chain.deposit_and_call(&self.engine, deposit).await {
                Ok(receipt) => receipt,
                Err(err) => {
                    outcomes.push(ReplayOutcome::Rejected {
                        error: err.to_string(),
                    });
                    continue;
                }
            };

            let Some(id) = receipt.delivery.delivery_id() else {
                outcomes.push(ReplayOutcome::Settled { receipt });
                continue;
            };

            if !fail_deliveries {
                self.chain.confirm_delivery(id).await?;
                outcomes.push(ReplayOutcome::Settled { receipt });
                continue;
            }

            let outcome = match self.chain.fail_delivery(id, &self.engine).await? {
                RevertResolution::Recovered(recovery) => {
                    ReplayOutcome::Recovered { receipt, recovery }
                }
                RevertResolution::CallbackFailed { error, .. } => ReplayOutcome::RecoveryFailed {
                    receipt,
                    error: error.to_string(),
                },
                RevertResolution::Refunded { .. } => ReplayOutcome::Settled { receipt },
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}

fn seed_chain(gateway: alloy_primitives::Address, seed: &ChainSeed) -> Result<InternalChain> {
    let chain = InternalChain::new(gateway, AssetId(seed.bridge_asset));
    for asset in &seed.assets {
        let fee_asset = asset.fee_asset.unwrap_or(asset.address);
        chain.register_asset(
            AssetId(asset.address),
            FeeQuote {
                fee_asset: AssetId(fee_asset),
                fee_amount: Amount::from(asset.fee_amount),
            },
        );
        tracing::debug!(name = %asset.name, address = %asset.address, "seeded asset");
    }
    for pool in &seed.pools {
        chain.add_pool(
            AssetId(pool.asset_a),
            AssetId(pool.asset_b),
            Amount::from(pool.reserve_a),
            Amount::from(pool.reserve_b),
        );
    }
    for balance in &seed.balances {
        chain.mint(
            AssetId(balance.asset),
            balance.holder,
            Amount::from(balance.amount),
        )?;
    }
    tracing::info!(
        assets = seed.assets.len(),
        pools = seed.pools.len(),
        balances = seed.balances.len(),
        "in-memory chain seeded"
    );
    Ok(chain)
}
