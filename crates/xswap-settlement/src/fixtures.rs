//! Shared test chain: three assets each pooled 1:1 against the bridge asset.

use std::sync::Arc;

use alloy_primitives::Address;
use xswap_core::{AssetId, EngineConfig, FeeQuote};

use crate::adapters::internal::InternalChain;

pub const RESERVE: u128 = 1_000_000;

pub fn gateway() -> Address {
    Address::repeat_byte(0x9a)
}
pub fn engine() -> Address {
    Address::repeat_byte(0xee)
}
pub fn alice() -> Address {
    Address::repeat_byte(0xa1)
}
pub fn bob() -> Address {
    Address::repeat_byte(0xb0)
}
pub fn bridge() -> AssetId {
    AssetId::repeat_byte(0xbb)
}
/// Withdrawal fee paid in the bridge asset.
pub fn usdc() -> AssetId {
    AssetId::repeat_byte(0x01)
}
/// Withdrawal fee paid in itself.
pub fn eth() -> AssetId {
    AssetId::repeat_byte(0x02)
}
/// Withdrawal fee paid in `eth`.
pub fn btc() -> AssetId {
    AssetId::repeat_byte(0x03)
}

pub fn chain() -> Arc<InternalChain> {
    let chain = InternalChain::new(gateway(), bridge());
    for asset in [usdc(), eth(), btc()] {
        chain.add_pool(asset, bridge(), RESERVE, RESERVE);
    }
    chain.register_asset(
        usdc(),
        FeeQuote {
            fee_asset: bridge(),
            fee_amount: 20,
        },
    );
    chain.register_asset(
        eth(),
        FeeQuote {
            fee_asset: eth(),
            fee_amount: 10,
        },
    );
    chain.register_asset(
        btc(),
        FeeQuote {
            fee_asset: eth(),
            fee_amount: 5,
        },
    );
    Arc::new(chain)
}

pub fn config() -> EngineConfig {
    EngineConfig {
        engine_address: engine(),
        gateway: gateway(),
        router: Address::repeat_byte(0x70),
        owner: Address::repeat_byte(0x0f),
        ..EngineConfig::default()
    }
}
