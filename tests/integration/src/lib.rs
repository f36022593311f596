//! Shared fixtures for the cross-crate settlement tests.

use std::sync::Arc;

use alloy_primitives::Address;
use xswap_core::codec::{encode_compact, encode_structured, BITCOIN_TESTNET};
use xswap_core::{Amount, AssetId, ChainId, EngineConfig, FeeQuote, InboundDeposit, Recipient, SwapInstruction};
use xswap_settlement::{Collaborators, InternalChain, SwapEngine};

pub const RESERVE: Amount = 10_000_000;

pub fn gateway() -> Address {
    Address::repeat_byte(0x9a)
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
/// Bitcoin representation; withdrawal fee paid in itself.
pub fn btc() -> AssetId {
    AssetId::repeat_byte(0x0b)
}
/// Withdrawal fee paid in the bridge asset.
pub fn usdc() -> AssetId {
    AssetId::repeat_byte(0x01)
}
/// Withdrawal fee of 50, paid in itself.
pub fn eth() -> AssetId {
    AssetId::repeat_byte(0x02)
}
/// Withdrawal fee of 500, paid in itself.
pub fn sol() -> AssetId {
    AssetId::repeat_byte(0x05)
}

/// An engine on a seeded in-memory chain.
pub struct TestNet {
    pub chain: Arc<InternalChain>,
    pub engine: SwapEngine,
}

impl TestNet {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut EngineConfig)) -> Self {
        let chain = InternalChain::new(gateway(), bridge());
        for asset in [btc(), usdc(), eth(), sol()] {
            chain.add_pool(asset, bridge(), RESERVE, RESERVE);
        }
        let fees = [
            (btc(), btc(), 1_000),
            (usdc(), bridge(), 20),
            (eth(), eth(), 50),
            (sol(), sol(), 500),
        ];
        for (asset, fee_asset, fee_amount) in fees {
            chain.register_asset(
                asset,
                FeeQuote {
                    fee_asset,
                    fee_amount,
                },
            );
        }
        let chain = Arc::new(chain);

        let mut config = EngineConfig {
            engine_address: Address::repeat_byte(0xee),
            gateway: gateway(),
            router: Address::repeat_byte(0x70),
            owner: Address::repeat_byte(0x0f),
            ..EngineConfig::default()
        };
        adjust(&mut config);

        let engine = match SwapEngine::new(config, Collaborators::from_chain(chain.clone())) {
            Ok(engine) => engine,
            Err(err) => panic!("engine construction failed: {err}"),
        };
        Self { chain, engine }
    }

    pub fn engine_address(&self) -> Address {
        self.engine.address()
    }

    /// Sum of the engine's holdings across every test asset.
    pub fn engine_holdings(&self) -> Amount {
        [btc(), usdc(), eth(), sol(), bridge()]
            .into_iter()
            .map(|asset| self.chain.balance(asset, self.engine_address()))
            .sum()
    }
}

impl Default for TestNet {
    fn default() -> Self {
        Self::new()
    }
}

/// A deposit from an EVM chain using the structured layout.
pub fn evm_deposit(
    asset: AssetId,
    amount: Amount,
    target: AssetId,
    recipient: Recipient,
    deliver_locally: bool,
) -> InboundDeposit {
    let instruction = SwapInstruction {
        target_asset: target,
        recipient,
        deliver_locally,
    };
    InboundDeposit {
        origin_chain_id: ChainId(1),
        asset,
        amount,
        sender: alice(),
        message: encode_structured(&instruction).into(),
    }
}

/// A deposit from Bitcoin testnet using the 40-byte compact layout.
pub fn bitcoin_deposit(amount: Amount, target: AssetId, recipient: Address) -> InboundDeposit {
    InboundDeposit {
        origin_chain_id: BITCOIN_TESTNET,
        asset: btc(),
        amount,
        sender: alice(),
        message: encode_compact(target, recipient, None).into(),
    }
}
