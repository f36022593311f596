use std::path::Path;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::codec::{MessageCodec, BITCOIN_MAINNET, BITCOIN_SIGNET, BITCOIN_TESTNET};
use crate::error::CoreError;
use crate::types::{Amount, ChainId};

const BPS_DENOMINATOR: u128 = 10_000;

/// Immutable configuration snapshot handed to the engine at construction.
///
/// The engine never mutates it; administering these values (ownership,
/// upgrades) happens outside the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// The engine's own identity on the settlement chain.
    #[serde(default)]
    pub engine_address: Address,
    /// The only caller allowed to deliver deposits and revert callbacks.
    #[serde(default)]
    pub gateway: Address,
    /// Liquidity router the engine swaps through.
    #[serde(default)]
    pub router: Address,
    #[serde(default)]
    pub owner: Address,
    /// Gas limit granted to the revert callback of outbound requests.
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    #[serde(default)]
    pub slippage: SlippagePolicy,
    /// Origin chains whose instructions use the compact layout.
    #[serde(default = "default_compact_chains")]
    pub compact_chains: Vec<ChainId>,
}

/// Minimum-output floor applied to the main exact-input swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SlippagePolicy {
    /// Tolerated shortfall against the quoted output, in basis points.
    /// `None` accepts any output.
    #[serde(default)]
    pub max_slippage_bps: Option<u16>,
}

impl SlippagePolicy {
    /// Accept any output.
    pub fn permissive() -> Self {
        Self {
            max_slippage_bps: None,
        }
    }

    pub fn bounded(max_slippage_bps: u16) -> Self {
        Self {
            max_slippage_bps: Some(max_slippage_bps),
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.max_slippage_bps.is_some()
    }

    /// Floor for a swap quoted at `quoted_output`.
    pub fn min_output(&self, quoted_output: Amount) -> Amount {
        match self.max_slippage_bps {
            None => 0,
            Some(bps) => {
                let keep = BPS_DENOMINATOR - u128::from(bps).min(BPS_DENOMINATOR);
                // quoted * keep / 10_000 without overflowing on large quotes
                (quoted_output / BPS_DENOMINATOR) * keep
                    + (quoted_output % BPS_DENOMINATOR) * keep / BPS_DENOMINATOR
            }
        }
    }
}

fn default_gas_limit() -> u64 {
    1_000_000
}

fn default_compact_chains() -> Vec<ChainId> {
    vec![BITCOIN_MAINNET, BITCOIN_TESTNET, BITCOIN_SIGNET]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine_address: Address::ZERO,
            gateway: Address::ZERO,
            router: Address::ZERO,
            owner: Address::ZERO,
            gas_limit: default_gas_limit(),
            slippage: SlippagePolicy::default(),
            compact_chains: default_compact_chains(),
        }
    }
}

impl EngineConfig {
    /// Load config from a TOML file, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: EngineConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Reject zero identities and out-of-range settings.
    pub fn validate(&self) -> Result<(), CoreError> {
        let addresses = [
            ("engine_address", self.engine_address),
            ("gateway", self.gateway),
            ("router", self.router),
            ("owner", self.owner),
        ];
        for (name, address) in addresses {
            if address.is_zero() {
                return Err(CoreError::InvalidAddress(name.into()));
            }
        }
        if let Some(bps) = self.slippage.max_slippage_bps {
            if u128::from(bps) > BPS_DENOMINATOR {
                return Err(CoreError::InvalidConfig(format!(
                    "max_slippage_bps must be at most {}, got {}",
                    BPS_DENOMINATOR, bps
                )));
            }
        }
        Ok(())
    }

    /// Message codec with this config's compact chains.
    pub fn codec(&self) -> MessageCodec {
        MessageCodec::with_compact_chains(self.compact_chains.iter().copied())
    }
}
