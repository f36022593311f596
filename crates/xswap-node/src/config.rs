//! Node configuration loading and management.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::path::Path;
use xswap_core::EngineConfig;

/// Full configuration for the settlement node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Engine identity and settlement settings.
    #[serde(default = "default_engine")]
    pub engine: EngineConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Initial state of the in-memory chain.
    #[serde(default)]
    pub chain: ChainSeed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Assets, pools and balances the in-memory chain starts with.
///
/// Amounts are `u64` because TOML integers are 64-bit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSeed {
    #[serde(default = "default_bridge_asset")]
    pub bridge_asset: Address,
    #[serde(default)]
    pub assets: Vec<AssetSeed>,
    #[serde(default)]
    pub pools: Vec<PoolSeed>,
    #[serde(default)]
    pub balances: Vec<BalanceSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetSeed {
    pub name: String,
    pub address: Address,
    /// Asset the withdrawal fee is paid in; the asset itself when absent.
    #[serde(default)]
    pub fee_asset: Option<Address>,
    #[serde(default)]
    pub fee_amount: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSeed {
    pub asset_a: Address,
    pub asset_b: Address,
    pub reserve_a: u64,
    pub reserve_b: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSeed {
    pub asset: Address,
    pub holder: Address,
    pub amount: u64,
}

// Default value functions
fn default_engine() -> EngineConfig {
    EngineConfig {
        engine_address: Address::repeat_byte(0xee),
        gateway: Address::repeat_byte(0x9a),
        router: Address::repeat_byte(0x70),
        owner: Address::repeat_byte(0x0f),
        ..EngineConfig::default()
    }
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_bridge_asset() -> Address {
    Address::repeat_byte(0xbb)
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            logging: LoggingConfig::default(),
            chain: ChainSeed::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for ChainSeed {
    /// Two withdrawable assets, each pooled against the bridge asset.
    fn default() -> Self {
        let bridge = default_bridge_asset();
        let usdc = Address::repeat_byte(0x01);
        let eth = Address::repeat_byte(0x02);
        Self {
            bridge_asset: bridge,
            assets: vec![
                AssetSeed {
                    name: "USDC".into(),
                    address: usdc,
                    fee_asset: Some(bridge),
                    fee_amount: 20,
                },
                AssetSeed {
                    name: "ETH".into(),
                    address: eth,
                    fee_asset: None,
                    fee_amount: 10,
                },
            ],
            pools: vec![
                PoolSeed {
                    asset_a: usdc,
                    asset_b: bridge,
                    reserve_a: 1_000_000,
                    reserve_b: 1_000_000,
                },
                PoolSeed {
                    asset_a: eth,
                    asset_b: bridge,
                    reserve_a: 1_000_000,
                    reserve_b: 1_000_000,
                },
            ],
            balances: Vec::new(),
        }
    }
}

impl NodeConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: NodeConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.engine.validate()?;
        if self.chain.bridge_asset.is_zero() {
            anyhow::bail!("chain.bridge_asset must not be zero");
        }
        for asset in &self.chain.assets {
            if asset.address.is_zero() {
                anyhow::bail!("asset {} has a zero address", asset.name);
            }
        }
        match self.logging.format.as_str() {
            "text" | "json" => Ok(()),
            other => anyhow::bail!("unknown log format {other:?}"),
        }
    }
}
