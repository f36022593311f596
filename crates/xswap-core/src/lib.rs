//! xswap core: the data model shared by every layer of the settlement engine.
//!
//! Holds the domain types, the origin-chain message codec, the outbound
//! delivery state machine and the immutable engine configuration snapshot.

pub mod codec;
pub mod config;
pub mod error;
pub mod state_machine;
pub mod types;

pub use codec::{EncodingScheme, MessageCodec};
pub use config::{EngineConfig, SlippagePolicy};
pub use error::CoreError;
pub use state_machine::{DeliveryEvent, DeliveryState, DeliveryStateMachine};
pub use types::{
    Amount, AssetId, ChainId, DeliveryId, FeeQuote, GasPlan, InboundDeposit, Recipient,
    RecoveryToken, RevertContext, RevertPolicy, SettlementOutcome, SwapInstruction,
};
