//! xswap Settlement Layer
//!
//! Turns an inbound deposit and its instruction into a delivered asset:
//! funds the outbound network fee from the deposit, swaps into the target
//! asset, then withdraws it to another chain or transfers it locally. A
//! failed withdrawal comes back through the recovery handler, which swaps
//! the funds back and returns them to the original sender.

pub mod adapters;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod events;
#[cfg(test)]
mod fixtures;
pub mod gas;
pub mod pipeline;
pub mod recovery;
pub mod traits;
pub mod types;

pub use adapters::internal::{InternalChain, OutboundDelivery, RevertResolution};
pub use dispatcher::{DebitReservation, SettlementDispatcher};
pub use engine::{Collaborators, SwapEngine};
pub use error::SettlementError;
pub use events::{EngineEvent, EventBus};
pub use gas::GasResolver;
pub use pipeline::SwapPipeline;
pub use recovery::RecoveryHandler;
pub use traits::{AssetLedger, DepositHandler, ExecutionHost, Gateway, RevertHandler};
pub use types::{Checkpoint, CheckpointId, Debit, Delivery, RecoveryReceipt, SettlementReceipt, SwapRequest};
