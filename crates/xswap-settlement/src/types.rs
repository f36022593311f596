use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::OwnedMutexGuard;
use xswap_core::{Amount, AssetId, DeliveryId, GasPlan, Recipient, SettlementOutcome, SwapInstruction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckpointId(pub u64);

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cp-{}", self.0)
    }
}

/// An open [`ExecutionHost`](crate::traits::ExecutionHost) checkpoint.
///
/// Owns the host's transaction lock. Dropping a checkpoint without
/// committing or rolling it back (a panicking or cancelled invocation)
/// releases the lock; the host then restores the abandoned snapshot when the
/// next checkpoint opens.
#[derive(Debug)]
pub struct Checkpoint {
    id: CheckpointId,
    _tx: OwnedMutexGuard<()>,
}

impl Checkpoint {
    pub fn new(id: CheckpointId, tx: OwnedMutexGuard<()>) -> Self {
        Self { id, _tx: tx }
    }

    pub fn id(&self) -> CheckpointId {
        self.id
    }
}

/// A direct swap submitted by a settlement-chain account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub input_asset: AssetId,
    pub amount: Amount,
    pub target_asset: AssetId,
    pub recipient: Recipient,
    pub deliver_locally: bool,
}

impl SwapRequest {
    pub fn instruction(&self) -> SwapInstruction {
        SwapInstruction {
            target_asset: self.target_asset,
            recipient: self.recipient.clone(),
            deliver_locally: self.deliver_locally,
        }
    }
}

/// Amount of an asset the engine authorized the gateway to pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Debit {
    pub asset: AssetId,
    pub amount: Amount,
}

/// Where the output went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Delivery {
    /// Handed to the transport for an outbound withdrawal.
    Outbound {
        id: DeliveryId,
        authorized_debits: Vec<Debit>,
    },
    /// Transferred on the settlement chain.
    Local { to: Address },
}

impl Delivery {
    pub fn delivery_id(&self) -> Option<DeliveryId> {
        match self {
            Self::Outbound { id, .. } => Some(*id),
            Self::Local { .. } => None,
        }
    }

    /// Total authorized for `asset` across all debits.
    pub fn authorized(&self, asset: AssetId) -> Amount {
        match self {
            Self::Outbound {
                authorized_debits, ..
            } => authorized_debits
                .iter()
                .filter(|d| d.asset == asset)
                .map(|d| d.amount)
                .sum(),
            Self::Local { .. } => 0,
        }
    }
}

/// Result of a successful deposit or direct swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub sender: Address,
    pub input_asset: AssetId,
    pub input_amount: Amount,
    pub instruction: SwapInstruction,
    pub gas_plan: GasPlan,
    pub outcome: SettlementOutcome,
    pub delivery: Delivery,
}

/// Result of a successful recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryReceipt {
    pub original_sender: Address,
    pub original_asset: AssetId,
    pub reverted_asset: AssetId,
    pub reverted_amount: Amount,
    pub gas_plan: GasPlan,
    pub outcome: SettlementOutcome,
    pub delivery: Delivery,
}
