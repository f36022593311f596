//! Engine events.
//!
//! Events raised during an invocation are buffered and only published once
//! the invocation commits, so a rolled-back invocation emits nothing.

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use xswap_core::{Amount, AssetId, Recipient};

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 1_024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEvent {
    /// A deposit or direct swap completed its main swap.
    TokenSwap {
        sender: Address,
        recipient: Recipient,
        input_asset: AssetId,
        target_asset: AssetId,
        input_amount: Amount,
        output_amount: Amount,
        emitted_at: DateTime<Utc>,
    },
    /// Reverted funds were swapped back and withdrawn to the original sender.
    RecoveryWithdrawal {
        original_sender: Address,
        reverted_asset: AssetId,
        reverted_amount: Amount,
        original_asset: AssetId,
        output_amount: Amount,
        emitted_at: DateTime<Utc>,
    },
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TokenSwap { .. } => "TokenSwap",
            Self::RecoveryWithdrawal { .. } => "RecoveryWithdrawal",
        }
    }
}

/// Fan-out of committed engine events.
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Publish the events of a committed invocation, in order.
    pub fn publish(&self, events: Vec<EngineEvent>) {
        for event in events {
            tracing::info!(event = event.name(), ?event, "engine event");
            // No subscribers is fine.
            let _ = self.tx.send(event);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
