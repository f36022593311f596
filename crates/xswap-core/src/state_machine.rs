use std::fmt;

use crate::error::CoreError;

/// Lifecycle of an outbound delivery request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DeliveryState {
    /// Submitted to the transport, outcome unknown.
    Pending,
    /// Delivered on the destination chain. Final state.
    Delivered,
    /// Delivery failed and the funds are back on the settlement chain,
    /// awaiting the revert callback.
    Reverted,
    /// The revert callback re-routed the funds to the original sender. Final state.
    Recovered,
    /// The transport refunded the funds on the settlement chain. Final state.
    LocallyDelivered,
}

impl DeliveryState {
    /// Whether this is a final (terminal) state.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            Self::Delivered | Self::Recovered | Self::LocallyDelivered
        )
    }
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Delivered => write!(f, "Delivered"),
            Self::Reverted => write!(f, "Reverted"),
            Self::Recovered => write!(f, "Recovered"),
            Self::LocallyDelivered => write!(f, "LocallyDelivered"),
        }
    }
}

/// Events that trigger delivery state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryEvent {
    /// The destination chain confirmed the delivery.
    Confirmed,
    /// The transport reported the delivery failed.
    Reverted,
    /// The recovery handler submitted the final outbound request.
    RecoverySubmitted,
    /// The transport gave up and refunded on the settlement chain.
    Aborted,
}

/// Delivery state transitions.
///
/// Valid transitions:
/// - Pending → Delivered (Confirmed)
/// - Pending → Reverted (Reverted)
/// - Pending → LocallyDelivered (Aborted)
/// - Reverted → Recovered (RecoverySubmitted)
/// - Reverted → LocallyDelivered (Aborted)
///
/// A request leaves `Reverted` exactly once, so recovery runs at most once.
pub struct DeliveryStateMachine;

impl DeliveryStateMachine {
    pub fn transition(
        current: DeliveryState,
        event: DeliveryEvent,
    ) -> Result<DeliveryState, CoreError> {
        let new_state = match (current, event) {
            (DeliveryState::Pending, DeliveryEvent::Confirmed) => DeliveryState::Delivered,
            (DeliveryState::Pending, DeliveryEvent::Reverted) => DeliveryState::Reverted,
            (DeliveryState::Pending, DeliveryEvent::Aborted) => DeliveryState::LocallyDelivered,

            (DeliveryState::Reverted, DeliveryEvent::RecoverySubmitted) => DeliveryState::Recovered,
            (DeliveryState::Reverted, DeliveryEvent::Aborted) => DeliveryState::LocallyDelivered,

            _ => {
                let target = match event {
                    DeliveryEvent::Confirmed => DeliveryState::Delivered,
                    DeliveryEvent::Reverted => DeliveryState::Reverted,
                    DeliveryEvent::RecoverySubmitted => DeliveryState::Recovered,
                    DeliveryEvent::Aborted => DeliveryState::LocallyDelivered,
                };
                return Err(CoreError::InvalidStateTransition {
                    from: current,
                    to: target,
                });
            }
        };

        tracing::debug!(
            from = %current,
            to = %new_state,
            event = ?event,
            "delivery state transition"
        );

        Ok(new_state)
    }

    pub fn can_transition(current: DeliveryState, event: DeliveryEvent) -> bool {
        Self::transition(current, event).is_ok()
    }
}
