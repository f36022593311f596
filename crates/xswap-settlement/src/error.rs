use alloy_primitives::Address;
use xswap_core::{Amount, AssetId, CoreError, DeliveryId};
use xswap_routing::RoutingError;

/// Settlement-layer errors.
///
/// Every error aborts the invocation that raised it; the host rolls back any
/// asset movement made before the failure.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("unauthorized caller {caller}: only the gateway {gateway} may call")]
    Unauthorized { caller: Address, gateway: Address },

    #[error("approval failed: {amount} of {asset}")]
    ApprovalFailed { asset: AssetId, amount: Amount },

    #[error("transfer failed: {0}")]
    TransferFailed(String),

    #[error("insufficient amount: available {available}, required {required}")]
    InsufficientAmount { available: Amount, required: Amount },

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("delivery not found: {0}")]
    DeliveryNotFound(DeliveryId),

    #[error("delivery rejected: {0}")]
    DeliveryRejected(String),

    #[error("unknown asset: {0}")]
    UnknownAsset(AssetId),

    #[error("balance overflow: {holder} cannot receive more {asset}")]
    BalanceOverflow { asset: AssetId, holder: Address },

    #[error("core error: {0}")]
    Core(#[source] CoreError),

    #[error("routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CoreError> for SettlementError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidAddress(field) => Self::InvalidAddress(field),
            CoreError::EmptyRecipient => Self::InvalidRecipient("recipient is empty".into()),
            CoreError::InvalidRecipient(reason) => Self::InvalidRecipient(reason),
            other => Self::Core(other),
        }
    }
}
