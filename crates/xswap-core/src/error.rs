use crate::state_machine::DeliveryState;

/// Core protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid address: {0} must be non-zero")]
    InvalidAddress(String),

    #[error("message too short: {len} bytes, compact layout needs at least {min}")]
    MessageTooShort { len: usize, min: usize },

    #[error("abi decode error: {0}")]
    AbiDecode(#[from] alloy_sol_types::Error),

    #[error("recipient must not be empty")]
    EmptyRecipient,

    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid delivery state transition from {from} to {to}")]
    InvalidStateTransition {
        from: DeliveryState,
        to: DeliveryState,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("config io error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}
