use xswap_core::{Amount, AssetId};

/// Errors that can occur within the routing layer.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("cannot route an asset to itself: {0}")]
    IdenticalAssets(AssetId),

    #[error("invalid path: {reason}")]
    InvalidPath { reason: String },

    #[error("no pool for pair {a} / {b}")]
    NoPool { a: AssetId, b: AssetId },

    #[error("insufficient liquidity: required {required}, available {available}")]
    InsufficientLiquidity { required: Amount, available: Amount },

    #[error("insufficient input amount")]
    InsufficientInputAmount,

    #[error("output amount must be greater than zero")]
    ZeroOutputAmount,

    #[error("insufficient output amount: received {received}, minimum {minimum}")]
    InsufficientOutputAmount { received: Amount, minimum: Amount },

    #[error("excessive input amount: required {required}, maximum {maximum}")]
    ExcessiveInputAmount { required: Amount, maximum: Amount },

    #[error("arithmetic overflow in pool math")]
    Overflow,

    #[error("swap execution failed: {0}")]
    Execution(String),
}
