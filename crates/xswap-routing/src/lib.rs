//! xswap Routing: converting one settlement-chain asset into another.
//!
//! This crate provides:
//! - [`LiquidityRouter`]: the pool collaborator interface (UniswapV2-router shaped).
//! - [`amm`]: constant-product pricing used by in-memory pools.
//! - [`path`]: direct or two-hop routes through the canonical bridge asset.
//! - [`SwapRouter`]: exact-output, exact-input and required-input operations
//!   with an optional slippage floor.

pub mod amm;
pub mod error;
pub mod path;
pub mod router;
pub mod traits;

// Re-exports for convenience.
pub use error::RoutingError;
pub use path::route;
pub use router::SwapRouter;
pub use traits::LiquidityRouter;
