use alloy_primitives::Address;
use async_trait::async_trait;
use xswap_core::{Amount, AssetId, DeliveryId, FeeQuote, InboundDeposit, Recipient, RevertContext, RevertPolicy};

use crate::error::SettlementError;
use crate::types::{Checkpoint, RecoveryReceipt, SettlementReceipt};

/// Token contracts on the settlement chain.
///
/// `approve`, `transfer` and `transfer_from` report refusal with `Ok(false)`;
/// `Err` is reserved for the ledger itself being unavailable.
#[async_trait]
pub trait AssetLedger: Send + Sync {
    /// Network fee charged for withdrawing `asset` outbound.
    async fn withdraw_fee_quote(&self, asset: AssetId) -> Result<FeeQuote, SettlementError>;

    /// Set the amount of `asset` that `spender` may pull from `owner`.
    async fn approve(
        &self,
        asset: AssetId,
        owner: Address,
        spender: Address,
        amount: Amount,
    ) -> Result<bool, SettlementError>;

    async fn transfer(
        &self,
        asset: AssetId,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<bool, SettlementError>;

    /// Move `amount` from `from` to `to` using the allowance `from` granted `spender`.
    async fn transfer_from(
        &self,
        asset: AssetId,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<bool, SettlementError>;
}

/// Cross-chain transport.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Identity the gateway calls the engine with, and the spender it pulls
    /// withdrawn funds through.
    fn address(&self) -> Address;

    /// Withdraw `amount` of `asset` to `recipient` on the asset's native chain.
    ///
    /// Pulls `amount` of `asset` plus the withdrawal fee from `caller` through
    /// allowances granted to [`Gateway::address`].
    async fn request_delivery(
        &self,
        caller: Address,
        recipient: Recipient,
        amount: Amount,
        asset: AssetId,
        policy: RevertPolicy,
    ) -> Result<DeliveryId, SettlementError>;
}

/// Transaction boundary around one engine invocation.
///
/// Everything the invocation does through the other collaborators between
/// `begin` and `rollback` is undone by `rollback`. A checkpoint dropped
/// without either is treated as rolled back.
#[async_trait]
pub trait ExecutionHost: Send + Sync {
    async fn begin(&self) -> Checkpoint;
    async fn commit(&self, checkpoint: Checkpoint);
    async fn rollback(&self, checkpoint: Checkpoint);
}

/// Receives deposits forwarded by the transport.
#[async_trait]
pub trait DepositHandler: Send + Sync {
    /// Settlement-chain address credited with forwarded deposits.
    fn address(&self) -> Address;

    async fn on_deposit(
        &self,
        caller: Address,
        deposit: InboundDeposit,
    ) -> Result<SettlementReceipt, SettlementError>;
}

/// Receives funds from outbound deliveries that failed.
#[async_trait]
pub trait RevertHandler: Send + Sync {
    async fn on_delivery_reverted(
        &self,
        caller: Address,
        context: RevertContext,
    ) -> Result<RecoveryReceipt, SettlementError>;
}
