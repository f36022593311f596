use std::sync::Arc;

use alloy_primitives::Address;
use xswap_core::{Amount, AssetId, Recipient, RecoveryToken, RevertPolicy, SettlementOutcome, SwapInstruction};

use crate::error::SettlementError;
use crate::traits::{AssetLedger, Gateway};
use crate::types::{Debit, Delivery};

/// Allowances granted to the gateway for one outbound request.
///
/// Approvals are recorded as they are granted. If a later approval or the
/// delivery request itself fails, [`DebitReservation::release`] resets every
/// recorded allowance to zero, so no authorization outlives a failed request.
pub struct DebitReservation {
    assets: Arc<dyn AssetLedger>,
    owner: Address,
    spender: Address,
    granted: Vec<Debit>,
}

impl DebitReservation {
    pub fn new(assets: Arc<dyn AssetLedger>, owner: Address, spender: Address) -> Self {
        Self {
            assets,
            owner,
            spender,
            granted: Vec::new(),
        }
    }

    /// Authorize the spender to pull `amount` of `asset`.
    pub async fn reserve(&mut self, asset: AssetId, amount: Amount) -> Result<(), SettlementError> {
        let approved = match self
            .assets
            .approve(asset, self.owner, self.spender, amount)
            .await
        {
            Ok(approved) => approved,
            Err(err) => {
                self.release().await;
                return Err(err);
            }
        };
        if !approved {
            tracing::warn!(%asset, amount, "approval refused");
            self.release().await;
            return Err(SettlementError::ApprovalFailed { asset, amount });
        }
        self.granted.push(Debit { asset, amount });
        Ok(())
    }

    /// Reset every granted allowance to zero.
    pub async fn release(&mut self) {
        for debit in self.granted.drain(..) {
            match self
                .assets
                .approve(debit.asset, self.owner, self.spender, 0)
                .await
            {
                Ok(true) => {}
                Ok(false) | Err(_) => {
                    tracing::error!(asset = %debit.asset, amount = debit.amount, "failed to release allowance");
                }
            }
        }
    }

    pub fn granted(&self) -> &[Debit] {
        &self.granted
    }

    /// The request went through; the gateway consumed the allowances.
    pub fn consume(self) -> Vec<Debit> {
        self.granted
    }
}

/// Delivers swap output: outbound through the gateway, or by a direct
/// transfer on the settlement chain.
pub struct SettlementDispatcher {
    assets: Arc<dyn AssetLedger>,
    gateway: Arc<dyn Gateway>,
    engine: Address,
    gas_limit: u64,
}

impl SettlementDispatcher {
    pub fn new(
        assets: Arc<dyn AssetLedger>,
        gateway: Arc<dyn Gateway>,
        engine: Address,
        gas_limit: u64,
    ) -> Self {
        Self {
            assets,
            gateway,
            engine,
            gas_limit,
        }
    }

    /// Deliver `outcome` as `instruction` asks. Outbound requests carry
    /// `token` so a failed delivery can be recovered.
    pub async fn dispatch(
        &self,
        instruction: &SwapInstruction,
        outcome: &SettlementOutcome,
        token: &RecoveryToken,
    ) -> Result<Delivery, SettlementError> {
        if instruction.withdraw() {
            let policy = RevertPolicy::with_recovery(self.engine, token, self.gas_limit);
            self.withdraw(&instruction.recipient, outcome, policy).await
        } else {
            self.transfer_locally(&instruction.recipient, outcome).await
        }
    }

    /// Authorize the gateway for the output and the fee, then request the
    /// outbound delivery.
    pub async fn withdraw(
        &self,
        recipient: &Recipient,
        outcome: &SettlementOutcome,
        policy: RevertPolicy,
    ) -> Result<Delivery, SettlementError> {
        let target = outcome.delivered_asset;
        let mut reservation =
            DebitReservation::new(self.assets.clone(), self.engine, self.gateway.address());

        match outcome.fee_asset {
            Some(fee_asset) if fee_asset == target => {
                let total = outcome
                    .output_amount
                    .checked_add(outcome.fee_amount)
                    .ok_or_else(|| SettlementError::Internal("output plus fee overflows".into()))?;
                reservation.reserve(target, total).await?;
            }
            Some(fee_asset) => {
                reservation.reserve(fee_asset, outcome.fee_amount).await?;
                reservation.reserve(target, outcome.output_amount).await?;
            }
            None => reservation.reserve(target, outcome.output_amount).await?,
        }

        let id = match self
            .gateway
            .request_delivery(
                self.engine,
                recipient.clone(),
                outcome.output_amount,
                target,
                policy,
            )
            .await
        {
            Ok(id) => id,
            Err(err) => {
                reservation.release().await;
                return Err(err);
            }
        };

        tracing::info!(
            delivery_id = %id,
            asset = %target,
            amount = outcome.output_amount,
            %recipient,
            "withdrawal dispatched"
        );
        Ok(Delivery::Outbound {
            id,
            authorized_debits: reservation.consume(),
        })
    }

    /// Transfer the output to the first 20 bytes of `recipient`.
    pub async fn transfer_locally(
        &self,
        recipient: &Recipient,
        outcome: &SettlementOutcome,
    ) -> Result<Delivery, SettlementError> {
        let to = recipient.to_local_address()?;
        let asset = outcome.delivered_asset;
        let amount = outcome.output_amount;

        if !self.assets.transfer(asset, self.engine, to, amount).await? {
            return Err(SettlementError::TransferFailed(format!(
                "{amount} of {asset} to {to}"
            )));
        }

        tracing::info!(%asset, amount, %to, "delivered locally");
        Ok(Delivery::Local { to })
    }
}
