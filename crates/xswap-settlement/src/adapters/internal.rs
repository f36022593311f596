use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy_primitives::{address, Address};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use xswap_core::{
    Amount, AssetId, DeliveryEvent, DeliveryId, DeliveryState, DeliveryStateMachine, FeeQuote,
    InboundDeposit, Recipient, RevertContext, RevertPolicy,
};
use xswap_routing::{amm, LiquidityRouter, RoutingError};

use crate::error::SettlementError;
use crate::traits::{AssetLedger, DepositHandler, ExecutionHost, Gateway, RevertHandler};
use crate::types::{Checkpoint, CheckpointId, RecoveryReceipt, SettlementReceipt};

/// Account that collects withdrawal fees.
pub const FEE_COLLECTOR: Address = address!("fefefefefefefefefefefefefefefefefefefefe");

/// An outbound withdrawal tracked by the in-memory gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundDelivery {
    pub id: DeliveryId,
    pub sender: Address,
    pub recipient: Recipient,
    pub asset: AssetId,
    pub amount: Amount,
    pub fee: FeeQuote,
    pub policy: RevertPolicy,
    pub state: DeliveryState,
}

/// How the transport resolved a failed delivery.
#[derive(Debug)]
pub enum RevertResolution {
    /// The revert callback recovered the funds.
    Recovered(RecoveryReceipt),
    /// No callback was requested; the funds were refunded on the settlement chain.
    Refunded {
        to: Address,
        asset: AssetId,
        amount: Amount,
    },
    /// The revert callback failed; the funds stay with the revert address
    /// (or go to the abort address when one is set).
    CallbackFailed { holder: Address, error: SettlementError },
}

#[derive(Debug, Clone)]
struct Pool {
    asset0: AssetId,
    asset1: AssetId,
    reserve0: Amount,
    reserve1: Amount,
}

impl Pool {
    fn reserves(&self, input: AssetId) -> (Amount, Amount) {
        if input == self.asset0 {
            (self.reserve0, self.reserve1)
        } else {
            (self.reserve1, self.reserve0)
        }
    }

    /// The pool after `amount_in` of `input` came in and `amount_out` left.
    fn swapped(&self, input: AssetId, amount_in: Amount, amount_out: Amount) -> Result<Pool, RoutingError> {
        let mut pool = self.clone();
        let (reserve_in, reserve_out) = if input == pool.asset0 {
            (&mut pool.reserve0, &mut pool.reserve1)
        } else {
            (&mut pool.reserve1, &mut pool.reserve0)
        };
        let available = *reserve_out;
        *reserve_in = reserve_in.checked_add(amount_in).ok_or(RoutingError::Overflow)?;
        *reserve_out = available
            .checked_sub(amount_out)
            .ok_or(RoutingError::InsufficientLiquidity {
                required: amount_out,
                available,
            })?;
        Ok(pool)
    }
}

fn pair_key(a: AssetId, b: AssetId) -> (AssetId, AssetId) {
    if a.0 <= b.0 {
        (a, b)
    } else {
        (b, a)
    }
}

/// Chain state covered by checkpoints.
#[derive(Debug, Clone, Default)]
struct ChainState {
    balances: HashMap<(AssetId, Address), Amount>,
    allowances: HashMap<(AssetId, Address, Address), Amount>,
    pools: HashMap<(AssetId, AssetId), Pool>,
    deliveries: HashMap<DeliveryId, OutboundDelivery>,
}

impl ChainState {
    fn balance(&self, asset: AssetId, holder: Address) -> Amount {
        self.balances.get(&(asset, holder)).copied().unwrap_or(0)
    }

    fn allowance(&self, asset: AssetId, owner: Address, spender: Address) -> Amount {
        self.allowances
            .get(&(asset, owner, spender))
            .copied()
            .unwrap_or(0)
    }

    fn credited(&self, asset: AssetId, holder: Address, amount: Amount) -> Result<Amount, SettlementError> {
        self.balance(asset, holder)
            .checked_add(amount)
            .ok_or(SettlementError::BalanceOverflow { asset, holder })
    }

    fn credit(&mut self, asset: AssetId, holder: Address, amount: Amount) -> Result<(), SettlementError> {
        let balance = self.credited(asset, holder, amount)?;
        self.balances.insert((asset, holder), balance);
        Ok(())
    }

    fn debit(&mut self, asset: AssetId, holder: Address, amount: Amount) -> bool {
        match self.balances.get_mut(&(asset, holder)) {
            Some(balance) if *balance >= amount => {
                *balance -= amount;
                true
            }
            _ => amount == 0,
        }
    }

    /// `Ok(false)` when `from` holds less than `amount`. Nothing moves on error.
    fn move_funds(
        &mut self,
        asset: AssetId,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<bool, SettlementError> {
        if self.balance(asset, from) < amount {
            return Ok(false);
        }
        if from == to {
            return Ok(true);
        }
        let credited = self.credited(asset, to, amount)?;
        self.debit(asset, from, amount);
        self.balances.insert((asset, to), credited);
        Ok(true)
    }

    fn reserves(&self, input: AssetId, output: AssetId) -> Result<(Amount, Amount), RoutingError> {
        self.pools
            .get(&pair_key(input, output))
            .map(|pool| pool.reserves(input))
            .ok_or(RoutingError::NoPool {
                a: input,
                b: output,
            })
    }

    /// Move the swap's amounts through every pool on `path`.
    fn execute_swap(
        &mut self,
        caller: Address,
        to: Address,
        path: &[AssetId],
        amounts: &[Amount],
    ) -> Result<(), RoutingError> {
        let (Some(&amount_in), Some(&amount_out)) = (amounts.first(), amounts.last()) else {
            return Err(RoutingError::InvalidPath {
                reason: "no amounts".into(),
            });
        };
        let available = self.balance(path[0], caller);
        if available < amount_in {
            return Err(RoutingError::Execution(format!(
                "caller holds {available} of {}, swap needs {amount_in}",
                path[0]
            )));
        }

        // Every update is computed before any is applied.
        let mut pools = Vec::with_capacity(path.len() - 1);
        for (i, hop) in path.windows(2).enumerate() {
            let key = pair_key(hop[0], hop[1]);
            let pool = self.pools.get(&key).ok_or(RoutingError::NoPool {
                a: hop[0],
                b: hop[1],
            })?;
            pools.push((key, pool.swapped(hop[0], amounts[i], amounts[i + 1])?));
        }
        let output = path[path.len() - 1];
        let mut held = self.balance(output, to);
        if output == path[0] && to == caller {
            held -= amount_in;
        }
        let credited = held.checked_add(amount_out).ok_or(RoutingError::Overflow)?;

        self.debit(path[0], caller, amount_in);
        self.pools.extend(pools);
        self.balances.insert((output, to), credited);
        Ok(())
    }
}

/// In-memory settlement chain.
///
/// Plays every collaborator role at once: token ledger, gateway, execution
/// host and constant-product exchange. Transactions are serialized; a
/// checkpoint holds the transaction lock until it is committed, rolled back
/// or dropped. A dropped checkpoint is rolled back when the next one opens.
pub struct InternalChain {
    gateway: Address,
    bridge: AssetId,
    state: Mutex<ChainState>,
    fee_quotes: DashMap<AssetId, FeeQuote>,
    refused_transfers: DashSet<AssetId>,
    refused_approvals: DashSet<AssetId>,
    tx_lock: Arc<tokio::sync::Mutex<()>>,
    open: Mutex<Option<(CheckpointId, ChainState)>>,
    next_checkpoint: AtomicU64,
}

impl InternalChain {
    pub fn new(gateway: Address, bridge: AssetId) -> Self {
        Self {
            gateway,
            bridge,
            state: Mutex::new(ChainState::default()),
            fee_quotes: DashMap::new(),
            refused_transfers: DashSet::new(),
            refused_approvals: DashSet::new(),
            tx_lock: Arc::new(tokio::sync::Mutex::new(())),
            open: Mutex::new(None),
            next_checkpoint: AtomicU64::new(1),
        }
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open(&self) -> MutexGuard<'_, Option<(CheckpointId, ChainState)>> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `asset` withdrawable, charging `fee` per withdrawal.
    pub fn register_asset(&self, asset: AssetId, fee: FeeQuote) {
        tracing::debug!(%asset, fee_asset = %fee.fee_asset, fee_amount = fee.fee_amount, "registered asset");
        self.fee_quotes.insert(asset, fee);
    }

    pub fn add_pool(&self, a: AssetId, b: AssetId, reserve_a: Amount, reserve_b: Amount) {
        let (asset0, asset1) = pair_key(a, b);
        let (reserve0, reserve1) = if asset0 == a {
            (reserve_a, reserve_b)
        } else {
            (reserve_b, reserve_a)
        };
        self.state().pools.insert(
            (asset0, asset1),
            Pool {
                asset0,
                asset1,
                reserve0,
                reserve1,
            },
        );
    }

    pub fn mint(&self, asset: AssetId, to: Address, amount: Amount) -> Result<(), SettlementError> {
        self.state().credit(asset, to, amount)
    }

    pub fn balance(&self, asset: AssetId, holder: Address) -> Amount {
        self.state().balance(asset, holder)
    }

    pub fn allowance(&self, asset: AssetId, owner: Address, spender: Address) -> Amount {
        self.state().allowance(asset, owner, spender)
    }

    /// Reserves of the `a`/`b` pool ordered as `(reserve_a, reserve_b)`.
    pub fn pool_reserves(&self, a: AssetId, b: AssetId) -> Option<(Amount, Amount)> {
        self.state().reserves(a, b).ok()
    }

    /// Make every transfer of `asset` report refusal.
    pub fn refuse_transfers(&self, asset: AssetId) {
        self.refused_transfers.insert(asset);
    }

    /// Make every approval of `asset` report refusal.
    pub fn refuse_approvals(&self, asset: AssetId) {
        self.refused_approvals.insert(asset);
    }

    pub fn delivery(&self, id: DeliveryId) -> Option<OutboundDelivery> {
        self.state().deliveries.get(&id).cloned()
    }

    pub fn deliveries(&self) -> Vec<OutboundDelivery> {
        let mut all: Vec<_> = self.state().deliveries.values().cloned().collect();
        all.sort_by_key(|d| d.id.0);
        all
    }

    /// Deposit `deposit.amount` to `handler` and forward the call, as the
    /// transport does for a deposit-and-call. A failing call reverts the
    /// credit.
    pub async fn deposit_and_call(
        &self,
        handler: &dyn DepositHandler,
        deposit: InboundDeposit,
    ) -> Result<SettlementReceipt, SettlementError> {
        let receiver = handler.address();
        let (asset, amount) = (deposit.asset, deposit.amount);

        let checkpoint = self.begin().await;
        let credited = self.state().credit(asset, receiver, amount);
        self.commit(checkpoint).await;
        credited?;

        match handler.on_deposit(self.gateway, deposit).await {
            Ok(receipt) => Ok(receipt),
            Err(err) => {
                let checkpoint = self.begin().await;
                self.state().debit(asset, receiver, amount);
                self.commit(checkpoint).await;
                tracing::warn!(%asset, amount, error = %err, "deposit call failed, deposit reverted");
                Err(err)
            }
        }
    }

    /// Mark an outbound delivery as delivered on its destination chain.
    pub async fn confirm_delivery(&self, id: DeliveryId) -> Result<(), SettlementError> {
        let checkpoint = self.begin().await;
        let result = self.apply_event(id, DeliveryEvent::Confirmed).map(|_| ());
        self.commit(checkpoint).await;
        result
    }

    /// Fail an outbound delivery and resolve it per its revert policy.
    ///
    /// The escrowed amount goes back to the policy's revert address. With
    /// `call_on_revert`, `handler` is then invoked with the revert message.
    pub async fn fail_delivery(
        &self,
        id: DeliveryId,
        handler: &dyn RevertHandler,
    ) -> Result<RevertResolution, SettlementError> {
        let checkpoint = self.begin().await;
        let reverted = self.revert_escrow(id);
        self.commit(checkpoint).await;
        let delivery = reverted?;
        let policy = &delivery.policy;

        tracing::info!(
            delivery_id = %id,
            asset = %delivery.asset,
            amount = delivery.amount,
            call_on_revert = policy.call_on_revert,
            "outbound delivery reverted"
        );

        if !policy.call_on_revert {
            let checkpoint = self.begin().await;
            let result = self.apply_event(id, DeliveryEvent::Aborted);
            self.commit(checkpoint).await;
            result?;
            return Ok(RevertResolution::Refunded {
                to: policy.revert_address,
                asset: delivery.asset,
                amount: delivery.amount,
            });
        }

        let context = RevertContext {
            asset: delivery.asset,
            amount: delivery.amount,
            revert_message: policy.revert_message.clone(),
        };
        match handler.on_delivery_reverted(self.gateway, context).await {
            Ok(receipt) => {
                let checkpoint = self.begin().await;
                let result = self.apply_event(id, DeliveryEvent::RecoverySubmitted);
                self.commit(checkpoint).await;
                result?;
                Ok(RevertResolution::Recovered(receipt))
            }
            Err(error) => {
                let checkpoint = self.begin().await;
                let holder = if policy.abort_address.is_zero() {
                    policy.revert_address
                } else {
                    policy.abort_address
                };
                let result = self
                    .abort(id, &delivery)
                    .and_then(|_| self.apply_event(id, DeliveryEvent::Aborted));
                if result.is_ok() {
                    self.commit(checkpoint).await;
                } else {
                    self.rollback(checkpoint).await;
                }
                result?;
                tracing::warn!(delivery_id = %id, %holder, %error, "revert callback failed, delivery aborted");
                Ok(RevertResolution::CallbackFailed { holder, error })
            }
        }
    }

    /// Hand the reverted funds from the revert address to the abort address,
    /// when one is set.
    fn abort(&self, id: DeliveryId, delivery: &OutboundDelivery) -> Result<(), SettlementError> {
        let policy = &delivery.policy;
        if policy.abort_address.is_zero() {
            return Ok(());
        }
        let moved = self.state().move_funds(
            delivery.asset,
            policy.revert_address,
            policy.abort_address,
            delivery.amount,
        )?;
        if !moved {
            tracing::warn!(
                delivery_id = %id,
                holder = %policy.revert_address,
                "revert address no longer holds the reverted funds"
            );
        }
        Ok(())
    }

    /// Transition the delivery to `Reverted` and return its escrow to the
    /// revert address.
    fn revert_escrow(&self, id: DeliveryId) -> Result<OutboundDelivery, SettlementError> {
        let mut state = self.state();
        let delivery = state
            .deliveries
            .get(&id)
            .cloned()
            .ok_or(SettlementError::DeliveryNotFound(id))?;
        let next = DeliveryStateMachine::transition(delivery.state, DeliveryEvent::Reverted)?;

        if !state.move_funds(
            delivery.asset,
            self.gateway,
            delivery.policy.revert_address,
            delivery.amount,
        )? {
            return Err(SettlementError::Internal(format!(
                "gateway escrow short for delivery {id}"
            )));
        }
        let entry = state
            .deliveries
            .get_mut(&id)
            .ok_or(SettlementError::DeliveryNotFound(id))?;
        entry.state = next;
        Ok(entry.clone())
    }

    fn apply_event(&self, id: DeliveryId, event: DeliveryEvent) -> Result<DeliveryState, SettlementError> {
        let mut state = self.state();
        let delivery = state
            .deliveries
            .get_mut(&id)
            .ok_or(SettlementError::DeliveryNotFound(id))?;
        delivery.state = DeliveryStateMachine::transition(delivery.state, event)?;
        Ok(delivery.state)
    }

    fn fee_quote(&self, asset: AssetId) -> Result<FeeQuote, SettlementError> {
        self.fee_quotes
            .get(&asset)
            .map(|q| *q)
            .ok_or(SettlementError::UnknownAsset(asset))
    }
}

#[async_trait]
impl AssetLedger for InternalChain {
    async fn withdraw_fee_quote(&self, asset: AssetId) -> Result<FeeQuote, SettlementError> {
        self.fee_quote(asset)
    }

    async fn approve(
        &self,
        asset: AssetId,
        owner: Address,
        spender: Address,
        amount: Amount,
    ) -> Result<bool, SettlementError> {
        if self.refused_approvals.contains(&asset) {
            return Ok(false);
        }
        self.state().allowances.insert((asset, owner, spender), amount);
        Ok(true)
    }

    async fn transfer(
        &self,
        asset: AssetId,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<bool, SettlementError> {
        if self.refused_transfers.contains(&asset) {
            return Ok(false);
        }
        self.state().move_funds(asset, from, to, amount)
    }

    async fn transfer_from(
        &self,
        asset: AssetId,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<bool, SettlementError> {
        if self.refused_transfers.contains(&asset) {
            return Ok(false);
        }
        let mut state = self.state();
        let allowance = state.allowance(asset, from, spender);
        if allowance < amount || state.balance(asset, from) < amount {
            return Ok(false);
        }
        let moved = state.move_funds(asset, from, to, amount)?;
        if moved {
            state
                .allowances
                .insert((asset, from, spender), allowance - amount);
        }
        Ok(moved)
    }
}

#[async_trait]
impl Gateway for InternalChain {
    fn address(&self) -> Address {
        self.gateway
    }

    async fn request_delivery(
        &self,
        caller: Address,
        recipient: Recipient,
        amount: Amount,
        asset: AssetId,
        policy: RevertPolicy,
    ) -> Result<DeliveryId, SettlementError> {
        if recipient.is_empty() {
            return Err(SettlementError::InvalidRecipient("recipient is empty".into()));
        }
        let fee = self.fee_quote(asset)?;

        // Total pulled per asset; the fee and the amount share an allowance
        // when they are the same asset.
        let mut pulls: Vec<(AssetId, Amount)> = vec![(asset, amount)];
        if fee.fee_amount > 0 {
            match pulls.iter_mut().find(|(a, _)| *a == fee.fee_asset) {
                Some((_, total)) => {
                    *total = total.checked_add(fee.fee_amount).ok_or_else(|| {
                        SettlementError::DeliveryRejected(format!("{amount} plus fee overflows"))
                    })?
                }
                None => pulls.push((fee.fee_asset, fee.fee_amount)),
            }
        }

        let mut state = self.state();
        for &(pull_asset, total) in &pulls {
            let allowance = state.allowance(pull_asset, caller, self.gateway);
            if allowance < total {
                return Err(SettlementError::DeliveryRejected(format!(
                    "allowance {allowance} of {pull_asset} below {total}"
                )));
            }
            let balance = state.balance(pull_asset, caller);
            if balance < total {
                return Err(SettlementError::DeliveryRejected(format!(
                    "balance {balance} of {pull_asset} below {total}"
                )));
            }
        }

        for &(pull_asset, total) in &pulls {
            let allowance = state.allowance(pull_asset, caller, self.gateway);
            state
                .allowances
                .insert((pull_asset, caller, self.gateway), allowance - total);
        }
        if fee.fee_amount > 0 {
            state.move_funds(fee.fee_asset, caller, FEE_COLLECTOR, fee.fee_amount)?;
        }
        state.move_funds(asset, caller, self.gateway, amount)?;

        let id = DeliveryId::new();
        state.deliveries.insert(
            id,
            OutboundDelivery {
                id,
                sender: caller,
                recipient: recipient.clone(),
                asset,
                amount,
                fee,
                policy,
                state: DeliveryState::Pending,
            },
        );
        drop(state);

        tracing::info!(
            delivery_id = %id,
            %asset,
            amount,
            %recipient,
            fee_asset = %fee.fee_asset,
            fee_amount = fee.fee_amount,
            "outbound delivery requested"
        );
        Ok(id)
    }
}

#[async_trait]
impl ExecutionHost for InternalChain {
    async fn begin(&self) -> Checkpoint {
        let tx = self.tx_lock.clone().lock_owned().await;
        let mut open = self.open();
        if let Some((abandoned, snapshot)) = open.take() {
            *self.state() = snapshot;
            tracing::warn!(checkpoint = %abandoned, "abandoned checkpoint rolled back");
        }
        let id = CheckpointId(self.next_checkpoint.fetch_add(1, Ordering::Relaxed));
        *open = Some((id, self.state().clone()));
        tracing::trace!(checkpoint = %id, "checkpoint opened");
        Checkpoint::new(id, tx)
    }

    async fn commit(&self, checkpoint: Checkpoint) {
        let id = checkpoint.id();
        let mut open = self.open();
        match open.take() {
            Some((current, _)) if current == id => {
                tracing::trace!(checkpoint = %id, "checkpoint committed")
            }
            other => {
                *open = other;
                tracing::warn!(checkpoint = %id, "commit of unknown checkpoint");
            }
        }
    }

    async fn rollback(&self, checkpoint: Checkpoint) {
        let id = checkpoint.id();
        let mut open = self.open();
        match open.take() {
            Some((current, snapshot)) if current == id => {
                *self.state() = snapshot;
                tracing::debug!(checkpoint = %id, "checkpoint rolled back");
            }
            other => {
                *open = other;
                tracing::warn!(checkpoint = %id, "rollback of unknown checkpoint");
            }
        }
    }
}

#[async_trait]
impl LiquidityRouter for InternalChain {
    fn bridge_asset(&self) -> AssetId {
        self.bridge
    }

    async fn get_amounts_in(
        &self,
        amount_out: Amount,
        path: &[AssetId],
    ) -> Result<Vec<Amount>, RoutingError> {
        let state = self.state();
        amm::get_amounts_in(amount_out, path, |a, b| state.reserves(a, b))
    }

    async fn get_amounts_out(
        &self,
        amount_in: Amount,
        path: &[AssetId],
    ) -> Result<Vec<Amount>, RoutingError> {
        let state = self.state();
        amm::get_amounts_out(amount_in, path, |a, b| state.reserves(a, b))
    }

    async fn swap_tokens_for_exact_tokens(
        &self,
        caller: Address,
        amount_out: Amount,
        amount_in_max: Amount,
        path: &[AssetId],
        to: Address,
    ) -> Result<Vec<Amount>, RoutingError> {
        let mut state = self.state();
        let amounts = amm::get_amounts_in(amount_out, path, |a, b| state.reserves(a, b))?;
        if amounts[0] > amount_in_max {
            return Err(RoutingError::ExcessiveInputAmount {
                required: amounts[0],
                maximum: amount_in_max,
            });
        }
        state.execute_swap(caller, to, path, &amounts)?;
        Ok(amounts)
    }

    async fn swap_exact_tokens_for_tokens(
        &self,
        caller: Address,
        amount_in: Amount,
        amount_out_min: Amount,
        path: &[AssetId],
        to: Address,
    ) -> Result<Vec<Amount>, RoutingError> {
        let mut state = self.state();
        let amounts = amm::get_amounts_out(amount_in, path, |a, b| state.reserves(a, b))?;
        let received = amounts[amounts.len() - 1];
        if received < amount_out_min {
            return Err(RoutingError::InsufficientOutputAmount {
                received,
                minimum: amount_out_min,
            });
        }
        state.execute_swap(caller, to, path, &amounts)?;
        Ok(amounts)
    }
}
