use std::sync::Arc;

use alloy_primitives::Address;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use xswap_core::{
    Amount, AssetId, EngineConfig, InboundDeposit, MessageCodec, RecoveryToken, RevertContext,
    SwapInstruction,
};
use xswap_routing::{LiquidityRouter, SwapRouter};

use crate::adapters::internal::InternalChain;
use crate::dispatcher::SettlementDispatcher;
use crate::error::SettlementError;
use crate::events::{EngineEvent, EventBus};
use crate::gas::GasResolver;
use crate::pipeline::SwapPipeline;
use crate::recovery::RecoveryHandler;
use crate::traits::{AssetLedger, DepositHandler, ExecutionHost, Gateway, RevertHandler};
use crate::types::{Checkpoint, RecoveryReceipt, SettlementReceipt, SwapRequest};

/// External systems the engine runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub assets: Arc<dyn AssetLedger>,
    pub gateway: Arc<dyn Gateway>,
    pub liquidity: Arc<dyn LiquidityRouter>,
    pub host: Arc<dyn ExecutionHost>,
}

impl Collaborators {
    /// Every role played by one in-memory chain.
    pub fn from_chain(chain: Arc<InternalChain>) -> Self {
        Self {
            assets: chain.clone(),
            gateway: chain.clone(),
            liquidity: chain.clone(),
            host: chain,
        }
    }
}

/// Cross-chain swap settlement engine.
///
/// Each entry point runs inside one host checkpoint: it either completes
/// every step or rolls all of them back. Events are published only after
/// the checkpoint commits.
pub struct SwapEngine {
    config: EngineConfig,
    codec: MessageCodec,
    assets: Arc<dyn AssetLedger>,
    host: Arc<dyn ExecutionHost>,
    pipeline: Arc<SwapPipeline>,
    dispatcher: Arc<SettlementDispatcher>,
    recovery: RecoveryHandler,
    events: EventBus,
}

impl SwapEngine {
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Result<Self, SettlementError> {
        config.validate()?;
        if collaborators.gateway.address() != config.gateway {
            return Err(SettlementError::InvalidAddress(format!(
                "gateway {} does not match configured gateway {}",
                collaborators.gateway.address(),
                config.gateway
            )));
        }

        let engine = config.engine_address;
        let router = Arc::new(SwapRouter::new(collaborators.liquidity, config.slippage));
        let gas = GasResolver::new(collaborators.assets.clone(), router.clone(), engine);
        let pipeline = Arc::new(SwapPipeline::new(gas, router, engine));
        let dispatcher = Arc::new(SettlementDispatcher::new(
            collaborators.assets.clone(),
            collaborators.gateway,
            engine,
            config.gas_limit,
        ));
        let recovery = RecoveryHandler::new(pipeline.clone(), dispatcher.clone());

        tracing::info!(
            %engine,
            gateway = %config.gateway,
            gas_limit = config.gas_limit,
            max_slippage_bps = ?config.slippage.max_slippage_bps,
            "swap engine initialized"
        );

        Ok(Self {
            codec: config.codec(),
            config,
            assets: collaborators.assets,
            host: collaborators.host,
            pipeline,
            dispatcher,
            recovery,
            events: EventBus::default(),
        })
    }

    pub fn address(&self) -> Address {
        self.config.engine_address
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Receive committed engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Smallest `input` amount that covers the fee for withdrawing `target`.
    pub async fn quote_min_input(
        &self,
        input: AssetId,
        target: AssetId,
    ) -> Result<Amount, SettlementError> {
        self.pipeline.gas().quote_min_input(input, target).await
    }

    /// Settle a deposit forwarded by the gateway. The deposited amount is
    /// already credited to the engine.
    pub async fn on_deposit(
        &self,
        caller: Address,
        deposit: InboundDeposit,
    ) -> Result<SettlementReceipt, SettlementError> {
        self.ensure_gateway(caller)?;
        if deposit.amount == 0 {
            return Err(SettlementError::ZeroAmount);
        }
        deposit.validate()?;

        tracing::info!(
            origin_chain = %deposit.origin_chain_id,
            asset = %deposit.asset,
            amount = deposit.amount,
            sender = %deposit.sender,
            "deposit received"
        );

        let checkpoint = self.host.begin().await;
        let mut events = Vec::new();
        let result = self.settle_deposit(&deposit, &mut events).await;
        self.finish(checkpoint, result, events).await
    }

    /// Pull `request.amount` from `caller` and settle it like a deposit.
    pub async fn swap(
        &self,
        caller: Address,
        request: SwapRequest,
    ) -> Result<SettlementReceipt, SettlementError> {
        if request.amount == 0 {
            return Err(SettlementError::ZeroAmount);
        }
        if request.input_asset.is_zero() {
            return Err(SettlementError::InvalidAddress("input_asset".into()));
        }
        let instruction = request.instruction();
        instruction.validate()?;

        let checkpoint = self.host.begin().await;
        let mut events = Vec::new();
        let result = self.settle_swap(caller, &request, instruction, &mut events).await;
        self.finish(checkpoint, result, events).await
    }

    /// Recover funds from a failed outbound delivery.
    pub async fn on_delivery_reverted(
        &self,
        caller: Address,
        context: RevertContext,
    ) -> Result<RecoveryReceipt, SettlementError> {
        self.ensure_gateway(caller)?;

        let checkpoint = self.host.begin().await;
        let result = self.recovery.recover(&context).await;
        match result {
            Ok((receipt, event)) => self.finish(checkpoint, Ok(receipt), vec![event]).await,
            Err(err) => self.finish(checkpoint, Err(err), Vec::new()).await,
        }
    }

    fn ensure_gateway(&self, caller: Address) -> Result<(), SettlementError> {
        if caller != self.config.gateway {
            tracing::warn!(%caller, gateway = %self.config.gateway, "rejected call from non-gateway");
            return Err(SettlementError::Unauthorized {
                caller,
                gateway: self.config.gateway,
            });
        }
        Ok(())
    }

    async fn settle_deposit(
        &self,
        deposit: &InboundDeposit,
        events: &mut Vec<EngineEvent>,
    ) -> Result<SettlementReceipt, SettlementError> {
        let instruction = self.codec.decode(deposit.origin_chain_id, &deposit.message)?;
        self.settle(deposit.sender, deposit.asset, deposit.amount, instruction, events)
            .await
    }

    async fn settle_swap(
        &self,
        caller: Address,
        request: &SwapRequest,
        instruction: SwapInstruction,
        events: &mut Vec<EngineEvent>,
    ) -> Result<SettlementReceipt, SettlementError> {
        let engine = self.address();
        let pulled = self
            .assets
            .transfer_from(request.input_asset, engine, caller, engine, request.amount)
            .await?;
        if !pulled {
            return Err(SettlementError::TransferFailed(format!(
                "pull {} of {} from {caller}",
                request.amount, request.input_asset
            )));
        }
        self.settle(caller, request.input_asset, request.amount, instruction, events)
            .await
    }

    async fn settle(
        &self,
        sender: Address,
        input_asset: AssetId,
        amount: Amount,
        instruction: SwapInstruction,
        events: &mut Vec<EngineEvent>,
    ) -> Result<SettlementReceipt, SettlementError> {
        let (gas_plan, outcome) = self
            .pipeline
            .run(input_asset, amount, instruction.target_asset, instruction.withdraw())
            .await?;

        events.push(EngineEvent::TokenSwap {
            sender,
            recipient: instruction.recipient.clone(),
            input_asset,
            target_asset: instruction.target_asset,
            input_amount: amount,
            output_amount: outcome.output_amount,
            emitted_at: Utc::now(),
        });

        let token = RecoveryToken {
            original_sender: sender,
            original_asset: input_asset,
        };
        let delivery = self.dispatcher.dispatch(&instruction, &outcome, &token).await?;

        Ok(SettlementReceipt {
            sender,
            input_asset,
            input_amount: amount,
            instruction,
            gas_plan,
            outcome,
            delivery,
        })
    }

    /// Commit and publish on success, roll back and drop the events on failure.
    async fn finish<T>(
        &self,
        checkpoint: Checkpoint,
        result: Result<T, SettlementError>,
        events: Vec<EngineEvent>,
    ) -> Result<T, SettlementError> {
        match result {
            Ok(value) => {
                self.host.commit(checkpoint).await;
                self.events.publish(events);
                Ok(value)
            }
            Err(err) => {
                let id = checkpoint.id();
                self.host.rollback(checkpoint).await;
                tracing::warn!(checkpoint = %id, error = %err, "invocation rolled back");
                Err(err)
            }
        }
    }
}

#[async_trait]
impl DepositHandler for SwapEngine {
    fn address(&self) -> Address {
        self.config.engine_address
    }

    async fn on_deposit(
        &self,
        caller: Address,
        deposit: InboundDeposit,
    ) -> Result<SettlementReceipt, SettlementError> {
        SwapEngine::on_deposit(self, caller, deposit).await
    }
}

#[async_trait]
impl RevertHandler for SwapEngine {
    async fn on_delivery_reverted(
        &self,
        caller: Address,
        context: RevertContext,
    ) -> Result<RecoveryReceipt, SettlementError> {
        SwapEngine::on_delivery_reverted(self, caller, context).await
    }
}
