use alloy_primitives::{Address, Bytes};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::CoreError;

/// Value in atomic token units.
pub type Amount = u128;

/// Length of a settlement-chain address in bytes.
pub const ADDRESS_LEN: usize = 20;

/// Identifier of a connected chain (EVM chain id, or the Bitcoin port numbers
/// used as ids by the transport).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Settlement-chain representation of a token: the address of its asset contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub Address);

impl AssetId {
    pub const fn new(address: Address) -> Self {
        Self(address)
    }

    /// Build an asset id whose address is the given byte repeated 20 times.
    /// Handy for fixtures.
    pub fn repeat_byte(byte: u8) -> Self {
        Self(Address::repeat_byte(byte))
    }

    pub fn address(&self) -> Address {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<Address> for AssetId {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Destination address as opaque bytes.
///
/// EVM recipients are 20 bytes; other chains (e.g. Bitcoin) use longer
/// encodings, so nothing is assumed about the length until local delivery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Recipient(pub Bytes);

impl Recipient {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// The 20-byte packed form of a settlement-chain address.
    pub fn from_address(address: Address) -> Self {
        Self(Bytes::copy_from_slice(address.as_slice()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Read the recipient as a settlement-chain address.
    ///
    /// Takes the leading 20 bytes, mirroring a `bytes20` cast.
    pub fn to_local_address(&self) -> Result<Address, CoreError> {
        if self.0.len() < ADDRESS_LEN {
            return Err(CoreError::InvalidRecipient(format!(
                "local delivery needs at least {} bytes, got {}",
                ADDRESS_LEN,
                self.0.len()
            )));
        }
        Ok(Address::from_slice(&self.0[..ADDRESS_LEN]))
    }
}

impl From<Address> for Recipient {
    fn from(address: Address) -> Self {
        Self::from_address(address)
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

/// A decoded swap instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapInstruction {
    /// Asset the recipient should end up with.
    pub target_asset: AssetId,
    /// Where the output goes.
    pub recipient: Recipient,
    /// Transfer on the settlement chain instead of withdrawing outbound.
    ///
    /// Both wire encodings carry the opposite flag ("withdraw"); an absent
    /// compact flag byte means withdraw, i.e. `deliver_locally == false`.
    pub deliver_locally: bool,
}

impl SwapInstruction {
    /// Whether the output leaves the settlement chain.
    pub fn withdraw(&self) -> bool {
        !self.deliver_locally
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.target_asset.is_zero() {
            return Err(CoreError::InvalidAddress("target_asset".into()));
        }
        if self.recipient.is_empty() {
            return Err(CoreError::EmptyRecipient);
        }
        Ok(())
    }
}

/// A deposit handed over by the transport together with its instruction bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundDeposit {
    pub origin_chain_id: ChainId,
    /// Settlement-chain representation of the deposited token.
    pub asset: AssetId,
    pub amount: Amount,
    /// Caller identity on the origin chain.
    pub sender: Address,
    /// Raw instruction bytes.
    pub message: Bytes,
}

impl InboundDeposit {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.asset.is_zero() {
            return Err(CoreError::InvalidAddress("deposit asset".into()));
        }
        if self.amount == 0 {
            return Err(CoreError::InvalidAmount(
                "deposit amount must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Network fee charged by an asset contract for withdrawing it outbound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeQuote {
    pub fee_asset: AssetId,
    pub fee_amount: Amount,
}

/// How the inbound amount is split between the outbound fee and the main swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasPlan {
    /// `None` when no outbound leg is needed.
    pub fee_asset: Option<AssetId>,
    pub fee_amount: Amount,
    /// Input spent to obtain `fee_amount` of `fee_asset`.
    pub amount_reserved_for_fee: Amount,
    pub amount_available_for_swap: Amount,
}

impl GasPlan {
    /// Plan for a local delivery: no fee, everything goes to the main swap.
    pub fn without_fee(amount: Amount) -> Self {
        Self {
            fee_asset: None,
            fee_amount: 0,
            amount_reserved_for_fee: 0,
            amount_available_for_swap: amount,
        }
    }

    /// Total input the plan accounts for.
    pub fn total_input(&self) -> Amount {
        self.amount_reserved_for_fee + self.amount_available_for_swap
    }
}

/// Result of one complete swap attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementOutcome {
    pub output_amount: Amount,
    pub fee_asset: Option<AssetId>,
    pub fee_amount: Amount,
    pub delivered_asset: AssetId,
}

/// Identifier of an outbound delivery request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryId(pub Uuid);

impl DeliveryId {
    /// Create a new time-ordered delivery id (UUID v7).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DeliveryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Context the engine attaches to an outbound request so a failed delivery
/// can be sent back to where the funds came from.
///
/// Travels ABI-encoded as `(address sender, address asset)` inside
/// [`RevertPolicy::revert_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryToken {
    pub original_sender: Address,
    pub original_asset: AssetId,
}

impl RecoveryToken {
    pub fn encode(&self) -> Bytes {
        (self.original_sender, self.original_asset.0)
            .abi_encode_params()
            .into()
    }

    pub fn decode(data: &[u8]) -> Result<Self, CoreError> {
        let (original_sender, original_asset) =
            <(Address, Address)>::abi_decode_params(data, true)?;
        Ok(Self {
            original_sender,
            original_asset: AssetId(original_asset),
        })
    }
}

/// What the transport should do if an outbound delivery fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertPolicy {
    /// Receives the revert callback (or the refund when no callback is made).
    pub revert_address: Address,
    pub call_on_revert: bool,
    pub abort_address: Address,
    /// Opaque payload returned verbatim to the revert callback.
    pub revert_message: Bytes,
    pub on_revert_gas_limit: u64,
}

impl RevertPolicy {
    /// Policy for a first delivery attempt: call `engine` back with `token`.
    pub fn with_recovery(engine: Address, token: &RecoveryToken, gas_limit: u64) -> Self {
        Self {
            revert_address: engine,
            call_on_revert: true,
            abort_address: Address::ZERO,
            revert_message: token.encode(),
            on_revert_gas_limit: gas_limit,
        }
    }

    /// Policy for a last attempt: no callback, failures refund `sender`.
    pub fn final_attempt(sender: Address) -> Self {
        Self {
            revert_address: sender,
            call_on_revert: false,
            abort_address: Address::ZERO,
            revert_message: Bytes::new(),
            on_revert_gas_limit: 0,
        }
    }
}

/// Reverted funds handed back to the engine by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertContext {
    pub asset: AssetId,
    pub amount: Amount,
    pub revert_message: Bytes,
}
