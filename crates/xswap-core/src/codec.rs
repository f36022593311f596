//! Origin-chain instruction decoding.
//!
//! Chains with a tight memo limit (Bitcoin carries at most 80 bytes of
//! `OP_RETURN` data) send a fixed binary layout; every other chain sends
//! ABI-encoded parameters. Which layout applies is a table lookup on the
//! origin chain id, so supporting a new chain means adding a table entry.

use std::collections::HashMap;

use alloy_primitives::{Address, Bytes};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{AssetId, ChainId, Recipient, SwapInstruction, ADDRESS_LEN};

/// Maximum payload a compact-layout chain can carry.
pub const COMPACT_MESSAGE_LIMIT: usize = 80;

/// Target address plus recipient address.
pub const COMPACT_MIN_LEN: usize = 2 * ADDRESS_LEN;

/// Offset of the optional withdraw flag byte.
const COMPACT_FLAG_OFFSET: usize = COMPACT_MIN_LEN;

pub const BITCOIN_MAINNET: ChainId = ChainId(8332);
pub const BITCOIN_TESTNET: ChainId = ChainId(18332);
pub const BITCOIN_SIGNET: ChainId = ChainId(18333);

/// Wire layout of an instruction message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncodingScheme {
    /// `target(20) ‖ recipient(20) ‖ [withdraw(1)]`.
    Compact,
    /// ABI parameters `(address target, bytes recipient, bool withdraw)`.
    Structured,
}

impl std::fmt::Display for EncodingScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compact => write!(f, "Compact"),
            Self::Structured => write!(f, "Structured"),
        }
    }
}

/// Decodes instruction messages according to the origin chain's layout.
#[derive(Debug, Clone)]
pub struct MessageCodec {
    schemes: HashMap<ChainId, EncodingScheme>,
    fallback: EncodingScheme,
}

impl MessageCodec {
    /// A codec that decodes every chain with the structured layout.
    pub fn new() -> Self {
        Self {
            schemes: HashMap::new(),
            fallback: EncodingScheme::Structured,
        }
    }

    /// A codec with the given chains mapped to the compact layout.
    pub fn with_compact_chains(chains: impl IntoIterator<Item = ChainId>) -> Self {
        let mut codec = Self::new();
        for chain in chains {
            codec.register(chain, EncodingScheme::Compact);
        }
        codec
    }

    /// Map `chain` to `scheme`, replacing any previous entry.
    pub fn register(&mut self, chain: ChainId, scheme: EncodingScheme) {
        self.schemes.insert(chain, scheme);
    }

    pub fn scheme_for(&self, chain: ChainId) -> EncodingScheme {
        self.schemes.get(&chain).copied().unwrap_or(self.fallback)
    }

    /// Decode and validate the instruction carried by `message`.
    pub fn decode(&self, chain: ChainId, message: &[u8]) -> Result<SwapInstruction, CoreError> {
        let scheme = self.scheme_for(chain);
        let instruction = match scheme {
            EncodingScheme::Compact => decode_compact(message)?,
            EncodingScheme::Structured => decode_structured(message)?,
        };
        instruction.validate()?;

        tracing::debug!(
            chain = %chain,
            %scheme,
            target = %instruction.target_asset,
            recipient = %instruction.recipient,
            deliver_locally = instruction.deliver_locally,
            "decoded swap instruction"
        );
        Ok(instruction)
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::with_compact_chains([BITCOIN_MAINNET, BITCOIN_TESTNET, BITCOIN_SIGNET])
    }
}

/// Decode the fixed binary layout. Bytes past the flag are ignored.
pub fn decode_compact(message: &[u8]) -> Result<SwapInstruction, CoreError> {
    if message.len() < COMPACT_MIN_LEN {
        return Err(CoreError::MessageTooShort {
            len: message.len(),
            min: COMPACT_MIN_LEN,
        });
    }

    let target = Address::from_slice(&message[..ADDRESS_LEN]);
    let recipient = Bytes::copy_from_slice(&message[ADDRESS_LEN..COMPACT_MIN_LEN]);
    let withdraw = message
        .get(COMPACT_FLAG_OFFSET)
        .map_or(true, |flag| *flag != 0);

    Ok(SwapInstruction {
        target_asset: AssetId(target),
        recipient: Recipient(recipient),
        deliver_locally: !withdraw,
    })
}

/// Encode the fixed binary layout. `None` leaves the flag byte off, which
/// decodes as an outbound delivery.
pub fn encode_compact(target: AssetId, recipient: Address, deliver_locally: Option<bool>) -> Vec<u8> {
    let mut out = Vec::with_capacity(COMPACT_MIN_LEN + 1);
    out.extend_from_slice(target.0.as_slice());
    out.extend_from_slice(recipient.as_slice());
    if let Some(local) = deliver_locally {
        out.push(u8::from(!local));
    }
    out
}

/// Decode ABI parameters `(address, bytes, bool)`.
pub fn decode_structured(message: &[u8]) -> Result<SwapInstruction, CoreError> {
    let (target, recipient, withdraw) = <(Address, Bytes, bool)>::abi_decode_params(message, true)?;
    Ok(SwapInstruction {
        target_asset: AssetId(target),
        recipient: Recipient(recipient),
        deliver_locally: !withdraw,
    })
}

pub fn encode_structured(instruction: &SwapInstruction) -> Vec<u8> {
    (
        instruction.target_asset.0,
        instruction.recipient.0.clone(),
        instruction.withdraw(),
    )
        .abi_encode_params()
}
