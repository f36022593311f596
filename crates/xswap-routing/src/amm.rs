//! Constant-product pricing with a 0.3% swap fee.
//!
//! Rounding follows UniswapV2Library: outputs round down, required inputs
//! round up by one unit so the pool invariant never decreases.

use xswap_core::{Amount, AssetId};

use crate::error::RoutingError;
use crate::path::validate_path;

pub const FEE_NUMERATOR: u128 = 997;
pub const FEE_DENOMINATOR: u128 = 1_000;

/// Output received for `amount_in` against reserves `(reserve_in, reserve_out)`.
pub fn get_amount_out(
    amount_in: Amount,
    reserve_in: Amount,
    reserve_out: Amount,
) -> Result<Amount, RoutingError> {
    if amount_in == 0 {
        return Err(RoutingError::InsufficientInputAmount);
    }
    if reserve_in == 0 || reserve_out == 0 {
        return Err(RoutingError::InsufficientLiquidity {
            required: amount_in,
            available: 0,
        });
    }

    let amount_in_with_fee = amount_in
        .checked_mul(FEE_NUMERATOR)
        .ok_or(RoutingError::Overflow)?;
    let numerator = amount_in_with_fee
        .checked_mul(reserve_out)
        .ok_or(RoutingError::Overflow)?;
    let denominator = reserve_in
        .checked_mul(FEE_DENOMINATOR)
        .and_then(|d| d.checked_add(amount_in_with_fee))
        .ok_or(RoutingError::Overflow)?;

    Ok(numerator / denominator)
}

/// Input required to receive exactly `amount_out` against `(reserve_in, reserve_out)`.
pub fn get_amount_in(
    amount_out: Amount,
    reserve_in: Amount,
    reserve_out: Amount,
) -> Result<Amount, RoutingError> {
    if amount_out == 0 {
        return Err(RoutingError::ZeroOutputAmount);
    }
    if reserve_in == 0 || reserve_out <= amount_out {
        return Err(RoutingError::InsufficientLiquidity {
            required: amount_out,
            available: reserve_out,
        });
    }

    let numerator = reserve_in
        .checked_mul(amount_out)
        .and_then(|n| n.checked_mul(FEE_DENOMINATOR))
        .ok_or(RoutingError::Overflow)?;
    let denominator = (reserve_out - amount_out)
        .checked_mul(FEE_NUMERATOR)
        .ok_or(RoutingError::Overflow)?;

    Ok(numerator / denominator + 1)
}

/// Chain [`get_amount_out`] along `path`.
///
/// `reserves(a, b)` returns the pool reserves ordered as `(reserve_a, reserve_b)`.
pub fn get_amounts_out<F>(
    amount_in: Amount,
    path: &[AssetId],
    reserves: F,
) -> Result<Vec<Amount>, RoutingError>
where
    F: Fn(AssetId, AssetId) -> Result<(Amount, Amount), RoutingError>,
{
    validate_path(path)?;
    let mut amounts = Vec::with_capacity(path.len());
    amounts.push(amount_in);
    for hop in path.windows(2) {
        let (reserve_in, reserve_out) = reserves(hop[0], hop[1])?;
        let last = amounts[amounts.len() - 1];
        amounts.push(get_amount_out(last, reserve_in, reserve_out)?);
    }
    Ok(amounts)
}

/// Chain [`get_amount_in`] backwards along `path`.
pub fn get_amounts_in<F>(
    amount_out: Amount,
    path: &[AssetId],
    reserves: F,
) -> Result<Vec<Amount>, RoutingError>
where
    F: Fn(AssetId, AssetId) -> Result<(Amount, Amount), RoutingError>,
{
    validate_path(path)?;
    let mut amounts = vec![0; path.len()];
    let last = path.len() - 1;
    amounts[last] = amount_out;
    for i in (1..path.len()).rev() {
        let (reserve_in, reserve_out) = reserves(path[i - 1], path[i])?;
        amounts[i - 1] = get_amount_in(amounts[i], reserve_in, reserve_out)?;
    }
    Ok(amounts)
}
