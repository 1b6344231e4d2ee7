//! Pricing
//!
//! Minor-unit arithmetic shared by the benefit calculations.

use decimal_percentage::Percentage;
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use rusty_money::{Money, iso::Currency};
use thiserror::Error;

/// Errors from money arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    /// Percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed or was not finite")]
    PercentConversion,

    /// Two amounts in one calculation use different currencies.
    #[error("order is in {order} but the discount is in {discount}")]
    CurrencyMismatch {
        /// Currency of the order.
        order: &'static str,
        /// Currency of the discount.
        discount: &'static str,
    },
}

/// Convert percentage points (`20` = 20%) into a [`Percentage`].
pub fn percentage_from_points(points: Decimal) -> Percentage {
    Percentage::from(points / Decimal::ONE_HUNDRED)
}

/// Calculate the discount amount in minor units based on a percentage and a minor unit amount.
///
/// # Errors
///
/// Returns [`PricingError::PercentConversion`] if the calculation overflows or
/// cannot be represented in minor units.
pub fn percent_of_minor(percent: &Percentage, minor: i64) -> Result<i64, PricingError> {
    let minor = Decimal::from_i64(minor).ok_or(PricingError::PercentConversion)?;

    ((*percent) * Decimal::ONE) // Percentage does not expose its inner Decimal
        .checked_mul(minor)
        .ok_or(PricingError::PercentConversion)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(PricingError::PercentConversion)
}

/// Whether `amount` is less than one whole unit of its currency (e.g. 0.99 PKR).
pub fn below_one_unit(amount: &Money<'_, Currency>) -> bool {
    *amount.amount() < Decimal::ONE
}

/// Fail unless `amount` is in the same currency as `order`.
///
/// # Errors
///
/// Returns [`PricingError::CurrencyMismatch`] when the currencies differ.
pub fn ensure_same_currency(
    order: &Money<'_, Currency>,
    amount: &Money<'_, Currency>,
) -> Result<(), PricingError> {
    if order.currency() == amount.currency() {
        return Ok(());
    }

    Err(PricingError::CurrencyMismatch {
        order: order.currency().iso_alpha_code,
        discount: amount.currency().iso_alpha_code,
    })
}

/// Percentage of `order`, limited to `cap` when one is set. Returned in minor units.
///
/// # Errors
///
/// Returns a [`PricingError`] when the cap's currency differs from the order's
/// or the percentage cannot be represented.
pub fn capped_percent_of(
    order: &Money<'_, Currency>,
    percent: &Percentage,
    cap: Option<&Money<'_, Currency>>,
) -> Result<i64, PricingError> {
    let raw = percent_of_minor(percent, order.to_minor_units())?;

    match cap {
        Some(cap) => {
            ensure_same_currency(order, cap)?;

            Ok(raw.min(cap.to_minor_units()))
        }
        None => Ok(raw),
    }
}

/// Flat `amount` off `order`, never more than the order itself. Returned in minor units.
///
/// # Errors
///
/// Returns [`PricingError::CurrencyMismatch`] when the currencies differ.
pub fn clamped_amount_off(
    order: &Money<'_, Currency>,
    amount: &Money<'_, Currency>,
) -> Result<i64, PricingError> {
    ensure_same_currency(order, amount)?;

    Ok(amount.to_minor_units().min(order.to_minor_units()).max(0))
}
