//! Benefit Calculation
//!
//! Turns one discount, an order amount and (where the kind needs one) a
//! sub-selection into the money a customer saves. Calculation is pure and may
//! be repeated freely; a missing precondition is always a typed
//! [`CalculationError`], never a silent zero.

use decimal_percentage::Percentage;
use rusty_money::{Money, iso::Currency};
use thiserror::Error;

use crate::{
    discounts::{Discount, DiscountKind, LoyaltyProgram, ReferralBenefit},
    eligibility::EvaluationContext,
    ids::{BankId, CardTypeId, DiscountId, PriceOptionId},
    pricing::{
        PricingError, capped_percent_of, clamped_amount_off, ensure_same_currency,
        percentage_from_points,
    },
    tiers::{select_day_tier, select_milestone},
};

/// Errors that stop a benefit from being calculated.
///
/// Each variant names the one thing staff must fix before trying again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalculationError {
    /// Bank discount without a card from a participating bank.
    #[error("select a card from a participating bank before calculating the discount")]
    NoCardSelected,

    /// The chosen card type is not part of the bank's offer.
    #[error("the selected card type is not accepted by this bank offer; choose another card")]
    CardNotAccepted,

    /// Fixed-price deal without a chosen price option.
    #[error("select one of the deal's price options before calculating the discount")]
    NoPriceOptionSelected,

    /// The chosen price option does not belong to the deal.
    #[error("the selected price option is not offered by this deal; choose another option")]
    UnknownPriceOption,

    /// The customer falls outside every loyalty tier.
    #[error("the customer does not qualify for any tier of this loyalty program")]
    NoTierMatched,

    /// Referral benefit requested before the referring customer was verified.
    #[error("verify the referring customer before calculating the referral benefit")]
    ReferrerNotVerified,

    /// The discount is not in the current catalog snapshot.
    #[error("discount {0} is not available in the current catalog")]
    UnknownDiscount(DiscountId),

    /// Order amount below zero.
    #[error("order amount cannot be negative")]
    NegativeOrderAmount,

    /// Money arithmetic failed.
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// Proof that the referring customer passed verification.
///
/// Only the verification workflow hands these out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedReferrer {
    phone: String,
}

impl VerifiedReferrer {
    pub(crate) fn new(phone: String) -> Self {
        Self { phone }
    }

    /// Phone number of the referring customer.
    pub fn phone(&self) -> &str {
        &self.phone
    }
}

/// Sub-selection made by staff for kinds that need one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Card presented by the customer.
    BankCard {
        /// Issuing bank.
        bank: BankId,

        /// Card type, when staff recorded it.
        card_type: Option<CardTypeId>,
    },

    /// Price option of a fixed-price deal.
    PriceOption(PriceOptionId),

    /// Verified referring customer.
    Referrer(VerifiedReferrer),
}

/// Monetary outcome of a discount on one order.
#[derive(Debug, Clone, PartialEq)]
pub struct BenefitResult<'a> {
    /// Amount taken off the order.
    pub amount: Money<'a, Currency>,

    /// Amount the customer pays.
    pub final_amount: Money<'a, Currency>,

    /// Percentage used, for percentage-based kinds.
    pub applied_rate: Option<Percentage>,

    /// Label of the loyalty tier, milestone or price option used.
    pub tier_label: Option<String>,

    /// Nothing was taken off (for example a deal price that is not lower
    /// than the order).
    pub no_discount_applied: bool,
}

impl<'a> BenefitResult<'a> {
    fn off_order(
        order: &Money<'a, Currency>,
        amount_minor: i64,
        applied_rate: Option<Percentage>,
        tier_label: Option<String>,
    ) -> Self {
        let currency = order.currency();
        let final_minor = order.to_minor_units() - amount_minor;

        Self {
            amount: Money::from_minor(amount_minor, currency),
            final_amount: Money::from_minor(final_minor, currency),
            applied_rate,
            tier_label,
            no_discount_applied: amount_minor == 0,
        }
    }
}

/// Calculate the benefit of `discount` on an order of `order_amount`.
///
/// # Errors
///
/// Returns a [`CalculationError`] when a required selection is missing or
/// does not match the discount, when the customer matches no loyalty tier, or
/// when the amounts use different currencies.
pub fn calculate<'a>(
    discount: &Discount<'a>,
    order_amount: Money<'a, Currency>,
    ctx: &EvaluationContext,
    selection: Option<&Selection>,
) -> Result<BenefitResult<'a>, CalculationError> {
    if order_amount.to_minor_units() < 0 {
        return Err(CalculationError::NegativeOrderAmount);
    }

    match discount.kind() {
        DiscountKind::Percentage(deal) => {
            let rate = percentage_from_points(deal.percentage);
            let amount = capped_percent_of(&order_amount, &rate, deal.cap.as_ref())?;

            Ok(BenefitResult::off_order(&order_amount, amount, Some(rate), None))
        }
        DiscountKind::Bank(deal) => {
            let Some(Selection::BankCard { bank, card_type }) = selection else {
                return Err(CalculationError::NoCardSelected);
            };

            let rule = deal.rule_for(bank).ok_or(CalculationError::NoCardSelected)?;

            if let Some(card_type) = card_type
                && !rule.accepts(card_type)
            {
                return Err(CalculationError::CardNotAccepted);
            }

            let rate = percentage_from_points(deal.percentage);
            let amount = capped_percent_of(&order_amount, &rate, deal.cap.as_ref())?;

            Ok(BenefitResult::off_order(&order_amount, amount, Some(rate), None))
        }
        DiscountKind::FixedPrice(deal) => {
            let Some(Selection::PriceOption(option_id)) = selection else {
                return Err(CalculationError::NoPriceOptionSelected);
            };

            let option = deal
                .option(option_id)
                .ok_or(CalculationError::UnknownPriceOption)?;

            ensure_same_currency(&order_amount, &option.price)?;

            let amount = (order_amount.to_minor_units() - option.price.to_minor_units()).max(0);

            Ok(BenefitResult {
                amount: Money::from_minor(amount, order_amount.currency()),
                final_amount: option.price,
                applied_rate: None,
                tier_label: Some(option.label.clone()),
                no_discount_applied: amount == 0,
            })
        }
        DiscountKind::Loyalty(program) => calculate_loyalty(program, order_amount, ctx, selection),
    }
}

fn calculate_loyalty<'a>(
    program: &LoyaltyProgram<'a>,
    order_amount: Money<'a, Currency>,
    ctx: &EvaluationContext,
    selection: Option<&Selection>,
) -> Result<BenefitResult<'a>, CalculationError> {
    match program {
        LoyaltyProgram::Percentage { ranges, cap } => {
            let range = select_day_tier(ranges, ctx.loyalty_days)
                .ok_or(CalculationError::NoTierMatched)?;

            let rate = percentage_from_points(range.percentage);
            let amount = capped_percent_of(&order_amount, &rate, cap.as_ref())?;

            Ok(BenefitResult::off_order(&order_amount, amount, Some(rate), None))
        }
        LoyaltyProgram::Fixed { tiers } => {
            let tier = select_day_tier(tiers, ctx.loyalty_days)
                .ok_or(CalculationError::NoTierMatched)?;

            let amount = clamped_amount_off(&order_amount, &tier.amount)?;

            Ok(BenefitResult::off_order(
                &order_amount,
                amount,
                None,
                Some(tier.label.clone()),
            ))
        }
        LoyaltyProgram::VisitBased { milestones } => {
            let milestone = select_milestone(milestones, ctx.visit_count)
                .ok_or(CalculationError::NoTierMatched)?;

            let amount = clamped_amount_off(&order_amount, &milestone.amount)?;

            Ok(BenefitResult::off_order(
                &order_amount,
                amount,
                None,
                Some(milestone.label.clone()),
            ))
        }
        LoyaltyProgram::Referral(referral) => {
            if !matches!(selection, Some(Selection::Referrer(_))) {
                return Err(CalculationError::ReferrerNotVerified);
            }

            match &referral.referred_benefit {
                ReferralBenefit::Percentage(points) => {
                    let rate = percentage_from_points(*points);
                    let amount = capped_percent_of(&order_amount, &rate, referral.cap.as_ref())?;

                    Ok(BenefitResult::off_order(&order_amount, amount, Some(rate), None))
                }
                ReferralBenefit::Fixed(flat) => {
                    let amount = clamped_amount_off(&order_amount, flat)?;

                    Ok(BenefitResult::off_order(&order_amount, amount, None, None))
                }
            }
        }
    }
}
