//! Deal Discounts
//!
//! Flat percentage deals, bank-card deals and fixed-price deals.

use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use smallvec::SmallVec;

use crate::{
    discounts::errors::InvalidDiscount,
    ids::{BankId, CardTypeId, PriceOptionId},
    pricing::below_one_unit,
};

/// Percentage off the whole order, optionally capped.
#[derive(Debug, Clone, PartialEq)]
pub struct PercentageDeal<'a> {
    /// Percentage points off (1–100).
    pub percentage: Decimal,

    /// Largest discount granted on one order.
    pub cap: Option<Money<'a, Currency>>,
}

/// Cards accepted from one bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankCardRule {
    /// Issuing bank.
    pub bank: BankId,

    /// Accepted card types (never empty).
    pub card_types: SmallVec<[CardTypeId; 4]>,
}

impl BankCardRule {
    /// Whether this rule accepts the given card type.
    pub fn accepts(&self, card_type: &CardTypeId) -> bool {
        self.card_types.contains(card_type)
    }
}

/// Percentage deal reserved for holders of particular bank cards.
///
/// The card only gates eligibility; every accepted card gets the same rate.
#[derive(Debug, Clone, PartialEq)]
pub struct BankDiscount<'a> {
    /// Percentage points off (1–100).
    pub percentage: Decimal,

    /// Largest discount granted on one order.
    pub cap: Option<Money<'a, Currency>>,

    /// Accepted cards (never empty).
    pub cards: Vec<BankCardRule>,
}

impl BankDiscount<'_> {
    /// Find the rule for `bank`, if the bank takes part in the deal.
    pub fn rule_for(&self, bank: &BankId) -> Option<&BankCardRule> {
        self.cards.iter().find(|rule| &rule.bank == bank)
    }
}

/// One price a customer may choose in a fixed-price deal.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceOption<'a> {
    /// Option id, unique within the deal.
    pub id: PriceOptionId,

    /// Display label (e.g. "Lunch for two").
    pub label: String,

    /// Price the customer pays.
    pub price: Money<'a, Currency>,
}

/// Fixed price replacing the order total.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedPriceDeal<'a> {
    /// Available prices (never empty).
    pub options: Vec<PriceOption<'a>>,
}

impl<'a> FixedPriceDeal<'a> {
    /// Find an option by id.
    pub fn option(&self, id: &PriceOptionId) -> Option<&PriceOption<'a>> {
        self.options.iter().find(|option| &option.id == id)
    }
}

/// Check deal percentage points are within 1–100.
pub(crate) fn validate_deal_percentage(percentage: Decimal) -> Result<(), InvalidDiscount> {
    if percentage < Decimal::ONE || percentage > Decimal::ONE_HUNDRED {
        return Err(InvalidDiscount::PercentageOutOfRange { value: percentage });
    }

    Ok(())
}

/// Check an optional cap is strictly positive.
pub(crate) fn validate_cap(cap: Option<&Money<'_, Currency>>) -> Result<(), InvalidDiscount> {
    match cap {
        Some(cap) if cap.to_minor_units() < 1 => Err(InvalidDiscount::CapNotPositive),
        _ => Ok(()),
    }
}

impl PercentageDeal<'_> {
    pub(crate) fn validate(&self) -> Result<(), InvalidDiscount> {
        validate_deal_percentage(self.percentage)?;
        validate_cap(self.cap.as_ref())
    }
}

impl BankDiscount<'_> {
    pub(crate) fn validate(&self) -> Result<(), InvalidDiscount> {
        validate_deal_percentage(self.percentage)?;
        validate_cap(self.cap.as_ref())?;

        if self.cards.is_empty() {
            return Err(InvalidDiscount::NoBankCards);
        }

        if let Some(index) = self.cards.iter().position(|rule| rule.card_types.is_empty()) {
            return Err(InvalidDiscount::NoCardTypes { index });
        }

        Ok(())
    }
}

impl FixedPriceDeal<'_> {
    pub(crate) fn validate(&self) -> Result<(), InvalidDiscount> {
        if self.options.is_empty() {
            return Err(InvalidDiscount::NoPriceOptions);
        }

        for (index, option) in self.options.iter().enumerate() {
            if below_one_unit(&option.price) {
                return Err(InvalidDiscount::PriceNotPositive { index });
            }

            let seen_before = self
                .options
                .iter()
                .take(index)
                .any(|earlier| earlier.id == option.id);

            if seen_before {
                return Err(InvalidDiscount::DuplicatePriceOption { index });
            }
        }

        Ok(())
    }
}
