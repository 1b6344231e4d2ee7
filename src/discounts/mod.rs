//! Discounts
//!
//! A discount is a catalog entry: common availability rules plus one of the
//! discount kinds. The only way to obtain a [`Discount`] is [`Discount::new`],
//! which checks every structural invariant, so the rest of the engine can rely
//! on contiguous tiers, increasing milestones and non-empty option lists.

use jiff::Timestamp;
use rusty_money::{Money, iso::Currency};
use serde::{Deserialize, Serialize};

use crate::ids::DiscountId;

pub mod availability;
pub mod deals;
pub mod errors;
pub mod loyalty;

pub use availability::{Availability, AvailabilityDraft};
pub use deals::{BankCardRule, BankDiscount, FixedPriceDeal, PercentageDeal, PriceOption};
pub use errors::{InvalidDiscount, ReferralParty};
pub use loyalty::{
    DayRange, FixedTier, LoyaltyProgram, PercentageRange, ReferralBenefit, ReferralProgram,
    VisitMilestone,
};

/// Publication status of a discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountStatus {
    /// Offered to customers.
    Active,

    /// Switched off by an operator.
    Inactive,
}

/// Discount kind with its kind-specific payload.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscountKind<'a> {
    /// Percentage off the order.
    Percentage(PercentageDeal<'a>),

    /// Percentage off for holders of accepted bank cards.
    Bank(BankDiscount<'a>),

    /// Fixed price replacing the order total.
    FixedPrice(FixedPriceDeal<'a>),

    /// Loyalty program.
    Loyalty(LoyaltyProgram<'a>),
}

impl<'a> DiscountKind<'a> {
    /// Short name of the kind, used in reports and logs.
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Percentage(_) => "percentage",
            Self::Bank(_) => "bank card",
            Self::FixedPrice(_) => "fixed price",
            Self::Loyalty(program) => program.kind_name(),
        }
    }

    /// Whether staff must pick a card or price option before a benefit can
    /// be calculated.
    pub const fn needs_sub_selection(&self) -> bool {
        matches!(self, Self::Bank(_) | Self::FixedPrice(_))
    }

    /// Whether the discount is a referral program.
    pub const fn is_referral(&self) -> bool {
        matches!(self, Self::Loyalty(LoyaltyProgram::Referral(_)))
    }

    fn validate(&self) -> Result<(), InvalidDiscount> {
        match self {
            Self::Percentage(deal) => deal.validate(),
            Self::Bank(deal) => deal.validate(),
            Self::FixedPrice(deal) => deal.validate(),
            Self::Loyalty(program) => program.validate(),
        }
    }

    /// Every monetary amount carried by the payload.
    fn amounts(&self) -> Vec<&Money<'a, Currency>> {
        match self {
            Self::Percentage(deal) => deal.cap.iter().collect(),
            Self::Bank(deal) => deal.cap.iter().collect(),
            Self::FixedPrice(deal) => deal.options.iter().map(|option| &option.price).collect(),
            Self::Loyalty(LoyaltyProgram::Percentage { cap, .. }) => cap.iter().collect(),
            Self::Loyalty(LoyaltyProgram::Fixed { tiers }) => {
                tiers.iter().map(|tier| &tier.amount).collect()
            }
            Self::Loyalty(LoyaltyProgram::VisitBased { milestones }) => milestones
                .iter()
                .map(|milestone| &milestone.amount)
                .collect(),
            Self::Loyalty(LoyaltyProgram::Referral(program)) => {
                let mut amounts: Vec<_> = program.cap.iter().collect();

                for benefit in [&program.referrer_benefit, &program.referred_benefit] {
                    if let ReferralBenefit::Fixed(amount) = benefit {
                        amounts.push(amount);
                    }
                }

                amounts
            }
        }
    }
}

/// Unvalidated discount, as handed over by the catalog source.
#[derive(Debug, Clone)]
pub struct DiscountDraft<'a> {
    /// Opaque id.
    pub id: DiscountId,

    /// Display name.
    pub name: String,

    /// Publication status.
    pub status: DiscountStatus,

    /// When the entry was authored.
    pub created_at: Timestamp,

    /// When the entry was last edited.
    pub updated_at: Timestamp,

    /// Availability rules.
    pub availability: AvailabilityDraft,

    /// Kind-specific payload.
    pub kind: DiscountKind<'a>,
}

/// A validated, immutable catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Discount<'a> {
    id: DiscountId,
    name: String,
    status: DiscountStatus,
    created_at: Timestamp,
    updated_at: Timestamp,
    availability: Availability,
    kind: DiscountKind<'a>,
    currency: Option<&'a Currency>,
}

impl<'a> Discount<'a> {
    /// Validate a draft into a discount.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvalidDiscount`] found, checking availability
    /// first, then the kind payload, then currency consistency.
    pub fn new(draft: DiscountDraft<'a>) -> Result<Self, InvalidDiscount> {
        if draft.id.as_str().trim().is_empty() {
            return Err(InvalidDiscount::EmptyId);
        }

        let availability = Availability::validate(draft.availability)?;

        draft.kind.validate()?;

        let currency = single_currency(&draft.kind.amounts())?;

        Ok(Self {
            id: draft.id,
            name: draft.name,
            status: draft.status,
            created_at: draft.created_at,
            updated_at: draft.updated_at,
            availability,
            kind: draft.kind,
            currency,
        })
    }

    /// Discount id.
    pub fn id(&self) -> &DiscountId {
        &self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publication status.
    pub const fn status(&self) -> DiscountStatus {
        self.status
    }

    /// Whether the discount is switched on.
    pub const fn is_active(&self) -> bool {
        matches!(self.status, DiscountStatus::Active)
    }

    /// Creation time.
    pub const fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Last edit time.
    pub const fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Availability rules.
    pub const fn availability(&self) -> &Availability {
        &self.availability
    }

    /// Kind-specific payload.
    pub const fn kind(&self) -> &DiscountKind<'a> {
        &self.kind
    }

    /// Currency of the discount's amounts, if it carries any.
    pub const fn currency(&self) -> Option<&'a Currency> {
        self.currency
    }
}

impl<'a> TryFrom<DiscountDraft<'a>> for Discount<'a> {
    type Error = InvalidDiscount;

    fn try_from(draft: DiscountDraft<'a>) -> Result<Self, Self::Error> {
        Self::new(draft)
    }
}

fn single_currency<'a>(
    amounts: &[&Money<'a, Currency>],
) -> Result<Option<&'a Currency>, InvalidDiscount> {
    let mut currency: Option<&'a Currency> = None;

    for amount in amounts {
        match currency {
            None => currency = Some(amount.currency()),
            Some(expected) if expected != amount.currency() => {
                return Err(InvalidDiscount::CurrencyMismatch {
                    expected: expected.iso_alpha_code,
                    found: amount.currency().iso_alpha_code,
                });
            }
            Some(_) => {}
        }
    }

    Ok(currency)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rusty_money::iso::{PKR, USD};
    use testresult::TestResult;

    use super::*;

    fn draft(kind: DiscountKind<'static>) -> DiscountDraft<'static> {
        DiscountDraft {
            id: DiscountId::new("d-1"),
            name: "Test discount".to_string(),
            status: DiscountStatus::Active,
            created_at: Timestamp::UNIX_EPOCH,
            updated_at: Timestamp::UNIX_EPOCH,
            availability: AvailabilityDraft::default(),
            kind,
        }
    }

    #[test]
    fn valid_draft_becomes_discount() -> TestResult {
        let discount = Discount::new(draft(DiscountKind::Percentage(PercentageDeal {
            percentage: Decimal::new(20, 0),
            cap: Some(Money::from_minor(50_000, PKR)),
        })))?;

        assert_eq!(discount.id(), &DiscountId::new("d-1"));
        assert_eq!(discount.kind().kind_name(), "percentage");
        assert_eq!(discount.currency(), Some(PKR));
        assert!(discount.is_active());
        assert!(!discount.kind().needs_sub_selection());

        Ok(())
    }

    #[test]
    fn empty_id_is_rejected() {
        let mut draft = draft(DiscountKind::Percentage(PercentageDeal {
            percentage: Decimal::TEN,
            cap: None,
        }));

        draft.id = DiscountId::new("  ");

        assert_eq!(Discount::new(draft), Err(InvalidDiscount::EmptyId));
    }

    #[test]
    fn availability_errors_surface() {
        let mut draft = draft(DiscountKind::Percentage(PercentageDeal {
            percentage: Decimal::TEN,
            cap: None,
        }));

        draft.availability.all_branches = false;

        assert_eq!(Discount::try_from(draft), Err(InvalidDiscount::NoBranches));
    }

    #[test]
    fn mixed_currencies_are_rejected() {
        let result = Discount::new(draft(DiscountKind::FixedPrice(FixedPriceDeal {
            options: vec![
                PriceOption {
                    id: "a".into(),
                    label: "A".to_string(),
                    price: Money::from_minor(90_000, PKR),
                },
                PriceOption {
                    id: "b".into(),
                    label: "B".to_string(),
                    price: Money::from_minor(900, USD),
                },
            ],
        })));

        assert_eq!(
            result,
            Err(InvalidDiscount::CurrencyMismatch {
                expected: "PKR",
                found: "USD",
            })
        );
    }

    #[test]
    fn uncapped_percentage_has_no_currency() -> TestResult {
        let discount = Discount::new(draft(DiscountKind::Percentage(PercentageDeal {
            percentage: Decimal::TEN,
            cap: None,
        })))?;

        assert!(discount.currency().is_none());

        Ok(())
    }

    #[test]
    fn referral_kind_is_detected() -> TestResult {
        let discount = Discount::new(draft(DiscountKind::Loyalty(LoyaltyProgram::Referral(
            ReferralProgram {
                referrer_benefit: ReferralBenefit::Fixed(Money::from_minor(20_000, PKR)),
                referred_benefit: ReferralBenefit::Percentage(Decimal::TEN),
                cap: None,
            },
        ))))?;

        assert!(discount.kind().is_referral());
        assert_eq!(discount.kind().kind_name(), "referral");

        Ok(())
    }
}
