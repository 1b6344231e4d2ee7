//! Loyalty Programs
//!
//! Loyalty discounts reward returning customers. Day-based programs split the
//! customer's lifetime (days since their first recorded visit) into
//! contiguous ranges; visit-based programs grant a reward at each visit
//! milestone; referral programs reward a new customer introduced by an
//! existing one.

use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};

use crate::{
    discounts::errors::{InvalidDiscount, ReferralParty},
    pricing::below_one_unit,
};

/// Inclusive range of loyalty days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    /// First day covered.
    pub min_days: u32,

    /// Last day covered.
    pub max_days: u32,
}

impl DayRange {
    /// Create a range covering `min_days..=max_days`.
    pub const fn new(min_days: u32, max_days: u32) -> Self {
        Self { min_days, max_days }
    }

    /// Whether `days` lies inside the range.
    pub const fn contains(&self, days: u32) -> bool {
        self.min_days <= days && days <= self.max_days
    }
}

/// Anything selected by loyalty days.
pub trait DayTier {
    /// Days covered by this tier.
    fn days(&self) -> DayRange;
}

/// Percentage granted to customers within a day range.
#[derive(Debug, Clone, PartialEq)]
pub struct PercentageRange {
    /// Days covered.
    pub days: DayRange,

    /// Percentage points off (0–100).
    pub percentage: Decimal,
}

impl DayTier for PercentageRange {
    fn days(&self) -> DayRange {
        self.days
    }
}

/// Flat amount granted to customers within a day range.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedTier<'a> {
    /// Days covered.
    pub days: DayRange,

    /// Tier name shown to staff (e.g. "Silver").
    pub label: String,

    /// Amount off.
    pub amount: Money<'a, Currency>,
}

impl DayTier for FixedTier<'_> {
    fn days(&self) -> DayRange {
        self.days
    }
}

/// Flat amount granted once a customer reaches a visit count.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitMilestone<'a> {
    /// Visits required.
    pub visits: u32,

    /// Milestone name shown to staff.
    pub label: String,

    /// Amount off.
    pub amount: Money<'a, Currency>,
}

/// Benefit granted to one side of a referral.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferralBenefit<'a> {
    /// Percentage points off the order (1–100).
    Percentage(Decimal),

    /// Flat amount off the order.
    Fixed(Money<'a, Currency>),
}

/// Referral program.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferralProgram<'a> {
    /// Benefit for the existing customer who made the referral. Recorded
    /// separately, never deducted from the referred customer's order.
    pub referrer_benefit: ReferralBenefit<'a>,

    /// Benefit for the referred customer's order.
    pub referred_benefit: ReferralBenefit<'a>,

    /// Largest percentage benefit granted on one order.
    pub cap: Option<Money<'a, Currency>>,
}

/// Loyalty program variants.
#[derive(Debug, Clone, PartialEq)]
pub enum LoyaltyProgram<'a> {
    /// Percentage off by loyalty days.
    Percentage {
        /// Contiguous day ranges, sorted and non-increasing in percentage.
        ranges: Vec<PercentageRange>,

        /// Largest discount granted on one order.
        cap: Option<Money<'a, Currency>>,
    },

    /// Flat amount off by loyalty days.
    Fixed {
        /// Contiguous day tiers, sorted.
        tiers: Vec<FixedTier<'a>>,
    },

    /// Flat amount off by visit count.
    VisitBased {
        /// Milestones with strictly increasing visit counts.
        milestones: Vec<VisitMilestone<'a>>,
    },

    /// Benefit for referred customers.
    Referral(ReferralProgram<'a>),
}

impl LoyaltyProgram<'_> {
    /// Short name of the program kind.
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Percentage { .. } => "loyalty percentage",
            Self::Fixed { .. } => "loyalty fixed",
            Self::VisitBased { .. } => "loyalty visits",
            Self::Referral(_) => "referral",
        }
    }

    pub(crate) fn validate(&self) -> Result<(), InvalidDiscount> {
        match self {
            Self::Percentage { ranges, cap } => {
                validate_day_tiers(ranges)?;

                for (index, range) in ranges.iter().enumerate() {
                    if range.percentage < Decimal::ZERO || range.percentage > Decimal::ONE_HUNDRED {
                        return Err(InvalidDiscount::TierPercentageOutOfRange {
                            index,
                            value: range.percentage,
                        });
                    }
                }

                for (index, pair) in ranges.windows(2).enumerate() {
                    if let [earlier, later] = pair
                        && later.percentage > earlier.percentage
                    {
                        return Err(InvalidDiscount::IncreasingTierPercentage { index: index + 1 });
                    }
                }

                crate::discounts::deals::validate_cap(cap.as_ref())
            }
            Self::Fixed { tiers } => {
                validate_day_tiers(tiers)?;

                match tiers.iter().position(|tier| below_one_unit(&tier.amount)) {
                    Some(index) => Err(InvalidDiscount::AmountNotPositive { index }),
                    None => Ok(()),
                }
            }
            Self::VisitBased { milestones } => validate_milestones(milestones),
            Self::Referral(program) => {
                validate_referral_benefit(&program.referrer_benefit, ReferralParty::Referrer)?;
                validate_referral_benefit(&program.referred_benefit, ReferralParty::Referred)?;

                crate::discounts::deals::validate_cap(program.cap.as_ref())
            }
        }
    }
}

/// Check day tiers are non-empty, sorted, well-formed and contiguous.
fn validate_day_tiers<T: DayTier>(tiers: &[T]) -> Result<(), InvalidDiscount> {
    if tiers.is_empty() {
        return Err(InvalidDiscount::NoTiers);
    }

    for (index, tier) in tiers.iter().enumerate() {
        let days = tier.days();

        if days.max_days <= days.min_days {
            return Err(InvalidDiscount::InvertedTier { index });
        }
    }

    for (index, pair) in tiers.windows(2).enumerate() {
        let [earlier, later] = pair else {
            continue;
        };

        let (earlier, later) = (earlier.days(), later.days());

        if later.min_days <= earlier.min_days {
            return Err(InvalidDiscount::UnsortedTiers { index: index + 1 });
        }

        if earlier.max_days.checked_add(1) != Some(later.min_days) {
            return Err(InvalidDiscount::TierGap { index });
        }
    }

    Ok(())
}

fn validate_milestones(milestones: &[VisitMilestone<'_>]) -> Result<(), InvalidDiscount> {
    if milestones.is_empty() {
        return Err(InvalidDiscount::NoTiers);
    }

    for (index, milestone) in milestones.iter().enumerate() {
        if milestone.visits == 0 {
            return Err(InvalidDiscount::MilestoneVisitsZero { index });
        }

        if below_one_unit(&milestone.amount) {
            return Err(InvalidDiscount::AmountNotPositive { index });
        }
    }

    for (index, pair) in milestones.windows(2).enumerate() {
        if let [earlier, later] = pair
            && later.visits <= earlier.visits
        {
            return Err(InvalidDiscount::MilestonesNotIncreasing { index: index + 1 });
        }
    }

    Ok(())
}

fn validate_referral_benefit(
    benefit: &ReferralBenefit<'_>,
    party: ReferralParty,
) -> Result<(), InvalidDiscount> {
    match benefit {
        ReferralBenefit::Percentage(value)
            if *value < Decimal::ONE || *value > Decimal::ONE_HUNDRED =>
        {
            Err(InvalidDiscount::ReferralPercentageOutOfRange {
                party,
                value: *value,
            })
        }
        ReferralBenefit::Fixed(amount) if amount.to_minor_units() < 1 => {
            Err(InvalidDiscount::ReferralAmountNotPositive { party })
        }
        ReferralBenefit::Percentage(_) | ReferralBenefit::Fixed(_) => Ok(()),
    }
}
