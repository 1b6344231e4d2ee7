//! Discount construction errors.

use jiff::civil::{Date, Time};
use rust_decimal::Decimal;
use thiserror::Error;

/// Which side of a referral a benefit belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferralParty {
    /// The existing customer who referred someone.
    Referrer,

    /// The new customer who was referred.
    Referred,
}

impl std::fmt::Display for ReferralParty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Referrer => f.write_str("referrer"),
            Self::Referred => f.write_str("referred"),
        }
    }
}

/// A catalog entry violated a structural invariant and cannot be evaluated.
///
/// Tier-level variants carry the zero-based index of the offending tier,
/// range or milestone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidDiscount {
    /// Discount has no id.
    #[error("discount id must not be empty")]
    EmptyId,

    /// A dated discount is missing its start or end date.
    #[error("a discount that is not always active needs both a start and an end date")]
    MissingActivePeriod,

    /// The end date precedes the start date.
    #[error("active period ends on {until} before it starts on {from}")]
    InvertedActivePeriod {
        /// First active day.
        from: Date,
        /// Last active day.
        until: Date,
    },

    /// A discount limited to certain hours is missing its start or end time.
    #[error("a discount that is not available all day needs both a start and an end time")]
    MissingDayWindow,

    /// The daily window does not start before it ends.
    #[error("daily window must start before it ends (starts {start}, ends {end})")]
    InvertedDayWindow {
        /// Opening time.
        start: Time,
        /// Closing time (exclusive).
        end: Time,
    },

    /// A discount limited to certain weekdays lists none.
    #[error("select at least one weekday for a discount that is not available all week")]
    NoWeekdays,

    /// A discount limited to certain branches lists none.
    #[error("select at least one branch for a discount that is not offered at all branches")]
    NoBranches,

    /// Deal percentage outside 1–100.
    #[error("discount percentage must be between 1 and 100, got {value}")]
    PercentageOutOfRange {
        /// Offending percentage points.
        value: Decimal,
    },

    /// A cap of zero or less.
    #[error("cap amount must be greater than zero")]
    CapNotPositive,

    /// Bank discount without any accepted card.
    #[error("bank discount must accept at least one bank card")]
    NoBankCards,

    /// Bank card rule without any card type.
    #[error("bank card rule {index} must accept at least one card type")]
    NoCardTypes {
        /// Index into the card rules.
        index: usize,
    },

    /// Fixed-price deal without options.
    #[error("fixed price deal must offer at least one price option")]
    NoPriceOptions,

    /// Price option priced below one whole currency unit.
    #[error("price option {index} must cost at least 1")]
    PriceNotPositive {
        /// Index into the price options.
        index: usize,
    },

    /// Two price options share an id.
    #[error("price option {index} reuses an id already in the list")]
    DuplicatePriceOption {
        /// Index of the second occurrence.
        index: usize,
    },

    /// Loyalty program without ranges, tiers or milestones.
    #[error("loyalty program must define at least one tier")]
    NoTiers,

    /// A day range whose end is not after its start.
    #[error("tier {index} must end after it starts")]
    InvertedTier {
        /// Index into the tiers.
        index: usize,
    },

    /// Day ranges not sorted by their start day.
    #[error("tier {index} starts before the tier preceding it")]
    UnsortedTiers {
        /// Index of the out-of-order tier.
        index: usize,
    },

    /// Day ranges that leave a gap or overlap.
    #[error("tier {index} must end the day before tier {next} starts", next = .index + 1)]
    TierGap {
        /// Index of the tier preceding the gap.
        index: usize,
    },

    /// Loyalty percentage outside 0–100.
    #[error("tier {index} percentage must be between 0 and 100, got {value}")]
    TierPercentageOutOfRange {
        /// Index into the ranges.
        index: usize,
        /// Offending percentage points.
        value: Decimal,
    },

    /// A later loyalty range grants more than an earlier one.
    #[error("tier {index} grants a higher percentage than the tier before it")]
    IncreasingTierPercentage {
        /// Index of the tier with the larger percentage.
        index: usize,
    },

    /// Tier or milestone amount below one whole currency unit.
    #[error("tier {index} amount must be at least 1")]
    AmountNotPositive {
        /// Index into the tiers or milestones.
        index: usize,
    },

    /// Milestone that requires no visits.
    #[error("milestone {index} must require at least one visit")]
    MilestoneVisitsZero {
        /// Index into the milestones.
        index: usize,
    },

    /// Milestone visits not strictly increasing.
    #[error("milestone {index} must require more visits than the milestone before it")]
    MilestonesNotIncreasing {
        /// Index of the out-of-order milestone.
        index: usize,
    },

    /// Referral percentage outside 1–100.
    #[error("{party} benefit percentage must be between 1 and 100, got {value}")]
    ReferralPercentageOutOfRange {
        /// Which side of the referral.
        party: ReferralParty,
        /// Offending percentage points.
        value: Decimal,
    },

    /// Referral flat amount below one minor unit.
    #[error("{party} benefit amount must be at least one unit")]
    ReferralAmountNotPositive {
        /// Which side of the referral.
        party: ReferralParty,
    },

    /// Amounts within one discount use different currencies.
    #[error("discount mixes currencies: expected {expected}, found {found}")]
    CurrencyMismatch {
        /// First currency seen.
        expected: &'static str,
        /// Conflicting currency.
        found: &'static str,
    },
}
