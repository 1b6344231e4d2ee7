//! Discount Fixtures

use jiff::{
    Timestamp,
    civil::{Date, Time, Weekday},
};
use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use serde::Deserialize;

use crate::{
    discounts::{
        AvailabilityDraft, BankCardRule, BankDiscount, DayRange, DiscountDraft, DiscountKind,
        DiscountStatus, FixedPriceDeal, FixedTier, LoyaltyProgram, PercentageDeal,
        PercentageRange, PriceOption, ReferralBenefit, ReferralProgram, VisitMilestone,
    },
    fixtures::{FixtureError, parse_price},
    ids::{BankId, BranchId, CardTypeId, DiscountId, PriceOptionId},
};

/// Wrapper for discounts in YAML
#[derive(Debug, Deserialize)]
pub struct CatalogFixture {
    /// Discounts in catalog order
    pub discounts: Vec<DiscountFixture>,
}

/// Discount fixture from YAML
#[derive(Debug, Deserialize)]
pub struct DiscountFixture {
    /// Discount id
    pub id: DiscountId,

    /// Display name
    pub name: String,

    /// Publication status, active when omitted
    #[serde(default = "active")]
    pub status: DiscountStatus,

    /// Creation time
    #[serde(default)]
    pub created_at: Option<Timestamp>,

    /// Last edit time
    #[serde(default)]
    pub updated_at: Option<Timestamp>,

    /// Availability, unrestricted when omitted
    #[serde(default)]
    pub availability: AvailabilityFixture,

    /// Kind-specific configuration
    pub deal: DealFixture,
}

const fn active() -> DiscountStatus {
    DiscountStatus::Active
}

/// Availability from YAML
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AvailabilityFixture {
    /// Discount never expires
    pub always_active: bool,

    /// First active day
    pub active_from: Option<Date>,

    /// Last active day (inclusive)
    pub active_until: Option<Date>,

    /// Discount applies at any time of day
    pub all_day: bool,

    /// Daily opening time (e.g., "12:00:00")
    pub day_start: Option<String>,

    /// Daily closing time (e.g., "15:00:00")
    pub day_end: Option<String>,

    /// Discount applies on every weekday
    pub all_week: bool,

    /// Weekday names (e.g., "monday")
    pub days_of_week: Vec<String>,

    /// Only app users qualify
    pub app_users_only: bool,

    /// Offered at every branch
    pub all_branches: bool,

    /// Branch ids
    pub branches: Vec<BranchId>,
}

impl Default for AvailabilityFixture {
    fn default() -> Self {
        Self {
            always_active: true,
            active_from: None,
            active_until: None,
            all_day: true,
            day_start: None,
            day_end: None,
            all_week: true,
            days_of_week: Vec::new(),
            app_users_only: false,
            all_branches: true,
            branches: Vec::new(),
        }
    }
}

impl TryFrom<AvailabilityFixture> for AvailabilityDraft {
    type Error = FixtureError;

    fn try_from(fixture: AvailabilityFixture) -> Result<Self, Self::Error> {
        Ok(Self {
            always_active: fixture.always_active,
            active_from: fixture.active_from,
            active_until: fixture.active_until,
            all_day: fixture.all_day,
            day_start: fixture.day_start.as_deref().map(parse_time).transpose()?,
            day_end: fixture.day_end.as_deref().map(parse_time).transpose()?,
            all_week: fixture.all_week,
            days_of_week: fixture
                .days_of_week
                .iter()
                .map(|day| parse_weekday(day))
                .collect::<Result<_, _>>()?,
            app_users_only: fixture.app_users_only,
            all_branches: fixture.all_branches,
            branches: fixture.branches,
        })
    }
}

/// Bank card rule from YAML
#[derive(Debug, Deserialize)]
pub struct BankCardFixture {
    /// Bank id
    pub bank: BankId,

    /// Accepted card type ids
    pub card_types: Vec<CardTypeId>,
}

/// Fixed-price option from YAML
#[derive(Debug, Deserialize)]
pub struct PriceOptionFixture {
    /// Option id
    pub id: PriceOptionId,

    /// Label shown to staff
    pub label: String,

    /// Deal price (e.g., "900.00 PKR")
    pub price: String,
}

/// Loyalty percentage range from YAML
#[derive(Debug, Deserialize)]
pub struct PercentageRangeFixture {
    /// First day covered
    pub min_days: u32,

    /// Last day covered
    pub max_days: u32,

    /// Percentage points off
    pub percentage: Decimal,
}

/// Loyalty fixed tier from YAML
#[derive(Debug, Deserialize)]
pub struct FixedTierFixture {
    /// First day covered
    pub min_days: u32,

    /// Last day covered
    pub max_days: u32,

    /// Tier name
    pub label: String,

    /// Amount off (e.g., "150.00 PKR")
    pub amount: String,
}

/// Visit milestone from YAML
#[derive(Debug, Deserialize)]
pub struct MilestoneFixture {
    /// Visits required
    pub visits: u32,

    /// Milestone name
    pub label: String,

    /// Amount off (e.g., "100.00 PKR")
    pub amount: String,
}

/// Referral benefit from YAML
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReferralBenefitFixture {
    /// Percentage points off the order
    Percentage {
        /// Percentage points
        value: Decimal,
    },

    /// Flat amount off (e.g., "200.00 PKR")
    Fixed {
        /// Amount string
        value: String,
    },
}

/// Discount kind configuration from YAML
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DealFixture {
    /// Percentage off the order
    Percentage {
        /// Percentage points (e.g., 20 for 20%)
        percentage: Decimal,

        /// Largest discount per order
        #[serde(default)]
        cap: Option<String>,
    },

    /// Percentage off for accepted bank cards
    Bank {
        /// Percentage points
        percentage: Decimal,

        /// Largest discount per order
        #[serde(default)]
        cap: Option<String>,

        /// Accepted cards per bank
        cards: Vec<BankCardFixture>,
    },

    /// Fixed price replacing the order total
    FixedPrice {
        /// Price options
        options: Vec<PriceOptionFixture>,
    },

    /// Loyalty percentage by loyalty days
    LoyaltyPercentage {
        /// Day ranges
        ranges: Vec<PercentageRangeFixture>,

        /// Largest discount per order
        #[serde(default)]
        cap: Option<String>,
    },

    /// Loyalty flat amount by loyalty days
    LoyaltyFixed {
        /// Day tiers
        tiers: Vec<FixedTierFixture>,
    },

    /// Loyalty flat amount by visit count
    LoyaltyVisits {
        /// Visit milestones
        milestones: Vec<MilestoneFixture>,
    },

    /// Referral program
    Referral {
        /// Benefit for the referring customer
        referrer_benefit: ReferralBenefitFixture,

        /// Benefit for the referred customer's order
        referred_benefit: ReferralBenefitFixture,

        /// Largest percentage benefit per order
        #[serde(default)]
        cap: Option<String>,
    },
}

fn parse_cap(cap: Option<&str>) -> Result<Option<Money<'static, Currency>>, FixtureError> {
    cap.map(parse_price).transpose()
}

impl TryFrom<ReferralBenefitFixture> for ReferralBenefit<'static> {
    type Error = FixtureError;

    fn try_from(fixture: ReferralBenefitFixture) -> Result<Self, Self::Error> {
        match fixture {
            ReferralBenefitFixture::Percentage { value } => Ok(Self::Percentage(value)),
            ReferralBenefitFixture::Fixed { value } => Ok(Self::Fixed(parse_price(&value)?)),
        }
    }
}

impl TryFrom<DealFixture> for DiscountKind<'static> {
    type Error = FixtureError;

    fn try_from(fixture: DealFixture) -> Result<Self, Self::Error> {
        let kind = match fixture {
            DealFixture::Percentage { percentage, cap } => Self::Percentage(PercentageDeal {
                percentage,
                cap: parse_cap(cap.as_deref())?,
            }),
            DealFixture::Bank {
                percentage,
                cap,
                cards,
            } => Self::Bank(BankDiscount {
                percentage,
                cap: parse_cap(cap.as_deref())?,
                cards: cards
                    .into_iter()
                    .map(|card| BankCardRule {
                        bank: card.bank,
                        card_types: card.card_types.into_iter().collect(),
                    })
                    .collect(),
            }),
            DealFixture::FixedPrice { options } => Self::FixedPrice(FixedPriceDeal {
                options: options
                    .into_iter()
                    .map(|option| {
                        Ok(PriceOption {
                            id: option.id,
                            label: option.label,
                            price: parse_price(&option.price)?,
                        })
                    })
                    .collect::<Result<_, FixtureError>>()?,
            }),
            DealFixture::LoyaltyPercentage { ranges, cap } => {
                Self::Loyalty(LoyaltyProgram::Percentage {
                    ranges: ranges
                        .into_iter()
                        .map(|range| PercentageRange {
                            days: DayRange::new(range.min_days, range.max_days),
                            percentage: range.percentage,
                        })
                        .collect(),
                    cap: parse_cap(cap.as_deref())?,
                })
            }
            DealFixture::LoyaltyFixed { tiers } => Self::Loyalty(LoyaltyProgram::Fixed {
                tiers: tiers
                    .into_iter()
                    .map(|tier| {
                        Ok(FixedTier {
                            days: DayRange::new(tier.min_days, tier.max_days),
                            label: tier.label,
                            amount: parse_price(&tier.amount)?,
                        })
                    })
                    .collect::<Result<_, FixtureError>>()?,
            }),
            DealFixture::LoyaltyVisits { milestones } => {
                Self::Loyalty(LoyaltyProgram::VisitBased {
                    milestones: milestones
                        .into_iter()
                        .map(|milestone| {
                            Ok(VisitMilestone {
                                visits: milestone.visits,
                                label: milestone.label,
                                amount: parse_price(&milestone.amount)?,
                            })
                        })
                        .collect::<Result<_, FixtureError>>()?,
                })
            }
            DealFixture::Referral {
                referrer_benefit,
                referred_benefit,
                cap,
            } => Self::Loyalty(LoyaltyProgram::Referral(ReferralProgram {
                referrer_benefit: referrer_benefit.try_into()?,
                referred_benefit: referred_benefit.try_into()?,
                cap: parse_cap(cap.as_deref())?,
            })),
        };

        Ok(kind)
    }
}

impl TryFrom<DiscountFixture> for DiscountDraft<'static> {
    type Error = FixtureError;

    fn try_from(fixture: DiscountFixture) -> Result<Self, Self::Error> {
        let created_at = fixture.created_at.unwrap_or(Timestamp::UNIX_EPOCH);

        Ok(Self {
            id: fixture.id,
            name: fixture.name,
            status: fixture.status,
            created_at,
            updated_at: fixture.updated_at.unwrap_or(created_at),
            availability: fixture.availability.try_into()?,
            kind: fixture.deal.try_into()?,
        })
    }
}

/// Parse a time of day (e.g., "12:00:00")
///
/// # Errors
///
/// Returns an error if the string is not a valid time of day.
pub fn parse_time(s: &str) -> Result<Time, FixtureError> {
    s.trim()
        .parse::<Time>()
        .map_err(|_err| FixtureError::InvalidTime(s.to_string()))
}

/// Parse a weekday name (e.g., "monday" or "Mon")
///
/// # Errors
///
/// Returns an error if the string is not an English weekday name.
pub fn parse_weekday(s: &str) -> Result<Weekday, FixtureError> {
    let weekday = match s.trim().to_ascii_lowercase().as_str() {
        "monday" | "mon" => Weekday::Monday,
        "tuesday" | "tue" => Weekday::Tuesday,
        "wednesday" | "wed" => Weekday::Wednesday,
        "thursday" | "thu" => Weekday::Thursday,
        "friday" | "fri" => Weekday::Friday,
        "saturday" | "sat" => Weekday::Saturday,
        "sunday" | "sun" => Weekday::Sunday,
        _ => return Err(FixtureError::InvalidWeekday(s.to_string())),
    };

    Ok(weekday)
}
