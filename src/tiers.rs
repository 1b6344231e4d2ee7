//! Tier Selection
//!
//! Picks the single loyalty tier that applies to a customer. Day-based tiers
//! are contiguous and non-overlapping once validated, so at most one range can
//! contain a given day count. Visit milestones are strictly increasing, so the
//! highest milestone the customer has reached is unique; lower milestones are
//! subsumed rather than stacked.

use crate::discounts::{
    FixedTier, LoyaltyProgram, PercentageRange, VisitMilestone, loyalty::DayTier,
};

/// Customer metrics used to pick a tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CustomerMetrics {
    /// Days since the customer's first recorded visit.
    pub loyalty_days: u32,

    /// Number of recorded visits.
    pub visit_count: u32,
}

/// Tier picked for a customer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectedTier<'t, 'a> {
    /// Percentage range picked by loyalty days.
    Percentage(&'t PercentageRange),

    /// Fixed-amount tier picked by loyalty days.
    Fixed(&'t FixedTier<'a>),

    /// Milestone picked by visit count.
    Milestone(&'t VisitMilestone<'a>),
}

impl SelectedTier<'_, '_> {
    /// Label shown to staff, if the tier has one.
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Percentage(_) => None,
            Self::Fixed(tier) => Some(&tier.label),
            Self::Milestone(milestone) => Some(&milestone.label),
        }
    }
}

/// Outcome of tier selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TierSelection<'t, 'a> {
    /// Exactly one tier applies.
    Tier(SelectedTier<'t, 'a>),

    /// The program is tiered but the customer falls outside every tier.
    NoTier,

    /// The program has no tiers (referral).
    Untiered,
}

/// Find the day tier containing `loyalty_days`.
pub fn select_day_tier<T: DayTier>(tiers: &[T], loyalty_days: u32) -> Option<&T> {
    tiers.iter().find(|tier| tier.days().contains(loyalty_days))
}

/// Find the highest milestone reached with `visit_count` visits.
pub fn select_milestone<'t, 'a>(
    milestones: &'t [VisitMilestone<'a>],
    visit_count: u32,
) -> Option<&'t VisitMilestone<'a>> {
    milestones
        .iter()
        .filter(|milestone| milestone.visits <= visit_count)
        .max_by_key(|milestone| milestone.visits)
}

/// Select the tier of `program` that applies to a customer.
pub fn select_tier<'t, 'a>(
    program: &'t LoyaltyProgram<'a>,
    metrics: CustomerMetrics,
) -> TierSelection<'t, 'a> {
    let selected = match program {
        LoyaltyProgram::Percentage { ranges, .. } => {
            select_day_tier(ranges, metrics.loyalty_days).map(SelectedTier::Percentage)
        }
        LoyaltyProgram::Fixed { tiers } => {
            select_day_tier(tiers, metrics.loyalty_days).map(SelectedTier::Fixed)
        }
        LoyaltyProgram::VisitBased { milestones } => {
            select_milestone(milestones, metrics.visit_count).map(SelectedTier::Milestone)
        }
        LoyaltyProgram::Referral(_) => return TierSelection::Untiered,
    };

    selected.map_or(TierSelection::NoTier, TierSelection::Tier)
}
