//! Eligibility
//!
//! Filters a catalog snapshot down to the discounts a customer may use at a
//! branch at a given moment. Pure: the result depends only on the catalog and
//! the context, and the output keeps catalog order.

use jiff::civil::DateTime;

use crate::{discounts::Discount, ids::BranchId, tiers::CustomerMetrics};

/// Everything known about one customer lookup, built fresh per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationContext {
    /// Branch where the customer is being served.
    pub branch: BranchId,

    /// Local date and time at the branch.
    pub moment: DateTime,

    /// Whether the customer uses the app.
    pub is_app_user: bool,

    /// Days since the customer's first recorded visit.
    pub loyalty_days: u32,

    /// Number of recorded visits.
    pub visit_count: u32,
}

impl EvaluationContext {
    /// Context for a customer with no history.
    pub fn new_customer(branch: BranchId, moment: DateTime) -> Self {
        Self {
            branch,
            moment,
            is_app_user: false,
            loyalty_days: 0,
            visit_count: 0,
        }
    }

    /// Metrics used for tier selection.
    pub const fn metrics(&self) -> CustomerMetrics {
        CustomerMetrics {
            loyalty_days: self.loyalty_days,
            visit_count: self.visit_count,
        }
    }
}

/// Reason a discount does not apply, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligibility {
    /// Switched off.
    Inactive,

    /// Outside the active date range.
    OutsidePeriod,

    /// Outside the daily window.
    OutsideHours,

    /// Not offered on this weekday.
    WrongWeekday,

    /// Not offered at this branch.
    WrongBranch,

    /// Reserved for app users.
    AppUsersOnly,
}

/// Check one discount against a context, reporting the first failed rule.
///
/// # Errors
///
/// Returns the first [`Ineligibility`] that applies.
pub fn check(discount: &Discount<'_>, ctx: &EvaluationContext) -> Result<(), Ineligibility> {
    let availability = discount.availability();

    if !discount.is_active() {
        return Err(Ineligibility::Inactive);
    }

    if !availability.period().contains(ctx.moment.date()) {
        return Err(Ineligibility::OutsidePeriod);
    }

    if !availability.hours().contains(ctx.moment.time()) {
        return Err(Ineligibility::OutsideHours);
    }

    if !availability.days().contains(ctx.moment.weekday()) {
        return Err(Ineligibility::WrongWeekday);
    }

    if !availability.branches().contains(&ctx.branch) {
        return Err(Ineligibility::WrongBranch);
    }

    if availability.app_users_only() && !ctx.is_app_user {
        return Err(Ineligibility::AppUsersOnly);
    }

    Ok(())
}

/// Whether `discount` applies in `ctx`.
pub fn is_eligible(discount: &Discount<'_>, ctx: &EvaluationContext) -> bool {
    check(discount, ctx).is_ok()
}

/// Discounts from `catalog` that apply in `ctx`.
pub fn filter<'c, 'a>(
    catalog: &'c [Discount<'a>],
    ctx: &EvaluationContext,
) -> Vec<&'c Discount<'a>> {
    catalog
        .iter()
        .filter(|discount| is_eligible(discount, ctx))
        .collect()
}

#[cfg(test)]
mod tests {
    use jiff::{
        Timestamp,
        civil::{Weekday, date, time},
    };
    use rust_decimal::Decimal;
    use testresult::TestResult;

    use crate::discounts::{
        AvailabilityDraft, DiscountDraft, DiscountKind, DiscountStatus, PercentageDeal,
    };

    use super::*;

    fn discount(
        id: &str,
        availability: AvailabilityDraft,
    ) -> Result<Discount<'static>, crate::discounts::InvalidDiscount> {
        Discount::new(DiscountDraft {
            id: id.into(),
            name: id.to_string(),
            status: DiscountStatus::Active,
            created_at: Timestamp::UNIX_EPOCH,
            updated_at: Timestamp::UNIX_EPOCH,
            availability,
            kind: DiscountKind::Percentage(PercentageDeal {
                percentage: Decimal::TEN,
                cap: None,
            }),
        })
    }

    fn ctx() -> EvaluationContext {
        // Friday lunchtime
        EvaluationContext {
            branch: BranchId::new("gulberg"),
            moment: date(2026, 10, 16).at(13, 30, 0, 0),
            is_app_user: false,
            loyalty_days: 12,
            visit_count: 3,
        }
    }

    #[test]
    fn unrestricted_discount_is_eligible() -> TestResult {
        let discount = discount("open", AvailabilityDraft::default())?;

        assert_eq!(check(&discount, &ctx()), Ok(()));

        Ok(())
    }

    #[test]
    fn inactive_discount_is_ineligible() -> TestResult {
        let discount = Discount::new(DiscountDraft {
            id: "off".into(),
            name: "Off".to_string(),
            status: DiscountStatus::Inactive,
            created_at: Timestamp::UNIX_EPOCH,
            updated_at: Timestamp::UNIX_EPOCH,
            availability: AvailabilityDraft::default(),
            kind: DiscountKind::Percentage(PercentageDeal {
                percentage: Decimal::TEN,
                cap: None,
            }),
        })?;

        assert_eq!(check(&discount, &ctx()), Err(Ineligibility::Inactive));

        Ok(())
    }

    #[test]
    fn each_axis_is_checked() -> TestResult {
        let expired = discount(
            "expired",
            AvailabilityDraft {
                always_active: false,
                active_from: Some(date(2026, 9, 1)),
                active_until: Some(date(2026, 10, 15)),
                ..AvailabilityDraft::default()
            },
        )?;

        let dinner = discount(
            "dinner",
            AvailabilityDraft {
                all_day: false,
                day_start: Some(time(18, 0, 0, 0)),
                day_end: Some(time(23, 0, 0, 0)),
                ..AvailabilityDraft::default()
            },
        )?;

        let weekend = discount(
            "weekend",
            AvailabilityDraft {
                all_week: false,
                days_of_week: vec![Weekday::Saturday, Weekday::Sunday],
                ..AvailabilityDraft::default()
            },
        )?;

        let dha_only = discount(
            "dha",
            AvailabilityDraft {
                all_branches: false,
                branches: vec![BranchId::new("dha")],
                ..AvailabilityDraft::default()
            },
        )?;

        let app_only = discount(
            "app",
            AvailabilityDraft {
                app_users_only: true,
                ..AvailabilityDraft::default()
            },
        )?;

        let ctx = ctx();

        assert_eq!(check(&expired, &ctx), Err(Ineligibility::OutsidePeriod));
        assert_eq!(check(&dinner, &ctx), Err(Ineligibility::OutsideHours));
        assert_eq!(check(&weekend, &ctx), Err(Ineligibility::WrongWeekday));
        assert_eq!(check(&dha_only, &ctx), Err(Ineligibility::WrongBranch));
        assert_eq!(check(&app_only, &ctx), Err(Ineligibility::AppUsersOnly));

        let app_user = EvaluationContext {
            is_app_user: true,
            ..ctx
        };

        assert_eq!(check(&app_only, &app_user), Ok(()));

        Ok(())
    }

    #[test]
    fn filter_keeps_catalog_order_and_is_repeatable() -> TestResult {
        let catalog = vec![
            discount("a", AvailabilityDraft::default())?,
            discount(
                "b",
                AvailabilityDraft {
                    app_users_only: true,
                    ..AvailabilityDraft::default()
                },
            )?,
            discount("c", AvailabilityDraft::default())?,
        ];

        let ctx = ctx();
        let first: Vec<_> = filter(&catalog, &ctx)
            .into_iter()
            .map(|discount| discount.id().as_str())
            .collect();
        let second: Vec<_> = filter(&catalog, &ctx)
            .into_iter()
            .map(|discount| discount.id().as_str())
            .collect();

        assert_eq!(first, vec!["a", "c"]);
        assert_eq!(first, second);

        Ok(())
    }
}
