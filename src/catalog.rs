//! Catalog
//!
//! An immutable snapshot of validated discounts, as handed to one
//! verification session. Drafts that fail validation are kept aside for the
//! operator instead of reaching the evaluator.

use rusty_money::{Money, iso::Currency};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    benefits::{BenefitResult, CalculationError, Selection, calculate},
    discounts::{Discount, DiscountDraft, InvalidDiscount},
    eligibility::{self, EvaluationContext},
    ids::DiscountId,
};

/// Why a catalog entry was set aside.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectionReason {
    /// The draft broke a catalog invariant.
    #[error(transparent)]
    Invalid(#[from] InvalidDiscount),

    /// The entry could not be read into a draft (bad time, weekday or price).
    #[error("{0}")]
    Malformed(String),
}

/// Catalog entry that was set aside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedDiscount {
    /// Id of the rejected entry.
    pub id: DiscountId,

    /// Display name of the rejected entry.
    pub name: String,

    /// Why it was rejected.
    pub error: RejectionReason,
}

/// Snapshot of the discount catalog.
#[derive(Debug, Clone, Default)]
pub struct Catalog<'a> {
    discounts: Vec<Discount<'a>>,
    rejected: Vec<RejectedDiscount>,
}

impl<'a> Catalog<'a> {
    /// Build a snapshot from already validated discounts.
    pub fn new(discounts: Vec<Discount<'a>>) -> Self {
        Self {
            discounts,
            rejected: Vec::new(),
        }
    }

    /// Validate drafts, keeping the valid ones and setting the rest aside.
    pub fn ingest(drafts: impl IntoIterator<Item = DiscountDraft<'a>>) -> Self {
        let mut catalog = Self::default();

        for draft in drafts {
            let id = draft.id.clone();
            let name = draft.name.clone();

            match Discount::new(draft) {
                Ok(discount) => catalog.discounts.push(discount),
                Err(error) => {
                    warn!(discount_id = %id, %error, "rejected invalid discount");

                    catalog.rejected.push(RejectedDiscount {
                        id,
                        name,
                        error: error.into(),
                    });
                }
            }
        }

        debug!(
            accepted = catalog.discounts.len(),
            rejected = catalog.rejected.len(),
            "ingested discount catalog"
        );

        catalog
    }

    /// Add entries that were rejected before they became drafts.
    #[must_use]
    pub fn with_rejected(mut self, rejected: impl IntoIterator<Item = RejectedDiscount>) -> Self {
        self.rejected.extend(rejected);
        self
    }

    /// Valid discounts, in catalog order.
    pub fn discounts(&self) -> &[Discount<'a>] {
        &self.discounts
    }

    /// Drafts that failed validation.
    pub fn rejected(&self) -> &[RejectedDiscount] {
        &self.rejected
    }

    /// Number of valid discounts.
    pub fn len(&self) -> usize {
        self.discounts.len()
    }

    /// Whether there are no valid discounts.
    pub fn is_empty(&self) -> bool {
        self.discounts.is_empty()
    }

    /// Find a discount by id.
    pub fn get(&self, id: &DiscountId) -> Option<&Discount<'a>> {
        self.discounts.iter().find(|discount| discount.id() == id)
    }

    /// Discounts applicable in `ctx`.
    pub fn list_eligible(&self, ctx: &EvaluationContext) -> Vec<&Discount<'a>> {
        eligibility::filter(&self.discounts, ctx)
    }

    /// Calculate the benefit of the discount `id` without side effects.
    ///
    /// # Errors
    ///
    /// Returns [`CalculationError::UnknownDiscount`] when `id` is not in the
    /// snapshot, otherwise whatever [`calculate`] reports.
    pub fn preview(
        &self,
        id: &DiscountId,
        order_amount: Money<'a, Currency>,
        ctx: &EvaluationContext,
        selection: Option<&Selection>,
    ) -> Result<BenefitResult<'a>, CalculationError> {
        let discount = self
            .get(id)
            .ok_or_else(|| CalculationError::UnknownDiscount(id.clone()))?;

        calculate(discount, order_amount, ctx, selection)
    }
}

#[cfg(test)]
mod tests {
    use jiff::{Timestamp, civil::date};
    use rust_decimal::Decimal;
    use rusty_money::iso::PKR;
    use testresult::TestResult;

    use crate::{
        discounts::{AvailabilityDraft, DiscountKind, DiscountStatus, PercentageDeal},
        ids::BranchId,
    };

    use super::*;

    fn draft(id: &str, percentage: i64) -> DiscountDraft<'static> {
        DiscountDraft {
            id: id.into(),
            name: format!("{percentage}% off"),
            status: DiscountStatus::Active,
            created_at: Timestamp::UNIX_EPOCH,
            updated_at: Timestamp::UNIX_EPOCH,
            availability: AvailabilityDraft::default(),
            kind: DiscountKind::Percentage(PercentageDeal {
                percentage: Decimal::new(percentage, 0),
                cap: None,
            }),
        }
    }

    fn ctx() -> EvaluationContext {
        EvaluationContext::new_customer(
            BranchId::new("gulberg"),
            date(2026, 10, 16).at(20, 0, 0, 0),
        )
    }

    #[test]
    fn ingest_sets_invalid_drafts_aside() {
        let catalog = Catalog::ingest([draft("ten", 10), draft("zero", 0), draft("twenty", 20)]);

        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.rejected(),
            &[RejectedDiscount {
                id: "zero".into(),
                name: "0% off".to_string(),
                error: RejectionReason::Invalid(InvalidDiscount::PercentageOutOfRange {
                    value: Decimal::ZERO
                }),
            }]
        );
    }

    #[test]
    fn list_eligible_is_repeatable() {
        let catalog = Catalog::ingest([draft("ten", 10), draft("twenty", 20)]);
        let ctx = ctx();

        let first = catalog.list_eligible(&ctx);
        let second = catalog.list_eligible(&ctx);

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn preview_by_id() -> TestResult {
        let catalog = Catalog::ingest([draft("ten", 10)]);
        let ctx = ctx();

        let result = catalog.preview(&"ten".into(), Money::from_minor(50_000, PKR), &ctx, None)?;

        assert_eq!(result.amount, Money::from_minor(5_000, PKR));
        assert_eq!(
            catalog.preview(&"gone".into(), Money::from_minor(50_000, PKR), &ctx, None),
            Err(CalculationError::UnknownDiscount("gone".into()))
        );

        Ok(())
    }
}
