//! Applied Discounts
//!
//! The record written once a verified discount is applied to an order, and
//! the append-only ledger it is written to.

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use crate::{
    benefits::{BenefitResult, Selection},
    customers::PhoneNumber,
    discounts::Discount,
    ids::{BankId, BranchId, CardTypeId, DiscountId, PriceOptionId},
};

/// Sub-selection the discount was applied with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppliedOption {
    /// Bank card presented by the customer.
    BankCard {
        /// Issuing bank.
        bank: BankId,

        /// Card type, when recorded.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        card_type: Option<CardTypeId>,
    },

    /// Fixed-price option.
    PriceOption {
        /// Chosen option.
        id: PriceOptionId,
    },

    /// Referral by another customer.
    Referrer {
        /// Verified phone number of the referring customer.
        phone: String,
    },
}

impl From<&Selection> for AppliedOption {
    fn from(selection: &Selection) -> Self {
        match selection {
            Selection::BankCard { bank, card_type } => Self::BankCard {
                bank: bank.clone(),
                card_type: card_type.clone(),
            },
            Selection::PriceOption(id) => Self::PriceOption { id: id.clone() },
            Selection::Referrer(referrer) => Self::Referrer {
                phone: referrer.phone().to_string(),
            },
        }
    }
}

/// Discount applied to one order.
///
/// Amounts are stored in minor units of `currency`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedDiscount {
    /// Applied discount.
    pub discount_id: DiscountId,

    /// Name of the discount when it was applied.
    pub discount_name: String,

    /// Kind of the discount, for reporting.
    pub kind: String,

    /// Verified phone number of the customer.
    pub customer_phone: String,

    /// Name entered by staff.
    pub customer_name: String,

    /// Branch that served the order.
    pub branch: BranchId,

    /// ISO code of the order currency.
    pub currency: String,

    /// Order total before the discount.
    pub order_minor: i64,

    /// Amount taken off.
    pub discount_minor: i64,

    /// Amount the customer paid.
    pub final_minor: i64,

    /// Percentage points applied, for percentage-based kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_points: Option<Decimal>,

    /// Loyalty tier, milestone or price option label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_label: Option<String>,

    /// Sub-selection made by staff.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option: Option<AppliedOption>,

    /// When the discount was applied.
    pub applied_at: Timestamp,
}

/// Everything needed to record an applied discount.
#[derive(Debug, Clone, Copy)]
pub struct Application<'r, 'a> {
    /// Applied discount.
    pub discount: &'r Discount<'a>,

    /// Order total the benefit was calculated on.
    pub order_amount: Money<'a, Currency>,

    /// Calculated benefit.
    pub benefit: &'r BenefitResult<'a>,

    /// Sub-selection the benefit was calculated with.
    pub selection: Option<&'r Selection>,

    /// Verified customer phone.
    pub phone: &'r PhoneNumber,

    /// Customer name entered by staff.
    pub customer_name: &'r str,

    /// Serving branch.
    pub branch: &'r BranchId,

    /// Time of application.
    pub applied_at: Timestamp,
}

impl AppliedDiscount {
    /// Build the record for an application.
    pub fn new(application: Application<'_, '_>) -> Self {
        let Application {
            discount,
            order_amount,
            benefit,
            selection,
            phone,
            customer_name,
            branch,
            applied_at,
        } = application;

        Self {
            discount_id: discount.id().clone(),
            discount_name: discount.name().to_string(),
            kind: discount.kind().kind_name().to_string(),
            customer_phone: phone.to_string(),
            customer_name: customer_name.to_string(),
            branch: branch.clone(),
            currency: benefit.amount.currency().iso_alpha_code.to_string(),
            order_minor: order_amount.to_minor_units(),
            discount_minor: benefit.amount.to_minor_units(),
            final_minor: benefit.final_amount.to_minor_units(),
            rate_points: benefit
                .applied_rate
                .map(|rate| (rate * Decimal::ONE_HUNDRED).normalize()),
            tier_label: benefit.tier_label.clone(),
            option: selection.map(AppliedOption::from),
            applied_at,
        }
    }
}

/// Ledger errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger could not be written.
    #[error("failed to record applied discount: {0}")]
    Unavailable(String),

    /// The discount was already recorded for this customer at this time.
    #[error("discount {discount_id} was already recorded at {applied_at}")]
    Duplicate {
        /// Discount id.
        discount_id: DiscountId,
        /// Time of the existing record.
        applied_at: Timestamp,
    },
}

/// Append-only sink for applied discounts.
#[automock]
#[async_trait]
pub trait ApplicationLedger: Send + Sync {
    /// Record an applied discount.
    async fn record(&self, application: &AppliedDiscount) -> Result<(), LedgerError>;
}

/// In-memory ledger.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: Mutex<Vec<AppliedDiscount>>,
}

impl MemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record, in recording order.
    pub async fn records(&self) -> Vec<AppliedDiscount> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl ApplicationLedger for MemoryLedger {
    #[tracing::instrument(
        name = "applications.memory.record",
        skip(self, application),
        fields(discount_id = %application.discount_id, branch = %application.branch),
        err
    )]
    async fn record(&self, application: &AppliedDiscount) -> Result<(), LedgerError> {
        let mut records = self.records.lock().await;

        let duplicate = records.iter().any(|existing| {
            existing.discount_id == application.discount_id
                && existing.customer_phone == application.customer_phone
                && existing.applied_at == application.applied_at
        });

        if duplicate {
            return Err(LedgerError::Duplicate {
                discount_id: application.discount_id.clone(),
                applied_at: application.applied_at,
            });
        }

        records.push(application.clone());

        info!(
            discount_minor = application.discount_minor,
            currency = %application.currency,
            "recorded applied discount"
        );

        Ok(())
    }
}
