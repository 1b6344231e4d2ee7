//! Customers
//!
//! Phone normalisation and the customer-profile lookup used to build an
//! [`EvaluationContext`] for a verification session.

use std::fmt;

use async_trait::async_trait;
use jiff::civil::DateTime;
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::{eligibility::EvaluationContext, ids::BranchId};

/// Minimum digits in a usable phone number.
const MIN_PHONE_DIGITS: usize = 7;

/// Maximum digits allowed by E.164.
const MAX_PHONE_DIGITS: usize = 15;

/// Phone number errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhoneError {
    /// Characters other than digits, spaces, dashes, dots, parentheses or a
    /// leading plus.
    #[error("phone number may only contain digits, spaces, dashes and a leading +")]
    InvalidCharacter,

    /// Too few or too many digits.
    #[error("phone number must have between {MIN_PHONE_DIGITS} and {MAX_PHONE_DIGITS} digits")]
    InvalidLength,
}

/// Normalised customer phone number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Normalise a phone number as typed by staff.
    ///
    /// # Errors
    ///
    /// Returns a [`PhoneError`] for invalid characters or digit counts.
    pub fn parse(raw: &str) -> Result<Self, PhoneError> {
        let trimmed = raw.trim();
        let (plus, rest) = match trimmed.strip_prefix('+') {
            Some(rest) => ("+", rest),
            None => ("", trimmed),
        };

        let mut digits = String::with_capacity(rest.len());

        for ch in rest.chars() {
            match ch {
                '0'..='9' => digits.push(ch),
                ' ' | '-' | '.' | '(' | ')' => {}
                _ => return Err(PhoneError::InvalidCharacter),
            }
        }

        if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len()) {
            return Err(PhoneError::InvalidLength);
        }

        Ok(Self(format!("{plus}{digits}")))
    }

    /// Borrow the normalised number.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(value: PhoneNumber) -> Self {
        value.0
    }
}

/// Customer history known to the restaurant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerProfile {
    /// Name to greet the customer with.
    pub display_name: Option<String>,

    /// Days since the first recorded visit.
    pub loyalty_days: u32,

    /// Number of recorded visits.
    pub visit_count: u32,

    /// Whether the customer uses the app.
    pub is_app_user: bool,
}

/// Customer lookup failures.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The profile service could not be reached.
    #[error("customer profile service unavailable: {0}")]
    Unavailable(String),
}

/// Source of customer profiles.
#[automock]
#[async_trait]
pub trait CustomerLookup: Send + Sync {
    /// Find the profile for `phone`, or `None` for an unknown customer.
    async fn find_by_phone(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Option<CustomerProfile>, LookupError>;
}

/// Customer resolved for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCustomer {
    /// Context for eligibility and calculation.
    pub context: EvaluationContext,

    /// Name on file, if any.
    pub display_name: Option<String>,

    /// Whether the customer has a profile.
    pub known: bool,
}

/// Look up `phone` and build the evaluation context for a session.
///
/// Unknown customers and failed lookups both proceed as new customers with
/// no loyalty history.
#[tracing::instrument(
    name = "customers.resolve",
    skip(lookup, phone, branch),
    fields(phone = %phone, branch = %branch, known = tracing::field::Empty)
)]
pub async fn resolve_customer(
    lookup: &dyn CustomerLookup,
    phone: &PhoneNumber,
    branch: BranchId,
    moment: DateTime,
) -> ResolvedCustomer {
    let profile = match lookup.find_by_phone(phone).await {
        Ok(profile) => profile,
        Err(error) => {
            warn!(%error, "customer lookup failed; continuing as new customer");

            None
        }
    };

    tracing::Span::current().record("known", profile.is_some());

    let Some(profile) = profile else {
        info!("no profile on file; treating as new customer");

        return ResolvedCustomer {
            context: EvaluationContext::new_customer(branch, moment),
            display_name: None,
            known: false,
        };
    };

    ResolvedCustomer {
        context: EvaluationContext {
            branch,
            moment,
            is_app_user: profile.is_app_user,
            loyalty_days: profile.loyalty_days,
            visit_count: profile.visit_count,
        },
        display_name: profile.display_name,
        known: true,
    }
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;
    use testresult::TestResult;

    use super::*;

    fn moment() -> DateTime {
        date(2026, 10, 16).at(19, 0, 0, 0)
    }

    #[test]
    fn phone_numbers_are_normalised() -> TestResult {
        assert_eq!(PhoneNumber::parse(" 0300-123 4567 ")?.as_str(), "03001234567");
        assert_eq!(PhoneNumber::parse("+92 (300) 1234567")?.as_str(), "+923001234567");

        Ok(())
    }

    #[test]
    fn bad_phone_numbers_are_rejected() {
        assert_eq!(PhoneNumber::parse("12345"), Err(PhoneError::InvalidLength));
        assert_eq!(
            PhoneNumber::parse("0300-CALL-ME"),
            Err(PhoneError::InvalidCharacter)
        );
        assert_eq!(
            PhoneNumber::parse("1234567890123456"),
            Err(PhoneError::InvalidLength)
        );
    }

    #[tokio::test]
    async fn known_customer_context_uses_profile() -> TestResult {
        let phone = PhoneNumber::parse("03001234567")?;
        let mut lookup = MockCustomerLookup::new();

        lookup.expect_find_by_phone().returning(|_| {
            Ok(Some(CustomerProfile {
                display_name: Some("Ayesha".to_string()),
                loyalty_days: 45,
                visit_count: 7,
                is_app_user: true,
            }))
        });

        let resolved = resolve_customer(&lookup, &phone, BranchId::new("gulberg"), moment()).await;

        assert!(resolved.known);
        assert_eq!(resolved.display_name.as_deref(), Some("Ayesha"));
        assert_eq!(resolved.context.loyalty_days, 45);
        assert_eq!(resolved.context.visit_count, 7);
        assert!(resolved.context.is_app_user);

        Ok(())
    }

    #[tokio::test]
    async fn unknown_customer_is_new() -> TestResult {
        let phone = PhoneNumber::parse("03001234567")?;
        let mut lookup = MockCustomerLookup::new();

        lookup.expect_find_by_phone().returning(|_| Ok(None));

        let resolved = resolve_customer(&lookup, &phone, BranchId::new("gulberg"), moment()).await;

        assert!(!resolved.known);
        assert_eq!(
            resolved.context,
            EvaluationContext::new_customer(BranchId::new("gulberg"), moment())
        );

        Ok(())
    }

    #[tokio::test]
    async fn failed_lookup_proceeds_as_new_customer() -> TestResult {
        let phone = PhoneNumber::parse("03001234567")?;
        let mut lookup = MockCustomerLookup::new();

        lookup
            .expect_find_by_phone()
            .returning(|_| Err(LookupError::Unavailable("timeout".to_string())));

        let resolved = resolve_customer(&lookup, &phone, BranchId::new("gulberg"), moment()).await;

        assert!(!resolved.known);
        assert_eq!(resolved.context.loyalty_days, 0);
        assert_eq!(resolved.context.visit_count, 0);

        Ok(())
    }
}
