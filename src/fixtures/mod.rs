//! Fixtures
//!
//! YAML catalogs and customer directories for the command line tool and the
//! integration tests. Catalogs live in `<base>/catalogs/<name>.yml` and
//! customer directories in `<base>/customers/<name>.yml`.

use std::{
    fs,
    path::{Path, PathBuf},
};

use rust_decimal::{Decimal, prelude::ToPrimitive};
use rusty_money::{
    Money,
    iso::{self, Currency},
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    catalog::{Catalog, RejectedDiscount, RejectionReason},
    discounts::DiscountDraft,
    fixtures::discounts::CatalogFixture,
};

pub mod customers;
pub mod discounts;

pub use customers::CustomerDirectory;

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file {path}: {source}")]
    Io {
        /// File that could not be read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid price format
    #[error("Invalid price format: {0}")]
    InvalidPrice(String),

    /// Unknown currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Invalid time of day
    #[error("Invalid time of day: {0}")]
    InvalidTime(String),

    /// Invalid weekday name
    #[error("Invalid weekday: {0}")]
    InvalidWeekday(String),
}

/// Fixture loader rooted at a base directory.
#[derive(Debug, Clone)]
pub struct Fixtures {
    base_path: PathBuf,
}

impl Fixtures {
    /// Loader for the default `./fixtures` directory.
    pub fn new() -> Self {
        Self::with_base_path("./fixtures")
    }

    /// Loader for a custom base directory.
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Base directory.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Load and validate the catalog `name`.
    ///
    /// Invalid or malformed entries are set aside in [`Catalog::rejected`]
    /// rather than failing the load.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a YAML catalog.
    pub fn load_catalog(&self, name: &str) -> Result<Catalog<'static>, FixtureError> {
        let contents = self.read("catalogs", name)?;

        parse_catalog(&contents)
    }

    /// Load the customer directory `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_customers(&self, name: &str) -> Result<CustomerDirectory, FixtureError> {
        let contents = self.read("customers", name)?;

        CustomerDirectory::from_yaml(&contents)
    }

    fn read(&self, category: &str, name: &str) -> Result<String, FixtureError> {
        let path = self.base_path.join(category).join(format!("{name}.yml"));

        debug!(path = %path.display(), "loading fixture");

        fs::read_to_string(&path).map_err(|source| FixtureError::Io { path, source })
    }
}

impl Default for Fixtures {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse and validate a YAML catalog.
///
/// An entry whose price, time or weekday cannot be parsed is rejected on its
/// own; the other entries still load.
///
/// # Errors
///
/// Returns an error if the document is not valid YAML or does not have the
/// catalog structure.
pub fn parse_catalog(yaml: &str) -> Result<Catalog<'static>, FixtureError> {
    let fixture: CatalogFixture = serde_norway::from_str(yaml)?;

    let mut drafts = Vec::with_capacity(fixture.discounts.len());
    let mut malformed = Vec::new();

    for entry in fixture.discounts {
        let id = entry.id.clone();
        let name = entry.name.clone();

        match DiscountDraft::try_from(entry) {
            Ok(draft) => drafts.push(draft),
            Err(error) => {
                warn!(discount_id = %id, %error, "rejected malformed discount");

                malformed.push(RejectedDiscount {
                    id,
                    name,
                    error: RejectionReason::Malformed(error.to_string()),
                });
            }
        }
    }

    Ok(Catalog::ingest(drafts).with_rejected(malformed))
}

/// Parse price string (e.g., "4000.00 PKR") into an amount of money
///
/// # Errors
///
/// Returns an error if the string is not in the format "AMOUNT CURRENCY",
/// if the amount is not a decimal number, or if the currency code is not a
/// known ISO code.
pub fn parse_price(s: &str) -> Result<Money<'static, Currency>, FixtureError> {
    let mut parts = s.split_whitespace();

    let (Some(amount), Some(code), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(FixtureError::InvalidPrice(format!(
            "Expected format 'AMOUNT CURRENCY', got: {s}"
        )));
    };

    let amount = amount
        .parse::<Decimal>()
        .map_err(|_err| FixtureError::InvalidPrice(s.to_string()))?;

    let currency =
        iso::find(code).ok_or_else(|| FixtureError::UnknownCurrency(code.to_string()))?;

    let minor_units = 10_i64
        .checked_pow(currency.exponent)
        .and_then(|scale| amount.checked_mul(Decimal::from(scale)))
        .and_then(|value| value.round_dp(0).to_i64())
        .ok_or_else(|| FixtureError::InvalidPrice(s.to_string()))?;

    Ok(Money::from_minor(minor_units, currency))
}
