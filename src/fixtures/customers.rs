//! Customer Fixtures

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::{
    customers::{CustomerLookup, CustomerProfile, LookupError, PhoneNumber},
    fixtures::FixtureError,
};

/// Wrapper for customers in YAML
#[derive(Debug, Deserialize)]
pub struct CustomersFixture {
    /// Known customers
    pub customers: Vec<CustomerFixture>,
}

/// Customer fixture from YAML
#[derive(Debug, Deserialize)]
pub struct CustomerFixture {
    /// Phone number, normalised on load
    pub phone: PhoneNumber,

    /// Name on file
    #[serde(default)]
    pub name: Option<String>,

    /// Days since the first recorded visit
    #[serde(default)]
    pub loyalty_days: u32,

    /// Recorded visits
    #[serde(default)]
    pub visit_count: u32,

    /// Whether the customer uses the app
    #[serde(default)]
    pub app_user: bool,
}

impl From<CustomerFixture> for CustomerProfile {
    fn from(fixture: CustomerFixture) -> Self {
        Self {
            display_name: fixture.name,
            loyalty_days: fixture.loyalty_days,
            visit_count: fixture.visit_count,
            is_app_user: fixture.app_user,
        }
    }
}

/// Customer profiles keyed by phone number.
#[derive(Debug, Clone, Default)]
pub struct CustomerDirectory {
    profiles: FxHashMap<PhoneNumber, CustomerProfile>,
}

impl CustomerDirectory {
    /// Parse a YAML customer directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or holds an invalid phone
    /// number.
    pub fn from_yaml(yaml: &str) -> Result<Self, FixtureError> {
        let fixture: CustomersFixture = serde_norway::from_str(yaml)?;

        Ok(fixture
            .customers
            .into_iter()
            .map(|customer| (customer.phone.clone(), customer.into()))
            .collect())
    }

    /// Number of known customers.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether no customers are known.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Profile for `phone`.
    pub fn get(&self, phone: &PhoneNumber) -> Option<&CustomerProfile> {
        self.profiles.get(phone)
    }
}

impl FromIterator<(PhoneNumber, CustomerProfile)> for CustomerDirectory {
    fn from_iter<I: IntoIterator<Item = (PhoneNumber, CustomerProfile)>>(iter: I) -> Self {
        Self {
            profiles: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
impl CustomerLookup for CustomerDirectory {
    async fn find_by_phone(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Option<CustomerProfile>, LookupError> {
        Ok(self.get(phone).cloned())
    }
}
