//! Dineperks
//!
//! Dineperks is a restaurant discount engine: it validates a catalog of
//! percentage, bank card, fixed-price and loyalty deals, works out which of
//! them a customer may use at a branch and moment, calculates the benefit on
//! an order and drives the staff-facing verification workflow that ends in an
//! applied discount record.

pub mod applications;
pub mod benefits;
pub mod catalog;
pub mod customers;
pub mod discounts;
pub mod eligibility;
pub mod fixtures;
pub mod ids;
pub mod pricing;
pub mod report;
pub mod tiers;
pub mod verification;
