//! Benefit scenarios over a YAML catalog, from eligibility through preview.

use jiff::civil::{DateTime, date};
use rusty_money::{Money, iso::{self, PKR}};
use testresult::TestResult;

use dineperks::{
    benefits::{CalculationError, Selection},
    catalog::Catalog,
    discounts::{DiscountKind, LoyaltyProgram},
    eligibility::EvaluationContext,
    fixtures::{Fixtures, parse_catalog},
    ids::{BankId, BranchId, CardTypeId},
    tiers::{TierSelection, select_tier},
};

const CATALOG: &str = r#"
discounts:
  - id: twenty-capped
    name: Twenty percent, capped
    deal:
      type: percentage
      percentage: 20
      cap: "500.00 PKR"

  - id: regulars
    name: Regulars reward
    deal:
      type: loyalty_fixed
      tiers:
        - min_days: 1
          max_days: 30
          label: Bronze
          amount: "100.00 PKR"
        - min_days: 31
          max_days: 60
          label: Silver
          amount: "150.00 PKR"

  - id: punch-card
    name: Punch card
    deal:
      type: loyalty_visits
      milestones:
        - visits: 5
          label: M1
          amount: "100.00 PKR"
        - visits: 10
          label: M2
          amount: "250.00 PKR"

  - id: set-menu
    name: Set menu
    deal:
      type: fixed_price
      options:
        - id: set-900
          label: Set menu
          price: "900.00 PKR"

  - id: hbl
    name: HBL cards
    deal:
      type: bank
      percentage: 15
      cards:
        - bank: hbl
          card_types: [visa-gold]

  - id: early-bird
    name: Early bird
    deal:
      type: loyalty_percentage
      ranges:
        - min_days: 0
          max_days: 30
          percentage: 15
        - min_days: 31
          max_days: 90
          percentage: 10

  - id: weekend-dinner
    name: Weekend dinner
    availability:
      all_day: false
      day_start: "18:00:00"
      day_end: "23:00:00"
      all_week: false
      days_of_week: [saturday, sunday]
      all_branches: false
      branches: [dha]
    deal:
      type: percentage
      percentage: 10

  - id: app-only
    name: App only
    availability:
      app_users_only: true
    deal:
      type: percentage
      percentage: 5
"#;

fn pkr(minor: i64) -> Money<'static, iso::Currency> {
    Money::from_minor(minor, PKR)
}

fn friday_lunch() -> DateTime {
    date(2026, 10, 16).at(13, 0, 0, 0)
}

fn ctx(loyalty_days: u32, visit_count: u32) -> EvaluationContext {
    EvaluationContext {
        branch: BranchId::new("gulberg"),
        moment: friday_lunch(),
        is_app_user: false,
        loyalty_days,
        visit_count,
    }
}

fn catalog() -> Result<Catalog<'static>, Box<dyn std::error::Error>> {
    let catalog = parse_catalog(CATALOG)?;

    assert!(catalog.rejected().is_empty(), "{:?}", catalog.rejected());

    Ok(catalog)
}

#[test]
fn scenario_a_percentage_is_capped() -> TestResult {
    let benefit = catalog()?.preview(&"twenty-capped".into(), pkr(400_000), &ctx(0, 0), None)?;

    assert_eq!(benefit.amount, pkr(50_000));
    assert_eq!(benefit.final_amount, pkr(350_000));
    assert!(!benefit.no_discount_applied);

    Ok(())
}

#[test]
fn scenario_b_fixed_loyalty_picks_silver() -> TestResult {
    let benefit = catalog()?.preview(&"regulars".into(), pkr(400_000), &ctx(45, 0), None)?;

    assert_eq!(benefit.amount, pkr(15_000));
    assert_eq!(benefit.tier_label.as_deref(), Some("Silver"));

    Ok(())
}

#[test]
fn scenario_c_visits_pick_highest_reached_milestone() -> TestResult {
    let benefit = catalog()?.preview(&"punch-card".into(), pkr(400_000), &ctx(0, 7), None)?;

    assert_eq!(benefit.amount, pkr(10_000));
    assert_eq!(benefit.tier_label.as_deref(), Some("M1"));

    Ok(())
}

#[test]
fn scenario_d_fixed_price_above_order_is_zero_benefit() -> TestResult {
    let selection = Selection::PriceOption("set-900".into());
    let benefit = catalog()?.preview(
        &"set-menu".into(),
        pkr(70_000),
        &ctx(0, 0),
        Some(&selection),
    )?;

    assert_eq!(benefit.amount, pkr(0));
    assert_eq!(benefit.final_amount, pkr(90_000));
    assert!(benefit.no_discount_applied);

    Ok(())
}

#[test]
fn scenario_e_bank_discount_needs_a_card() -> TestResult {
    let catalog = catalog()?;

    assert_eq!(
        catalog.preview(&"hbl".into(), pkr(400_000), &ctx(0, 0), None),
        Err(CalculationError::NoCardSelected)
    );

    let wrong_card = Selection::BankCard {
        bank: BankId::new("hbl"),
        card_type: Some(CardTypeId::new("mastercard")),
    };

    assert_eq!(
        catalog.preview(&"hbl".into(), pkr(400_000), &ctx(0, 0), Some(&wrong_card)),
        Err(CalculationError::CardNotAccepted)
    );

    let card = Selection::BankCard {
        bank: BankId::new("hbl"),
        card_type: Some(CardTypeId::new("visa-gold")),
    };
    let benefit = catalog.preview(&"hbl".into(), pkr(400_000), &ctx(0, 0), Some(&card))?;

    assert_eq!(benefit.amount, pkr(60_000));

    Ok(())
}

#[test]
fn loyalty_percentage_outside_every_range_is_an_error() -> TestResult {
    let catalog = catalog()?;

    assert_eq!(
        catalog.preview(&"early-bird".into(), pkr(400_000), &ctx(400, 0), None),
        Err(CalculationError::NoTierMatched)
    );

    let benefit = catalog.preview(&"early-bird".into(), pkr(400_000), &ctx(31, 0), None)?;

    assert_eq!(benefit.amount, pkr(40_000));

    Ok(())
}

#[test]
fn unknown_discount_is_reported() -> TestResult {
    assert_eq!(
        catalog()?.preview(&"nope".into(), pkr(1_000), &ctx(0, 0), None),
        Err(CalculationError::UnknownDiscount("nope".into()))
    );

    Ok(())
}

#[test]
fn every_covered_day_matches_exactly_one_tier() -> TestResult {
    let catalog = catalog()?;
    let discount = catalog.get(&"regulars".into()).ok_or("regulars missing")?;

    let DiscountKind::Loyalty(program) = discount.kind() else {
        return Err("regulars is not a loyalty program".into());
    };

    let LoyaltyProgram::Fixed { tiers } = program else {
        return Err("regulars is not a fixed loyalty program".into());
    };

    for loyalty_days in 1..=60 {
        let metrics = ctx(loyalty_days, 0).metrics();

        let matching = tiers
            .iter()
            .filter(|tier| tier.days.contains(loyalty_days))
            .count();

        assert_eq!(matching, 1, "day {loyalty_days}");
        assert!(
            matches!(select_tier(program, metrics), TierSelection::Tier(_)),
            "day {loyalty_days}"
        );
    }

    Ok(())
}

#[test]
fn percentage_benefit_never_exceeds_cap() -> TestResult {
    let catalog = catalog()?;

    for order in [0, 10_000, 249_900, 250_000, 250_100, 1_000_000] {
        let benefit = catalog.preview(&"twenty-capped".into(), pkr(order), &ctx(0, 0), None)?;

        assert!(benefit.amount.to_minor_units() <= 50_000, "order {order}");
        assert_eq!(
            benefit.amount.to_minor_units() + benefit.final_amount.to_minor_units(),
            order,
            "order {order}"
        );
    }

    Ok(())
}

#[test]
fn eligibility_filters_on_every_axis() -> TestResult {
    let catalog = catalog()?;
    let friday = ctx(0, 0);

    let ids: Vec<_> = catalog
        .list_eligible(&friday)
        .iter()
        .map(|discount| discount.id().to_string())
        .collect();

    assert!(!ids.contains(&"weekend-dinner".to_string()), "{ids:?}");
    assert!(!ids.contains(&"app-only".to_string()), "{ids:?}");
    assert!(ids.contains(&"twenty-capped".to_string()), "{ids:?}");

    let saturday_at_dha = EvaluationContext {
        branch: BranchId::new("dha"),
        moment: date(2026, 10, 17).at(19, 30, 0, 0),
        is_app_user: true,
        ..friday.clone()
    };

    let ids: Vec<_> = catalog
        .list_eligible(&saturday_at_dha)
        .iter()
        .map(|discount| discount.id().to_string())
        .collect();

    assert!(ids.contains(&"weekend-dinner".to_string()), "{ids:?}");
    assert!(ids.contains(&"app-only".to_string()), "{ids:?}");

    assert_eq!(
        catalog.list_eligible(&friday),
        catalog.list_eligible(&friday),
        "eligibility is a pure function of catalog and context"
    );

    Ok(())
}

#[test]
fn demo_fixtures_load() -> TestResult {
    let fixtures = Fixtures::with_base_path(concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures"));

    let catalog = fixtures.load_catalog("demo")?;
    let customers = fixtures.load_customers("demo")?;

    assert_eq!(catalog.len(), 8);
    assert_eq!(catalog.rejected().len(), 1);
    assert_eq!(customers.len(), 3);

    Ok(())
}
