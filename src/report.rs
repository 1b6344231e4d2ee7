//! Report
//!
//! Staff-facing tables: the eligible discount list, a benefit breakdown and
//! the catalog entries rejected at ingestion.

use std::io;

use decimal_percentage::Percentage;
use jiff::civil::Weekday;
use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use tabled::{
    builder::Builder,
    settings::{
        Alignment, Color, Style,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{
    benefits::BenefitResult,
    catalog::RejectedDiscount,
    discounts::{
        Discount,
        availability::{ActivePeriod, BranchScope, DayWindow, Weekdays},
    },
    eligibility::EvaluationContext,
};

/// Errors that can occur when writing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// IO error
    #[error("failed to write report")]
    Io(#[source] io::Error),
}

/// Write the discounts eligible for a customer.
///
/// # Errors
///
/// Returns an error if the output cannot be written.
pub fn write_eligible(
    mut out: impl io::Write,
    ctx: &EvaluationContext,
    discounts: &[&Discount<'_>],
) -> Result<(), ReportError> {
    writeln!(
        out,
        "\n Branch {} at {} ({} loyalty days, {} visits{})",
        ctx.branch,
        ctx.moment.strftime("%a %Y-%m-%d %H:%M"),
        ctx.loyalty_days,
        ctx.visit_count,
        if ctx.is_app_user { ", app user" } else { "" },
    )
    .map_err(ReportError::Io)?;

    if discounts.is_empty() {
        return writeln!(out, " No discounts available.\n").map_err(ReportError::Io);
    }

    let mut builder = Builder::default();

    builder.push_record(["", "Id", "Discount", "Kind", "Runs", "Needs"]);

    for (idx, discount) in discounts.iter().enumerate() {
        builder.push_record([
            format!("#{}", idx + 1),
            discount.id().to_string(),
            discount.name().to_string(),
            discount.kind().kind_name().to_string(),
            describe_schedule(discount),
            describe_needs(discount).to_string(),
        ]);
    }

    let mut table = builder.build();

    table.with(Style::modern_rounded());
    table.modify(Rows::first(), Color::BOLD);

    writeln!(out, "{table}\n").map_err(ReportError::Io)
}

/// Write the benefit of one discount on an order.
///
/// # Errors
///
/// Returns an error if the output cannot be written.
pub fn write_benefit(
    mut out: impl io::Write,
    discount: &Discount<'_>,
    order_amount: &Money<'_, Currency>,
    benefit: &BenefitResult<'_>,
) -> Result<(), ReportError> {
    let mut builder = Builder::default();

    builder.push_record(["", discount.name()]);
    builder.push_record(["Order".to_string(), order_amount.to_string()]);

    if let Some(rate) = benefit.applied_rate {
        builder.push_record(["Rate".to_string(), format!("{}%", percent_points(rate))]);
    }

    if let Some(label) = &benefit.tier_label {
        builder.push_record(["Tier".to_string(), label.clone()]);
    }

    builder.push_record(["Discount".to_string(), format!("-{}", benefit.amount)]);
    builder.push_record(["Pay".to_string(), benefit.final_amount.to_string()]);

    let mut table = builder.build();

    table.with(Style::modern_rounded());
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::last(), Alignment::right());

    writeln!(out, "\n{table}").map_err(ReportError::Io)?;

    if benefit.no_discount_applied {
        writeln!(out, " No discount applied: the deal does not lower this order.")
            .map_err(ReportError::Io)?;
    }

    writeln!(out).map_err(ReportError::Io)
}

/// Write the catalog entries that failed validation.
///
/// # Errors
///
/// Returns an error if the output cannot be written.
pub fn write_rejected(
    mut out: impl io::Write,
    accepted: usize,
    rejected: &[RejectedDiscount],
) -> Result<(), ReportError> {
    writeln!(
        out,
        "\n {accepted} valid, {} rejected",
        rejected.len()
    )
    .map_err(ReportError::Io)?;

    if rejected.is_empty() {
        return writeln!(out).map_err(ReportError::Io);
    }

    let mut builder = Builder::default();

    builder.push_record(["Id", "Discount", "Problem"]);

    for entry in rejected {
        builder.push_record([
            entry.id.to_string(),
            entry.name.clone(),
            entry.error.to_string(),
        ]);
    }

    let mut table = builder.build();

    table.with(Style::modern_rounded());
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::last(), Color::FG_RED);

    writeln!(out, "{table}\n").map_err(ReportError::Io)
}

/// Converts a fractional percentage to percent points for display.
fn percent_points(percentage: Percentage) -> Decimal {
    (percentage * Decimal::ONE_HUNDRED).round_dp(2).normalize()
}

fn describe_schedule(discount: &Discount<'_>) -> String {
    let availability = discount.availability();
    let mut parts = Vec::new();

    if let ActivePeriod::Between { from, until } = availability.period() {
        parts.push(format!("{from} to {until}"));
    }

    if let DayWindow::Between { start, end } = availability.hours() {
        parts.push(format!(
            "{}-{}",
            start.strftime("%H:%M"),
            end.strftime("%H:%M")
        ));
    }

    if let Weekdays::Only(days) = availability.days() {
        let names: Vec<_> = days.iter().map(|day| weekday_name(*day)).collect();

        parts.push(names.join(" "));
    }

    if let BranchScope::Only(branches) = availability.branches() {
        let mut names: Vec<_> = branches.iter().map(ToString::to_string).collect();

        names.sort();
        parts.push(format!("at {}", names.join(", ")));
    }

    if availability.app_users_only() {
        parts.push("app users".to_string());
    }

    if parts.is_empty() {
        "always".to_string()
    } else {
        parts.join("\n")
    }
}

fn describe_needs(discount: &Discount<'_>) -> &'static str {
    use crate::discounts::DiscountKind;

    match discount.kind() {
        DiscountKind::Bank(_) => "bank card",
        DiscountKind::FixedPrice(_) => "price option",
        kind if kind.is_referral() => "referrer",
        _ => "",
    }
}

const fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Monday => "Mon",
        Weekday::Tuesday => "Tue",
        Weekday::Wednesday => "Wed",
        Weekday::Thursday => "Thu",
        Weekday::Friday => "Fri",
        Weekday::Saturday => "Sat",
        Weekday::Sunday => "Sun",
    }
}
