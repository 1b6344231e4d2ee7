//! Command Line Config

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use jiff::civil::DateTime;

use dineperks::ids::{BankId, BranchId, CardTypeId, DiscountId, PriceOptionId};

/// Log output format.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Logging settings.
#[derive(Debug, Args)]
pub(crate) struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "warn", global = true)]
    pub(crate) log_level: String,

    /// Log format (compact, json)
    #[arg(
        long,
        env = "DINEPERKS_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Compact,
        global = true
    )]
    pub(crate) log_format: LogFormat,
}

/// Restaurant discount desk
#[derive(Debug, Parser)]
#[command(name = "dineperks", about = "Restaurant discount desk", long_about = None)]
pub(crate) struct Cli {
    /// Directory holding `catalogs/` and `customers/`
    #[arg(long, env = "DINEPERKS_FIXTURES", default_value = "./fixtures", global = true)]
    pub(crate) fixtures: PathBuf,

    /// Logging output settings.
    #[command(flatten)]
    pub(crate) logging: LoggingConfig,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

impl Cli {
    /// Load configuration from `.env`, the environment and arguments.
    pub(crate) fn load() -> Self {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::parse()
    }
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// List the discounts a customer may use right now
    Eligible(CustomerArgs),

    /// Calculate the benefit of one discount on an order
    Preview(PreviewArgs),

    /// Validate a catalog and list rejected entries
    Validate(ValidateArgs),
}

/// Who is being served, where and when.
#[derive(Debug, Args)]
pub(crate) struct CustomerArgs {
    /// Catalog fixture name
    #[arg(long, default_value = "demo")]
    pub(crate) catalog: String,

    /// Customer directory fixture name
    #[arg(long, default_value = "demo")]
    pub(crate) customers: String,

    /// Customer phone number
    #[arg(long)]
    pub(crate) phone: String,

    /// Serving branch
    #[arg(long)]
    pub(crate) branch: BranchId,

    /// Local date and time at the branch (e.g. 2026-10-16T13:00); now when
    /// omitted
    #[arg(long)]
    pub(crate) at: Option<DateTime>,
}

#[derive(Debug, Args)]
pub(crate) struct PreviewArgs {
    #[command(flatten)]
    pub(crate) customer: CustomerArgs,

    /// Discount to preview
    #[arg(long)]
    pub(crate) discount: DiscountId,

    /// Order total (e.g. "4000.00 PKR")
    #[arg(long)]
    pub(crate) amount: String,

    /// Issuing bank of the presented card
    #[arg(long, conflicts_with = "price_option")]
    pub(crate) bank: Option<BankId>,

    /// Card type of the presented card
    #[arg(long, requires = "bank")]
    pub(crate) card_type: Option<CardTypeId>,

    /// Price option of a fixed-price deal
    #[arg(long)]
    pub(crate) price_option: Option<PriceOptionId>,
}

#[derive(Debug, Args)]
pub(crate) struct ValidateArgs {
    /// Catalog fixture name
    #[arg(long, default_value = "demo")]
    pub(crate) catalog: String,
}
