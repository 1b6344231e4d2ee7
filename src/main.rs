//! Dineperks command line tool

use std::{io, process::ExitCode};

use jiff::{Zoned, civil::DateTime};
use thiserror::Error;
use tracing::{error, warn};
use tracing_subscriber::{
    EnvFilter,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

use dineperks::{
    benefits::{CalculationError, Selection},
    customers::{PhoneError, PhoneNumber, ResolvedCustomer, resolve_customer},
    eligibility,
    fixtures::{FixtureError, Fixtures, parse_price},
    report::{self, ReportError},
};

use crate::config::{Cli, Commands, CustomerArgs, LogFormat, LoggingConfig, PreviewArgs};

mod config;

/// Command failures.
#[derive(Debug, Error)]
enum CliError {
    #[error("failed to initialise logging")]
    Logging(#[source] TryInitError),

    #[error(transparent)]
    Fixture(#[from] FixtureError),

    #[error(transparent)]
    Phone(#[from] PhoneError),

    #[error(transparent)]
    Calculation(#[from] CalculationError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

#[tokio::main]
pub async fn main() -> ExitCode {
    let cli = Cli::load();

    if let Err(error) = init_logging(&cli.logging) {
        #[expect(
            clippy::print_stderr,
            reason = "logging failed to initialise, must use eprintln"
        )]
        {
            eprintln!("{error}");
        }

        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "command failed");

            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &LoggingConfig) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_err| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(true)
                    .with_writer(io::stderr),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true)
                    .with_writer(io::stderr),
            )
            .try_init(),
    }
    .map_err(CliError::Logging)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let fixtures = Fixtures::with_base_path(cli.fixtures);

    match cli.command {
        Commands::Eligible(args) => {
            let catalog = fixtures.load_catalog(&args.catalog)?;
            let customer = resolve(&fixtures, &args).await?;
            let eligible = catalog.list_eligible(&customer.context);

            report::write_eligible(io::stdout().lock(), &customer.context, &eligible)?;
        }
        Commands::Preview(args) => preview(&fixtures, args).await?,
        Commands::Validate(args) => {
            let catalog = fixtures.load_catalog(&args.catalog)?;

            report::write_rejected(io::stdout().lock(), catalog.len(), catalog.rejected())?;
        }
    }

    Ok(())
}

async fn preview(fixtures: &Fixtures, args: PreviewArgs) -> Result<(), CliError> {
    let catalog = fixtures.load_catalog(&args.customer.catalog)?;
    let customer = resolve(fixtures, &args.customer).await?;
    let order_amount = parse_price(&args.amount)?;

    let selection = match (args.bank, args.price_option) {
        (Some(bank), _) => Some(Selection::BankCard {
            bank,
            card_type: args.card_type,
        }),
        (None, Some(option)) => Some(Selection::PriceOption(option)),
        (None, None) => None,
    };

    let discount = catalog
        .get(&args.discount)
        .ok_or_else(|| CalculationError::UnknownDiscount(args.discount.clone()))?;

    if let Err(reason) = eligibility::check(discount, &customer.context) {
        warn!(
            ?reason,
            discount_id = %args.discount,
            "discount is not available to this customer now"
        );
    }

    let benefit = catalog.preview(
        &args.discount,
        order_amount,
        &customer.context,
        selection.as_ref(),
    )?;

    report::write_benefit(io::stdout().lock(), discount, &order_amount, &benefit)?;

    Ok(())
}

async fn resolve(fixtures: &Fixtures, args: &CustomerArgs) -> Result<ResolvedCustomer, CliError> {
    let directory = fixtures.load_customers(&args.customers)?;
    let phone = PhoneNumber::parse(&args.phone)?;
    let moment = args.at.unwrap_or_else(local_now);

    Ok(resolve_customer(&directory, &phone, args.branch.clone(), moment).await)
}

fn local_now() -> DateTime {
    Zoned::now().datetime()
}
