// src/main.rs

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use meezan_payroll::engine::{Collaborators, PayrollEngine, SystemClock};
use meezan_payroll::{Config, HrApiClient};

/// Compute the monthly payroll and emit the run as JSON on stdout.
#[derive(Parser, Debug)]
#[command(name = "meezan-payroll", version)]
struct Cli {
    /// Payroll year, e.g. 2025.
    #[arg(long)]
    year: i32,

    /// Payroll month, 1-12.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
    month: u32,

    /// Restrict the run to one point of sale.
    #[arg(long)]
    ps: Option<i64>,

    /// Emit full payslip documents instead of the summary.
    #[arg(long)]
    payslips: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Setting tracing subscriber failed")?;

    let cli = Cli::parse();
    let config = Config::from_env().context("Loading configuration failed")?;

    let client = Arc::new(
        HrApiClient::new(config.hr_api_base_url.clone(), config.hr_api_token.clone())
            .context("Initializing HR API client failed")?,
    );
    let collaborators = Collaborators {
        timesheets: client.clone(),
        leaves: client.clone(),
        employees: client.clone(),
        invoices: client.clone(),
        adjustments: client.clone(),
        loans: client.clone(),
        payroll: client.clone(),
        settings: client,
    };
    let engine = PayrollEngine::new(collaborators, Arc::new(SystemClock))
        .with_classifier(config.classifier)
        .with_concurrency(config.concurrency);

    info!(year = cli.year, month = cli.month, ps = ?cli.ps, "starting payroll run");
    let result = engine
        .run(cli.year, cli.month, cli.ps)
        .await
        .context("Payroll run failed")?;

    if result.degraded {
        warn!("run is degraded: totals come from the legacy aggregate, no component detail");
    }
    for employee in &result.employees {
        for soft_error in &employee.soft_errors {
            warn!(
                employee_id = employee.profile.id,
                "partial data: {soft_error}"
            );
        }
    }
    info!(
        employees = result.employees.len(),
        gross_lyd = %result.totals.gross_lyd,
        net_lyd = %result.totals.net_lyd,
        gross_usd = %result.totals.gross_usd,
        net_usd = %result.totals.net_usd,
        "payroll run complete"
    );

    if cli.payslips {
        let payslips: Vec<_> = result.employees.iter().map(|e| &e.payslip).collect();
        println!("{}", serde_json::to_string_pretty(&payslips)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}
