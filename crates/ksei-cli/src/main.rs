//! ksei - print AKSes portfolio balances from the command line.
//!
//! Credentials come from flags, the environment or a `.env` file
//! (`KSEI_USERNAME`, `KSEI_PASSWORD`, `KSEI_PLAIN_PASSWORD`). Tokens are cached
//! between runs according to the persisted config.

mod format;

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ksei_core::config::{Config, TokenStoreKind};
use ksei_core::models::ShareBalance;
use ksei_core::{KseiClient, PortfolioType, ReferenceData};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use format::{format_amount, truncate_string};

/// Column width for security names in the shares table.
const NAME_COLUMN_WIDTH: usize = 40;

#[derive(Debug, Parser)]
#[command(name = "ksei", version, about = "View KSEI AKSes portfolio balances")]
struct Cli {
    /// AKSes username; defaults to the last one used
    #[arg(long, env = "KSEI_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "KSEI_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Treat the password as plain text and derive it through activation
    #[arg(long, env = "KSEI_PLAIN_PASSWORD")]
    plain_password: bool,

    /// Token cache backend
    #[arg(long, value_enum)]
    store: Option<StoreArg>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    #[arg(long, env = "KSEI_BASE_URL")]
    base_url: Option<String>,

    /// JSON file with mutual fund and custodian bank tables
    #[arg(long)]
    reference: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StoreArg {
    File,
    Keyring,
    None,
}

impl From<StoreArg> for TokenStoreKind {
    fn from(arg: StoreArg) -> Self {
        match arg {
            StoreArg::File => TokenStoreKind::File,
            StoreArg::Keyring => TokenStoreKind::Keyring,
            StoreArg::None => TokenStoreKind::None,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Portfolio totals per asset class
    Summary,
    /// Cash balances per account
    Cash,
    /// Security holdings (equity and mutual funds unless --type is given)
    Shares {
        #[arg(long = "type")]
        types: Vec<PortfolioType>,
    },
    /// Account identity details
    Identity,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing();

    let mut config = Config::load()?;
    apply_overrides(&mut config, &cli);

    let username = cli
        .username
        .clone()
        .or_else(|| config.last_username.clone())
        .unwrap_or_default();
    let password = cli.password.clone().unwrap_or_default();

    let reference = match &config.reference_file {
        Some(path) => ReferenceData::from_json_file(path)?,
        None => ReferenceData::embedded()?,
    };

    let client = KseiClient::new(config.client_options(username.clone(), password)?)?;

    match &cli.command {
        Command::Summary => print_summary(&client).await?,
        Command::Cash => print_cash(&client, &reference).await?,
        Command::Shares { types } => print_shares(&client, &reference, types).await?,
        Command::Identity => print_identity(&client).await?,
    }

    if !username.is_empty() && config.last_username.as_deref() != Some(username.as_str()) {
        config.last_username = Some(username);
        if let Err(e) = config.save() {
            warn!(error = %e, "Failed to save config");
        }
    }

    Ok(())
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(store) = cli.store {
        config.token_store = store.into();
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = Some(timeout);
    }
    if let Some(ref base_url) = cli.base_url {
        config.base_url = Some(base_url.clone());
    }
    if let Some(ref reference) = cli.reference {
        config.reference_file = Some(reference.clone());
    }
    if cli.plain_password {
        config.plain_password = true;
    }
}

async fn print_summary(client: &KseiClient) -> Result<()> {
    let summary = client
        .get_portfolio_summary()
        .await
        .context("Failed to fetch portfolio summary")?;

    println!("{:<12} {:>20} {:>8}", "Type", "Amount", "Percent");
    for detail in &summary.details {
        println!(
            "{:<12} {:>20} {:>7.2}%",
            detail.kind,
            format_amount(detail.amount),
            detail.percent
        );
    }
    println!("{:<12} {:>20}", "Total", format_amount(summary.total));
    Ok(())
}

async fn print_cash(client: &KseiClient, reference: &ReferenceData) -> Result<()> {
    let cash = client
        .get_cash_balances()
        .await
        .context("Failed to fetch cash balances")?;

    println!("{:<20} {:<30} {:<5} {:>20}", "Account", "Bank", "Curr", "Balance");
    for balance in &cash.data {
        let bank = reference
            .custodian_bank_name_by_code(&balance.bank_id)
            .unwrap_or(balance.bank_id.as_str());
        println!(
            "{:<20} {:<30} {:<5} {:>20}",
            balance.account_number,
            truncate_string(bank, 30),
            balance.currency,
            format_amount(balance.current_balance())
        );
    }
    Ok(())
}

async fn print_shares(
    client: &KseiClient,
    reference: &ReferenceData,
    types: &[PortfolioType],
) -> Result<()> {
    let types = if types.is_empty() {
        vec![PortfolioType::Equity, PortfolioType::MutualFund]
    } else {
        types.to_vec()
    };

    println!(
        "{:<16} {:<18} {:<width$} {:>14} {:>14} {:>18}",
        "Account",
        "Symbol",
        "Name",
        "Amount",
        "Closing Price",
        "Current Value",
        width = NAME_COLUMN_WIDTH
    );

    for portfolio_type in types {
        let balances = client
            .get_share_balances(portfolio_type)
            .await
            .with_context(|| format!("Failed to fetch {} balances", portfolio_type.name()))?;
        info!(kind = portfolio_type.name(), count = balances.data.len(), "Fetched holdings");

        for balance in &balances.data {
            println!(
                "{:<16} {:<18} {:<width$} {:>14} {:>14} {:>18}",
                balance.account,
                balance.symbol().unwrap_or("-"),
                truncate_string(&display_name(balance, reference), NAME_COLUMN_WIDTH),
                format_amount(balance.amount),
                format_amount(balance.closing_price),
                format_amount(balance.current_value()),
                width = NAME_COLUMN_WIDTH
            );
        }
    }
    Ok(())
}

/// Prefer the reference table's product name for mutual funds.
fn display_name(balance: &ShareBalance, reference: &ReferenceData) -> String {
    balance
        .symbol()
        .and_then(|code| reference.mutual_fund_by_code(code))
        .map(|fund| fund.product_name.clone())
        .or_else(|| balance.name().map(str::to_string))
        .unwrap_or_else(|| balance.full_name.clone())
}

async fn print_identity(client: &KseiClient) -> Result<()> {
    let response = client
        .get_global_identity()
        .await
        .context("Failed to fetch identity")?;

    for identity in &response.identities {
        println!("Name:        {}", identity.display_name());
        println!("Username:    {}", identity.username);
        println!("Email:       {}", identity.email);
        println!("Phone:       {}", identity.phone);
        println!("Investor ID: {}", identity.investor_id);
        println!("Card ID:     {}", identity.card_id);
        println!();
    }
    Ok(())
}
