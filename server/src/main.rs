mod config;
mod console;
mod seed;
mod tools;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use entity::{Promoter, PromoterStatus, PromoterTier};
use platform_db::{DealStore, JsonFileStore};
use platform_obs::{ObsConfig, init_tracing};
use products_crm::CrmModule;
use serde::Serialize;
use tracing::info;

use crate::{config::AppConfig, tools::ToolDispatcher};

#[derive(Parser, Debug)]
#[command(name = "deal-desk", version, about = "Deal pipeline normalization and reporting")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve JSON-RPC tool calls over stdin/stdout, one per line.
    Tools,
    /// Interactive numbered menu.
    Console,
    /// Write synthetic demo deals into the data file.
    Seed(SeedCommand),
    /// Print one report as pretty JSON.
    Report(ReportCommand),
}

#[derive(Args, Debug)]
struct SeedCommand {
    #[arg(long, default_value_t = 25)]
    count: usize,
    #[arg(long, help = "RNG seed for a repeatable data set")]
    seed: Option<u64>,
    #[arg(long, value_name = "FILE", help = "Write here instead of the configured data file")]
    output: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ReportKind {
    Brief,
    Hygiene,
    Forecast,
    Stats,
    Promoter,
}

#[derive(Args, Debug)]
struct ReportCommand {
    #[arg(value_enum)]
    kind: ReportKind,
    #[arg(long)]
    promoter_id: Option<String>,
    #[arg(long)]
    promo_code: Option<String>,
    #[arg(long, default_value = "Bronze")]
    tier: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let obs = match cli.command {
        Command::Tools => ObsConfig::for_tools(),
        _ => ObsConfig::default(),
    };
    init_tracing(obs)?;
    let config = AppConfig::load()?;
    match cli.command {
        Command::Tools => run_tools(config).await,
        Command::Console => run_console(config),
        Command::Seed(cmd) => run_seed(cmd, config),
        Command::Report(cmd) => run_report(cmd, config),
    }
}

fn open_crm(config: &AppConfig) -> Result<CrmModule<JsonFileStore>> {
    let store = JsonFileStore::open(&config.data_path)
        .with_context(|| format!("opening {}", config.data_path.display()))?;
    Ok(CrmModule::new(store, config.lookup.clone(), config.settings.clone()))
}

async fn run_tools(config: AppConfig) -> Result<()> {
    let crm = open_crm(&config)?;
    let dispatcher = Arc::new(ToolDispatcher::new(crm, config.today_override));
    tools::serve_stdio(dispatcher).await
}

fn run_console(config: AppConfig) -> Result<()> {
    let crm = open_crm(&config)?;
    let stdin = std::io::stdin();
    console::run(&crm, config.today(), stdin.lock(), std::io::stdout())
}

fn run_seed(cmd: SeedCommand, mut config: AppConfig) -> Result<()> {
    if let Some(path) = cmd.output {
        config.data_path = path;
    }
    let today = config.today();
    let seed = cmd.seed.unwrap_or_else(rand::random);
    let crm = open_crm(&config)?;
    let mut created = 0usize;
    for deal in seed::generate(cmd.count, seed, today) {
        if crm.store().get(&deal.deal_id)?.is_some() {
            continue;
        }
        crm.create_deal(deal, today)?;
        created += 1;
    }
    info!(created, seed, path = %config.data_path.display(), "seed data written");
    Ok(())
}

fn run_report(cmd: ReportCommand, config: AppConfig) -> Result<()> {
    let crm = open_crm(&config)?;
    let today = config.today();
    match cmd.kind {
        ReportKind::Brief => print_json(&crm.daily_brief(today)?),
        ReportKind::Hygiene => print_json(&crm.hygiene_report(today)?),
        ReportKind::Forecast => print_json(&crm.forecast_snapshot(today)?),
        ReportKind::Stats => print_json(&crm.stats()?),
        ReportKind::Promoter => {
            if cmd.promoter_id.is_none() && cmd.promo_code.is_none() {
                bail!("promoter report needs --promoter-id or --promo-code");
            }
            let tier: PromoterTier = cmd.tier.parse()?;
            let promoter = Promoter {
                promoter_id: cmd.promoter_id,
                promo_code: cmd.promo_code,
                name: None,
                tier,
                status: PromoterStatus::Active,
            };
            print_json(&crm.promoter_dashboard(&promoter, today)?)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
