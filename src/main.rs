use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use obit_watch::config::{AppConfig, DEFAULT_CONFIG_PATH};
use obit_watch::error::AppError;
use obit_watch::pipeline::{
    EmailNotifier, HttpSourceClient, ObituaryStore, Pipeline, SqliteStore, TesseractRecognizer,
};
use obit_watch::telemetry;

#[derive(Parser, Debug)]
#[command(
    name = "obit-watch",
    about = "Poll undertaker listings and mail subscribers about matching obituary notices",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one full polling cycle (default command)
    Run(CycleArgs),
    /// Only purge expired records from the store
    Sweep(CycleArgs),
}

#[derive(Args, Debug, Default)]
struct CycleArgs {
    /// Path to the JSON configuration file (defaults to ./config.json)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Treat this date as today (YYYY-MM-DD, defaults to the local date)
    #[arg(long, value_parser = parse_date)]
    as_of: Option<NaiveDate>,
}

impl CycleArgs {
    fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    fn today(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| Local::now().date_naive())
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|err| format!("invalid date '{value}': {err}"))
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Run(CycleArgs::default())) {
        Command::Run(args) => run(args).await,
        Command::Sweep(args) => sweep(args).await,
    }
}

async fn run(args: CycleArgs) -> Result<(), AppError> {
    let config = AppConfig::load(&args.config_path())?;
    telemetry::init(&config.telemetry)?;
    let today = args.today();

    let store = SqliteStore::connect(&config.database_url).await?;
    let pipeline = Pipeline::new(
        HttpSourceClient::new(),
        TesseractRecognizer::new(config.ocr_language.clone()),
        store,
        EmailNotifier::new(config.notifier.clone()),
    );

    let report = pipeline
        .run_cycle(&config.sources, &config.keywords, today)
        .await?;

    for source in &report.sources {
        info!(
            source = %source.source,
            listed = source.listed,
            parsed = source.parsed,
            fresh = source.fresh,
            new = source.new,
            matched = source.matched,
            notified = source.notified,
            "source processed"
        );
    }
    info!(
        sources = report.sources.len(),
        removed = report.expired_removed,
        "cycle complete"
    );
    Ok(())
}

async fn sweep(args: CycleArgs) -> Result<(), AppError> {
    let config = AppConfig::load(&args.config_path())?;
    telemetry::init(&config.telemetry)?;

    let store = SqliteStore::connect(&config.database_url).await?;
    let removed = store.delete_expired(args.today()).await?;
    info!(removed, "expiration sweep complete");
    Ok(())
}
