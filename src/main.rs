//! CLI entry point for the route occupancy tool.
//!
//! Provides subcommands for collecting bus positions, importing snapshots,
//! summarising collection health, and analysing occupancy for a day or a
//! date range.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use route_occupancy::analyzers::analyzer::OccupancyEngine;
use route_occupancy::analyzers::types::DayFilter;
use route_occupancy::analyzers::utility::weekday_from_index;
use route_occupancy::collection::CollectionRecord;
use route_occupancy::config::{Config, DEFAULT_CONFIG_PATH, SERVICE_KEY_ENV, load_from_path};
use route_occupancy::infra::csv_store::CsvSampleStore;
use route_occupancy::infra::gbis::client::GbisClient;
use route_occupancy::route::RouteTopology;
use route_occupancy::{
    collector,
    fetch::BasicClient,
    output::{print_json, read_records, write_json},
};
use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "route_occupancy")]
#[command(about = "Collect bus positions and estimate on-board occupancy for a route", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the bus-location API and store every collection
    Collect {
        /// Number of collections to make (0 = infinite)
        #[arg(short = 'n', long, default_value_t = 0)]
        num_samples: usize,
    },
    /// Append a CSV (or .csv.gz) snapshot of collection records to the store
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Show per-day collection counts, newest first
    Summary {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
    /// Estimate occupancy of every trip on one day
    AnalyzeDay {
        #[arg(long)]
        date: NaiveDate,

        /// Write the JSON report here instead of logging it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Average occupancy by trip slot over a date range
    Average {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,

        /// Only this weekday (0 = Monday .. 6 = Sunday)
        #[arg(long, group = "day_filter", value_parser = clap::value_parser!(u8).range(0..=6))]
        weekday: Option<u8>,

        /// Only Saturdays and Sundays
        #[arg(long, group = "day_filter")]
        weekend: bool,

        /// Only Monday to Friday
        #[arg(long, group = "day_filter")]
        weekdays: bool,

        /// Write the JSON report here instead of logging it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let cli = Cli::parse();
    let config = load_from_path(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/route_occupancy.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("route_occupancy.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive(config.logging.level.parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    info!(app = %config.app.name, route_id = %config.route.id, "Configuration loaded");

    match cli.command {
        Commands::Collect { num_samples } => {
            let service_key = std::env::var(SERVICE_KEY_ENV)
                .with_context(|| format!("{SERVICE_KEY_ENV} must be set"))?;
            let settings = config.collector_settings()?;
            let http = BasicClient::with_timeout(config.request_timeout())?;
            let client = GbisClient::new(http, config.endpoint(), &service_key);
            let store = store(&config);

            collector::run(&client, &store, &settings, num_samples).await?;
        }
        Commands::Import { file } => {
            let records: Vec<CollectionRecord> = read_records(&file)?;
            let foreign = records
                .iter()
                .filter(|r| r.route_id != config.route.id)
                .count();
            if foreign > 0 {
                warn!(foreign, route_id = %config.route.id, "Snapshot rows from another route id");
            }

            let rows = store(&config).append_records(&records)?;
            info!(rows, file = %file.display(), "Snapshot imported");
        }
        Commands::Summary { start, end } => {
            let summaries = store(&config).daily_summaries(start, end)?;
            if summaries.is_empty() {
                info!(%start, %end, "No collections in range");
            }
            for summary in &summaries {
                info!(
                    date = %summary.date,
                    total = summary.total_collections,
                    successful = summary.successful_collections,
                    "Daily collections"
                );
            }
        }
        Commands::AnalyzeDay { date, output } => {
            let engine = engine(&config)?;
            match engine.analyze_day(date) {
                Ok(analysis) => emit(&engine.daily_report(&analysis), output.as_deref())?,
                Err(e) if e.is_empty_result() => info!(%date, "{e}"),
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Average {
            start,
            end,
            weekday,
            weekend,
            weekdays,
            output,
        } => {
            let filter = match (weekday, weekend, weekdays) {
                (Some(index), _, _) => DayFilter::Weekday(
                    weekday_from_index(index).context("weekday must be 0..=6")?,
                ),
                (None, true, _) => DayFilter::WeekendsOnly,
                (None, false, true) => DayFilter::WeekdaysOnly,
                (None, false, false) => DayFilter::All,
            };

            let engine = engine(&config)?;
            match engine.average(start, end, filter) {
                Ok(average) => emit(&engine.average_report(&average), output.as_deref())?,
                Err(e) if e.is_empty_result() => info!(%start, %end, ?filter, "{e}"),
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}

fn store(config: &Config) -> CsvSampleStore {
    CsvSampleStore::new(config.data_dir(), &config.route.id)
}

fn engine(config: &Config) -> Result<OccupancyEngine<CsvSampleStore>> {
    let topology = RouteTopology::from_csv(&config.route.stops_path, config.bypass_marker())?;
    OccupancyEngine::new(store(config), Arc::new(topology), config.analysis_params()?)
}

fn emit(report: &impl Serialize, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            write_json(path, report)?;
            info!(path = %path.display(), "Report written");
            Ok(())
        }
        None => print_json(report),
    }
}

