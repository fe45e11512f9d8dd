use anyhow::{anyhow, Context};
use chrono::{Duration, Local, NaiveDate};
use clap::{Parser, Subcommand};
use food_inspections::app::ports::{ComparisonOp, DateFilter};
use food_inspections::config::Config;
use food_inspections::infra::SocrataClient;
use food_inspections::pipeline::export::Exporter;
use food_inspections::pipeline::ingestion::paginator::RetryPolicy;
use food_inspections::pipeline::storage::SqliteStorage;
use food_inspections::pipeline::{Pipeline, RunOptions};
use food_inspections::{logging, metrics, server};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "food_inspections")]
#[command(about = "Chicago food inspections ETL: OLTP load, OLAP star schema, CSV export")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, load, derive the warehouse and export
    Run {
        /// Only inspections relative to this date (YYYY-MM-DD)
        #[arg(long, conflicts_with = "days_back")]
        since: Option<NaiveDate>,
        /// Only inspections relative to N days before today
        #[arg(long)]
        days_back: Option<i64>,
        /// Comparison between inspection_date and the start date
        #[arg(long, default_value = ">=")]
        op: ComparisonOp,
        /// Override source.page_size
        #[arg(long)]
        page_size: Option<u64>,
        /// Stop after the warehouse step
        #[arg(long)]
        skip_export: bool,
    },
    /// Re-export the CSV views from what is already stored
    Export,
    /// Serve the greeting endpoint
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        addr: SocketAddr,
    },
}

fn date_filter(
    since: Option<NaiveDate>,
    days_back: Option<i64>,
    op: ComparisonOp,
) -> anyhow::Result<Option<DateFilter>> {
    let start_date = match (since, days_back) {
        (Some(date), _) => date,
        (None, Some(days)) => Duration::try_days(days)
            .and_then(|back| Local::now().date_naive().checked_sub_signed(back))
            .ok_or_else(|| anyhow!("--days-back {days} is outside the supported date range"))?,
        (None, None) => return Ok(None),
    };
    Ok(Some(DateFilter { start_date, op }))
}

async fn open_storage(config: &Config) -> anyhow::Result<SqliteStorage> {
    SqliteStorage::open(&config.database.oltp_path, &config.database.olap_path)
        .await
        .with_context(|| {
            format!(
                "opening {} / {}",
                config.database.oltp_path.display(),
                config.database.olap_path.display()
            )
        })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _guard = logging::init_logging();
    let cli = Cli::parse();

    metrics::init_metrics();

    let config = Config::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::Run {
            since,
            days_back,
            op,
            page_size,
            skip_export,
        } => {
            let storage = Arc::new(open_storage(&config).await?);
            let source = Arc::new(SocrataClient::new(&config.source)?);
            let pipeline = Pipeline::new(source, storage, RetryPolicy::from_config(&config.source))
                .with_rate_limit(config.source.requests_per_min);

            let options = RunOptions {
                filter: date_filter(since, days_back, op)?,
                page_size: page_size.unwrap_or(config.source.page_size),
                output_dir: config.export.output_dir.clone(),
                skip_export,
            };

            match pipeline.run(&options).await {
                Ok(summary) => {
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                }
                Err(e) => {
                    error!("Run failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Export => {
            let storage = open_storage(&config).await?;
            let report = Exporter::new(&storage, config.export.output_dir.clone())
                .export_all()
                .await?;
            info!(
                "Export complete: {} OLTP rows, {} OLAP rows",
                report.oltp_rows, report.olap_rows
            );
        }
        Commands::Serve { addr } => {
            server::start_server(addr).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_since_wins_over_days_back() {
        let since = NaiveDate::from_ymd_opt(2024, 1, 1);
        let filter = date_filter(since, None, ComparisonOp::Gt).unwrap().unwrap();
        assert_eq!(filter.start_date, since.unwrap());
        assert_eq!(filter.op, ComparisonOp::Gt);
    }

    #[test]
    fn test_no_filter_without_dates() {
        assert!(date_filter(None, None, ComparisonOp::Ge).unwrap().is_none());
    }

    #[test]
    fn test_days_back_counts_from_today() {
        let filter = date_filter(None, Some(7), ComparisonOp::Ge).unwrap().unwrap();
        assert_eq!(filter.start_date, Local::now().date_naive() - Duration::days(7));
    }

    #[test]
    fn test_out_of_range_days_back_is_an_error() {
        assert!(date_filter(None, Some(i64::MAX), ComparisonOp::Ge).is_err());
        assert!(date_filter(None, Some(i64::MIN), ComparisonOp::Ge).is_err());
        assert!(date_filter(None, Some(1_000_000_000), ComparisonOp::Ge).is_err());
    }

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "food_inspections",
            "run",
            "--days-back",
            "7",
            "--op",
            ">",
            "--page-size",
            "1000",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { days_back, op, page_size, .. } => {
                assert_eq!(days_back, Some(7));
                assert_eq!(op, ComparisonOp::Gt);
                assert_eq!(page_size, Some(1000));
            }
            _ => panic!("expected run"),
        }
    }
}
