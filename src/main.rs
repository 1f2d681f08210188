use std::path::PathBuf;

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod aggregate;
mod chart;
mod config;
mod db;
mod error;
mod export;
mod models;
mod report;
mod summary;

use chart::ChartType;
use config::Config;
use models::DimensionFilter;
use report::ReportFilters;

#[derive(Parser)]
#[command(name = "survey-report")]
#[command(about = "Indicator score reports for research survey responses", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug, Clone)]
struct FilterArgs {
    /// Research template to report on
    #[arg(long)]
    project_title: String,
    /// "All Indicators" or a single dimension name
    #[arg(long)]
    dimension: Option<String>,
    /// Pass GWGI to compute the composite index
    #[arg(long)]
    gwgi: Option<String>,
    #[arg(long, value_enum, default_value_t = ChartType::Bar)]
    chart: ChartType,
}

impl FilterArgs {
    fn to_filters(&self) -> ReportFilters {
        ReportFilters {
            project_title: Some(self.project_title.clone()),
            dimension: DimensionFilter::parse(self.dimension.as_deref()),
            gwgi: self.gwgi.clone(),
            chart_type: self.chart,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a demo template with responses
    Seed,
    /// Import template indicators from a CSV file
    ImportIndicators {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Import survey entries from a CSV file
    ImportEntries {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List the dimensions configured on a template
    Dimensions {
        #[arg(long)]
        project_title: String,
    },
    /// Compute the survey report
    Report {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
        /// Decimal places, overrides SURVEY_REPORT_PRECISION
        #[arg(long)]
        precision: Option<u32>,
    },
    /// Render the report to a stored document
    Export {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value = "Survey Report")]
        report_name: String,
        /// PNG rendering of the chart to embed
        #[arg(long)]
        chart_image: Option<PathBuf>,
        /// Decimal places, overrides SURVEY_REPORT_PRECISION
        #[arg(long)]
        precision: Option<u32>,
        /// Overrides SURVEY_REPORT_EXPORT_DIR
        #[arg(long)]
        export_dir: Option<PathBuf>,
    },
    /// Copy a stored export to a local path
    Download {
        #[arg(long)]
        file_id: String,
        #[arg(long)]
        out: PathBuf,
        /// Overrides SURVEY_REPORT_EXPORT_DIR
        #[arg(long)]
        export_dir: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "survey_index_report=debug"
    } else {
        "survey_index_report=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// A `--precision` flag wins over the configured value; both are clamped.
fn resolve_precision(flag: Option<u32>, config: &Config) -> u32 {
    flag.unwrap_or(config.precision).min(config::MAX_PRECISION)
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    let database_url = config.require_database_url()?;
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::from_env();
    debug!(
        export_dir = %config.export_dir.display(),
        precision = config.precision,
        "configuration loaded"
    );

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportIndicators { csv } => {
            let pool = connect(&config).await?;
            let written = db::import_indicators_csv(&pool, &csv).await?;
            println!("Loaded {written} indicators from {}.", csv.display());
        }
        Commands::ImportEntries { csv } => {
            let pool = connect(&config).await?;
            let inserted = db::import_entries_csv(&pool, &csv).await?;
            println!("Inserted {inserted} entries from {}.", csv.display());
        }
        Commands::Dimensions { project_title } => {
            let pool = connect(&config).await?;
            let dimensions = db::fetch_dimensions(&pool, &project_title).await?;
            println!("{}", models::ALL_INDICATORS);
            for dimension in dimensions {
                println!("{dimension}");
            }
        }
        Commands::Report {
            filters,
            format,
            out,
            precision,
        } => {
            let pool = connect(&config).await?;
            let precision = resolve_precision(precision, &config);
            let filters = filters.to_filters();
            let output = report::execute(&pool, &filters, precision).await?;

            let rendered = match format {
                OutputFormat::Markdown => report::render_markdown(
                    "Survey Report",
                    &filters,
                    Local::now().naive_local(),
                    &output,
                    precision,
                ),
                OutputFormat::Json => serde_json::to_string_pretty(&report::to_json(&output)?)?,
            };

            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Report written to {}.", path.display());
                }
                None => println!("{rendered}"),
            }
        }
        Commands::Export {
            filters,
            report_name,
            chart_image,
            precision,
            export_dir,
        } => {
            let pool = connect(&config).await?;
            let precision = resolve_precision(precision, &config);
            let output = report::execute(&pool, &filters.to_filters(), precision).await?;

            let chart_image = match chart_image {
                Some(path) => {
                    let png = std::fs::read(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    Some(export::encode_chart_image(&png))
                }
                None => None,
            };

            let request = export::ExportRequest {
                report_name,
                chart_image,
                generated_at: Local::now().naive_local(),
            };
            let store = export::ExportStore::new(export_dir.unwrap_or(config.export_dir));
            let file_id = export::export_report(
                &store,
                &export::HtmlDocument,
                &request,
                &output,
            )
            .await?;
            info!(dir = %store.root().display(), "export stored");
            println!("{file_id}");
        }
        Commands::Download {
            file_id,
            out,
            export_dir,
        } => {
            let store = export::ExportStore::new(export_dir.unwrap_or(config.export_dir));
            let bytes = store.load(&file_id).await?;
            std::fs::write(&out, bytes)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Downloaded {file_id} to {}.", out.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_precision_env_does_not_break_parsing() {
        std::env::set_var("SURVEY_REPORT_PRECISION", "abc");

        let cli = Cli::try_parse_from(["survey-report", "report", "--project-title", "T"])
            .expect("report parses without a precision flag");
        let config = Config::from_env();
        assert_eq!(config.precision, config::DEFAULT_PRECISION);

        match cli.command {
            Commands::Report { precision, .. } => {
                assert_eq!(precision, None);
                assert_eq!(resolve_precision(precision, &config), config::DEFAULT_PRECISION);
            }
            _ => panic!("expected report command"),
        }

        std::env::remove_var("SURVEY_REPORT_PRECISION");
    }

    #[test]
    fn export_accepts_precision_flag_and_clamps_it() {
        let cli = Cli::try_parse_from([
            "survey-report",
            "export",
            "--project-title",
            "T",
            "--precision",
            "9",
        ])
        .expect("export parses with a precision flag");

        let config = Config::from_env();
        match cli.command {
            Commands::Export { precision, .. } => {
                assert_eq!(precision, Some(9));
                assert_eq!(resolve_precision(precision, &config), config::MAX_PRECISION);
            }
            _ => panic!("expected export command"),
        }
    }

    #[test]
    fn precision_flag_overrides_config() {
        let cli = Cli::try_parse_from([
            "survey-report",
            "report",
            "--project-title",
            "T",
            "--precision",
            "4",
        ])
        .expect("report parses with a precision flag");

        let config = Config::from_env();
        match cli.command {
            Commands::Report { precision, .. } => {
                assert_eq!(resolve_precision(precision, &config), 4);
            }
            _ => panic!("expected report command"),
        }
    }
}
