use anyhow::Result;
use clap::{Parser, Subcommand};
use gigscrape::config::{DEFAULT_CONFIG_FILE, load_config};
use gigscrape::model::ScrapeOutcome;
use gigscrape::pipeline::{
    ExtractOptions, OutputTarget, RenormalizeOptions, ScrapeOptions, ScrapeReport,
    renormalize_table, scrape_html_file, scrape_url,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const EXIT_UNREACHABLE: u8 = 2;
const EXIT_NO_EVENTS: u8 = 3;

#[derive(Parser, Debug)]
#[command(name = "gigscrape", about = "Venue event page scraper producing normalized CSV tables")]
struct Cli {
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch a venue events page and extract its events.
    Scrape {
        #[arg(long)]
        url: String,
        /// Defaults to the first label of the URL host.
        #[arg(long)]
        venue: Option<String>,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        merge_into: Option<PathBuf>,
    },
    /// Extract events from a saved HTML page.
    Extract {
        #[arg(long)]
        html: PathBuf,
        #[arg(long)]
        venue: String,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        merge_into: Option<PathBuf>,
    },
    /// Re-run normalization over a persisted table in place.
    Renormalize {
        #[arg(long)]
        table: PathBuf,
    },
}

fn main() -> ExitCode {
    if let Err(err) = init_tracing() {
        eprintln!("failed to initialise logging: {err:#}");
        return ExitCode::FAILURE;
    }

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            error!(error = %format!("{err:#}"), "run failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli.config)?;

    let report = match cli.command {
        Commands::Scrape {
            url,
            venue,
            out,
            merge_into,
        } => scrape_url(
            &ScrapeOptions {
                url,
                venue,
                output: OutputTarget { out, merge_into },
            },
            &config,
        )?,
        Commands::Extract {
            html,
            venue,
            base_url,
            out,
            merge_into,
        } => scrape_html_file(
            &ExtractOptions {
                html_path: html,
                venue,
                base_url,
                output: OutputTarget { out, merge_into },
            },
            &config,
        )?,
        Commands::Renormalize { table } => {
            let rows = renormalize_table(&RenormalizeOptions { table })?;
            info!(rows, "renormalize complete");
            return Ok(ExitCode::SUCCESS);
        }
    };

    Ok(report_exit_code(&report))
}

fn report_exit_code(report: &ScrapeReport) -> ExitCode {
    match &report.outcome {
        ScrapeOutcome::Unreachable { url, reason } => {
            error!(venue = %report.venue, %url, %reason, "could not reach the events page");
            ExitCode::from(EXIT_UNREACHABLE)
        }
        ScrapeOutcome::NoEvents => {
            info!(venue = %report.venue, "no events found");
            ExitCode::from(EXIT_NO_EVENTS)
        }
        ScrapeOutcome::Success {
            stage,
            extracted,
            records,
        } => {
            info!(
                venue = %report.venue,
                stage = stage.as_str(),
                extracted,
                events = records.len(),
                written = ?report.written,
                "scrape summary"
            );
            ExitCode::SUCCESS
        }
    }
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}
