use crate::config::{ScraperConfig, sanitize_for_path};
use crate::extract::{ExtractionStrategy, default_strategies, run_strategies};
use crate::fetch::{fetch_page, load_html_file};
use crate::model::{EventRecord, RawPage, ScrapeOutcome};
use crate::normalize::normalize;
use crate::oracle::oracle_from_config;
use crate::table::{load_table, merge_into_file, save_table};
use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use tracing::{info, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub url: String,
    pub venue: Option<String>,
    pub output: OutputTarget,
}

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub html_path: PathBuf,
    pub venue: String,
    pub base_url: Option<String>,
    pub output: OutputTarget,
}

#[derive(Debug, Clone, Default)]
pub struct OutputTarget {
    pub out: Option<PathBuf>,
    pub merge_into: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RenormalizeOptions {
    pub table: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ScrapeReport {
    pub venue: String,
    pub outcome: ScrapeOutcome,
    pub written: Vec<PathBuf>,
}

pub fn scrape_url(options: &ScrapeOptions, config: &ScraperConfig) -> Result<ScrapeReport> {
    let venue = match &options.venue {
        Some(venue) => venue.clone(),
        None => venue_from_url(&options.url)?,
    };
    info!(venue = %venue, url = %options.url, "scrape start");

    let outcome = match fetch_page(&options.url, &config.fetch) {
        Ok(page) => {
            let strategies = configured_strategies(config)?;
            extract_events(&page, &venue, &strategies)
        }
        Err(err) => {
            let reason = format!("{err:#}");
            warn!(venue = %venue, url = %options.url, error = %reason, "source unreachable");
            ScrapeOutcome::Unreachable {
                url: options.url.clone(),
                reason,
            }
        }
    };

    finish(venue, outcome, &options.output, config)
}

pub fn scrape_html_file(options: &ExtractOptions, config: &ScraperConfig) -> Result<ScrapeReport> {
    let venue = options.venue.trim().to_string();
    if venue.is_empty() {
        bail!("venue must not be empty");
    }
    info!(venue = %venue, file = %options.html_path.display(), "extract start");

    let page = load_html_file(&options.html_path, options.base_url.as_deref())?;
    let strategies = configured_strategies(config)?;
    let outcome = extract_events(&page, &venue, &strategies);

    finish(venue, outcome, &options.output, config)
}

pub fn extract_events(
    page: &RawPage,
    venue: &str,
    strategies: &[Box<dyn ExtractionStrategy>],
) -> ScrapeOutcome {
    let Some(extraction) = run_strategies(strategies, page, venue) else {
        warn!(venue = %venue, "no events found by any stage");
        return ScrapeOutcome::NoEvents;
    };

    let extracted = extraction.records.len();
    let records = normalize(extraction.records);
    if records.is_empty() {
        warn!(
            venue = %venue,
            stage = extraction.stage.as_str(),
            extracted,
            "every extracted event lacked a permalink or name"
        );
        return ScrapeOutcome::NoEvents;
    }

    ScrapeOutcome::Success {
        stage: extraction.stage,
        extracted,
        records,
    }
}

pub fn renormalize_table(options: &RenormalizeOptions) -> Result<usize> {
    if !options.table.exists() {
        bail!("table does not exist: {}", options.table.display());
    }

    let rows = load_table(&options.table)?;
    let before = rows.len();
    let normalized = normalize(rows);
    save_table(&options.table, &normalized)?;

    info!(
        table = %options.table.display(),
        before,
        after = normalized.len(),
        "table renormalized"
    );
    Ok(normalized.len())
}

pub fn venue_from_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url).with_context(|| format!("invalid url {url}"))?;
    let host = parsed
        .host_str()
        .with_context(|| format!("url has no host: {url}"))?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    let label = host.split('.').next().unwrap_or(host);
    if label.is_empty() {
        bail!("cannot derive a venue name from {url}");
    }
    Ok(label.to_string())
}

pub fn default_output_path(config: &ScraperConfig, venue: &str) -> PathBuf {
    config
        .output
        .dir
        .join(format!("{}_events.csv", sanitize_for_path(venue)))
}

fn configured_strategies(config: &ScraperConfig) -> Result<Vec<Box<dyn ExtractionStrategy>>> {
    let oracle = oracle_from_config(&config.oracle)?;
    Ok(default_strategies(oracle, config.oracle.max_html_chars))
}

fn finish(
    venue: String,
    outcome: ScrapeOutcome,
    output: &OutputTarget,
    config: &ScraperConfig,
) -> Result<ScrapeReport> {
    let written = match &outcome {
        ScrapeOutcome::Success { records, .. } => write_records(records, &venue, output, config)?,
        _ => Vec::new(),
    };

    Ok(ScrapeReport {
        venue,
        outcome,
        written,
    })
}

fn write_records(
    records: &[EventRecord],
    venue: &str,
    output: &OutputTarget,
    config: &ScraperConfig,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    if let Some(table) = &output.merge_into {
        merge_into_file(table, records.to_vec())?;
        written.push(table.clone());
    }

    let out = match (&output.out, &output.merge_into) {
        (Some(out), _) => Some(out.clone()),
        (None, None) => Some(default_output_path(config, venue)),
        (None, Some(_)) => None,
    };
    if let Some(out) = out {
        save_table(&out, records)
            .with_context(|| format!("failed to write output table {}", out.display()))?;
        written.push(out);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn venue_comes_from_first_host_label() {
        assert_eq!(
            venue_from_url("https://www.brooklynbowl.com/events").unwrap(),
            "brooklynbowl"
        );
        assert_eq!(
            venue_from_url("https://hideoutchicago.com/").unwrap(),
            "hideoutchicago"
        );
        assert!(venue_from_url("not a url").is_err());
    }

    #[test]
    fn default_output_lives_in_output_dir() {
        let config = ScraperConfig::default();
        assert_eq!(
            default_output_path(&config, "The Hideout"),
            PathBuf::from("output").join("the-hideout_events.csv")
        );
    }
}
