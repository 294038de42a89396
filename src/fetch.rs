use crate::config::FetchConfig;
use crate::model::RawPage;
use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub fn fetch_page(url: &str, config: &FetchConfig) -> Result<RawPage> {
    let parsed = Url::parse(url).with_context(|| format!("invalid url {url}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("unsupported url scheme {} in {url}", parsed.scheme());
    }

    let client = build_client(config)?;

    if config.delay_ms > 0 {
        debug!(%url, delay_ms = config.delay_ms, "waiting before request");
        std::thread::sleep(Duration::from_millis(config.delay_ms));
    }

    let response = client
        .get(parsed)
        .send()
        .with_context(|| format!("request to {url} failed"))?;

    let status = response.status();
    if !status.is_success() {
        bail!("request to {url} failed with status {status}");
    }

    let final_url = response.url().clone();
    let html = response
        .text()
        .with_context(|| format!("failed to read response body from {url}"))?;

    info!(%url, status = status.as_u16(), bytes = html.len(), "fetched page");
    Ok(RawPage::parse(html, Some(final_url)))
}

fn build_client(config: &FetchConfig) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&config.user_agent).context("invalid fetch.user_agent")?,
    );
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
    );

    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .default_headers(headers)
        .build()
        .context("failed to build reqwest client")
}

pub fn load_html_file(path: &Path, base_url: Option<&str>) -> Result<RawPage> {
    let html = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read html file {}", path.display()))?;

    info!(file = %path.display(), bytes = html.len(), "loaded html file");
    page_from_html(html, base_url)
}

pub fn page_from_html(html: impl Into<String>, base_url: Option<&str>) -> Result<RawPage> {
    let base = base_url
        .map(|raw| Url::parse(raw).with_context(|| format!("invalid base url {raw}")))
        .transpose()?;
    Ok(RawPage::parse(html, base))
}
