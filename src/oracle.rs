use crate::config::OracleConfig;
use crate::extract::ExtractionStrategy;
use crate::model::{EventRecord, ExtractionStage, RawPage};
use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{info, warn};

const SYSTEM_PROMPT: &str = "You extract upcoming events from venue web pages. \
Reply with JSON only: an array of objects with the keys name, start_time, \
image_url, permalink and description. Use empty strings for unknown values. \
Never invent events that are not on the page.";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OracleEvent {
    pub name: String,
    pub start_time: String,
    pub image_url: String,
    pub permalink: String,
    pub description: String,
}

pub trait EventOracle {
    fn extract_events(&self, html: &str, venue: &str) -> Result<Vec<OracleEvent>>;
}

pub struct DisabledOracle;

impl EventOracle for DisabledOracle {
    fn extract_events(&self, _html: &str, _venue: &str) -> Result<Vec<OracleEvent>> {
        Ok(Vec::new())
    }
}

pub struct ChatCompletionOracle {
    endpoint: String,
    model: String,
    api_key: String,
    client: Client,
}

impl ChatCompletionOracle {
    pub fn new(config: &OracleConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build oracle http client")?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            client,
        })
    }
}

impl EventOracle for ChatCompletionOracle {
    fn extract_events(&self, html: &str, venue: &str) -> Result<Vec<OracleEvent>> {
        let url = format!("{}/chat/completions", self.endpoint);
        let payload = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": format!("Venue: {venue}\n\nPage HTML:\n{html}"),
                }
            ],
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .with_context(|| format!("oracle request to {url} failed"))?;

        let status = response.status();
        let body = response
            .text()
            .context("failed to read oracle response body")?;
        if !status.is_success() {
            bail!("oracle returned HTTP {status}: {body}");
        }

        let value: Value =
            serde_json::from_str(&body).context("oracle response was not valid json")?;
        let content = value
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("oracle response missing message content"))?;

        parse_oracle_reply(content)
    }
}

pub fn oracle_from_config(config: &OracleConfig) -> Result<Box<dyn EventOracle>> {
    if !config.enabled {
        return Ok(Box::new(DisabledOracle));
    }

    let api_key = match std::env::var(&config.api_key_env) {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            warn!(
                env = %config.api_key_env,
                "oracle enabled but api key is not set; oracle stage disabled"
            );
            return Ok(Box::new(DisabledOracle));
        }
    };

    Ok(Box::new(ChatCompletionOracle::new(config, api_key)?))
}

pub fn parse_oracle_reply(content: &str) -> Result<Vec<OracleEvent>> {
    let body = strip_code_fence(content);
    let value: Value = serde_json::from_str(body).context("oracle reply was not valid json")?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("events") {
            Some(Value::Array(items)) => items,
            _ => bail!("oracle reply object has no events array"),
        },
        _ => bail!("oracle reply is neither an array nor an object"),
    };

    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<OracleEvent>(item).ok())
        .collect())
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

pub fn truncate_html(html: &str, max_chars: usize) -> &str {
    match html.char_indices().nth(max_chars) {
        Some((index, _)) => &html[..index],
        None => html,
    }
}

pub struct OracleStrategy {
    oracle: Box<dyn EventOracle>,
    max_html_chars: usize,
}

impl OracleStrategy {
    pub fn new(oracle: Box<dyn EventOracle>, max_html_chars: usize) -> Self {
        Self {
            oracle,
            max_html_chars,
        }
    }
}

impl ExtractionStrategy for OracleStrategy {
    fn stage(&self) -> ExtractionStage {
        ExtractionStage::Oracle
    }

    fn extract(&self, page: &RawPage, venue: &str) -> Vec<EventRecord> {
        let html = truncate_html(&page.html, self.max_html_chars);
        let events = match self.oracle.extract_events(html, venue) {
            Ok(events) => events,
            Err(err) => {
                warn!(venue = %venue, error = %format!("{err:#}"), "oracle extraction failed");
                return Vec::new();
            }
        };

        let records: Vec<EventRecord> = events
            .iter()
            .map(|event| record_from_oracle(page, event, venue))
            .collect();
        info!(venue = %venue, events = records.len(), "oracle returned events");
        records
    }
}

fn record_from_oracle(page: &RawPage, event: &OracleEvent, venue: &str) -> EventRecord {
    let mut record = EventRecord::for_venue(venue);
    record.set_name(event.name.trim());
    record.start_time = event.start_time.trim().to_string();
    record.description_text = event.description.trim().to_string();

    if let Some(permalink) = page.permalink_url(&event.permalink) {
        record.permalink = permalink;
    }
    if let Some(image) = page.absolute_url(&event.image_url) {
        record.set_image(&image);
    }

    record
}
