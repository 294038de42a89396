use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "gigscrape.toml";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ScraperConfig {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl ScraperConfig {
    pub fn validate(&self) -> Result<()> {
        if self.fetch.timeout_secs == 0 {
            bail!("fetch.timeout_secs must be greater than zero");
        }
        if self.fetch.user_agent.trim().is_empty() {
            bail!("fetch.user_agent must not be empty");
        }

        if self.oracle.enabled {
            if self.oracle.endpoint.trim().is_empty() {
                bail!("oracle.endpoint is required when the oracle is enabled");
            }
            if self.oracle.model.trim().is_empty() {
                bail!("oracle.model is required when the oracle is enabled");
            }
            if self.oracle.api_key_env.trim().is_empty() {
                bail!("oracle.api_key_env is required when the oracle is enabled");
            }
        }
        if self.oracle.max_html_chars == 0 {
            bail!("oracle.max_html_chars must be greater than zero");
        }
        if self.oracle.timeout_secs == 0 {
            bail!("oracle.timeout_secs must be greater than zero");
        }

        if self.output.dir.as_os_str().is_empty() {
            bail!("output.dir must not be empty");
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout_secs(),
            delay_ms: default_delay_ms(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_oracle_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_oracle_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_html_chars")]
    pub max_html_chars: usize,
    #[serde(default = "default_oracle_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_oracle_endpoint(),
            model: default_oracle_model(),
            api_key_env: default_api_key_env(),
            max_html_chars: default_max_html_chars(),
            timeout_secs: default_oracle_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<ScraperConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config file not found; using defaults");
        let config = ScraperConfig::default();
        config.validate()?;
        return Ok(config);
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    let config: ScraperConfig = toml::from_str(&text)
        .with_context(|| format!("failed to parse toml in {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}

pub fn sanitize_for_path(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_oracle_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_oracle_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_max_html_chars() -> usize {
    50_000
}

fn default_oracle_timeout_secs() -> u64 {
    60
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.fetch.timeout_secs, 10);
        assert_eq!(config.fetch.delay_ms, 1000);
        assert!(!config.oracle.enabled);
        assert_eq!(config.oracle.max_html_chars, 50_000);
        assert_eq!(config.output.dir, PathBuf::from("output"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gigscrape.toml");
        std::fs::write(
            &path,
            r#"
            [fetch]
            delay_ms = 0

            [oracle]
            enabled = true
            model = "local-model"
            "#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.fetch.delay_ms, 0);
        assert_eq!(config.fetch.timeout_secs, 10);
        assert!(config.oracle.enabled);
        assert_eq!(config.oracle.model, "local-model");
        assert_eq!(config.oracle.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gigscrape.toml");
        std::fs::write(&path, "[fetch]\ntimeout_secs = 0\n").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("fetch.timeout_secs"));
    }

    #[test]
    fn sanitizes_venue_labels() {
        assert_eq!(sanitize_for_path("The Hideout!"), "the-hideout");
        assert_eq!(sanitize_for_path("brooklynbowl"), "brooklynbowl");
    }
}
