//! Worker configuration.

use std::time::Duration;

use relwatch_pipeline::CheckSettings;
use relwatch_scraper::browser::DEFAULT_BROWSER_TIMEOUT;
use relwatch_scraper::{AnthropicConfig, BrowserConfig};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },
}

const DEFAULT_LLM_REQUESTS_PER_MINUTE: u32 = 30;
const DEFAULT_BROWSER_REQUESTS_PER_MINUTE: u32 = 20;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    /// `None` sends every acquisition through the static fetcher.
    pub browser: Option<BrowserConfig>,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: Option<String>,
    pub anthropic_base_url: Option<String>,
    pub check: CheckSettings,
    pub llm_requests_per_minute: u32,
    pub browser_requests_per_minute: u32,
    pub emails_per_second: u32,
    pub send_batch_size: i64,
    pub webhook_secret: Option<String>,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                      | Required | Default   |
    /// |------------------------------|----------|-----------|
    /// | `DATABASE_URL`               | yes      |           |
    /// | `BROWSER_ENDPOINT`           | no       | static fetch only |
    /// | `BROWSER_TOKEN`              | no       |           |
    /// | `ANTHROPIC_API_KEY`          | for check/audit |    |
    /// | `ANTHROPIC_MODEL`            | no       | provider default |
    /// | `ANTHROPIC_BASE_URL`         | no       | provider default |
    /// | `CHECK_BATCH_SIZE`           | no       | `50`      |
    /// | `CHECK_CONCURRENCY`          | no       | `4`       |
    /// | `LLM_REQUESTS_PER_MINUTE`    | no       | `30`      |
    /// | `BROWSER_REQUESTS_PER_MINUTE`| no       | `20`      |
    /// | `EMAILS_PER_SECOND`          | no       | `2`       |
    /// | `SEND_BATCH_SIZE`            | no       | `100`     |
    /// | `EMAIL_WEBHOOK_SECRET`       | for signed events |  |
    ///
    /// SMTP settings are read separately by `EmailConfig::from_env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let browser = get("BROWSER_ENDPOINT").map(|endpoint| BrowserConfig {
            endpoint,
            token: get("BROWSER_TOKEN"),
            timeout: DEFAULT_BROWSER_TIMEOUT,
        });

        let defaults = CheckSettings::default();
        Ok(Self {
            database_url,
            browser,
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            anthropic_model: get("ANTHROPIC_MODEL"),
            anthropic_base_url: get("ANTHROPIC_BASE_URL"),
            check: CheckSettings {
                batch_size: parse_or(&get, "CHECK_BATCH_SIZE", defaults.batch_size)?,
                concurrency: parse_or(&get, "CHECK_CONCURRENCY", defaults.concurrency)?,
            },
            llm_requests_per_minute: parse_or(
                &get,
                "LLM_REQUESTS_PER_MINUTE",
                DEFAULT_LLM_REQUESTS_PER_MINUTE,
            )?,
            browser_requests_per_minute: parse_or(
                &get,
                "BROWSER_REQUESTS_PER_MINUTE",
                DEFAULT_BROWSER_REQUESTS_PER_MINUTE,
            )?,
            emails_per_second: parse_or(
                &get,
                "EMAILS_PER_SECOND",
                relwatch_events::sender::DEFAULT_EMAILS_PER_SECOND,
            )?,
            send_batch_size: parse_or(
                &get,
                "SEND_BATCH_SIZE",
                relwatch_events::sender::DEFAULT_BATCH_SIZE,
            )?,
            webhook_secret: get("EMAIL_WEBHOOK_SECRET"),
        })
    }

    /// Model client settings. Required by the commands that extract versions.
    pub fn anthropic(&self) -> Result<AnthropicConfig, ConfigError> {
        let api_key = self
            .anthropic_api_key
            .clone()
            .ok_or(ConfigError::Missing("ANTHROPIC_API_KEY"))?;
        let mut config = AnthropicConfig::new(api_key);
        if let Some(model) = &self.anthropic_model {
            config.model = model.clone();
        }
        if let Some(base_url) = &self.anthropic_base_url {
            config.base_url = base_url.clone();
        }
        Ok(config)
    }

    pub fn fetch_timeout(&self) -> Duration {
        relwatch_scraper::fetch::DEFAULT_FETCH_TIMEOUT
    }
}

fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<WorkerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn database_url_is_required() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
        assert_eq!(err.to_string(), "DATABASE_URL must be set");
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/relwatch")]).unwrap();
        assert!(config.browser.is_none());
        assert_eq!(config.check.batch_size, 50);
        assert_eq!(config.check.concurrency, 4);
        assert_eq!(config.emails_per_second, 2);
        assert_eq!(config.send_batch_size, 100);
        assert!(matches!(
            config.anthropic(),
            Err(ConfigError::Missing("ANTHROPIC_API_KEY"))
        ));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/relwatch"),
            ("BROWSER_ENDPOINT", "https://browser.example"),
            ("BROWSER_TOKEN", "tok"),
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("ANTHROPIC_MODEL", "claude-test"),
            ("CHECK_CONCURRENCY", "8"),
        ])
        .unwrap();
        let browser = config.browser.as_ref().unwrap();
        assert_eq!(browser.token.as_deref(), Some("tok"));
        assert_eq!(config.check.concurrency, 8);
        assert_eq!(config.anthropic().unwrap().model, "claude-test");
    }

    #[test]
    fn bad_number_is_rejected() {
        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/relwatch"),
            ("EMAILS_PER_SECOND", "fast"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "EMAILS_PER_SECOND", .. }));
    }
}
