//! # Configuration
//!
//! Environment and YAML driven settings for the analytics client.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Added YAML loading alongside environment variables
//! - 1.0.0: Initial release with `.env` support

use crate::analytics::client::AnalyticsConfig;
use crate::analytics::strategy::Properties;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default time allowed for a strategy to finish initializing
pub const DEFAULT_INIT_TIMEOUT_SECS: u64 = 10;

/// Which backend the client should be built with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Mock,
    #[default]
    Console,
    PostHog,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Mock => "mock",
            StrategyKind::Console => "console",
            StrategyKind::PostHog => "posthog",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mock" | "noop" => Ok(StrategyKind::Mock),
            "console" => Ok(StrategyKind::Console),
            "posthog" => Ok(StrategyKind::PostHog),
            other => Err(anyhow!(
                "Unknown analytics strategy '{other}' (expected mock, console or posthog)"
            )),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub enabled: bool,
    pub debug: bool,
    pub strategy: StrategyKind,
    pub init_timeout_secs: u64,
    pub console_prefix: Option<String>,
    pub console_level: Option<String>,
    pub posthog_key: Option<String>,
    pub posthog_host: Option<String>,
    pub log_level: String,
    pub locale: String,
    pub currency: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            enabled: true,
            debug: false,
            strategy: StrategyKind::default(),
            init_timeout_secs: DEFAULT_INIT_TIMEOUT_SECS,
            console_prefix: None,
            console_level: None,
            posthog_key: None,
            posthog_host: None,
            log_level: "info".to_string(),
            locale: "en-PH".to_string(),
            currency: "PHP".to_string(),
        }
    }
}

impl Config {
    /// Build configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let enabled = match get("ANALYTICS_ENABLED") {
            Some(v) => parse_bool(&v).context("Invalid ANALYTICS_ENABLED")?,
            None => defaults.enabled,
        };
        let debug = match get("ANALYTICS_DEBUG") {
            Some(v) => parse_bool(&v).context("Invalid ANALYTICS_DEBUG")?,
            None => defaults.debug,
        };
        let strategy = match get("ANALYTICS_STRATEGY") {
            Some(v) => v.parse()?,
            None => defaults.strategy,
        };
        let init_timeout_secs = match get("ANALYTICS_INIT_TIMEOUT_SECS") {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("Invalid ANALYTICS_INIT_TIMEOUT_SECS: {v}"))?,
            None => defaults.init_timeout_secs,
        };

        Ok(Config {
            enabled,
            debug,
            strategy,
            init_timeout_secs,
            console_prefix: get("ANALYTICS_CONSOLE_PREFIX"),
            console_level: get("ANALYTICS_CONSOLE_LEVEL"),
            posthog_key: get("POSTHOG_KEY"),
            posthog_host: get("POSTHOG_HOST"),
            log_level: get("LOG_LEVEL").unwrap_or(defaults.log_level),
            locale: get("BEACON_LOCALE").unwrap_or(defaults.locale),
            currency: get("BEACON_CURRENCY").unwrap_or(defaults.currency),
        })
    }

    /// Load configuration from a YAML file
    pub fn load(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path}"))?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        Ok(config)
    }

    /// Client-side settings derived from this configuration
    pub fn analytics_config(&self) -> AnalyticsConfig {
        AnalyticsConfig {
            enabled: self.enabled,
            debug: self.debug,
            init_timeout: Duration::from_secs(self.init_timeout_secs),
        }
    }

    /// Initialization map handed to the selected strategy
    pub fn strategy_config(&self) -> Properties {
        let mut map = Properties::new();
        match self.strategy {
            StrategyKind::Mock => {}
            StrategyKind::Console => {
                if let Some(ref prefix) = self.console_prefix {
                    map.insert("prefix".into(), Value::String(prefix.clone()));
                }
                if let Some(ref level) = self.console_level {
                    map.insert("log_level".into(), Value::String(level.clone()));
                }
            }
            StrategyKind::PostHog => {
                if let Some(ref key) = self.posthog_key {
                    map.insert("api_key".into(), Value::String(key.clone()));
                }
                if let Some(ref host) = self.posthog_host {
                    map.insert("api_host".into(), Value::String(host.clone()));
                }
                map.insert("debug".into(), Value::Bool(self.debug));
            }
        }
        map
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("expected a boolean, got '{other}'")),
    }
}
