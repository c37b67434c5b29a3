//! # Console Strategy
//!
//! Writes every analytics call to the log facade under the `analytics` target.
//! Zero external dependencies beyond `log`, which makes it the reference
//! implementation for new backends.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Prefix and level can be overridden at initialization
//! - 1.0.0: Initial release

use crate::analytics::strategy::{AnalyticsStrategy, Properties};
use crate::analytics::LOG_TARGET;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{log, Level};
use std::error::Error;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};

pub const DEFAULT_PREFIX: &str = "[Analytics]";

/// Log channel a console strategy writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleLevel {
    #[default]
    Log,
    Info,
    Warn,
}

impl ConsoleLevel {
    pub fn as_level(&self) -> Level {
        match self {
            ConsoleLevel::Log => Level::Debug,
            ConsoleLevel::Info => Level::Info,
            ConsoleLevel::Warn => Level::Warn,
        }
    }
}

impl FromStr for ConsoleLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "log" => Ok(ConsoleLevel::Log),
            "info" => Ok(ConsoleLevel::Info),
            "warn" => Ok(ConsoleLevel::Warn),
            other => Err(anyhow!("Unknown console log level: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
struct ConsoleOptions {
    prefix: String,
    level: ConsoleLevel,
}

/// Logs every call, always ready
#[derive(Debug)]
pub struct ConsoleStrategy {
    options: RwLock<ConsoleOptions>,
}

impl Default for ConsoleStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX, ConsoleLevel::default())
    }
}

impl ConsoleStrategy {
    pub fn new(prefix: impl Into<String>, level: ConsoleLevel) -> Self {
        ConsoleStrategy {
            options: RwLock::new(ConsoleOptions {
                prefix: prefix.into(),
                level,
            }),
        }
    }

    pub fn prefix(&self) -> String {
        self.options().prefix
    }

    pub fn level(&self) -> ConsoleLevel {
        self.options().level
    }

    fn options(&self) -> ConsoleOptions {
        self.options
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Render a single log line: `"{prefix} {action}: {subject} {properties}"`
    pub fn format_line(
        &self,
        action: &str,
        subject: Option<&str>,
        properties: Option<&Properties>,
    ) -> String {
        let mut line = format!("{} {}:", self.prefix(), action);
        if let Some(subject) = subject {
            line.push(' ');
            line.push_str(subject);
        }
        if let Some(props) = properties {
            line.push(' ');
            line.push_str(&serde_json::to_string(props).unwrap_or_default());
        }
        line
    }

    fn emit(&self, action: &str, subject: Option<&str>, properties: Option<&Properties>) {
        let line = self.format_line(action, subject, properties);
        log!(target: LOG_TARGET, self.level().as_level(), "{line}");
    }
}

#[async_trait]
impl AnalyticsStrategy for ConsoleStrategy {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn initialize(&self, config: &Properties) -> Result<()> {
        let level = match config.get("log_level").and_then(|v| v.as_str()) {
            Some(raw) => Some(raw.parse::<ConsoleLevel>()?),
            None => None,
        };

        {
            let mut options = self
                .options
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(prefix) = config.get("prefix").and_then(|v| v.as_str()) {
                options.prefix = prefix.to_string();
            }
            if let Some(level) = level {
                options.level = level;
            }
        }

        self.emit("Initialized", None, None);
        Ok(())
    }

    fn track(&self, event: &str, properties: Option<&Properties>) -> Result<()> {
        self.emit("Track", Some(event), properties);
        Ok(())
    }

    fn identify(&self, user_id: &str, properties: Option<&Properties>) -> Result<()> {
        self.emit("Identify", Some(user_id), properties);
        Ok(())
    }

    fn page(&self, name: Option<&str>, properties: Option<&Properties>) -> Result<()> {
        self.emit("Page", name, properties);
        Ok(())
    }

    fn set_user(&self, properties: &Properties) -> Result<()> {
        self.emit("Set user", None, Some(properties));
        Ok(())
    }

    fn capture_exception(
        &self,
        error: &(dyn Error + 'static),
        context: Option<&Properties>,
    ) -> Result<()> {
        self.emit("Exception", Some(&error.to_string()), context);
        Ok(())
    }

    fn clear_identity(&self) -> Result<()> {
        self.emit("Clear identity", None, None);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        true
    }
}
