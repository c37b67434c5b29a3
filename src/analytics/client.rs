//! # Analytics Client
//!
//! Facade over a single [`AnalyticsStrategy`]. Every call is gated on the
//! `enabled` flag and every strategy failure is contained here, so a broken
//! backend never reaches the host application.
//!
//! - **Version**: 1.2.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.2.0: Error containment for all delegated calls, initialization timeout
//! - 1.1.0: Added page, set_user and capture_exception
//! - 1.0.0: Initial release with track/identify/clear_identity

use crate::analytics::strategy::{AnalyticsStrategy, Properties};
use crate::analytics::LOG_TARGET;
use crate::core::config::DEFAULT_INIT_TIMEOUT_SECS;
use log::{debug, error};
use std::error::Error;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::timeout;

/// Settings owned by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsConfig {
    pub enabled: bool,
    pub debug: bool,
    /// Upper bound on how long strategy initialization may take
    pub init_timeout: Duration,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        AnalyticsConfig {
            enabled: true,
            debug: false,
            init_timeout: Duration::from_secs(DEFAULT_INIT_TIMEOUT_SECS),
        }
    }
}

/// Partial update merged into [`AnalyticsConfig`]; `None` leaves a field as is
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub enabled: Option<bool>,
    pub debug: Option<bool>,
    pub init_timeout: Option<Duration>,
}

impl ConfigUpdate {
    pub fn enabled(enabled: bool) -> Self {
        ConfigUpdate {
            enabled: Some(enabled),
            ..Default::default()
        }
    }

    pub fn debug(debug: bool) -> Self {
        ConfigUpdate {
            debug: Some(debug),
            ..Default::default()
        }
    }
}

pub struct AnalyticsClient {
    strategy: Arc<dyn AnalyticsStrategy>,
    config: RwLock<AnalyticsConfig>,
}

impl AnalyticsClient {
    pub fn new(strategy: Arc<dyn AnalyticsStrategy>) -> Self {
        Self::with_config(strategy, AnalyticsConfig::default())
    }

    pub fn with_config(strategy: Arc<dyn AnalyticsStrategy>, config: AnalyticsConfig) -> Self {
        AnalyticsClient {
            strategy,
            config: RwLock::new(config),
        }
    }

    /// Initialize the bound strategy.
    ///
    /// Never fails: an error or timeout from the strategy is logged when
    /// `debug` is on and otherwise dropped.
    pub async fn initialize(&self, strategy_config: Option<&Properties>) {
        let empty = Properties::new();
        let strategy_config = strategy_config.unwrap_or(&empty);
        let AnalyticsConfig {
            debug,
            init_timeout,
            ..
        } = self.config();

        let outcome = match timeout(init_timeout, self.strategy.initialize(strategy_config)).await
        {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!(
                "initialization timed out after {}ms",
                init_timeout.as_millis()
            )),
        };

        match outcome {
            Ok(()) => {
                if debug {
                    debug!(target: LOG_TARGET, "Analytics initialized with {} strategy", self.strategy.name());
                }
            }
            Err(e) => {
                if debug {
                    error!(
                        target: LOG_TARGET,
                        "Failed to initialize {} analytics: {e:#}",
                        self.strategy.name()
                    );
                }
            }
        }
    }

    pub fn track(&self, event: &str, properties: Option<&Properties>) {
        self.delegate("track", |s| s.track(event, properties));
    }

    pub fn identify(&self, user_id: &str, properties: Option<&Properties>) {
        self.delegate("identify", |s| s.identify(user_id, properties));
    }

    pub fn page(&self, name: Option<&str>, properties: Option<&Properties>) {
        self.delegate("page", |s| s.page(name, properties));
    }

    pub fn set_user(&self, properties: &Properties) {
        self.delegate("set_user", |s| s.set_user(properties));
    }

    pub fn capture_exception(&self, error: &(dyn Error + 'static), context: Option<&Properties>) {
        self.delegate("capture_exception", |s| s.capture_exception(error, context));
    }

    pub fn clear_identity(&self) {
        self.delegate("clear_identity", |s| s.clear_identity());
    }

    /// Same as [`clear_identity`](Self::clear_identity)
    pub fn reset(&self) {
        self.clear_identity();
    }

    pub fn update_config(&self, update: ConfigUpdate) {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(enabled) = update.enabled {
            config.enabled = enabled;
        }
        if let Some(debug) = update.debug {
            config.debug = debug;
        }
        if let Some(init_timeout) = update.init_timeout {
            config.init_timeout = init_timeout;
        }
    }

    /// Snapshot of the current settings
    pub fn config(&self) -> AnalyticsConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// A disabled client is never ready, whatever the strategy reports
    pub fn is_ready(&self) -> bool {
        self.config().enabled && self.strategy.is_ready()
    }

    pub fn strategy(&self) -> Arc<dyn AnalyticsStrategy> {
        Arc::clone(&self.strategy)
    }

    pub fn cleanup(&self) {
        self.strategy.cleanup();
    }

    /// Same as [`cleanup`](Self::cleanup)
    pub fn destroy(&self) {
        self.cleanup();
    }

    /// Wait for queued deliveries; failures are logged, not returned
    pub async fn flush(&self) {
        if let Err(e) = self.strategy.flush().await {
            error!(target: LOG_TARGET, "Failed to flush {} analytics: {e:#}", self.strategy.name());
        }
    }

    fn delegate<F>(&self, operation: &str, call: F)
    where
        F: FnOnce(&dyn AnalyticsStrategy) -> anyhow::Result<()>,
    {
        let AnalyticsConfig { enabled, debug, .. } = self.config();
        if !enabled {
            return;
        }

        if debug {
            debug!(target: LOG_TARGET, "{operation} -> {}", self.strategy.name());
        }

        if let Err(e) = call(self.strategy.as_ref()) {
            error!(
                target: LOG_TARGET,
                "Analytics {operation} failed in {} strategy: {e:#}",
                self.strategy.name()
            );
        }
    }
}
