//! # Analytics Provider
//!
//! Ties one [`AnalyticsClient`] to the lifetime of a scope: `mount` builds and
//! initializes the client, dropping or tearing down the provider runs the
//! strategy's cleanup exactly once.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use crate::analytics::client::{AnalyticsClient, AnalyticsConfig};
use crate::analytics::console::ConsoleStrategy;
use crate::analytics::mock::MockStrategy;
use crate::analytics::posthog::PostHogStrategy;
use crate::analytics::strategy::{AnalyticsStrategy, Properties};
use crate::analytics::LOG_TARGET;
use crate::core::config::{Config, StrategyKind};
use log::info;
use std::sync::Arc;

/// Build the backend selected by `config.strategy`
pub fn strategy_from_config(config: &Config) -> Arc<dyn AnalyticsStrategy> {
    match config.strategy {
        StrategyKind::Mock => Arc::new(MockStrategy::new()),
        StrategyKind::Console => Arc::new(ConsoleStrategy::default()),
        StrategyKind::PostHog => Arc::new(PostHogStrategy::new()),
    }
}

pub struct AnalyticsProvider {
    client: Arc<AnalyticsClient>,
}

impl AnalyticsProvider {
    /// Construct a client around `strategy` and initialize it
    pub async fn mount(
        strategy: Arc<dyn AnalyticsStrategy>,
        config: AnalyticsConfig,
        strategy_config: Option<&Properties>,
    ) -> Self {
        let client = Arc::new(AnalyticsClient::with_config(strategy, config));
        client.initialize(strategy_config).await;

        info!(
            target: LOG_TARGET,
            "Analytics provider mounted ({} strategy, ready: {})",
            client.strategy().name(),
            client.is_ready()
        );

        AnalyticsProvider { client }
    }

    /// Mount the strategy and settings described by application config
    pub async fn from_config(config: &Config) -> Self {
        let strategy_config = config.strategy_config();
        Self::mount(
            strategy_from_config(config),
            config.analytics_config(),
            Some(&strategy_config),
        )
        .await
    }

    /// Shared handle for code running inside the provider's scope
    pub fn client(&self) -> Arc<AnalyticsClient> {
        Arc::clone(&self.client)
    }

    /// Run cleanup now instead of at end of scope
    pub fn teardown(self) {
        drop(self);
    }

    /// Flush queued deliveries, then tear down
    pub async fn shutdown(self) {
        self.client.flush().await;
        self.teardown();
    }
}

impl Drop for AnalyticsProvider {
    fn drop(&mut self) {
        self.client.cleanup();
        info!(target: LOG_TARGET, "Analytics provider torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn posthog_config(host: &str) -> Properties {
        json!({"api_key": "phc_test", "api_host": host})
            .as_object()
            .cloned()
            .unwrap_or_default()
    }

    #[test]
    fn test_strategy_from_config_selects_backend() {
        for (kind, name) in [
            (StrategyKind::Mock, "mock"),
            (StrategyKind::Console, "console"),
            (StrategyKind::PostHog, "posthog"),
        ] {
            let config = Config {
                strategy: kind,
                ..Config::default()
            };
            assert_eq!(strategy_from_config(&config).name(), name);
        }
    }

    #[tokio::test]
    async fn test_from_config_mounts_ready_client() {
        let config = Config {
            strategy: StrategyKind::Mock,
            ..Config::default()
        };
        let provider = AnalyticsProvider::from_config(&config).await;
        assert!(provider.client().is_ready());
    }

    #[tokio::test]
    async fn test_teardown_cleans_up_strategy() {
        let server = mockito::Server::new_async().await;
        let strategy: Arc<dyn AnalyticsStrategy> =
            Arc::new(PostHogStrategy::new().with_env_fallback(false));

        let provider = AnalyticsProvider::mount(
            strategy.clone(),
            AnalyticsConfig::default(),
            Some(&posthog_config(&server.url())),
        )
        .await;
        assert!(strategy.is_ready());

        provider.teardown();
        assert!(!strategy.is_ready());
    }

    #[tokio::test]
    async fn test_drop_cleans_up_strategy() {
        let server = mockito::Server::new_async().await;
        let strategy: Arc<dyn AnalyticsStrategy> =
            Arc::new(PostHogStrategy::new().with_env_fallback(false));

        {
            let provider = AnalyticsProvider::mount(
                strategy.clone(),
                AnalyticsConfig::default(),
                Some(&posthog_config(&server.url())),
            )
            .await;
            provider.client().track("inside scope", None);
        }

        assert!(!strategy.is_ready());
    }

    #[tokio::test]
    async fn test_failed_initialize_still_mounts() {
        let strategy: Arc<dyn AnalyticsStrategy> =
            Arc::new(PostHogStrategy::new().with_env_fallback(false));
        let provider =
            AnalyticsProvider::mount(strategy, AnalyticsConfig::default(), None).await;

        assert!(!provider.client().is_ready());
        provider.client().track("dropped", None);
        provider.shutdown().await;
    }
}
