//! # Analytics Feature
//!
//! Pluggable analytics client with interchangeable backends.
//!
//! - **Version**: 1.2.0
//! - **Since**: 1.0.0
//! - **Toggleable**: true
//!
//! ## Changelog
//! - 1.2.0: Unified strategy surface (page, set_user, capture_exception), init timeout
//! - 1.1.0: Added PostHog backend with background delivery
//! - 1.0.0: Initial release with mock and console backends

pub mod client;
pub mod console;
pub mod mock;
pub mod posthog;
pub mod provider;
pub mod strategy;

pub use client::{AnalyticsClient, AnalyticsConfig, ConfigUpdate};
pub use console::{ConsoleLevel, ConsoleStrategy};
pub use mock::MockStrategy;
pub use posthog::PostHogStrategy;
pub use provider::{strategy_from_config, AnalyticsProvider};
pub use strategy::{AnalyticsStrategy, Properties};

/// Log target used by every analytics backend
pub const LOG_TARGET: &str = "analytics";
