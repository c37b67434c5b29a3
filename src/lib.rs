// Core layer - configuration shared by every feature
pub mod core;

// Analytics layer - client, strategy contract and backends
pub mod analytics;

// Formatting layer - locale-aware currency and date helpers
pub mod format;

pub use crate::core::Config;

pub use analytics::{
    AnalyticsClient, AnalyticsConfig, AnalyticsProvider, AnalyticsStrategy, ConfigUpdate,
    ConsoleLevel, ConsoleStrategy, MockStrategy, PostHogStrategy, Properties,
};

pub use format::{
    format_currency, format_currency_safely, format_date, format_relative, safe_parse_date,
    CurrencyDisplay, CurrencyOptions,
};
