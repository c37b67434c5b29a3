//! # Formatting Helpers
//!
//! Locale-aware currency and date formatting with non-failing "safe" variants.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

pub mod currency;
pub mod date;

pub use currency::{
    format_currency, format_currency_compact, format_currency_safely, CurrencyDisplay,
    CurrencyOptions, DEFAULT_FALLBACK,
};
pub use date::{
    format_date, format_date_safely, format_date_time, format_date_with, format_relative,
    format_relative_to_now, format_short_date, format_time, is_valid_date, parse_date,
    safe_parse_date,
};
