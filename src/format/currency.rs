//! # Currency Formatting
//!
//! Locale-aware money formatting from a built-in table of locales and
//! currencies. The plain functions return an error for bad input; the
//! `_safely` variant never fails.
//!
//! - **Version**: 1.2.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.2.0: Ties round away from zero; compact values roll over to the next unit
//! - 1.1.0: Added compact formatting (K/M/B)
//! - 1.0.0: Initial release with symbol, code and name display

use anyhow::{anyhow, bail, Result};
use log::warn;

/// Returned by [`format_currency_safely`] when no fallback is supplied
pub const DEFAULT_FALLBACK: &str = "₱0.00";

pub const DEFAULT_LOCALE: &str = "en-PH";
pub const DEFAULT_CURRENCY: &str = "PHP";

const NBSP: char = '\u{a0}';
const NARROW_NBSP: &str = "\u{202f}";

/// How the currency itself is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurrencyDisplay {
    /// `₱1,234.56`
    #[default]
    Symbol,
    /// `PHP 1,234.56`
    Code,
    /// `1,234.56 Philippine pesos`
    Name,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyOptions {
    pub locale: String,
    pub currency: String,
    pub display: CurrencyDisplay,
}

impl Default for CurrencyOptions {
    fn default() -> Self {
        CurrencyOptions {
            locale: DEFAULT_LOCALE.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            display: CurrencyDisplay::default(),
        }
    }
}

impl CurrencyOptions {
    pub fn new(locale: impl Into<String>, currency: impl Into<String>) -> Self {
        CurrencyOptions {
            locale: locale.into(),
            currency: currency.into(),
            display: CurrencyDisplay::default(),
        }
    }

    pub fn with_display(mut self, display: CurrencyDisplay) -> Self {
        self.display = display;
        self
    }
}

struct LocaleFormat {
    tag: &'static str,
    group: &'static str,
    decimal: &'static str,
    /// Currency goes after the number, separated by a no-break space
    suffix: bool,
}

const LOCALES: &[LocaleFormat] = &[
    LocaleFormat { tag: "en-PH", group: ",", decimal: ".", suffix: false },
    LocaleFormat { tag: "en-US", group: ",", decimal: ".", suffix: false },
    LocaleFormat { tag: "en-GB", group: ",", decimal: ".", suffix: false },
    LocaleFormat { tag: "de-DE", group: ".", decimal: ",", suffix: true },
    LocaleFormat { tag: "fr-FR", group: NARROW_NBSP, decimal: ",", suffix: true },
    LocaleFormat { tag: "ja-JP", group: ",", decimal: ".", suffix: false },
];

struct CurrencyInfo {
    code: &'static str,
    symbol: &'static str,
    digits: usize,
    singular: &'static str,
    plural: &'static str,
}

const CURRENCIES: &[CurrencyInfo] = &[
    CurrencyInfo { code: "PHP", symbol: "₱", digits: 2, singular: "Philippine peso", plural: "Philippine pesos" },
    CurrencyInfo { code: "USD", symbol: "$", digits: 2, singular: "US dollar", plural: "US dollars" },
    CurrencyInfo { code: "EUR", symbol: "€", digits: 2, singular: "euro", plural: "euros" },
    CurrencyInfo { code: "GBP", symbol: "£", digits: 2, singular: "British pound", plural: "British pounds" },
    CurrencyInfo { code: "JPY", symbol: "¥", digits: 0, singular: "Japanese yen", plural: "Japanese yen" },
];

/// Resolve a BCP 47 tag; malformed tags are errors, unknown ones fall back
fn resolve_locale(tag: &str) -> Result<&'static LocaleFormat> {
    let normalized = tag.trim().replace('_', "-");
    let mut parts = normalized.split('-');
    let language = parts.next().unwrap_or_default();

    let well_formed = (2..=3).contains(&language.len())
        && language.chars().all(|c| c.is_ascii_alphabetic())
        && parts.all(|p| (1..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphanumeric()));
    if !well_formed {
        bail!("Invalid locale: '{tag}'");
    }

    let exact = LOCALES
        .iter()
        .find(|l| l.tag.eq_ignore_ascii_case(&normalized));
    let by_language = || {
        LOCALES.iter().find(|l| {
            l.tag
                .split('-')
                .next()
                .is_some_and(|lang| lang.eq_ignore_ascii_case(language))
        })
    };

    exact
        .or_else(by_language)
        .or_else(|| LOCALES.iter().find(|l| l.tag == "en-US"))
        .ok_or_else(|| anyhow!("No locale data available for '{tag}'"))
}

/// Currency metadata; well-formed but unknown codes display as the code itself
fn resolve_currency(code: &str) -> Result<(String, String, usize, String, String)> {
    let code = code.trim();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        bail!("Invalid currency code: '{code}'");
    }
    let upper = code.to_ascii_uppercase();

    Ok(match CURRENCIES.iter().find(|c| c.code == upper) {
        Some(info) => (
            info.code.to_string(),
            info.symbol.to_string(),
            info.digits,
            info.singular.to_string(),
            info.plural.to_string(),
        ),
        None => (upper.clone(), upper.clone(), 2, upper.clone(), upper),
    })
}

/// Insert group separators into a run of ASCII digits
fn group_digits(digits: &str, separator: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 * separator.len());
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(c);
    }
    out
}

/// Round a non-negative value to `digits` fraction digits, ties away from zero.
///
/// Works on the shortest decimal form of the float, so `1.005` rounds to
/// `1.01` the way its written value suggests. Returns the integer and
/// fraction digit runs.
fn round_decimal(value: f64, digits: usize) -> (String, String) {
    let shortest = format!("{}", value.abs());
    let (int, frac) = shortest.split_once('.').unwrap_or((shortest.as_str(), ""));

    if frac.len() <= digits {
        return (int.to_string(), format!("{frac:0<digits$}"));
    }

    let round_up = frac.as_bytes()[digits] >= b'5';
    let mut kept: Vec<u8> = int.bytes().chain(frac.bytes().take(digits)).collect();
    if round_up {
        let mut i = kept.len();
        loop {
            if i == 0 {
                kept.insert(0, b'1');
                break;
            }
            i -= 1;
            if kept[i] == b'9' {
                kept[i] = b'0';
            } else {
                kept[i] += 1;
                break;
            }
        }
    }

    let split = kept.len() - digits;
    let kept = String::from_utf8_lossy(&kept).into_owned();
    (kept[..split].to_string(), kept[split..].to_string())
}

fn join_number(int: &str, frac: &str, locale: &LocaleFormat) -> String {
    let grouped = group_digits(int, locale.group);
    if frac.is_empty() {
        grouped
    } else {
        format!("{grouped}{}{frac}", locale.decimal)
    }
}

fn place(number: &str, marker: &str, display: CurrencyDisplay, locale: &LocaleFormat) -> String {
    match (display, locale.suffix) {
        (CurrencyDisplay::Name, _) => format!("{number} {marker}"),
        (_, true) => format!("{number}{NBSP}{marker}"),
        (CurrencyDisplay::Code, false) => format!("{marker}{NBSP}{number}"),
        (CurrencyDisplay::Symbol, false) => format!("{marker}{number}"),
    }
}

/// Format `amount` as money, e.g. `₱1,234.56`.
///
/// Fails on NaN/infinite amounts, malformed locale tags and malformed
/// currency codes.
pub fn format_currency(amount: f64, options: &CurrencyOptions) -> Result<String> {
    if !amount.is_finite() {
        bail!("Cannot format non-finite amount: {amount}");
    }
    let locale = resolve_locale(&options.locale)?;
    let (code, symbol, digits, singular, plural) = resolve_currency(&options.currency)?;

    let (int, frac) = round_decimal(amount, digits);
    let number = join_number(&int, &frac, locale);

    // English plural rule on the visible operand: only "1" with no fraction is singular
    let marker = match options.display {
        CurrencyDisplay::Symbol => symbol,
        CurrencyDisplay::Code => code,
        CurrencyDisplay::Name if int == "1" && frac.is_empty() => singular,
        CurrencyDisplay::Name => plural,
    };

    // Sign follows the input, so an amount that rounds to zero keeps its minus
    let formatted = place(&number, &marker, options.display, locale);
    Ok(if amount.is_sign_negative() {
        format!("-{formatted}")
    } else {
        formatted
    })
}

/// Like [`format_currency`] but returns `fallback` (default `₱0.00`) on any failure
pub fn format_currency_safely(
    amount: f64,
    options: &CurrencyOptions,
    fallback: Option<&str>,
) -> String {
    match format_currency(amount, options) {
        Ok(formatted) => formatted,
        Err(e) => {
            warn!("Currency formatting failed, using fallback: {e}");
            fallback.unwrap_or(DEFAULT_FALLBACK).to_string()
        }
    }
}

/// Short form for large amounts: `₱1.2K`, `₱35M`, `₱1.5B`
pub fn format_currency_compact(amount: f64, options: &CurrencyOptions) -> Result<String> {
    if !amount.is_finite() {
        bail!("Cannot format non-finite amount: {amount}");
    }

    const UNITS: [(f64, &str); 3] = [(1e3, "K"), (1e6, "M"), (1e9, "B")];

    let magnitude = amount.abs();
    let Some(mut unit_index) = UNITS.iter().rposition(|(scale, _)| magnitude >= *scale) else {
        return format_currency(amount, options);
    };

    let locale = resolve_locale(&options.locale)?;
    let (code, symbol, ..) = resolve_currency(&options.currency)?;

    // One decimal below 10 of a unit, whole units above; a result that rounds
    // up to 1000 moves to the next unit
    let rounded = |scaled: f64| {
        if scaled < 10.0 {
            round_decimal(scaled, 1)
        } else {
            round_decimal(scaled, 0)
        }
    };
    let (mut int, mut frac) = rounded(magnitude / UNITS[unit_index].0);
    while int.len() >= 4 && unit_index + 1 < UNITS.len() {
        unit_index += 1;
        (int, frac) = rounded(magnitude / UNITS[unit_index].0);
    }
    let frac = frac.trim_end_matches('0');
    let number = join_number(&int, frac, locale);
    let unit = UNITS[unit_index].1;

    let marker = match options.display {
        CurrencyDisplay::Code => code,
        _ => symbol,
    };
    let display = match options.display {
        CurrencyDisplay::Name => CurrencyDisplay::Symbol,
        other => other,
    };

    let formatted = place(&format!("{number}{unit}"), &marker, display, locale);
    Ok(if amount.is_sign_negative() {
        format!("-{formatted}")
    } else {
        formatted
    })
}
