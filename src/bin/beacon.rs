use anyhow::{anyhow, bail, Context, Result};
use dotenvy::dotenv;
use log::info;
use serde_json::Value;

use beacon::analytics::{AnalyticsProvider, Properties};
use beacon::core::Config;
use beacon::format::{
    format_currency_safely, format_date_time, format_relative_to_now, safe_parse_date,
    CurrencyOptions,
};

const USAGE: &str = "\
Usage: beacon <command> [args]

Commands:
  track <event> [json-properties]
  identify <user-id> [json-properties]
  page [name]
  reset
  price <amount>
  date <value>";

fn parse_properties(raw: Option<&String>) -> Result<Option<Properties>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value: Value = serde_json::from_str(raw).context("Properties must be valid JSON")?;
    match value {
        Value::Object(map) => Ok(Some(map)),
        other => Err(anyhow!("Properties must be a JSON object, got {other}")),
    }
}

fn required<'a>(args: &'a [String], index: usize, what: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing {what}\n\n{USAGE}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = required(&args, 0, "command")?;

    match command {
        "price" => {
            let amount: f64 = required(&args, 1, "amount")?
                .parse()
                .context("Amount must be a number")?;
            let options = CurrencyOptions::new(&config.locale, &config.currency);
            println!("{}", format_currency_safely(amount, &options, None));
            return Ok(());
        }
        "date" => {
            let raw = required(&args, 1, "date value")?;
            let input = serde_json::from_str(raw).unwrap_or_else(|_| Value::from(raw));
            let date = safe_parse_date(&input, None);
            println!("{} ({})", format_date_time(&date), format_relative_to_now(&date));
            return Ok(());
        }
        "track" | "identify" | "page" | "reset" => {}
        other => bail!("Unknown command '{other}'\n\n{USAGE}"),
    }

    info!("Starting beacon with {} strategy", config.strategy);

    let provider = AnalyticsProvider::from_config(&config).await;
    let client = provider.client();

    match command {
        "track" => {
            let event = required(&args, 1, "event name")?;
            let properties = parse_properties(args.get(2))?;
            client.track(event, properties.as_ref());
        }
        "identify" => {
            let user_id = required(&args, 1, "user id")?;
            let properties = parse_properties(args.get(2))?;
            client.identify(user_id, properties.as_ref());
        }
        "page" => client.page(args.get(1).map(String::as_str), None),
        _ => client.reset(),
    }

    provider.shutdown().await;
    Ok(())
}
