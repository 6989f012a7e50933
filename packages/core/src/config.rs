use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::backfill::{FetchSettings, RetryPolicy};
use crate::cli::Cli;

pub const DEFAULT_API_BASE_URL: &str = "https://api.freecurrencyapi.com/v1";

pub const DEFAULT_CURRENCIES: &[&str] = &[
    "USD", "EUR", "GBP", "JPY", "CNY", "INR", "AUD", "CAD", "CHF", "SEK", "NOK", "DKK", "SGD",
    "HKD", "KRW", "ZAR", "BRL", "MXN", "TRY",
];

#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub api_base_url: String,
    pub base_currency: String,
    /// Tracked codes in column order. Always contains `base_currency`.
    pub currencies: Vec<String>,
    pub start_year: i32,
    pub data_dir: PathBuf,
    pub allow_partial_month: bool,
    pub max_requests_per_minute: u32,
    pub safety_buffer: u32,
    pub max_retries: u32,
    pub retry_base_seconds: f64,
    pub request_timeout_seconds: u64,
    pub metrics_textfile: Option<PathBuf>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("api_base_url", &self.api_base_url)
            .field("base_currency", &self.base_currency)
            .field("currencies", &self.currencies)
            .field("start_year", &self.start_year)
            .field("data_dir", &self.data_dir)
            .field("allow_partial_month", &self.allow_partial_month)
            .field("max_requests_per_minute", &self.max_requests_per_minute)
            .field("safety_buffer", &self.safety_buffer)
            .field("max_retries", &self.max_retries)
            .field("retry_base_seconds", &self.retry_base_seconds)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("metrics_textfile", &self.metrics_textfile)
            .finish()
    }
}

impl Config {
    /// Configuration with every optional setting at its default.
    pub fn new(api_key: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        let base_currency = "USD".to_string();
        let currencies = DEFAULT_CURRENCIES.iter().map(|c| c.to_string()).collect();

        Self {
            api_key: api_key.into(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            currencies: normalize_currencies(&base_currency, currencies),
            base_currency,
            start_year: 2023,
            data_dir: data_dir.into(),
            allow_partial_month: false,
            max_requests_per_minute: 10,
            safety_buffer: 0,
            max_retries: 4,
            retry_base_seconds: 1.0,
            request_timeout_seconds: 30,
            metrics_textfile: None,
        }
    }

    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key/value source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get("FREECURRENCY_API_KEY").ok_or("FREECURRENCY_API_KEY is required")?;
        let data_dir = get("DATA_DIR").unwrap_or_else(|| "/data".to_string());
        let mut config = Self::new(api_key, data_dir);

        if let Some(url) = get("API_BASE_URL") {
            config.api_base_url = url;
        }
        if let Some(base) = get("BASE_CURRENCY") {
            config.base_currency = base.to_uppercase();
        }
        let currencies = match get("CURRENCIES") {
            Some(list) => list.split(',').map(str::to_string).collect(),
            None => config.currencies.clone(),
        };
        config.currencies = normalize_currencies(&config.base_currency, currencies);

        if let Some(year) = get("START_YEAR") {
            config.start_year = parse_number("START_YEAR", &year)?;
        }
        if let Some(flag) = get("ALLOW_PARTIAL_MONTH") {
            config.allow_partial_month = parse_bool(&flag);
        }
        if let Some(max) = get("MAX_REQUESTS_PER_MINUTE") {
            config.max_requests_per_minute = parse_number("MAX_REQUESTS_PER_MINUTE", &max)?;
        }
        if let Some(buffer) = get("SAFETY_BUFFER") {
            config.safety_buffer = parse_number("SAFETY_BUFFER", &buffer)?;
        }
        if let Some(retries) = get("MAX_RETRIES") {
            config.max_retries = parse_number("MAX_RETRIES", &retries)?;
        }
        if let Some(seconds) = get("RETRY_BASE_SECONDS") {
            config.retry_base_seconds = parse_number("RETRY_BASE_SECONDS", &seconds)?;
        }
        if let Some(seconds) = get("REQUEST_TIMEOUT") {
            config.request_timeout_seconds = parse_number("REQUEST_TIMEOUT", &seconds)?;
        }
        config.metrics_textfile = get("METRICS_TEXTFILE").map(PathBuf::from);

        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides on top of the environment.
    pub fn with_overrides(mut self, cli: &Cli) -> Result<Self, String> {
        if let Some(dir) = &cli.data_dir {
            self.data_dir = dir.clone();
        }
        if let Some(year) = cli.start_year {
            self.start_year = year;
        }
        if let Some(allow) = cli.allow_partial_month {
            self.allow_partial_month = allow;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(1900..=9999).contains(&self.start_year) {
            return Err(format!("START_YEAR out of range: {}", self.start_year));
        }
        if self.max_requests_per_minute == 0 {
            return Err("MAX_REQUESTS_PER_MINUTE must be at least 1".to_string());
        }
        if !self.retry_base_seconds.is_finite() || self.retry_base_seconds < 0.0 {
            return Err("RETRY_BASE_SECONDS must be a non-negative number".to_string());
        }
        if let Some(code) = self
            .currencies
            .iter()
            .find(|code| !code.chars().all(|c| c.is_ascii_alphanumeric()))
        {
            return Err(format!("Invalid currency code: {:?}", code));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_secs_f64(self.retry_base_seconds))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            base_currency: self.base_currency.clone(),
            currencies: self.currencies.clone(),
            max_per_minute: self.max_requests_per_minute,
            safety_buffer: self.safety_buffer,
            retry: self.retry_policy(),
        }
    }
}

/// Upper-case, drop blanks and duplicates, and make sure the base
/// currency has a column (first, when it was missing).
fn normalize_currencies(base: &str, codes: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(codes.len() + 1);
    for code in codes {
        let code = code.trim().to_uppercase();
        if !code.is_empty() && !out.contains(&code) {
            out.push(code);
        }
    }
    if !out.iter().any(|code| code == base) {
        out.insert(0, base.to_string());
    }
    out
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes")
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .parse::<T>()
        .map_err(|_| format!("{} must be a valid number", key))
}
