use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Response};
use serde::Deserialize;

use crate::backfill::error::ProviderError;
use crate::backfill::provider::{ProviderResult, RateProvider};
use crate::backfill::types::QuotaState;

/// HTTP client for a freecurrencyapi.com compatible service.
#[derive(Clone)]
pub struct FreeCurrencyClient {
    base_url: String,
    api_key: String,
    http: Client,
}

impl FreeCurrencyClient {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> ProviderResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| {
                ProviderError::network(format!("Failed to build HTTP client: {}", err))
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            http,
        })
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> ProviderResult<Response> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http
            .get(&url)
            .header("apikey", &self.api_key)
            .query(query)
            .send()
            .await
            .map_err(|err| ProviderError::network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        Ok(response)
    }
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    quotas: Quotas,
}

#[derive(Debug, Deserialize)]
struct Quotas {
    month: QuotaWindow,
    #[serde(default)]
    minute: Option<QuotaWindow>,
}

#[derive(Debug, Deserialize)]
struct QuotaWindow {
    total: Option<i64>,
    used: Option<i64>,
    remaining: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct HistoricalResponse {
    data: HashMap<String, HashMap<String, Option<f64>>>,
}

/// Map a failure to read or decode a response body. Only a body that
/// arrived intact but does not parse is a format problem.
fn body_error(what: &str, err: reqwest::Error) -> ProviderError {
    if err.is_decode() {
        ProviderError::format(format!("Failed to parse {} response: {}", what, err))
    } else {
        ProviderError::network(format!("Failed to read {} response: {}", what, err))
    }
}

fn clamp(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}

impl StatusResponse {
    fn into_quota(self) -> ProviderResult<QuotaState> {
        let month_remaining = self
            .quotas
            .month
            .remaining
            .ok_or_else(|| {
                ProviderError::format("status response has no monthly remaining quota")
            })?;

        // The service only documents a monthly window; a minute window is
        // honoured when present.
        let (minute_remaining, minute_limit) = match self.quotas.minute {
            Some(window) => (
                window.remaining.map_or(u32::MAX, clamp),
                window.total.map(clamp),
            ),
            None => (u32::MAX, None),
        };

        Ok(QuotaState {
            minute_remaining,
            minute_limit,
            month_remaining: clamp(month_remaining),
            month_total: self.quotas.month.total.map(clamp),
            month_used: self.quotas.month.used.map(clamp),
        })
    }
}

#[async_trait]
impl RateProvider for FreeCurrencyClient {
    async fn status(&self) -> ProviderResult<QuotaState> {
        let status = self
            .get("/status", &[])
            .await?
            .json::<StatusResponse>()
            .await
            .map_err(|err| body_error("status", err))?;

        status.into_quota()
    }

    async fn historical(
        &self,
        date: NaiveDate,
        base: &str,
        currencies: &[String],
    ) -> ProviderResult<HashMap<String, f64>> {
        let day = date.format("%Y-%m-%d").to_string();
        let query = [
            ("date", day.clone()),
            ("base_currency", base.to_string()),
            ("currencies", currencies.join(",")),
        ];

        let mut body = self
            .get("/historical", &query)
            .await?
            .json::<HistoricalResponse>()
            .await
            .map_err(|err| body_error("historical", err))?;

        let rates = body
            .data
            .remove(&day)
            .ok_or_else(|| ProviderError::format(format!("response has no rates for {}", day)))?;

        Ok(rates
            .into_iter()
            .filter_map(|(code, rate)| rate.map(|r| (code, r)))
            .collect())
    }

    fn provider_name(&self) -> &str {
        "freecurrencyapi"
    }
}
