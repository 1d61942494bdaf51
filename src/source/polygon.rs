//! Polygon.io daily aggregates
//!
//! `GET /v2/aggs/ticker/{symbol}/range/1/day/{start}/{end}` with a blocking
//! client. The client is cheap to share: workers clone nothing and only
//! hold `&PolygonClient`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use tracing::debug;

use super::{BarSource, FetchError, RateLimiter};
use crate::Bar;

pub const POLYGON_BASE_URL: &str = "https://api.polygon.io";

/// Largest page Polygon returns for aggregates
const PAGE_LIMIT: u32 = 50_000;
/// Error bodies are cut to this many characters in [`FetchError::Status`]
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Clone)]
pub struct PolygonConfig {
    pub api_key: String,
    pub base_url: String,
    /// Per-request timeout; a timed-out symbol is skipped
    pub timeout: Duration,
    /// Shared limit across all workers; `None` disables limiting
    pub requests_per_minute: Option<u32>,
    /// Split/dividend adjusted bars
    pub adjusted: bool,
}

impl PolygonConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: POLYGON_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            requests_per_minute: None,
            adjusted: true,
        }
    }
}

pub struct PolygonClient {
    config: PolygonConfig,
    client: reqwest::blocking::Client,
    limiter: Option<Arc<RateLimiter>>,
}

#[derive(Debug, Deserialize)]
struct AggsResponse {
    #[serde(default)]
    results: Vec<AggBar>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AggBar {
    /// Window start, Unix milliseconds
    t: i64,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

impl PolygonClient {
    pub fn new(config: PolygonConfig) -> Result<Self, FetchError> {
        if config.api_key.trim().is_empty() {
            return Err(FetchError::Http("missing Polygon API key".to_string()));
        }
        if config.requests_per_minute == Some(0) {
            return Err(FetchError::Http(
                "rate limit must allow at least one request per minute".to_string(),
            ));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()?;
        let limiter = config
            .requests_per_minute
            .map(|n| Arc::new(RateLimiter::per_minute(n)));
        Ok(Self {
            config,
            client,
            limiter,
        })
    }

    pub fn config(&self) -> &PolygonConfig {
        &self.config
    }

    /// Request URL without the API key
    pub fn aggregates_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "{}/v2/aggs/ticker/{}/range/1/day/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            symbol,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d"),
        )
    }
}

/// Decode an aggregates response body into ascending daily bars.
pub fn parse_aggregates(body: &str) -> Result<Vec<Bar>, FetchError> {
    let response: AggsResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;
    if let Some(status) = response.status.as_deref() {
        if status.eq_ignore_ascii_case("ERROR") || status.eq_ignore_ascii_case("NOT_AUTHORIZED") {
            let msg = response.error.unwrap_or_else(|| status.to_string());
            return Err(FetchError::Http(msg));
        }
    }

    let mut bars = response
        .results
        .into_iter()
        .map(|a| {
            // daily windows start at midnight New York time, which is the
            // same calendar date in UTC
            let date = DateTime::from_timestamp_millis(a.t)
                .ok_or_else(|| FetchError::Parse(format!("bad timestamp {}", a.t)))?
                .date_naive();
            Ok(Bar::new(date, a.o, a.h, a.l, a.c, a.v))
        })
        .collect::<Result<Vec<Bar>, FetchError>>()?;
    bars.sort_by_key(|b| b.date);
    Ok(bars)
}

impl BarSource for PolygonClient {
    fn name(&self) -> &str {
        "polygon"
    }

    fn fetch_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, FetchError> {
        if let Some(limiter) = &self.limiter {
            limiter.acquire();
        }

        let url = self.aggregates_url(symbol, start, end);
        debug!(symbol, %url, "fetching daily aggregates");

        let limit = PAGE_LIMIT.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("adjusted", if self.config.adjusted { "true" } else { "false" }),
                ("sort", "asc"),
                ("limit", limit.as_str()),
                ("apiKey", self.config.api_key.as_str()),
            ])
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(FetchError::Status {
                code: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }
        parse_aggregates(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aggregates() {
        // 2024-01-03 and 2024-01-02 at 05:00 UTC, out of order
        let body = r#"{
            "ticker": "AAPL", "status": "OK", "resultsCount": 2,
            "results": [
                {"v": 58414460.0, "vw": 184.3, "o": 184.22, "c": 184.25, "h": 185.88, "l": 183.43, "t": 1704258000000, "n": 656853},
                {"v": 82488674.0, "vw": 186.0, "o": 187.15, "c": 185.64, "h": 188.44, "l": 183.885, "t": 1704171600000, "n": 1008871}
            ]
        }"#;
        let bars = parse_aggregates(body).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[0].open, 187.15);
        assert_eq!(bars[1].close, 184.25);
    }

    #[test]
    fn test_parse_no_results_is_empty() {
        let bars = parse_aggregates(r#"{"ticker":"ZZZZ","status":"OK","resultsCount":0}"#).unwrap();
        assert!(bars.is_empty());
    }

    #[test]
    fn test_parse_error_status() {
        let err = parse_aggregates(r#"{"status":"ERROR","error":"Unknown API Key"}"#).unwrap_err();
        assert!(matches!(err, FetchError::Http(msg) if msg.contains("API Key")));
        assert!(matches!(parse_aggregates("<html>"), Err(FetchError::Parse(_))));
    }

    #[test]
    fn test_aggregates_url_omits_key() {
        let mut config = PolygonConfig::new("secret");
        config.base_url = "http://localhost:9/".to_string();
        let client = PolygonClient::new(config).unwrap();
        let url = client.aggregates_url(
            "MSFT",
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        );
        assert_eq!(url, "http://localhost:9/v2/aggs/ticker/MSFT/range/1/day/2024-01-02/2024-02-01");
        assert!(!url.contains("secret"));
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(PolygonClient::new(PolygonConfig::new("  ")).is_err());
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let mut config = PolygonConfig::new("key");
        config.requests_per_minute = Some(0);
        assert!(PolygonClient::new(config).is_err());
    }
}
