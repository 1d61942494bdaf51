//! Bar sources
//!
//! The scanner only needs [`BarSource::fetch_daily_bars`]: an ordered daily
//! series for one symbol over a date range. Where the bars come from is up
//! to the implementation:
//!
//! - [`CsvBarSource`]: one `<SYMBOL>.csv` per symbol in a directory
//! - [`PolygonClient`]: Polygon.io aggregates REST endpoint
//! - [`InMemoryBarSource`]: fixtures and offline replays

use std::sync::Arc;

use chrono::NaiveDate;

use crate::Bar;

pub mod csv_file;
pub mod memory;
pub mod polygon;
pub mod rate_limit;

pub use csv_file::CsvBarSource;
pub use memory::InMemoryBarSource;
pub use polygon::{PolygonClient, PolygonConfig};
pub use rate_limit::RateLimiter;

/// Per-symbol fetch failure. The scan logs it and moves on.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("unexpected status {code}: {body}")]
    Status { code: u16, body: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("no data for symbol")]
    NotFound,

    #[error("no bars in requested range")]
    Empty,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Http(err.to_string())
        }
    }
}

impl From<csv::Error> for FetchError {
    fn from(err: csv::Error) -> Self {
        if !err.is_io_error() {
            return FetchError::Parse(err.to_string());
        }
        match err.into_kind() {
            csv::ErrorKind::Io(io) => FetchError::Io(io),
            other => FetchError::Parse(format!("{other:?}")),
        }
    }
}

/// Supplier of daily bars, shared read-only by all scan workers
pub trait BarSource: Send + Sync {
    /// Short label used in log lines
    fn name(&self) -> &str;

    /// Bars with `start <= date <= end`, ascending by date.
    fn fetch_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, FetchError>;
}

impl<S: BarSource + ?Sized> BarSource for &S {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, FetchError> {
        (**self).fetch_daily_bars(symbol, start, end)
    }
}

impl<S: BarSource + ?Sized> BarSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, FetchError> {
        (**self).fetch_daily_bars(symbol, start, end)
    }
}

impl<S: BarSource + ?Sized> BarSource for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, FetchError> {
        (**self).fetch_daily_bars(symbol, start, end)
    }
}

/// Keep bars inside `[start, end]`
pub(crate) fn clip_to_range(bars: &mut Vec<Bar>, start: NaiveDate, end: NaiveDate) {
    bars.retain(|b| b.date >= start && b.date <= end);
}
