//! # edgescan - daily gap-pattern scanner
//!
//! Scans a universe of symbols for the two-stage "trigger day + trade day"
//! setups used by the Backside B / Half A+ family of daily scanners.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgescan::prelude::*;
//! use chrono::NaiveDate;
//!
//! let source = CsvBarSource::new("data/daily");
//! let scanner = ScannerBuilder::new(source)
//!     .params(ScanParameters::backside_b())
//!     .date_range(
//!         NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
//!         NaiveDate::from_ymd_opt(2024, 6, 28).unwrap(),
//!     )
//!     .workers(8)
//!     .build()
//!     .unwrap();
//!
//! let report = scanner.run(&["AAPL", "NVDA"]).unwrap();
//! for signal in &report.signals {
//!     println!("{} {} {}", signal.date, signal.symbol, signal.trigger);
//! }
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub mod evaluator;
pub mod indicators;
pub mod params;
pub mod report;
pub mod scanner;
pub mod source;
pub mod window;

pub mod prelude {
    pub use crate::{
        // Evaluation
        evaluator::{PatternEvaluator, SignalResult, TriggerTag},
        // Indicators
        indicators::{IndicatorFrame, IndicatorRow},
        // Parameters
        params::{
            ParamMeta, ParamType, PresetCatalog, RangeBasis, ScanParameters, SortOrder,
            TriggerMode,
        },
        // Reporting
        report::{write_csv, write_json, ScanSummary},
        // Orchestration
        scanner::{ScanReport, Scanner, ScannerBuilder, SymbolFailure},
        // Sources
        source::{BarSource, CsvBarSource, FetchError, InMemoryBarSource, PolygonClient},
        // Window
        window::WindowStats,
        // Core types
        Bar,
        OHLCVExt,
        Period,
        Ratio,
        Result,
        ScanError,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, ScanError>;

/// Errors that can occur while configuring or running a scan
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Insufficient data: need {need} bars, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Invalid bar at index {index}: {reason}")]
    InvalidBar { index: usize, reason: &'static str },

    #[error("Fetch failed for {symbol}: {source}")]
    Fetch {
        symbol: String,
        #[source]
        source: source::FetchError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScanError {
    /// True for errors raised before any data is touched (bad parameters,
    /// bad date range, empty universe).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ScanError::InvalidValue(_)
                | ScanError::OutOfRange { .. }
                | ScanError::InvalidConfig(_)
                | ScanError::UnknownParameter(_)
        )
    }
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(ScanError::InvalidValue("Ratio cannot be NaN or infinite"));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(ScanError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Day count (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(u32);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: u32) -> Result<Self> {
        if value == 0 {
            return Err(ScanError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: u32) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = u32::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// One trading day of market data
pub trait OHLCV {
    fn date(&self) -> NaiveDate;
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    /// Close minus open; positive on green days.
    #[inline]
    fn body(&self) -> f64 {
        self.close() - self.open()
    }

    #[inline]
    fn dollar_volume(&self) -> f64 {
        self.close() * self.volume()
    }

    /// True range against the previous close. Without a previous close the
    /// high-low range is used.
    #[inline]
    fn true_range(&self, prev_close: Option<f64>) -> f64 {
        match prev_close {
            Some(pc) if pc.is_finite() => self
                .range()
                .max((self.high() - pc).abs())
                .max((self.low() - pc).abs()),
            _ => self.range(),
        }
    }

    /// Validate a single bar
    fn validate(&self) -> Result<()> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| !p.is_finite()) {
            return Err(ScanError::InvalidBar {
                index: 0,
                reason: "non-finite price",
            });
        }
        if prices.iter().any(|p| *p <= 0.0) {
            return Err(ScanError::InvalidBar {
                index: 0,
                reason: "price <= 0",
            });
        }
        if self.high() < self.low() {
            return Err(ScanError::InvalidBar {
                index: 0,
                reason: "high < low",
            });
        }
        if !self.volume().is_finite() || self.volume() < 0.0 {
            return Err(ScanError::InvalidBar {
                index: 0,
                reason: "volume must be finite and >= 0",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

/// Validate a whole series: every bar valid, dates strictly increasing.
pub fn validate_series<T: OHLCV>(bars: &[T]) -> Result<()> {
    for (i, bar) in bars.iter().enumerate() {
        bar.validate().map_err(|e| match e {
            ScanError::InvalidBar { reason, .. } => ScanError::InvalidBar { index: i, reason },
            other => other,
        })?;
        if i > 0 && bars[i - 1].date() >= bar.date() {
            return Err(ScanError::InvalidBar {
                index: i,
                reason: "dates not strictly increasing",
            });
        }
    }
    Ok(())
}

// ============================================================
// BAR
// ============================================================

/// Daily bar as delivered by a [`source::BarSource`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl OHLCV for Bar {
    #[inline]
    fn date(&self) -> NaiveDate {
        self.date
    }

    #[inline]
    fn open(&self) -> f64 {
        self.open
    }

    #[inline]
    fn high(&self) -> f64 {
        self.high
    }

    #[inline]
    fn low(&self) -> f64 {
        self.low
    }

    #[inline]
    fn close(&self) -> f64 {
        self.close
    }

    #[inline]
    fn volume(&self) -> f64 {
        self.volume
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_ratio_validation() {
        assert!(Ratio::new(0.0).is_ok());
        assert!(Ratio::new(1.0).is_ok());
        assert!(Ratio::new(0.75).is_ok());
        assert!(Ratio::new(-0.1).is_err());
        assert!(Ratio::new(1.1).is_err());
        assert!(Ratio::new(f64::NAN).is_err());
        assert!(Ratio::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_period_validation() {
        assert!(Period::new(1).is_ok());
        assert!(Period::new(1000).is_ok());
        assert!(Period::new(0).is_err());
    }

    #[test]
    fn test_ratio_rejects_out_of_range_json() {
        let ok: Ratio = serde_json::from_str("0.5").unwrap();
        assert_eq!(ok.get(), 0.5);
        assert!(serde_json::from_str::<Ratio>("1.5").is_err());
        assert!(serde_json::from_str::<Period>("0").is_err());
    }

    #[test]
    fn test_ohlcv_ext() {
        let bar = Bar::new(day(1), 100.0, 110.0, 90.0, 105.0, 1_000.0);
        assert_eq!(bar.range(), 20.0);
        assert_eq!(bar.body(), 5.0);
        assert_eq!(bar.dollar_volume(), 105_000.0);
    }

    #[test]
    fn test_true_range_uses_prev_close() {
        let bar = Bar::new(day(1), 100.0, 102.0, 99.0, 101.0, 1_000.0);
        assert_eq!(bar.true_range(None), 3.0);
        // gap up from 95: high - prev close dominates
        assert_eq!(bar.true_range(Some(95.0)), 7.0);
        // gap down from 106: prev close - low dominates
        assert_eq!(bar.true_range(Some(106.0)), 7.0);
        assert_eq!(bar.true_range(Some(f64::NAN)), 3.0);
    }

    #[test]
    fn test_validate_bar() {
        assert!(Bar::new(day(1), 1.0, 2.0, 0.5, 1.5, 0.0).validate().is_ok());
        assert!(Bar::new(day(1), 1.0, 0.5, 2.0, 1.5, 10.0).validate().is_err());
        assert!(Bar::new(day(1), 0.0, 2.0, 0.5, 1.5, 10.0).validate().is_err());
        assert!(Bar::new(day(1), 1.0, 2.0, 0.5, f64::NAN, 10.0).validate().is_err());
        assert!(Bar::new(day(1), 1.0, 2.0, 0.5, 1.5, -1.0).validate().is_err());
    }

    #[test]
    fn test_validate_series_reports_index() {
        let bars = vec![
            Bar::new(day(1), 1.0, 2.0, 0.5, 1.5, 10.0),
            Bar::new(day(2), 1.0, 2.0, 0.5, 1.5, 10.0),
            Bar::new(day(2), 1.0, 2.0, 0.5, 1.5, 10.0),
        ];
        match validate_series(&bars) {
            Err(ScanError::InvalidBar { index, .. }) => assert_eq!(index, 2),
            other => panic!("expected InvalidBar, got {other:?}"),
        }
    }

    #[test]
    fn test_configuration_errors_are_flagged() {
        assert!(ScanError::InvalidConfig("x".into()).is_configuration());
        assert!(!ScanError::InsufficientData { need: 22, got: 3 }.is_configuration());
    }
}
