use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use super::{clip_to_range, BarSource, FetchError};
use crate::Bar;

/// Directory of `<SYMBOL>.csv` files with a `date,open,high,low,close,volume`
/// header (capitalised headers are accepted too).
#[derive(Debug, Clone)]
pub struct CsvBarSource {
    dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "Date", alias = "time")]
    date: NaiveDate,
    #[serde(alias = "Open")]
    open: f64,
    #[serde(alias = "High")]
    high: f64,
    #[serde(alias = "Low")]
    low: f64,
    #[serde(alias = "Close")]
    close: f64,
    #[serde(alias = "Volume")]
    volume: f64,
}

impl CsvBarSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }

    /// Parse every row of one file
    pub fn read_file(path: &Path) -> Result<Vec<Bar>, FetchError> {
        let mut reader = csv::Reader::from_path(path)?;
        reader
            .deserialize::<CsvRow>()
            .map(|row| -> Result<Bar, FetchError> {
                let r = row?;
                Ok(Bar::new(r.date, r.open, r.high, r.low, r.close, r.volume))
            })
            .collect()
    }
}

impl BarSource for CsvBarSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, FetchError> {
        let path = self.path_for(symbol);
        if !path.is_file() {
            return Err(FetchError::NotFound);
        }
        let mut bars = Self::read_file(&path)?;
        clip_to_range(&mut bars, start, end);
        Ok(bars)
    }
}
