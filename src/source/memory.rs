use std::collections::HashMap;

use chrono::NaiveDate;

use super::{clip_to_range, BarSource, FetchError};
use crate::Bar;

/// Bars held in memory, keyed by symbol
#[derive(Debug, Clone, Default)]
pub struct InMemoryBarSource {
    series: HashMap<String, Vec<Bar>>,
}

impl InMemoryBarSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, symbol: impl Into<String>, bars: Vec<Bar>) -> Self {
        self.insert(symbol, bars);
        self
    }

    pub fn insert(&mut self, symbol: impl Into<String>, bars: Vec<Bar>) {
        self.series.insert(symbol.into(), bars);
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }
}

impl BarSource for InMemoryBarSource {
    fn name(&self) -> &str {
        "memory"
    }

    fn fetch_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, FetchError> {
        let mut bars = self.series.get(symbol).cloned().ok_or(FetchError::NotFound)?;
        clip_to_range(&mut bars, start, end);
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_clips_range() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 5, day).unwrap();
        let bars = (1..=10)
            .map(|day| Bar::new(d(day), 1.0, 2.0, 0.5, 1.5, 100.0))
            .collect();
        let source = InMemoryBarSource::new().with_series("ABC", bars);

        let got = source.fetch_daily_bars("ABC", d(3), d(5)).unwrap();
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].date, d(3));

        assert!(matches!(
            source.fetch_daily_bars("XYZ", d(3), d(5)),
            Err(FetchError::NotFound)
        ));
    }
}
