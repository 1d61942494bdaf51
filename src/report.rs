//! Result export and run summary

use std::collections::BTreeMap;
use std::io::Write;

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    evaluator::{SignalResult, TriggerTag},
    scanner::ScanReport,
    Result,
};

/// Aggregate view of one scan
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanSummary {
    pub total_signals: usize,
    pub unique_symbols: usize,
    pub signals_per_symbol: BTreeMap<String, usize>,
    /// `None` when there are no signals
    pub mean_gap_over_atr: Option<f64>,
    pub mean_body_over_atr: Option<f64>,
    pub d1_triggers: usize,
    pub d2_triggers: usize,
    pub symbols_scanned: usize,
    pub symbols_failed: usize,
    pub symbols_skipped: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

impl ScanSummary {
    pub fn new(
        signals: &[SignalResult],
        symbols_scanned: usize,
        symbols_failed: usize,
        symbols_skipped: usize,
    ) -> Self {
        let mut per_symbol = BTreeMap::new();
        for s in signals {
            *per_symbol.entry(s.symbol.clone()).or_insert(0) += 1;
        }
        let count = |tag: TriggerTag| signals.iter().filter(|s| s.trigger == tag).count();

        Self {
            total_signals: signals.len(),
            unique_symbols: per_symbol.len(),
            signals_per_symbol: per_symbol,
            mean_gap_over_atr: mean(signals.iter().map(|s| s.gap_over_atr)),
            mean_body_over_atr: mean(signals.iter().map(|s| s.body_over_atr)),
            d1_triggers: count(TriggerTag::D1),
            d2_triggers: count(TriggerTag::D2),
            symbols_scanned,
            symbols_failed,
            symbols_skipped,
            first_date: signals.iter().map(|s| s.date).min(),
            last_date: signals.iter().map(|s| s.date).max(),
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// One CSV row per signal, header included
pub fn write_csv<W: Write>(writer: W, signals: &[SignalResult]) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    for signal in signals {
        out.serialize(signal)?;
    }
    // an empty table still gets its header
    if signals.is_empty() {
        out.write_record(CSV_HEADER)?;
    }
    out.flush()?;
    Ok(())
}

const CSV_HEADER: [&str; 15] = [
    "symbol",
    "date",
    "trigger",
    "trigger_date",
    "open",
    "close",
    "volume",
    "gap_over_atr",
    "open_over_ema9",
    "body_over_atr",
    "vol_signal",
    "slope_ema9_5d",
    "high_over_ema9_div_atr",
    "adv20_usd",
    "position",
];

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: &'a ScanSummary,
    signals: &'a [SignalResult],
    failures: Vec<JsonFailure<'a>>,
}

#[derive(Serialize)]
struct JsonFailure<'a> {
    symbol: &'a str,
    error: String,
}

/// `{"summary": ..., "signals": [...], "failures": [...]}`, pretty-printed
pub fn write_json<W: Write>(writer: W, report: &ScanReport) -> Result<()> {
    let doc = JsonReport {
        summary: &report.summary,
        signals: &report.signals,
        failures: report
            .failures
            .iter()
            .map(|f| JsonFailure {
                symbol: &f.symbol,
                error: f.error.to_string(),
            })
            .collect(),
    };
    serde_json::to_writer_pretty(writer, &doc)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(symbol: &str, day: u32, trigger: TriggerTag, gap: f64) -> SignalResult {
        let date = NaiveDate::from_ymd_opt(2024, 2, day).unwrap();
        SignalResult {
            symbol: symbol.to_string(),
            date,
            trigger,
            trigger_date: date,
            open: 10.0,
            close: 10.5,
            volume: 1_000.0,
            gap_over_atr: gap,
            open_over_ema9: 1.1,
            body_over_atr: 0.5,
            vol_signal: 2.0,
            slope_ema9_5d: 4.0,
            high_over_ema9_div_atr: 1.2,
            adv20_usd: 5e7,
            position: 0.4,
        }
    }

    #[test]
    fn test_summary_counts() {
        let signals = vec![
            signal("AAA", 9, TriggerTag::D1, 1.0),
            signal("AAA", 5, TriggerTag::D2, 2.0),
            signal("BBB", 7, TriggerTag::D1, 3.0),
        ];
        let summary = ScanSummary::new(&signals, 10, 1, 2);
        assert_eq!(summary.total_signals, 3);
        assert_eq!(summary.unique_symbols, 2);
        assert_eq!(summary.signals_per_symbol["AAA"], 2);
        assert_eq!(summary.mean_gap_over_atr, Some(2.0));
        assert_eq!(summary.d1_triggers, 2);
        assert_eq!(summary.d2_triggers, 1);
        assert_eq!(summary.first_date, NaiveDate::from_ymd_opt(2024, 2, 5));
        assert_eq!(summary.last_date, NaiveDate::from_ymd_opt(2024, 2, 9));
    }

    #[test]
    fn test_empty_summary_has_no_means() {
        let summary = ScanSummary::new(&[], 4, 0, 0);
        assert_eq!(summary.total_signals, 0);
        assert_eq!(summary.mean_body_over_atr, None);
        assert_eq!(summary.symbols_scanned, 4);
    }

    #[test]
    fn test_csv_output() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &[signal("AAA", 9, TriggerTag::D2, 1.25)]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), CSV_HEADER.join(","));
        assert!(lines.next().unwrap().starts_with("AAA,2024-02-09,D-2,2024-02-09,10.0,10.5"));
    }

    #[test]
    fn test_csv_header_only_when_empty() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &[]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap().trim_end(), CSV_HEADER.join(","));
    }
}
