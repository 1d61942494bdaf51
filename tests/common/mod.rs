//! Shared fixtures for the integration tests
#![allow(dead_code)]

use chrono::{Datelike, Days, NaiveDate, Weekday};
use edgescan::prelude::*;

pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

pub fn next_weekday(date: NaiveDate) -> NaiveDate {
    let mut next = date + Days::new(1);
    while matches!(next.weekday(), Weekday::Sat | Weekday::Sun) {
        next = next + Days::new(1);
    }
    next
}

/// Steady 1% daily uptrend of weekday bars, each opening at the previous
/// close. `spikes` get 3x volume and an extended high; `gaps` open `extra`
/// above the previous high.
pub fn series(n: usize, spikes: &[usize], gaps: &[(usize, f64)]) -> Vec<Bar> {
    let mut bars: Vec<Bar> = Vec::with_capacity(n);
    let mut date = start_date();
    for i in 0..n {
        let prev = bars.last().copied();
        let mut open = prev.map_or(99.0, |p| p.close);
        if let (Some(p), Some((_, extra))) = (prev, gaps.iter().find(|(d, _)| *d == i)) {
            open = p.high + extra;
        }
        let close = open * 1.01;
        let spiked = spikes.contains(&i);
        let high = close + if spiked { 2.5 } else { 0.5 };
        let low = open - 0.5;
        let volume = if spiked { 3_000_000.0 } else { 1_000_000.0 };
        bars.push(Bar::new(date, open, high, low, close, volume));
        date = next_weekday(date);
    }
    bars
}

/// The 60-day scenario: a spike on day 40 and a gap over its high on day 41
pub fn test_series() -> Vec<Bar> {
    series(60, &[40], &[(41, 1.0)])
}

/// Multiply every price by `k`. Powers of two keep every ratio bit-identical.
pub fn scaled(bars: &[Bar], k: f64) -> Vec<Bar> {
    bars.iter()
        .map(|b| Bar::new(b.date, b.open * k, b.high * k, b.low * k, b.close * k, b.volume))
        .collect()
}

/// Thresholds the synthetic uptrend is built around
pub fn params() -> ScanParameters {
    ScanParameters {
        price_min: 5.0,
        adv20_min_usd: 50_000_000.0,
        abs_lookback_days: Period::new(60).unwrap(),
        abs_exclude_days: 5,
        pos_abs_max: Ratio::new(1.0).unwrap(),
        trigger_mode: TriggerMode::D1Only,
        range_basis: RangeBasis::HighLow,
        atr_mult: 1.5,
        vol_mult: 2.0,
        d1_volume_min: None,
        slope5d_min: 3.0,
        high_ema9_mult: 1.0,
        gap_div_atr_min: 0.75,
        open_over_ema9_min: 0.9,
        d1_green_atr_min: 0.3,
        enforce_d1_above_d2: true,
        require_open_above_d1_high: true,
        display_decimals: 2,
        sort_by: SortOrder::Symbol,
    }
}
