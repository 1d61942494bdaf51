//! Position of a value inside a trailing high/low window
//!
//! The window for an evaluation date `d0` covers calendar dates in
//! `(d0 - exclude - lookback, d0 - exclude]`.

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::indicators::IndicatorFrame;

/// Range statistics of one window
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowStats {
    pub low: f64,
    pub high: f64,
    /// `(value - low) / (high - low)` clamped to [0, 1]; `None` when the
    /// window is degenerate (`high <= low`) or the value is not finite.
    pub position: Option<f64>,
}

impl WindowStats {
    /// Window over a frame's lows and highs. `None` when no bar falls in
    /// the window.
    pub fn compute(
        frame: &IndicatorFrame,
        d0: NaiveDate,
        value: f64,
        lookback_days: u32,
        exclude_days: u32,
    ) -> Option<Self> {
        let (start, end) = window_bounds(&frame.dates, d0, lookback_days, exclude_days);
        Self::from_slices(&frame.low[start..end], &frame.high[start..end], value)
    }

    /// Statistics over explicit low/high slices
    pub fn from_slices(lows: &[f64], highs: &[f64], value: f64) -> Option<Self> {
        if lows.is_empty() || highs.is_empty() {
            return None;
        }
        let low = lows.iter().copied().fold(f64::INFINITY, f64::min);
        let high = highs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let position = (value.is_finite() && low.is_finite() && high.is_finite() && high > low)
            .then(|| ((value - low) / (high - low)).clamp(0.0, 1.0));
        Some(Self {
            low,
            high,
            position,
        })
    }
}

/// Index range `[start, end)` of `dates` (sorted ascending) inside the window.
pub fn window_bounds(
    dates: &[NaiveDate],
    d0: NaiveDate,
    lookback_days: u32,
    exclude_days: u32,
) -> (usize, usize) {
    let cutoff = d0
        .checked_sub_days(Days::new(exclude_days.into()))
        .unwrap_or(NaiveDate::MIN);
    let window_start = cutoff
        .checked_sub_days(Days::new(lookback_days.into()))
        .unwrap_or(NaiveDate::MIN);

    let start = dates.partition_point(|d| *d <= window_start);
    let end = dates.partition_point(|d| *d <= cutoff);
    (start, end.max(start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    /// One bar per calendar day in January, low = day, high = day + 10
    fn january() -> IndicatorFrame {
        let bars: Vec<Bar> = (1..=31)
            .map(|d| {
                let x = d as f64;
                Bar::new(date(1, d), x + 1.0, x + 10.0, x, x + 2.0, 100.0)
            })
            .collect();
        IndicatorFrame::compute(&bars)
    }

    #[test]
    fn test_bounds_strict_lower_inclusive_upper() {
        let frame = january();
        // cutoff = Jan 25, start = Jan 15 -> dates 16..=25
        let (s, e) = window_bounds(&frame.dates, date(1, 30), 10, 5);
        assert_eq!(frame.dates[s], date(1, 16));
        assert_eq!(frame.dates[e - 1], date(1, 25));
        assert_eq!(e - s, 10);
    }

    #[test]
    fn test_position_in_range() {
        let frame = january();
        // window Jan 16..=25: low 16, high 35
        let stats = WindowStats::compute(&frame, date(1, 30), 25.5, 10, 5).unwrap();
        assert_eq!(stats.low, 16.0);
        assert_eq!(stats.high, 35.0);
        assert!((stats.position.unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_position_clamped() {
        let frame = january();
        let above = WindowStats::compute(&frame, date(1, 30), 100.0, 10, 5).unwrap();
        let below = WindowStats::compute(&frame, date(1, 30), 1.0, 10, 5).unwrap();
        assert_eq!(above.position, Some(1.0));
        assert_eq!(below.position, Some(0.0));
    }

    #[test]
    fn test_empty_window() {
        let frame = january();
        // window ends before the first bar
        assert!(WindowStats::compute(&frame, date(1, 5), 10.0, 30, 10).is_none());
        // window starts after the last bar
        assert!(WindowStats::compute(&frame, date(3, 30), 10.0, 10, 5).is_none());
    }

    #[test]
    fn test_degenerate_window() {
        let stats = WindowStats::from_slices(&[5.0, 5.0], &[5.0, 5.0], 5.0).unwrap();
        assert_eq!(stats.position, None);
        let stats = WindowStats::from_slices(&[4.0], &[6.0], f64::NAN).unwrap();
        assert_eq!(stats.position, None);
    }
}
