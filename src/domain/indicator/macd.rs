//! MACD: the gap between a fast and a slow EMA, its own EMA (the signal)
//! and the difference of the two (the histogram).
//!
//! The signal EMA starts once the slow EMA has its seed, so the first valid
//! point sits at max(fast, slow) + signal - 2.

use crate::domain::indicator::ema::ema_raw_values;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub fn calculate_macd(
    values: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Macd {
        fast,
        slow,
        signal: signal_period,
    };
    if values.is_empty() || fast == 0 || slow == 0 || signal_period == 0 {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let line: Vec<f64> = ema_raw_values(values, fast)
        .into_iter()
        .zip(ema_raw_values(values, slow))
        .map(|(f, s)| f - s)
        .collect();

    let line_start = fast.max(slow) - 1;
    let first_valid = line_start.saturating_add(signal_period - 1);

    let mut signal = vec![0.0; values.len()];
    if line_start < values.len() {
        let smoothed = ema_raw_values(&line[line_start..], signal_period);
        signal[line_start..].copy_from_slice(&smoothed);
    }

    let points = line
        .iter()
        .zip(&signal)
        .enumerate()
        .map(|(i, (&line, &signal))| IndicatorPoint {
            valid: i >= first_valid,
            value: IndicatorValue::Macd {
                line,
                signal,
                histogram: line - signal,
            },
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values: points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    fn parts(series: &IndicatorSeries, i: usize) -> (f64, f64, f64) {
        match series.values[i].value {
            IndicatorValue::Macd {
                line,
                signal,
                histogram,
            } => (line, signal, histogram),
            _ => panic!("expected macd value"),
        }
    }

    #[test]
    fn default_warmup() {
        let series = calculate_macd(&ramp(40), DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL);
        let first = DEFAULT_SLOW + DEFAULT_SIGNAL - 2;

        assert!(series.values[..first].iter().all(|p| !p.valid));
        assert!(series.values[first..].iter().all(|p| p.valid));
    }

    #[test]
    fn histogram_is_line_minus_signal() {
        let series = calculate_macd(&ramp(40), DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL);

        for i in 33..40 {
            let (line, signal, histogram) = parts(&series, i);
            assert_relative_eq!(histogram, line - signal);
        }
    }

    #[test]
    fn line_is_fast_minus_slow() {
        let values: Vec<f64> = (1..=10).map(|i| f64::from(i) * 10.0).collect();
        let series = calculate_macd(&values, 3, 5, 2);
        let fast = ema_raw_values(&values, 3);
        let slow = ema_raw_values(&values, 5);

        for i in 4..values.len() {
            assert_relative_eq!(parts(&series, i).0, fast[i] - slow[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn signal_seeded_with_mean_of_line() {
        let series = calculate_macd(&[1.0, 3.0, 2.0, 5.0, 4.0, 7.0, 6.0, 9.0], 2, 3, 3);
        let line = |i| parts(&series, i).0;

        // line starts at index 2, the seed covers 2..=4
        let seed = (line(2) + line(3) + line(4)) / 3.0;
        assert_relative_eq!(parts(&series, 4).1, seed, epsilon = 1e-12);
        assert!(!series.values[3].valid);
        assert!(series.values[4].valid);
    }

    #[test]
    fn short_series_has_no_valid_points() {
        let series = calculate_macd(&ramp(20), DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL);
        assert_eq!(series.values.len(), 20);
        assert!(series.values.iter().all(|p| !p.valid));
    }

    #[test]
    fn zero_periods_give_empty_series() {
        let values = [100.0, 101.0, 102.0];
        assert!(calculate_macd(&values, 0, 26, 9).values.is_empty());
        assert!(calculate_macd(&values, 12, 0, 9).values.is_empty());
        assert!(calculate_macd(&values, 12, 26, 0).values.is_empty());
    }
}
