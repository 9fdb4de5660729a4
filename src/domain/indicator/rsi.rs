//! Relative Strength Index with Wilder smoothing.
//!
//! The first averages are plain means of the first n gains and losses;
//! after that each average moves by (avg * (n-1) + x) / n.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss), or 100 when there are no
//! losses. A gap in the input makes every later point NaN.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_PERIOD: usize = 14;

/// Split a price change into (gain, loss). A NaN change lands in the gain
/// so it reaches the smoothed average.
fn split_change(change: f64) -> (f64, f64) {
    if change < 0.0 {
        (0.0, -change)
    } else if change > 0.0 || change.is_nan() {
        (change, 0.0)
    } else {
        (0.0, 0.0)
    }
}

fn strength_index(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain.is_nan() || avg_loss.is_nan() {
        f64::NAN
    } else if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

pub fn calculate_rsi(values: &[f64], period: usize) -> IndicatorSeries {
    let warmup = || IndicatorPoint::invalid(IndicatorValue::Simple(f64::NAN));
    let mut points: Vec<IndicatorPoint> = values.iter().map(|_| warmup()).collect();

    if period > 0 && values.len() > period {
        let moves: Vec<(f64, f64)> = values
            .windows(2)
            .map(|pair| split_change(pair[1] - pair[0]))
            .collect();

        let n = period as f64;
        let (seed_gain, seed_loss) = moves[..period]
            .iter()
            .fold((0.0, 0.0), |(g, l), &(gain, loss)| (g + gain, l + loss));
        let mut avg_gain = seed_gain / n;
        let mut avg_loss = seed_loss / n;
        points[period] = IndicatorPoint {
            valid: true,
            value: IndicatorValue::Simple(strength_index(avg_gain, avg_loss)),
        };

        // moves[i] is the change ending at values[i + 1]
        for (i, &(gain, loss)) in moves.iter().enumerate().skip(period) {
            avg_gain = (avg_gain * (n - 1.0) + gain) / n;
            avg_loss = (avg_loss * (n - 1.0) + loss) / n;
            points[i + 1] = IndicatorPoint {
                valid: true,
                value: IndicatorValue::Simple(strength_index(avg_gain, avg_loss)),
            };
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values: points,
    }
}
