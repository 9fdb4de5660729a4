//! Weighted Moving Average.
//!
//! WMA(n) = (1*P[i-n+1] + 2*P[i-n+2] + ... + n*P[i]) / (n*(n+1)/2)
//!
//! Weights are applied to each window directly, so a gap in the column only
//! affects the n windows that contain it.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

fn weighted_mean(window: &[f64]) -> f64 {
    let n = window.len() as f64;
    let weighted: f64 = window
        .iter()
        .zip(1..)
        .map(|(&price, weight)| price * f64::from(weight))
        .sum();
    weighted / (n * (n + 1.0) / 2.0)
}

pub fn calculate_wma(values: &[f64], period: usize) -> IndicatorSeries {
    let mut points = Vec::with_capacity(values.len());

    for end in 1..=values.len() {
        let point = match end.checked_sub(period) {
            Some(start) if period > 0 => {
                let wma = weighted_mean(&values[start..end]);
                IndicatorPoint {
                    valid: wma.is_finite(),
                    value: IndicatorValue::Simple(wma),
                }
            }
            _ => IndicatorPoint::invalid(IndicatorValue::Simple(f64::NAN)),
        };
        points.push(point);
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Wma(period),
        values: points,
    }
}
