//! Simple Moving Average indicator.
//!
//! SMA(n)[i] = (P[i-n+1] + ... + P[i]) / n
//! Each window is summed afresh so a NaN only affects the windows containing it.
//! Warmup: first (n-1) values are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_sma(values: &[f64], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries {
            indicator_type: IndicatorType::Sma(period),
            values: Vec::new(),
        };
    }

    let mut points = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        if i + 1 < period {
            points.push(IndicatorPoint::invalid(IndicatorValue::Simple(0.0)));
            continue;
        }
        let window = &values[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        points.push(IndicatorPoint {
            valid: true,
            value: IndicatorValue::Simple(mean),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values: points,
    }
}
