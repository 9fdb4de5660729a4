//! Exponential Moving Average.
//!
//! Seeded with the SMA of the first n values, then
//! EMA[i] = EMA[i-1] + k * (P[i] - EMA[i-1]) with k = 2/(n+1).
//! A non-finite value carries forward to every later point.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

/// EMA values aligned with `values`; warm-up positions hold 0.0.
pub(crate) fn ema_raw_values(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![0.0; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = ema;
    for (slot, &price) in out[period..].iter_mut().zip(&values[period..]) {
        ema += k * (price - ema);
        *slot = ema;
    }
    out
}

pub fn calculate_ema(values: &[f64], period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Ema(period);
    if period == 0 {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let points = ema_raw_values(values, period)
        .into_iter()
        .enumerate()
        .map(|(i, ema)| {
            let value = IndicatorValue::Simple(ema);
            if i + 1 >= period {
                IndicatorPoint { valid: true, value }
            } else {
                IndicatorPoint::invalid(value)
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values: points,
    }
}
