//! Population standard deviation over the last n values.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

/// Mean and population standard deviation of a window.
pub(crate) fn mean_and_stddev(window: &[f64]) -> (f64, f64) {
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

pub fn calculate_stddev(values: &[f64], period: usize) -> IndicatorSeries {
    let points = (1..=values.len())
        .map(|end| match end.checked_sub(period) {
            Some(start) if period > 0 => {
                let (_, sd) = mean_and_stddev(&values[start..end]);
                IndicatorPoint {
                    valid: sd.is_finite(),
                    value: IndicatorValue::Simple(sd),
                }
            }
            _ => IndicatorPoint::invalid(IndicatorValue::Simple(f64::NAN)),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Stddev(period),
        values: points,
    }
}
