//! Rate of Change: percentage move over the last `n` values.
//!
//! ROC(n)[i] = (P[i] / P[i-n] - 1) * 100. Defined from index n onward.
//! A zero or non-finite base has no meaningful percentage and yields an
//! unavailable point.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_PERIOD: usize = 12;

pub fn calculate_roc(values: &[f64], period: usize) -> IndicatorSeries {
    let points = values
        .iter()
        .enumerate()
        .map(|(i, &current)| {
            let base = i.checked_sub(period).map(|j| values[j]);
            match base {
                Some(base) if period > 0 && base != 0.0 && base.is_finite() => {
                    let change = (current / base - 1.0) * 100.0;
                    IndicatorPoint {
                        valid: change.is_finite(),
                        value: IndicatorValue::Simple(change),
                    }
                }
                _ => IndicatorPoint::invalid(IndicatorValue::Simple(f64::NAN)),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Roc(period),
        values: points,
    }
}
