//! Bollinger Bands: a moving mean bracketed by a multiple of the
//! population standard deviation of the same window.
//!
//! The multiplier is stored in hundredths so the indicator type stays
//! hashable and usable as a cache key.

use crate::domain::indicator::stddev::mean_and_stddev;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULT_X100: u32 = 200;

fn unavailable() -> IndicatorPoint {
    IndicatorPoint::invalid(IndicatorValue::Bollinger {
        upper: f64::NAN,
        middle: f64::NAN,
        lower: f64::NAN,
    })
}

pub fn calculate_bollinger(
    values: &[f64],
    period: usize,
    stddev_mult_x100: u32,
) -> IndicatorSeries {
    let width = f64::from(stddev_mult_x100) / 100.0;

    let points = (1..=values.len())
        .map(|end| match end.checked_sub(period) {
            Some(start) if period > 0 => {
                let (middle, sd) = mean_and_stddev(&values[start..end]);
                let band = width * sd;
                IndicatorPoint {
                    valid: middle.is_finite() && sd.is_finite(),
                    value: IndicatorValue::Bollinger {
                        upper: middle + band,
                        middle,
                        lower: middle - band,
                    },
                }
            }
            _ => unavailable(),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        },
        values: points,
    }
}
