//! Timeframes and resampling of finer rows into coarser ones.
//!
//! Aggregated rows are stamped with the date of the last source row in their
//! group, so an as-of lookup from a finer series never sees a bar that closes
//! after the lookup time.

use crate::domain::ohlcv::OhlcvBar;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered from finest to coarsest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Intraday,
    #[default]
    Daily,
    Weekly,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::Intraday, Timeframe::Daily, Timeframe::Weekly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Intraday => "intraday",
            Timeframe::Daily => "daily",
            Timeframe::Weekly => "weekly",
        }
    }

    /// Whether rows of this timeframe can be built by resampling `base` rows.
    pub fn derivable_from(&self, base: Timeframe) -> bool {
        *self >= base
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "intraday" => Ok(Timeframe::Intraday),
            "daily" => Ok(Timeframe::Daily),
            "weekly" => Ok(Timeframe::Weekly),
            other => Err(format!(
                "unknown timeframe '{other}', expected daily, weekly or intraday"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupKey {
    Row(usize),
    Day(NaiveDate),
    IsoWeek(i32, u32),
}

fn group_key(index: usize, bar: &OhlcvBar, target: Timeframe) -> GroupKey {
    match target {
        Timeframe::Intraday => GroupKey::Row(index),
        Timeframe::Daily => GroupKey::Day(bar.date.date()),
        Timeframe::Weekly => {
            let week = bar.date.date().iso_week();
            GroupKey::IsoWeek(week.year(), week.week())
        }
    }
}

/// Aggregate date-ascending rows into `target` bars.
///
/// open = first, high = max, low = min, close = last, volume = sum; extra
/// columns keep their last observed value within the group.
pub fn resample(rows: &[OhlcvBar], target: Timeframe) -> Vec<OhlcvBar> {
    let mut out: Vec<OhlcvBar> = Vec::new();
    let mut current: Option<GroupKey> = None;

    for (i, bar) in rows.iter().enumerate() {
        let key = group_key(i, bar, target);
        match out.last_mut() {
            Some(agg) if current == Some(key) => {
                agg.date = bar.date;
                agg.high = agg.high.max(bar.high);
                agg.low = agg.low.min(bar.low);
                agg.close = bar.close;
                agg.volume += bar.volume;
                for (name, value) in &bar.extra {
                    agg.extra.insert(name.clone(), *value);
                }
            }
            _ => {
                out.push(bar.clone());
                current = Some(key);
            }
        }
    }

    out
}
