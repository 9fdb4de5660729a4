//! OHLCV row representation.
//!
//! A row carries the five standard fields plus any extra numeric columns the
//! data source provided (e.g. `adj_close`, `vwap`).

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::BTreeMap;

pub const STANDARD_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// Names taken by scan result rows; no extra column may use them.
pub const RESERVED_COLUMNS: [&str; 4] = ["date", "symbol", "index", "explanation"];

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub symbol: String,
    pub date: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub extra: BTreeMap<String, f64>,
}

impl OhlcvBar {
    pub fn new(
        symbol: impl Into<String>,
        date: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            date,
            open,
            high,
            low,
            close,
            volume,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, value: f64) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// Value of a named column on this row, standard or extra.
    pub fn column(&self, name: &str) -> Option<f64> {
        match name {
            "open" => Some(self.open),
            "high" => Some(self.high),
            "low" => Some(self.low),
            "close" => Some(self.close),
            "volume" => Some(self.volume),
            other => self.extra.get(other).copied(),
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        is_standard_column(name) || self.extra.contains_key(name)
    }
}

pub fn is_standard_column(name: &str) -> bool {
    STANDARD_COLUMNS.contains(&name)
}

pub fn is_reserved_column(name: &str) -> bool {
    RESERVED_COLUMNS.contains(&name)
}

/// Extract one column as a dense series; rows lacking the column yield NaN.
pub fn column_values(rows: &[OhlcvBar], name: &str) -> Vec<f64> {
    rows.iter()
        .map(|r| r.column(name).unwrap_or(f64::NAN))
        .collect()
}

/// Parse `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD HH:MM` or the `T`-separated forms.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// Like [`parse_timestamp`], but a bare date means the end of that day.
pub fn parse_range_end(s: &str) -> Option<NaiveDateTime> {
    if let Ok(d) = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
        return d.and_hms_opt(23, 59, 59);
    }
    parse_timestamp(s)
}

/// Midnight timestamps print as a bare date.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    if ts.time() == NaiveTime::MIN {
        ts.format("%Y-%m-%d").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

pub fn serialize_timestamp<S>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&format_timestamp(ts))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> OhlcvBar {
        OhlcvBar::new(
            "BHP",
            parse_timestamp("2024-01-15").unwrap(),
            100.0,
            110.0,
            90.0,
            105.0,
            50_000.0,
        )
        .with_column("vwap", 101.5)
    }

    #[test]
    fn column_reads_standard_fields() {
        let bar = sample_bar();
        assert_eq!(bar.column("open"), Some(100.0));
        assert_eq!(bar.column("high"), Some(110.0));
        assert_eq!(bar.column("low"), Some(90.0));
        assert_eq!(bar.column("close"), Some(105.0));
        assert_eq!(bar.column("volume"), Some(50_000.0));
    }

    #[test]
    fn column_reads_extra_fields() {
        let bar = sample_bar();
        assert_eq!(bar.column("vwap"), Some(101.5));
        assert_eq!(bar.column("adj_close"), None);
        assert!(bar.has_column("vwap"));
        assert!(!bar.has_column("Close"));
    }

    #[test]
    fn column_values_fills_missing_with_nan() {
        let rows = vec![sample_bar(), sample_bar().with_column("vwap", 102.0), {
            let mut b = sample_bar();
            b.extra.clear();
            b
        }];
        let values = column_values(&rows, "vwap");
        assert_eq!(values[0], 101.5);
        assert_eq!(values[1], 102.0);
        assert!(values[2].is_nan());
    }

    #[test]
    fn parse_timestamp_formats() {
        let d = parse_timestamp("2024-03-01").unwrap();
        assert_eq!(d.time(), NaiveTime::MIN);

        let t = parse_timestamp("2024-03-01 09:30").unwrap();
        assert_eq!(t.format("%H:%M").to_string(), "09:30");

        let t = parse_timestamp("2024-03-01T16:00:00").unwrap();
        assert_eq!(t.format("%H:%M:%S").to_string(), "16:00:00");

        assert!(parse_timestamp("01/03/2024").is_none());
    }

    #[test]
    fn parse_range_end_extends_to_end_of_day() {
        let end = parse_range_end("2024-03-01").unwrap();
        assert_eq!(end.format("%H:%M:%S").to_string(), "23:59:59");
        let exact = parse_range_end("2024-03-01 10:00:00").unwrap();
        assert_eq!(exact.format("%H:%M:%S").to_string(), "10:00:00");
    }

    #[test]
    fn format_timestamp_drops_midnight() {
        assert_eq!(
            format_timestamp(&parse_timestamp("2024-01-15").unwrap()),
            "2024-01-15"
        );
        assert_eq!(
            format_timestamp(&parse_timestamp("2024-01-15 14:05:00").unwrap()),
            "2024-01-15 14:05:00"
        );
    }
}
