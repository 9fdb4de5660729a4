//! Scan request document.
//!
//! `{ "filter": {...}, "date_range"?: [start, end], "order"?: "asc"|"desc", "symbols"?: [...] }`

use crate::domain::error::{ValidationError, ValidationErrors};
use crate::domain::filter::FilterExpression;
use crate::domain::filter_parser;
use crate::domain::ohlcv::{parse_range_end, parse_timestamp};
use crate::domain::scan::{DateRange, ScanOptions, SortOrder};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanRequest {
    pub filter: Value,
    #[serde(default)]
    pub date_range: Option<[String; 2]>,
    #[serde(default)]
    pub order: Option<SortOrder>,
    #[serde(default)]
    pub symbols: Option<Vec<String>>,
}

impl ScanRequest {
    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    /// Validate the embedded filter. Violation paths are rooted at the request.
    pub fn filter(&self) -> Result<FilterExpression, ValidationErrors> {
        filter_parser::parse(&self.filter).map_err(|errors| {
            ValidationErrors(
                errors
                    .0
                    .into_iter()
                    .map(|mut e| {
                        e.path = format!("/filter{}", e.path);
                        e
                    })
                    .collect(),
            )
        })
    }

    /// Scan options for this request; `default_order` applies when the request
    /// does not name one.
    pub fn options(&self, default_order: SortOrder) -> Result<ScanOptions, ValidationErrors> {
        let date_range = match &self.date_range {
            None => None,
            Some([start, end]) => Some(parse_date_range(start, end)?),
        };
        Ok(ScanOptions {
            order: self.order.unwrap_or(default_order),
            date_range,
            explain: false,
        })
    }

    /// Requested symbols, uppercased.
    pub fn symbols(&self) -> Option<Vec<String>> {
        self.symbols
            .as_ref()
            .map(|list| list.iter().map(|s| s.trim().to_uppercase()).collect())
    }
}

/// Parse inclusive bounds. A bare end date covers that whole day.
pub fn parse_date_range(start: &str, end: &str) -> Result<DateRange, ValidationErrors> {
    parse_bounds(Some(start), Some(end))
}

/// Like [`parse_date_range`], but either side may be open.
pub fn parse_bounds(start: Option<&str>, end: Option<&str>) -> Result<DateRange, ValidationErrors> {
    let mut errors = Vec::new();
    let start_ts = start.and_then(|s| {
        let ts = parse_timestamp(s);
        if ts.is_none() {
            errors.push(ValidationError::schema(
                "/date_range/0",
                format!("invalid date '{s}', expected YYYY-MM-DD"),
            ));
        }
        ts
    });
    let end_ts = end.and_then(|s| {
        let ts = parse_range_end(s);
        if ts.is_none() {
            errors.push(ValidationError::schema(
                "/date_range/1",
                format!("invalid date '{s}', expected YYYY-MM-DD"),
            ));
        }
        ts
    });
    if matches!((start_ts, end_ts), (Some(s), Some(e)) if s > e) {
        errors.push(ValidationError::schema(
            "/date_range",
            "start must not be after end",
        ));
    }
    if !errors.is_empty() {
        return Err(ValidationErrors(errors));
    }
    Ok(DateRange {
        start: start_ts,
        end: end_ts,
    })
}
