//! Named, persisted filters.

use crate::domain::error::FilterscanError;
use crate::domain::filter::FilterExpression;
use crate::domain::filter_parser;
use serde::Serialize;
use serde_json::Value;

pub const MAX_NAME_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedFilter {
    pub name: String,
    pub filter: FilterExpression,
}

impl SavedFilter {
    pub fn new(name: &str, filter: FilterExpression) -> Result<Self, FilterscanError> {
        Ok(Self {
            name: validate_name(name)?,
            filter,
        })
    }

    /// Rebuild a stored filter, re-validating its JSON.
    pub fn from_json(name: &str, filter_json: &str) -> Result<Self, FilterscanError> {
        let doc: Value = serde_json::from_str(filter_json)?;
        let filter = filter_parser::parse(&doc)?;
        Self::new(name, filter)
    }

    pub fn filter_json(&self) -> String {
        self.filter.to_json_string()
    }
}

/// Names are 1..=64 characters of ASCII letters, digits, `-`, `_` or `.`.
pub fn validate_name(name: &str) -> Result<String, FilterscanError> {
    let name = name.trim();
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(FilterscanError::FilterName {
            reason: format!("name must be 1 to {MAX_NAME_LEN} characters"),
        });
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(FilterscanError::FilterName {
            reason: format!("'{name}' contains '{bad}'; use letters, digits, '-', '_' or '.'"),
        });
    }
    Ok(name.to_string())
}
