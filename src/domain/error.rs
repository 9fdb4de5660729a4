//! Domain error types.

use crate::domain::timeframe::Timeframe;
use serde::Serialize;
use std::fmt;

/// Category of a filter-document violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationKind {
    /// Structural problem: missing/unexpected key, wrong type, bad enum value.
    Schema,
    /// Indicator parameters do not match the indicator's arity or ranges.
    Arity,
}

/// A single violation found while validating a filter document.
///
/// `path` is a JSON pointer (RFC 6901) into the offending document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{path}: {reason}")]
pub struct ValidationError {
    pub kind: ViolationKind,
    pub path: String,
    pub reason: String,
}

impl ValidationError {
    pub fn schema(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: ViolationKind::Schema,
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn arity(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: ViolationKind::Arity,
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Every violation found in a rejected filter document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(transparent)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn single(error: ValidationError) -> Self {
        Self(vec![error])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    pub fn has_path(&self, path: &str) -> bool {
        self.0.iter().any(|e| e.path == path)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid filter ({} violation", self.0.len())?;
        if self.0.len() != 1 {
            write!(f, "s")?;
        }
        write!(f, ")")?;
        for err in &self.0 {
            write!(f, "\n  {err}")?;
        }
        Ok(())
    }
}

/// Failure scoped to one symbol (or to the whole scan, for `Cancelled`).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScanError {
    #[error("{symbol}: column '{column}' not present in {timeframe} rows")]
    UnresolvedOperand {
        symbol: String,
        column: String,
        timeframe: Timeframe,
    },

    #[error("{symbol}: {timeframe} rows unavailable (base timeframe is {base})")]
    TimeframeUnavailable {
        symbol: String,
        timeframe: Timeframe,
        base: Timeframe,
    },

    #[error("{symbol}: failed to load rows: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("scan cancelled")]
    Cancelled,
}

/// Top-level error type for filterscan.
#[derive(Debug, thiserror::Error)]
pub enum FilterscanError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("saved filter not found: {name}")]
    FilterNotFound { name: String },

    #[error("invalid filter name: {reason}")]
    FilterName { reason: String },

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&FilterscanError> for std::process::ExitCode {
    fn from(err: &FilterscanError) -> Self {
        let code: u8 = match err {
            FilterscanError::Io(_) | FilterscanError::Json(_) => 1,
            FilterscanError::ConfigParse { .. }
            | FilterscanError::ConfigMissing { .. }
            | FilterscanError::ConfigInvalid { .. } => 2,
            FilterscanError::Database { .. } | FilterscanError::DatabaseQuery { .. } => 3,
            FilterscanError::Validation(_) | FilterscanError::FilterName { .. } => 4,
            FilterscanError::NoData { .. } => 5,
            FilterscanError::Scan(ScanError::Cancelled) => 7,
            FilterscanError::Scan(_) => 5,
            FilterscanError::FilterNotFound { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
