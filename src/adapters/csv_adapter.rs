//! CSV file data adapter.
//!
//! One `{SYMBOL}.csv` per symbol. Columns are matched by header name, so
//! files may order them freely and carry extra numeric columns.

use crate::domain::error::FilterscanError;
use crate::domain::ohlcv::{is_reserved_column, is_standard_column, parse_timestamp, OhlcvBar};
use crate::ports::data_port::DataPort;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const REQUIRED: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

/// Header positions resolved once per file.
struct Layout {
    required: [usize; 6],
    extra: Vec<(usize, String)>,
}

impl Layout {
    fn from_headers(headers: &csv::StringRecord, path: &str) -> Result<Self, FilterscanError> {
        let names: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();

        let mut required = [0usize; 6];
        for (slot, column) in required.iter_mut().zip(REQUIRED) {
            *slot = names
                .iter()
                .position(|n| n == column)
                .ok_or_else(|| FilterscanError::Database {
                    reason: format!("{path}: missing {column} column"),
                })?;
        }

        let mut extra = Vec::new();
        for (i, name) in names.iter().enumerate() {
            if name.is_empty() || i == required[0] || is_standard_column(name) {
                continue;
            }
            if is_reserved_column(name) {
                return Err(FilterscanError::Database {
                    reason: format!("{path}: column name '{name}' is reserved"),
                });
            }
            extra.push((i, name.clone()));
        }

        Ok(Self { required, extra })
    }
}

fn parse_field(record: &csv::StringRecord, idx: usize, column: &str) -> Result<f64, FilterscanError> {
    let raw = record.get(idx).unwrap_or("").trim();
    raw.parse().map_err(|_| FilterscanError::Database {
        reason: format!("invalid {column} value '{raw}'"),
    })
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// `{symbol}.csv` under the base directory, matching the file name
    /// without regard to case.
    fn csv_path(&self, symbol: &str) -> Option<PathBuf> {
        let exact = self.base_path.join(format!("{symbol}.csv"));
        if exact.is_file() {
            return Some(exact);
        }
        fs::read_dir(&self.base_path)
            .ok()?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| is_csv(path) && path.is_file())
            .find(|path| {
                path.file_stem()
                    .is_some_and(|stem| stem.to_string_lossy().eq_ignore_ascii_case(symbol))
            })
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(&self, symbol: &str) -> Result<Vec<OhlcvBar>, FilterscanError> {
        let Some(path) = self.csv_path(symbol) else {
            return Err(FilterscanError::NoData {
                symbol: symbol.to_string(),
            });
        };
        let display = path.display().to_string();
        let content = fs::read_to_string(&path).map_err(|e| FilterscanError::Database {
            reason: format!("failed to read {display}: {e}"),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| FilterscanError::Database {
            reason: format!("{display}: CSV header error: {e}"),
        })?;
        let layout = Layout::from_headers(headers, &display)?;
        let [date_idx, open_idx, high_idx, low_idx, close_idx, volume_idx] = layout.required;

        let mut bars = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| FilterscanError::Database {
                reason: format!("{display}: CSV parse error: {e}"),
            })?;
            // header is line 1
            let line = line + 2;

            let date_str = record.get(date_idx).unwrap_or("");
            let date = parse_timestamp(date_str).ok_or_else(|| FilterscanError::Database {
                reason: format!("{display}:{line}: invalid date '{date_str}'"),
            })?;

            let field = |idx: usize, column: &str| {
                parse_field(&record, idx, column).map_err(|e| match e {
                    FilterscanError::Database { reason } => FilterscanError::Database {
                        reason: format!("{display}:{line}: {reason}"),
                    },
                    other => other,
                })
            };

            let mut bar = OhlcvBar::new(
                symbol,
                date,
                field(open_idx, "open")?,
                field(high_idx, "high")?,
                field(low_idx, "low")?,
                field(close_idx, "close")?,
                field(volume_idx, "volume")?,
            );

            let mut extra = BTreeMap::new();
            for (idx, name) in &layout.extra {
                let raw = record.get(*idx).unwrap_or("").trim();
                if raw.is_empty() {
                    continue;
                }
                extra.insert(name.clone(), field(*idx, name.as_str())?);
            }
            bar.extra = extra;
            bars.push(bar);
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, FilterscanError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| FilterscanError::Database {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| FilterscanError::Database {
                reason: format!("directory entry error: {e}"),
            })?;
            let path = entry.path();
            if !is_csv(&path) {
                continue;
            }
            if let Some(stem) = path.file_stem() {
                symbols.push(stem.to_string_lossy().to_uppercase());
            }
        }

        // symbols are matched case-insensitively, so bhp.csv and BHP.csv are one
        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, FilterscanError> {
        let bars = self.fetch_ohlcv(symbol)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, bars.len())),
            _ => None,
        })
    }
}
