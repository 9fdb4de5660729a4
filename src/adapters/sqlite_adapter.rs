//! SQLite adapter: OHLCV rows and the saved filter store.

use crate::domain::error::FilterscanError;
use crate::domain::ohlcv::{
    format_timestamp, is_reserved_column, is_standard_column, parse_timestamp, OhlcvBar,
};
use crate::domain::saved_filter::SavedFilter;
use crate::ports::data_port::DataPort;
use crate::ports::filter_store_port::FilterStorePort;
use chrono::{NaiveDateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

/// Extra columns must not shadow a standard field or a result row key.
fn check_extra_columns(symbol: &str, extra: &BTreeMap<String, f64>) -> Result<(), FilterscanError> {
    match extra
        .keys()
        .find(|name| is_standard_column(name) || is_reserved_column(name))
    {
        Some(name) => Err(FilterscanError::Database {
            reason: format!("{symbol}: extra column name '{name}' is reserved"),
        }),
        None => Ok(()),
    }
}

fn query_error(e: rusqlite::Error) -> FilterscanError {
    FilterscanError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn bad_timestamp(raw: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        raw.len(),
        rusqlite::types::Type::Text,
        format!("invalid timestamp '{raw}'").into(),
    )
}

impl SqliteAdapter {
    pub fn open<P: AsRef<Path>>(path: P, pool_size: u32) -> Result<Self, FilterscanError> {
        let manager = SqliteConnectionManager::file(path.as_ref());
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| FilterscanError::Database {
                reason: format!("{}: {}", path.as_ref().display(), e),
            })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, FilterscanError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| FilterscanError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, FilterscanError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| FilterscanError::Database {
                reason: e.to_string(),
            })
    }

    pub fn initialize_schema(&self) -> Result<(), FilterscanError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS ohlcv (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL,
                extra TEXT,
                PRIMARY KEY (symbol, date)
            );
            CREATE INDEX IF NOT EXISTS idx_ohlcv_symbol ON ohlcv(symbol);
            CREATE TABLE IF NOT EXISTS saved_filters (
                name TEXT PRIMARY KEY,
                filter TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )
        .map_err(query_error)?;

        Ok(())
    }

    /// Extra columns are stored as a JSON object; rows without any store NULL.
    pub fn insert_bars(&self, bars: &[OhlcvBar]) -> Result<(), FilterscanError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        for bar in bars {
            check_extra_columns(&bar.symbol, &bar.extra)?;
            let extra = if bar.extra.is_empty() {
                None
            } else {
                Some(serde_json::to_string(&bar.extra)?)
            };
            tx.execute(
                "INSERT OR REPLACE INTO ohlcv (symbol, date, open, high, low, close, volume, extra)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    bar.symbol,
                    format_timestamp(&bar.date),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume,
                    extra
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        Ok(())
    }
}

impl DataPort for SqliteAdapter {
    fn fetch_ohlcv(&self, symbol: &str) -> Result<Vec<OhlcvBar>, FilterscanError> {
        let conn = self.conn()?;

        let query = "SELECT date, open, high, low, close, volume, extra
                     FROM ohlcv
                     WHERE symbol = ?1";

        let mut stmt = conn.prepare(query).map_err(query_error)?;

        let rows = stmt
            .query_map(params![symbol], |row| {
                let date_str: String = row.get(0)?;
                let date = parse_timestamp(&date_str).ok_or_else(|| bad_timestamp(&date_str))?;
                let extra: Option<String> = row.get(6)?;
                Ok((
                    OhlcvBar::new(
                        symbol,
                        date,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ),
                    extra,
                ))
            })
            .map_err(query_error)?;

        let mut bars = Vec::new();
        for row in rows {
            let (mut bar, extra) = row.map_err(query_error)?;
            if let Some(extra) = extra {
                bar.extra = serde_json::from_str::<BTreeMap<String, f64>>(&extra)?;
                check_extra_columns(symbol, &bar.extra)?;
            }
            bars.push(bar);
        }

        if bars.is_empty() {
            return Err(FilterscanError::NoData {
                symbol: symbol.to_string(),
            });
        }
        // stored text does not sort by time when midnight and intraday rows mix
        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, FilterscanError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare("SELECT DISTINCT symbol FROM ohlcv ORDER BY symbol")
            .map_err(query_error)?;

        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(query_error)?;

        rows.collect::<Result<Vec<String>, _>>().map_err(query_error)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, FilterscanError> {
        let conn = self.conn()?;

        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(
                "SELECT MIN(date), MAX(date), COUNT(*) FROM ohlcv WHERE symbol = ?1",
                params![symbol],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_error)?;

        match result {
            (Some(min_str), Some(max_str), count) if count > 0 => {
                let min = parse_timestamp(&min_str)
                    .ok_or_else(|| query_error(bad_timestamp(&min_str)))?;
                let max = parse_timestamp(&max_str)
                    .ok_or_else(|| query_error(bad_timestamp(&max_str)))?;
                Ok(Some((min, max, count as usize)))
            }
            _ => Ok(None),
        }
    }
}

impl FilterStorePort for SqliteAdapter {
    fn save_filter(&self, filter: &SavedFilter) -> Result<(), FilterscanError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO saved_filters (name, filter, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET filter = excluded.filter, updated_at = excluded.updated_at",
            params![filter.name, filter.filter_json(), Utc::now().to_rfc3339()],
        )
        .map_err(query_error)?;
        Ok(())
    }

    fn load_filter(&self, name: &str) -> Result<Option<SavedFilter>, FilterscanError> {
        let conn = self.conn()?;
        let stored: Option<String> = conn
            .query_row(
                "SELECT filter FROM saved_filters WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_error)?;

        stored
            .map(|json| SavedFilter::from_json(name, &json))
            .transpose()
    }

    fn list_filters(&self) -> Result<Vec<String>, FilterscanError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT name FROM saved_filters ORDER BY name")
            .map_err(query_error)?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(query_error)?;
        rows.collect::<Result<Vec<String>, _>>().map_err(query_error)
    }

    fn delete_filter(&self, name: &str) -> Result<bool, FilterscanError> {
        let conn = self.conn()?;
        let removed = conn
            .execute("DELETE FROM saved_filters WHERE name = ?1", params![name])
            .map_err(query_error)?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filter_parser;

    fn adapter() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
    }

    fn bar(symbol: &str, date: &str, close: f64) -> OhlcvBar {
        OhlcvBar::new(
            symbol,
            parse_timestamp(date).unwrap(),
            close - 1.0,
            close + 1.0,
            close - 2.0,
            close,
            1000.0,
        )
    }

    fn saved(name: &str, threshold: f64) -> SavedFilter {
        let doc = serde_json::json!({
            "logic": "AND",
            "conditions": [{
                "left": {"type": "column", "name": "close"},
                "operator": ">",
                "right": {"type": "constant", "value": threshold}
            }]
        });
        SavedFilter::new(name, filter_parser::parse(&doc).unwrap()).unwrap()
    }

    #[test]
    fn initialize_schema_is_idempotent() {
        let adapter = adapter();
        adapter.initialize_schema().unwrap();
    }

    #[test]
    fn fetch_ohlcv_returns_sorted_bars_with_extras() {
        let adapter = adapter();
        adapter
            .insert_bars(&[
                bar("BHP", "2024-01-02", 101.5).with_column("vwap", 101.2),
                bar("BHP", "2024-01-01", 100.5),
                bar("CBA", "2024-01-01", 150.5),
            ])
            .unwrap();

        let fetched = adapter.fetch_ohlcv("BHP").unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].symbol, "BHP");
        assert_eq!(fetched[0].date, parse_timestamp("2024-01-01").unwrap());
        assert_eq!(fetched[1].close, 101.5);
        assert_eq!(fetched[1].column("vwap"), Some(101.2));
        assert_eq!(fetched[0].column("vwap"), None);
    }

    #[test]
    fn fetch_ohlcv_orders_intraday_rows_by_time() {
        let adapter = adapter();
        adapter
            .insert_bars(&[
                bar("BHP", "2024-01-02 10:00", 2.0),
                bar("BHP", "2024-01-02", 1.0),
                bar("BHP", "2024-01-01 15:30", 0.5),
            ])
            .unwrap();

        let closes: Vec<f64> = adapter
            .fetch_ohlcv("BHP")
            .unwrap()
            .iter()
            .map(|b| b.close)
            .collect();
        assert_eq!(closes, vec![0.5, 1.0, 2.0]);
    }

    #[test]
    fn reserved_extra_columns_are_rejected() {
        let adapter = adapter();
        let result = adapter.insert_bars(&[bar("BHP", "2024-01-01", 1.0).with_column("index", 42.0)]);
        assert!(matches!(result, Err(FilterscanError::Database { .. })));

        adapter
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO ohlcv (symbol, date, open, high, low, close, volume, extra)
                 VALUES ('CBA', '2024-01-01', 1, 1, 1, 1, 1, '{\"symbol\": 3.0}')",
                [],
            )
            .unwrap();
        assert!(matches!(
            adapter.fetch_ohlcv("CBA"),
            Err(FilterscanError::Database { .. })
        ));
    }

    #[test]
    fn fetch_ohlcv_unknown_symbol_is_no_data() {
        let adapter = adapter();
        assert!(matches!(
            adapter.fetch_ohlcv("XYZ"),
            Err(FilterscanError::NoData { .. })
        ));
    }

    #[test]
    fn list_symbols_is_sorted_and_distinct() {
        let adapter = adapter();
        adapter
            .insert_bars(&[
                bar("CBA", "2024-01-01", 150.5),
                bar("BHP", "2024-01-01", 100.5),
                bar("BHP", "2024-01-02", 101.0),
            ])
            .unwrap();

        assert_eq!(adapter.list_symbols().unwrap(), vec!["BHP", "CBA"]);
    }

    #[test]
    fn get_data_range_reports_bounds() {
        let adapter = adapter();
        adapter
            .insert_bars(&[bar("BHP", "2024-01-01", 100.5), bar("BHP", "2024-01-05", 102.5)])
            .unwrap();

        let (min, max, count) = adapter.get_data_range("BHP").unwrap().unwrap();
        assert_eq!(min, parse_timestamp("2024-01-01").unwrap());
        assert_eq!(max, parse_timestamp("2024-01-05").unwrap());
        assert_eq!(count, 2);

        assert!(adapter.get_data_range("CBA").unwrap().is_none());
    }

    #[test]
    fn saved_filters_round_trip() {
        let adapter = adapter();
        let filter = saved("breakout", 100.0);
        adapter.save_filter(&filter).unwrap();

        let loaded = adapter.load_filter("breakout").unwrap().unwrap();
        assert_eq!(loaded, filter);
        assert!(adapter.load_filter("missing").unwrap().is_none());
    }

    #[test]
    fn save_filter_overwrites() {
        let adapter = adapter();
        adapter.save_filter(&saved("breakout", 100.0)).unwrap();
        adapter.save_filter(&saved("breakout", 200.0)).unwrap();

        let loaded = adapter.load_filter("breakout").unwrap().unwrap();
        assert_eq!(loaded, saved("breakout", 200.0));
        assert_eq!(adapter.list_filters().unwrap(), vec!["breakout"]);
    }

    #[test]
    fn list_and_delete_filters() {
        let adapter = adapter();
        adapter.save_filter(&saved("zeta", 1.0)).unwrap();
        adapter.save_filter(&saved("alpha", 2.0)).unwrap();

        assert_eq!(adapter.list_filters().unwrap(), vec!["alpha", "zeta"]);
        assert!(adapter.delete_filter("zeta").unwrap());
        assert!(!adapter.delete_filter("zeta").unwrap());
        assert_eq!(adapter.list_filters().unwrap(), vec!["alpha"]);
    }

    #[test]
    fn corrupt_stored_filter_fails_revalidation() {
        let adapter = adapter();
        adapter
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO saved_filters (name, filter, updated_at) VALUES ('bad', '{\"logic\":\"XOR\"}', '')",
                [],
            )
            .unwrap();

        assert!(matches!(
            adapter.load_filter("bad"),
            Err(FilterscanError::Validation(_))
        ));
    }
}
