//! Data access port trait.

use crate::domain::error::FilterscanError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDateTime;

pub trait DataPort {
    /// All rows for `symbol`, date ascending. An unknown symbol is an error.
    fn fetch_ohlcv(&self, symbol: &str) -> Result<Vec<OhlcvBar>, FilterscanError>;

    fn list_symbols(&self) -> Result<Vec<String>, FilterscanError>;

    /// First date, last date and row count, or `None` when there are no rows.
    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, FilterscanError>;
}
