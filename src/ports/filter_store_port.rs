//! Saved filter storage port trait.

use crate::domain::error::FilterscanError;
use crate::domain::saved_filter::SavedFilter;

pub trait FilterStorePort {
    /// Insert or overwrite the filter stored under `filter.name`.
    fn save_filter(&self, filter: &SavedFilter) -> Result<(), FilterscanError>;

    fn load_filter(&self, name: &str) -> Result<Option<SavedFilter>, FilterscanError>;

    /// Stored names, sorted.
    fn list_filters(&self) -> Result<Vec<String>, FilterscanError>;

    /// Returns whether a filter was removed.
    fn delete_filter(&self, name: &str) -> Result<bool, FilterscanError>;
}
