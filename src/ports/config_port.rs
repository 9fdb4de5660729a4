//! Configuration access port.
//!
//! Adapters supply raw string lookups; the typed getters parse on top of
//! them and report values that do not parse instead of falling back.

pub trait ConfigPort {
    /// Trimmed value of `key`, or `None` when absent or blank.
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    fn get_string_or(&self, section: &str, key: &str, default: &str) -> String {
        self.get_string(section, key)
            .unwrap_or_else(|| default.to_string())
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> Result<i64, String> {
        match self.get_string(section, key) {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|_| format!("'{raw}' is not an integer")),
        }
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> Result<bool, String> {
        match self.get_string(section, key) {
            None => Ok(default),
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(format!("'{raw}' is not a boolean")),
            },
        }
    }
}
