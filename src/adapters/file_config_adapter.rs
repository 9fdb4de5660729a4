//! INI file configuration adapter.

use crate::domain::error::FilterscanError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

/// Section and key names are case-insensitive; values are kept verbatim
/// apart from surrounding whitespace.
pub struct FileConfigAdapter {
    ini: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FilterscanError> {
        let path = path.as_ref();
        let mut ini = Ini::new();
        match ini.load(path) {
            Ok(_) => Ok(Self { ini }),
            Err(reason) => Err(FilterscanError::ConfigParse {
                file: path.display().to_string(),
                reason,
            }),
        }
    }

    pub fn from_string(content: &str) -> Result<Self, FilterscanError> {
        let mut ini = Ini::new();
        match ini.read(content.to_owned()) {
            Ok(_) => Ok(Self { ini }),
            Err(reason) => Err(FilterscanError::ConfigParse {
                file: "<inline>".to_owned(),
                reason,
            }),
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        let raw = self.ini.get(section, key)?;
        let value = raw.trim();
        (!value.is_empty()).then(|| value.to_owned())
    }
}
