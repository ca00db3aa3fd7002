//! TOML file value source.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use toml::{Table, Value};

use super::Loader;
use crate::ConfigError;

/// A TOML file to read, and whether its absence is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSource {
    pub path: PathBuf,
    pub required: bool,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>, required: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            required,
        }
    }
}

/// Reads field values from TOML files.
///
/// Each field-set is a table and each field a key within it:
///
/// ```toml
/// [db]
/// host = "localhost"
/// port = 5432
/// replicas = ["a", "b"]
/// ```
///
/// Files are read once, when the loader is created, and merged in order, with later
/// files overriding earlier ones. Nested tables are merged recursively. Values are
/// handed to fields as raw strings; arrays are joined with `,`.
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    table: Table,
}

impl FileLoader {
    /// Loads and merges the given files.
    ///
    /// Required files that don't exist cause an error; optional files that don't
    /// exist are silently skipped.
    pub fn from_sources(
        sources: impl IntoIterator<Item = FileSource>,
    ) -> Result<Self, ConfigError> {
        let mut table = Table::new();

        for source in sources {
            if let Some(overlay) = load_config_file(&source.path, source.required)? {
                tracing::debug!(path = %source.path.display(), "loaded config file");
                deep_merge(&mut table, overlay);
            }
        }

        Ok(Self { table })
    }

    pub fn from_table(table: Table) -> Self {
        Self { table }
    }
}

impl Loader for FileLoader {
    fn name(&self) -> &str {
        "file"
    }

    fn get_map(&self, field_set_key: &str, field_keys: &[String]) -> HashMap<String, String> {
        let Some(field_set) = self.table.get(field_set_key).and_then(Value::as_table) else {
            return HashMap::new();
        };

        field_keys
            .iter()
            .filter_map(|key| {
                let raw = raw_string(field_set.get(key)?)?;
                Some((key.clone(), raw))
            })
            .collect()
    }
}

/// Converts a TOML value back to the raw string form fields parse.
fn raw_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Datetime(dt) => Some(dt.to_string()),
        Value::Array(items) => items
            .iter()
            .map(raw_string)
            .collect::<Option<Vec<_>>>()
            .map(|items| items.join(",")),
        Value::Table(_) => None,
    }
}

/// Loads and parses a TOML config file.
///
/// Returns `Ok(None)` if the file doesn't exist and `required` is false.
fn load_config_file(path: &Path, required: bool) -> Result<Option<Table>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let table = toml::from_str(&contents).map_err(|e| ConfigError::FileParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
            Ok(Some(table))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if required {
                Err(ConfigError::FileNotFound(path.to_path_buf()))
            } else {
                Ok(None)
            }
        }
        Err(e) => Err(ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn deep_merge(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(base_table)), Value::Table(overlay_table)) => {
                deep_merge(base_table, overlay_table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_file_loader_reads_field_set_table() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[db]\nhost = \"localhost\"\nport = 5432\nreplicas = [\"a\", \"b\"]\ndebug = true\n\
             [db.pool]\nsize = 4"
        )
        .unwrap();

        let loader = FileLoader::from_sources([FileSource::new(file.path(), true)]).unwrap();
        let values = loader.get_map(
            "db",
            &keys(&["host", "port", "replicas", "debug", "pool", "missing"]),
        );

        assert_eq!(values.len(), 4);
        assert_eq!(values["host"], "localhost");
        assert_eq!(values["port"], "5432");
        assert_eq!(values["replicas"], "a,b");
        assert_eq!(values["debug"], "true");
        assert!(loader.get_map("cache", &keys(&["host"])).is_empty());
    }

    #[test]
    fn test_later_files_override_earlier() {
        let mut base = NamedTempFile::new().unwrap();
        writeln!(base, "[db]\nhost = \"localhost\"\nport = 5432").unwrap();
        let mut local = NamedTempFile::new().unwrap();
        writeln!(local, "[db]\nport = 6543").unwrap();

        let loader = FileLoader::from_sources([
            FileSource::new(base.path(), true),
            FileSource::new(local.path(), false),
        ])
        .unwrap();
        let values = loader.get_map("db", &keys(&["host", "port"]));

        assert_eq!(values["host"], "localhost");
        assert_eq!(values["port"], "6543");
    }

    #[test]
    fn test_file_loader_required_missing() {
        let result =
            FileLoader::from_sources([FileSource::new("/nonexistent/path/config.toml", true)]);
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_file_loader_optional_missing() {
        let source = FileSource::new("/nonexistent/path/config.toml", false);
        let loader = FileLoader::from_sources([source]).unwrap();
        assert!(loader.get_map("db", &keys(&["host"])).is_empty());
    }

    #[test]
    fn test_file_loader_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[db\nhost = ").unwrap();

        let result = FileLoader::from_sources([FileSource::new(file.path(), true)]);
        assert!(matches!(result, Err(ConfigError::FileParseError { .. })));
    }
}
