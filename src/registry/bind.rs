//! Declarative binding of resolved values onto user types.

use serde::de::DeserializeOwned;
use toml::Table;

use super::Registry;
use crate::condition::FieldLocation;
use crate::field::Value;
use crate::ConfigError;

/// One `(destination path, field location)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub destination: Vec<String>,
    pub location: FieldLocation,
}

/// An ordered binding list, built ahead of time instead of discovered by reflection.
///
/// ```
/// use dragon_fields::{Bindings, Field, FieldSet, FieldType, Registry};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Server {
///     listen: Listen,
/// }
///
/// #[derive(Deserialize)]
/// struct Listen {
///     port: u16,
/// }
///
/// let registry = Registry::builder("svc", "").build()?;
/// registry.register(
///     FieldSet::builder("http")
///         .with_field(Field::builder("port", FieldType::Int).with_default(8080).build())
///         .build(),
/// )?;
/// registry.load()?;
///
/// let bindings = Bindings::new().bind("listen.port", "http", "port");
/// let server: Server = registry.bind(&bindings)?;
/// assert_eq!(server.listen.port, 8080);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct Bindings {
    bindings: Vec<Binding>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a field to a dotted destination path such as `"db.pool.size"`.
    pub fn bind(mut self, destination: &str, field_set_key: &str, field_key: &str) -> Self {
        self.bindings.push(Binding {
            destination: destination.split('.').map(str::to_string).collect(),
            location: FieldLocation::new(field_set_key, field_key),
        });
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter()
    }
}

impl Registry {
    /// Deserializes the bound field values into `T`.
    ///
    /// Fields without a value are left out, so optional destinations stay `None`
    /// or fall back to their serde default.
    pub fn bind<T: DeserializeOwned>(&self, bindings: &Bindings) -> Result<T, ConfigError> {
        let mut table = Table::new();

        for binding in bindings.iter() {
            match self.value(&binding.location.field_set, &binding.location.field) {
                Ok(value) => merge_at_path(&mut table, &binding.destination, bind_value(&value)),
                Err(ConfigError::NoValue(_)) => {}
                Err(e) => return Err(e),
            }
        }

        toml::Value::Table(table)
            .try_into()
            .map_err(ConfigError::DeserializeError)
    }

    /// Deserializes every resolved value, nested as `field_set.field`.
    pub fn extract<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        let mut bindings = Bindings::new();
        for field_set_key in self.field_set_keys() {
            let field_keys = self
                .lock()
                .field_set(&field_set_key)
                .map(|field_set| field_set.field_keys())
                .unwrap_or_default();
            for field_key in field_keys {
                let destination = format!("{field_set_key}.{field_key}");
                bindings = bindings.bind(&destination, &field_set_key, &field_key);
            }
        }
        self.bind(&bindings)
    }
}

/// Converts a value into the TOML shape serde expects for the native type.
///
/// Durations become `{ secs, nanos }` tables and timestamps RFC 3339 strings.
fn bind_value(value: &Value) -> toml::Value {
    fn duration(d: &std::time::Duration) -> toml::Value {
        let mut table = Table::new();
        let secs = i64::try_from(d.as_secs()).unwrap_or(i64::MAX);
        table.insert("secs".into(), toml::Value::Integer(secs));
        table.insert("nanos".into(), toml::Value::Integer(i64::from(d.subsec_nanos())));
        toml::Value::Table(table)
    }

    match value {
        Value::Time(_) => toml::Value::String(value.to_string()),
        Value::Times(times) => toml::Value::Array(
            times
                .iter()
                .map(|t| toml::Value::String(Value::Time(*t).to_string()))
                .collect(),
        ),
        Value::Duration(d) => duration(d),
        Value::Durations(ds) => toml::Value::Array(ds.iter().map(duration).collect()),
        _ => value.to_toml(),
    }
}

fn merge_at_path(table: &mut Table, path: &[String], value: toml::Value) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };

    if rest.is_empty() {
        table.insert(first.clone(), value);
        return;
    }

    if !matches!(table.get(first), Some(toml::Value::Table(_))) {
        table.insert(first.clone(), toml::Value::Table(Table::new()));
    }

    if let Some(toml::Value::Table(nested)) = table.get_mut(first) {
        merge_at_path(nested, rest, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_at_path_creates_tables() {
        let mut table = Table::new();
        let path = |keys: &[&str]| keys.iter().map(|k| k.to_string()).collect::<Vec<_>>();
        merge_at_path(&mut table, &path(&["db", "pool", "size"]), toml::Value::Integer(4));
        merge_at_path(&mut table, &path(&["db", "host"]), toml::Value::String("localhost".into()));

        let db = table["db"].as_table().unwrap();
        assert_eq!(db["host"].as_str(), Some("localhost"));
        assert_eq!(db["pool"]["size"].as_integer(), Some(4));
    }

    #[test]
    fn test_bindings_split_destination() {
        let bindings = Bindings::new().bind("db.pool.size", "db", "pool_size");
        let binding = bindings.iter().next().unwrap();
        assert_eq!(binding.destination, ["db", "pool", "size"]);
        assert_eq!(binding.location, FieldLocation::new("db", "pool_size"));
    }

    #[test]
    fn test_duration_binds_as_serde_table() {
        let value = bind_value(&Value::Duration(std::time::Duration::from_millis(1500)));
        let duration: std::time::Duration = value.try_into().unwrap();
        assert_eq!(duration, std::time::Duration::from_millis(1500));
    }

    #[test]
    fn test_times_bind_as_rfc3339_strings() {
        use chrono::{TimeZone, Utc};

        let time = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let value = bind_value(&Value::Time(time));
        assert_eq!(value.as_str(), Some("2024-03-01T10:00:00Z"));

        let times: Vec<String> = bind_value(&Value::Times(vec![time, time])).try_into().unwrap();
        let parsed = chrono::DateTime::parse_from_rfc3339(&times[1]).unwrap();
        assert_eq!(parsed.with_timezone(&Utc), time);
    }
}
