//! Read-only renderings of the registry: a value snapshot and help text.

use std::fmt;
use std::sync::Arc;

use toml::Table;

use super::{Registry, APP_FIELD_SET};
use crate::condition::{FieldLocation, LoadCondition};
use crate::field::{Field, Value, SENSITIVE_VALUE};
use crate::loader::Loader;

const INDENT: &str = "\t\t";

impl Registry {
    /// A snapshot of every resolved value, one table per field-set.
    ///
    /// Fields without a value are left out. Sensitive values are replaced by
    /// [`SENSITIVE_VALUE`]; duration fields are also exported in milliseconds
    /// under `<key>_ms`.
    pub fn config_map(&self) -> Table {
        let state = self.lock();
        let mut map = Table::new();

        for key in &state.ordered {
            let Ok(field_set) = state.field_set(key) else {
                continue;
            };

            let mut table = Table::new();
            for field in field_set.fields() {
                let Some(value) = field.value() else {
                    continue;
                };

                if field.is_sensitive() {
                    let masked = toml::Value::String(SENSITIVE_VALUE.to_string());
                    table.insert(field.key().to_string(), masked);
                    continue;
                }

                if let Value::Duration(duration) = value {
                    let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
                    table.insert(format!("{}_ms", field.key()), toml::Value::Integer(millis));
                }
                table.insert(field.key().to_string(), value.to_toml());
            }

            map.insert(key.clone(), toml::Value::Table(table));
        }

        map
    }

    /// Usage text describing every registered field.
    ///
    /// Fields are sorted by location and grouped into required, conditionally
    /// required and optional sections.
    pub fn help_string(&self) -> String {
        let name = self.app_name();
        let description = self.app_description();
        let state = self.lock();

        let mut entries = Vec::new();
        for field_set in state.field_sets.values() {
            for field in field_set.fields() {
                let conditions: Vec<_> = field_set
                    .load_conditions()
                    .iter()
                    .chain(field.load_conditions())
                    .cloned()
                    .collect();
                entries.push(HelpEntry {
                    location: FieldLocation::new(field_set.key(), field.key()),
                    field,
                    conditions,
                });
            }
        }
        entries.sort_by(|a, b| a.location.cmp(&b.location));

        let mut required = Vec::new();
        let mut conditionally_required = Vec::new();
        let mut optional = Vec::new();
        for entry in &entries {
            match (entry.field.is_required(), entry.conditions.is_empty()) {
                (true, true) => required.push(entry),
                (true, false) => conditionally_required.push(entry),
                _ if entry.location.field_set == APP_FIELD_SET
                    && matches!(entry.location.field.as_str(), "name" | "description") => {}
                _ => optional.push(entry),
            }
        }

        Help {
            name: &name,
            description: &description,
            sections: [
                ("Required Configuration:", required),
                ("Conditionally Required Configuration:", conditionally_required),
                ("Optional Configuration:", optional),
            ],
            loaders: &self.loaders,
        }
        .to_string()
    }
}

struct Help<'a> {
    name: &'a str,
    description: &'a str,
    sections: [(&'static str, Vec<&'a HelpEntry<'a>>); 3],
    loaders: &'a [Box<dyn Loader>],
}

impl fmt::Display for Help<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Usage of '{}':", self.name)?;
        if !self.description.is_empty() {
            writeln!(f, "{}\n", self.description)?;
        }

        for (title, section) in &self.sections {
            if section.is_empty() {
                continue;
            }
            writeln!(f, "{title}")?;
            for entry in section {
                self.write_field(f, entry)?;
            }
        }

        Ok(())
    }
}

impl Help<'_> {
    fn write_field(&self, f: &mut fmt::Formatter<'_>, entry: &HelpEntry<'_>) -> fmt::Result {
        let field = entry.field;
        writeln!(f, "\t{} {}", entry.location, field.field_type())?;

        if !field.description().is_empty() {
            writeln!(f, "{INDENT}{}", field.description())?;
        }

        if !field.enumeration().is_empty() {
            let accepted: Vec<_> = field
                .enumeration()
                .iter()
                .map(|value| field.display_value(value))
                .collect();
            writeln!(f, "{INDENT}Accepted values: {}", accepted.join(", "))?;
        }

        if let Some(default) = field.default_value() {
            writeln!(f, "{INDENT}Default value: '{}'", field.display_value(default))?;
        }
        if field.has_default_generator() {
            writeln!(f, "{INDENT}Default value: <generated-at-run-time>")?;
        }

        for loader in self.loaders {
            let hint = loader.help_string(&entry.location.field_set, &entry.location.field);
            if !hint.is_empty() {
                writeln!(f, "{INDENT}{hint}")?;
            }
        }

        for condition in &entry.conditions {
            let dependencies = condition.field_dependencies();
            if dependencies.is_empty() {
                writeln!(f, "{INDENT}Loading depends on: <custom-load-condition-function>")?;
                continue;
            }
            let names: Vec<_> = dependencies
                .iter()
                .map(|dependency| format!("'{}'", dependency.qualify(&entry.location.field_set)))
                .collect();
            writeln!(f, "{INDENT}Loading depends on field(s): {}", names.join(", "))?;
        }

        Ok(())
    }
}

struct HelpEntry<'a> {
    location: FieldLocation,
    field: &'a Field,
    conditions: Vec<Arc<dyn LoadCondition>>,
}
