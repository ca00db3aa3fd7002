//! The registry: registration, loading, and typed access to field values.

mod bind;
mod builder;
mod export;
mod load;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

pub use bind::{Binding, Bindings};
pub use builder::{AppValue, ConfigOption, RegistryBuilder};

use crate::condition::FieldLocation;
use crate::field::{Field, FieldSet, FromValue, Value};
use crate::loader::Loader;
use crate::{ConfigError, ConfigErrors};

/// Key of the built-in field-set describing the application itself.
pub const APP_FIELD_SET: &str = "app";

/// Owns registered field-sets and resolves their values from the configured loaders.
///
/// Field-sets are registered in order; dependency targets of load conditions must be
/// registered before the sets that depend on them. [`load`](Self::load) then visits
/// field-sets in registration order, so every dependency has been resolved by the
/// time a dependent's conditions are evaluated.
///
/// ```
/// use dragon_fields::{Field, FieldSet, FieldType, MapLoader, Registry};
///
/// let registry = Registry::builder("weather", "Serves weather data")
///     .with_loader(MapLoader::new("overrides").with_value("http", "port", "9090"))
///     .build()?;
///
/// registry.register(
///     FieldSet::builder("http")
///         .with_field(Field::builder("port", FieldType::Int).with_default(8080).build())
///         .build(),
/// )?;
/// registry.load()?;
///
/// assert_eq!(registry.get_int("http", "port")?, 9090);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct Registry {
    state: Mutex<State>,
    loaders: Vec<Box<dyn Loader>>,
    warnings: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    field_sets: HashMap<String, FieldSet>,
    ordered: Vec<String>,
    pending: Vec<FieldSetGroup>,
    loaded: bool,
}

#[derive(Debug)]
struct FieldSetGroup {
    name: String,
    field_sets: Vec<FieldSet>,
}

macro_rules! typed_getters {
    ($($name:ident => $native:ty),* $(,)?) => {
        $(
            pub fn $name(
                &self,
                field_set_key: &str,
                field_key: &str,
            ) -> Result<$native, ConfigError> {
                self.get(field_set_key, field_key)
            }
        )*
    };
}

impl Registry {
    pub fn builder(
        app_name: impl Into<String>,
        app_description: impl Into<String>,
    ) -> RegistryBuilder {
        RegistryBuilder::new(app_name, app_description)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a single field-set immediately.
    pub fn register(&self, field_set: FieldSet) -> Result<(), ConfigErrors> {
        self.register_group([field_set])
    }

    /// Registers several field-sets immediately, all or nothing.
    ///
    /// If any member fails, members of this call that were already inserted are
    /// removed again. Field-sets from earlier calls are never affected.
    pub fn register_group(
        &self,
        field_sets: impl IntoIterator<Item = FieldSet>,
    ) -> Result<(), ConfigErrors> {
        self.lock().add_field_sets(field_sets.into_iter().collect())
    }

    /// Queues a field-set for registration at the start of the next [`load`](Self::load).
    pub fn add_field_set(&self, field_set: FieldSet) {
        let name = field_set.key().to_string();
        self.add_field_set_group(name, [field_set]);
    }

    /// Queues a named group of field-sets, registered all or nothing at the start of
    /// the next [`load`](Self::load).
    pub fn add_field_set_group(
        &self,
        name: impl Into<String>,
        field_sets: impl IntoIterator<Item = FieldSet>,
    ) {
        self.lock().pending.push(FieldSetGroup {
            name: name.into(),
            field_sets: field_sets.into_iter().collect(),
        });
    }

    /// Overrides a field value, bypassing every loader.
    ///
    /// The value goes through the same type, enumeration and validator checks as
    /// loaded values, and takes priority until cleared.
    pub fn set_field(
        &self,
        field_set_key: &str,
        field_key: &str,
        value: impl Into<Value>,
    ) -> Result<(), ConfigError> {
        let mut state = self.lock();
        let field = state.field_mut(field_set_key, field_key)?;
        field.set_override(field_set_key, value.into())
    }

    /// Removes an override, returning it.
    pub fn clear_field_override(
        &self,
        field_set_key: &str,
        field_key: &str,
    ) -> Result<Option<Value>, ConfigError> {
        let mut state = self.lock();
        Ok(state.field_mut(field_set_key, field_key)?.clear_override())
    }

    /// A copy of a registered field, including its resolved values.
    pub fn field(&self, field_set_key: &str, field_key: &str) -> Result<Field, ConfigError> {
        self.lock().field(field_set_key, field_key).cloned()
    }

    /// The resolved value of a field, whatever its type.
    pub fn value(&self, field_set_key: &str, field_key: &str) -> Result<Value, ConfigError> {
        self.lock().field_value(&FieldLocation::new(field_set_key, field_key)).cloned()
    }

    /// Typed access to a resolved value.
    ///
    /// Fails if the field's type is not the requested one; values are never converted.
    pub fn get<T: FromValue>(
        &self,
        field_set_key: &str,
        field_key: &str,
    ) -> Result<T, ConfigError> {
        let state = self.lock();
        let location = FieldLocation::new(field_set_key, field_key);
        let field = state.field(field_set_key, field_key)?;

        let mismatch = || ConfigError::IncorrectFieldType {
            location: location.clone(),
            requested: T::FIELD_TYPE,
            found: field.field_type(),
        };
        if field.field_type() != T::FIELD_TYPE {
            return Err(mismatch());
        }

        let value = field.value().ok_or_else(|| ConfigError::NoValue(location.clone()))?;
        T::from_value(value).ok_or_else(mismatch)
    }

    typed_getters! {
        get_string => String,
        get_strings => Vec<String>,
        get_int => i64,
        get_ints => Vec<i64>,
        get_bool => bool,
        get_bools => Vec<bool>,
        get_time => DateTime<Utc>,
        get_times => Vec<DateTime<Utc>>,
        get_duration => Duration,
        get_durations => Vec<Duration>,
    }

    pub fn app_name(&self) -> String {
        self.get_string(APP_FIELD_SET, "name").unwrap_or_default()
    }

    pub fn app_description(&self) -> String {
        self.get_string(APP_FIELD_SET, "description").unwrap_or_default()
    }

    pub fn app_version(&self) -> String {
        self.get_string(APP_FIELD_SET, "version").unwrap_or_default()
    }

    pub fn app_id(&self) -> String {
        self.get_string(APP_FIELD_SET, "id").unwrap_or_default()
    }

    /// Registered field-set keys in registration order.
    pub fn field_set_keys(&self) -> Vec<String> {
        self.lock().ordered.clone()
    }

    /// Names of the configured loaders, lowest priority first.
    pub fn loader_names(&self) -> Vec<String> {
        self.loaders.iter().map(|l| l.name().to_string()).collect()
    }

    /// Whether the last full [`load`](Self::load) succeeded.
    pub fn is_loaded(&self) -> bool {
        self.lock().loaded
    }

    /// Non-fatal problems noticed while building the registry.
    pub fn warnings(&self) -> Vec<String> {
        self.warnings.clone()
    }
}

impl State {
    fn field_set(&self, field_set_key: &str) -> Result<&FieldSet, ConfigError> {
        self.field_sets
            .get(field_set_key)
            .ok_or_else(|| ConfigError::FieldSetNotFound(field_set_key.to_string()))
    }

    fn field(&self, field_set_key: &str, field_key: &str) -> Result<&Field, ConfigError> {
        self.field_set(field_set_key)?
            .field(field_key)
            .ok_or_else(|| ConfigError::FieldNotFound(FieldLocation::new(field_set_key, field_key)))
    }

    fn field_mut(
        &mut self,
        field_set_key: &str,
        field_key: &str,
    ) -> Result<&mut Field, ConfigError> {
        self.field_sets
            .get_mut(field_set_key)
            .ok_or_else(|| ConfigError::FieldSetNotFound(field_set_key.to_string()))?
            .field_mut(field_key)
            .ok_or_else(|| ConfigError::FieldNotFound(FieldLocation::new(field_set_key, field_key)))
    }

    fn field_value(&self, location: &FieldLocation) -> Result<&Value, ConfigError> {
        self.field(&location.field_set, &location.field)?
            .value()
            .ok_or_else(|| ConfigError::NoValue(location.clone()))
    }

    fn add_field_sets(&mut self, field_sets: Vec<FieldSet>) -> Result<(), ConfigErrors> {
        let mut errors = ConfigErrors::new();
        let mut added = Vec::new();

        for field_set in field_sets {
            let key = field_set.key().to_string();
            match self.add_field_set(field_set) {
                Ok(()) => added.push(key),
                Err(e) => errors.extend(e),
            }
        }

        if !errors.is_empty() && !added.is_empty() {
            warn!(rolled_back = ?added, "rolling back field-set registration group");
            for key in &added {
                self.field_sets.remove(key);
            }
            self.ordered.retain(|key| !added.contains(key));
        }

        errors.into_result()
    }

    /// Runs the registration pipeline for one field-set.
    fn add_field_set(&mut self, mut field_set: FieldSet) -> Result<(), ConfigErrors> {
        ConfigErrors::from(field_set.validate()).into_result()?;

        if self.field_sets.contains_key(field_set.key()) {
            return Err(ConfigError::DuplicateFieldSet(field_set.key().to_string()).into());
        }

        ConfigErrors::from(field_set.initialize_field_map()).into_result()?;
        ConfigErrors::from(self.check_dependencies(&field_set)).into_result()?;
        ConfigErrors::from(field_set.generate_field_defaults()).into_result()?;
        ConfigErrors::from(field_set.validate_fields()).into_result()?;

        let key = field_set.key().to_string();
        debug!(field_set = %key, fields = field_set.field_keys().len(), "registered field-set");
        self.field_sets.insert(key.clone(), field_set);
        self.ordered.push(key);

        Ok(())
    }

    /// Checks that every load condition dependency names an existing field.
    ///
    /// Only already-registered field-sets are visible, plus the set itself for
    /// field-level conditions; forward references are rejected rather than reordered.
    fn check_dependencies(&self, field_set: &FieldSet) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let dependent = format!("field-set '{}'", field_set.key());
        for condition in field_set.load_conditions() {
            for dependency in condition.field_dependencies() {
                let found = self
                    .field_sets
                    .get(&dependency.field_set)
                    .is_some_and(|target| target.field(&dependency.field).is_some());
                if !found {
                    errors.push(ConfigError::MissingDependency {
                        dependent: dependent.clone(),
                        dependency,
                    });
                }
            }
        }

        for field in field_set.fields() {
            let dependent = format!("field-set '{}' field '{}'", field_set.key(), field.key());
            for condition in field.load_conditions() {
                for dependency in condition.field_dependencies() {
                    let dependency = dependency.qualify(field_set.key());
                    let target = if dependency.field_set == field_set.key() {
                        Some(field_set)
                    } else {
                        self.field_sets.get(&dependency.field_set)
                    };
                    if !target.is_some_and(|target| target.field(&dependency.field).is_some()) {
                        errors.push(ConfigError::MissingDependency {
                            dependent: dependent.clone(),
                            dependency,
                        });
                    }
                }
            }
        }

        errors
    }
}
