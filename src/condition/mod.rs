//! Load conditions: predicates gating whether a field or field-set is loaded.
//!
//! A condition declares the fields it depends on. Before evaluating it, the
//! registry resolves each dependency's current value and injects it into a
//! [`ConditionValues`] cache; the condition reads only from that cache and never
//! looks values up in the registry itself. This keeps conditions testable in
//! isolation by building a cache by hand:
//!
//! ```
//! use dragon_fields::{Condition, ConditionValues, FieldLocation, LoadCondition, Value};
//!
//! let enabled = FieldLocation::new("app", "enabled");
//! let condition = Condition::builder(|values| {
//!     Ok(values.get_bool("app", "enabled")?.unwrap_or(false))
//! })
//! .with_field_dependency(enabled.clone())
//! .build();
//!
//! let mut values = ConditionValues::new();
//! values.set_field_values([(enabled, Value::Bool(true))]);
//! assert!(condition.load(&values).unwrap());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::BoxError;
use crate::field::{FromValue, Value};
use crate::ConfigError;

/// Addresses a field by field-set key and field key.
///
/// An empty field-set key in a field-level condition refers to the field's own set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldLocation {
    pub field_set: String,
    pub field: String,
}

impl FieldLocation {
    pub fn new(field_set: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            field_set: field_set.into(),
            field: field.into(),
        }
    }

    /// A location relative to the field-set of the field owning the condition.
    pub fn local(field: impl Into<String>) -> Self {
        Self::new("", field)
    }

    pub fn is_local(&self) -> bool {
        self.field_set.is_empty()
    }

    /// Fills in `field_set` when this location is local.
    pub fn qualify(&self, field_set: &str) -> Self {
        if self.is_local() {
            Self::new(field_set, &self.field)
        } else {
            self.clone()
        }
    }
}

impl fmt::Display for FieldLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_local() {
            f.write_str(&self.field)
        } else {
            write!(f, "{}.{}", self.field_set, self.field)
        }
    }
}

/// Dependency values injected ahead of condition evaluation.
#[derive(Debug, Clone, Default)]
pub struct ConditionValues {
    values: HashMap<FieldLocation, Value>,
}

macro_rules! typed_lookups {
    ($($name:ident => $native:ty),* $(,)?) => {
        $(
            pub fn $name(
                &self,
                field_set: &str,
                field: &str,
            ) -> Result<Option<$native>, ConfigError> {
                self.get(field_set, field)
            }
        )*
    };
}

impl ConditionValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores dependency values, replacing earlier values for the same locations.
    pub fn set_field_values(&mut self, values: impl IntoIterator<Item = (FieldLocation, Value)>) {
        self.values.extend(values);
    }

    pub fn get_field_value(&self, field_set: &str, field: &str) -> Option<&Value> {
        self.values.get(&FieldLocation::new(field_set, field))
    }

    /// Returns a copy of every injected value.
    pub fn field_dependencies(&self) -> HashMap<FieldLocation, Value> {
        self.values.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Typed lookup. `Ok(None)` when the value was not injected; an error when
    /// it holds a different type.
    pub fn get<T: FromValue>(
        &self,
        field_set: &str,
        field: &str,
    ) -> Result<Option<T>, ConfigError> {
        let Some(value) = self.get_field_value(field_set, field) else {
            return Ok(None);
        };
        T::from_value(value)
            .map(Some)
            .ok_or_else(|| ConfigError::IncorrectFieldType {
                location: FieldLocation::new(field_set, field),
                requested: T::FIELD_TYPE,
                found: value.field_type(),
            })
    }

    typed_lookups! {
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
}

/// A predicate deciding whether a field or field-set is loaded.
///
/// A condition with no dependencies is evaluated with an empty cache, which makes
/// it usable as a static gate over anything outside the field model.
pub trait LoadCondition: fmt::Debug + Send + Sync {
    /// The fields whose values must be injected before [`load`](Self::load) runs.
    fn field_dependencies(&self) -> Vec<FieldLocation>;

    /// Evaluates the gate against the injected values.
    fn load(&self, values: &ConditionValues) -> Result<bool, BoxError>;
}

type LoadFn = Arc<dyn Fn(&ConditionValues) -> Result<bool, BoxError> + Send + Sync>;

/// A closure-backed condition with an explicit dependency list.
#[derive(Clone)]
pub struct Condition {
    load_fn: LoadFn,
    dependencies: Vec<FieldLocation>,
}

impl Condition {
    /// A condition without dependencies.
    pub fn new<F>(load_fn: F) -> Self
    where
        F: Fn(&ConditionValues) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        Self {
            load_fn: Arc::new(load_fn),
            dependencies: Vec::new(),
        }
    }

    pub fn builder<F>(load_fn: F) -> ConditionBuilder
    where
        F: Fn(&ConditionValues) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        ConditionBuilder {
            condition: Self::new(load_fn),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

impl LoadCondition for Condition {
    fn field_dependencies(&self) -> Vec<FieldLocation> {
        self.dependencies.clone()
    }

    fn load(&self, values: &ConditionValues) -> Result<bool, BoxError> {
        (self.load_fn)(values)
    }
}

#[derive(Debug)]
#[must_use = "builders do nothing until .build() is called"]
pub struct ConditionBuilder {
    condition: Condition,
}

impl ConditionBuilder {
    pub fn with_field_dependency(mut self, location: FieldLocation) -> Self {
        self.condition.dependencies.push(location);
        self
    }

    pub fn with_field_dependencies(
        mut self,
        locations: impl IntoIterator<Item = FieldLocation>,
    ) -> Self {
        self.condition.dependencies.extend(locations);
        self
    }

    /// Adds dependencies on several fields of one field-set.
    pub fn with_field_set_dependencies<K: Into<String>>(
        mut self,
        field_set: &str,
        fields: impl IntoIterator<Item = K>,
    ) -> Self {
        self.condition
            .dependencies
            .extend(fields.into_iter().map(|f| FieldLocation::new(field_set, f)));
        self
    }

    pub fn build(self) -> Condition {
        self.condition
    }
}

type PredicateFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A condition over the value of a single field.
#[derive(Clone)]
pub struct FieldCondition {
    location: FieldLocation,
    predicate: PredicateFn,
}

impl FieldCondition {
    pub fn new<F>(location: FieldLocation, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self {
            location,
            predicate: Arc::new(predicate),
        }
    }

    /// Loads when the field holds the given value.
    pub fn equals(location: FieldLocation, expected: impl Into<Value>) -> Self {
        let expected = expected.into();
        Self::new(location, move |value| *value == expected)
    }
}

impl fmt::Debug for FieldCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldCondition")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl LoadCondition for FieldCondition {
    fn field_dependencies(&self) -> Vec<FieldLocation> {
        vec![self.location.clone()]
    }

    fn load(&self, values: &ConditionValues) -> Result<bool, BoxError> {
        let value = values
            .get_field_value(&self.location.field_set, &self.location.field)
            .ok_or_else(|| format!("no value injected for field '{}'", self.location))?;
        Ok((self.predicate)(value))
    }
}
