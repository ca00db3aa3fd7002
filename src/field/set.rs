use std::collections::HashMap;
use std::sync::Arc;

use super::Field;
use crate::condition::{FieldLocation, LoadCondition};
use crate::ConfigError;

/// A named, ordered group of fields sharing a namespace and an optional load gate.
///
/// Field descriptors are held in a list until the set is registered; registration
/// moves them into a lookup map keyed by field key, and from then on fields are only
/// reachable through the set.
#[derive(Debug, Clone)]
pub struct FieldSet {
    key: String,
    fields: Vec<Field>,
    field_map: HashMap<String, Field>,
    field_order: Vec<String>,
    load_conditions: Vec<Arc<dyn LoadCondition>>,
}

impl FieldSet {
    pub fn new(key: impl Into<String>, fields: impl IntoIterator<Item = Field>) -> Self {
        Self {
            key: key.into(),
            fields: fields.into_iter().collect(),
            field_map: HashMap::new(),
            field_order: Vec::new(),
            load_conditions: Vec::new(),
        }
    }

    pub fn builder(key: impl Into<String>) -> FieldSetBuilder {
        FieldSetBuilder::new(key)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn load_conditions(&self) -> &[Arc<dyn LoadCondition>] {
        &self.load_conditions
    }

    /// Looks up a field by key, whether or not the set has been registered.
    pub fn field(&self, key: &str) -> Option<&Field> {
        self.field_map
            .get(key)
            .or_else(|| self.fields.iter().find(|f| f.key == key))
    }

    pub(crate) fn field_mut(&mut self, key: &str) -> Option<&mut Field> {
        self.field_map.get_mut(key)
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        let registered = self.field_order.iter().filter_map(|k| self.field_map.get(k));
        registered.chain(self.fields.iter())
    }

    /// Field keys in declaration order.
    pub fn field_keys(&self) -> Vec<String> {
        self.fields().map(|f| f.key.clone()).collect()
    }

    pub(crate) fn validate(&self) -> Vec<ConfigError> {
        if self.key.trim().is_empty() {
            return vec![ConfigError::BlankFieldSetKey];
        }

        self.fields
            .iter()
            .flat_map(|field| field.validate(&self.key))
            .collect()
    }

    /// Moves the raw field list into the lookup map, rejecting duplicate keys.
    pub(crate) fn initialize_field_map(&mut self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        for field in std::mem::take(&mut self.fields) {
            if self.field_map.contains_key(&field.key) {
                errors.push(ConfigError::DuplicateField(FieldLocation::new(
                    &self.key, &field.key,
                )));
                continue;
            }
            self.field_order.push(field.key.clone());
            self.field_map.insert(field.key.clone(), field);
        }

        errors
    }

    pub(crate) fn generate_field_defaults(&mut self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        for field_key in &self.field_order {
            if let Some(field) = self.field_map.get_mut(field_key) {
                if let Err(e) = field.generate_default(&self.key) {
                    errors.push(e);
                }
            }
        }

        errors
    }

    pub(crate) fn validate_fields(&self) -> Vec<ConfigError> {
        self.fields()
            .flat_map(|field| field.validate(&self.key))
            .collect()
    }
}

/// Builder for a [`FieldSet`].
#[derive(Debug)]
#[must_use = "builders do nothing until .build() is called"]
pub struct FieldSetBuilder {
    field_set: FieldSet,
}

impl FieldSetBuilder {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            field_set: FieldSet::new(key, []),
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.field_set.fields.push(field);
        self
    }

    pub fn with_fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.field_set.fields.extend(fields);
        self
    }

    /// Adds a condition gating the whole set.
    pub fn with_load_condition(mut self, condition: impl LoadCondition + 'static) -> Self {
        self.field_set.load_conditions.push(Arc::new(condition));
        self
    }

    pub fn with_load_conditions(
        mut self,
        conditions: impl IntoIterator<Item = Arc<dyn LoadCondition>>,
    ) -> Self {
        self.field_set.load_conditions.extend(conditions);
        self
    }

    pub fn build(self) -> FieldSet {
        self.field_set
    }
}
