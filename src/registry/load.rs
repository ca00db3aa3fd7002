//! The load pass: condition evaluation and loader application.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::{Registry, State};
use crate::condition::{ConditionValues, FieldLocation, LoadCondition};
use crate::loader::Loader;
use crate::{ConfigError, ConfigErrors};

impl Registry {
    /// Registers queued field-set groups, then loads every field-set in
    /// registration order.
    ///
    /// Group registration errors are collected across all groups. Loading stops at
    /// the first field-set reporting errors; the errors of that set are returned
    /// together.
    pub fn load(&self) -> Result<(), ConfigErrors> {
        let mut state = self.lock();
        state.loaded = false;

        let mut errors = ConfigErrors::new();
        for group in std::mem::take(&mut state.pending) {
            if let Err(group_errors) = state.add_field_sets(group.field_sets) {
                warn!(
                    group = %group.name,
                    errors = group_errors.len(),
                    "problem(s) adding field-set group"
                );
                errors.extend(group_errors);
            }
        }
        errors.into_result()?;

        for key in state.ordered.clone() {
            state.load_field_set(&key, &self.loaders)?;
        }

        state.loaded = true;
        debug!(field_sets = state.ordered.len(), "configuration loaded");

        Ok(())
    }

    /// Reloads one field-set from every loader.
    pub fn load_field_set(&self, field_set_key: &str) -> Result<(), ConfigErrors> {
        self.lock().load_field_set(field_set_key, &self.loaders)
    }

    /// Reloads one field from every loader, honouring its own and its set's conditions.
    pub fn load_field(&self, field_set_key: &str, field_key: &str) -> Result<(), ConfigErrors> {
        let mut state = self.lock();
        state.field(field_set_key, field_key)?;

        if !state.should_load_field_set(field_set_key)? {
            return Ok(());
        }

        let field_keys = [field_key.to_string()];
        let mut errors = ConfigErrors::new();
        state.apply_loaders(field_set_key, &field_keys, &self.loaders, &mut errors);
        state.check_required(field_set_key, &field_keys, &mut errors);

        errors.into_result()
    }
}

impl State {
    pub(super) fn load_field_set(
        &mut self,
        field_set_key: &str,
        loaders: &[Box<dyn Loader>],
    ) -> Result<(), ConfigErrors> {
        let field_keys = self.field_set(field_set_key)?.field_keys();

        if !self.should_load_field_set(field_set_key)? {
            debug!(field_set = %field_set_key, "load conditions not met, skipping field-set");
            return Ok(());
        }

        let mut errors = ConfigErrors::new();
        self.apply_loaders(field_set_key, &field_keys, loaders, &mut errors);
        self.check_required(field_set_key, &field_keys, &mut errors);

        errors.into_result()
    }

    /// Applies values from each loader in order. Keys are visited in declaration
    /// order so same-set conditions see a deterministic state.
    fn apply_loaders(
        &mut self,
        field_set_key: &str,
        field_keys: &[String],
        loaders: &[Box<dyn Loader>],
        errors: &mut ConfigErrors,
    ) {
        for loader in loaders {
            let values = loader.get_map(field_set_key, field_keys);
            trace!(
                loader = loader.name(),
                field_set = %field_set_key,
                values = values.len(),
                "applying loader"
            );

            for field_key in field_keys {
                let Some(raw) = values.get(field_key) else {
                    continue;
                };

                match self.should_load_field(field_set_key, field_key) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => {
                        errors.push(e);
                        continue;
                    }
                }

                let result = self
                    .field_mut(field_set_key, field_key)
                    .and_then(|field| field.set(field_set_key, loader.name(), raw));
                if let Err(e) = result {
                    warn!(loader = loader.name(), error = %e, "rejected loaded value");
                    errors.push(e);
                }
            }
        }
    }

    /// Required fields must resolve a value; conditionally required fields only when
    /// their own conditions hold for this pass.
    fn check_required(
        &self,
        field_set_key: &str,
        field_keys: &[String],
        errors: &mut ConfigErrors,
    ) {
        for field_key in field_keys {
            let Ok(field) = self.field(field_set_key, field_key) else {
                continue;
            };
            if !field.is_required() || field.value().is_some() {
                continue;
            }

            let location = FieldLocation::new(field_set_key, field_key);
            if field.load_conditions().is_empty() {
                errors.push(ConfigError::RequiredFieldUnset(location));
                continue;
            }
            // an unresolvable gate never opened, so there is nothing to require
            match self.should_load_field(field_set_key, field_key) {
                Ok(true) => errors.push(ConfigError::ConditionallyRequiredFieldUnset(location)),
                Ok(false) => {}
                Err(e) => {
                    trace!(field = %location, error = %e, "gate not evaluated, not required");
                }
            }
        }
    }

    fn should_load_field_set(&self, field_set_key: &str) -> Result<bool, ConfigError> {
        let conditions = self.field_set(field_set_key)?.load_conditions();
        self.evaluate_conditions(conditions, None, &format!("field-set '{field_set_key}'"))
    }

    fn should_load_field(&self, field_set_key: &str, field_key: &str) -> Result<bool, ConfigError> {
        let conditions = self.field(field_set_key, field_key)?.load_conditions();
        self.evaluate_conditions(
            conditions,
            Some(field_set_key),
            &format!("field-set '{field_set_key}' field '{field_key}'"),
        )
    }

    /// Evaluates conditions in order, stopping at the first closed gate.
    ///
    /// Each condition gets a fresh cache holding the current values of its declared
    /// dependencies. Local dependencies resolve against `local_field_set` and are
    /// injected under both their declared and qualified locations.
    fn evaluate_conditions(
        &self,
        conditions: &[Arc<dyn LoadCondition>],
        local_field_set: Option<&str>,
        dependent: &str,
    ) -> Result<bool, ConfigError> {
        for condition in conditions {
            let mut values = ConditionValues::new();

            for dependency in condition.field_dependencies() {
                let resolved = match local_field_set {
                    Some(field_set) => dependency.qualify(field_set),
                    None => dependency.clone(),
                };
                let value = match self.field_value(&resolved) {
                    Ok(value) => value.clone(),
                    Err(ConfigError::NoValue(_)) => {
                        return Err(ConfigError::UnresolvedDependency {
                            dependent: dependent.to_string(),
                            dependency: resolved,
                        });
                    }
                    Err(e) => return Err(e),
                };

                if resolved != dependency {
                    values.set_field_values([(dependency, value.clone())]);
                }
                values.set_field_values([(resolved, value)]);
            }

            let load = condition
                .load(&values)
                .map_err(|source| ConfigError::LoadCondition {
                    dependent: dependent.to_string(),
                    source,
                })?;
            if !load {
                return Ok(false);
            }
        }

        Ok(true)
    }
}
