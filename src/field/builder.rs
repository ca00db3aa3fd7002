use std::sync::Arc;

use super::{Field, FieldType, Value};
use crate::condition::LoadCondition;
use crate::error::BoxError;

/// Builder for a [`Field`] descriptor.
///
/// ```
/// use dragon_fields::{Field, FieldType, Value};
///
/// let field = Field::builder("log_level", FieldType::String)
///     .with_description("Minimum level of emitted log messages")
///     .with_default("info")
///     .with_enumeration(["debug", "info", "warn", "error"])
///     .build();
///
/// assert_eq!(field.default_value(), Some(&Value::from("info")));
/// ```
#[derive(Debug)]
#[must_use = "builders do nothing until .build() is called"]
pub struct FieldBuilder {
    field: Field,
}

impl FieldBuilder {
    pub fn new(key: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            field: Field::new(key.into(), field_type),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.field.description = description.into();
        self
    }

    /// Sets the static default. Its type must match the field type.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.field.default = Some(value.into());
        self
    }

    /// Sets a function producing the default once, at registration time.
    pub fn with_default_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.field.default_generator = Some(Arc::new(generator));
        self
    }

    /// Sets a check run against defaults, loaded values and overrides.
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.field.validator = Some(Arc::new(validator));
        self
    }

    /// Replaces the list of accepted values.
    pub fn with_enumeration<V: Into<Value>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.field.enumeration = values.into_iter().map(Into::into).collect();
        self
    }

    /// Adds one accepted value.
    pub fn with_enumeration_value(mut self, value: impl Into<Value>) -> Self {
        self.field.enumeration.push(value.into());
        self
    }

    pub fn with_load_condition(mut self, condition: impl LoadCondition + 'static) -> Self {
        self.field.load_conditions.push(Arc::new(condition));
        self
    }

    pub fn with_load_conditions(
        mut self,
        conditions: impl IntoIterator<Item = Arc<dyn LoadCondition>>,
    ) -> Self {
        self.field.load_conditions.extend(conditions);
        self
    }

    pub fn required(mut self) -> Self {
        self.field.required = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.field.sensitive = true;
        self
    }

    pub fn build(self) -> Field {
        self.field
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Condition, FieldLocation};

    #[test]
    fn test_builder_sets_every_attribute() {
        let field = FieldBuilder::new("timeout", FieldType::Duration)
            .with_description("request timeout")
            .with_default(std::time::Duration::from_secs(5))
            .with_validator(|_| Ok(()))
            .with_load_condition(
                Condition::builder(|_| Ok(true))
                    .with_field_dependency(FieldLocation::new("app", "enabled"))
                    .build(),
            )
            .sensitive()
            .build();

        assert_eq!(field.key(), "timeout");
        assert_eq!(field.field_type(), FieldType::Duration);
        assert_eq!(field.description(), "request timeout");
        assert!(field.is_sensitive());
        assert!(!field.is_required());
        assert_eq!(field.load_conditions().len(), 1);
        assert!(field.validator.is_some());
    }

    #[test]
    fn test_enumeration_replace_and_append() {
        let field = FieldBuilder::new("mode", FieldType::String)
            .with_enumeration_value("a")
            .with_enumeration(["b", "c"])
            .with_enumeration_value("d")
            .build();
        let values: Vec<String> = field.enumeration().iter().map(|v| v.to_string()).collect();
        assert_eq!(values, ["b", "c", "d"]);
    }
}
