//! Fields, field-sets, and their builders.

mod builder;
mod set;
mod value;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub use builder::FieldBuilder;
pub use set::{FieldSet, FieldSetBuilder};
pub use value::{FieldType, FromValue, Value};

use crate::condition::{FieldLocation, LoadCondition};
use crate::error::BoxError;
use crate::ConfigError;

/// Checks a candidate value; an `Err` rejects the value.
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), BoxError> + Send + Sync>;

/// Produces a default value once, when the owning field-set is registered.
pub type DefaultGenerator = Arc<dyn Fn() -> Result<Value, BoxError> + Send + Sync>;

/// Placeholder shown instead of the value of a sensitive field.
pub const SENSITIVE_VALUE: &str = "<sensitive-value>";

/// A single typed configuration value.
///
/// A field is described by its key, type and constraints, and carries the values
/// resolved for it at runtime. Values are resolved in priority order:
///
/// 1. an override set with [`Registry::set_field`](crate::Registry::set_field)
/// 2. the most recently applied loader value
/// 3. the static default
/// 4. the generated default
///
/// Build fields with [`Field::builder`].
#[derive(Clone)]
pub struct Field {
    pub(crate) key: String,
    pub(crate) field_type: FieldType,
    pub(crate) description: String,
    pub(crate) default: Option<Value>,
    pub(crate) default_generator: Option<DefaultGenerator>,
    pub(crate) validator: Option<Validator>,
    pub(crate) enumeration: Vec<Value>,
    pub(crate) required: bool,
    pub(crate) sensitive: bool,
    pub(crate) load_conditions: Vec<Arc<dyn LoadCondition>>,
    values: HashMap<String, Value>,
    found: Vec<String>,
    generated_default: Option<Value>,
    override_value: Option<Value>,
}

impl Field {
    /// Starts building a field with the given key and type.
    pub fn builder(key: impl Into<String>, field_type: FieldType) -> FieldBuilder {
        FieldBuilder::new(key, field_type)
    }

    pub(crate) fn new(key: String, field_type: FieldType) -> Self {
        Self {
            key,
            field_type,
            description: String::new(),
            default: None,
            default_generator: None,
            validator: None,
            enumeration: Vec::new(),
            required: false,
            sensitive: false,
            load_conditions: Vec::new(),
            values: HashMap::new(),
            found: Vec::new(),
            generated_default: None,
            override_value: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn has_default_generator(&self) -> bool {
        self.default_generator.is_some()
    }

    pub fn generated_default(&self) -> Option<&Value> {
        self.generated_default.as_ref()
    }

    pub fn enumeration(&self) -> &[Value] {
        &self.enumeration
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_sensitive(&self) -> bool {
        self.sensitive
    }

    pub fn load_conditions(&self) -> &[Arc<dyn LoadCondition>] {
        &self.load_conditions
    }

    pub fn override_value(&self) -> Option<&Value> {
        self.override_value.as_ref()
    }

    /// The value last applied by the named loader, if any.
    pub fn value_from(&self, source: &str) -> Option<&Value> {
        self.values.get(source)
    }

    /// Loader names that supplied a value, lowest priority first.
    pub fn sources(&self) -> &[String] {
        &self.found
    }

    /// The resolved value, or `None` when nothing (not even a default) is set.
    pub fn value(&self) -> Option<&Value> {
        if let Some(value) = &self.override_value {
            return Some(value);
        }
        if let Some(value) = self.found.last().and_then(|source| self.values.get(source)) {
            return Some(value);
        }
        self.default.as_ref().or(self.generated_default.as_ref())
    }

    /// Checks structural validity, and the default values against the
    /// enumeration and validator.
    ///
    /// Type and enumeration-type problems stop the check before membership and
    /// validator checks, which are meaningless against a malformed field.
    pub(crate) fn validate(&self, field_set: &str) -> Vec<ConfigError> {
        if self.key.trim().is_empty() {
            return vec![ConfigError::BlankFieldKey {
                field_set: field_set.to_string(),
            }];
        }

        let location = self.location(field_set);
        let mut errors = Vec::new();

        if self.default.is_some() && self.default_generator.is_some() {
            errors.push(ConfigError::DefaultWithGenerator(location.clone()));
        }
        if self.required && (self.default.is_some() || self.default_generator.is_some()) {
            errors.push(ConfigError::RequiredWithDefault(location.clone()));
        }

        let typed = [
            ("default", self.default.as_ref()),
            ("generated default", self.generated_default.as_ref()),
        ];
        for (subject, value) in typed {
            if let Some(value) = value {
                if let Err(e) = self.check_type(&location, subject, value) {
                    errors.push(e);
                }
            }
        }
        for value in &self.enumeration {
            if let Err(e) = self.check_type(&location, "enumeration value", value) {
                errors.push(e);
            }
        }

        if !errors.is_empty() {
            return errors;
        }

        for (subject, value) in typed {
            if let Some(value) = value {
                if let Err(e) = self.check_candidate(&location, subject, value) {
                    errors.push(e);
                }
            }
        }

        errors
    }

    /// Invokes the default generator, if any, storing its result.
    pub(crate) fn generate_default(&mut self, field_set: &str) -> Result<(), ConfigError> {
        let Some(generator) = &self.default_generator else {
            return Ok(());
        };

        let value = generator().map_err(|source| ConfigError::DefaultGeneration {
            location: self.location(field_set),
            source,
        })?;
        self.generated_default = Some(value);

        Ok(())
    }

    /// Parses and records a raw value supplied by the named loader.
    ///
    /// A rejected value is discarded and the previously resolved value is kept.
    /// Re-applying a source replaces its value and makes it the most recent.
    pub(crate) fn set(
        &mut self,
        field_set: &str,
        source: &str,
        raw: &str,
    ) -> Result<(), ConfigError> {
        let location = self.location(field_set);
        let value = self
            .field_type
            .parse(raw)
            .map_err(|reason| ConfigError::Parse {
                location: location.clone(),
                field_type: self.field_type,
                raw: if self.sensitive {
                    SENSITIVE_VALUE.to_string()
                } else {
                    raw.to_string()
                },
                reason,
            })?;
        self.check_candidate(&location, "value", &value)?;

        self.values.insert(source.to_string(), value);
        self.found.retain(|found| found != source);
        self.found.push(source.to_string());

        Ok(())
    }

    /// Sets a value that takes priority over every loader and default.
    pub(crate) fn set_override(
        &mut self,
        field_set: &str,
        value: Value,
    ) -> Result<(), ConfigError> {
        let location = self.location(field_set);
        self.check_type(&location, "value", &value)?;
        self.check_candidate(&location, "value", &value)?;
        self.override_value = Some(value);

        Ok(())
    }

    pub(crate) fn clear_override(&mut self) -> Option<Value> {
        self.override_value.take()
    }

    fn location(&self, field_set: &str) -> FieldLocation {
        FieldLocation::new(field_set, &self.key)
    }

    fn check_type(
        &self,
        location: &FieldLocation,
        subject: &'static str,
        value: &Value,
    ) -> Result<(), ConfigError> {
        if value.field_type() == self.field_type {
            return Ok(());
        }
        Err(ConfigError::TypeMismatch {
            location: location.clone(),
            subject,
            expected: self.field_type,
            found: value.field_type(),
        })
    }

    fn check_candidate(
        &self,
        location: &FieldLocation,
        subject: &'static str,
        value: &Value,
    ) -> Result<(), ConfigError> {
        if !self.enumeration.is_empty() && !self.enumeration.contains(value) {
            return Err(ConfigError::NotInEnumeration {
                location: location.clone(),
                subject,
                value: self.display_value(value),
            });
        }
        if let Some(validator) = &self.validator {
            validator(value).map_err(|source| ConfigError::Validation {
                location: location.clone(),
                subject,
                source,
            })?;
        }
        Ok(())
    }

    /// Renders a value for diagnostics, masking sensitive fields.
    pub(crate) fn display_value(&self, value: &Value) -> String {
        if self.sensitive {
            SENSITIVE_VALUE.to_string()
        } else {
            value.to_string()
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.value().map(|v| self.display_value(v));
        f.debug_struct("Field")
            .field("key", &self.key)
            .field("field_type", &self.field_type)
            .field("required", &self.required)
            .field("sensitive", &self.sensitive)
            .field("enumeration", &self.enumeration.len())
            .field("load_conditions", &self.load_conditions.len())
            .field("sources", &self.found)
            .field("value", &value)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn kinds(errors: &[ConfigError]) -> Vec<ErrorKind> {
        errors.iter().map(ConfigError::kind).collect()
    }

    #[test]
    fn test_blank_key_short_circuits() {
        let field = Field::builder(" ", FieldType::Int)
            .with_default("not an int")
            .build();
        let errors = field.validate("app");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ConfigError::BlankFieldKey { .. }));
    }

    #[test]
    fn test_required_with_default_conflicts() {
        let field = Field::builder("port", FieldType::Int)
            .required()
            .with_default(8080)
            .build();
        assert_eq!(
            kinds(&field.validate("server")),
            vec![ErrorKind::ConflictingConfiguration]
        );

        let field = Field::builder("id", FieldType::String)
            .with_default("a")
            .with_default_generator(|| Ok("b".into()))
            .build();
        assert!(matches!(
            field.validate("app")[0],
            ConfigError::DefaultWithGenerator(_)
        ));
    }

    #[test]
    fn test_type_errors_skip_membership_checks() {
        let field = Field::builder("level", FieldType::String)
            .with_default("trace")
            .with_enumeration(["info", "warn"])
            .with_enumeration_value(3)
            .build();
        let errors = field.validate("log");
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            ConfigError::TypeMismatch { subject: "enumeration value", .. }
        ));
    }

    #[test]
    fn test_default_outside_enumeration() {
        let field = Field::builder("level", FieldType::String)
            .with_default("trace")
            .with_enumeration(["info", "warn"])
            .build();
        assert!(matches!(
            &field.validate("log")[..],
            [ConfigError::NotInEnumeration { subject: "default", .. }]
        ));
    }

    #[test]
    fn test_generated_default_checked_against_validator() {
        let mut field = Field::builder("workers", FieldType::Int)
            .with_default_generator(|| Ok(Value::Int(0)))
            .with_validator(|value| match value {
                Value::Int(n) if *n > 0 => Ok(()),
                _ => Err("must be positive".into()),
            })
            .build();
        assert!(field.validate("pool").is_empty());

        field.generate_default("pool").unwrap();
        let errors = field.validate("pool");
        assert!(matches!(
            &errors[..],
            [ConfigError::Validation { subject: "generated default", .. }]
        ));
    }

    #[test]
    fn test_failing_generator() {
        let mut field = Field::builder("id", FieldType::String)
            .with_default_generator(|| Err("entropy unavailable".into()))
            .build();
        let err = field.generate_default("app").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DefaultGeneration);
        assert!(err.to_string().contains("entropy unavailable"));
    }

    #[test]
    fn test_resolution_priority() {
        let mut field = Field::builder("id", FieldType::String)
            .with_default_generator(|| Ok("generated".into()))
            .build();
        assert_eq!(field.value(), None);

        field.generate_default("app").unwrap();
        assert_eq!(field.value(), Some(&Value::from("generated")));

        field.set("app", "environment", "env").unwrap();
        field.set("app", "flag", "flag").unwrap();
        assert_eq!(field.value(), Some(&Value::from("flag")));

        field.set("app", "environment", "env-again").unwrap();
        assert_eq!(field.value(), Some(&Value::from("env-again")));
        assert_eq!(field.sources(), ["flag", "environment"]);

        field.set_override("app", "override".into()).unwrap();
        assert_eq!(field.value(), Some(&Value::from("override")));

        field.clear_override();
        assert_eq!(field.value(), Some(&Value::from("env-again")));
    }

    #[test]
    fn test_rejected_value_keeps_previous() {
        let mut field = Field::builder("port", FieldType::Int)
            .with_enumeration([80, 443])
            .build();
        field.set("server", "environment", "443").unwrap();

        let err = field.set("server", "flag", "eighty").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);

        let err = field.set("server", "flag", "8080").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert_eq!(field.value(), Some(&Value::Int(443)));
        assert_eq!(field.sources(), ["environment"]);
    }

    #[test]
    fn test_override_type_checked() {
        let mut field = Field::builder("port", FieldType::Int).build();
        let err = field.set_override("server", "8080".into()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::TypeMismatch { expected: FieldType::Int, found: FieldType::String, .. }
        ));
        assert_eq!(field.override_value(), None);
    }

    #[test]
    fn test_sensitive_parse_error_is_masked() {
        let mut field = Field::builder("pin", FieldType::Int).sensitive().build();
        let err = field.set("vault", "environment", "12ab").unwrap_err();
        assert!(!err.to_string().contains("12ab"));
        assert!(err.to_string().contains(SENSITIVE_VALUE));
    }
}
