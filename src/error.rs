use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::condition::FieldLocation;
use crate::field::FieldType;

/// Error type returned by user callbacks (validators, default generators, load conditions).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Broad classification of a [`ConfigError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing keys, unknown types, duplicate field or field-set keys.
    Structural,
    /// Mutually exclusive field settings used together.
    ConflictingConfiguration,
    /// A load condition references a field that cannot be resolved.
    Dependency,
    /// A default generator failed.
    DefaultGeneration,
    /// A value failed type, enumeration or validator checks.
    Validation,
    /// A raw string could not be parsed into the field's type.
    Parse,
    /// A required field has no value after loading.
    RequiredFieldUnsatisfied,
    /// A lookup against the registry failed.
    Lookup,
    /// A value source (file, binding target) could not be read.
    Source,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid field-set key: cannot be blank")]
    BlankFieldSetKey,

    #[error("field-set '{field_set}': invalid field key: cannot be blank")]
    BlankFieldKey { field_set: String },

    #[error("invalid field type specified: '{0}'")]
    UnknownFieldType(String),

    #[error("duplicate field-set key found: '{0}'")]
    DuplicateFieldSet(String),

    #[error("duplicate field key found: '{0}'")]
    DuplicateField(FieldLocation),

    #[error("duplicate loader name found: '{0}'")]
    DuplicateLoader(String),

    #[error("field '{0}': default and default generator cannot both be set")]
    DefaultWithGenerator(FieldLocation),

    #[error("field '{0}': required fields cannot have a default or default generator")]
    RequiredWithDefault(FieldLocation),

    #[error("field '{location}': invalid {subject} type: expected '{expected}', found '{found}'")]
    TypeMismatch {
        location: FieldLocation,
        subject: &'static str,
        expected: FieldType,
        found: FieldType,
    },

    #[error("{dependent}: load condition field '{dependency}' not found in config")]
    MissingDependency {
        dependent: String,
        dependency: FieldLocation,
    },

    #[error("{dependent}: no value set for load condition field '{dependency}'")]
    UnresolvedDependency {
        dependent: String,
        dependency: FieldLocation,
    },

    #[error("{dependent}: problem getting load condition outcome: {source}")]
    LoadCondition { dependent: String, source: BoxError },

    #[error("field '{location}': problem generating default value: {source}")]
    DefaultGeneration {
        location: FieldLocation,
        source: BoxError,
    },

    #[error("field '{location}': {subject} '{value}' not found in enumeration list")]
    NotInEnumeration {
        location: FieldLocation,
        subject: &'static str,
        value: String,
    },

    #[error("field '{location}': {subject} failed validation: {source}")]
    Validation {
        location: FieldLocation,
        subject: &'static str,
        source: BoxError,
    },

    #[error("field '{location}': problem parsing '{raw}' as {field_type}: {reason}")]
    Parse {
        location: FieldLocation,
        field_type: FieldType,
        raw: String,
        reason: String,
    },

    #[error("required field '{0}' not set")]
    RequiredFieldUnset(FieldLocation),

    #[error("conditionally required field '{0}' load condition met, but field value not set")]
    ConditionallyRequiredFieldUnset(FieldLocation),

    #[error("field-set not found with key '{0}'")]
    FieldSetNotFound(String),

    #[error("field not found with key '{0}'")]
    FieldNotFound(FieldLocation),

    #[error("incorrect field-type for field '{location}': requested '{requested}', found '{found}'")]
    IncorrectFieldType {
        location: FieldLocation,
        requested: FieldType,
        found: FieldType,
    },

    #[error("no value set for field '{0}'")]
    NoValue(FieldLocation),

    #[error("required config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    FileParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to deserialize bound config: {0}")]
    DeserializeError(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BlankFieldSetKey
            | Self::BlankFieldKey { .. }
            | Self::UnknownFieldType(_)
            | Self::DuplicateFieldSet(_)
            | Self::DuplicateField(_)
            | Self::DuplicateLoader(_) => ErrorKind::Structural,
            Self::DefaultWithGenerator(_) | Self::RequiredWithDefault(_) => {
                ErrorKind::ConflictingConfiguration
            }
            Self::MissingDependency { .. }
            | Self::UnresolvedDependency { .. }
            | Self::LoadCondition { .. } => ErrorKind::Dependency,
            Self::DefaultGeneration { .. } => ErrorKind::DefaultGeneration,
            Self::TypeMismatch { .. }
            | Self::NotInEnumeration { .. }
            | Self::Validation { .. } => ErrorKind::Validation,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::RequiredFieldUnset(_) | Self::ConditionallyRequiredFieldUnset(_) => {
                ErrorKind::RequiredFieldUnsatisfied
            }
            Self::FieldSetNotFound(_)
            | Self::FieldNotFound(_)
            | Self::IncorrectFieldType { .. }
            | Self::NoValue(_) => ErrorKind::Lookup,
            Self::FileNotFound(_)
            | Self::ReadError { .. }
            | Self::FileParseError { .. }
            | Self::DeserializeError(_) => ErrorKind::Source,
        }
    }
}

/// A batch of errors collected by registration or loading.
///
/// Batched operations never stop at the first problem inside a field or field-set,
/// so callers see everything wrong with a registration attempt at once.
#[derive(Debug, Default)]
pub struct ConfigErrors(Vec<ConfigError>);

impl ConfigErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ConfigError) {
        self.0.push(error);
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = ConfigError>) {
        self.0.extend(errors);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConfigError> {
        self.0.iter()
    }

    /// Returns `true` if any error in the batch has the given kind.
    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        self.0.iter().any(|e| e.kind() == kind)
    }

    /// Converts the batch into `Ok(())` when empty.
    pub fn into_result(self) -> Result<(), ConfigErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ConfigErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} configuration error(s)", self.0.len())?;
        for (idx, error) in self.0.iter().enumerate() {
            let sep = if idx == 0 { ": " } else { "; " };
            write!(f, "{sep}{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigErrors {}

impl From<ConfigError> for ConfigErrors {
    fn from(error: ConfigError) -> Self {
        Self(vec![error])
    }
}

impl From<Vec<ConfigError>> for ConfigErrors {
    fn from(errors: Vec<ConfigError>) -> Self {
        Self(errors)
    }
}

impl IntoIterator for ConfigErrors {
    type Item = ConfigError;
    type IntoIter = std::vec::IntoIter<ConfigError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ConfigErrors {
    type Item = &'a ConfigError;
    type IntoIter = std::slice::Iter<'a, ConfigError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let location = FieldLocation::new("app", "id");
        assert_eq!(
            ConfigError::RequiredWithDefault(location.clone()).kind(),
            ErrorKind::ConflictingConfiguration
        );
        assert_eq!(
            ConfigError::NoValue(location.clone()).kind(),
            ErrorKind::Lookup
        );
        assert_eq!(
            ConfigError::TypeMismatch {
                location,
                subject: "default",
                expected: FieldType::Int,
                found: FieldType::String,
            }
            .kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_batch_display() {
        let mut errors = ConfigErrors::new();
        errors.push(ConfigError::BlankFieldSetKey);
        errors.push(ConfigError::DuplicateFieldSet("app".into()));

        let message = errors.to_string();
        assert!(message.starts_with("2 configuration error(s): "));
        assert!(message.contains("'app'"));
        assert!(errors.has_kind(ErrorKind::Structural));
    }
}
