pub mod condition;
mod error;
pub mod field;
pub mod loader;
mod registry;

pub use condition::{
    Condition, ConditionBuilder, ConditionValues, FieldCondition, FieldLocation, LoadCondition,
};
pub use error::{BoxError, ConfigError, ConfigErrors, ErrorKind};
pub use field::{
    Field, FieldBuilder, FieldSet, FieldSetBuilder, FieldType, FromValue, Value, SENSITIVE_VALUE,
};
pub use loader::{EnvLoader, FileLoader, FileSource, FlagLoader, Loader, MapLoader};
pub use registry::{
    AppValue, Binding, Bindings, ConfigOption, Registry, RegistryBuilder, APP_FIELD_SET,
};
