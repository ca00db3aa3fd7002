use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::warn;

use super::{Registry, State, APP_FIELD_SET};
use crate::field::{Field, FieldSet, FieldType, Value};
use crate::loader::{EnvLoader, FileLoader, FileSource, FlagLoader, Loader};
use crate::{ConfigError, ConfigErrors};

/// A static application attribute, or a function computing it at registration time.
#[derive(Clone)]
pub enum AppValue {
    Static(String),
    Generated(Arc<dyn Fn() -> String + Send + Sync>),
}

impl fmt::Debug for AppValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppValue::Static(value) => f.debug_tuple("Static").field(value).finish(),
            AppValue::Generated(_) => f.write_str("Generated(..)"),
        }
    }
}

/// A registry construction option.
///
/// Each variant carries only the data it needs. Loader options are applied in the
/// order given, which is also their priority order.
pub enum ConfigOption {
    EnvironmentLoader { key_prefix: String },
    FlagLoader { key_prefix: String },
    FileLoader { sources: Vec<FileSource> },
    Loader(Box<dyn Loader>),
    AppId(AppValue),
    AppVersion(AppValue),
}

impl ConfigOption {
    pub fn env_loader(key_prefix: impl Into<String>) -> Self {
        ConfigOption::EnvironmentLoader {
            key_prefix: key_prefix.into(),
        }
    }

    pub fn flag_loader(key_prefix: impl Into<String>) -> Self {
        ConfigOption::FlagLoader {
            key_prefix: key_prefix.into(),
        }
    }

    pub fn file_loader(sources: impl IntoIterator<Item = FileSource>) -> Self {
        ConfigOption::FileLoader {
            sources: sources.into_iter().collect(),
        }
    }

    pub fn loader(loader: impl Loader + 'static) -> Self {
        ConfigOption::Loader(Box::new(loader))
    }

    pub fn app_id(id: impl Into<String>) -> Self {
        ConfigOption::AppId(AppValue::Static(id.into()))
    }

    pub fn app_id_fn(id_fn: impl Fn() -> String + Send + Sync + 'static) -> Self {
        ConfigOption::AppId(AppValue::Generated(Arc::new(id_fn)))
    }

    pub fn app_version(version: impl Into<String>) -> Self {
        ConfigOption::AppVersion(AppValue::Static(version.into()))
    }

    pub fn app_version_fn(version_fn: impl Fn() -> String + Send + Sync + 'static) -> Self {
        ConfigOption::AppVersion(AppValue::Generated(Arc::new(version_fn)))
    }
}

impl fmt::Debug for ConfigOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigOption::EnvironmentLoader { key_prefix } => f
                .debug_struct("EnvironmentLoader")
                .field("key_prefix", key_prefix)
                .finish(),
            ConfigOption::FlagLoader { key_prefix } => f
                .debug_struct("FlagLoader")
                .field("key_prefix", key_prefix)
                .finish(),
            ConfigOption::FileLoader { sources } => {
                f.debug_struct("FileLoader").field("sources", sources).finish()
            }
            ConfigOption::Loader(loader) => f.debug_tuple("Loader").field(&loader.name()).finish(),
            ConfigOption::AppId(value) => f.debug_tuple("AppId").field(value).finish(),
            ConfigOption::AppVersion(value) => f.debug_tuple("AppVersion").field(value).finish(),
        }
    }
}

/// Builder for a [`Registry`].
///
/// ```no_run
/// use dragon_fields::Registry;
///
/// // defaults -> config file -> environment -> command line
/// let registry = Registry::builder("weather", "Serves weather data")
///     .with_file("config/default.toml", true)
///     .with_env("WEATHER")
///     .with_flags("")
///     .with_app_version(env!("CARGO_PKG_VERSION"))
///     .build()?;
/// # Ok::<(), dragon_fields::ConfigErrors>(())
/// ```
#[derive(Debug)]
#[must_use = "builders do nothing until .build() is called"]
pub struct RegistryBuilder {
    app_name: String,
    app_description: String,
    options: Vec<ConfigOption>,
}

impl RegistryBuilder {
    pub fn new(app_name: impl Into<String>, app_description: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            app_description: app_description.into(),
            options: Vec::new(),
        }
    }

    pub fn option(mut self, option: ConfigOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn options(mut self, options: impl IntoIterator<Item = ConfigOption>) -> Self {
        self.options.extend(options);
        self
    }

    /// Adds an environment variable loader. See [`EnvLoader`].
    pub fn with_env(self, key_prefix: impl Into<String>) -> Self {
        self.option(ConfigOption::env_loader(key_prefix))
    }

    /// Adds a command-line flag loader. See [`FlagLoader`].
    pub fn with_flags(self, key_prefix: impl Into<String>) -> Self {
        self.option(ConfigOption::flag_loader(key_prefix))
    }

    /// Adds a TOML file, merged into the file loader of the preceding
    /// `with_file` call when there is one.
    ///
    /// If `required` is `true`, the build will fail if the file doesn't exist.
    pub fn with_file(mut self, path: impl AsRef<Path>, required: bool) -> Self {
        let source = FileSource::new(path, required);
        if let Some(ConfigOption::FileLoader { sources }) = self.options.last_mut() {
            sources.push(source);
            return self;
        }
        self.option(ConfigOption::file_loader([source]))
    }

    pub fn with_loader(self, loader: impl Loader + 'static) -> Self {
        self.option(ConfigOption::loader(loader))
    }

    pub fn with_app_id(self, id: impl Into<String>) -> Self {
        self.option(ConfigOption::app_id(id))
    }

    pub fn with_app_id_fn(self, id_fn: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.option(ConfigOption::app_id_fn(id_fn))
    }

    pub fn with_app_version(self, version: impl Into<String>) -> Self {
        self.option(ConfigOption::app_version(version))
    }

    pub fn with_app_version_fn(
        self,
        version_fn: impl Fn() -> String + Send + Sync + 'static,
    ) -> Self {
        self.option(ConfigOption::app_version_fn(version_fn))
    }

    /// Builds the loaders and registers the built-in `app` field-set.
    pub fn build(self) -> Result<Registry, ConfigErrors> {
        let mut errors = ConfigErrors::new();
        let mut warnings = Vec::new();
        let mut loaders: Vec<Box<dyn Loader>> = Vec::new();
        let mut app_id = None;
        let mut app_version = None;

        for option in self.options {
            match option {
                ConfigOption::EnvironmentLoader { key_prefix } => {
                    loaders.push(Box::new(EnvLoader::new(key_prefix)));
                }
                ConfigOption::FlagLoader { key_prefix } => {
                    loaders.push(Box::new(FlagLoader::new(key_prefix)));
                }
                ConfigOption::FileLoader { sources } => match FileLoader::from_sources(sources) {
                    Ok(loader) => loaders.push(Box::new(loader)),
                    Err(e) => errors.push(e),
                },
                ConfigOption::Loader(loader) => loaders.push(loader),
                ConfigOption::AppId(value) => {
                    if app_id.replace(value).is_some() {
                        warnings.push(
                            "app id option set more than once, using the last one".to_string(),
                        );
                    }
                }
                ConfigOption::AppVersion(value) => {
                    if app_version.replace(value).is_some() {
                        warnings.push(
                            "app version option set more than once, using the last one".to_string(),
                        );
                    }
                }
            }
        }

        let mut names = HashSet::new();
        for loader in &loaders {
            if !names.insert(loader.name()) {
                errors.push(ConfigError::DuplicateLoader(loader.name().to_string()));
            }
        }
        errors.into_result()?;

        for warning in &warnings {
            warn!("{warning}");
        }

        let registry = Registry {
            state: Mutex::new(State::default()),
            loaders,
            warnings,
        };
        registry.register(app_field_set(
            self.app_name,
            self.app_description,
            app_version.unwrap_or_else(|| AppValue::Static("unknown".to_string())),
            app_id.unwrap_or_else(|| AppValue::Static("undefined".to_string())),
        ))?;

        Ok(registry)
    }
}

fn app_field(key: &str, value: AppValue) -> Field {
    let builder = Field::builder(key, FieldType::String);
    match value {
        AppValue::Static(value) => builder.with_default(value),
        AppValue::Generated(generate) => {
            builder.with_default_generator(move || Ok(Value::String(generate())))
        }
    }
    .build()
}

fn app_field_set(name: String, description: String, version: AppValue, id: AppValue) -> FieldSet {
    FieldSet::builder(APP_FIELD_SET)
        .with_fields([
            Field::builder("name", FieldType::String).with_default(name).build(),
            Field::builder("description", FieldType::String)
                .with_default(description)
                .build(),
            app_field("version", version),
            app_field("id", id),
        ])
        .build()
}
