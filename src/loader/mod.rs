//! Value sources consulted during a load pass.
//!
//! Loaders are applied in configured order; for any field, the value from the
//! last loader that supplied one wins.

mod env;
mod file;
mod flag;
mod map;

use std::collections::HashMap;

pub use env::EnvLoader;
pub use file::{FileLoader, FileSource};
pub use flag::FlagLoader;
pub use map::MapLoader;

/// A named provider of raw string values.
pub trait Loader: Send + Sync + std::fmt::Debug {
    /// Stable identifier, recorded as the source of every value this loader supplies.
    fn name(&self) -> &str;

    /// Raw values for the requested keys of one field-set.
    ///
    /// Keys the loader has no value for are omitted; this is never an error.
    fn get_map(&self, field_set_key: &str, field_keys: &[String]) -> HashMap<String, String>;

    /// A hint for help output, such as the concrete environment variable name.
    fn help_string(&self, _field_set_key: &str, _field_key: &str) -> String {
        String::new()
    }
}
