use std::collections::HashMap;

use super::Loader;

/// Reads field values from environment variables.
///
/// Variable names join the prefix, field-set key and field key with `_` and are
/// upper-cased: with prefix `myapp`, field `db.host` is read from `MYAPP_DB_HOST`.
#[derive(Debug, Clone, Default)]
pub struct EnvLoader {
    key_prefix: String,
}

impl EnvLoader {
    pub fn new(key_prefix: impl Into<String>) -> Self {
        Self {
            key_prefix: key_prefix.into(),
        }
    }

    pub fn env_key(&self, field_set_key: &str, field_key: &str) -> String {
        [self.key_prefix.as_str(), field_set_key, field_key]
            .into_iter()
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("_")
            .to_uppercase()
    }
}

impl Loader for EnvLoader {
    fn name(&self) -> &str {
        "environment"
    }

    fn get_map(&self, field_set_key: &str, field_keys: &[String]) -> HashMap<String, String> {
        field_keys
            .iter()
            .filter_map(|field_key| {
                let value = std::env::var(self.env_key(field_set_key, field_key)).ok()?;
                Some((field_key.clone(), value))
            })
            .collect()
    }

    fn help_string(&self, field_set_key: &str, field_key: &str) -> String {
        format!("Environment key: {}", self.env_key(field_set_key, field_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_env_key() {
        assert_eq!(EnvLoader::new("my_app").env_key("db", "host"), "MY_APP_DB_HOST");
        assert_eq!(EnvLoader::default().env_key("db", "host"), "DB_HOST");
    }

    #[test]
    #[serial]
    fn test_env_loader_reads_requested_keys() {
        std::env::set_var("DRAGON_ENV_TEST_DB_HOST", "db.internal");
        std::env::set_var("DRAGON_ENV_TEST_DB_UNRELATED", "ignored");
        std::env::remove_var("DRAGON_ENV_TEST_DB_PORT");

        let loader = EnvLoader::new("dragon_env_test");
        let values = loader.get_map("db", &["host".to_string(), "port".to_string()]);

        assert_eq!(values.len(), 1);
        assert_eq!(values.get("host").map(String::as_str), Some("db.internal"));

        std::env::remove_var("DRAGON_ENV_TEST_DB_HOST");
        std::env::remove_var("DRAGON_ENV_TEST_DB_UNRELATED");
    }

    #[test]
    fn test_help_string_names_variable() {
        let loader = EnvLoader::new("svc");
        assert_eq!(loader.help_string("http", "port"), "Environment key: SVC_HTTP_PORT");
    }
}
