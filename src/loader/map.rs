use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::Loader;

type Values = HashMap<String, HashMap<String, String>>;

/// An in-memory value source.
///
/// Clones share their values, so a handle kept by the caller can update what the
/// registry sees on its next load pass.
#[derive(Debug, Clone)]
pub struct MapLoader {
    name: String,
    values: Arc<RwLock<Values>>,
}

impl MapLoader {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Arc::default(),
        }
    }

    pub fn with_value(self, field_set_key: &str, field_key: &str, raw: impl Into<String>) -> Self {
        self.insert(field_set_key, field_key, raw);
        self
    }

    pub fn insert(&self, field_set_key: &str, field_key: &str, raw: impl Into<String>) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(field_set_key.to_string())
            .or_default()
            .insert(field_key.to_string(), raw.into());
    }

    pub fn remove(&self, field_set_key: &str, field_key: &str) -> Option<String> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(field_set_key)?
            .remove(field_key)
    }
}

impl Loader for MapLoader {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_map(&self, field_set_key: &str, field_keys: &[String]) -> HashMap<String, String> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        let Some(field_set) = values.get(field_set_key) else {
            return HashMap::new();
        };

        field_keys
            .iter()
            .filter_map(|key| Some((key.clone(), field_set.get(key)?.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_values() {
        let loader = MapLoader::new("defaults").with_value("app", "id", "a");
        let handle = loader.clone();
        handle.insert("app", "id", "b");

        let keys = vec!["id".to_string(), "name".to_string()];
        assert_eq!(loader.get_map("app", &keys)["id"], "b");
        assert_eq!(loader.get_map("app", &keys).len(), 1);

        assert_eq!(handle.remove("app", "id").as_deref(), Some("b"));
        assert!(loader.get_map("app", &keys).is_empty());
        assert_eq!(loader.name(), "defaults");
    }
}
