//! Field-style access to a resolved configuration.

use std::ops::Index;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{ConfigError, Result};
use crate::value::{ConfigMap, ConfigValue};

/// A node of a [`ResultTree`]: nested maps become trees, everything else is
/// kept as a value. Lists stay plain values even when they contain maps.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Value(ConfigValue),
    Tree(ResultTree),
}

impl Entry {
    pub fn as_value(&self) -> Option<&ConfigValue> {
        match self {
            Entry::Value(value) => Some(value),
            Entry::Tree(_) => None,
        }
    }

    pub fn as_tree(&self) -> Option<&ResultTree> {
        match self {
            Entry::Tree(tree) => Some(tree),
            Entry::Value(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(ConfigValue::as_str)
    }

    /// Converts back into a plain config value.
    pub fn into_config(self) -> ConfigValue {
        match self {
            Entry::Value(value) => value,
            Entry::Tree(tree) => tree.into_config(),
        }
    }
}

impl From<ConfigValue> for Entry {
    fn from(value: ConfigValue) -> Self {
        match value {
            ConfigValue::Map(map) => Entry::Tree(ResultTree::from(map)),
            other => Entry::Value(other),
        }
    }
}

impl From<ResultTree> for Entry {
    fn from(tree: ResultTree) -> Self {
        Entry::Tree(tree)
    }
}

impl Serialize for Entry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Entry::Value(value) => value.serialize(serializer),
            Entry::Tree(tree) => tree.serialize(serializer),
        }
    }
}

/// The rendered configuration, keyed by field name.
///
/// Built fresh for every load; afterwards it is an ordinary mutable map.
///
/// ```rust
/// use cfgengine::{ConfigValue, ResultTree};
///
/// let source: ConfigValue = serde_json::json!({"db": {"port": 5432}}).into();
/// let ConfigValue::Map(map) = source else { unreachable!() };
///
/// let mut tree = ResultTree::from(map);
/// assert_eq!(tree.lookup("db.port"), Some(&ConfigValue::Integer(5432)));
///
/// tree.set_field("debug", true);
/// assert!(tree.field("debug").is_ok());
/// assert!(tree.field("nope").is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTree {
    entries: IndexMap<String, Entry>,
}

impl ResultTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Entry> {
        self.entries.get_mut(key)
    }

    /// Like [`get`](Self::get), but a missing key is an error.
    pub fn field(&self, name: &str) -> Result<&Entry> {
        self.entries
            .get(name)
            .ok_or_else(|| ConfigError::MissingField(name.to_string()))
    }

    /// Sets `name`, replacing any previous entry in place. Maps are wrapped
    /// into nested trees.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<ConfigValue>) {
        self.entries.insert(name.into(), Entry::from(value.into()));
    }

    /// Removes `name`, keeping the order of the remaining fields.
    pub fn remove_field(&mut self, name: &str) -> Result<Entry> {
        self.entries
            .shift_remove(name)
            .ok_or_else(|| ConfigError::MissingField(name.to_string()))
    }

    /// Follows a dotted path through nested trees to a value.
    ///
    /// Returns `None` if a segment is missing, if an intermediate segment
    /// is not a tree, or if the path ends on a tree.
    pub fn lookup(&self, path: &str) -> Option<&ConfigValue> {
        match self.lookup_entry(path)? {
            Entry::Value(value) => Some(value),
            Entry::Tree(_) => None,
        }
    }

    /// Follows a dotted path to an entry of any kind.
    pub fn lookup_entry(&self, path: &str) -> Option<&Entry> {
        let mut segments = path.split('.');
        let mut entry = self.entries.get(segments.next()?)?;
        for segment in segments {
            entry = entry.as_tree()?.entries.get(segment)?;
        }
        Some(entry)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Converts back into a [`ConfigValue::Map`].
    pub fn into_config(self) -> ConfigValue {
        ConfigValue::Map(
            self.entries
                .into_iter()
                .map(|(k, v)| (k, v.into_config()))
                .collect(),
        )
    }
}

impl From<ConfigMap> for ResultTree {
    fn from(map: ConfigMap) -> Self {
        Self {
            entries: map.into_iter().map(|(k, v)| (k, Entry::from(v))).collect(),
        }
    }
}

impl Index<&str> for ResultTree {
    type Output = Entry;

    /// Panics if `key` is missing; use [`field`](ResultTree::field) to get an
    /// error instead.
    fn index(&self, key: &str) -> &Entry {
        match self.entries.get(key) {
            Some(entry) => entry,
            None => panic!("config object has no attribute '{}'", key),
        }
    }
}

impl Serialize for ResultTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, entry) in &self.entries {
            map.serialize_entry(key, entry)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> ResultTree {
        let source = r#"{
            "name": "svc",
            "db": {"host": "localhost", "ports": [1, {"x": 2}]},
            "empty": {}
        }"#;
        ResultTree::from(serde_json::from_str::<ConfigMap>(source).unwrap())
    }

    #[test]
    fn test_nested_maps_become_trees() {
        let tree = tree();
        assert_eq!(tree["name"].as_str(), Some("svc"));
        let db = tree["db"].as_tree().unwrap();
        assert_eq!(db["host"].as_str(), Some("localhost"));
        assert!(tree["empty"].as_tree().unwrap().is_empty());
    }

    #[test]
    fn test_lists_stay_values() {
        let tree = tree();
        let ports = tree.lookup("db.ports").unwrap().as_list().unwrap();
        assert!(ports[1].is_map());
    }

    #[test]
    fn test_missing_field() {
        let err = tree().field("nope").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref name) if name == "nope"));
        assert_eq!(err.to_string(), "config object has no attribute 'nope'");
    }

    #[test]
    #[should_panic(expected = "config object has no attribute 'nope'")]
    fn test_index_missing_panics() {
        let _ = &tree()["nope"];
    }

    #[test]
    fn test_set_field() {
        let mut tree = tree();
        tree.set_field("name", "other");
        tree.set_field("extra", ConfigValue::Map(ConfigMap::new()));
        assert_eq!(tree.keys().collect::<Vec<_>>(), vec!["name", "db", "empty", "extra"]);
        assert_eq!(tree["name"].as_str(), Some("other"));
        assert!(tree["extra"].as_tree().is_some());
    }

    #[test]
    fn test_remove_field() {
        let mut tree = tree();
        let removed = tree.remove_field("name").unwrap();
        assert_eq!(removed.as_str(), Some("svc"));
        assert_eq!(tree.keys().collect::<Vec<_>>(), vec!["db", "empty"]);
        assert!(matches!(
            tree.remove_field("name"),
            Err(ConfigError::MissingField(_))
        ));
    }

    #[test]
    fn test_lookup() {
        let tree = tree();
        assert_eq!(tree.lookup("db.host"), Some(&ConfigValue::from("localhost")));
        assert_eq!(tree.lookup("db"), None);
        assert!(tree.lookup_entry("db").is_some());
        assert_eq!(tree.lookup("name.deeper"), None);
        assert_eq!(tree.lookup("db.missing"), None);
    }

    #[test]
    fn test_into_config_round_trip() {
        let source = ConfigValue::from(serde_json::json!({"a": {"b": [1, 2]}, "c": null}));
        let ConfigValue::Map(map) = source.clone() else {
            panic!("expected map");
        };
        assert_eq!(ResultTree::from(map).into_config(), source);
    }

    #[test]
    fn test_serialize_keeps_order() {
        let json = serde_json::to_string(&tree()).unwrap();
        assert!(json.starts_with("{\"name\":\"svc\",\"db\":{\"host\""));
    }
}
