//! The configuration tree exchanged between decoders, the template engine and
//! the result tree.
//!
//! [`ConfigValue`] is a tagged union of scalars, ordered lists and
//! insertion-ordered maps. Decoders produce it, the engine renders it, and
//! [`ResultTree`](crate::ResultTree) wraps the rendered output.
//!
//! A native-returning template function may hand back something that is not
//! plain data (a module, a callable, any custom [`minijinja::value::Object`]);
//! such values are kept untouched as [`ConfigValue::Native`].

use std::fmt;

use indexmap::IndexMap;
use minijinja::value::{Value, ValueKind};
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, Serializer};

/// Insertion-ordered map of config keys to values.
pub type ConfigMap = IndexMap<String, ConfigValue>;

/// A node of a configuration tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConfigValue {
    /// Explicit null (`null` in JSON, `~` in YAML).
    #[default]
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Integral number.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// String scalar. Every string is a template until rendered.
    String(String),
    /// Ordered sequence.
    List(Vec<ConfigValue>),
    /// Ordered mapping with unique keys.
    Map(ConfigMap),
    /// Opaque value returned by a native-returning template function.
    Native(Value),
}

impl ConfigValue {
    /// Short name of the variant, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ConfigValue::Null => "null",
            ConfigValue::Bool(_) => "bool",
            ConfigValue::Integer(_) => "integer",
            ConfigValue::Float(_) => "float",
            ConfigValue::String(_) => "string",
            ConfigValue::List(_) => "list",
            ConfigValue::Map(_) => "map",
            ConfigValue::Native(_) => "native",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, ConfigValue::String(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, ConfigValue::Map(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the number as `f64`, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Integer(i) => Some(*i as f64),
            ConfigValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ConfigMap> {
        match self {
            ConfigValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_native(&self) -> Option<&Value> {
        match self {
            ConfigValue::Native(value) => Some(value),
            _ => None,
        }
    }

    /// Converts a template value into a config value, keeping its type.
    ///
    /// Plain data (numbers, strings, sequences, maps) is converted
    /// structurally. Anything else, such as custom objects or callables,
    /// becomes [`ConfigValue::Native`].
    pub fn from_native(value: Value) -> ConfigValue {
        match value.kind() {
            ValueKind::Undefined | ValueKind::None => ConfigValue::Null,
            ValueKind::Bool => ConfigValue::Bool(value.is_true()),
            // Serializing tells integers and floats apart without lossy casts.
            ValueKind::Number => match serde_json::to_value(&value) {
                Ok(serde_json::Value::Number(n)) => match n.as_i64() {
                    Some(i) => ConfigValue::Integer(i),
                    None => ConfigValue::Float(n.as_f64().unwrap_or(f64::NAN)),
                },
                _ => ConfigValue::Native(value),
            },
            ValueKind::String => match value.as_str() {
                Some(s) => ConfigValue::String(s.to_string()),
                None => ConfigValue::String(value.to_string()),
            },
            ValueKind::Seq => match value.try_iter() {
                Ok(iter) => ConfigValue::List(iter.map(ConfigValue::from_native).collect()),
                Err(_) => ConfigValue::Native(value),
            },
            ValueKind::Map => match native_map(&value) {
                Some(map) => ConfigValue::Map(map),
                None => ConfigValue::Native(value),
            },
            _ => ConfigValue::Native(value),
        }
    }

    /// Converts into a template value so it can be bound as a variable.
    pub fn to_native(&self) -> Value {
        match self {
            ConfigValue::Native(value) => value.clone(),
            other => Value::from_serialize(other),
        }
    }
}

fn native_map(value: &Value) -> Option<ConfigMap> {
    let mut map = ConfigMap::new();
    for key in value.try_iter().ok()? {
        let item = value.get_item(&key).ok()?;
        let name = match key.as_str() {
            Some(s) => s.to_string(),
            None => key.to_string(),
        };
        map.insert(name, ConfigValue::from_native(item));
    }
    Some(map)
}

impl From<ConfigValue> for Value {
    fn from(value: ConfigValue) -> Self {
        value.to_native()
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Integer(value)
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        ConfigValue::Integer(value as i64)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<Vec<ConfigValue>> for ConfigValue {
    fn from(value: Vec<ConfigValue>) -> Self {
        ConfigValue::List(value)
    }
}

impl From<ConfigMap> for ConfigValue {
    fn from(value: ConfigMap) -> Self {
        ConfigValue::Map(value)
    }
}

impl From<serde_json::Value> for ConfigValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ConfigValue::Null,
            serde_json::Value::Bool(b) => ConfigValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => ConfigValue::Integer(i),
                None => ConfigValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => ConfigValue::String(s),
            serde_json::Value::Array(items) => {
                ConfigValue::List(items.into_iter().map(ConfigValue::from).collect())
            }
            serde_json::Value::Object(map) => ConfigValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, ConfigValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for ConfigValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ConfigValue::Null => serializer.serialize_unit(),
            ConfigValue::Bool(b) => serializer.serialize_bool(*b),
            ConfigValue::Integer(i) => serializer.serialize_i64(*i),
            ConfigValue::Float(f) => serializer.serialize_f64(*f),
            ConfigValue::String(s) => serializer.serialize_str(s),
            ConfigValue::List(items) => items.serialize(serializer),
            ConfigValue::Map(map) => map.serialize(serializer),
            ConfigValue::Native(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ConfigValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ConfigValueVisitor)
    }
}

struct ConfigValueVisitor;

impl<'de> Visitor<'de> for ConfigValueVisitor {
    type Value = ConfigValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a configuration value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<ConfigValue, E> {
        Ok(ConfigValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<ConfigValue, E> {
        Ok(ConfigValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<ConfigValue, D::Error> {
        ConfigValue::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<ConfigValue, E> {
        Ok(ConfigValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<ConfigValue, E> {
        Ok(ConfigValue::Integer(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<ConfigValue, E> {
        Ok(match i64::try_from(v) {
            Ok(i) => ConfigValue::Integer(i),
            Err(_) => ConfigValue::Float(v as f64),
        })
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<ConfigValue, E> {
        Ok(ConfigValue::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ConfigValue, E> {
        Ok(ConfigValue::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<ConfigValue, E> {
        Ok(ConfigValue::String(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<ConfigValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<ConfigValue>()? {
            items.push(item);
        }
        Ok(ConfigValue::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ConfigValue, A::Error> {
        let mut map = ConfigMap::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(key) = access.next_key::<ConfigValue>()? {
            let key = match key {
                ConfigValue::String(s) => s,
                ConfigValue::Integer(i) => i.to_string(),
                ConfigValue::Float(f) => f.to_string(),
                ConfigValue::Bool(b) => b.to_string(),
                ConfigValue::Null => "null".to_string(),
                other => {
                    return Err(de::Error::custom(format!(
                        "unsupported map key of type {}",
                        other.kind_name()
                    )))
                }
            };
            let value = access.next_value::<ConfigValue>()?;
            map.insert(key, value);
        }
        Ok(ConfigValue::Map(map))
    }
}
