use std::path::Path;

use super::{decode_error, FormatDecoder};
use crate::error::Result;
use crate::value::{ConfigMap, ConfigValue};

/// Decoder for JSON documents. The top level must be an object.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl FormatDecoder for JsonDecoder {
    fn name(&self) -> &'static str {
        "JSON"
    }

    fn decode_str(&self, source: &str, path: &Path) -> Result<ConfigMap> {
        let value: ConfigValue =
            serde_json::from_str(source).map_err(|e| decode_error(self.name(), path, e))?;
        match value {
            ConfigValue::Map(map) => Ok(map),
            other => Err(decode_error(
                self.name(),
                path,
                format!("expected a top-level object, found {}", other.kind_name()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_valid_json() {
        let map = JsonDecoder
            .decode_str(r#"{"key": "value"}"#, Path::new("dummy.json"))
            .unwrap();
        assert_eq!(map["key"], ConfigValue::from("value"));
    }

    #[test]
    fn test_load_invalid_json() {
        let err = JsonDecoder
            .decode_str("invalid json", Path::new("dummy.json"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::DecodeError { format: "JSON", .. }));
    }

    #[test]
    fn test_top_level_must_be_object() {
        let err = JsonDecoder
            .decode_str("[1, 2]", Path::new("dummy.json"))
            .unwrap_err();
        assert!(err.to_string().contains("top-level object"));
    }

    #[test]
    fn test_decode_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"port": 8080, "debug": false, "tags": ["a"]}}"#).unwrap();

        let map = JsonDecoder.decode(file.path()).unwrap();
        assert_eq!(map["port"], ConfigValue::Integer(8080));
        assert_eq!(map["debug"], ConfigValue::Bool(false));
        assert_eq!(map["tags"], ConfigValue::List(vec!["a".into()]));
    }

    #[test]
    fn test_load_file_not_found() {
        let err = JsonDecoder
            .decode(Path::new("/nonexistent/config.json"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
