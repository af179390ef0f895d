use std::path::Path;

use super::{decode_error, FormatDecoder};
use crate::error::Result;
use crate::value::{ConfigMap, ConfigValue};

/// Decoder for YAML documents. The top level must be a mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlDecoder;

impl FormatDecoder for YamlDecoder {
    fn name(&self) -> &'static str {
        "YAML"
    }

    fn decode_str(&self, source: &str, path: &Path) -> Result<ConfigMap> {
        let value: ConfigValue =
            serde_yaml::from_str(source).map_err(|e| decode_error(self.name(), path, e))?;
        match value {
            ConfigValue::Map(map) => Ok(map),
            // An empty document decodes to null.
            ConfigValue::Null => Ok(ConfigMap::new()),
            other => Err(decode_error(
                self.name(),
                path,
                format!("expected a top-level mapping, found {}", other.kind_name()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    #[test]
    fn test_decode_nested_yaml() {
        let source = "server:\n  host: \"{{ env_var('HOST', 'localhost') }}\"\n  port: 8080\nflags: [a, b]\n";
        let map = YamlDecoder.decode_str(source, Path::new("app.yaml")).unwrap();

        let server = map["server"].as_map().unwrap();
        assert_eq!(
            server["host"],
            ConfigValue::from("{{ env_var('HOST', 'localhost') }}")
        );
        assert_eq!(server["port"], ConfigValue::Integer(8080));
        assert_eq!(map["flags"], ConfigValue::List(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_numeric_keys_become_strings() {
        let map = YamlDecoder
            .decode_str("codes:\n  404: missing\n", Path::new("app.yaml"))
            .unwrap();
        assert_eq!(map["codes"].as_map().unwrap()["404"], ConfigValue::from("missing"));
    }

    #[test]
    fn test_empty_document_is_empty_map() {
        let map = YamlDecoder.decode_str("", Path::new("app.yaml")).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_scalar_document_is_rejected() {
        let err = YamlDecoder
            .decode_str("just a string", Path::new("app.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::DecodeError { format: "YAML", .. }));
    }
}
