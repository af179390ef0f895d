use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::{FormatDecoder, IniDecoder, JsonDecoder, YamlDecoder};
use crate::error::{ConfigError, Result};

/// Creates a fresh decoder for one load.
pub type DecoderFactory = Arc<dyn Fn() -> Box<dyn FormatDecoder> + Send + Sync>;

/// Maps file extensions (without the leading dot) to decoder factories.
///
/// Lookups are exact and case-sensitive. Registering an extension that is
/// already bound replaces the previous binding.
///
/// # Example
///
/// ```rust
/// use cfgengine::{JsonDecoder, ParserRegistry};
///
/// let mut registry = ParserRegistry::new();
/// registry.register_decoder::<JsonDecoder>("json5");
/// assert!(registry.resolve("json5").is_ok());
/// assert!(registry.resolve("JSON5").is_err());
/// ```
#[derive(Clone, Default)]
pub struct ParserRegistry {
    bindings: BTreeMap<String, DecoderFactory>,
}

impl ParserRegistry {
    /// Creates a registry with no bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in decoders bound.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_decoder::<JsonDecoder>("json");
        registry.register_decoder::<IniDecoder>("ini");
        registry.register_decoder::<IniDecoder>("INI");
        registry.register_decoder::<YamlDecoder>("yaml");
        registry.register_decoder::<YamlDecoder>("yml");
        registry
    }

    /// Binds `extension` to `factory`, replacing any previous binding.
    pub fn register<F>(&mut self, extension: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn FormatDecoder> + Send + Sync + 'static,
    {
        let extension = extension.into();
        debug!(extension = %extension, "registering config parser");
        self.bindings.insert(extension, Arc::new(factory));
        self
    }

    /// Binds `extension` to a decoder type built with `Default`.
    pub fn register_decoder<D>(&mut self, extension: impl Into<String>) -> &mut Self
    where
        D: FormatDecoder + Default + 'static,
    {
        self.register(extension, || Box::new(D::default()) as Box<dyn FormatDecoder>)
    }

    /// Returns the factory bound to exactly `extension`.
    pub fn resolve(&self, extension: &str) -> Result<DecoderFactory> {
        self.bindings
            .get(extension)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownExtension(extension.to_string()))
    }

    /// Resolves `extension` and builds a decoder from its factory.
    pub fn decoder(&self, extension: &str) -> Result<Box<dyn FormatDecoder>> {
        let factory = self.resolve(extension)?;
        Ok(factory())
    }

    pub fn contains(&self, extension: &str) -> bool {
        self.bindings.contains_key(extension)
    }

    /// Bound extensions in sorted order.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("extensions", &self.bindings.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{ConfigMap, ConfigValue};
    use std::path::Path;

    #[derive(Default)]
    struct MockDecoder;

    impl FormatDecoder for MockDecoder {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn decode_str(&self, _source: &str, _path: &Path) -> Result<ConfigMap> {
            let mut map = ConfigMap::new();
            map.insert("mock_key".into(), ConfigValue::from("mock_value"));
            Ok(map)
        }
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = ParserRegistry::new();
        registry.register_decoder::<MockDecoder>("mock");

        let decoder = registry.decoder("mock").unwrap();
        assert_eq!(decoder.name(), "mock");
        let map = decoder.decode_str("", Path::new("x.mock")).unwrap();
        assert_eq!(map["mock_key"], ConfigValue::from("mock_value"));
    }

    #[test]
    fn test_resolve_unknown_extension() {
        let registry = ParserRegistry::new();
        let err = registry.resolve("unknown").err().unwrap();
        assert!(matches!(err, ConfigError::UnknownExtension(ref ext) if ext == "unknown"));
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = ParserRegistry::new();
        registry.register_decoder::<JsonDecoder>("cfg");
        registry.register_decoder::<MockDecoder>("cfg");
        assert_eq!(registry.decoder("cfg").unwrap().name(), "mock");
    }

    #[test]
    fn test_extension_match_is_case_sensitive() {
        let mut registry = ParserRegistry::new();
        registry.register_decoder::<MockDecoder>("mock");
        assert!(registry.contains("mock"));
        assert!(!registry.contains("MOCK"));
        assert!(registry.resolve("Mock").is_err());
    }

    #[test]
    fn test_defaults_bind_both_ini_cases() {
        let registry = ParserRegistry::with_defaults();
        let extensions: Vec<&str> = registry.extensions().collect();
        assert_eq!(extensions, vec!["INI", "ini", "json", "yaml", "yml"]);
        assert_eq!(registry.decoder("INI").unwrap().name(), "INI");
    }
}
