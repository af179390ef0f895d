use std::error::Error as _;

use minijinja::ErrorKind;
use tracing::{debug, trace};

use super::{FunctionCallExtractor, TemplateEnv};
use crate::error::{ConfigError, ImportError, Result};
use crate::value::{ConfigMap, ConfigValue};

/// Renders every string leaf of a config tree against a [`TemplateEnv`].
///
/// The engine holds no state besides the environment reference; every call
/// renders from scratch.
///
/// # Example
///
/// ```rust
/// use cfgengine::{ConfigValue, TemplateEngine, TemplateEnv};
///
/// let mut env = TemplateEnv::new();
/// env.register_native_function("ports", || vec![80, 443]);
///
/// let engine = TemplateEngine::new(&env);
/// let value = engine.render_string("{{ ports() }}", "listen").unwrap();
/// assert_eq!(value, ConfigValue::List(vec![80.into(), 443.into()]));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TemplateEngine<'env> {
    env: &'env TemplateEnv,
}

impl<'env> TemplateEngine<'env> {
    pub fn new(env: &'env TemplateEnv) -> Self {
        Self { env }
    }

    pub fn env(&self) -> &'env TemplateEnv {
        self.env
    }

    /// Renders `value` recursively, keeping its shape.
    pub fn render(&self, value: &ConfigValue) -> Result<ConfigValue> {
        self.render_value(value, "")
    }

    /// Renders every value of `map`, preserving key order.
    pub fn render_map(&self, map: &ConfigMap) -> Result<ConfigMap> {
        self.render_entries(map, "")
    }

    /// Renders a single template. `key` names the value in errors.
    pub fn render_string(&self, template: &str, key: &str) -> Result<ConfigValue> {
        let extractor = FunctionCallExtractor::new(self.env);
        let native: Vec<String> = extractor
            .extract(template)
            .into_iter()
            .filter(|name| self.env.returns_native(name))
            .collect();

        if native.len() > 1 {
            debug!(key, functions = ?native, "conflicting native-returning calls");
            return Err(ConfigError::TemplateConflict {
                key: key.to_string(),
                functions: native,
            });
        }

        if let [name] = native.as_slice() {
            if let Some(call) = extractor.sole_call(template).filter(|c| c.name == name.as_str()) {
                trace!(key, function = call.name, "evaluating native call");
                let value = self
                    .env
                    .eval_expression(call.expression)
                    .map_err(|e| classify(key, e))?;
                return Ok(ConfigValue::from_native(value));
            }
        }

        trace!(key, "rendering template");
        self.env
            .render_str(template)
            .map(ConfigValue::String)
            .map_err(|e| classify(key, e))
    }

    fn render_value(&self, value: &ConfigValue, key: &str) -> Result<ConfigValue> {
        match value {
            ConfigValue::String(template) => self.render_string(template, key),
            ConfigValue::Map(map) => self.render_entries(map, key).map(ConfigValue::Map),
            ConfigValue::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.render_value(item, &format!("{}[{}]", key, i)))
                .collect::<Result<Vec<_>>>()
                .map(ConfigValue::List),
            other => Ok(other.clone()),
        }
    }

    fn render_entries(&self, map: &ConfigMap, key: &str) -> Result<ConfigMap> {
        map.iter()
            .map(|(name, value)| {
                let child = if key.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{}", key, name)
                };
                Ok((name.clone(), self.render_value(value, &child)?))
            })
            .collect()
    }
}

/// Maps a MiniJinja failure for `key` onto a [`ConfigError`].
fn classify(key: &str, err: minijinja::Error) -> ConfigError {
    if let Some(source) = find_import_error(&err) {
        return ConfigError::ImportResolution {
            key: key.to_string(),
            source,
        };
    }
    match err.kind() {
        ErrorKind::UndefinedError
        | ErrorKind::UnknownFunction
        | ErrorKind::UnknownFilter
        | ErrorKind::UnknownTest => ConfigError::UndefinedReference {
            key: key.to_string(),
            message: err.to_string(),
        },
        _ => ConfigError::Template {
            key: key.to_string(),
            source: err,
        },
    }
}

fn find_import_error(err: &minijinja::Error) -> Option<ImportError> {
    let mut current = err.source();
    while let Some(e) = current {
        if let Some(import) = e.downcast_ref::<ImportError>() {
            return Some(import.clone());
        }
        current = e.source();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Module;
    use minijinja::Value;
    use serial_test::serial;

    fn env() -> TemplateEnv {
        let mut env = TemplateEnv::new();
        env.register_module(Module::new("m").attr("a", 1).attr("b", "two"));
        env.register_native_function("first_obj", || vec![1, 2]);
        env.register_native_function("second_obj", || true);
        env.register_function("plain", || 7);
        env
    }

    fn map(value: serde_json::Value) -> ConfigMap {
        match ConfigValue::from(value) {
            ConfigValue::Map(map) => map,
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn test_non_string_leaves_pass_through() {
        let env = env();
        let source = map(serde_json::json!({
            "n": 1, "f": 1.5, "b": false, "z": null, "list": [1, [true]], "nested": {"x": 2}
        }));
        assert_eq!(TemplateEngine::new(&env).render_map(&source).unwrap(), source);
    }

    #[test]
    fn test_key_order_is_preserved() {
        let env = env();
        let source: ConfigMap =
            serde_json::from_str(r#"{"z": "{{ 1 }}", "a": "x", "m": 3}"#).unwrap();
        let rendered = TemplateEngine::new(&env).render_map(&source).unwrap();
        assert_eq!(rendered.keys().collect::<Vec<_>>(), vec!["z", "a", "m"]);
        assert_eq!(rendered["z"], ConfigValue::from("1"));
    }

    #[test]
    fn test_plain_functions_are_stringified() {
        let env = env();
        let value = TemplateEngine::new(&env).render_string("{{ plain() }}", "k").unwrap();
        assert_eq!(value, ConfigValue::from("7"));
    }

    #[test]
    fn test_sole_native_call_keeps_type() {
        let env = env();
        let engine = TemplateEngine::new(&env);
        assert_eq!(
            engine.render_string("{{ first_obj() }}", "k").unwrap(),
            ConfigValue::List(vec![1.into(), 2.into()])
        );
        assert_eq!(
            engine.render_string("{{ import_obj('m.a') }}", "k").unwrap(),
            ConfigValue::Integer(1)
        );
    }

    #[test]
    fn test_imported_module_is_native() {
        let env = env();
        let value = TemplateEngine::new(&env)
            .render_string("{{ import_obj('m') }}", "k")
            .unwrap();
        let native = value.as_native().unwrap();
        assert_eq!(native.get_attr("b").unwrap(), Value::from("two"));
    }

    #[test]
    fn test_native_call_inside_text_is_stringified() {
        let env = env();
        let engine = TemplateEngine::new(&env);
        assert_eq!(
            engine.render_string("v={{ import_obj('m.a') }}", "k").unwrap(),
            ConfigValue::from("v=1")
        );
        assert_eq!(
            engine.render_string("{{ second_obj() | string }}", "k").unwrap(),
            ConfigValue::from("True")
        );
    }

    #[test]
    fn test_two_native_functions_conflict() {
        let env = env();
        let err = TemplateEngine::new(&env)
            .render_string("{{ second_obj() }}{{ first_obj() }}", "db.handle")
            .unwrap_err();
        match err {
            ConfigError::TemplateConflict { key, functions } => {
                assert_eq!(key, "db.handle");
                assert_eq!(functions, vec!["first_obj", "second_obj"]);
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_conflict_is_detected_in_dead_branches() {
        let env = env();
        let err = TemplateEngine::new(&env)
            .render_string("{% if false %}{{ first_obj() }}{% endif %}{{ second_obj() }}", "k")
            .unwrap_err();
        assert!(matches!(err, ConfigError::TemplateConflict { .. }));
    }

    #[test]
    fn test_same_native_function_twice_does_not_conflict() {
        let env = env();
        let value = TemplateEngine::new(&env)
            .render_string("{{ import_obj('m.a') }}{{ import_obj('m.b') }}", "k")
            .unwrap();
        assert_eq!(value, ConfigValue::from("1two"));
    }

    #[test]
    fn test_native_and_plain_mix_renders_text() {
        let env = env();
        let value = TemplateEngine::new(&env)
            .render_string("{{ plain() }}{{ import_obj('m.a') }}", "k")
            .unwrap();
        assert_eq!(value, ConfigValue::from("71"));
    }

    #[test]
    fn test_undefined_reference() {
        let env = env();
        let engine = TemplateEngine::new(&env);
        for template in ["{{ missing }}", "{{ missing() }}", "{{ 'x' | nope }}"] {
            let err = engine.render_string(template, "k").unwrap_err();
            assert!(
                matches!(err, ConfigError::UndefinedReference { .. }),
                "template {:?} gave {:?}",
                template,
                err
            );
        }
    }

    #[test]
    fn test_import_failure() {
        let env = env();
        let err = TemplateEngine::new(&env)
            .render_string("{{ import_obj('no.such.module') }}", "app.handler")
            .unwrap_err();
        match err {
            ConfigError::ImportResolution { key, source } => {
                assert_eq!(key, "app.handler");
                assert_eq!(source.path, "no.such.module");
            }
            other => panic!("expected import error, got {:?}", other),
        }
    }

    #[test]
    fn test_syntax_error_is_template_error() {
        let env = env();
        let err = TemplateEngine::new(&env)
            .render_string("{{ 1 + }}", "k")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Template { .. }));
    }

    #[test]
    fn test_error_key_paths() {
        let env = env();
        let source = map(serde_json::json!({
            "db": {"hosts": ["ok", "{{ missing }}"]}
        }));
        let err = TemplateEngine::new(&env).render_map(&source).unwrap_err();
        match err {
            ConfigError::UndefinedReference { key, .. } => assert_eq!(key, "db.hosts[1]"),
            other => panic!("expected undefined reference, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_env_var_rendering() {
        let env = env();
        let engine = TemplateEngine::new(&env);
        let template = "{{ env_var(\"CFGENGINE_ENGINE_X\", \"d\") }}";

        std::env::remove_var("CFGENGINE_ENGINE_X");
        assert_eq!(engine.render_string(template, "k").unwrap(), ConfigValue::from("d"));

        std::env::set_var("CFGENGINE_ENGINE_X", "5");
        assert_eq!(engine.render_string(template, "k").unwrap(), ConfigValue::from("5"));
        std::env::remove_var("CFGENGINE_ENGINE_X");
    }
}
