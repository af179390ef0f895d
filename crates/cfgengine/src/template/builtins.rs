//! Built-in template functions and the module table behind `import_obj`.
//!
//! - `env_var(name, default="")` reads the process environment.
//! - `import_obj(path)` resolves a dotted path against a [`ModuleRegistry`]
//!   and returns the module or one of its attributes as a native value.
//!
//! Rust has no runtime import, so "loadable units" are [`Module`]s that the
//! host registers up front:
//!
//! ```rust
//! use cfgengine::{Module, TemplateEnv};
//! use minijinja::Value;
//!
//! let mut env = TemplateEnv::new();
//! env.register_module(
//!     Module::new("app.handlers")
//!         .attr("retries", 3)
//!         .attr("greet", Value::from_function(|name: String| format!("hi {name}"))),
//! );
//! let retries = env.modules().import("app.handlers.retries").unwrap();
//! assert_eq!(retries, Value::from(3));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use minijinja::value::{Enumerator, Object, ObjectRepr, Value};
use minijinja::ErrorKind;

use super::TemplateEnv;
use crate::error::ImportError;

/// Name of the built-in environment variable lookup.
pub const ENV_VAR_FUNCTION: &str = "env_var";

/// Name of the built-in dotted-path resolver.
pub const IMPORT_FUNCTION: &str = "import_obj";

/// Registers `env_var` and the native-returning `import_obj` on `env`.
pub(crate) fn register_builtins(env: &mut TemplateEnv) {
    env.register_function(ENV_VAR_FUNCTION, env_var);

    let modules = env.modules().clone();
    env.register_native_function(
        IMPORT_FUNCTION,
        move |path: String| -> Result<Value, minijinja::Error> {
            modules.import(&path).map_err(|e| {
                minijinja::Error::new(ErrorKind::InvalidOperation, e.to_string()).with_source(e)
            })
        },
    );
}

/// Returns the environment variable `name`, or `default` (empty string when
/// omitted) if it is not set.
pub fn env_var(name: String, default: Option<String>) -> String {
    std::env::var(&name).unwrap_or_else(|_| default.unwrap_or_default())
}

/// A named unit of values that templates can reach through `import_obj`.
///
/// Inside templates a module behaves like an object: `import_obj("m").attr`
/// reads an attribute. Converted to a config value it stays opaque.
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    attrs: IndexMap<String, Value>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: IndexMap::new(),
        }
    }

    /// Adds or replaces an attribute.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, attr: &str) -> Option<&Value> {
        self.attrs.get(attr)
    }
}

impl Object for Module {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        self.attrs.get(key.as_str()?).cloned()
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Values(self.attrs.keys().map(|k| Value::from(k.as_str())).collect())
    }

    fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<module '{}'>", self.name)
    }
}

/// Shared table of modules, keyed by full dotted name.
///
/// Cloning is cheap and clones share the table, which is how the
/// `import_obj` closure sees modules registered after it.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: Arc<RwLock<BTreeMap<String, Module>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `module`, replacing one registered under the same name.
    pub fn register(&self, module: Module) {
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        modules.insert(module.name.clone(), module);
    }

    pub fn get(&self, name: &str) -> Option<Module> {
        let modules = self.modules.read().unwrap_or_else(PoisonError::into_inner);
        modules.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let modules = self.modules.read().unwrap_or_else(PoisonError::into_inner);
        modules.keys().cloned().collect()
    }

    /// Resolves a dotted path.
    ///
    /// A path without a dot names a module. Otherwise it is split at the last
    /// dot into a module name and an attribute of that module.
    pub fn import(&self, path: &str) -> Result<Value, ImportError> {
        match path.rsplit_once('.') {
            None => self
                .get(path)
                .map(Value::from_object)
                .ok_or_else(|| ImportError::new(path, format!("no module named '{}'", path))),
            Some((module_name, attr)) => {
                let module = self.get(module_name).ok_or_else(|| {
                    ImportError::new(path, format!("no module named '{}'", module_name))
                })?;
                module.get(attr).cloned().ok_or_else(|| {
                    ImportError::new(
                        path,
                        format!("module '{}' has no attribute '{}'", module_name, attr),
                    )
                })
            }
        }
    }
}
