//! The binding environment templates are rendered against.
//!
//! [`TemplateEnv`] owns a MiniJinja [`Environment`] and tracks, next to it,
//! which globals are functions and which of those return native values.
//! MiniJinja stores functions and variables in the same global namespace;
//! the extra bookkeeping is what lets the call extractor and the conflict
//! rule tell them apart.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use minijinja::functions::Function;
use minijinja::value::{FunctionArgs, FunctionResult, Value};
use minijinja::{context, Environment, UndefinedBehavior};
use tracing::debug;

use super::builtins::{self, Module, ModuleRegistry};

/// Functions, filters and variables visible to config templates.
///
/// Registries are plain values: build one per loader (or per test) during
/// initialization and pass it by reference to the engine.
///
/// # Example
///
/// ```rust
/// use cfgengine::TemplateEnv;
///
/// let mut env = TemplateEnv::new();
/// env.register_function("double", |x: i64| x * 2);
/// env.register_filter("shout", |s: String| s.to_uppercase());
/// assert!(env.is_function("double"));
/// assert!(!env.returns_native("double"));
/// assert!(env.returns_native("import_obj"));
/// ```
pub struct TemplateEnv {
    env: Environment<'static>,
    /// Global function name to its `returns_native` flag.
    functions: BTreeMap<String, bool>,
    filters: BTreeSet<String>,
    modules: ModuleRegistry,
}

impl TemplateEnv {
    /// Creates an environment with the built-in `env_var` and `import_obj`
    /// functions registered.
    pub fn new() -> Self {
        let mut env = Self::empty();
        builtins::register_builtins(&mut env);
        env
    }

    /// Creates an environment without any functions or filters beyond
    /// MiniJinja's own.
    ///
    /// Undefined names are errors rather than empty strings.
    pub fn empty() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Self {
            env,
            functions: BTreeMap::new(),
            filters: BTreeSet::new(),
            modules: ModuleRegistry::new(),
        }
    }

    /// Binds `f` as a global function under `name`.
    ///
    /// An existing binding with the same name is replaced, including its
    /// native flag.
    pub fn register_function<F, Rv, Args>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Function<Rv, Args>,
        Rv: FunctionResult,
        Args: for<'a> FunctionArgs<'a>,
    {
        self.register_function_value(name, Value::from_function(f))
    }

    /// Binds `f` under the name it was declared with.
    ///
    /// Intended for `fn` items; closures have no declared name.
    pub fn register_fn<F, Rv, Args>(&mut self, f: F) -> &mut Self
    where
        F: Function<Rv, Args>,
        Rv: FunctionResult,
        Args: for<'a> FunctionArgs<'a>,
    {
        self.register_function(declared_name::<F>(), f)
    }

    /// Binds a function that returns native values and flags it as such.
    pub fn register_native_function<F, Rv, Args>(
        &mut self,
        name: impl Into<String>,
        f: F,
    ) -> &mut Self
    where
        F: Function<Rv, Args>,
        Rv: FunctionResult,
        Args: for<'a> FunctionArgs<'a>,
    {
        let name = name.into();
        self.register_function(name.clone(), f);
        self.mark_returns_native(&name);
        self
    }

    /// Binds an already callable value (e.g. a module attribute) as a global
    /// function.
    pub fn register_function_value(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        let name = name.into();
        debug!(name = %name, "registering template function");
        self.env.add_global(name.clone(), value);
        self.functions.insert(name, false);
        self
    }

    /// Flags the function bound to `name` as returning native values.
    ///
    /// Returns `false` if no function is bound to `name`.
    pub fn mark_returns_native(&mut self, name: &str) -> bool {
        match self.functions.get_mut(name) {
            Some(native) => {
                *native = true;
                true
            }
            None => false,
        }
    }

    /// Binds a one-argument-plus-options value transform usable as
    /// `{{ value | name }}`.
    ///
    /// Filters live in their own namespace and are never native-returning.
    pub fn register_filter<F, Rv, Args>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Function<Rv, Args>,
        Rv: FunctionResult,
        Args: for<'a> FunctionArgs<'a>,
    {
        let name = name.into();
        debug!(name = %name, "registering template filter");
        self.env.add_filter(name.clone(), f);
        self.filters.insert(name);
        self
    }

    /// Binds a filter under the name it was declared with.
    pub fn register_filter_fn<F, Rv, Args>(&mut self, f: F) -> &mut Self
    where
        F: Function<Rv, Args>,
        Rv: FunctionResult,
        Args: for<'a> FunctionArgs<'a>,
    {
        self.register_filter(declared_name::<F>(), f)
    }

    /// Binds a plain variable. A function previously bound under the same
    /// name stops being one. A [`ConfigValue`](crate::ConfigValue) can be
    /// passed directly.
    pub fn add_variable(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let name = name.into();
        self.functions.remove(&name);
        self.env.add_global(name, value.into());
        self
    }

    /// Makes `module` resolvable by `import_obj`.
    pub fn register_module(&mut self, module: Module) -> &mut Self {
        self.modules.register(module);
        self
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    pub fn is_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn is_filter(&self, name: &str) -> bool {
        self.filters.contains(name)
    }

    /// Whether `name` is a function flagged as native-returning.
    pub fn returns_native(&self, name: &str) -> bool {
        self.functions.get(name).copied().unwrap_or(false)
    }

    /// Names of all global functions, sorted.
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Names of all registered filters, sorted.
    pub fn filter_names(&self) -> impl Iterator<Item = &str> {
        self.filters.iter().map(String::as_str)
    }

    /// Read access to the underlying MiniJinja environment.
    pub fn environment(&self) -> &Environment<'static> {
        &self.env
    }

    pub(crate) fn render_str(&self, template: &str) -> Result<String, minijinja::Error> {
        self.env.render_str(template, context! {})
    }

    pub(crate) fn eval_expression(&self, expression: &str) -> Result<Value, minijinja::Error> {
        self.env.compile_expression(expression)?.eval(context! {})
    }
}

impl Default for TemplateEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TemplateEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateEnv")
            .field("functions", &self.functions)
            .field("filters", &self.filters)
            .field("modules", &self.modules)
            .finish()
    }
}

/// Last path segment of a type name: `my_crate::util::shout` -> `shout`.
fn declared_name<F>() -> String {
    let full = std::any::type_name::<F>();
    full.rsplit("::").next().unwrap_or(full).to_string()
}
