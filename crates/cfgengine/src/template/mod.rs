//! Template resolution for config values.
//!
//! Every string leaf of a decoded config is treated as a MiniJinja template
//! and rendered against a [`TemplateEnv`]. Non-string leaves pass through
//! untouched and the shape of the tree never changes.
//!
//! # Native-returning functions
//!
//! Rendering normally produces text. Functions registered with
//! [`TemplateEnv::register_native_function`] are different: when a template
//! is nothing but a single call to one of them, the call's value is kept as
//! is, so `"{{ import_obj('app.handlers') }}"` resolves to the module object
//! rather than its string form.
//!
//! A template that calls two different native-returning functions has no
//! single value to keep and is rejected with
//! [`ConfigError::TemplateConflict`](crate::ConfigError::TemplateConflict).
//! The check is static, done by [`FunctionCallExtractor`] before rendering.
//!
//! # Built-ins
//!
//! [`TemplateEnv::new`] installs `env_var(name, default="")` and the
//! native-returning `import_obj(path)`; see [`builtins`].

pub mod builtins;
mod engine;
mod environment;
mod extract;

pub use builtins::{env_var, Module, ModuleRegistry, ENV_VAR_FUNCTION, IMPORT_FUNCTION};
pub use engine::TemplateEngine;
pub use environment::TemplateEnv;
pub use extract::{FunctionCallExtractor, SoleCall};
