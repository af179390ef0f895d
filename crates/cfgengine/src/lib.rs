//! # cfgengine - Templated Configuration Files
//!
//! `cfgengine` loads structured configuration files (JSON, INI, YAML or any
//! registered format) and renders every string value as a Jinja template
//! against a set of functions, filters and variables. The result is a
//! [`ResultTree`] with field-style access.
//!
//! ## Core Concepts
//!
//! - [`ConfigValue`]: the ordered config tree shared by all stages
//! - [`FormatDecoder`]: turns file contents into a raw [`ConfigMap`]
//! - [`ParserRegistry`]: maps file extensions to decoders
//! - [`TemplateEnv`]: functions, filters and variables visible to templates
//! - [`TemplateEngine`]: renders string leaves, keeps native values
//! - [`ResultTree`]: the rendered config
//! - [`ConfigLoader`]: finds a file and runs all of the above
//!
//! ## Quick Start
//!
//! ```rust
//! use std::path::Path;
//! use cfgengine::{FormatDecoder, JsonDecoder, Module, ResultTree, TemplateEngine, TemplateEnv};
//!
//! let source = r#"{
//!     "name": "{{ 'billing' | upper }}",
//!     "retries": "{{ import_obj('defaults.retries') }}",
//!     "port": 8080
//! }"#;
//! let raw = JsonDecoder.decode_str(source, Path::new("app.json")).unwrap();
//!
//! let mut env = TemplateEnv::new();
//! env.register_module(Module::new("defaults").attr("retries", 3));
//!
//! let rendered = TemplateEngine::new(&env).render_map(&raw).unwrap();
//! let config = ResultTree::from(rendered);
//!
//! assert_eq!(config["name"].as_str(), Some("BILLING"));
//! assert_eq!(config.lookup("retries").and_then(|v| v.as_i64()), Some(3));
//! ```
//!
//! ## Native-Returning Functions
//!
//! A function registered with [`TemplateEnv::register_native_function`]
//! keeps its return type when a template consists of nothing but a call to
//! it. Combining two different native-returning functions in one template is
//! an error ([`ConfigError::TemplateConflict`]), detected before rendering.
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events (file loads at `info`, per-key
//! rendering at `trace`). Installing a subscriber is left to the
//! application.

pub mod decoder;
mod error;
mod loader;
pub mod template;
mod tree;
mod value;

pub use decoder::{
    DecoderFactory, FormatDecoder, IniDecoder, JsonDecoder, ParserRegistry, YamlDecoder,
};
pub use error::{ConfigError, ImportError, Result};
pub use loader::{ConfigLoader, DEFAULT_CONFIG_FILE_NAME, DEFAULT_CONFIG_FILE_VAR};
pub use template::{
    env_var, FunctionCallExtractor, Module, ModuleRegistry, SoleCall, TemplateEngine, TemplateEnv,
};
pub use tree::{Entry, ResultTree};
pub use value::{ConfigMap, ConfigValue};

// Re-export so callers can build native values without a direct dependency.
pub use minijinja;
