//! Error types for loading, decoding and rendering configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced anywhere between locating a config file and reading a
/// field out of the resolved tree.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// No decoder is registered for the requested extension.
    #[error("no parser registered for extension: {0}")]
    UnknownExtension(String),

    /// The config file (or every searched location) does not exist.
    #[error("configuration file not found: {0}")]
    NotFound(String),

    /// The file exists but could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The source was read but is not valid for its format.
    #[error("invalid {format} configuration in '{path}': {source}")]
    DecodeError {
        path: PathBuf,
        format: &'static str,
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// More than one native-returning function is called by one template.
    #[error(
        "template error for key '{key}': multiple non-string-returning functions \
         cannot be used together in the same template. Found: {}",
        functions.join(", ")
    )]
    TemplateConflict { key: String, functions: Vec<String> },

    /// The template references a name that is not bound in the environment.
    #[error("error rendering template for key '{key}': {message}")]
    UndefinedReference { key: String, message: String },

    /// `import_obj` could not resolve its dotted path.
    #[error("error rendering template for key '{key}': {source}")]
    ImportResolution { key: String, source: ImportError },

    /// Any other template failure (syntax errors, bad arguments, ...).
    #[error("error rendering template for key '{key}': {source}")]
    Template {
        key: String,
        source: minijinja::Error,
    },

    /// Field access or delete on a key the result tree does not have.
    #[error("config object has no attribute '{0}'")]
    MissingField(String),
}

/// Failure to resolve a dotted path against the module registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unable to import '{path}': {reason}")]
pub struct ImportError {
    pub path: String,
    pub reason: String,
}

impl ImportError {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for cfgengine operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_display_lists_functions() {
        let err = ConfigError::TemplateConflict {
            key: "db.handle".to_string(),
            functions: vec!["first_obj".to_string(), "second_obj".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("db.handle"));
        assert!(msg.contains("first_obj, second_obj"));
    }

    #[test]
    fn test_import_error_display() {
        let err = ImportError::new("no.such.module", "no module named 'no.such'");
        assert_eq!(
            err.to_string(),
            "unable to import 'no.such.module': no module named 'no.such'"
        );
    }

    #[test]
    fn test_decode_error_keeps_source() {
        use std::error::Error as _;

        let cause = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ConfigError::DecodeError {
            path: PathBuf::from("app.json"),
            format: "JSON",
            source: Box::new(cause),
        };
        assert!(err.to_string().contains("invalid JSON configuration in 'app.json'"));
        assert!(err.source().is_some());
    }
}
