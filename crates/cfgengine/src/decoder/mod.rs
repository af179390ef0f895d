//! Format decoders and the extension registry.
//!
//! A [`FormatDecoder`] turns the text of a config file into a raw
//! [`ConfigMap`]; it does not render templates. Rendering is a separate step
//! performed by [`TemplateEngine`](crate::TemplateEngine), and the
//! [`ConfigLoader`](crate::ConfigLoader) composes the two.
//!
//! Built-in decoders:
//!
//! | Extension | Decoder |
//! |-----------|---------|
//! | `json` | [`JsonDecoder`] |
//! | `ini`, `INI` | [`IniDecoder`] |
//! | `yaml`, `yml` | [`YamlDecoder`] |
//!
//! Extensions are matched exactly, so `ini` and `INI` are independent
//! bindings.

mod ini;
mod json;
mod registry;
mod yaml;

use std::path::Path;

use tracing::{error, info};

use crate::error::{ConfigError, Result};
use crate::value::ConfigMap;

pub use ini::IniDecoder;
pub use json::JsonDecoder;
pub use registry::{DecoderFactory, ParserRegistry};
pub use yaml::YamlDecoder;

/// Turns config source text into a raw, unrendered tree.
pub trait FormatDecoder {
    /// Human-readable format name used in error messages (`"JSON"`, `"INI"`).
    fn name(&self) -> &'static str;

    /// Decodes already-read source text. `path` is only used for diagnostics.
    fn decode_str(&self, source: &str, path: &Path) -> Result<ConfigMap>;

    /// Reads and decodes the file at `path`.
    ///
    /// Fails with [`ConfigError::NotFound`] when the file does not exist.
    fn decode(&self, path: &Path) -> Result<ConfigMap> {
        info!(path = %path.display(), format = self.name(), "loading configuration");
        let source = read_source(path)?;
        self.decode_str(&source, path).inspect_err(|e| {
            error!(path = %path.display(), error = %e, "failed to parse configuration");
        })
    }
}

/// Reads a config file, mapping a missing file to [`ConfigError::NotFound`].
pub(crate) fn read_source(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            error!(path = %path.display(), "configuration file not found");
            Err(ConfigError::NotFound(path.display().to_string()))
        }
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Builds a [`ConfigError::DecodeError`] for `format` at `path`.
pub(crate) fn decode_error<E>(format: &'static str, path: &Path, source: E) -> ConfigError
where
    E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
{
    ConfigError::DecodeError {
        path: path.to_path_buf(),
        format,
        source: source.into(),
    }
}
