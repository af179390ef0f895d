//! Locating, decoding and rendering a config file in one step.
//!
//! [`ConfigLoader`] composes the pieces of the crate:
//!
//! ```text
//! path -> ParserRegistry::resolve(extension) -> FormatDecoder::decode
//!      -> TemplateEngine::render_map -> ResultTree
//! ```
//!
//! When no path is given, the loader searches, in order:
//!
//! 1. `./config_engine.json`
//! 2. the file named by `$CFGENGINE_CONF`
//! 3. `~/.config/config_engine.json`
//!
//! The first existing file wins. File name and environment variable can be
//! changed per loader.

use std::env;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::decoder::ParserRegistry;
use crate::error::{ConfigError, Result};
use crate::template::{TemplateEngine, TemplateEnv};
use crate::tree::ResultTree;

/// File searched for when no path is given.
pub const DEFAULT_CONFIG_FILE_NAME: &str = "config_engine.json";

/// Environment variable that may point at a config file.
pub const DEFAULT_CONFIG_FILE_VAR: &str = "CFGENGINE_CONF";

/// Finds, decodes and renders configuration files.
///
/// # Example
///
/// ```rust,no_run
/// use cfgengine::ConfigLoader;
///
/// let mut loader = ConfigLoader::new();
/// loader.env_mut().register_function("double", |x: i64| x * 2);
///
/// let config = loader.load(Some("app.json".as_ref())).unwrap();
/// println!("{:?}", config.get("port"));
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    file_name: String,
    env_var: String,
    current_dir: Option<PathBuf>,
    config_home: Option<PathBuf>,
    registry: ParserRegistry,
    env: TemplateEnv,
}

impl ConfigLoader {
    /// A loader with the built-in decoders and template functions.
    pub fn new() -> Self {
        Self {
            file_name: DEFAULT_CONFIG_FILE_NAME.to_string(),
            env_var: DEFAULT_CONFIG_FILE_VAR.to_string(),
            current_dir: None,
            config_home: dirs::home_dir().map(|home| home.join(".config")),
            registry: ParserRegistry::with_defaults(),
            env: TemplateEnv::new(),
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }

    pub fn with_env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var = name.into();
        self
    }

    /// Directory searched first. Defaults to the process working directory.
    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Directory searched last. Defaults to `~/.config`.
    pub fn with_config_home(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_home = Some(dir.into());
        self
    }

    pub fn with_registry(mut self, registry: ParserRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_env(mut self, env: TemplateEnv) -> Self {
        self.env = env;
        self
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ParserRegistry {
        &mut self.registry
    }

    pub fn env(&self) -> &TemplateEnv {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut TemplateEnv {
        &mut self.env
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Returns `path` if it is an existing file.
    pub fn check_file_path(path: &Path) -> Option<PathBuf> {
        path.is_file().then(|| path.to_path_buf())
    }

    /// Picks the config file to load.
    ///
    /// An explicit file is used as is and an explicit directory is joined
    /// with the configured file name. Without a path the search locations
    /// are tried in order.
    pub fn config_file_path(&self, path: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = path {
            let candidate = if path.is_dir() {
                path.join(&self.file_name)
            } else {
                path.to_path_buf()
            };
            return Self::check_file_path(&candidate)
                .ok_or_else(|| ConfigError::NotFound(candidate.display().to_string()));
        }

        let candidates = self.search_locations();
        for candidate in &candidates {
            debug!(path = %candidate.display(), "looking for configuration");
            if let Some(found) = Self::check_file_path(candidate) {
                return Ok(found);
            }
        }

        let searched: Vec<String> = candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        Err(ConfigError::NotFound(format!(
            "no {} in any of: {}",
            self.file_name,
            searched.join(", ")
        )))
    }

    /// Locations tried when no path is given, in order.
    pub fn search_locations(&self) -> Vec<PathBuf> {
        let mut locations = Vec::new();
        match &self.current_dir {
            Some(dir) => locations.push(dir.join(&self.file_name)),
            None => locations.push(PathBuf::from(&self.file_name)),
        }
        if let Some(path) = env::var_os(&self.env_var).filter(|v| !v.is_empty()) {
            locations.push(PathBuf::from(path));
        }
        if let Some(home) = &self.config_home {
            locations.push(home.join(&self.file_name));
        }
        locations
    }

    /// Locates, decodes and renders a config file.
    pub fn load(&self, path: Option<&Path>) -> Result<ResultTree> {
        let path = self.config_file_path(path)?;
        info!(path = %path.display(), "using configuration file");
        self.load_file(&path)
    }

    /// Decodes and renders `path` using the decoder bound to its extension.
    pub fn load_file(&self, path: &Path) -> Result<ResultTree> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        let decoder = self.registry.decoder(extension)?;
        let raw = decoder.decode(path)?;
        let rendered = TemplateEngine::new(&self.env).render_map(&raw)?;
        Ok(ResultTree::from(rendered))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use serial_test::serial;
    use tempfile::TempDir;

    fn isolated(dir: &TempDir) -> ConfigLoader {
        ConfigLoader::new()
            .with_env_var("CFGENGINE_LOADER_TEST_CONF")
            .with_current_dir(dir.path().join("cwd"))
            .with_config_home(dir.path().join("home"))
    }

    #[test]
    fn test_explicit_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("custom.json");
        fs::write(&file, "{}").unwrap();
        assert_eq!(isolated(&dir).config_file_path(Some(&file)).unwrap(), file);
    }

    #[test]
    fn test_explicit_directory_uses_file_name() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("config_engine.json");
        fs::write(&file, "{}").unwrap();
        assert_eq!(
            isolated(&dir).config_file_path(Some(dir.path())).unwrap(),
            file
        );
    }

    #[test]
    fn test_explicit_missing_path() {
        let dir = TempDir::new().unwrap();
        let err = isolated(&dir)
            .config_file_path(Some(&dir.path().join("nope.json")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    #[serial]
    fn test_search_order() {
        let dir = TempDir::new().unwrap();
        let cwd = dir.path().join("cwd");
        let home = dir.path().join("home");
        fs::create_dir_all(&cwd).unwrap();
        fs::create_dir_all(&home).unwrap();
        let from_var = dir.path().join("from_var.json");
        fs::write(&from_var, "{}").unwrap();
        fs::write(home.join("config_engine.json"), "{}").unwrap();
        let loader = isolated(&dir);

        env::remove_var("CFGENGINE_LOADER_TEST_CONF");
        assert_eq!(
            loader.config_file_path(None).unwrap(),
            home.join("config_engine.json")
        );

        env::set_var("CFGENGINE_LOADER_TEST_CONF", &from_var);
        assert_eq!(loader.config_file_path(None).unwrap(), from_var);

        fs::write(cwd.join("config_engine.json"), "{}").unwrap();
        assert_eq!(
            loader.config_file_path(None).unwrap(),
            cwd.join("config_engine.json")
        );
        env::remove_var("CFGENGINE_LOADER_TEST_CONF");
    }

    #[test]
    #[serial]
    fn test_nothing_found_lists_locations() {
        let dir = TempDir::new().unwrap();
        env::remove_var("CFGENGINE_LOADER_TEST_CONF");
        let err = isolated(&dir).config_file_path(None).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("cwd"));
        assert!(msg.contains("home"));
    }

    #[test]
    fn test_load_renders_templates() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("app.json");
        fs::write(&file, r#"{"name": "{{ 'svc' | upper }}", "port": 80}"#).unwrap();

        let tree = isolated(&dir).load(Some(&file)).unwrap();
        assert_eq!(tree["name"].as_str(), Some("SVC"));
        assert_eq!(tree.lookup("port").and_then(|v| v.as_i64()), Some(80));
    }

    #[test]
    fn test_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("app.toml");
        fs::write(&file, "a = 1").unwrap();
        let err = isolated(&dir).load(Some(&file)).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownExtension(ref ext) if ext == "toml"));
    }
}
