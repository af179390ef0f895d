//! `cfgengine` - print a resolved configuration.
//!
//! ```text
//! cfgengine                        # search ./config_engine.json, $CFGENGINE_CONF, ~/.config
//! cfgengine app.ini --format yaml
//! cfgengine conf/ --name app.json  # <dir>/app.json
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use cfgengine::{ConfigLoader, DEFAULT_CONFIG_FILE_NAME, DEFAULT_CONFIG_FILE_VAR};
use clap::{Parser, ValueEnum};
use tracing::debug;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(name = "cfgengine", version, about = "Load a config file and print the resolved tree")]
struct Cli {
    /// Config file, or a directory containing one
    path: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: Format,

    /// File name looked up in directories and search locations
    #[arg(long, default_value = DEFAULT_CONFIG_FILE_NAME)]
    name: String,

    /// Environment variable pointing at a config file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE_VAR)]
    env_var: String,

    /// Log loading and rendering steps to stderr
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let loader = ConfigLoader::new()
        .with_file_name(&cli.name)
        .with_env_var(&cli.env_var);
    debug!(locations = ?loader.search_locations(), "configured search path");

    let config = loader
        .load(cli.path.as_deref())
        .context("failed to load configuration")?;

    let output = match cli.format {
        Format::Json => serde_json::to_string_pretty(&config)?,
        Format::Yaml => serde_yaml::to_string(&config)?,
    };
    println!("{}", output.trim_end());
    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
