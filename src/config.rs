//! Configuration for j5build
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (j5build.toml)
//! - Environment variables (J5BUILD__*)
//!
//! ## Example config file (j5build.toml):
//! ```toml
//! packages = ["foo.v1", "bar.v1"]
//!
//! [source]
//! root = "./proto"
//!
//! [output]
//! path = "./descriptors.binpb"
//!
//! [lint]
//! warnings_as_errors = false
//! ignore_unused_imports = ["legacy.v1"]
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for a build
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Packages built when none are named on the command line
    #[serde(default)]
    pub packages: Vec<String>,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub lint: LintConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Root of the source tree; package `a.b.v1` lives in `<root>/a/b/v1`
    #[serde(default = "default_source_root")]
    pub root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Where `build` writes the binary descriptor set
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LintConfig {
    /// Fail lint runs on warnings as well as errors
    #[serde(default)]
    pub warnings_as_errors: bool,

    /// Packages never reported as unused imports
    #[serde(default)]
    pub ignore_unused_imports: Vec<String>,
}

fn default_source_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_output_path() -> PathBuf {
    PathBuf::from("descriptors.binpb")
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root: default_source_root(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

impl BuildConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, with `config_path` layered over the default
    /// locations
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["j5build.toml", ".j5build.toml", "config/j5build.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "j5", "j5build") {
            let xdg_config = config_dir.config_dir().join("j5build.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // J5BUILD__SOURCE__ROOT=... and so on
        builder = builder.add_source(
            Environment::with_prefix("J5BUILD")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Source root, resolved against the working directory
    pub fn source_root(&self) -> PathBuf {
        if self.source.root.is_absolute() {
            self.source.root.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.source.root)
        }
    }
}
