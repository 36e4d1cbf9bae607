//! Site configuration management for `sauerkraut.toml`.
//!
//! # Sections
//!
//! | Section     | Purpose                                           |
//! |-------------|---------------------------------------------------|
//! | `[base]`    | Site metadata (title, author, language)           |
//! | `[build]`   | Directories, ignore list, URI rewrites, layouts   |
//! | `[serve]`   | Development server (port, interface, watch)       |
//! | `[extra]`   | User-defined fields exposed to layouts            |
//!
//! # Example
//!
//! ```toml
//! [base]
//! title = "My Notes"
//!
//! [build]
//! content = "content"
//! output = "build"
//!
//! [serve]
//! port = 3005
//!
//! [extra]
//! analytics_id = "UA-12345"
//! ```

mod base;
mod build;
pub mod defaults;
mod error;
mod serve;

pub use error::ConfigError;

use base::BaseConfig;
use build::BuildConfig;
use serve::ServeConfig;

use crate::cli::{Cli, Commands};
use anyhow::{Result, bail};
use educe::Educe;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

/// Root configuration structure representing sauerkraut.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Absolute project root (set after loading)
    #[serde(skip)]
    pub root: PathBuf,

    /// Basic site information
    #[serde(default)]
    pub base: BaseConfig,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// User-defined extra fields
    #[serde(default)]
    pub extra: BTreeMap<String, toml::Value>,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::Toml)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Load the project config selected by the CLI, falling back to defaults
    /// when the file does not exist, then apply CLI overrides and validate.
    pub fn load(cli: &Cli) -> Result<Self> {
        let path = cli.dir.join(&cli.config);
        let mut config = if path.exists() {
            Self::from_path(&path)?
        } else {
            Self::default()
        };
        config.update_with_cli(cli);
        config.validate(&cli.command)?;
        Ok(config)
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli) {
        self.config_path = Self::normalize_path(&cli.dir.join(&cli.config));
        self.update_path_with_root(&cli.dir);

        if let Commands::Serve {
            interface, port, ..
        } = &cli.command
        {
            Self::update_option(&mut self.serve.interface, interface.as_ref());
            Self::update_option(&mut self.serve.port, port.as_ref());
        }
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Resolve every directory against `root` and make it absolute.
    pub fn update_path_with_root(&mut self, root: &Path) {
        let root = Self::normalize_path(root);

        self.build.content = Self::normalize_path(&root.join(&self.build.content));
        self.build.layouts = Self::normalize_path(&root.join(&self.build.layouts));
        self.build.partials = Self::normalize_path(&root.join(&self.build.partials));
        self.build.static_dir = Self::normalize_path(&root.join(&self.build.static_dir));
        self.build.output = Self::normalize_path(&root.join(&self.build.output));
        self.root = root;
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            // For non-existent paths, manually make them absolute
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate configuration for the current command
    pub fn validate(&self, command: &Commands) -> Result<()> {
        if self.base.title.trim().is_empty() {
            bail!(ConfigError::validation("base.title", "must not be empty"));
        }

        if self.build.default_layout.trim().is_empty() {
            bail!(ConfigError::validation(
                "build.default_layout",
                "must not be empty"
            ));
        }

        for (index, rewrite) in self.build.rewrite.iter().enumerate() {
            if let Err(err) = Regex::new(&rewrite.pattern) {
                bail!(ConfigError::validation(
                    format!("build.rewrite[{index}].pattern"),
                    format!("invalid regex: {err}")
                ));
            }
        }

        if self.serve.port == 0 {
            bail!(ConfigError::validation("serve.port", "must not be 0"));
        }

        if self.build.content.starts_with(&self.build.output) {
            bail!(ConfigError::validation(
                "build.output",
                "must not be or contain the content directory"
            ));
        }

        if matches!(command, Commands::Build { .. } | Commands::Serve { .. })
            && !self.build.content.is_dir()
        {
            bail!(ConfigError::validation(
                "build.content",
                format!("directory `{}` not found", self.build.content.display())
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_extra_fields() {
        let config = SiteConfig::from_str(
            r#"
            [extra]
            analytics_id = "UA-1"
        "#,
        )
        .unwrap();
        assert_eq!(
            config.extra.get("analytics_id").and_then(|v| v.as_str()),
            Some("UA-1")
        );
    }

    #[test]
    fn test_unknown_section_is_rejected() {
        let err = SiteConfig::from_str("[deploy]\nforce = true").unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn test_load_without_config_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("content")).unwrap();
        let dir_arg = dir.path().to_str().unwrap();

        let config = SiteConfig::load(&cli(&["sk", "-D", dir_arg, "build"])).unwrap();
        assert!(config.build.content.is_absolute());
        assert!(config.build.content.ends_with("content"));
        assert!(config.build.output.ends_with("build"));
        assert_eq!(config.base.title, "Website");
    }

    #[test]
    fn test_load_applies_serve_overrides() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("content")).unwrap();
        fs::write(dir.path().join("sauerkraut.toml"), "[serve]\nport = 8000\n").unwrap();
        let dir_arg = dir.path().to_str().unwrap();

        let config = SiteConfig::load(&cli(&["sk", "-D", dir_arg, "serve"])).unwrap();
        assert_eq!(config.serve.port, 8000);

        let args = ["sk", "-D", dir_arg, "serve", "-p", "9000"];
        let config = SiteConfig::load(&cli(&args)).unwrap();
        assert_eq!(config.serve.port, 9000);
    }

    #[test]
    fn test_validate_missing_content_dir() {
        let dir = TempDir::new().unwrap();
        let dir_arg = dir.path().to_str().unwrap();

        let err = SiteConfig::load(&cli(&["sk", "-D", dir_arg, "build"])).unwrap_err();
        let err = err.downcast_ref::<ConfigError>().unwrap();
        assert!(matches!(err, ConfigError::Validation { field, .. } if field == "build.content"));

        // `new` creates the content tree itself
        assert!(SiteConfig::load(&cli(&["sk", "-D", dir_arg, "new"])).is_ok());
    }

    #[test]
    fn test_validate_bad_rewrite_pattern() {
        let mut config = SiteConfig::from_str(
            r#"
            [[build.rewrite]]
            pattern = "("
            replace = ""
        "#,
        )
        .unwrap();
        config.update_path_with_root(Path::new("/tmp/site"));

        let err = config.validate(&Commands::New).unwrap_err();
        assert!(err.to_string().contains("build.rewrite[0].pattern"));
    }

    #[test]
    fn test_validate_output_inside_content() {
        let mut config = SiteConfig::from_str("[build]\noutput = \"content\"").unwrap();
        config.update_path_with_root(Path::new("/tmp/site"));

        let err = config.validate(&Commands::New).unwrap_err();
        assert!(err.to_string().contains("build.output"));
    }
}
