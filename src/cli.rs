//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Sauerkraut static site generator CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Project directory containing the config file and content
    #[arg(short = 'D', long, global = true, default_value = ".")]
    pub dir: PathBuf,

    /// Config file name, relative to the project directory
    #[arg(short = 'C', long, global = true, default_value = "sauerkraut.toml")]
    pub config: PathBuf,

    /// Remove the output directory before building
    #[arg(long, global = true)]
    pub clean: bool,

    /// Keep running and rebuild on file changes
    #[arg(long, global = true)]
    pub watch: bool,

    /// Print verbose diagnostics
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Render every content file into the output directory
    Build {
        /// Only build content files matching this glob (relative to the content directory)
        glob: Option<String>,
    },

    /// Render pages on demand through a development server
    Serve {
        /// Only serve content files matching this glob (relative to the content directory)
        glob: Option<String>,

        /// Interface to bind on
        #[arg(short, long)]
        interface: Option<String>,

        /// The port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Create a new draft post
    New,
}

impl Cli {
    pub const fn is_serve(&self) -> bool {
        matches!(self.command, Commands::Serve { .. })
    }

    /// Glob positional of `build`/`serve`, if any.
    pub fn glob(&self) -> Option<&str> {
        match &self.command {
            Commands::Build { glob } | Commands::Serve { glob, .. } => glob.as_deref(),
            Commands::New => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_build_with_glob_and_global_flags() {
        let cli = Cli::try_parse_from(["sk", "build", "--clean", "posts/**/*.md"]).unwrap();
        assert!(cli.clean);
        assert!(!cli.watch);
        assert_eq!(cli.glob(), Some("posts/**/*.md"));
    }

    #[test]
    fn test_global_flags_before_subcommand() {
        let cli = Cli::try_parse_from(["sk", "--dir", "site", "--verbose", "serve"]).unwrap();
        assert_eq!(cli.dir, PathBuf::from("site"));
        assert!(cli.verbose);
        assert!(cli.is_serve());
        assert_eq!(cli.glob(), None);
    }

    #[test]
    fn test_serve_overrides() {
        let cli = Cli::try_parse_from(["sk", "serve", "-p", "4000", "-i", "0.0.0.0"]).unwrap();
        match cli.command {
            Commands::Serve {
                port, interface, ..
            } => {
                assert_eq!(port, Some(4000));
                assert_eq!(interface.as_deref(), Some("0.0.0.0"));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_missing_and_unknown_commands_fail() {
        let err = Cli::try_parse_from(["sk"]).unwrap_err();
        assert_ne!(err.kind(), ErrorKind::DisplayHelp);

        let err = Cli::try_parse_from(["sk", "deploy"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn test_help_is_not_a_failure_kind() {
        let err = Cli::try_parse_from(["sk", "-h"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }
}
