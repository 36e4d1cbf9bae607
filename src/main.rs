//! Sauerkraut - a static site generator for markdown notes.

mod api;
mod build;
mod cli;
mod config;
mod content;
mod embed;
mod logger;
mod markdown;
mod new;
mod serve;
mod site;
mod template;
mod utils;
mod watch;

use anyhow::Result;
use build::{BuildOptions, build_site};
use clap::{Parser, error::ErrorKind};
use cli::{Cli, Commands};
use config::SiteConfig;
use new::new_post;
use serve::serve_site;
use site::{Env, Site};
use watch::{WatchTarget, watch_for_changes_blocking};

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            // Printing can only fail on a closed stdout/stderr.
            let _ = err.print();
            std::process::exit(code);
        }
    };
    logger::set_verbose(cli.verbose);

    let config = SiteConfig::load(&cli)?;
    let env = if cli.is_serve() || cli.watch {
        Env::Development
    } else {
        Env::Production
    };

    match &cli.command {
        Commands::New => new_post(&config),
        Commands::Build { .. } => {
            let site = Site::new(config, env)?;
            let options = BuildOptions {
                clean: cli.clean,
                pattern: cli.glob().map(str::to_owned),
            };
            build_site(&site, &options)?;
            if cli.watch {
                watch_for_changes_blocking(&site, &WatchTarget::Build(options))?;
            }
            Ok(())
        }
        Commands::Serve { .. } => {
            let site = Site::new(config, env)?;
            serve_site(site, cli.glob())
        }
    }
}
