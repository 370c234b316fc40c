//! folio - A static site generator with inherited metadata and pluggable features.

mod build;
mod cache;
mod cli;
mod config;
mod feature;
mod features;
mod filter;
mod graph;
mod logger;
mod meta;
mod render;
mod scan;
mod site;

use anyhow::{Context, Result};
use build::{build_site, check_site, dump_meta};
use cache::BuildCache;
use clap::Parser;
use cli::{Cli, Commands};
use config::SiteConfig;
use features::DEFAULT_FEATURES;
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    if config.build.jobs > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.build.jobs)
            .build_global()
            .context("failed to configure worker threads")?;
    }

    let cache = if cli.no_cache() {
        BuildCache::disabled()
    } else {
        BuildCache::open(&config.build.cache)
    };

    match &cli.command {
        Commands::Build { build_args } => build_site(&config, &cache, build_args.clean).map(|_| ()),
        Commands::Check { .. } => check_site(&config, &cache).map(|_| ()),
        Commands::DumpMeta { pages } => {
            let dump = dump_meta(&config, &cache, pages)?;
            println!("{}", serde_json::to_string_pretty(&dump)?);
            Ok(())
        }
    }
}

/// Load and validate configuration from CLI arguments.
///
/// A missing config file is not an error: every setting has a default.
fn load_config(cli: &Cli) -> Result<SiteConfig> {
    let root = cli.root.as_deref().unwrap_or(Path::new("./"));
    let config_path = root.join(&cli.config);

    let mut config = if config_path.exists() {
        SiteConfig::from_path(&config_path)?
    } else {
        SiteConfig::default()
    };
    config.update_with_cli(cli);
    config.validate(DEFAULT_FEATURES)?;
    Ok(config)
}
