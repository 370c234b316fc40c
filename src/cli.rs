//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// folio static site generator CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root directory (default: current directory)
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Config file name (default: folio.toml)
    #[arg(short = 'C', long, default_value = "folio.toml")]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Build arguments
#[derive(clap::Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Output directory path (relative to project root)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Clean output directory completely before building
    #[arg(long)]
    pub clean: bool,

    /// Ignore the build cache and parse every source again
    #[arg(long)]
    pub no_cache: bool,

    /// Include draft and future-dated pages
    #[arg(long)]
    pub drafts: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Load and analyze the site without writing output, then report warnings
    Check {
        /// Ignore the build cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Build the site into the output directory
    Build {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Print the resolved metadata of pages as JSON
    DumpMeta {
        /// Page source paths to dump (default: every page)
        pages: Vec<String>,
    },
}

impl Cli {
    /// Whether the cache should be bypassed for this invocation.
    pub fn no_cache(&self) -> bool {
        match &self.command {
            Commands::Check { no_cache } => *no_cache,
            Commands::Build { build_args } => build_args.no_cache,
            Commands::DumpMeta { .. } => false,
        }
    }
}
