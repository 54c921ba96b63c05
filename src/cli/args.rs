//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::AdapterKind;

/// Vessel meta-framework CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Project root directory (overrides `[app] root`)
    #[arg(short, long, global = true, value_hint = clap::ValueHint::DirPath)]
    pub root: Option<PathBuf>,

    /// Config file path (default: vessel.toml)
    #[arg(short, long, global = true, default_value = "vessel.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Crawl the app and write deployable output
    #[command(visible_alias = "b")]
    Build {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Start the development server
    #[command(visible_alias = "serve")]
    Dev {
        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<std::net::IpAddr>,

        /// Port number to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Watch the app directory for route changes
        #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        watch: Option<bool>,
    },

    /// Print the route table in match order
    #[command(visible_alias = "r")]
    Routes {
        /// Output style
        #[arg(short, long, value_enum, default_value_t = RoutesStyle::Tree)]
        style: RoutesStyle,
    },
}

/// Build command arguments.
#[derive(clap::Args, Debug, Clone)]
pub struct BuildArgs {
    /// Deployment target
    #[arg(short, long, value_enum)]
    pub adapter: Option<AdapterKind>,

    /// Emit `/about` instead of `/about/`
    #[arg(long)]
    pub no_trailing_slash: bool,

    /// Maximum number of pages rendered at once
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutesStyle {
    Tree,
    List,
}

impl Cli {
    pub const fn is_dev(&self) -> bool {
        matches!(self.command, Commands::Dev { .. })
    }
}
