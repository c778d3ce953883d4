//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use cup_core::{SelectionPolicy, UpdateType};

/// Cup - check container images for updates
#[derive(Parser, Debug)]
#[command(name = "cup")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to config file (defaults to ~/.cup/config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show version information
    Version(VersionArgs),

    /// Check images for newer versions or rebuilt digests
    Check(CheckArgs),
}

// Version command
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// Check command
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Image references (e.g., ghcr.io/owner/app:v1.2.3)
    #[arg(required = true)]
    pub images: Vec<String>,

    /// Locally deployed digest (repeatable; only with a single image)
    #[arg(short, long = "digest", value_name = "DIGEST")]
    pub digests: Vec<String>,

    /// Ignore updates of this granularity and larger
    #[arg(long, default_value = "none", value_name = "none|major|minor|patch")]
    pub ignore: UpdateType,

    /// How to choose the latest tag (overrides config)
    #[arg(long, value_name = "newest|first-listed")]
    pub policy: Option<SelectionPolicy>,

    /// Use plain HTTP for the registries of these images
    #[arg(long)]
    pub insecure: bool,

    /// Username for the token exchange
    #[arg(short, long, requires = "password")]
    pub username: Option<String>,

    /// Password or access token for the token exchange
    #[arg(short, long, env = "CUP_PASSWORD", hide_env_values = true, requires = "username")]
    pub password: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
