//! CLI argument definitions using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tenant store administration
#[derive(Parser, Debug)]
#[command(name = "tdb")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (TOML)
    #[arg(long, global = true, env = "TDB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding tenant stores (overrides config and TDB_DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bring tenant stores to the latest schema version
    Migrate {
        /// Tenant IDs to migrate
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        tenants: Vec<String>,

        /// Migrate every tenant found in the data directory
        #[arg(long)]
        all: bool,
    },

    /// Show a tenant store's schema version and pending steps
    Status {
        /// Tenant ID
        tenant: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate the migration catalogue
    Check,

    /// List tenants with a store in the data directory
    List,
}
