//! tdb - Tenant store administration CLI
//!
//! Provisions, migrates and inspects per-tenant SQLite stores using the same
//! engine the application runs on every tenant access.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod commands;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive(format!("tdb={default_level}").parse()?)
                .add_directive(format!("tdb_core={default_level}").parse()?),
        )
        .init();

    let context = commands::Context::load(&cli)?;

    match cli.command {
        Commands::Migrate { tenants, all } => {
            commands::migrate::execute(&context, &tenants, all).await
        }
        Commands::Status { tenant, json } => commands::status::execute(&context, &tenant, json),
        Commands::Check => commands::check::execute(&context),
        Commands::List => commands::list::execute(&context),
    }
}
