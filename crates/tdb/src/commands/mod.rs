//! Command implementations.

pub mod check;
pub mod list;
pub mod migrate;
pub mod status;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use tdb_core::{StoreConfig, TenantId, TenantProvisioner, TenantSchema};
use tracing::debug;

use crate::cli::Cli;

/// Shared state for all commands
pub struct Context {
    pub provisioner: Arc<TenantProvisioner>,
}

impl Context {
    /// Load configuration and validate the schema catalogue.
    ///
    /// A catalogue that fails validation stops the CLI before any store is
    /// opened.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config =
            StoreConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
        if let Some(dir) = &cli.data_dir {
            config = config.with_data_dir(dir);
        }

        debug!(data_dir = ?config.data_dir, "Configuration loaded");

        let schema = TenantSchema::standard().context("Tenant migration catalogue is invalid")?;
        let provisioner = TenantProvisioner::new(config, schema)
            .context("Failed to initialise tenant data directory")?;

        Ok(Self {
            provisioner: Arc::new(provisioner),
        })
    }
}

/// Parse a tenant ID argument
pub fn parse_tenant(id: &str) -> Result<TenantId> {
    TenantId::new(id).with_context(|| format!("Invalid tenant ID {:?}", id))
}
