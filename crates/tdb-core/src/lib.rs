//! tdb-core - Per-tenant store provisioning and schema migration
//!
//! Every tenant owns a private SQLite file, created lazily on first use. This
//! crate brings each file from whatever state it is in to the current schema
//! before anything else touches it:
//!
//! - **migrate**: version counter, legacy reconciliation, registry, apply loop
//! - **schema**: the concrete tenant schema catalogue
//! - **tenant**: tenant ids, store handles and the provisioning entry point
//! - **config**: data directory and connection settings
//!
//! # Example
//!
//! ```rust,no_run
//! use tdb_core::{StoreConfig, TenantId, TenantProvisioner, TenantSchema};
//!
//! fn example() -> tdb_core::Result<()> {
//!     let provisioner = TenantProvisioner::new(
//!         StoreConfig::new("/var/lib/app/tenants"),
//!         TenantSchema::standard()?,
//!     )?;
//!
//!     let store = provisioner.ensure_current(&TenantId::new("acme")?)?;
//!     store.conn().execute("DELETE FROM config WHERE key = 'stale'", [])?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod migrate;
pub mod schema;
pub mod tenant;

// Re-export commonly used types
pub use config::{JournalMode, StoreConfig};
pub use error::{Error, RegistryError, Result};
pub use migrate::{
    LegacySignature, MigrationRegistry, MigrationReport, MigrationRunner, MigrationStatus,
    MigrationStep, SchemaPredicate,
};
pub use schema::TenantSchema;
pub use tenant::{TenantId, TenantProvisioner, TenantStore};
