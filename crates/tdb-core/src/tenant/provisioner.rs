use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, Weak};

use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::migrate::{MigrationReport, MigrationStatus};
use crate::schema::TenantSchema;
use crate::tenant::store::{open_connection, open_existing};
use crate::tenant::{TenantId, TenantStore};

/// Tenant store file extension
const STORE_EXTENSION: &str = "db";

/// Opens tenant stores and brings them to the current schema.
///
/// Concurrent calls for the same tenant are serialised so only one of them
/// migrates; calls for different tenants never wait on each other. Nothing
/// about a tenant is cached between calls: every call re-reads the stored
/// version from the file.
pub struct TenantProvisioner {
    config: StoreConfig,
    schema: TenantSchema,
    locks: Mutex<HashMap<TenantId, Weak<Mutex<()>>>>,
}

impl TenantProvisioner {
    /// Create a provisioner.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the data directory cannot
    /// be created.
    pub fn new(config: StoreConfig, schema: TenantSchema) -> Result<Self> {
        config.validate()?;
        if config.create_dirs {
            std::fs::create_dir_all(&config.data_dir)?;
        }

        Ok(Self {
            config,
            schema,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn schema(&self) -> &TenantSchema {
        &self.schema
    }

    /// Path of the tenant's database file
    pub fn store_path(&self, tenant: &TenantId) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{}.{}", tenant, STORE_EXTENSION))
    }

    /// Open the tenant's store, migrating it to the latest version first.
    ///
    /// Blocks while another caller is migrating the same tenant. On failure
    /// the connection is closed and no handle is returned.
    pub fn ensure_current(&self, tenant: &TenantId) -> Result<TenantStore> {
        self.ensure_current_with_report(tenant)
            .map(|(store, _)| store)
    }

    /// Like [`ensure_current`](Self::ensure_current), also returning what the
    /// migration run did.
    pub fn ensure_current_with_report(
        &self,
        tenant: &TenantId,
    ) -> Result<(TenantStore, MigrationReport)> {
        let lock = self.tenant_lock(tenant)?;
        let _guard = lock.lock().map_err(|_| Error::LockPoisoned)?;

        let path = self.store_path(tenant);
        if self.config.create_dirs {
            std::fs::create_dir_all(&self.config.data_dir)?;
        }

        let mut conn = open_connection(&path, &self.config).map_err(Error::unreadable)?;

        let report = match self.migrate(&mut conn) {
            Ok(report) => report,
            Err(e) => {
                warn!(tenant = %tenant, error = %e, "tenant store migration failed");
                drop(conn);
                return Err(e);
            }
        };

        if report.is_noop() {
            debug!(tenant = %tenant, version = report.final_version, "tenant store current");
        } else {
            info!(
                tenant = %tenant,
                from = report.starting_version,
                to = report.final_version,
                applied = report.applied.len(),
                "tenant store migrated"
            );
        }

        Ok((TenantStore::new(tenant.clone(), path, conn), report))
    }

    /// Async wrapper running [`ensure_current`](Self::ensure_current) on the
    /// blocking thread pool.
    pub async fn ensure_current_async(self: Arc<Self>, tenant: TenantId) -> Result<TenantStore> {
        tokio::task::spawn_blocking(move || self.ensure_current(&tenant)).await?
    }

    /// Where the tenant's store stands, without creating or migrating it.
    ///
    /// Returns `None` if the tenant has no store yet.
    pub fn status(&self, tenant: &TenantId) -> Result<Option<MigrationStatus>> {
        let path = self.store_path(tenant);
        if !path.exists() {
            return Ok(None);
        }

        let conn = open_existing(&path, &self.config)?;
        self.schema.runner().status(&conn).map(Some)
    }

    /// Tenants that have a store file in the data directory, sorted.
    pub fn list_tenants(&self) -> Result<Vec<TenantId>> {
        let entries = match std::fs::read_dir(&self.config.data_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut tenants = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(STORE_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match TenantId::new(stem) {
                Ok(tenant) => tenants.push(tenant),
                Err(_) => debug!("Skipping {:?}: not a tenant store name", path),
            }
        }

        tenants.sort();
        Ok(tenants)
    }

    fn migrate(&self, conn: &mut Connection) -> Result<MigrationReport> {
        self.apply_baseline(conn).map_err(Error::unreadable)?;
        self.schema.runner().apply_pending(conn)
    }

    fn apply_baseline(&self, conn: &mut Connection) -> Result<()> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for statement in self.schema.baseline() {
            tx.execute(statement, [])?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Per-tenant mutex, shared by every caller currently working on `tenant`.
    fn tenant_lock(&self, tenant: &TenantId) -> Result<Arc<Mutex<()>>> {
        let mut locks = self.locks.lock().map_err(|_| Error::LockPoisoned)?;
        locks.retain(|_, lock| lock.strong_count() > 0);

        if let Some(lock) = locks.get(tenant).and_then(Weak::upgrade) {
            return Ok(lock);
        }

        let lock = Arc::new(Mutex::new(()));
        locks.insert(tenant.clone(), Arc::downgrade(&lock));
        Ok(lock)
    }
}
