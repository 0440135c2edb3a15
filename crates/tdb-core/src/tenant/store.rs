use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::migrate::version;
use crate::tenant::TenantId;

/// Open connection to one tenant's database, migrated to the current schema.
///
/// Only [`TenantProvisioner`](super::TenantProvisioner) constructs these.
/// Dropping the handle closes the connection.
#[derive(Debug)]
pub struct TenantStore {
    tenant: TenantId,
    path: PathBuf,
    conn: Connection,
}

impl TenantStore {
    pub(crate) fn new(tenant: TenantId, path: PathBuf, conn: Connection) -> Self {
        Self { tenant, path, conn }
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Stored schema version
    pub fn schema_version(&self) -> Result<u32> {
        version::get_version(&self.conn)
    }

    /// Give up the handle and keep the raw connection
    pub fn into_connection(self) -> Connection {
        self.conn
    }

    /// Close the connection, reporting any error SQLite raises on close
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| Error::Database(e))
    }
}

/// Open (creating if missing) a tenant database with the configured pragmas.
pub(crate) fn open_connection(path: &Path, config: &StoreConfig) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn, config)?;
    Ok(conn)
}

/// Open an existing tenant database; a missing file is an error, not created.
///
/// Opened read-write so WAL-mode stores can map their shared-memory file.
pub(crate) fn open_existing(path: &Path, config: &StoreConfig) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(config.busy_timeout())?;
    Ok(conn)
}

fn configure(conn: &Connection, config: &StoreConfig) -> Result<()> {
    conn.execute_batch(&format!(
        "PRAGMA journal_mode={};
         PRAGMA synchronous=NORMAL;
         PRAGMA foreign_keys=ON;",
        config.journal_mode.as_str()
    ))?;
    // Via the Connection method so the setting survives pragma caching
    conn.busy_timeout(config.busy_timeout())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JournalMode;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_file_with_pragmas() {
        let temp = tempdir().expect("Failed to create temp dir");
        let path = temp.path().join("acme.db");
        assert!(!path.exists());

        let conn = open_connection(&path, &StoreConfig::new(temp.path())).unwrap();
        assert!(path.exists());

        let journal: String = conn
            .query_row("PRAGMA journal_mode", [], |r| r.get(0))
            .unwrap();
        assert_eq!(journal, "wal");
        let fk: i64 = conn.query_row("PRAGMA foreign_keys", [], |r| r.get(0)).unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_open_delete_journal() {
        let temp = tempdir().expect("Failed to create temp dir");
        let path = temp.path().join("acme.db");
        let config = StoreConfig::new(temp.path()).with_journal_mode(JournalMode::Delete);

        let conn = open_connection(&path, &config).unwrap();
        let journal: String = conn
            .query_row("PRAGMA journal_mode", [], |r| r.get(0))
            .unwrap();
        assert_eq!(journal, "delete");
    }

    #[test]
    fn test_open_existing_does_not_create() {
        let temp = tempdir().expect("Failed to create temp dir");
        let path = temp.path().join("missing.db");
        assert!(open_existing(&path, &StoreConfig::new(temp.path())).is_err());
        assert!(!path.exists());
    }
}
