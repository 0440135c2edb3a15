//! Durable schema version counter.
//!
//! The version is stored as a single row in `_tenant_schema_version` inside the
//! tenant database. Because it is an ordinary table, the runner updates it in
//! the same transaction as the step it records, so a crash can never leave the
//! schema ahead of the recorded version.
//!
//! Stores written by the older format kept the counter in `PRAGMA user_version`.
//! When the table has no row, that pragma is read instead; the next
//! [`set_version`] moves the value into the table.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::{Error, Result};
use crate::migrate::inspect;

/// Name of the one-row version table.
pub const VERSION_TABLE: &str = "_tenant_schema_version";

const VERSION_TABLE_DDL: &str = "
    CREATE TABLE IF NOT EXISTS _tenant_schema_version (
        id      INTEGER PRIMARY KEY CHECK (id = 1),
        version INTEGER NOT NULL CHECK (version >= 0)
    );
";

/// Reads the stored schema version, `0` for a store never touched by the engine.
pub fn get_version(conn: &Connection) -> Result<u32> {
    if inspect::table_exists(conn, VERSION_TABLE)? {
        let stored: Option<i64> = conn
            .query_row(
                "SELECT version FROM _tenant_schema_version WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(version) = stored {
            return checked(version);
        }
    }

    native_version(conn)
}

/// Persists `version` as the stored schema version.
///
/// Runs on whatever transaction `conn` currently has open; callers pass a
/// [`rusqlite::Transaction`] to make the write atomic with a step.
///
/// # Errors
///
/// Returns [`Error::VersionRegression`] if `version` is lower than the value
/// already stored.
pub fn set_version(conn: &Connection, version: u32) -> Result<()> {
    let current = get_version(conn)?;
    if version < current {
        return Err(Error::VersionRegression {
            current,
            requested: version,
        });
    }

    conn.execute_batch(VERSION_TABLE_DDL)?;
    conn.execute(
        "INSERT INTO _tenant_schema_version (id, version) VALUES (1, ?1)
         ON CONFLICT(id) DO UPDATE SET version = excluded.version",
        params![version],
    )?;

    debug!(from = current, to = version, "stored schema version");
    Ok(())
}

/// Counter kept by the older native format.
fn native_version(conn: &Connection) -> Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    checked(version)
}

/// A stored value outside `0..=u32::MAX` was not written by this engine.
fn checked(version: i64) -> Result<u32> {
    u32::try_from(version).map_err(|_| Error::InvalidStoredVersion(version))
}
