//! Legacy state reconciliation.
//!
//! Some tenant stores received schema changes before version tracking
//! existed. Such a store reports version 0 even though a step's changes are
//! already present, and re-running that step would fail (an `ADD COLUMN` for
//! a column that exists is fatal in SQLite). A [`LegacySignature`] recognises
//! the shape such a change left behind so the stored version can be
//! fast-forwarded instead.

use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, info};

use crate::error::{Error, RegistryError, Result};
use crate::migrate::{inspect, version, MigrationRegistry};

/// Predicate over the live schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaPredicate {
    TableExists {
        table: &'static str,
    },
    ColumnExists {
        table: &'static str,
        column: &'static str,
    },
    /// Every predicate holds.
    All(&'static [SchemaPredicate]),
}

impl SchemaPredicate {
    pub fn holds(&self, conn: &Connection) -> rusqlite::Result<bool> {
        match self {
            Self::TableExists { table } => inspect::table_exists(conn, table),
            Self::ColumnExists { table, column } => inspect::column_exists(conn, table, column),
            Self::All(predicates) => {
                for predicate in predicates.iter() {
                    if !predicate.holds(conn)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }
}

/// A schema shape paired with the version it implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacySignature {
    pub version: u32,
    pub description: &'static str,
    pub check: SchemaPredicate,
}

/// Check that every signature points at a version the registry defines.
pub fn validate_signatures(
    signatures: &[LegacySignature],
    registry: &MigrationRegistry,
) -> std::result::Result<(), RegistryError> {
    let latest = registry.latest();
    for signature in signatures {
        if signature.version == 0 || signature.version > latest {
            return Err(RegistryError::SignatureOutOfRange {
                version: signature.version,
                latest,
            });
        }
    }
    Ok(())
}

/// Fast-forward an unversioned store whose schema matches a known legacy shape.
///
/// Only acts when the stored version is 0; any other value is returned as is.
/// Signatures are evaluated in ascending version order and the highest one
/// that holds wins. On a match the version is persisted before returning.
/// Returns the (possibly adjusted) version.
///
/// # Errors
///
/// Returns [`Error::Reconciliation`] if the schema cannot be inspected.
pub fn reconcile(conn: &mut Connection, signatures: &[LegacySignature]) -> Result<u32> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|source| Error::Reconciliation { source })?;

    let current = version::get_version(&tx).map_err(Error::unreadable)?;
    if current != 0 {
        return Ok(current);
    }

    let mut ordered: Vec<&LegacySignature> = signatures.iter().collect();
    ordered.sort_by_key(|signature| signature.version);

    let mut matched = None;
    for signature in ordered {
        let holds = signature
            .check
            .holds(&tx)
            .map_err(|source| Error::Reconciliation { source })?;
        debug!(
            version = signature.version,
            signature = signature.description,
            holds,
            "checked legacy signature"
        );
        if holds {
            matched = Some(signature);
        }
    }

    let Some(signature) = matched else {
        return Ok(0);
    };

    version::set_version(&tx, signature.version).map_err(Error::unreadable)?;
    tx.commit().map_err(|source| Error::Reconciliation { source })?;

    info!(
        version = signature.version,
        signature = signature.description,
        "fast-forwarded legacy store"
    );
    Ok(signature.version)
}
