//! Migration apply loop.

use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::migrate::{signature, version, LegacySignature, MigrationRegistry, MigrationStep};

/// What a call to [`MigrationRunner::apply_pending`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Stored version before the run
    pub starting_version: u32,
    /// Version set by legacy fast-forward, if one happened
    pub reconciled_to: Option<u32>,
    /// Versions whose operations were executed, ascending
    pub applied: Vec<u32>,
    /// Stored version after the run
    pub final_version: u32,
}

impl MigrationReport {
    /// True when the store was already current.
    pub fn is_noop(&self) -> bool {
        self.reconciled_to.is_none() && self.applied.is_empty()
    }
}

/// A step that has not been applied yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingStep {
    pub version: u32,
    pub name: String,
}

/// Read-only view of where a store stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub stored_version: u32,
    pub latest_version: u32,
    /// Version a legacy fast-forward would move an unversioned store to
    pub reconcilable_to: Option<u32>,
    pub pending: Vec<PendingStep>,
}

impl MigrationStatus {
    pub fn is_current(&self) -> bool {
        self.pending.is_empty() && self.stored_version == self.latest_version
    }
}

/// Brings a single store up to the registry's latest version.
///
/// Holds no state of its own: everything it knows about a store is read from
/// the store on each call.
#[derive(Debug, Clone, Copy)]
pub struct MigrationRunner<'a> {
    registry: &'a MigrationRegistry,
    signatures: &'a [LegacySignature],
}

impl<'a> MigrationRunner<'a> {
    pub fn new(registry: &'a MigrationRegistry, signatures: &'a [LegacySignature]) -> Self {
        Self {
            registry,
            signatures,
        }
    }

    /// Apply every pending step, one transaction per step.
    ///
    /// An unversioned store is first offered to the legacy reconciler. Each
    /// step's statements and its version bump commit together; a failing
    /// statement rolls the step back and stops the run, leaving the stored
    /// version at the last step that committed.
    ///
    /// # Errors
    ///
    /// - [`Error::StoreAhead`] if the store was migrated by a newer catalogue.
    /// - [`Error::Reconciliation`] if the store's state cannot be read.
    /// - [`Error::InvalidStoredVersion`] if the stored version is out of range.
    /// - [`Error::MigrationStep`] for the first step that cannot be applied.
    pub fn apply_pending(&self, conn: &mut Connection) -> Result<MigrationReport> {
        let starting_version = version::get_version(conn).map_err(Error::unreadable)?;
        let latest = self.registry.latest();

        if starting_version > latest {
            warn!(
                stored = starting_version,
                latest, "store is ahead of the migration registry"
            );
            return Err(Error::StoreAhead {
                stored: starting_version,
                latest,
            });
        }

        let mut current = starting_version;
        let mut reconciled_to = None;

        if current == 0 {
            current = signature::reconcile(conn, self.signatures)?;
            if current != 0 {
                reconciled_to = Some(current);
            }
        }

        let mut applied = Vec::new();
        for step in self.registry.pending(current) {
            if self.apply_step(conn, step)? {
                applied.push(step.version);
            }
            current = step.version;
        }

        Ok(MigrationReport {
            starting_version,
            reconciled_to,
            applied,
            final_version: current,
        })
    }

    /// Returns false if the step was already recorded by another connection.
    fn apply_step(&self, conn: &mut Connection, step: &MigrationStep) -> Result<bool> {
        let fail = |source: rusqlite::Error| Error::step_failed(step.version, step.name, source);

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(fail)?;

        // Re-read under the write lock
        let stored = version::get_version(&tx)?;
        if stored >= step.version {
            debug!(
                version = step.version,
                stored, "step already applied elsewhere, skipping"
            );
            return Ok(false);
        }

        for (index, operation) in step.operations.iter().enumerate() {
            debug!(version = step.version, index, "executing migration operation");
            if let Err(source) = tx.execute(operation, []) {
                warn!(
                    version = step.version,
                    name = step.name,
                    index,
                    error = %source,
                    "migration operation failed, rolling back"
                );
                return Err(fail(source));
            }
        }

        version::set_version(&tx, step.version)?;
        tx.commit().map_err(fail)?;

        info!(version = step.version, name = step.name, "applied migration");
        Ok(true)
    }

    /// Inspect a store without changing it.
    pub fn status(&self, conn: &Connection) -> Result<MigrationStatus> {
        let stored_version = version::get_version(conn)?;

        let mut reconcilable_to = None;
        if stored_version == 0 {
            for signature in self.signatures {
                let holds = signature
                    .check
                    .holds(conn)
                    .map_err(|source| Error::Reconciliation { source })?;
                if holds && reconcilable_to.is_none_or(|v| signature.version > v) {
                    reconcilable_to = Some(signature.version);
                }
            }
        }

        let effective = reconcilable_to.unwrap_or(stored_version);
        let pending = self
            .registry
            .pending(effective)
            .iter()
            .map(|step| PendingStep {
                version: step.version,
                name: step.name.to_string(),
            })
            .collect();

        Ok(MigrationStatus {
            stored_version,
            latest_version: self.registry.latest(),
            reconcilable_to,
            pending,
        })
    }
}
