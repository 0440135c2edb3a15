//! Tenant store schema catalogue.
//!
//! [`TenantSchema::standard`] is the schema every tenant store is brought to.
//! To change it, append a step to [`MIGRATIONS`]; never edit or renumber an
//! existing one.

use crate::error::Result;
use crate::migrate::signature::validate_signatures;
use crate::migrate::{
    LegacySignature, MigrationRegistry, MigrationRunner, MigrationStep, SchemaPredicate,
};

/// Tables every tenant store was created with before versioning existed.
///
/// Applied on every open; each statement must be a no-op on an existing store.
pub const BASELINE: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS documents (
        id          TEXT    PRIMARY KEY,
        title       TEXT    NOT NULL,
        body        TEXT    NOT NULL DEFAULT '',
        created_at  INTEGER NOT NULL,
        updated_at  INTEGER NOT NULL
    )",
];

/// Ordered tenant migrations.
pub const MIGRATIONS: &[MigrationStep] = &[
    MigrationStep::new(
        1,
        "add_processing_state",
        &["ALTER TABLE documents ADD COLUMN processing_state TEXT NOT NULL DEFAULT 'idle'"],
    ),
    MigrationStep::new(
        2,
        "add_packs_and_config",
        &[
            "CREATE TABLE IF NOT EXISTS packs (
                id          TEXT    PRIMARY KEY,
                name        TEXT    NOT NULL,
                description TEXT,
                created_at  INTEGER NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS config (
                key         TEXT    PRIMARY KEY,
                value       TEXT    NOT NULL,
                updated_at  INTEGER NOT NULL
            )",
        ],
    ),
    MigrationStep::new(
        3,
        "add_strategies",
        &[
            "CREATE TABLE IF NOT EXISTS strategies (
                id          TEXT    PRIMARY KEY,
                pack_id     TEXT    REFERENCES packs(id) ON DELETE CASCADE,
                name        TEXT    NOT NULL,
                definition  TEXT    NOT NULL DEFAULT '{}',
                created_at  INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_strategies_pack_id ON strategies(pack_id)",
        ],
    ),
];

/// Schema shapes left by changes applied before version tracking.
///
/// Frozen: stores that have passed version 1 never consult this table.
pub const LEGACY_SIGNATURES: &[LegacySignature] = &[LegacySignature {
    version: 1,
    description: "documents.processing_state added by hand",
    check: SchemaPredicate::ColumnExists {
        table: "documents",
        column: "processing_state",
    },
}];

/// Everything needed to bring a tenant store to its target schema.
#[derive(Debug, Clone)]
pub struct TenantSchema {
    baseline: Vec<&'static str>,
    registry: MigrationRegistry,
    signatures: Vec<LegacySignature>,
}

impl TenantSchema {
    /// Validate and assemble a catalogue.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`](crate::Error::Configuration) if the
    /// steps have gaps or duplicates or a signature points outside them.
    pub fn new(
        baseline: &[&'static str],
        steps: &[MigrationStep],
        signatures: &[LegacySignature],
    ) -> Result<Self> {
        let registry = MigrationRegistry::new(steps.iter().copied())?;
        validate_signatures(signatures, &registry)?;
        Ok(Self {
            baseline: baseline.to_vec(),
            registry,
            signatures: signatures.to_vec(),
        })
    }

    /// The application's tenant schema.
    pub fn standard() -> Result<Self> {
        Self::new(BASELINE, MIGRATIONS, LEGACY_SIGNATURES)
    }

    pub fn baseline(&self) -> &[&'static str] {
        &self.baseline
    }

    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    pub fn signatures(&self) -> &[LegacySignature] {
        &self.signatures
    }

    pub fn runner(&self) -> MigrationRunner<'_> {
        MigrationRunner::new(&self.registry, &self.signatures)
    }
}
