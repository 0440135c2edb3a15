//! Per-tenant schema migration engine.
//!
//! - **version**: durable schema version counter stored in the tenant database
//! - **signature**: legacy schema detection and fast-forward
//! - **registry**: the validated, ordered list of migration steps
//! - **runner**: the transactional apply loop
//! - **inspect**: live schema queries

pub mod inspect;
pub mod registry;
pub mod runner;
pub mod signature;
pub mod version;

pub use registry::{MigrationRegistry, MigrationStep};
pub use runner::{MigrationReport, MigrationRunner, MigrationStatus, PendingStep};
pub use signature::{LegacySignature, SchemaPredicate};
