//! Integration tests for tenant store provisioning.
//!
//! Exercises: TenantProvisioner::ensure_current, legacy fast-forward,
//! partial failure, idempotence, concurrent first access, and stores written
//! with the native `user_version` counter.

use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;

use tdb_core::migrate::{inspect, version};
use tdb_core::schema::{BASELINE, LEGACY_SIGNATURES, MIGRATIONS};
use tdb_core::{
    Error, MigrationStep, StoreConfig, TenantId, TenantProvisioner, TenantSchema,
};

fn provisioner_in(dir: &Path) -> TenantProvisioner {
    TenantProvisioner::new(StoreConfig::new(dir), TenantSchema::standard().unwrap()).unwrap()
}

fn tenant(id: &str) -> TenantId {
    TenantId::new(id).unwrap()
}

/// Write a store file directly, bypassing the engine.
fn forge_store(path: &Path, sql: &str) {
    let db = rusqlite::Connection::open(path).unwrap();
    db.execute_batch(sql).unwrap();
}

fn count(conn: &rusqlite::Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |r| r.get(0)).unwrap()
}

#[test]
fn fresh_tenant_reaches_latest_version() {
    let dir = tempfile::tempdir().unwrap();
    let provisioner = provisioner_in(dir.path());

    let store = provisioner.ensure_current(&tenant("acme")).unwrap();

    assert_eq!(store.schema_version().unwrap(), 3);
    for table in ["documents", "packs", "config", "strategies"] {
        assert!(
            inspect::table_exists(store.conn(), table).unwrap(),
            "{table} should exist"
        );
    }
    assert!(inspect::column_exists(store.conn(), "documents", "processing_state").unwrap());
}

#[test]
fn existing_rows_get_default_processing_state() {
    let dir = tempfile::tempdir().unwrap();
    let provisioner = provisioner_in(dir.path());
    let path = provisioner.store_path(&tenant("acme"));

    // Pre-versioning store created with the baseline and holding data
    forge_store(
        &path,
        "CREATE TABLE documents (
            id TEXT PRIMARY KEY, title TEXT NOT NULL, body TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL, updated_at INTEGER NOT NULL
        );
        INSERT INTO documents (id, title, created_at, updated_at)
        VALUES ('d1', 'one', 1, 1), ('d2', 'two', 2, 2);",
    );

    let (store, report) = provisioner
        .ensure_current_with_report(&tenant("acme"))
        .unwrap();

    assert_eq!(report.starting_version, 0);
    assert_eq!(report.reconciled_to, None);
    assert_eq!(report.applied, vec![1, 2, 3]);
    assert_eq!(
        count(
            store.conn(),
            "SELECT COUNT(*) FROM documents WHERE processing_state = 'idle'"
        ),
        2
    );
}

#[test]
fn second_access_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let provisioner = provisioner_in(dir.path());

    let (first, report) = provisioner
        .ensure_current_with_report(&tenant("acme"))
        .unwrap();
    assert!(!report.is_noop());
    first
        .conn()
        .execute(
            "INSERT INTO packs (id, name, created_at) VALUES ('p1', 'starter', 1)",
            [],
        )
        .unwrap();
    first.close().unwrap();

    let (second, report) = provisioner
        .ensure_current_with_report(&tenant("acme"))
        .unwrap();
    assert!(report.is_noop());
    assert_eq!(report.final_version, 3);
    assert_eq!(count(second.conn(), "SELECT COUNT(*) FROM packs"), 1);
}

#[test]
fn legacy_drift_fast_forwards_without_readding_column() {
    let dir = tempfile::tempdir().unwrap();
    let provisioner = provisioner_in(dir.path());
    let path = provisioner.store_path(&tenant("legacy"));

    // Column added by hand before version tracking existed
    forge_store(
        &path,
        "CREATE TABLE documents (
            id TEXT PRIMARY KEY, title TEXT NOT NULL, body TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL, updated_at INTEGER NOT NULL,
            processing_state TEXT NOT NULL DEFAULT 'queued'
        );
        INSERT INTO documents (id, title, created_at, updated_at) VALUES ('d1', 'one', 1, 1);",
    );

    let (store, report) = provisioner
        .ensure_current_with_report(&tenant("legacy"))
        .unwrap();

    assert_eq!(report.reconciled_to, Some(1));
    assert_eq!(report.applied, vec![2, 3]);
    assert_eq!(store.schema_version().unwrap(), 3);
    // Hand-applied default survives; step 1 never ran
    let state: String = store
        .conn()
        .query_row("SELECT processing_state FROM documents WHERE id = 'd1'", [], |r| {
            r.get(0)
        })
        .unwrap();
    assert_eq!(state, "queued");
}

#[test]
fn store_built_at_latest_schema_ends_current() {
    let dir = tempfile::tempdir().unwrap();
    let provisioner = provisioner_in(dir.path());
    let path = provisioner.store_path(&tenant("direct"));

    // Build the full target schema without the engine
    {
        let db = rusqlite::Connection::open(&path).unwrap();
        for statement in BASELINE {
            db.execute(statement, []).unwrap();
        }
        for step in MIGRATIONS {
            for operation in step.operations {
                db.execute(operation, []).unwrap();
            }
        }
    }

    let (store, report) = provisioner
        .ensure_current_with_report(&tenant("direct"))
        .unwrap();

    assert_eq!(report.reconciled_to, Some(1));
    assert_eq!(report.final_version, 3);
    assert_eq!(store.schema_version().unwrap(), 3);
}

#[test]
fn failed_step_leaves_store_at_previous_version() {
    const STEPS: &[MigrationStep] = &[
        MigrationStep::new(
            1,
            "add_processing_state",
            &["ALTER TABLE documents ADD COLUMN processing_state TEXT NOT NULL DEFAULT 'idle'"],
        ),
        MigrationStep::new(
            2,
            "broken",
            &[
                "CREATE TABLE packs (id TEXT PRIMARY KEY)",
                "INSERT INTO packs (id) VALUES ('p1')",
                "ALTER TABLE documents ADD COLUMN processing_state TEXT",
            ],
        ),
        MigrationStep::new(3, "unreachable", &["CREATE TABLE strategies (id TEXT)"]),
    ];

    let dir = tempfile::tempdir().unwrap();
    let schema = TenantSchema::new(BASELINE, STEPS, LEGACY_SIGNATURES).unwrap();
    let provisioner = TenantProvisioner::new(StoreConfig::new(dir.path()), schema).unwrap();
    let id = tenant("acme");

    let err = provisioner.ensure_current(&id).unwrap_err();
    assert_eq!(err.failed_version(), Some(2));
    assert!(err.to_string().contains("broken"));

    let db = rusqlite::Connection::open(provisioner.store_path(&id)).unwrap();
    assert_eq!(version::get_version(&db).unwrap(), 1);
    assert!(!inspect::table_exists(&db, "packs").unwrap());
    assert!(!inspect::table_exists(&db, "strategies").unwrap());

    // Retrying re-derives the same starting point and fails the same way
    let err = provisioner.ensure_current(&id).unwrap_err();
    assert!(matches!(err, Error::MigrationStep { version: 2, .. }));
    assert_eq!(version::get_version(&db).unwrap(), 1);
}

#[test]
fn native_user_version_store_is_honoured() {
    let dir = tempfile::tempdir().unwrap();
    let provisioner = provisioner_in(dir.path());
    let path = provisioner.store_path(&tenant("native"));

    // Store migrated to version 2 by the older native-counter format
    forge_store(
        &path,
        "CREATE TABLE documents (
            id TEXT PRIMARY KEY, title TEXT NOT NULL, body TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL, updated_at INTEGER NOT NULL,
            processing_state TEXT NOT NULL DEFAULT 'idle'
        );
        CREATE TABLE packs (
            id TEXT PRIMARY KEY, name TEXT NOT NULL, description TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE TABLE config (
            key TEXT PRIMARY KEY, value TEXT NOT NULL, updated_at INTEGER NOT NULL
        );
        PRAGMA user_version = 2;",
    );

    let (store, report) = provisioner
        .ensure_current_with_report(&tenant("native"))
        .unwrap();

    assert_eq!(report.starting_version, 2);
    assert_eq!(report.applied, vec![3]);
    let recorded = count(
        store.conn(),
        "SELECT version FROM _tenant_schema_version WHERE id = 1",
    );
    assert_eq!(recorded, 3);
}

#[test]
fn store_from_newer_release_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let provisioner = provisioner_in(dir.path());
    let id = tenant("future");

    provisioner.ensure_current(&id).unwrap();
    {
        let db = rusqlite::Connection::open(provisioner.store_path(&id)).unwrap();
        version::set_version(&db, 9).unwrap();
    }

    let err = provisioner.ensure_current(&id).unwrap_err();
    assert!(matches!(err, Error::StoreAhead { stored: 9, latest: 3 }));
}

#[test]
fn out_of_range_stored_version_is_never_lowered() {
    let dir = tempfile::tempdir().unwrap();
    let provisioner = provisioner_in(dir.path());
    let id = tenant("corrupt");

    provisioner.ensure_current(&id).unwrap().close().unwrap();
    {
        let db = rusqlite::Connection::open(provisioner.store_path(&id)).unwrap();
        db.execute(
            "UPDATE _tenant_schema_version SET version = 5000000000 WHERE id = 1",
            [],
        )
        .unwrap();
    }

    let err = provisioner.ensure_current(&id).unwrap_err();
    assert!(matches!(err, Error::InvalidStoredVersion(5_000_000_000)));

    let db = rusqlite::Connection::open(provisioner.store_path(&id)).unwrap();
    assert_eq!(
        count(&db, "SELECT version FROM _tenant_schema_version WHERE id = 1"),
        5_000_000_000
    );
}

#[test]
fn garbage_file_is_reported_as_unreadable() {
    let dir = tempfile::tempdir().unwrap();
    let provisioner = provisioner_in(dir.path());
    let id = tenant("junk");
    std::fs::write(provisioner.store_path(&id), vec![0x42u8; 8192]).unwrap();

    let err = provisioner.ensure_current(&id).unwrap_err();
    assert!(matches!(err, Error::Reconciliation { .. }), "got {err:?}");
    assert!(!err.is_configuration());
}

#[test]
fn concurrent_first_access_migrates_once() {
    let dir = tempfile::tempdir().unwrap();
    let provisioner = Arc::new(provisioner_in(dir.path()));
    let workers = 8;
    let barrier = Arc::new(Barrier::new(workers));

    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let provisioner = Arc::clone(&provisioner);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                provisioner
                    .ensure_current_with_report(&tenant("shared"))
                    .map(|(_, report)| report)
            })
        })
        .collect();

    let reports: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();

    let migrating = reports.iter().filter(|r| !r.is_noop()).count();
    assert_eq!(migrating, 1, "exactly one caller should apply migrations");
    assert!(reports.iter().all(|r| r.final_version == 3));
}

#[test]
fn different_tenants_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let provisioner = provisioner_in(dir.path());

    let acme = provisioner.ensure_current(&tenant("acme")).unwrap();
    let globex = provisioner.ensure_current(&tenant("globex")).unwrap();

    acme.conn()
        .execute(
            "INSERT INTO config (key, value, updated_at) VALUES ('theme', 'dark', 1)",
            [],
        )
        .unwrap();

    assert_ne!(acme.path(), globex.path());
    assert_eq!(count(globex.conn(), "SELECT COUNT(*) FROM config"), 0);
    assert_eq!(
        provisioner.list_tenants().unwrap(),
        vec![tenant("acme"), tenant("globex")]
    );
}

#[test]
fn status_reports_without_migrating() {
    let dir = tempfile::tempdir().unwrap();
    let provisioner = provisioner_in(dir.path());
    let path = provisioner.store_path(&tenant("legacy"));
    forge_store(
        &path,
        "CREATE TABLE documents (id TEXT PRIMARY KEY, processing_state TEXT);",
    );

    let status = provisioner.status(&tenant("legacy")).unwrap().unwrap();
    assert_eq!(status.stored_version, 0);
    assert_eq!(status.reconcilable_to, Some(1));
    assert_eq!(status.pending.len(), 2);

    let db = rusqlite::Connection::open(&path).unwrap();
    assert!(!inspect::table_exists(&db, "packs").unwrap());
    assert_eq!(version::get_version(&db).unwrap(), 0);
}

#[tokio::test]
async fn async_entry_point_migrates() {
    let dir = tempfile::tempdir().unwrap();
    let provisioner = Arc::new(provisioner_in(dir.path()));

    let store = Arc::clone(&provisioner)
        .ensure_current_async(tenant("acme"))
        .await
        .unwrap();
    assert_eq!(store.schema_version().unwrap(), 3);
    assert_eq!(store.tenant().as_str(), "acme");
}
