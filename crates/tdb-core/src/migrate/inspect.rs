//! Live schema inspection.
//!
//! Read-only queries against `sqlite_master` and `pragma_table_info`, used by
//! the legacy reconciler and by tests that need to observe schema shape.

use rusqlite::{params, Connection};

/// Returns true if a table named `table` exists.
pub fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        params![table],
        |row| row.get(0),
    )
}

/// Returns true if `table` exists and has a column named `column`.
///
/// A missing table yields `false`, not an error.
pub fn column_exists(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2)",
        params![table, column],
        |row| row.get(0),
    )
}

/// User tables in name order, excluding SQLite internals and engine bookkeeping.
pub fn list_tables(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table'
           AND name NOT LIKE 'sqlite_%'
           AND name NOT LIKE '\\_%' ESCAPE '\\'
         ORDER BY name",
    )?;
    stmt.query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()
}

/// Column names of `table`, in declaration order.
pub fn list_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
    stmt.query_map(params![table], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()
}
