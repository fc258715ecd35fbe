/// Database migration management
///
/// The local key-value table and the document table of the SQLite-backed
/// document store share one database file. The schema version lives in
/// SQLite's `user_version` pragma; each migration runs in its own transaction.

use rusqlite::Connection;
use crate::storage::StorageError;

/// Ordered migrations: (version, description, SQL batch)
const MIGRATIONS: &[(i32, &str, &str)] = &[(
    1,
    "key-value store and document table",
    "CREATE TABLE IF NOT EXISTS kv_store (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS documents (
        path TEXT PRIMARY KEY,
        data TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );",
)];

/// Bring the schema up to the latest version
///
/// Safe to call on every open; applied migrations are skipped.
pub fn initialize_database(conn: &Connection) -> Result<(), StorageError> {
    let current = schema_version(conn)?;

    for (version, description, sql) in MIGRATIONS.iter().filter(|(v, _, _)| *v > current) {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", *version)?;
        tx.commit()?;
        tracing::info!("Applied migration v{}: {}", version, description);
    }

    Ok(())
}

fn schema_version(conn: &Connection) -> Result<i32, StorageError> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_count(conn: &Connection) -> i32 {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('kv_store', 'documents')",
            [],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        assert!(initialize_database(&conn).is_ok());
        assert!(initialize_database(&conn).is_ok());
        assert_eq!(table_count(&conn), 2);
    }

    #[test]
    fn test_version_recorded() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 0);

        initialize_database(&conn).unwrap();
        let latest = MIGRATIONS.last().map_or(0, |(version, _, _)| *version);
        assert_eq!(schema_version(&conn).unwrap(), latest);
    }
}
