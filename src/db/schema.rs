use anyhow::{Context, Result};
use rusqlite::Connection;

struct Migration {
    version: &'static str,
    name: &'static str,
    sql: &'static str,
}

/// Version of the migration that introduces the read projection.
pub const READ_PROJECTION_VERSION: &str = "002";

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "001",
        name: "initial",
        sql: include_str!("migrations/001_initial.sql"),
    },
    Migration {
        version: READ_PROJECTION_VERSION,
        name: "ticket_reads",
        sql: include_str!("migrations/002_ticket_reads.sql"),
    },
];

/// Applies pending migrations and returns the versions applied by this call.
pub fn run_migrations(conn: &Connection) -> Result<Vec<&'static str>> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
    )
    .context("Failed to create schema_migrations table")?;

    let applied = get_applied_migrations(conn)?;
    let mut newly_applied = Vec::new();

    for migration in MIGRATIONS {
        if !applied.iter().any(|v| v == migration.version) {
            apply_migration(conn, migration)?;
            newly_applied.push(migration.version);
        }
    }

    Ok(newly_applied)
}

fn get_applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
    let versions = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(versions)
}

fn apply_migration(conn: &Connection, migration: &Migration) -> Result<()> {
    tracing::info!(
        "Applying migration {}: {}",
        migration.version,
        migration.name
    );

    let now = chrono::Utc::now().to_rfc3339();
    conn.execute_batch(&format!(
        "BEGIN TRANSACTION; {} INSERT INTO schema_migrations (version, name, applied_at) VALUES ('{}', '{}', '{}'); COMMIT;",
        migration.sql, migration.version, migration.name, now
    ))
    .with_context(|| {
        format!(
            "Failed to apply migration {}: {}",
            migration.version, migration.name
        )
    })?;

    tracing::info!("Migration {} applied successfully", migration.version);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                [name],
                |row| row.get(0),
            )
            .unwrap();
        count == 1
    }

    #[test]
    fn test_migrations_run_on_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        let applied = run_migrations(&conn).unwrap();

        assert_eq!(applied, vec!["001", "002"]);
        assert!(table_exists(&conn, "tickets"));
        assert!(table_exists(&conn, "ticket_reads"));
        assert_eq!(get_applied_migrations(&conn).unwrap(), vec!["001", "002"]);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let second = run_migrations(&conn).unwrap();

        assert!(second.is_empty());
        assert_eq!(get_applied_migrations(&conn).unwrap(), vec!["001", "002"]);
    }

    #[test]
    fn test_only_pending_migrations_are_applied() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE schema_migrations (version TEXT PRIMARY KEY, name TEXT NOT NULL, applied_at TEXT NOT NULL);",
        )
        .unwrap();
        conn.execute_batch(include_str!("migrations/001_initial.sql"))
            .unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES ('001', 'initial', '2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();

        let applied = run_migrations(&conn).unwrap();

        assert_eq!(applied, vec![READ_PROJECTION_VERSION]);
        assert!(table_exists(&conn, "ticket_reads"));
    }
}
