//! Migration runner.
//!
//! Applied migrations are recorded in `schema_migrations` keyed by
//! `(module, id)`; each pending migration runs in its own transaction.

use rusqlite::{params, OptionalExtension};
use shelf_kernel::Migration;

use crate::{Database, DbError, Result};

const CREATE_MIGRATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    module TEXT NOT NULL,
    id TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (module, id)
)
"#;

impl Database {
    /// Apply every migration not yet recorded. Returns how many ran.
    pub fn apply_migrations(&self, migrations: &[(String, Migration)]) -> Result<usize> {
        {
            let tx = self.write()?;
            tx.conn().execute_batch(CREATE_MIGRATIONS_TABLE)?;
            tx.commit()?;
        }

        let mut applied = 0;
        for (module, migration) in migrations {
            let tx = self.write()?;
            let conn = tx.conn();

            let already: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM schema_migrations WHERE module = ?1 AND id = ?2",
                    params![module, migration.id],
                    |row| row.get(0),
                )
                .optional()?;
            if already.is_some() {
                continue;
            }

            conn.execute_batch(migration.up)
                .map_err(|source| DbError::Migration {
                    module: module.clone(),
                    id: migration.id.to_string(),
                    source,
                })?;
            conn.execute(
                "INSERT INTO schema_migrations (module, id) VALUES (?1, ?2)",
                params![module, migration.id],
            )?;
            tx.commit()?;

            tracing::info!(target: "shelf-db", module = %module, id = migration.id, "migration applied");
            applied += 1;
        }

        Ok(applied)
    }

    /// `(module, id)` pairs already applied, in application order.
    pub fn applied_migrations(&self) -> Result<Vec<(String, String)>> {
        let tx = self.read()?;
        let conn = tx.conn();
        let exists: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Ok(Vec::new());
        }

        let mut stmt = conn.prepare("SELECT module, id FROM schema_migrations ORDER BY rowid")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
