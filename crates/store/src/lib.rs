//! `papergrid-store` — SQLite persistence for extraction sheets.
//!
//! Sheet metadata, rows, and versions live in separate tables so row
//! upserts during an extraction run stay cheap. Rows and versions are
//! stored as JSON payloads; the engine's serde derives define the shape.

use std::path::Path;

use rusqlite::{params, Connection};
use serde::Serialize;

use papergrid_engine::{GridError, Row, Sheet, SheetStore, Version};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sheets (
    id            TEXT PRIMARY KEY,
    collection_id TEXT NOT NULL,
    name          TEXT NOT NULL,
    columns       TEXT NOT NULL   -- JSON array of column definitions
);

CREATE TABLE IF NOT EXISTS rows (
    sheet_id    TEXT NOT NULL,
    document_id TEXT NOT NULL,
    row         TEXT NOT NULL,    -- full row as JSON
    PRIMARY KEY (sheet_id, document_id)
);

CREATE TABLE IF NOT EXISTS versions (
    sheet_id   TEXT NOT NULL,
    id         TEXT NOT NULL,
    name       TEXT NOT NULL,
    created_at TEXT NOT NULL,
    payload    TEXT NOT NULL,     -- full snapshot as JSON, insert-only
    PRIMARY KEY (sheet_id, id)
);

CREATE INDEX IF NOT EXISTS idx_sheets_collection ON sheets (collection_id);
"#;

fn store_err(e: impl std::fmt::Display) -> GridError {
    GridError::Store(e.to_string())
}

fn to_json<T: Serialize>(value: &T) -> Result<String, GridError> {
    serde_json::to_string(value).map_err(store_err)
}

/// SQLite-backed sheet store.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    pub fn open(path: &Path) -> Result<Self, GridError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(store_err)?;
            }
        }
        let conn = Connection::open(path).map_err(store_err)?;
        conn.execute_batch(SCHEMA).map_err(store_err)?;
        Ok(Self { conn })
    }

    /// In-memory store, used in tests.
    pub fn open_in_memory() -> Result<Self, GridError> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        conn.execute_batch(SCHEMA).map_err(store_err)?;
        Ok(Self { conn })
    }

    /// Load one sheet by id. Rows and versions come back in insertion order.
    pub fn load_sheet(&self, sheet_id: &str) -> Result<Sheet, GridError> {
        let (id, collection_id, name, columns_json): (String, String, String, String) = self
            .conn
            .query_row(
                "SELECT id, collection_id, name, columns FROM sheets WHERE id = ?1",
                params![sheet_id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    GridError::Store(format!("no sheet with id '{}'", sheet_id))
                }
                other => store_err(other),
            })?;

        self.assemble_sheet(id, collection_id, name, &columns_json)
    }

    fn assemble_sheet(
        &self,
        id: String,
        collection_id: String,
        name: String,
        columns_json: &str,
    ) -> Result<Sheet, GridError> {
        let columns = serde_json::from_str(columns_json).map_err(store_err)?;

        let mut stmt = self
            .conn
            .prepare("SELECT row FROM rows WHERE sheet_id = ?1 ORDER BY rowid")
            .map_err(store_err)?;
        let rows: Vec<Row> = stmt
            .query_map(params![&id], |r| r.get::<_, String>(0))
            .map_err(store_err)?
            .collect::<Result<Vec<String>, _>>()
            .map_err(store_err)?
            .iter()
            .map(|json| serde_json::from_str(json).map_err(store_err))
            .collect::<Result<_, _>>()?;

        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM versions WHERE sheet_id = ?1 ORDER BY rowid")
            .map_err(store_err)?;
        let versions: Vec<Version> = stmt
            .query_map(params![&id], |r| r.get::<_, String>(0))
            .map_err(store_err)?
            .collect::<Result<Vec<String>, _>>()
            .map_err(store_err)?
            .iter()
            .map(|json| serde_json::from_str(json).map_err(store_err))
            .collect::<Result<_, _>>()?;

        Ok(Sheet {
            id,
            name,
            collection_id,
            columns,
            rows,
            versions,
            viewing_version: None,
        })
    }

    fn write_sheet_record(&self, sheet: &Sheet) -> Result<(), GridError> {
        self.conn
            .execute(
                "INSERT INTO sheets (id, collection_id, name, columns)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                     collection_id = excluded.collection_id,
                     name = excluded.name,
                     columns = excluded.columns",
                params![
                    &sheet.id,
                    &sheet.collection_id,
                    &sheet.name,
                    to_json(&sheet.columns)?
                ],
            )
            .map_err(store_err)?;
        Ok(())
    }

    fn write_rows(&self, sheet: &Sheet) -> Result<(), GridError> {
        self.conn
            .execute("DELETE FROM rows WHERE sheet_id = ?1", params![&sheet.id])
            .map_err(store_err)?;
        let mut stmt = self
            .conn
            .prepare("INSERT INTO rows (sheet_id, document_id, row) VALUES (?1, ?2, ?3)")
            .map_err(store_err)?;
        for row in &sheet.rows {
            stmt.execute(params![&sheet.id, &row.document_id, to_json(row)?])
                .map_err(store_err)?;
        }
        Ok(())
    }

    fn write_versions(&self, sheet: &Sheet) -> Result<(), GridError> {
        // Versions are immutable once written, so existing ids are skipped.
        let mut stmt = self
            .conn
            .prepare(
                "INSERT OR IGNORE INTO versions (sheet_id, id, name, created_at, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .map_err(store_err)?;
        for version in &sheet.versions {
            stmt.execute(params![
                &sheet.id,
                version.id.as_str(),
                &version.name,
                version.created_at.to_rfc3339(),
                to_json(version)?
            ])
            .map_err(store_err)?;
        }
        Ok(())
    }
}

impl SheetStore for SqliteStore {
    fn list_sheets(&self, collection_id: &str) -> Result<Vec<Sheet>, GridError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, collection_id, name, columns FROM sheets
                 WHERE collection_id = ?1 ORDER BY rowid",
            )
            .map_err(store_err)?;
        let records: Vec<(String, String, String, String)> = stmt
            .query_map(params![collection_id], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?))
            })
            .map_err(store_err)?
            .collect::<Result<_, _>>()
            .map_err(store_err)?;

        records
            .into_iter()
            .map(|(id, coll, name, columns_json)| {
                self.assemble_sheet(id, coll, name, &columns_json)
            })
            .collect()
    }

    fn create_sheet(&self, sheet: &Sheet) -> Result<(), GridError> {
        self.conn
            .execute("BEGIN TRANSACTION", [])
            .map_err(store_err)?;
        let result = self
            .write_sheet_record(sheet)
            .and_then(|_| self.write_rows(sheet))
            .and_then(|_| self.write_versions(sheet));
        match result {
            Ok(()) => self.conn.execute("COMMIT", []).map_err(store_err).map(|_| ()),
            Err(e) => {
                let _ = self.conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }

    fn update_sheet(&self, sheet: &Sheet) -> Result<(), GridError> {
        // Same full-state write as create; the upserts make it idempotent.
        self.create_sheet(sheet)
    }

    fn delete_sheet(&self, sheet_id: &str) -> Result<(), GridError> {
        self.conn
            .execute("DELETE FROM rows WHERE sheet_id = ?1", params![sheet_id])
            .map_err(store_err)?;
        self.conn
            .execute(
                "DELETE FROM versions WHERE sheet_id = ?1",
                params![sheet_id],
            )
            .map_err(store_err)?;
        self.conn
            .execute("DELETE FROM sheets WHERE id = ?1", params![sheet_id])
            .map_err(store_err)?;
        Ok(())
    }

    fn upsert_row(&self, sheet_id: &str, row: &Row) -> Result<(), GridError> {
        self.conn
            .execute(
                "INSERT INTO rows (sheet_id, document_id, row) VALUES (?1, ?2, ?3)
                 ON CONFLICT(sheet_id, document_id) DO UPDATE SET row = excluded.row",
                params![sheet_id, &row.document_id, to_json(row)?],
            )
            .map_err(store_err)?;
        Ok(())
    }

    fn delete_row(&self, sheet_id: &str, document_id: &str) -> Result<(), GridError> {
        self.conn
            .execute(
                "DELETE FROM rows WHERE sheet_id = ?1 AND document_id = ?2",
                params![sheet_id, document_id],
            )
            .map_err(store_err)?;
        Ok(())
    }

    fn append_version(&self, sheet_id: &str, version: &Version) -> Result<(), GridError> {
        self.conn
            .execute(
                "INSERT INTO versions (sheet_id, id, name, created_at, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    sheet_id,
                    version.id.as_str(),
                    &version.name,
                    version.created_at.to_rfc3339(),
                    to_json(version)?
                ],
            )
            .map_err(store_err)?;
        Ok(())
    }
}
