//! Draft persistence for in-progress order forms.
//!
//! A small namespaced key-value store on bundled SQLite. Each editing
//! surface owns a namespace ("order:new" for the create modal,
//! "order:<id>" when editing an existing record); saving overwrites the
//! namespace, and loading a missing or corrupt entry yields `None` rather
//! than an error so a bad draft can never block the form.

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;
use tracing::warn;

/// Namespace for a draft slot: the fixed "new order" slot when no record id
/// is given, otherwise the per-record editing slot.
pub fn draft_namespace(order_id: Option<&str>) -> String {
    match order_id {
        Some(id) => format!("order:{id}"),
        None => "order:new".to_string(),
    }
}

pub struct DraftStore {
    conn: Mutex<Connection>,
}

impl DraftStore {
    /// Open (or create) the draft database at `path`.
    pub fn open(path: &Path) -> Result<Self, String> {
        let conn = Connection::open(path).map_err(|e| format!("sqlite open: {e}"))?;
        Self::configure(conn)
    }

    /// In-memory store for tests and ephemeral sessions.
    pub fn open_in_memory() -> Result<Self, String> {
        let conn = Connection::open_in_memory().map_err(|e| format!("sqlite open: {e}"))?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> Result<Self, String> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;

             CREATE TABLE IF NOT EXISTS drafts (
                 namespace TEXT PRIMARY KEY,
                 payload TEXT NOT NULL,
                 updated_at TEXT DEFAULT (datetime('now'))
             );",
        )
        .map_err(|e| format!("draft schema: {e}"))?;

        Ok(DraftStore {
            conn: Mutex::new(conn),
        })
    }

    /// Save (overwrite) the draft under `namespace`.
    pub fn save(&self, namespace: &str, payload: &Value) -> Result<(), String> {
        let conn = self.conn.lock().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO drafts (namespace, payload, updated_at)
             VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(namespace) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at",
            params![namespace, payload.to_string()],
        )
        .map_err(|e| format!("save draft: {e}"))?;
        Ok(())
    }

    /// Load the draft under `namespace`. Missing and unparsable entries both
    /// return `None`.
    pub fn load(&self, namespace: &str) -> Option<Value> {
        let conn = self.conn.lock().ok()?;
        let raw: String = conn
            .query_row(
                "SELECT payload FROM drafts WHERE namespace = ?1",
                params![namespace],
                |row| row.get(0),
            )
            .optional()
            .ok()
            .flatten()?;

        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(namespace, error = %e, "discarding corrupt draft");
                None
            }
        }
    }

    /// Remove the draft under `namespace`.
    pub fn delete(&self, namespace: &str) -> Result<(), String> {
        let conn = self.conn.lock().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM drafts WHERE namespace = ?1", params![namespace])
            .map_err(|e| format!("delete draft: {e}"))?;
        Ok(())
    }

    /// All saved drafts, newest first, corrupt payloads skipped.
    pub fn list(&self) -> Vec<(String, Value)> {
        let conn = match self.conn.lock() {
            Ok(conn) => conn,
            Err(_) => return Vec::new(),
        };
        let mut stmt = match conn
            .prepare("SELECT namespace, payload FROM drafts ORDER BY updated_at DESC, namespace")
        {
            Ok(stmt) => stmt,
            Err(e) => {
                warn!(error = %e, "list drafts prepare failed");
                return Vec::new();
            }
        };

        let rows = match stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        }) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "list drafts query failed");
                return Vec::new();
            }
        };

        rows.filter_map(|r| r.ok())
            .filter_map(|(namespace, raw)| {
                serde_json::from_str::<Value>(&raw)
                    .ok()
                    .map(|payload| (namespace, payload))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn save_load_round_trips() {
        let store = DraftStore::open_in_memory().expect("in-memory store should open");
        let payload = json!({ "customer": { "name": "Chi Lan" }, "items": [] });
        store.save("order:new", &payload).expect("save should succeed");
        assert_eq!(store.load("order:new"), Some(payload));
    }

    #[test]
    fn saving_overwrites_the_namespace() {
        let store = DraftStore::open_in_memory().unwrap();
        store.save("order:new", &json!({ "v": 1 })).unwrap();
        store.save("order:new", &json!({ "v": 2 })).unwrap();
        assert_eq!(store.load("order:new"), Some(json!({ "v": 2 })));
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn missing_and_corrupt_entries_load_as_none() {
        let store = DraftStore::open_in_memory().unwrap();
        assert_eq!(store.load("order:absent"), None);

        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO drafts (namespace, payload) VALUES ('order:bad', '{not json')",
                [],
            )
            .unwrap();
        }
        assert_eq!(store.load("order:bad"), None);
        assert!(store.list().is_empty());
    }

    #[test]
    fn delete_removes_the_slot() {
        let store = DraftStore::open_in_memory().unwrap();
        store.save("order:abc123", &json!({ "items": [] })).unwrap();
        store.delete("order:abc123").unwrap();
        assert_eq!(store.load("order:abc123"), None);
    }

    #[test]
    fn namespaces_follow_the_order_scheme() {
        assert_eq!(draft_namespace(None), "order:new");
        assert_eq!(draft_namespace(Some("abc123")), "order:abc123");
    }
}
