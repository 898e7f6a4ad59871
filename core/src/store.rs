/// SQLite-backed key-value store for dashboard state that outlives a session.
///
/// The balance history lives JSON-encoded under a single fixed key.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::history::BalanceSnapshot;

/// Key under which the snapshot sequence is stored.
pub const HISTORY_KEY: &str = "balance_history";

pub struct SnapshotStore {
    conn: Connection,
}

/// Default DB location: platform data directory + `stashboard/state.db`
/// (Linux: `~/.local/share`, macOS: `~/Library/Application Support`)
pub fn default_db_path() -> Result<PathBuf> {
    Ok(crate::data_dir()?.join("state.db"))
}

impl SnapshotStore {
    /// Open (or create) the store at the default location.
    pub fn open() -> Result<Self> {
        Self::open_at(&default_db_path()?)
    }

    /// Open (or create) the store at a specific path.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            // Only a directory created here is restricted; an existing one
            // belongs to the user.
            if !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create store directory")?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700))
                        .context("Failed to restrict store directory")?;
                }
            }
        }
        let conn = Connection::open(path).context("Failed to open dashboard state database")?;
        let store = Self { conn };
        store.init_schema()?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to restrict dashboard state database")?;
        }
        Ok(store)
    }

    /// Open an in-memory store (for testing).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS kv (
                key         TEXT    PRIMARY KEY,
                value       TEXT    NOT NULL,
                updated_at  INTEGER NOT NULL DEFAULT 0
            );",
            )
            .context("Failed to initialize store schema")?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .with_context(|| format!("Failed to read key '{key}'"))
    }

    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        let now = crate::history::now_ms();
        self.conn
            .execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (key) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at",
                params![key, value, now],
            )
            .with_context(|| format!("Failed to write key '{key}'"))?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .with_context(|| format!("Failed to delete key '{key}'"))?;
        Ok(())
    }

    /// The persisted snapshot sequence, or `None` if nothing was stored yet.
    pub fn load_snapshots(&self) -> Result<Option<Vec<BalanceSnapshot>>> {
        let Some(raw) = self.get(HISTORY_KEY)? else {
            return Ok(None);
        };
        let snapshots = serde_json::from_str(&raw).context("Failed to decode balance history")?;
        Ok(Some(snapshots))
    }

    pub fn save_snapshots(&self, snapshots: &[BalanceSnapshot]) -> Result<()> {
        let raw = serde_json::to_string(snapshots).context("Failed to encode balance history")?;
        self.put(HISTORY_KEY, &raw)
    }

    pub fn clear_snapshots(&self) -> Result<()> {
        self.delete(HISTORY_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<BalanceSnapshot> {
        vec![
            BalanceSnapshot::synthetic(1_000, 1.25),
            BalanceSnapshot::real(2_000, 2.5),
        ]
    }

    #[test]
    fn absent_history_is_none() {
        let store = SnapshotStore::open_in_memory().unwrap();
        assert!(store.load_snapshots().unwrap().is_none());
    }

    #[test]
    fn save_and_load() {
        let store = SnapshotStore::open_in_memory().unwrap();
        store.save_snapshots(&sample()).unwrap();
        assert_eq!(store.load_snapshots().unwrap().unwrap(), sample());
    }

    #[test]
    fn save_overwrites() {
        let store = SnapshotStore::open_in_memory().unwrap();
        store.save_snapshots(&sample()).unwrap();
        store.save_snapshots(&sample()[1..]).unwrap();
        assert_eq!(store.load_snapshots().unwrap().unwrap().len(), 1);
    }

    #[test]
    fn corrupt_history_is_an_error() {
        let store = SnapshotStore::open_in_memory().unwrap();
        store.put(HISTORY_KEY, "{not json").unwrap();
        assert!(store.load_snapshots().is_err());
    }

    #[test]
    fn snapshots_without_flag_decode_as_real() {
        let store = SnapshotStore::open_in_memory().unwrap();
        store
            .put(HISTORY_KEY, r#"[{"timestamp_ms": 5, "total_balance": 0.5}]"#)
            .unwrap();
        let loaded = store.load_snapshots().unwrap().unwrap();
        assert_eq!(loaded, vec![BalanceSnapshot::real(5, 0.5)]);
    }

    #[test]
    fn clear_removes_history() {
        let store = SnapshotStore::open_in_memory().unwrap();
        store.save_snapshots(&sample()).unwrap();
        store.clear_snapshots().unwrap();
        assert!(store.load_snapshots().unwrap().is_none());
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.db");
        {
            let store = SnapshotStore::open_at(&path).unwrap();
            store.save_snapshots(&sample()).unwrap();
        }
        let store = SnapshotStore::open_at(&path).unwrap();
        assert_eq!(store.load_snapshots().unwrap().unwrap(), sample());
    }

    #[cfg(unix)]
    #[test]
    fn existing_directory_keeps_its_mode() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o755)).unwrap();
        let path = dir.path().join("state.db");
        SnapshotStore::open_at(&path).unwrap();

        let dir_mode = std::fs::metadata(dir.path()).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o755);
        let file_mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn created_directory_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("stashboard");
        SnapshotStore::open_at(&nested.join("state.db")).unwrap();
        let mode = std::fs::metadata(&nested).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
