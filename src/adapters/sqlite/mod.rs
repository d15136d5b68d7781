//! SQLite adapter: Implementation of UserStore.
//!
//! Provides local persistence for user accounts. Only Argon2id hashes are
//! stored, never passwords.
//!
//! # Mutex Behavior
//!
//! The connection is protected by a `Mutex`. A poisoned mutex (from a panic
//! in another thread) is reported as `StoreError::Unavailable` so the request
//! fails with a 500 instead of taking the process down.
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use crate::domain::UserRecord;
use crate::ports::{StoreError, UserStore};

/// Default wait for a locked database before giving up.
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Unavailable(e.to_string())
    }
}

/// SQLite user store adapter.
pub struct SqliteUserStore {
    conn: Mutex<Connection>,
}

impl SqliteUserStore {
    /// Open (or create) the database at `path`.
    ///
    /// Parent directories are created. `busy_timeout` bounds how long a call
    /// waits on a locked database.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or initialized.
    pub fn open<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!("Cannot create {}: {e}", parent.display()))
            })?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        tracing::info!("Opened user store at {}", path.display());
        Ok(store)
    }

    /// Create an in-memory SQLite database (for testing).
    ///
    /// # Errors
    /// Returns error if database cannot be created.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            ",
        )?;

        Ok(())
    }

    /// Count registered users.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn count_users(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

impl UserStore for SqliteUserStore {
    fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let conn = self.lock()?;

        let row = conn
            .query_row(
                "SELECT username, password_hash, created_at FROM users WHERE username = ?1",
                params![username],
                |row| {
                    let username: String = row.get(0)?;
                    let password_hash: String = row.get(1)?;
                    let created_at: String = row.get(2)?;
                    Ok((username, password_hash, created_at))
                },
            )
            .optional()?;

        let Some((username, password_hash, created_at_str)) = row else {
            return Ok(None);
        };

        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .map_err(|e| StoreError::Corrupt(format!("created_at for {username}: {e}")))?;

        Ok(Some(UserRecord {
            username,
            password_hash,
            created_at,
        }))
    }

    fn insert(&self, user: &UserRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;

        let result = conn.execute(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
            params![user.username, user.password_hash, user.created_at.to_rfc3339()],
        );

        match result {
            Ok(_) => {
                tracing::debug!("Inserted user record");
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Duplicate(user.username.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_roundtrip() {
        let store = SqliteUserStore::in_memory().expect("Should create db");

        assert!(store.find_by_username("alice").expect("Should query").is_none());

        let user = UserRecord::new("alice", "$argon2id$v=19$m=47104,t=1,p=1$c2FsdA$aGFzaA");
        store.insert(&user).expect("Should insert");

        let loaded = store
            .find_by_username("alice")
            .expect("Should query")
            .expect("Should exist");
        assert_eq!(loaded.username, "alice");
        assert_eq!(loaded.password_hash, user.password_hash);
        assert_eq!(loaded.created_at.timestamp(), user.created_at.timestamp());
        assert_eq!(store.count_users().expect("Should count"), 1);
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let store = SqliteUserStore::in_memory().expect("Should create db");
        store.insert(&UserRecord::new("bob", "h1")).expect("first insert");

        let err = store
            .insert(&UserRecord::new("bob", "h2"))
            .expect_err("second insert must fail");
        assert!(matches!(err, StoreError::Duplicate(name) if name == "bob"));

        let kept = store.find_by_username("bob").expect("query").expect("exists");
        assert_eq!(kept.password_hash, "h1");
        assert_eq!(store.count_users().expect("Should count"), 1);
    }

    #[test]
    fn test_usernames_are_exact_match() {
        let store = SqliteUserStore::in_memory().expect("Should create db");
        store.insert(&UserRecord::new("Carol", "h")).expect("insert");
        assert!(store.find_by_username("carol").expect("query").is_none());
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("users.db");

        {
            let store = SqliteUserStore::open(&path, Duration::from_millis(500)).expect("open");
            store.insert(&UserRecord::new("dave", "h")).expect("insert");
        }

        let reopened = SqliteUserStore::open(&path, Duration::from_millis(500)).expect("reopen");
        assert!(reopened.find_by_username("dave").expect("query").is_some());
    }

    #[test]
    fn test_poisoned_lock_reports_unavailable() {
        let store = std::sync::Arc::new(SqliteUserStore::in_memory().expect("Should create db"));

        let holder = std::sync::Arc::clone(&store);
        let result = std::thread::spawn(move || {
            let _guard = holder.conn.lock().expect("lock");
            panic!("worker died holding the connection");
        })
        .join();
        assert!(result.is_err());
        assert!(store.conn.is_poisoned());

        assert!(matches!(
            store.find_by_username("alice"),
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            store.insert(&UserRecord::new("alice", "h")),
            Err(StoreError::Unavailable(_))
        ));
    }
}
